use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{lenient, levels::Level, rates::EarningRates};

pub const COLLECTION: &str = "earnings";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsLedger {
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub total_earning_balance: Option<f64>,
    /// year -> month name -> amount
    #[serde(default)]
    pub year_wise_earnings: BTreeMap<String, BTreeMap<String, f64>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsBreakdown {
    pub gross_child: f64,
    pub gross_grand_child: f64,
    pub net_child: f64,
    pub net_grand_child: f64,
    pub total_annual: f64,
    pub monthly_amount: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub label: String,
    pub year: i32,
    pub month: u32,
    pub due_date: NaiveDate,
    pub amount: f64,
    pub current: bool,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsReport {
    pub user_id: String,
    /// Level the rates were chosen for, classified from the current tree.
    pub level: Level,
    pub paid_child_count: u32,
    pub paid_grand_child_count: u32,
    pub earliest_paid_date: Option<NaiveDate>,
    pub rates: EarningRates,
    pub breakdown: EarningsBreakdown,
    pub schedule: Vec<ScheduleEntry>,
}
