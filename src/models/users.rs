use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::lenient;

pub const COLLECTION: &str = "users";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    #[default]
    Free,
    Trial,
    Monthly,
    Yearly,
    #[serde(other)]
    Other,
}

impl PlanType {
    pub fn is_paid(self) -> bool {
        matches!(self, PlanType::Monthly | PlanType::Yearly)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Deleted,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: UserStatus,
    #[serde(default)]
    pub plan_type: PlanType,
    #[serde(default)]
    pub subscription_start_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient::option_u32")]
    pub free_trial_days: Option<u32>,
    #[serde(default)]
    pub referred_by: Option<String>,

    #[serde(default, rename = "l2Child", deserialize_with = "lenient::option_u32")]
    pub l2_child: Option<u32>,
    #[serde(default, rename = "l3LeveledUps", deserialize_with = "lenient::option_u32")]
    pub l3_leveled_ups: Option<u32>,
    #[serde(default, rename = "l4Multiplier", deserialize_with = "lenient::option_u32")]
    pub l4_multiplier: Option<u32>,
    #[serde(default, rename = "l5Multiplier", deserialize_with = "lenient::option_u32")]
    pub l5_multiplier: Option<u32>,
    #[serde(default, rename = "l6Multiplier", deserialize_with = "lenient::option_u32")]
    pub l6_multiplier: Option<u32>,

    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub user_child_earning: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub user_grand_child_earning: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub operating_cost_rate: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::option_f64")]
    pub child_earning_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::option_f64")]
    pub grand_child_earning_rate: Option<f64>,
}

impl User {
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Date on which the user started paying, once the free trial is over.
    pub fn paid_conversion_date(&self) -> Option<NaiveDate> {
        if !self.plan_type.is_paid() {
            return None;
        }
        let start = self.subscription_start_date?.date_naive();
        let trial = Duration::days(self.free_trial_days.unwrap_or(0) as i64);

        start.checked_add_signed(trial)
    }

    pub fn is_paid_conversion(&self, today: NaiveDate) -> bool {
        self.is_active()
            && self
                .paid_conversion_date()
                .is_some_and(|converted| converted <= today)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    #[serde(default)]
    pub plan_type: PlanType,
    #[serde(default)]
    pub subscription_start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub free_trial_days: Option<u32>,
}
