use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{
    lenient,
    levels::{Level, ThresholdError, TierThresholds},
    users::User,
};

pub const COLLECTION: &str = "settings";
pub const REFERRAL_EARNING_RATE: &str = "ReferralEarningRate";
pub const PRICING_REQUIREMENT: &str = "PricingRequirement";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelRate {
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub child_earning: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub grand_child_earning: Option<f64>,
}

/// `settings/ReferralEarningRate`
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralEarningRate {
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub child_earning: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub grand_child_earning: Option<f64>,
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub operating_cost_rate: Option<f64>,
    /// Per-level rates keyed by level number.
    #[serde(default)]
    pub levels: BTreeMap<String, LevelRate>,
}

/// `settings/PricingRequirement`
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingRequirement {
    #[serde(default, deserialize_with = "lenient::option_f64")]
    pub price: Option<f64>,
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
    #[serde(default, deserialize_with = "lenient::option_u32")]
    pub zero_months: Option<u32>,
}

/// Global rate tables as loaded from the settings collection. Either
/// document may be absent.
#[derive(Clone, Debug, Default)]
pub struct GlobalSettings {
    pub earning_rate: Option<ReferralEarningRate>,
    pub pricing: Option<PricingRequirement>,
}

/// Service-level fallbacks for values the settings documents may omit.
#[derive(Clone, Copy, Debug)]
pub struct EarningsDefaults {
    pub price: f64,
    pub zero_months: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningRates {
    pub child_earning_pct: f64,
    pub grand_child_earning_pct: f64,
    pub operating_cost_rate: f64,
    pub price: f64,
    pub zero_months: u32,
}

impl GlobalSettings {
    pub fn thresholds_for(&self, user: &User) -> Result<TierThresholds, ThresholdError> {
        let pricing = self.pricing.clone().unwrap_or_default();

        TierThresholds::new(
            user.l2_child.or(pricing.l2_child).unwrap_or(0),
            user.l3_leveled_ups.or(pricing.l3_leveled_ups).unwrap_or(0),
            user.l4_multiplier.or(pricing.l4_multiplier).unwrap_or(0),
            user.l5_multiplier.or(pricing.l5_multiplier).unwrap_or(0),
            user.l6_multiplier.or(pricing.l6_multiplier).unwrap_or(0),
        )
    }

    /// Rate precedence: user override, then the global rate for the user's
    /// level, then the global default, then zero.
    pub fn rates_for(&self, user: &User, level: Level, defaults: EarningsDefaults) -> EarningRates {
        let earning_rate = self.earning_rate.clone().unwrap_or_default();
        let level_rate = earning_rate
            .levels
            .get(&level.number().to_string())
            .cloned()
            .unwrap_or_default();
        let pricing = self.pricing.clone().unwrap_or_default();

        EarningRates {
            child_earning_pct: user
                .user_child_earning
                .or(level_rate.child_earning)
                .or(earning_rate.child_earning)
                .unwrap_or(0.0),
            grand_child_earning_pct: user
                .user_grand_child_earning
                .or(level_rate.grand_child_earning)
                .or(earning_rate.grand_child_earning)
                .unwrap_or(0.0),
            operating_cost_rate: user
                .operating_cost_rate
                .or(earning_rate.operating_cost_rate)
                .unwrap_or(0.0),
            price: pricing.price.unwrap_or(defaults.price),
            zero_months: pricing.zero_months.unwrap_or(defaults.zero_months),
        }
    }
}
