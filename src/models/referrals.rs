use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const COLLECTION: &str = "referrals";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct ReferralNode {
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub grandchildren: Vec<String>,
    #[serde(rename = "Level", default = "default_level")]
    pub level: u8,
    /// First time each level was reached, keyed by level number.
    #[serde(rename = "LevelsUpdate", default)]
    pub levels_update: BTreeMap<String, DateTime<Utc>>,
    #[serde(rename = "badgeLevel", default)]
    pub badge_level: u8,
    #[serde(rename = "referredBy", default, skip_serializing_if = "Option::is_none")]
    pub referred_by: Option<String>,
}

fn default_level() -> u8 {
    1
}

impl ReferralNode {
    pub fn new(referred_by: Option<String>) -> Self {
        Self {
            level: default_level(),
            referred_by,
            ..Default::default()
        }
    }

    pub fn direct_child_count(&self) -> u32 {
        self.children.len() as u32
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReferral {
    pub parent_id: String,
    pub child_id: String,
}
