use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Level {
    Starter = 1,
    LevelUp = 2,
    Bronze = 3,
    Silver = 4,
    Gold = 5,
    Platinum = 6,
}

impl Level {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn label(self) -> &'static str {
        match self {
            Level::Starter => "Starter",
            Level::LevelUp => "Level-Up",
            Level::Bronze => "Bronze",
            Level::Silver => "Silver",
            Level::Gold => "Gold",
            Level::Platinum => "Platinum",
        }
    }

    pub fn next(self) -> Option<Level> {
        Level::try_from(self.number() + 1).ok()
    }
}

impl TryFrom<u8> for Level {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Level::Starter),
            2 => Ok(Level::LevelUp),
            3 => Ok(Level::Bronze),
            4 => Ok(Level::Silver),
            5 => Ok(Level::Gold),
            6 => Ok(Level::Platinum),
            other => Err(format!("level out of range: {other}")),
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.number()
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.number(), self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThresholdError {
    #[error("Minimum number of referrals must be positive")]
    ZeroMinimumReferrals,
    #[error("Level 3 leveled-up requirement must be positive")]
    ZeroLeveledUpRequirement,
    #[error("Level {level} multiplier must be positive")]
    ZeroMultiplier { level: u8 },
    #[error("Level multipliers must not decrease: L4={l4}, L5={l5}, L6={l6}")]
    DecreasingMultipliers { l4: u32, l5: u32, l6: u32 },
}

/// Validated promotion thresholds for one user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierThresholds {
    mnr: u32,
    l3_leveled_ups: u32,
    l4_multiplier: u32,
    l5_multiplier: u32,
    l6_multiplier: u32,
}

impl TierThresholds {
    pub fn new(
        mnr: u32,
        l3_leveled_ups: u32,
        l4_multiplier: u32,
        l5_multiplier: u32,
        l6_multiplier: u32,
    ) -> Result<Self, ThresholdError> {
        if mnr == 0 {
            return Err(ThresholdError::ZeroMinimumReferrals);
        }
        if l3_leveled_ups == 0 {
            return Err(ThresholdError::ZeroLeveledUpRequirement);
        }
        for (level, multiplier) in [(4, l4_multiplier), (5, l5_multiplier), (6, l6_multiplier)] {
            if multiplier == 0 {
                return Err(ThresholdError::ZeroMultiplier { level });
            }
        }
        if l4_multiplier > l5_multiplier || l5_multiplier > l6_multiplier {
            return Err(ThresholdError::DecreasingMultipliers {
                l4: l4_multiplier,
                l5: l5_multiplier,
                l6: l6_multiplier,
            });
        }

        Ok(Self {
            mnr,
            l3_leveled_ups,
            l4_multiplier,
            l5_multiplier,
            l6_multiplier,
        })
    }

    pub fn mnr(&self) -> u32 {
        self.mnr
    }

    pub fn l3_leveled_ups(&self) -> u32 {
        self.l3_leveled_ups
    }

    /// Leveled-up children needed to enter Silver.
    pub fn silver_floor(&self) -> u64 {
        self.l4_multiplier as u64 * self.l3_leveled_ups as u64
    }

    /// Leveled-up children needed to enter Gold.
    pub fn gold_floor(&self) -> u64 {
        self.l5_multiplier as u64 * self.l3_leveled_ups as u64
    }

    /// Leveled-up children needed to enter Platinum.
    pub fn platinum_floor(&self) -> u64 {
        self.l6_multiplier as u64 * self.l3_leveled_ups as u64
    }
}

/// What is still missing before the next level.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelRequirement {
    pub remaining_children: u64,
    pub remaining_leveled_up_children: u64,
    pub remaining_grand_children: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub level: Level,
    pub label: &'static str,
    pub next_level: Option<Level>,
    pub required: LevelRequirement,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelReport {
    pub user_id: String,
    pub direct_children: u32,
    pub leveled_up_children: u32,
    pub grand_children: u32,
    pub classification: Classification,
    pub first_reached_at: Option<DateTime<Utc>>,
    pub dangling_referrals: Vec<String>,
}
