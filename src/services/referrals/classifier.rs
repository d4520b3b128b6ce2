use crate::models::levels::{Classification, Level, LevelRequirement, TierThresholds};

/// Referral counts the classifier works from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReferralCounts {
    /// Direct-child count of each direct child, one entry per child.
    pub child_direct_counts: Vec<u32>,
    pub grand_children: u32,
}

impl ReferralCounts {
    pub fn direct_children(&self) -> u32 {
        self.child_direct_counts.len() as u32
    }

    /// Direct children that reached Level 2 on their own.
    pub fn leveled_up_children(&self, mnr: u32) -> u32 {
        self.child_direct_counts
            .iter()
            .filter(|count| **count >= mnr)
            .count() as u32
    }
}

/// Grandchildren still needed to promote enough children to Level 2.
///
/// Each child below MNR contributes its own deficit; the smallest deficits
/// are used first, and every missing slot beyond the available children
/// costs a full MNR.
pub fn remaining_grandchildren(child_direct_counts: &[u32], mnr: u32, missing: u32) -> u64 {
    let mut deficits: Vec<u64> = child_direct_counts
        .iter()
        .filter(|count| **count < mnr)
        .map(|count| (mnr - count) as u64)
        .collect();
    deficits.sort_unstable();

    let missing = missing as usize;
    let covered: u64 = deficits.iter().take(missing).sum();
    let uncovered = missing.saturating_sub(deficits.len()) as u64;

    covered + uncovered * mnr as u64
}

pub fn classify(counts: &ReferralCounts, thresholds: &TierThresholds) -> Classification {
    let mnr = thresholds.mnr();
    let rca = counts.direct_children();
    let leveled_up = counts.leveled_up_children(mnr) as u64;

    let (level, required) = if rca < mnr {
        (
            Level::Starter,
            LevelRequirement {
                remaining_children: (mnr - rca) as u64,
                ..Default::default()
            },
        )
    } else if leveled_up < thresholds.l3_leveled_ups() as u64 {
        let missing_level2_children = mnr.saturating_sub(leveled_up as u32);
        (
            Level::LevelUp,
            LevelRequirement {
                remaining_leveled_up_children: thresholds.l3_leveled_ups() as u64 - leveled_up,
                remaining_grand_children: remaining_grandchildren(
                    &counts.child_direct_counts,
                    mnr,
                    missing_level2_children,
                ),
                ..Default::default()
            },
        )
    } else if leveled_up < thresholds.silver_floor() {
        (Level::Bronze, leveled_up_requirement(thresholds.silver_floor(), leveled_up))
    } else if leveled_up < thresholds.gold_floor() {
        (Level::Silver, leveled_up_requirement(thresholds.gold_floor(), leveled_up))
    } else if leveled_up < thresholds.platinum_floor() {
        (Level::Gold, leveled_up_requirement(thresholds.platinum_floor(), leveled_up))
    } else {
        (Level::Platinum, LevelRequirement::default())
    };

    Classification {
        level,
        label: level.label(),
        next_level: level.next(),
        required,
    }
}

fn leveled_up_requirement(floor: u64, leveled_up: u64) -> LevelRequirement {
    LevelRequirement {
        remaining_leveled_up_children: floor - leveled_up,
        ..Default::default()
    }
}
