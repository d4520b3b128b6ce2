use std::collections::HashMap;

use chrono::NaiveDate;

use super::classifier::ReferralCounts;
use crate::{
    models::{referrals, users::User},
    repositories::{
        referrals::{ReferralRepository, VersionedNode},
        users::UserRepository,
        RepositoryError,
    },
};

/// Everything known about a user's referral tree two levels deep.
#[derive(Clone, Debug)]
pub struct ReferralSnapshot {
    pub node: VersionedNode,
    pub counts: ReferralCounts,
    pub paid_children: u32,
    pub paid_grand_children: u32,
    pub earliest_paid_date: Option<NaiveDate>,
    /// Referenced ids with no referral node or user document behind them.
    pub dangling: Vec<String>,
}

#[derive(Clone)]
pub struct ReferralGraphReader {
    referrals: ReferralRepository,
    users: UserRepository,
}

impl ReferralGraphReader {
    pub fn new(referrals: ReferralRepository, users: UserRepository) -> Self {
        Self { referrals, users }
    }

    pub async fn read(
        &self,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<ReferralSnapshot, RepositoryError> {
        let node = self
            .referrals
            .get_node(user_id)
            .await?
            .ok_or_else(|| RepositoryError::not_found(referrals::COLLECTION, user_id))?;

        let children = &node.node.children;
        let grandchildren = &node.node.grandchildren;

        let (child_nodes, child_users, grandchild_users) = tokio::try_join!(
            self.referrals.get_nodes(children),
            self.users.get_users(children),
            self.users.get_users(grandchildren),
        )?;

        let mut dangling = Vec::new();
        let child_direct_counts: Vec<u32> = children
            .iter()
            .map(|id| match child_nodes.get(id) {
                Some(child) => child.node.direct_child_count(),
                None => {
                    dangling.push(id.clone());
                    0
                }
            })
            .collect();

        let (paid_children, earliest_child) =
            paid_conversions(children, &child_users, today, &mut dangling);
        let (paid_grand_children, earliest_grandchild) =
            paid_conversions(grandchildren, &grandchild_users, today, &mut dangling);

        let grand_children = grandchildren.len() as u32;
        dangling.sort();
        dangling.dedup();
        if !dangling.is_empty() {
            log::warn!(
                "Referral tree of {} references missing documents: {:?}",
                user_id,
                dangling
            );
        }

        let earliest_paid_date = match (earliest_child, earliest_grandchild) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        Ok(ReferralSnapshot {
            counts: ReferralCounts {
                child_direct_counts,
                grand_children,
            },
            node,
            paid_children,
            paid_grand_children,
            earliest_paid_date,
            dangling,
        })
    }
}

fn paid_conversions(
    ids: &[String],
    users: &HashMap<String, User>,
    today: NaiveDate,
    dangling: &mut Vec<String>,
) -> (u32, Option<NaiveDate>) {
    let mut paid = 0;
    let mut earliest: Option<NaiveDate> = None;

    for id in ids {
        let Some(user) = users.get(id) else {
            dangling.push(id.clone());
            continue;
        };

        if user.is_paid_conversion(today) {
            paid += 1;
            if let Some(converted) = user.paid_conversion_date() {
                earliest = Some(earliest.map_or(converted, |current| current.min(converted)));
            }
        }
    }

    (paid, earliest)
}
