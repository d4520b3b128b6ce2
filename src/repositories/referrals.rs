use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::{
    documents::{Document, DocumentStore, FieldUpdate},
    RepositoryError,
};
use crate::models::{
    levels::Level,
    referrals::{self, ReferralNode},
};

/// A referral node together with the version it was read at.
#[derive(Clone, Debug)]
pub struct VersionedNode {
    pub node: ReferralNode,
    pub version: i64,
}

#[derive(Clone)]
pub struct ReferralRepository {
    store: Arc<dyn DocumentStore>,
}

impl ReferralRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn decode(id: &str, document: Document) -> Result<VersionedNode, RepositoryError> {
        let node = serde_json::from_value(document.data)
            .map_err(|e| RepositoryError::malformed(referrals::COLLECTION, id, e))?;

        Ok(VersionedNode {
            node,
            version: document.version,
        })
    }

    pub async fn get_node(&self, user_id: &str) -> Result<Option<VersionedNode>, RepositoryError> {
        self.store
            .get(referrals::COLLECTION, user_id)
            .await?
            .map(|document| Self::decode(user_id, document))
            .transpose()
    }

    pub async fn get_nodes(
        &self,
        user_ids: &[String],
    ) -> Result<HashMap<String, VersionedNode>, RepositoryError> {
        self.store
            .get_many(referrals::COLLECTION, user_ids)
            .await?
            .into_iter()
            .map(|(id, document)| Self::decode(&id, document).map(|node| (id, node)))
            .collect()
    }

    pub async fn create_node(
        &self,
        user_id: &str,
        referred_by: Option<String>,
    ) -> Result<VersionedNode, RepositoryError> {
        let node = ReferralNode::new(referred_by);
        let document = self
            .store
            .insert(referrals::COLLECTION, user_id, serde_json::to_value(&node)?)
            .await?;

        Ok(VersionedNode {
            node,
            version: document.version,
        })
    }

    /// Stores the computed level, provided the node has not changed since
    /// it was read at `version`.
    pub async fn record_level(
        &self,
        user_id: &str,
        level: Level,
        version: i64,
    ) -> Result<i64, RepositoryError> {
        self.store
            .update_fields(
                referrals::COLLECTION,
                user_id,
                &[FieldUpdate::new(["Level"], json!(level.number()))],
                Some(version),
                false,
            )
            .await
    }

    /// Records when `level` was first reached. An existing timestamp is
    /// never replaced; returns whether this call recorded it.
    pub async fn mark_level_reached(
        &self,
        user_id: &str,
        level: Level,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        self.store
            .set_if_absent(
                referrals::COLLECTION,
                user_id,
                FieldUpdate::new(
                    ["LevelsUpdate".to_string(), level.number().to_string()],
                    json!(at),
                ),
            )
            .await
    }

    /// Writes the `children` and `grandchildren` lists of `node`, provided
    /// the stored node is still at `version`.
    pub async fn set_links(
        &self,
        user_id: &str,
        node: &ReferralNode,
        version: i64,
    ) -> Result<i64, RepositoryError> {
        self.store
            .update_fields(
                referrals::COLLECTION,
                user_id,
                &[
                    FieldUpdate::new(["children"], json!(node.children)),
                    FieldUpdate::new(["grandchildren"], json!(node.grandchildren)),
                ],
                Some(version),
                false,
            )
            .await
    }

    pub async fn set_referred_by(
        &self,
        user_id: &str,
        parent_id: &str,
        version: i64,
    ) -> Result<i64, RepositoryError> {
        self.store
            .update_fields(
                referrals::COLLECTION,
                user_id,
                &[FieldUpdate::new(["referredBy"], json!(parent_id))],
                Some(version),
                false,
            )
            .await
    }

    pub async fn clear_referred_by(&self, user_id: &str) -> Result<i64, RepositoryError> {
        self.store
            .update_fields(
                referrals::COLLECTION,
                user_id,
                &[FieldUpdate::new(["referredBy"], Value::Null)],
                None,
                false,
            )
            .await
    }
}
