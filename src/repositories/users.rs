use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use super::{
    documents::{Document, DocumentStore, FieldUpdate},
    RepositoryError,
};
use crate::models::{
    levels::Level,
    rates::EarningRates,
    referrals::{self, ReferralNode},
    users::{self, NewUser, User},
};

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn DocumentStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn decode(id: &str, document: Document) -> Result<User, RepositoryError> {
        let mut user: User = serde_json::from_value(document.data)
            .map_err(|e| RepositoryError::malformed(users::COLLECTION, id, e))?;
        user.id = id.to_string();

        Ok(user)
    }

    /// Creates the user document together with an empty referral node.
    pub async fn insert_user(&self, new_user: NewUser) -> Result<User, RepositoryError> {
        let user_id = Uuid::new_v4().hyphenated().to_string();

        let user = User {
            id: user_id.clone(),
            plan_type: new_user.plan_type,
            subscription_start_date: new_user.subscription_start_date,
            free_trial_days: new_user.free_trial_days,
            ..Default::default()
        };

        self.store
            .insert(users::COLLECTION, &user_id, serde_json::to_value(&user)?)
            .await?;
        self.store
            .insert(
                referrals::COLLECTION,
                &user_id,
                serde_json::to_value(ReferralNode::new(None))?,
            )
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, RepositoryError> {
        self.store
            .get(users::COLLECTION, user_id)
            .await?
            .map(|document| Self::decode(user_id, document))
            .transpose()
    }

    pub async fn get_users(&self, user_ids: &[String]) -> Result<HashMap<String, User>, RepositoryError> {
        self.store
            .get_many(users::COLLECTION, user_ids)
            .await?
            .into_iter()
            .map(|(id, document)| Self::decode(&id, document).map(|user| (id, user)))
            .collect()
    }

    /// Soft delete.
    pub async fn deactivate_user(&self, user_id: &str) -> Result<(), RepositoryError> {
        self.store
            .update_fields(
                users::COLLECTION,
                user_id,
                &[FieldUpdate::new(["status"], json!("deleted"))],
                None,
                false,
            )
            .await?;

        Ok(())
    }

    pub async fn set_referred_by(&self, user_id: &str, parent_id: &str) -> Result<(), RepositoryError> {
        self.store
            .update_fields(
                users::COLLECTION,
                user_id,
                &[FieldUpdate::new(["referredBy"], json!(parent_id))],
                None,
                false,
            )
            .await?;

        Ok(())
    }

    /// Writes the fields the leveling routine owns, leaving every other field
    /// of the user untouched.
    pub async fn record_level(
        &self,
        user_id: &str,
        level: Level,
        rates: &EarningRates,
    ) -> Result<(), RepositoryError> {
        self.store
            .update_fields(
                users::COLLECTION,
                user_id,
                &[
                    FieldUpdate::new(["level"], json!(level.number())),
                    FieldUpdate::new(["levelLabel"], json!(level.label())),
                    FieldUpdate::new(["childEarningRate"], json!(rates.child_earning_pct)),
                    FieldUpdate::new(["grandChildEarningRate"], json!(rates.grand_child_earning_pct)),
                ],
                None,
                false,
            )
            .await?;

        Ok(())
    }
}
