use std::sync::Arc;

use serde_json::json;

use super::{
    documents::{DocumentStore, FieldUpdate},
    RepositoryError,
};
use crate::models::earnings::{self, EarningsLedger, ScheduleEntry};

#[derive(Clone)]
pub struct EarningsRepository {
    store: Arc<dyn DocumentStore>,
}

impl EarningsRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get_ledger(&self, user_id: &str) -> Result<Option<EarningsLedger>, RepositoryError> {
        self.store
            .get(earnings::COLLECTION, user_id)
            .await?
            .map(|document| {
                serde_json::from_value(document.data)
                    .map_err(|e| RepositoryError::malformed(earnings::COLLECTION, user_id, e))
            })
            .transpose()
    }

    /// Upserts the annual total and one `yearWiseEarnings.{year}.{month}`
    /// field per scheduled month. Months outside the schedule are kept.
    pub async fn save_schedule(
        &self,
        user_id: &str,
        total_annual: f64,
        schedule: &[ScheduleEntry],
    ) -> Result<(), RepositoryError> {
        let mut updates = vec![FieldUpdate::new(["totalEarningBalance"], json!(total_annual))];
        updates.extend(schedule.iter().map(|entry| {
            FieldUpdate::new(
                [
                    "yearWiseEarnings".to_string(),
                    entry.year.to_string(),
                    month_key(entry),
                ],
                json!(entry.amount),
            )
        }));

        self.store
            .update_fields(earnings::COLLECTION, user_id, &updates, None, true)
            .await?;

        Ok(())
    }
}

fn month_key(entry: &ScheduleEntry) -> String {
    entry.due_date.format("%B").to_string()
}
