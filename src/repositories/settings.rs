use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use super::{documents::DocumentStore, RepositoryError};
use crate::models::rates::{
    self, GlobalSettings, PricingRequirement, ReferralEarningRate, PRICING_REQUIREMENT,
    REFERRAL_EARNING_RATE,
};

#[derive(Clone)]
pub struct SettingsRepository {
    store: Arc<dyn DocumentStore>,
    cache: Arc<RwLock<Option<GlobalSettings>>>,
}

impl SettingsRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Snapshot of the global settings. Served from the cache once it has
    /// been filled; the first call reads through to the store.
    pub async fn get_settings(&self) -> Result<GlobalSettings, RepositoryError> {
        if let Some(settings) = self.cache.read().await.clone() {
            return Ok(settings);
        }

        self.refresh().await
    }

    pub async fn refresh(&self) -> Result<GlobalSettings, RepositoryError> {
        let settings = self.fetch_settings().await?;

        let mut cache = self.cache.write().await;
        *cache = Some(settings.clone());

        Ok(settings)
    }

    pub async fn start_refresh_task(&self, refresh_secs: u64) {
        let repository = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(refresh_secs.max(1)));

            loop {
                interval.tick().await;

                match repository.refresh().await {
                    Ok(_) => {
                        log::debug!("Refreshed referral settings.")
                    }
                    Err(e) => {
                        log::error!("Error refreshing referral settings: {}", e);
                    }
                }
            }
        });

        log::info!("Settings refresh task started");
    }

    async fn fetch_settings(&self) -> Result<GlobalSettings, RepositoryError> {
        let earning_rate = match self.store.get(rates::COLLECTION, REFERRAL_EARNING_RATE).await? {
            Some(document) => Some(
                serde_json::from_value::<ReferralEarningRate>(document.data).map_err(|e| {
                    RepositoryError::malformed(rates::COLLECTION, REFERRAL_EARNING_RATE, e)
                })?,
            ),
            None => {
                log::warn!("Settings document {REFERRAL_EARNING_RATE} is missing, earning rates fall back to zero.");
                None
            }
        };

        let pricing = match self.store.get(rates::COLLECTION, PRICING_REQUIREMENT).await? {
            Some(document) => Some(
                serde_json::from_value::<PricingRequirement>(document.data).map_err(|e| {
                    RepositoryError::malformed(rates::COLLECTION, PRICING_REQUIREMENT, e)
                })?,
            ),
            None => {
                log::warn!("Settings document {PRICING_REQUIREMENT} is missing.");
                None
            }
        };

        Ok(GlobalSettings {
            earning_rate,
            pricing,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::documents::MemoryDocumentStore;
    use serde_json::json;

    #[tokio::test]
    async fn missing_documents_load_as_none() {
        let repository = SettingsRepository::new(Arc::new(MemoryDocumentStore::new()));
        let settings = repository.get_settings().await.unwrap();

        assert!(settings.earning_rate.is_none());
        assert!(settings.pricing.is_none());
    }

    #[tokio::test]
    async fn cached_snapshot_is_kept_until_refresh() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .insert(rates::COLLECTION, PRICING_REQUIREMENT, json!({"l2Child": 100}))
            .await
            .unwrap();
        let repository = SettingsRepository::new(store.clone());

        let first = repository.get_settings().await.unwrap();
        assert_eq!(first.pricing.unwrap().l2_child, Some(100));

        store
            .insert(rates::COLLECTION, REFERRAL_EARNING_RATE, json!({"childEarning": 10}))
            .await
            .unwrap();
        assert!(repository.get_settings().await.unwrap().earning_rate.is_none());

        let refreshed = repository.refresh().await.unwrap();
        assert_eq!(refreshed.earning_rate.unwrap().child_earning, Some(10.0));
    }
}
