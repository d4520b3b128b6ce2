use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    models::{levels::ThresholdError, rates::EarningsDefaults},
    repositories::{documents::DocumentStore, settings::SettingsRepository, RepositoryError},
    settings::Settings,
};

mod earnings;
mod http;
mod referrals;
mod users;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(#[from] ThresholdError),
    #[error("Stale write: {0}")]
    StaleWrite(String),
    #[error("User {0} already has a referrer")]
    AlreadyReferred(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
}

impl ServiceError {
    pub fn from_repository(service: &str, error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { collection, id } => {
                ServiceError::NotFound(format!("{collection}/{id}"))
            }
            e @ RepositoryError::StaleWrite { .. } => ServiceError::StaleWrite(e.to_string()),
            e => ServiceError::Repository(service.to_string(), e.to_string()),
        }
    }
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

pub async fn start_services(
    store: Arc<dyn DocumentStore>,
    settings: Settings,
) -> Result<(), anyhow::Error> {
    let (user_tx, mut user_rx) = mpsc::channel(512);
    let (referral_tx, mut referral_rx) = mpsc::channel(512);
    let (earnings_tx, mut earnings_rx) = mpsc::channel(512);

    let mut user_service = users::UserService::new();
    let mut referral_service = referrals::ReferralService::new();
    let mut earnings_service = earnings::EarningsService::new();

    let settings_repository = SettingsRepository::new(store.clone());
    settings_repository
        .start_refresh_task(settings.settings_cache.refresh_secs)
        .await;

    let defaults = EarningsDefaults {
        price: settings.earnings.default_price,
        zero_months: settings.earnings.default_zero_months,
    };

    log::info!("Starting user service.");
    let user_store = store.clone();
    tokio::spawn(async move {
        user_service
            .run(users::UserRequestHandler::new(user_store), &mut user_rx)
            .await;
    });

    log::info!("Starting referral service.");
    let referral_store = store.clone();
    let referral_settings = settings_repository.clone();
    let max_stale_retries = settings.leveling.max_stale_retries;
    tokio::spawn(async move {
        let handler = referrals::ReferralRequestHandler::new(
            referral_store,
            referral_settings,
            defaults,
            max_stale_retries,
        );

        referral_service.run(handler, &mut referral_rx).await;
    });

    log::info!("Starting earnings service.");
    let earnings_store = store.clone();
    let earnings_settings = settings_repository.clone();
    tokio::spawn(async move {
        let handler =
            earnings::EarningsRequestHandler::new(earnings_store, earnings_settings, defaults);

        earnings_service.run(handler, &mut earnings_rx).await;
    });

    log::info!("Starting HTTP server.");
    http::start_http_server(&settings.http.listen, user_tx, referral_tx, earnings_tx).await
}
