use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use super::{
    referrals::{classifier, graph::ReferralGraphReader},
    RequestHandler, Service, ServiceError,
};
use crate::{
    models::{
        earnings::{EarningsLedger, EarningsReport},
        levels::Level,
        rates::EarningsDefaults,
        users,
    },
    repositories::{
        documents::DocumentStore, earnings::EarningsRepository, referrals::ReferralRepository,
        settings::SettingsRepository, users::UserRepository, RepositoryError,
    },
};

mod aggregator;

const SERVICE: &str = "EarningsService";

pub enum EarningsRequest {
    ComputeEarnings {
        user_id: String,
        response: oneshot::Sender<Result<EarningsReport, ServiceError>>,
    },
    GetLedger {
        user_id: String,
        response: oneshot::Sender<Result<Option<EarningsLedger>, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct EarningsRequestHandler {
    earnings: EarningsRepository,
    users: UserRepository,
    settings: SettingsRepository,
    graph: ReferralGraphReader,
    defaults: EarningsDefaults,
}

impl EarningsRequestHandler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        settings: SettingsRepository,
        defaults: EarningsDefaults,
    ) -> Self {
        let users = UserRepository::new(store.clone());
        let graph = ReferralGraphReader::new(ReferralRepository::new(store.clone()), users.clone());

        EarningsRequestHandler {
            earnings: EarningsRepository::new(store),
            users,
            settings,
            graph,
            defaults,
        }
    }

    fn repository_error(e: RepositoryError) -> ServiceError {
        ServiceError::from_repository(SERVICE, e)
    }

    async fn compute_earnings(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<EarningsReport, ServiceError> {
        let today = now.date_naive();
        let settings = self
            .settings
            .get_settings()
            .await
            .map_err(Self::repository_error)?;
        let user = self
            .users
            .get_user_by_id(user_id)
            .await
            .map_err(Self::repository_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("{}/{}", users::COLLECTION, user_id)))?;
        let snapshot = self
            .graph
            .read(user_id, today)
            .await
            .map_err(Self::repository_error)?;

        let level = match settings.thresholds_for(&user) {
            Ok(thresholds) => classifier::classify(&snapshot.counts, &thresholds).level,
            Err(e) => {
                let stored = Level::try_from(snapshot.node.node.level).unwrap_or(Level::Starter);
                log::warn!(
                    "Cannot classify {} ({}), using stored level {}.",
                    user_id,
                    e,
                    stored
                );
                stored
            }
        };
        let rates = settings.rates_for(&user, level, self.defaults);
        if rates.child_earning_pct == 0.0 && rates.grand_child_earning_pct == 0.0 {
            log::warn!("No earning rates configured for {}, earnings compute to zero.", user_id);
        }

        let breakdown =
            aggregator::aggregate(snapshot.paid_children, snapshot.paid_grand_children, &rates);
        let schedule = aggregator::build_schedule(today, breakdown.monthly_amount, rates.zero_months);

        self.earnings
            .save_schedule(user_id, breakdown.total_annual, &schedule)
            .await
            .map_err(Self::repository_error)?;

        Ok(EarningsReport {
            user_id: user_id.to_string(),
            level,
            paid_child_count: snapshot.paid_children,
            paid_grand_child_count: snapshot.paid_grand_children,
            earliest_paid_date: snapshot.earliest_paid_date,
            rates,
            breakdown,
            schedule,
        })
    }

    async fn get_ledger(&self, user_id: &str) -> Result<Option<EarningsLedger>, ServiceError> {
        self.earnings
            .get_ledger(user_id)
            .await
            .map_err(Self::repository_error)
    }
}

#[async_trait]
impl RequestHandler<EarningsRequest> for EarningsRequestHandler {
    async fn handle_request(&self, request: EarningsRequest) {
        match request {
            EarningsRequest::ComputeEarnings { user_id, response } => {
                let result = self.compute_earnings(&user_id, Utc::now()).await;
                if let Err(e) = &result {
                    log::error!("Earnings computation failed for {}: {}", user_id, e);
                }
                let _ = response.send(result);
            }
            EarningsRequest::GetLedger { user_id, response } => {
                let ledger = self.get_ledger(&user_id).await;
                let _ = response.send(ledger);
            }
        }
    }
}

pub struct EarningsService;

impl EarningsService {
    pub fn new() -> Self {
        EarningsService {}
    }
}

#[async_trait]
impl Service<EarningsRequest, EarningsRequestHandler> for EarningsService {}
