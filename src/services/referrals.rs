use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::{
        levels::{Level, LevelReport},
        rates::EarningsDefaults,
        referrals::{self, ReferralNode},
        users,
    },
    repositories::{
        documents::DocumentStore,
        referrals::{ReferralRepository, VersionedNode},
        settings::SettingsRepository,
        users::UserRepository,
        RepositoryError,
    },
};

pub mod classifier;
pub mod graph;

use graph::ReferralGraphReader;

const SERVICE: &str = "ReferralService";

pub enum ReferralRequest {
    ComputeLevel {
        user_id: String,
        response: oneshot::Sender<Result<LevelReport, ServiceError>>,
    },
    RegisterReferral {
        parent_id: String,
        child_id: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
}

#[derive(Clone)]
pub struct ReferralRequestHandler {
    referrals: ReferralRepository,
    users: UserRepository,
    settings: SettingsRepository,
    graph: ReferralGraphReader,
    defaults: EarningsDefaults,
    max_stale_retries: u32,
}

impl ReferralRequestHandler {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        settings: SettingsRepository,
        defaults: EarningsDefaults,
        max_stale_retries: u32,
    ) -> Self {
        let referrals = ReferralRepository::new(store.clone());
        let users = UserRepository::new(store);
        let graph = ReferralGraphReader::new(referrals.clone(), users.clone());

        ReferralRequestHandler {
            referrals,
            users,
            settings,
            graph,
            defaults,
            max_stale_retries,
        }
    }

    fn repository_error(e: RepositoryError) -> ServiceError {
        ServiceError::from_repository(SERVICE, e)
    }

    /// Classifies the user and stores the result. The level write is checked
    /// against the node version the classification was computed from; on a
    /// conflict the tree is re-read and classified again.
    async fn compute_level(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<LevelReport, ServiceError> {
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
        let thresholds = settings.thresholds_for(&user)?;

        let mut attempt = 0;
        let (snapshot, classification) = loop {
            let snapshot = self
                .graph
                .read(user_id, now.date_naive())
                .await
                .map_err(Self::repository_error)?;
            let classification = classifier::classify(&snapshot.counts, &thresholds);

            if snapshot.node.node.level == classification.level.number() {
                break (snapshot, classification);
            }

            match self
                .referrals
                .record_level(user_id, classification.level, snapshot.node.version)
                .await
            {
                Ok(_) => {
                    log::info!(
                        "User {} moved from level {} to {}.",
                        user_id,
                        snapshot.node.node.level,
                        classification.level
                    );
                    break (snapshot, classification);
                }
                Err(RepositoryError::StaleWrite { .. }) if attempt < self.max_stale_retries => {
                    attempt += 1;
                    log::warn!(
                        "Referral node of {} changed during leveling, retrying ({}/{}).",
                        user_id,
                        attempt,
                        self.max_stale_retries
                    );
                }
                Err(e) => return Err(Self::repository_error(e)),
            }
        };

        let level = classification.level;
        let recorded = self
            .referrals
            .mark_level_reached(user_id, level, now)
            .await
            .map_err(Self::repository_error)?;
        let first_reached_at = if recorded {
            Some(now)
        } else {
            self.referrals
                .get_node(user_id)
                .await
                .map_err(Self::repository_error)?
                .and_then(|node| node.node.levels_update.get(&level.number().to_string()).copied())
        };

        let rates = settings.rates_for(&user, level, self.defaults);
        self.users
            .record_level(user_id, level, &rates)
            .await
            .map_err(Self::repository_error)?;

        Ok(LevelReport {
            user_id: user_id.to_string(),
            direct_children: snapshot.counts.direct_children(),
            leveled_up_children: snapshot.counts.leveled_up_children(thresholds.mnr()),
            grand_children: snapshot.counts.grand_children,
            classification,
            first_reached_at,
            dangling_referrals: snapshot.dangling,
        })
    }

    async fn ensure_node(&self, user_id: &str) -> Result<VersionedNode, ServiceError> {
        if let Some(node) = self
            .referrals
            .get_node(user_id)
            .await
            .map_err(Self::repository_error)?
        {
            return Ok(node);
        }

        match self.referrals.create_node(user_id, None).await {
            Ok(node) => Ok(node),
            // Created concurrently; read the winner.
            Err(RepositoryError::AlreadyExists { .. }) => self
                .referrals
                .get_node(user_id)
                .await
                .map_err(Self::repository_error)?
                .ok_or_else(|| ServiceError::Internal(format!("Referral node {user_id} vanished"))),
            Err(e) => Err(Self::repository_error(e)),
        }
    }

    /// Applies `edit` to the node's referral lists and writes them back
    /// against the version that was read, re-reading on a conflict. Returns
    /// the node as written.
    async fn update_links<F>(&self, user_id: &str, edit: F) -> Result<VersionedNode, RepositoryError>
    where
        F: Fn(&mut ReferralNode) -> bool + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let mut current = self
                .referrals
                .get_node(user_id)
                .await?
                .ok_or_else(|| RepositoryError::not_found(referrals::COLLECTION, user_id))?;

            if !edit(&mut current.node) {
                return Ok(current);
            }

            match self
                .referrals
                .set_links(user_id, &current.node, current.version)
                .await
            {
                Ok(version) => {
                    return Ok(VersionedNode {
                        node: current.node,
                        version,
                    })
                }
                Err(RepositoryError::StaleWrite { .. }) if attempt < self.max_stale_retries => {
                    attempt += 1;
                    log::warn!(
                        "Referral node of {} changed during registration, retrying ({}/{}).",
                        user_id,
                        attempt,
                        self.max_stale_retries
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sets the child's referrer. Only one registration can win the child;
    /// returns the child's own children at the time of the claim.
    async fn claim_child(&self, parent_id: &str, child_id: &str) -> Result<Vec<String>, ServiceError> {
        let mut attempt = 0;
        loop {
            let child = self.ensure_node(child_id).await?;
            if child.node.referred_by.is_some() {
                return Err(ServiceError::AlreadyReferred(child_id.to_string()));
            }

            match self
                .referrals
                .set_referred_by(child_id, parent_id, child.version)
                .await
            {
                Ok(_) => return Ok(child.node.children),
                Err(RepositoryError::StaleWrite { .. }) if attempt < self.max_stale_retries => {
                    attempt += 1;
                }
                Err(e) => return Err(Self::repository_error(e)),
            }
        }
    }

    /// Links `child_id` under `parent_id`. The child's children become
    /// grandchildren of the parent, and the child becomes a grandchild of
    /// the parent's own referrer.
    async fn register_referral(&self, parent_id: &str, child_id: &str) -> Result<(), ServiceError> {
        if parent_id == child_id {
            return Err(ServiceError::InvalidRequest(
                "A user cannot refer themselves".to_string(),
            ));
        }

        for id in [parent_id, child_id] {
            let user = self
                .users
                .get_user_by_id(id)
                .await
                .map_err(Self::repository_error)?
                .ok_or_else(|| ServiceError::NotFound(format!("{}/{}", users::COLLECTION, id)))?;
            if !user.is_active() {
                return Err(ServiceError::InvalidRequest(format!("User {id} is deleted")));
            }
        }

        let parent = self.ensure_node(parent_id).await?;
        if parent.node.referred_by.as_deref() == Some(child_id) {
            return Err(ServiceError::InvalidRequest(format!(
                "{child_id} referred {parent_id} and cannot be its referral"
            )));
        }

        let grandchildren = self.claim_child(parent_id, child_id).await?;

        if let Err(e) = self.link_claimed(parent_id, child_id, &grandchildren).await {
            log::error!(
                "Registering {} under {} failed, undoing: {}",
                child_id,
                parent_id,
                e
            );
            self.unlink(parent_id, child_id, &grandchildren).await;
            return Err(Self::repository_error(e));
        }

        log::info!("Registered referral {} -> {}.", parent_id, child_id);
        Ok(())
    }

    async fn link_claimed(
        &self,
        parent_id: &str,
        child_id: &str,
        grandchildren: &[String],
    ) -> Result<(), RepositoryError> {
        // The referrer read here is the one current at the write, so a
        // concurrent registration of the parent sees this child.
        let parent = self
            .update_links(parent_id, |node| {
                let added_child = add_ids(&mut node.children, &[child_id]);
                add_ids(&mut node.grandchildren, grandchildren) || added_child
            })
            .await?;

        if let Some(grandparent_id) = parent.node.referred_by.as_deref() {
            self.update_links(grandparent_id, |node| {
                add_ids(&mut node.grandchildren, &[child_id])
            })
            .await?;
        }

        self.users.set_referred_by(child_id, parent_id).await
    }

    async fn unlink(&self, parent_id: &str, child_id: &str, grandchildren: &[String]) {
        match self
            .update_links(parent_id, |node| {
                let removed_child = remove_ids(&mut node.children, &[child_id]);
                remove_ids(&mut node.grandchildren, grandchildren) || removed_child
            })
            .await
        {
            Ok(parent) => {
                if let Some(grandparent_id) = parent.node.referred_by.as_deref() {
                    if let Err(e) = self
                        .update_links(grandparent_id, |node| {
                            remove_ids(&mut node.grandchildren, &[child_id])
                        })
                        .await
                    {
                        log::error!("Could not unlink {} from {}: {}", child_id, grandparent_id, e);
                    }
                }
            }
            Err(e) => log::error!("Could not unlink {} from {}: {}", child_id, parent_id, e),
        }

        if let Err(e) = self.referrals.clear_referred_by(child_id).await {
            log::error!("Could not clear the referrer of {}: {}", child_id, e);
        }
    }
}

fn add_ids<S: AsRef<str>>(list: &mut Vec<String>, ids: &[S]) -> bool {
    let before = list.len();
    for id in ids {
        if !list.iter().any(|existing| existing == id.as_ref()) {
            list.push(id.as_ref().to_string());
        }
    }
    list.len() != before
}

fn remove_ids<S: AsRef<str>>(list: &mut Vec<String>, ids: &[S]) -> bool {
    let before = list.len();
    list.retain(|existing| !ids.iter().any(|id| id.as_ref() == existing));
    list.len() != before
}

#[async_trait]
impl RequestHandler<ReferralRequest> for ReferralRequestHandler {
    async fn handle_request(&self, request: ReferralRequest) {
        match request {
            ReferralRequest::ComputeLevel { user_id, response } => {
                let result = self.compute_level(&user_id, Utc::now()).await;
                if let Err(e) = &result {
                    log::error!("Leveling failed for {}: {}", user_id, e);
                }
                let _ = response.send(result);
            }
            ReferralRequest::RegisterReferral {
                parent_id,
                child_id,
                response,
            } => {
                let result = self.register_referral(&parent_id, &child_id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct ReferralService;

impl ReferralService {
    pub fn new() -> Self {
        ReferralService {}
    }
}

#[async_trait]
impl Service<ReferralRequest, ReferralRequestHandler> for ReferralService {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::models::rates;
    use crate::repositories::documents::{Document, FieldUpdate, MemoryDocumentStore};
    use chrono::TimeZone;
    use serde_json::json;

    const DEFAULTS: EarningsDefaults = EarningsDefaults {
        price: 100.0,
        zero_months: 4,
    };

    async fn handler_with(store: Arc<MemoryDocumentStore>) -> ReferralRequestHandler {
        handler_on(store, 2).await
    }

    async fn handler_on(
        store: Arc<dyn DocumentStore>,
        max_stale_retries: u32,
    ) -> ReferralRequestHandler {
        store
            .insert(
                rates::COLLECTION,
                rates::PRICING_REQUIREMENT,
                json!({"l2Child": 2, "l3LeveledUps": 2, "l4Multiplier": 2, "l5Multiplier": 3, "l6Multiplier": 4}),
            )
            .await
            .unwrap();
        store
            .insert(
                rates::COLLECTION,
                rates::REFERRAL_EARNING_RATE,
                json!({"childEarning": 10, "grandChildEarning": 5, "levels": {"3": {"childEarning": 12}}}),
            )
            .await
            .unwrap();

        ReferralRequestHandler::new(
            store.clone(),
            SettingsRepository::new(store),
            DEFAULTS,
            max_stale_retries,
        )
    }

    /// Store that lets another writer bump a referral node right before a
    /// version-checked write touching `field`, for the next `conflicts` writes.
    struct ContendedStore {
        inner: Arc<MemoryDocumentStore>,
        field: &'static str,
        conflicts: AtomicU32,
    }

    impl ContendedStore {
        fn new(inner: Arc<MemoryDocumentStore>, field: &'static str, conflicts: u32) -> Arc<Self> {
            Arc::new(Self {
                inner,
                field,
                conflicts: AtomicU32::new(conflicts),
            })
        }

        fn remaining(&self) -> u32 {
            self.conflicts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DocumentStore for ContendedStore {
        async fn get(
            &self,
            collection: &str,
            id: &str,
        ) -> Result<Option<Document>, RepositoryError> {
            self.inner.get(collection, id).await
        }

        async fn insert(
            &self,
            collection: &str,
            id: &str,
            data: serde_json::Value,
        ) -> Result<Document, RepositoryError> {
            self.inner.insert(collection, id, data).await
        }

        async fn update_fields(
            &self,
            collection: &str,
            id: &str,
            updates: &[FieldUpdate],
            expected_version: Option<i64>,
            upsert: bool,
        ) -> Result<i64, RepositoryError> {
            let contended = collection == referrals::COLLECTION
                && expected_version.is_some()
                && updates
                    .iter()
                    .any(|update| update.path.first().map(String::as_str) == Some(self.field));

            if contended
                && self
                    .conflicts
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                self.inner
                    .update_fields(
                        collection,
                        id,
                        &[FieldUpdate::new(["touchedBy"], json!("another writer"))],
                        None,
                        false,
                    )
                    .await?;
            }

            self.inner
                .update_fields(collection, id, updates, expected_version, upsert)
                .await
        }

        async fn set_if_absent(
            &self,
            collection: &str,
            id: &str,
            update: FieldUpdate,
        ) -> Result<bool, RepositoryError> {
            self.inner.set_if_absent(collection, id, update).await
        }
    }

    async fn add_user(store: &MemoryDocumentStore, id: &str, children: &[&str]) {
        store
            .insert(users::COLLECTION, id, json!({"planType": "monthly"}))
            .await
            .unwrap();
        store
            .insert(referrals::COLLECTION, id, json!({"children": children, "Level": 1}))
            .await
            .unwrap();
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 9, day, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn leveling_writes_level_timestamp_and_user_fields() {
        let store = Arc::new(MemoryDocumentStore::new());
        let handler = handler_with(store.clone()).await;
        add_user(&store, "root", &["a", "b"]).await;
        add_user(&store, "a", &["a1", "a2"]).await;
        add_user(&store, "b", &["b1", "b2", "b3"]).await;

        let report = handler.compute_level("root", at(1)).await.unwrap();

        assert_eq!(report.classification.level, Level::Bronze);
        assert_eq!(report.direct_children, 2);
        assert_eq!(report.leveled_up_children, 2);
        assert_eq!(report.first_reached_at, Some(at(1)));

        let node = store.get(referrals::COLLECTION, "root").await.unwrap().unwrap();
        assert_eq!(node.data["Level"], json!(3));
        let user = store.get(users::COLLECTION, "root").await.unwrap().unwrap();
        assert_eq!(user.data["levelLabel"], json!("Bronze"));
        assert_eq!(user.data["childEarningRate"], json!(12.0));
        assert_eq!(user.data["grandChildEarningRate"], json!(5.0));
    }

    #[tokio::test]
    async fn recomputing_keeps_first_reached_timestamp() {
        let store = Arc::new(MemoryDocumentStore::new());
        let handler = handler_with(store.clone()).await;
        add_user(&store, "root", &["a", "b"]).await;

        let first = handler.compute_level("root", at(1)).await.unwrap();
        let second = handler.compute_level("root", at(2)).await.unwrap();

        assert_eq!(first.classification.level, Level::LevelUp);
        assert_eq!(second.first_reached_at, Some(at(1)));

        let node = handler.referrals.get_node("root").await.unwrap().unwrap();
        assert_eq!(node.node.levels_update.get("2"), Some(&at(1)));
    }

    #[tokio::test]
    async fn invalid_thresholds_are_reported() {
        let store = Arc::new(MemoryDocumentStore::new());
        let handler = handler_with(store.clone()).await;
        add_user(&store, "root", &[]).await;
        store
            .update_fields(
                users::COLLECTION,
                "root",
                &[FieldUpdate::new(["l4Multiplier"], json!(0))],
                None,
                false,
            )
            .await
            .unwrap();

        let result = handler.compute_level("root", at(1)).await;
        assert!(matches!(result, Err(ServiceError::InvalidThreshold(_))));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let store = Arc::new(MemoryDocumentStore::new());
        let handler = handler_with(store).await;

        assert!(matches!(
            handler.compute_level("ghost", at(1)).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn registration_links_children_and_grandchildren() {
        let store = Arc::new(MemoryDocumentStore::new());
        let handler = handler_with(store.clone()).await;
        add_user(&store, "grandparent", &[]).await;
        add_user(&store, "parent", &[]).await;
        store
            .insert(users::COLLECTION, "child", json!({"planType": "free"}))
            .await
            .unwrap();

        handler.register_referral("grandparent", "parent").await.unwrap();
        handler.register_referral("parent", "child").await.unwrap();

        let grandparent = handler.referrals.get_node("grandparent").await.unwrap().unwrap();
        assert_eq!(grandparent.node.children, vec!["parent".to_string()]);
        assert_eq!(grandparent.node.grandchildren, vec!["child".to_string()]);

        let child = handler.referrals.get_node("child").await.unwrap().unwrap();
        assert_eq!(child.node.referred_by.as_deref(), Some("parent"));
        let child_user = handler.users.get_user_by_id("child").await.unwrap().unwrap();
        assert_eq!(child_user.referred_by.as_deref(), Some("parent"));
    }

    #[tokio::test]
    async fn registration_rejects_second_referrer_and_self_referral() {
        let store = Arc::new(MemoryDocumentStore::new());
        let handler = handler_with(store.clone()).await;
        add_user(&store, "a", &[]).await;
        add_user(&store, "b", &[]).await;
        add_user(&store, "c", &[]).await;

        handler.register_referral("a", "c").await.unwrap();

        assert!(matches!(
            handler.register_referral("b", "c").await,
            Err(ServiceError::AlreadyReferred(_))
        ));
        assert!(matches!(
            handler.register_referral("a", "a").await,
            Err(ServiceError::InvalidRequest(_))
        ));
        assert!(matches!(
            handler.register_referral("c", "a").await,
            Err(ServiceError::InvalidRequest(_))
        ));
        assert!(matches!(
            handler.register_referral("a", "nobody").await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn leveling_retries_after_a_concurrent_node_write() {
        let memory = Arc::new(MemoryDocumentStore::new());
        add_user(&memory, "root", &["a", "b"]).await;
        let store = ContendedStore::new(memory.clone(), "Level", 1);
        let handler = handler_on(store.clone(), 2).await;

        let report = handler.compute_level("root", at(1)).await.unwrap();

        assert_eq!(store.remaining(), 0);
        assert_eq!(report.classification.level, Level::LevelUp);
        let node = memory.get(referrals::COLLECTION, "root").await.unwrap().unwrap();
        assert_eq!(node.data["Level"], json!(2));
        assert_eq!(node.data["touchedBy"], json!("another writer"));
    }

    #[tokio::test]
    async fn leveling_gives_up_after_max_stale_retries() {
        let memory = Arc::new(MemoryDocumentStore::new());
        add_user(&memory, "root", &["a", "b"]).await;
        let store = ContendedStore::new(memory.clone(), "Level", 10);
        let handler = handler_on(store.clone(), 2).await;

        let result = handler.compute_level("root", at(1)).await;

        assert!(matches!(result, Err(ServiceError::StaleWrite(_))));
        // One first attempt plus two retries.
        assert_eq!(store.remaining(), 7);
        let node = memory.get(referrals::COLLECTION, "root").await.unwrap().unwrap();
        assert_eq!(node.data["Level"], json!(1));
    }

    #[tokio::test]
    async fn registration_retries_when_parent_changes() {
        let memory = Arc::new(MemoryDocumentStore::new());
        add_user(&memory, "p", &[]).await;
        add_user(&memory, "c", &[]).await;
        let store = ContendedStore::new(memory.clone(), "children", 1);
        let handler = handler_on(store.clone(), 2).await;

        handler.register_referral("p", "c").await.unwrap();

        assert_eq!(store.remaining(), 0);
        let parent = handler.referrals.get_node("p").await.unwrap().unwrap();
        assert_eq!(parent.node.children, vec!["c".to_string()]);
        let child = handler.referrals.get_node("c").await.unwrap().unwrap();
        assert_eq!(child.node.referred_by.as_deref(), Some("p"));
    }

    #[tokio::test]
    async fn failed_registration_leaves_child_free_to_link() {
        let memory = Arc::new(MemoryDocumentStore::new());
        add_user(&memory, "p", &[]).await;
        add_user(&memory, "c", &[]).await;
        let store = ContendedStore::new(memory.clone(), "children", 3);
        let handler = handler_on(store.clone(), 2).await;

        assert!(matches!(
            handler.register_referral("p", "c").await,
            Err(ServiceError::StaleWrite(_))
        ));

        let parent = handler.referrals.get_node("p").await.unwrap().unwrap();
        assert!(parent.node.children.is_empty());
        let child = handler.referrals.get_node("c").await.unwrap().unwrap();
        assert_eq!(child.node.referred_by, None);
        let child_user = handler.users.get_user_by_id("c").await.unwrap().unwrap();
        assert_eq!(child_user.referred_by, None);

        handler.register_referral("p", "c").await.unwrap();
        let parent = handler.referrals.get_node("p").await.unwrap().unwrap();
        assert_eq!(parent.node.children, vec!["c".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_keep_tree_consistent() {
        let store = Arc::new(MemoryDocumentStore::new());
        let handler = handler_on(store.clone(), 64).await;
        add_user(&store, "p", &[]).await;
        let children: Vec<String> = (0..32).map(|n| format!("c{n}")).collect();
        for child in &children {
            add_user(&store, child, &[]).await;
        }

        let tasks: Vec<_> = children
            .iter()
            .cloned()
            .map(|child| {
                let handler = handler.clone();
                tokio::spawn(async move { handler.register_referral("p", &child).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let parent = handler.referrals.get_node("p").await.unwrap().unwrap();
        assert_eq!(parent.node.children.len(), children.len());
        for child in &children {
            assert!(parent.node.children.contains(child));
            let node = handler.referrals.get_node(child).await.unwrap().unwrap();
            assert_eq!(node.node.referred_by.as_deref(), Some("p"));
        }
    }

    #[tokio::test]
    async fn linking_a_parent_later_adopts_its_children_as_grandchildren() {
        let store = Arc::new(MemoryDocumentStore::new());
        let handler = handler_with(store.clone()).await;
        add_user(&store, "gp", &[]).await;
        add_user(&store, "p", &[]).await;
        add_user(&store, "c", &[]).await;

        handler.register_referral("p", "c").await.unwrap();
        handler.register_referral("gp", "p").await.unwrap();

        let grandparent = handler.referrals.get_node("gp").await.unwrap().unwrap();
        assert_eq!(grandparent.node.children, vec!["p".to_string()]);
        assert_eq!(grandparent.node.grandchildren, vec!["c".to_string()]);

        let report = handler.compute_level("gp", at(1)).await.unwrap();
        assert_eq!(report.grand_children, 1);
    }
}
