use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tower_http::trace::TraceLayer;

use super::{
    earnings::EarningsRequest, referrals::ReferralRequest, users::UserRequest, ServiceError,
};

mod earnings;
mod referrals;
mod users;

type ApiResponse = (StatusCode, Json<Value>);

#[derive(Clone)]
struct AppState {
    user_channel: mpsc::Sender<UserRequest>,
    referral_channel: mpsc::Sender<ReferralRequest>,
    earnings_channel: mpsc::Sender<EarningsRequest>,
}

fn error_response(error: ServiceError) -> ApiResponse {
    let status = match &error {
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::InvalidThreshold(_)
        | ServiceError::AlreadyReferred(_)
        | ServiceError::InvalidRequest(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::StaleWrite(_) => StatusCode::CONFLICT,
        ServiceError::Internal(_)
        | ServiceError::Repository(_, _)
        | ServiceError::Communication(_, _) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        log::error!("Request failed: {}", error);
    }

    (
        status,
        Json(json!({
            "error": status.canonical_reason().unwrap_or("Error"),
            "details": error.to_string()
        })),
    )
}

/// Sends a request to a service and waits for its answer.
async fn dispatch<R, T>(
    channel: &mpsc::Sender<R>,
    service: &str,
    build: impl FnOnce(oneshot::Sender<Result<T, ServiceError>>) -> R,
) -> Result<T, ServiceError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(build(response_tx))
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?
}

fn respond<T: Serialize>(result: Result<T, ServiceError>, success: StatusCode) -> ApiResponse {
    match result {
        Ok(body) => (success, Json(json!(body))),
        Err(e) => error_response(e),
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/users", post(users::create_user))
        .route(
            "/users/{user_id}",
            get(users::get_user).delete(users::deactivate_user),
        )
        .route("/referrals", post(referrals::register_referral))
        .route("/referrals/{user_id}/level", get(referrals::compute_level))
        .route("/earnings/{user_id}", get(earnings::compute_earnings))
        .route("/earnings/{user_id}/ledger", get(earnings::get_ledger))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    listen: &str,
    user_channel: mpsc::Sender<UserRequest>,
    referral_channel: mpsc::Sender<ReferralRequest>,
    earnings_channel: mpsc::Sender<EarningsRequest>,
) -> Result<(), anyhow::Error> {
    let app = router(AppState {
        user_channel,
        referral_channel,
        earnings_channel,
    });

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::models::{rates::EarningsDefaults, referrals as referral_models};
    use crate::repositories::documents::{DocumentStore, MemoryDocumentStore};
    use crate::repositories::settings::SettingsRepository;
    use crate::services::{
        earnings::{EarningsRequestHandler, EarningsService},
        referrals::{ReferralRequestHandler, ReferralService},
        users::{UserRequestHandler, UserService},
        Service,
    };

    fn spawn_app(store: Arc<MemoryDocumentStore>) -> Router {
        let (user_tx, mut user_rx) = mpsc::channel(16);
        let (referral_tx, mut referral_rx) = mpsc::channel(16);
        let (earnings_tx, mut earnings_rx) = mpsc::channel(16);
        let settings = SettingsRepository::new(store.clone());
        let defaults = EarningsDefaults {
            price: 100.0,
            zero_months: 4,
        };

        let user_handler = UserRequestHandler::new(store.clone());
        tokio::spawn(async move { UserService::new().run(user_handler, &mut user_rx).await });

        let referral_handler =
            ReferralRequestHandler::new(store.clone(), settings.clone(), defaults, 1);
        tokio::spawn(async move {
            ReferralService::new()
                .run(referral_handler, &mut referral_rx)
                .await
        });

        let earnings_handler = EarningsRequestHandler::new(store, settings, defaults);
        tokio::spawn(async move {
            EarningsService::new()
                .run(earnings_handler, &mut earnings_rx)
                .await
        });

        router(AppState {
            user_channel: user_tx,
            referral_channel: referral_tx,
            earnings_channel: earnings_tx,
        })
    }

    async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        (status, value)
    }

    #[tokio::test]
    async fn referral_flow_over_http() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .insert(
                crate::models::rates::COLLECTION,
                crate::models::rates::PRICING_REQUIREMENT,
                json!({"l2Child": 1, "l3LeveledUps": 1, "l4Multiplier": 2, "l5Multiplier": 3, "l6Multiplier": 4}),
            )
            .await
            .unwrap();
        let app = spawn_app(store.clone());

        let (status, parent) = call(&app, Method::POST, "/users", Some(json!({"planType": "monthly"}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let parent_id = parent["id"].as_str().unwrap().to_string();

        let (_, child) = call(&app, Method::POST, "/users", Some(json!({}))).await;
        let child_id = child["id"].as_str().unwrap().to_string();

        let (status, _) = call(
            &app,
            Method::POST,
            "/referrals",
            Some(json!({"parentId": parent_id, "childId": child_id})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, report) = call(&app, Method::GET, &format!("/referrals/{parent_id}/level"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["classification"]["level"], json!(2));
        assert_eq!(report["classification"]["label"], json!("Level-Up"));

        let node = store
            .get(referral_models::COLLECTION, &parent_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(node.data["Level"], json!(2));

        let (status, _) = call(
            &app,
            Method::POST,
            "/referrals",
            Some(json!({"parentId": parent_id, "childId": child_id})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn maps_errors_to_status_codes() {
        let app = spawn_app(Arc::new(MemoryDocumentStore::new()));

        let (status, body) = call(&app, Method::GET, "/users/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["details"].as_str().unwrap().contains("ghost"));

        let (status, _) = call(&app, Method::GET, "/earnings/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::DELETE, "/users/ghost", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn earnings_are_served_and_stored() {
        let store = Arc::new(MemoryDocumentStore::new());
        let app = spawn_app(store.clone());

        let (_, user) = call(&app, Method::POST, "/users", Some(json!({"planType": "yearly"}))).await;
        let user_id = user["id"].as_str().unwrap().to_string();

        let (status, report) = call(&app, Method::GET, &format!("/earnings/{user_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["schedule"].as_array().unwrap().len(), 12);
        assert_eq!(report["breakdown"]["totalAnnual"], json!(0.0));

        let (status, ledger) =
            call(&app, Method::GET, &format!("/earnings/{user_id}/ledger"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ledger["totalEarningBalance"], json!(0.0));
    }
}
