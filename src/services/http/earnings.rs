use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::{dispatch, error_response, respond, AppState};
use crate::models::earnings;
use crate::services::{earnings::EarningsRequest, ServiceError};

const SERVICE: &str = "EarningsService";

pub async fn compute_earnings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let result = dispatch(&state.earnings_channel, SERVICE, |response| {
        EarningsRequest::ComputeEarnings { user_id, response }
    })
    .await;

    respond(result, StatusCode::OK)
}

pub async fn get_ledger(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let result = dispatch(&state.earnings_channel, SERVICE, |response| {
        EarningsRequest::GetLedger {
            user_id: user_id.clone(),
            response,
        }
    })
    .await;

    match result {
        Ok(Some(ledger)) => (StatusCode::OK, Json(json!(ledger))),
        Ok(None) => error_response(ServiceError::NotFound(format!(
            "{}/{}",
            earnings::COLLECTION,
            user_id
        ))),
        Err(e) => error_response(e),
    }
}
