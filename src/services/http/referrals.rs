use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::{dispatch, error_response, respond, AppState};
use crate::models::referrals::NewReferral;
use crate::services::referrals::ReferralRequest;

const SERVICE: &str = "ReferralService";

pub async fn register_referral(
    State(state): State<AppState>,
    Json(referral): Json<NewReferral>,
) -> impl IntoResponse {
    let NewReferral {
        parent_id,
        child_id,
    } = referral;

    let result = dispatch(&state.referral_channel, SERVICE, |response| {
        ReferralRequest::RegisterReferral {
            parent_id: parent_id.clone(),
            child_id: child_id.clone(),
            response,
        }
    })
    .await;

    match result {
        Ok(()) => (
            StatusCode::CREATED,
            Json(json!({ "parentId": parent_id, "childId": child_id })),
        ),
        Err(e) => error_response(e),
    }
}

/// Recomputes the user's level and returns the classification report.
pub async fn compute_level(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let result = dispatch(&state.referral_channel, SERVICE, |response| {
        ReferralRequest::ComputeLevel { user_id, response }
    })
    .await;

    respond(result, StatusCode::OK)
}
