use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::{dispatch, error_response, respond, AppState};
use crate::models::users::{self, NewUser};
use crate::services::{users::UserRequest, ServiceError};

const SERVICE: &str = "UserService";

pub async fn create_user(
    State(state): State<AppState>,
    Json(new_user): Json<NewUser>,
) -> impl IntoResponse {
    let result = dispatch(&state.user_channel, SERVICE, |response| {
        UserRequest::CreateUser { new_user, response }
    })
    .await;

    respond(result, StatusCode::CREATED)
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let result = dispatch(&state.user_channel, SERVICE, |response| UserRequest::GetUser {
        id: user_id.clone(),
        response,
    })
    .await;

    match result {
        Ok(Some(user)) => (StatusCode::OK, Json(json!(user))),
        Ok(None) => error_response(ServiceError::NotFound(format!(
            "{}/{}",
            users::COLLECTION,
            user_id
        ))),
        Err(e) => error_response(e),
    }
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let result = dispatch(&state.user_channel, SERVICE, |response| {
        UserRequest::DeactivateUser {
            id: user_id.clone(),
            response,
        }
    })
    .await;

    match result {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "id": user_id, "status": "deleted" })),
        ),
        Err(e) => error_response(e),
    }
}
