use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use chirp_shared::errors::{AppError, AppResult, ErrorCode};
use chirp_shared::types::ApiResponse;

use crate::extract::AccessUser;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    #[validate(length(min = 6, max = 50, message = "password must be 6-50 characters"))]
    pub password: String,
    pub confirm_password: String,
}

pub async fn change_password(
    user: AccessUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;
    if req.password != req.confirm_password {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            "confirm_password does not match password",
        ));
    }

    state
        .users
        .change_password(user.id, &req.old_password, &req.password)
        .await?;
    Ok(Json(ApiResponse::ok("change password success")))
}
