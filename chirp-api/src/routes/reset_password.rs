use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use chirp_shared::errors::{AppError, AppResult, ErrorCode};
use chirp_shared::token::TokenClass;
use chirp_shared::types::ApiResponse;

use crate::extract::verify_subject;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    pub forgot_password_token: String,
    #[validate(length(min = 6, max = 50, message = "password must be 6-50 characters"))]
    pub password: String,
    pub confirm_password: String,
}

pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;
    if req.password != req.confirm_password {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            "confirm_password does not match password",
        ));
    }

    let user_id = verify_subject(
        &state.codec,
        &req.forgot_password_token,
        TokenClass::ForgotPassword,
    )?;
    state
        .users
        .reset_password(user_id, &req.forgot_password_token, &req.password)
        .await?;
    Ok(Json(ApiResponse::ok("reset password success")))
}
