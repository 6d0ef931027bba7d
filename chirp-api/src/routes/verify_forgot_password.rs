use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use chirp_shared::errors::AppResult;
use chirp_shared::token::TokenClass;
use chirp_shared::types::ApiResponse;

use crate::extract::verify_subject;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyForgotPasswordRequest {
    pub forgot_password_token: String,
}

/// Lets the frontend confirm a reset link is still usable before showing the
/// new-password form.
pub async fn verify_forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyForgotPasswordRequest>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    let user_id = verify_subject(
        &state.codec,
        &req.forgot_password_token,
        TokenClass::ForgotPassword,
    )?;
    state
        .users
        .verify_forgot_password_token(user_id, &req.forgot_password_token)
        .await?;
    Ok(Json(ApiResponse::ok("verify forgot password token success")))
}
