use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use chirp_shared::errors::AppResult;
use chirp_shared::types::ApiResponse;

use crate::extract::AccessUser;
use crate::services::users::ResendVerifyOutcome;
use crate::AppState;

pub async fn resend_verify_email(
    user: AccessUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    let response = match state.users.resend_email_verify(user.id).await? {
        ResendVerifyOutcome::Sent => ApiResponse::ok("resend verify email success"),
        ResendVerifyOutcome::AlreadyVerified => ApiResponse::ok("email has already been verified"),
        ResendVerifyOutcome::Banned => ApiResponse::ok("email has been banned"),
    };
    Ok(Json(response))
}
