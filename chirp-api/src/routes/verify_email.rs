use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use chirp_shared::errors::AppResult;
use chirp_shared::token::TokenClass;
use chirp_shared::types::{ApiResponse, TokenPair};

use crate::extract::verify_subject;
use crate::services::users::EmailVerifyOutcome;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyEmailQuery {
    pub email_verify_token: String,
}

/// The link mailed at registration lands here, so the token arrives as a
/// query parameter.
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Query(query): Query<VerifyEmailQuery>,
) -> AppResult<Json<ApiResponse<Option<TokenPair>>>> {
    let user_id = verify_subject(
        &state.codec,
        &query.email_verify_token,
        TokenClass::EmailVerification,
    )?;

    let response = match state.users.verify_email(user_id, &query.email_verify_token).await? {
        EmailVerifyOutcome::Verified(pair) => {
            ApiResponse::ok_with_message(Some(pair), "verify email success")
        }
        EmailVerifyOutcome::AlreadyVerified => {
            ApiResponse::ok_with_message(None, "email has already been verified")
        }
        EmailVerifyOutcome::Banned => ApiResponse::ok_with_message(None, "email has been banned"),
    };
    Ok(Json(response))
}
