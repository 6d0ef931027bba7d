use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use chirp_shared::errors::AppResult;
use chirp_shared::token::TokenClass;
use chirp_shared::types::ApiResponse;

use crate::extract::{verify_subject, AccessUser};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

pub async fn logout(
    user: AccessUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<LogoutRequest>,
) -> AppResult<Json<ApiResponse<&'static str>>> {
    let refresh_subject = verify_subject(&state.codec, &req.refresh_token, TokenClass::Refresh)?;
    state.users.logout(user.id, refresh_subject, &req.refresh_token).await?;
    Ok(Json(ApiResponse::ok("logout success")))
}
