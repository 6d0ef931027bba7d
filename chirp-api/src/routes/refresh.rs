use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use chirp_shared::errors::AppResult;
use chirp_shared::token::TokenClass;
use chirp_shared::types::{ApiResponse, TokenPair};

use crate::extract::verify_subject;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    let user_id = verify_subject(&state.codec, &req.refresh_token, TokenClass::Refresh)?;

    // The signed token must also still be a live capability before rotation.
    state.users.check_refresh_token(user_id, &req.refresh_token).await?;
    let pair = state.users.refresh(user_id, &req.refresh_token).await?;

    Ok(Json(ApiResponse::ok_with_message(pair, "refresh token success")))
}
