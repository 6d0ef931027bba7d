use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use chirp_shared::errors::AppResult;
use chirp_shared::types::{ApiResponse, TokenPair};

use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    let pair = state.users.login(&req.email.to_lowercase(), &req.password).await?;
    Ok(Json(ApiResponse::ok_with_message(pair, "login success")))
}
