use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use chirp_shared::errors::{AppError, AppResult, ErrorCode};
use chirp_shared::types::{ApiResponse, TokenPair};

use crate::routes::parse_date_of_birth;
use crate::services::users::RegisterInput;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: String,
    #[validate(length(min = 6, max = 50, message = "password must be 6-50 characters"))]
    pub password: String,
    pub confirm_password: String,
    pub date_of_birth: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;
    if req.password != req.confirm_password {
        return Err(AppError::new(
            ErrorCode::ValidationError,
            "confirm_password does not match password",
        ));
    }
    let date_of_birth = parse_date_of_birth(&req.date_of_birth)?;

    let pair = state
        .users
        .register(RegisterInput {
            email: req.email.to_lowercase(),
            name: req.name,
            password: req.password,
            date_of_birth,
        })
        .await?;

    Ok(Json(ApiResponse::ok_with_message(pair, "register success")))
}
