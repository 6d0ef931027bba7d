use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use validator::Validate;

use chirp_shared::errors::{AppError, AppResult, ErrorCode};
use chirp_shared::types::ApiResponse;

use crate::extract::AccessUser;
use crate::models::UserView;
use crate::routes::parse_date_of_birth;
use crate::services::users::UpdateMeInput;
use crate::AppState;

pub async fn get_me(
    user: AccessUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<UserView>>> {
    let view = state.users.get_me(user.id).await?;
    Ok(Json(ApiResponse::ok_with_message(view, "get profile success")))
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMeRequest {
    #[validate(length(min = 1, max = 100, message = "name must be 1-100 characters"))]
    pub name: Option<String>,
    pub date_of_birth: Option<String>,
    #[validate(length(max = 200, message = "bio must be at most 200 characters"))]
    pub bio: Option<String>,
    #[validate(length(max = 200, message = "location must be at most 200 characters"))]
    pub location: Option<String>,
    #[validate(url(message = "website must be a valid URL"))]
    pub website: Option<String>,
    #[validate(length(min = 1, max = 50, message = "username must be 1-50 characters"))]
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub cover_photo: Option<String>,
}

pub async fn update_me(
    user: AccessUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateMeRequest>,
) -> AppResult<Json<ApiResponse<UserView>>> {
    req.validate()
        .map_err(|e| AppError::new(ErrorCode::ValidationError, e.to_string()))?;

    let date_of_birth = req
        .date_of_birth
        .as_deref()
        .map(parse_date_of_birth)
        .transpose()?;

    let view = state
        .users
        .update_me(
            user.id,
            UpdateMeInput {
                name: req.name,
                date_of_birth,
                bio: req.bio,
                location: req.location,
                website: req.website,
                username: req.username,
                avatar: req.avatar,
                cover_photo: req.cover_photo,
            },
        )
        .await?;

    Ok(Json(ApiResponse::ok_with_message(view, "update profile success")))
}
