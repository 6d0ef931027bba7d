use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;

use chirp_shared::errors::AppResult;
use chirp_shared::types::{ApiResponse, Media};

use crate::AppState;

pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Vec<Media>>>> {
    let media = state.medias.handle_image_upload(multipart).await?;
    Ok(Json(ApiResponse::ok_with_message(media, "upload file successfully")))
}

pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<Vec<Media>>>> {
    let media = state.medias.handle_video_upload(multipart).await?;
    Ok(Json(ApiResponse::ok_with_message(media, "upload file successfully")))
}
