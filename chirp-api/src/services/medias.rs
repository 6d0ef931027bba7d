use std::path::PathBuf;

use axum::extract::Multipart;
use uuid::Uuid;

use chirp_shared::errors::{AppError, ErrorCode};
use chirp_shared::types::{Media, MediaType};

const MAX_IMAGE_FILES: usize = 4;
const MAX_IMAGE_BYTES: usize = 300 * 1024;
const MAX_VIDEO_BYTES: usize = 50 * 1024 * 1024;

/// Media ingestion: multipart filtering, size caps, and persistence to the
/// local upload directories served under `/static`.
pub struct MediasService {
    image_dir: PathBuf,
    video_dir: PathBuf,
    base_url: String,
}

impl MediasService {
    pub fn new(image_dir: PathBuf, video_dir: PathBuf, base_url: impl Into<String>) -> Self {
        Self {
            image_dir,
            video_dir,
            base_url: base_url.into(),
        }
    }

    pub async fn ensure_dirs(&self) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.image_dir).await?;
        tokio::fs::create_dir_all(&self.video_dir).await?;
        Ok(())
    }

    pub async fn handle_image_upload(&self, mut multipart: Multipart) -> Result<Vec<Media>, AppError> {
        let mut media = Vec::new();

        while let Some(field) = multipart.next_field().await.map_err(read_error)? {
            if field.name() != Some("image") {
                return Err(AppError::new(ErrorCode::FileTypeInvalid, "file type is not valid"));
            }
            if media.len() >= MAX_IMAGE_FILES {
                return Err(AppError::bad_request(format!(
                    "at most {MAX_IMAGE_FILES} images per upload"
                )));
            }

            let content_type = field.content_type().unwrap_or_default().to_string();
            let ext = image_extension(&content_type).ok_or_else(|| {
                AppError::new(ErrorCode::FileTypeInvalid, "file type is not valid")
            })?;

            let data = field.bytes().await.map_err(read_error)?;
            if data.len() > MAX_IMAGE_BYTES {
                return Err(AppError::new(
                    ErrorCode::FileTooLarge,
                    format!("image exceeds {MAX_IMAGE_BYTES} bytes"),
                ));
            }

            let filename = format!("{}.{ext}", Uuid::now_v7());
            let path = self.image_dir.join(&filename);
            tokio::fs::write(&path, &data).await.map_err(|e| {
                AppError::new(ErrorCode::UploadFailed, format!("failed to store image: {e}"))
            })?;

            tracing::info!(file = %filename, bytes = data.len(), "image uploaded");
            media.push(Media {
                url: format!("{}/static/image/{filename}", self.base_url),
                media_type: MediaType::Image,
            });
        }

        if media.is_empty() {
            return Err(AppError::new(ErrorCode::FileMissing, "image is empty"));
        }
        Ok(media)
    }

    pub async fn handle_video_upload(&self, mut multipart: Multipart) -> Result<Vec<Media>, AppError> {
        let mut media = Vec::new();

        while let Some(field) = multipart.next_field().await.map_err(read_error)? {
            if field.name() != Some("video") {
                return Err(AppError::new(ErrorCode::FileTypeInvalid, "file type is not valid"));
            }
            if !media.is_empty() {
                return Err(AppError::bad_request("at most one video per upload"));
            }

            let content_type = field.content_type().unwrap_or_default().to_string();
            let ext = video_extension(&content_type).ok_or_else(|| {
                AppError::new(ErrorCode::FileTypeInvalid, "file type is not valid")
            })?;

            let data = field.bytes().await.map_err(read_error)?;
            if data.len() > MAX_VIDEO_BYTES {
                return Err(AppError::new(
                    ErrorCode::FileTooLarge,
                    format!("video exceeds {MAX_VIDEO_BYTES} bytes"),
                ));
            }

            let filename = format!("{}.{ext}", Uuid::now_v7());
            let path = self.video_dir.join(&filename);
            tokio::fs::write(&path, &data).await.map_err(|e| {
                AppError::new(ErrorCode::UploadFailed, format!("failed to store video: {e}"))
            })?;

            tracing::info!(file = %filename, bytes = data.len(), "video uploaded");
            media.push(Media {
                url: format!("{}/static/video/{filename}", self.base_url),
                media_type: MediaType::Video,
            });
        }

        if media.is_empty() {
            return Err(AppError::new(ErrorCode::FileMissing, "video is empty"));
        }
        Ok(media)
    }
}

fn read_error(err: axum::extract::multipart::MultipartError) -> AppError {
    AppError::bad_request(format!("failed to read multipart body: {err}"))
}

fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

fn video_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "video/mp4" => Some("mp4"),
        "video/webm" => Some("webm"),
        "video/quicktime" => Some("mov"),
        "video/x-matroska" => Some("mkv"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_extensions_cover_supported_types() {
        assert_eq!(image_extension("image/jpeg"), Some("jpg"));
        assert_eq!(image_extension("image/png"), Some("png"));
        assert_eq!(image_extension("image/webp"), Some("webp"));
        assert_eq!(image_extension("image/gif"), Some("gif"));
        assert_eq!(image_extension("video/mp4"), None);
        assert_eq!(image_extension("application/octet-stream"), None);
        assert_eq!(image_extension(""), None);
    }

    #[test]
    fn video_extensions_cover_supported_types() {
        assert_eq!(video_extension("video/mp4"), Some("mp4"));
        assert_eq!(video_extension("video/webm"), Some("webm"));
        assert_eq!(video_extension("video/quicktime"), Some("mov"));
        assert_eq!(video_extension("image/png"), None);
    }
}
