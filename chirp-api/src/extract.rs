use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use bson::oid::ObjectId;

use chirp_shared::errors::{AppError, ErrorCode};
use chirp_shared::token::{TokenClass, TokenCodec, TokenVerifyError};

use crate::AppState;

/// The authenticated subject of a request, extracted from the
/// `Authorization: Bearer` header and verified as an Access-class token.
#[derive(Debug, Clone, Copy)]
pub struct AccessUser {
    pub id: ObjectId,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AccessUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_bearer_token(&parts.headers)?;
        let id = verify_subject(&state.codec, &token, TokenClass::Access)?;
        Ok(AccessUser { id })
    }
}

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::unauthorized("missing authorization header"))?
        .to_str()
        .map_err(|_| AppError::unauthorized("invalid authorization header"))?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::to_string)
        .ok_or_else(|| AppError::unauthorized("authorization header must use Bearer scheme"))
}

/// Verify a token under `class` and parse its subject id. Used for the
/// header-carried access token and for tokens arriving in bodies/queries.
pub fn verify_subject(
    codec: &TokenCodec,
    token: &str,
    class: TokenClass,
) -> Result<ObjectId, AppError> {
    let claims = codec.verify(token, class).map_err(|e| match e {
        TokenVerifyError::Expired => AppError::new(ErrorCode::TokenExpired, "token has expired"),
        TokenVerifyError::Invalid => AppError::new(ErrorCode::TokenInvalid, "token is invalid"),
    })?;

    ObjectId::parse_str(&claims.sub)
        .map_err(|_| AppError::new(ErrorCode::TokenInvalid, "invalid token subject"))
}
