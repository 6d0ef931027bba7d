use axum::Json;

use chirp_shared::types::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("chirp-api", env!("CARGO_PKG_VERSION")))
}
