use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post, put};
use axum::Router;
use bson::doc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

mod config;
mod extract;
mod models;
mod routes;
mod services;
mod store;

use chirp_shared::clients::email::EmailClient;
use chirp_shared::middleware::init_tracing;
use chirp_shared::token::TokenCodec;

use config::AppConfig;
use services::medias::MediasService;
use services::users::UsersService;
use store::MongoStore;

pub struct AppState {
    pub users: UsersService<MongoStore>,
    pub medias: MediasService,
    pub codec: TokenCodec,
}

// multipart framing overhead on top of the 50 MiB video cap
const UPLOAD_BODY_LIMIT: usize = 52 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("chirp-api");

    let config = AppConfig::load()?;
    let port = config.port;

    let client = mongodb::Client::with_uri_str(&config.mongodb_url).await?;
    let db = client.database(&config.db_name);
    db.run_command(doc! { "ping": 1 }, None).await?;
    tracing::info!(db = %config.db_name, "connected to mongodb");

    let store = MongoStore::new(db);
    store.ensure_indexes().await?;

    let codec = TokenCodec::new(config.token_codec_config());
    let mailer = EmailClient::new(&config.resend_api_key, &config.from_email, "chirp");
    let users = UsersService::new(
        store,
        codec.clone(),
        mailer,
        &config.password_pepper,
        &config.client_url,
    );
    let medias = MediasService::new(config.image_dir(), config.video_dir(), &config.base_url);
    medias.ensure_dirs().await?;

    let state = Arc::new(AppState { users, medias, codec });

    let user_routes = Router::new()
        .route("/register", post(routes::register::register))
        .route("/login", post(routes::login::login))
        .route("/logout", post(routes::logout::logout))
        .route("/verify-email", get(routes::verify_email::verify_email))
        .route("/resend-verify-email", post(routes::resend_verify_email::resend_verify_email))
        .route("/forgot-password", post(routes::forgot_password::forgot_password))
        .route("/verify-forgot-password", post(routes::verify_forgot_password::verify_forgot_password))
        .route("/reset-password", post(routes::reset_password::reset_password))
        .route("/refresh-token", post(routes::refresh::refresh_token))
        .route("/me", get(routes::me::get_me).patch(routes::me::update_me))
        .route("/change-password", put(routes::change_password::change_password));

    let media_routes = Router::new()
        .route("/upload-image", post(routes::medias::upload_image))
        .route("/upload-video", post(routes::medias::upload_video))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT));

    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/users", user_routes)
        .nest("/medias", media_routes)
        .nest_service("/static/image", ServeDir::new(config.image_dir()))
        .nest_service("/static/video", ServeDir::new(config.video_dir()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "chirp-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
