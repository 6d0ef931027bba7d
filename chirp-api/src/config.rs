use std::path::PathBuf;

use serde::Deserialize;

use chirp_shared::token::{ClassKey, TokenCodecConfig};

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_mongodb_url")]
    pub mongodb_url: String,
    #[serde(default = "default_db_name")]
    pub db_name: String,
    /// Public base URL of this service, used to build media links.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Frontend base URL, used to build the links sent in emails.
    #[serde(default = "default_client_url")]
    pub client_url: String,
    #[serde(default = "default_password_pepper")]
    pub password_pepper: String,
    #[serde(default = "default_resend_api_key")]
    pub resend_api_key: String,
    #[serde(default = "default_from_email")]
    pub from_email: String,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    #[serde(default = "default_jwt_secret_access")]
    pub jwt_secret_access: String,
    #[serde(default = "default_jwt_secret_refresh")]
    pub jwt_secret_refresh: String,
    #[serde(default = "default_jwt_secret_email_verify")]
    pub jwt_secret_email_verify: String,
    #[serde(default = "default_jwt_secret_forgot_password")]
    pub jwt_secret_forgot_password: String,
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: i64,
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: i64,
    #[serde(default = "default_email_verify_ttl")]
    pub email_verify_ttl_secs: i64,
    #[serde(default = "default_forgot_password_ttl")]
    pub forgot_password_ttl_secs: i64,
}

fn default_port() -> u16 { 3000 }
fn default_mongodb_url() -> String { "mongodb://localhost:27017".into() }
fn default_db_name() -> String { "chirp".into() }
fn default_base_url() -> String { "http://localhost:3000".into() }
fn default_client_url() -> String { "http://localhost:8000".into() }
fn default_password_pepper() -> String { "development-pepper-change-in-production".into() }
fn default_resend_api_key() -> String { "re_test_key".into() }
fn default_from_email() -> String { "noreply@chirp.dev".into() }
fn default_upload_dir() -> String { "uploads".into() }
fn default_jwt_secret_access() -> String { "development-access-secret".into() }
fn default_jwt_secret_refresh() -> String { "development-refresh-secret".into() }
fn default_jwt_secret_email_verify() -> String { "development-email-verify-secret".into() }
fn default_jwt_secret_forgot_password() -> String { "development-forgot-password-secret".into() }
fn default_access_ttl() -> i64 { 900 }
fn default_refresh_ttl() -> i64 { 2592000 }
fn default_email_verify_ttl() -> i64 { 604800 }
fn default_forgot_password_ttl() -> i64 { 900 }

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("CHIRP_API").separator("__"))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    pub fn token_codec_config(&self) -> TokenCodecConfig {
        TokenCodecConfig {
            access: ClassKey {
                secret: self.jwt_secret_access.clone(),
                ttl_secs: self.access_ttl_secs,
            },
            refresh: ClassKey {
                secret: self.jwt_secret_refresh.clone(),
                ttl_secs: self.refresh_ttl_secs,
            },
            email_verification: ClassKey {
                secret: self.jwt_secret_email_verify.clone(),
                ttl_secs: self.email_verify_ttl_secs,
            },
            forgot_password: ClassKey {
                secret: self.jwt_secret_forgot_password.clone(),
                ttl_secs: self.forgot_password_ttl_secs,
            },
        }
    }

    pub fn image_dir(&self) -> PathBuf {
        PathBuf::from(&self.upload_dir).join("images")
    }

    pub fn video_dir(&self) -> PathBuf {
        PathBuf::from(&self.upload_dir).join("videos")
    }
}
