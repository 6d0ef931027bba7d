use std::sync::Arc;

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// The four token classes issued by the backend. Each class is signed with
/// its own secret and carries its own lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClass {
    Access,
    Refresh,
    EmailVerification,
    ForgotPassword,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject user id (ObjectId hex).
    pub sub: String,
    pub token_class: TokenClass,
    pub iat: i64,
    pub exp: i64,
    /// Unique per issuance, so two tokens for the same subject in the same
    /// second are still distinct strings.
    pub jti: Uuid,
}

#[derive(Debug, Clone)]
pub struct ClassKey {
    pub secret: String,
    pub ttl_secs: i64,
}

/// Per-class signing configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct TokenCodecConfig {
    pub access: ClassKey,
    pub refresh: ClassKey,
    pub email_verification: ClassKey,
    pub forgot_password: ClassKey,
}

/// Expected verification failures. Callers branch on the variant; nothing
/// here is a panic or a 500.
#[derive(Debug, thiserror::Error)]
pub enum TokenVerifyError {
    #[error("token has expired")]
    Expired,
    #[error("token is invalid")]
    Invalid,
}

#[derive(Clone)]
pub struct TokenCodec {
    config: Arc<TokenCodecConfig>,
}

impl TokenCodec {
    pub fn new(config: TokenCodecConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    fn class_key(&self, class: TokenClass) -> &ClassKey {
        match class {
            TokenClass::Access => &self.config.access,
            TokenClass::Refresh => &self.config.refresh,
            TokenClass::EmailVerification => &self.config.email_verification,
            TokenClass::ForgotPassword => &self.config.forgot_password,
        }
    }

    pub fn ttl_secs(&self, class: TokenClass) -> i64 {
        self.class_key(class).ttl_secs
    }

    /// Sign an expiring envelope for `subject` under `class`. Encoding only
    /// fails on a broken signing backend, which surfaces as a 500.
    pub fn sign(&self, subject: &str, class: TokenClass) -> Result<String, AppError> {
        let key = self.class_key(class);
        let now = Utc::now().timestamp();
        let claims = TokenClaims {
            sub: subject.to_string(),
            token_class: class,
            iat: now,
            exp: now + key.ttl_secs,
            jti: Uuid::now_v7(),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(key.secret.as_bytes()),
        )
        .map_err(|e| AppError::internal(format!("JWT encoding failed: {e}")))
    }

    /// Check signature and expiry with the secret bound to `class`. The
    /// embedded class tag must match as well, so a token signed for one
    /// class never verifies as another even if two classes share a secret.
    pub fn verify(&self, token: &str, class: TokenClass) -> Result<TokenClaims, TokenVerifyError> {
        let key = self.class_key(class);
        let data = decode::<TokenClaims>(
            token,
            &DecodingKey::from_secret(key.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenVerifyError::Expired,
            _ => TokenVerifyError::Invalid,
        })?;

        if data.claims.token_class != class {
            return Err(TokenVerifyError::Invalid);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_codec() -> TokenCodec {
        TokenCodec::new(TokenCodecConfig {
            access: ClassKey {
                secret: "access-secret".into(),
                ttl_secs: 900,
            },
            refresh: ClassKey {
                secret: "refresh-secret".into(),
                ttl_secs: 3600,
            },
            email_verification: ClassKey {
                secret: "email-verify-secret".into(),
                ttl_secs: 3600,
            },
            forgot_password: ClassKey {
                secret: "forgot-password-secret".into(),
                ttl_secs: 900,
            },
        })
    }

    const ALL_CLASSES: [TokenClass; 4] = [
        TokenClass::Access,
        TokenClass::Refresh,
        TokenClass::EmailVerification,
        TokenClass::ForgotPassword,
    ];

    #[test]
    fn roundtrip_every_class() {
        let codec = test_codec();
        for class in ALL_CLASSES {
            let token = codec.sign("65f0a1b2c3d4e5f6a7b8c9d0", class).unwrap();
            let claims = codec.verify(&token, class).unwrap();
            assert_eq!(claims.sub, "65f0a1b2c3d4e5f6a7b8c9d0");
            assert_eq!(claims.token_class, class);
            assert!(claims.exp > claims.iat);
        }
    }

    #[test]
    fn every_issuance_is_a_distinct_string() {
        let codec = test_codec();
        let a = codec.sign("abc", TokenClass::Refresh).unwrap();
        let b = codec.sign("abc", TokenClass::Refresh).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn cross_class_verification_fails() {
        let codec = test_codec();
        for signed_as in ALL_CLASSES {
            let token = codec.sign("65f0a1b2c3d4e5f6a7b8c9d0", signed_as).unwrap();
            for verified_as in ALL_CLASSES {
                if verified_as == signed_as {
                    continue;
                }
                assert!(
                    matches!(
                        codec.verify(&token, verified_as),
                        Err(TokenVerifyError::Invalid)
                    ),
                    "{signed_as:?} token verified as {verified_as:?}"
                );
            }
        }
    }

    #[test]
    fn shared_secret_still_rejects_wrong_class() {
        let key = ClassKey {
            secret: "one-secret-for-everything".into(),
            ttl_secs: 3600,
        };
        let codec = TokenCodec::new(TokenCodecConfig {
            access: key.clone(),
            refresh: key.clone(),
            email_verification: key.clone(),
            forgot_password: key,
        });

        let token = codec.sign("abc", TokenClass::Access).unwrap();
        assert!(codec.verify(&token, TokenClass::Access).is_ok());
        assert!(matches!(
            codec.verify(&token, TokenClass::Refresh),
            Err(TokenVerifyError::Invalid)
        ));
    }

    #[test]
    fn expired_token_reports_expired() {
        let codec = TokenCodec::new(TokenCodecConfig {
            access: ClassKey {
                secret: "access-secret".into(),
                // past the default 60s decode leeway
                ttl_secs: -120,
            },
            refresh: ClassKey {
                secret: "refresh-secret".into(),
                ttl_secs: 3600,
            },
            email_verification: ClassKey {
                secret: "email-verify-secret".into(),
                ttl_secs: 3600,
            },
            forgot_password: ClassKey {
                secret: "forgot-password-secret".into(),
                ttl_secs: 3600,
            },
        });

        let token = codec.sign("abc", TokenClass::Access).unwrap();
        assert!(matches!(
            codec.verify(&token, TokenClass::Access),
            Err(TokenVerifyError::Expired)
        ));
    }

    #[test]
    fn garbage_is_invalid() {
        let codec = test_codec();
        assert!(matches!(
            codec.verify("not-a-jwt", TokenClass::Access),
            Err(TokenVerifyError::Invalid)
        ));
        assert!(matches!(
            codec.verify("", TokenClass::Refresh),
            Err(TokenVerifyError::Invalid)
        ));
    }
}
