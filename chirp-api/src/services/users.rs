use bson::oid::ObjectId;
use bson::DateTime;
use chrono::Utc;
use sha2::{Digest, Sha256};

use chirp_shared::clients::email::EmailClient;
use chirp_shared::errors::{AppError, ErrorCode};
use chirp_shared::token::{TokenClass, TokenCodec};
use chirp_shared::types::TokenPair;

use crate::models::{RefreshTokenDoc, UserDoc, UserUpdate, UserView, UserVerifyStatus};
use crate::store::{PendingToken, StoreError, UserStore};

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub name: String,
    pub password: String,
    pub date_of_birth: chrono::DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMeInput {
    pub name: Option<String>,
    pub date_of_birth: Option<chrono::DateTime<Utc>>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub cover_photo: Option<String>,
}

/// Outcome of a verify-email call. The short-circuit variants performed no
/// mutation; callers (and tests) can tell them apart from the real
/// transition.
#[derive(Debug)]
pub enum EmailVerifyOutcome {
    Verified(TokenPair),
    AlreadyVerified,
    Banned,
}

/// Outcome of a resend-verification call, same shape as above.
#[derive(Debug, PartialEq, Eq)]
pub enum ResendVerifyOutcome {
    Sent,
    AlreadyVerified,
    Banned,
}

/// The session manager: every account/session state transition goes through
/// here. Signature checks are the request gate's job; this layer re-validates
/// tokens against persisted state where the transition demands it.
pub struct UsersService<S> {
    store: S,
    codec: TokenCodec,
    mailer: EmailClient,
    pepper: String,
    client_url: String,
}

impl<S: UserStore> UsersService<S> {
    pub fn new(
        store: S,
        codec: TokenCodec,
        mailer: EmailClient,
        pepper: impl Into<String>,
        client_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            codec,
            mailer,
            pepper: pepper.into(),
            client_url: client_url.into(),
        }
    }

    /// Peppered SHA-256 digest. Deterministic on purpose: the store contract
    /// looks users up by exact (email, hash) and (id, hash) pairs.
    fn hash_password(&self, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(password.as_bytes());
        hasher.update(self.pepper.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Sign an access/refresh pair and persist the refresh capability.
    async fn issue_token_pair(&self, user_id: ObjectId) -> Result<TokenPair, AppError> {
        let subject = user_id.to_hex();
        let access_token = self.codec.sign(&subject, TokenClass::Access)?;
        let refresh_token = self.codec.sign(&subject, TokenClass::Refresh)?;

        self.store
            .insert_refresh_token(RefreshTokenDoc {
                id: ObjectId::new(),
                token: refresh_token.clone(),
                user_id,
                created_at: DateTime::now(),
            })
            .await?;

        Ok(TokenPair::new(
            access_token,
            refresh_token,
            self.codec.ttl_secs(TokenClass::Access),
        ))
    }

    fn dispatch_verification_email(&self, to: &str, token: &str) {
        let mailer = self.mailer.clone();
        let to = to.to_string();
        let link = format!("{}/verify-email?email_verify_token={token}", self.client_url);
        tokio::spawn(async move {
            if let Err(e) = mailer.send_verification_link(&to, &link).await {
                tracing::error!(error = %e, "failed to send verification email");
            }
        });
    }

    fn dispatch_reset_email(&self, to: &str, token: &str) {
        let mailer = self.mailer.clone();
        let to = to.to_string();
        let link = format!("{}/reset-password?forgot_password_token={token}", self.client_url);
        tokio::spawn(async move {
            if let Err(e) = mailer.send_password_reset_link(&to, &link).await {
                tracing::error!(error = %e, "failed to send password reset email");
            }
        });
    }

    pub async fn register(&self, input: RegisterInput) -> Result<TokenPair, AppError> {
        if self.store.find_user_by_email(&input.email).await?.is_some() {
            return Err(AppError::new(
                ErrorCode::EmailAlreadyExists,
                "email already registered",
            ));
        }

        let user_id = ObjectId::new();
        let email_verify_token = self.codec.sign(&user_id.to_hex(), TokenClass::EmailVerification)?;
        let now = DateTime::now();

        let user = UserDoc {
            id: user_id,
            email: input.email.clone(),
            username: format!("user{}", user_id.to_hex()),
            password: self.hash_password(&input.password),
            verify: UserVerifyStatus::Unverified,
            email_verify_token: email_verify_token.clone(),
            forgot_password_token: String::new(),
            name: input.name,
            date_of_birth: DateTime::from_chrono(input.date_of_birth),
            bio: String::new(),
            location: String::new(),
            website: String::new(),
            avatar: String::new(),
            cover_photo: String::new(),
            created_at: now,
            updated_at: now,
        };

        // The unique index is the authoritative guard; the pre-check above
        // only exists to fail fast.
        match self.store.insert_user(user).await {
            Ok(()) => {}
            Err(StoreError::Duplicate) => {
                return Err(AppError::new(
                    ErrorCode::EmailAlreadyExists,
                    "email already registered",
                ))
            }
            Err(e) => return Err(e.into()),
        }

        let pair = self.issue_token_pair(user_id).await?;
        self.dispatch_verification_email(&input.email, &email_verify_token);

        tracing::info!(user_id = %user_id, "user registered");
        Ok(pair)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<TokenPair, AppError> {
        let hashed = self.hash_password(password);
        let user = self
            .store
            .find_user_by_email_and_password(email, &hashed)
            .await?
            .ok_or_else(|| {
                AppError::new(
                    ErrorCode::EmailOrPasswordIncorrect,
                    "email or password is incorrect",
                )
            })?;

        let pair = self.issue_token_pair(user.id).await?;
        tracing::info!(user_id = %user.id, "user logged in");
        Ok(pair)
    }

    /// The (user, token) refresh record must exist for the token to be used
    /// at all; shared precondition of logout and refresh.
    pub async fn check_refresh_token(&self, user_id: ObjectId, token: &str) -> Result<(), AppError> {
        self.store
            .find_refresh_token(user_id, token)
            .await?
            .map(|_| ())
            .ok_or_else(|| {
                AppError::new(ErrorCode::RefreshTokenInvalid, "refresh token is invalid")
            })
    }

    pub async fn logout(
        &self,
        access_subject: ObjectId,
        refresh_subject: ObjectId,
        refresh_token: &str,
    ) -> Result<(), AppError> {
        // A mixed pair (access token of one user, refresh token of another)
        // is never acceptable.
        if access_subject != refresh_subject {
            return Err(AppError::new(
                ErrorCode::RefreshTokenInvalid,
                "refresh token is invalid",
            ));
        }

        self.check_refresh_token(access_subject, refresh_token).await?;
        self.store.delete_refresh_token(refresh_token).await?;

        tracing::info!(user_id = %access_subject, "user logged out");
        Ok(())
    }

    pub async fn verify_email(
        &self,
        user_id: ObjectId,
        token: &str,
    ) -> Result<EmailVerifyOutcome, AppError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| {
                AppError::new(
                    ErrorCode::EmailVerifyTokenInvalid,
                    "email verify token is invalid",
                )
            })?;

        match user.verify {
            UserVerifyStatus::Verified => return Ok(EmailVerifyOutcome::AlreadyVerified),
            UserVerifyStatus::Banned => return Ok(EmailVerifyOutcome::Banned),
            UserVerifyStatus::Unverified => {}
        }

        // A token that no longer matches the pending field was consumed or
        // superseded by a resend.
        if user.email_verify_token != token {
            return Err(AppError::new(
                ErrorCode::EmailVerifyTokenInvalid,
                "email verify token is invalid",
            ));
        }

        self.store
            .update_user(
                user_id,
                UserUpdate {
                    verify: Some(UserVerifyStatus::Verified),
                    email_verify_token: Some(String::new()),
                    ..Default::default()
                },
            )
            .await?;

        // Convenience login: a freshly verified user gets a session.
        let pair = self.issue_token_pair(user_id).await?;
        tracing::info!(user_id = %user_id, "email verified");
        Ok(EmailVerifyOutcome::Verified(pair))
    }

    pub async fn resend_email_verify(
        &self,
        user_id: ObjectId,
    ) -> Result<ResendVerifyOutcome, AppError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

        match user.verify {
            UserVerifyStatus::Verified => return Ok(ResendVerifyOutcome::AlreadyVerified),
            UserVerifyStatus::Banned => return Ok(ResendVerifyOutcome::Banned),
            UserVerifyStatus::Unverified => {}
        }

        // Overwriting the pending field invalidates any previously mailed
        // token.
        let token = self.codec.sign(&user_id.to_hex(), TokenClass::EmailVerification)?;
        self.store
            .update_user(
                user_id,
                UserUpdate {
                    email_verify_token: Some(token.clone()),
                    ..Default::default()
                },
            )
            .await?;

        self.dispatch_verification_email(&user.email, &token);
        Ok(ResendVerifyOutcome::Sent)
    }

    pub async fn forgot_password(&self, email: &str) -> Result<(), AppError> {
        let user = self
            .store
            .find_user_by_email(email)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

        let token = self.codec.sign(&user.id.to_hex(), TokenClass::ForgotPassword)?;
        self.store
            .update_user(
                user.id,
                UserUpdate {
                    forgot_password_token: Some(token.clone()),
                    ..Default::default()
                },
            )
            .await?;

        self.dispatch_reset_email(&user.email, &token);
        tracing::info!(user_id = %user.id, "password reset requested");
        Ok(())
    }

    pub async fn verify_forgot_password_token(
        &self,
        user_id: ObjectId,
        token: &str,
    ) -> Result<(), AppError> {
        // an empty pending field means "nothing pending"; it must not match
        if token.is_empty() {
            return Err(AppError::new(
                ErrorCode::ForgotPasswordTokenInvalid,
                "forgot password token is invalid",
            ));
        }
        self.store
            .find_user_by_pending_token(user_id, PendingToken::PasswordReset, token)
            .await?
            .map(|_| ())
            .ok_or_else(|| {
                AppError::new(
                    ErrorCode::ForgotPasswordTokenInvalid,
                    "forgot password token is invalid",
                )
            })
    }

    pub async fn reset_password(
        &self,
        user_id: ObjectId,
        token: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        self.verify_forgot_password_token(user_id, token).await?;

        // One atomic update: new secret in, pending token out.
        self.store
            .update_user(
                user_id,
                UserUpdate {
                    password: Some(self.hash_password(new_password)),
                    forgot_password_token: Some(String::new()),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(user_id = %user_id, "password reset");
        Ok(())
    }

    pub async fn get_me(&self, user_id: ObjectId) -> Result<UserView, AppError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .map(UserView::from)
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))
    }

    pub async fn update_me(
        &self,
        user_id: ObjectId,
        input: UpdateMeInput,
    ) -> Result<UserView, AppError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

        if user.verify != UserVerifyStatus::Verified {
            return Err(AppError::new(ErrorCode::UserNotVerified, "user is not verified"));
        }

        if let Some(username) = &input.username {
            if let Some(existing) = self.store.find_user_by_username(username).await? {
                if existing.id != user_id {
                    return Err(AppError::new(
                        ErrorCode::UsernameAlreadyExists,
                        "username already exists",
                    ));
                }
            }
        }

        let update = UserUpdate {
            name: input.name,
            date_of_birth: input.date_of_birth.map(DateTime::from_chrono),
            bio: input.bio,
            location: input.location,
            website: input.website,
            username: input.username,
            avatar: input.avatar,
            cover_photo: input.cover_photo,
            ..Default::default()
        };

        match self.store.update_user(user_id, update).await {
            Ok(Some(updated)) => Ok(updated.into()),
            Ok(None) => Err(AppError::new(ErrorCode::UserNotFound, "user not found")),
            // The unique index catches a username race the pre-check missed.
            Err(StoreError::Duplicate) => Err(AppError::new(
                ErrorCode::UsernameAlreadyExists,
                "username already exists",
            )),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn change_password(
        &self,
        user_id: ObjectId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AppError> {
        // An (id, old-hash) miss means the caller does not own the account;
        // NotFound on purpose, so nothing about the account is confirmed.
        let hashed_old = self.hash_password(old_password);
        self.store
            .find_user_by_id_and_password(user_id, &hashed_old)
            .await?
            .ok_or_else(|| AppError::new(ErrorCode::UserNotFound, "user not found"))?;

        self.store
            .update_user(
                user_id,
                UserUpdate {
                    password: Some(self.hash_password(new_password)),
                    ..Default::default()
                },
            )
            .await?;

        tracing::info!(user_id = %user_id, "password changed");
        Ok(())
    }

    /// Rotate a refresh token. The conditional delete is the authoritative
    /// guard: of two concurrent rotations of the same token, only one
    /// observes the delete and mints a new pair.
    pub async fn refresh(&self, user_id: ObjectId, old_token: &str) -> Result<TokenPair, AppError> {
        if !self.store.delete_refresh_token(old_token).await? {
            return Err(AppError::new(
                ErrorCode::RefreshTokenInvalid,
                "refresh token is invalid",
            ));
        }

        let pair = self.issue_token_pair(user_id).await?;
        tracing::info!(user_id = %user_id, "refresh token rotated");
        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chirp_shared::token::{ClassKey, TokenCodecConfig};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemStore {
        users: Mutex<Vec<UserDoc>>,
        refresh_tokens: Mutex<Vec<RefreshTokenDoc>>,
    }

    impl MemStore {
        fn user(&self, id: ObjectId) -> Option<UserDoc> {
            self.users.lock().unwrap().iter().find(|u| u.id == id).cloned()
        }

        fn user_count(&self) -> usize {
            self.users.lock().unwrap().len()
        }

        fn refresh_count_for(&self, user_id: ObjectId) -> usize {
            self.refresh_tokens
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.user_id == user_id)
                .count()
        }
    }

    impl UserStore for MemStore {
        async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDoc>, StoreError> {
            Ok(self.users.lock().unwrap().iter().find(|u| u.email == email).cloned())
        }

        async fn find_user_by_id(&self, id: ObjectId) -> Result<Option<UserDoc>, StoreError> {
            Ok(self.user(id))
        }

        async fn find_user_by_username(
            &self,
            username: &str,
        ) -> Result<Option<UserDoc>, StoreError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.username == username)
                .cloned())
        }

        async fn find_user_by_email_and_password(
            &self,
            email: &str,
            password_hash: &str,
        ) -> Result<Option<UserDoc>, StoreError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.email == email && u.password == password_hash)
                .cloned())
        }

        async fn find_user_by_id_and_password(
            &self,
            id: ObjectId,
            password_hash: &str,
        ) -> Result<Option<UserDoc>, StoreError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| u.id == id && u.password == password_hash)
                .cloned())
        }

        async fn find_user_by_pending_token(
            &self,
            id: ObjectId,
            kind: PendingToken,
            token: &str,
        ) -> Result<Option<UserDoc>, StoreError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|u| {
                    u.id == id
                        && match kind {
                            PendingToken::EmailVerify => u.email_verify_token == token,
                            PendingToken::PasswordReset => u.forgot_password_token == token,
                        }
                })
                .cloned())
        }

        async fn insert_user(&self, user: UserDoc) -> Result<(), StoreError> {
            let mut users = self.users.lock().unwrap();
            if users.iter().any(|u| u.email == user.email || u.username == user.username) {
                return Err(StoreError::Duplicate);
            }
            users.push(user);
            Ok(())
        }

        async fn update_user(
            &self,
            id: ObjectId,
            update: UserUpdate,
        ) -> Result<Option<UserDoc>, StoreError> {
            let mut users = self.users.lock().unwrap();
            match users.iter_mut().find(|u| u.id == id) {
                Some(user) => {
                    update.apply(user);
                    Ok(Some(user.clone()))
                }
                None => Ok(None),
            }
        }

        async fn find_refresh_token(
            &self,
            user_id: ObjectId,
            token: &str,
        ) -> Result<Option<RefreshTokenDoc>, StoreError> {
            Ok(self
                .refresh_tokens
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.user_id == user_id && t.token == token)
                .cloned())
        }

        async fn insert_refresh_token(&self, record: RefreshTokenDoc) -> Result<(), StoreError> {
            self.refresh_tokens.lock().unwrap().push(record);
            Ok(())
        }

        async fn delete_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
            let mut tokens = self.refresh_tokens.lock().unwrap();
            let before = tokens.len();
            tokens.retain(|t| t.token != token);
            Ok(tokens.len() < before)
        }
    }

    fn test_service() -> UsersService<MemStore> {
        let codec = TokenCodec::new(TokenCodecConfig {
            access: ClassKey { secret: "access-secret".into(), ttl_secs: 900 },
            refresh: ClassKey { secret: "refresh-secret".into(), ttl_secs: 3600 },
            email_verification: ClassKey { secret: "ev-secret".into(), ttl_secs: 3600 },
            forgot_password: ClassKey { secret: "fp-secret".into(), ttl_secs: 900 },
        });
        let mailer = EmailClient::new("re_test_key", "noreply@test.dev", "chirp");
        UsersService::new(MemStore::default(), codec, mailer, "test-pepper", "http://localhost:8000")
    }

    fn register_input(email: &str, password: &str) -> RegisterInput {
        RegisterInput {
            email: email.into(),
            name: "Test User".into(),
            password: password.into(),
            date_of_birth: chrono::DateTime::parse_from_rfc3339("2000-01-02T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    fn error_code(err: &AppError) -> ErrorCode {
        match err {
            AppError::Known { code, .. } => *code,
            other => panic!("expected a known error, got {other:?}"),
        }
    }

    async fn registered_user(svc: &UsersService<MemStore>, email: &str, password: &str) -> ObjectId {
        svc.register(register_input(email, password)).await.unwrap();
        svc.store.find_user_by_email(email).await.unwrap().unwrap().id
    }

    #[test]
    fn password_hash_is_deterministic_and_peppered() {
        let svc = test_service();
        assert_eq!(svc.hash_password("p1"), svc.hash_password("p1"));
        assert_ne!(svc.hash_password("p1"), svc.hash_password("p2"));

        let other = UsersService::new(
            MemStore::default(),
            svc.codec.clone(),
            svc.mailer.clone(),
            "other-pepper",
            "http://localhost:8000",
        );
        assert_ne!(svc.hash_password("p1"), other.hash_password("p1"));
    }

    #[tokio::test]
    async fn register_issues_tokens_and_persists_user() {
        let svc = test_service();
        let pair = svc.register(register_input("a@x.com", "p1")).await.unwrap();
        assert_eq!(pair.token_type, "Bearer");

        let user = svc.store.find_user_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(user.verify, UserVerifyStatus::Unverified);
        assert_eq!(user.username, format!("user{}", user.id.to_hex()));
        assert!(!user.email_verify_token.is_empty());
        assert!(user.forgot_password_token.is_empty());
        assert_eq!(svc.store.refresh_count_for(user.id), 1);
        assert!(svc.store.find_refresh_token(user.id, &pair.refresh_token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email_without_writes() {
        let svc = test_service();
        svc.register(register_input("a@x.com", "p1")).await.unwrap();
        let user_id = svc.store.find_user_by_email("a@x.com").await.unwrap().unwrap().id;

        let err = svc.register(register_input("a@x.com", "p2")).await.unwrap_err();
        assert_eq!(error_code(&err), ErrorCode::EmailAlreadyExists);
        assert_eq!(svc.store.user_count(), 1);
        assert_eq!(svc.store.refresh_count_for(user_id), 1);
    }

    #[tokio::test]
    async fn login_persists_refresh_token() {
        let svc = test_service();
        let user_id = registered_user(&svc, "a@x.com", "p1").await;

        let pair = svc.login("a@x.com", "p1").await.unwrap();
        assert_eq!(svc.store.refresh_count_for(user_id), 2);
        assert!(svc.store.find_refresh_token(user_id, &pair.refresh_token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn login_failure_is_indistinguishable() {
        let svc = test_service();
        registered_user(&svc, "a@x.com", "p1").await;

        let wrong_password = svc.login("a@x.com", "nope").await.unwrap_err();
        let unknown_email = svc.login("b@x.com", "p1").await.unwrap_err();

        assert_eq!(error_code(&wrong_password), ErrorCode::EmailOrPasswordIncorrect);
        assert_eq!(error_code(&unknown_email), ErrorCode::EmailOrPasswordIncorrect);
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn logout_rejects_mixed_subjects_and_unknown_tokens() {
        let svc = test_service();
        let user_id = registered_user(&svc, "a@x.com", "p1").await;
        let other_id = ObjectId::new();

        let pair = svc.login("a@x.com", "p1").await.unwrap();

        let mixed = svc.logout(user_id, other_id, &pair.refresh_token).await.unwrap_err();
        assert_eq!(error_code(&mixed), ErrorCode::RefreshTokenInvalid);

        let unknown = svc.logout(user_id, user_id, "never-issued").await.unwrap_err();
        assert_eq!(error_code(&unknown), ErrorCode::RefreshTokenInvalid);

        svc.logout(user_id, user_id, &pair.refresh_token).await.unwrap();
        assert!(svc.store.find_refresh_token(user_id, &pair.refresh_token).await.unwrap().is_none());

        // deleting it once is enough; a second logout with the same token fails
        let again = svc.logout(user_id, user_id, &pair.refresh_token).await.unwrap_err();
        assert_eq!(error_code(&again), ErrorCode::RefreshTokenInvalid);
    }

    #[tokio::test]
    async fn verify_email_transitions_and_is_idempotent() {
        let svc = test_service();
        let user_id = registered_user(&svc, "a@x.com", "p1").await;
        let token = svc.store.user(user_id).unwrap().email_verify_token;

        let refresh_before = svc.store.refresh_count_for(user_id);
        let outcome = svc.verify_email(user_id, &token).await.unwrap();
        assert!(matches!(outcome, EmailVerifyOutcome::Verified(_)));

        let user = svc.store.user(user_id).unwrap();
        assert_eq!(user.verify, UserVerifyStatus::Verified);
        assert!(user.email_verify_token.is_empty());
        assert_eq!(svc.store.refresh_count_for(user_id), refresh_before + 1);

        // second call short-circuits: no mutation, no extra session
        let outcome = svc.verify_email(user_id, &token).await.unwrap();
        assert!(matches!(outcome, EmailVerifyOutcome::AlreadyVerified));
        assert_eq!(svc.store.refresh_count_for(user_id), refresh_before + 1);
    }

    #[tokio::test]
    async fn verify_email_rejects_superseded_token() {
        let svc = test_service();
        let user_id = registered_user(&svc, "a@x.com", "p1").await;
        let old_token = svc.store.user(user_id).unwrap().email_verify_token;

        assert_eq!(
            svc.resend_email_verify(user_id).await.unwrap(),
            ResendVerifyOutcome::Sent
        );
        let new_token = svc.store.user(user_id).unwrap().email_verify_token;
        assert_ne!(old_token, new_token);

        let err = svc.verify_email(user_id, &old_token).await.unwrap_err();
        assert_eq!(error_code(&err), ErrorCode::EmailVerifyTokenInvalid);
        assert_eq!(svc.store.user(user_id).unwrap().verify, UserVerifyStatus::Unverified);

        assert!(matches!(
            svc.verify_email(user_id, &new_token).await.unwrap(),
            EmailVerifyOutcome::Verified(_)
        ));
    }

    #[tokio::test]
    async fn banned_user_short_circuits_without_mutation() {
        let svc = test_service();
        let user_id = registered_user(&svc, "a@x.com", "p1").await;
        let token = svc.store.user(user_id).unwrap().email_verify_token;

        svc.store
            .update_user(
                user_id,
                UserUpdate {
                    verify: Some(UserVerifyStatus::Banned),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let refresh_before = svc.store.refresh_count_for(user_id);
        assert!(matches!(
            svc.verify_email(user_id, &token).await.unwrap(),
            EmailVerifyOutcome::Banned
        ));
        assert_eq!(
            svc.resend_email_verify(user_id).await.unwrap(),
            ResendVerifyOutcome::Banned
        );
        let user = svc.store.user(user_id).unwrap();
        assert_eq!(user.verify, UserVerifyStatus::Banned);
        assert_eq!(user.email_verify_token, token);
        assert_eq!(svc.store.refresh_count_for(user_id), refresh_before);
    }

    #[tokio::test]
    async fn resend_for_verified_user_is_a_noop() {
        let svc = test_service();
        let user_id = registered_user(&svc, "a@x.com", "p1").await;
        let token = svc.store.user(user_id).unwrap().email_verify_token;
        svc.verify_email(user_id, &token).await.unwrap();

        assert_eq!(
            svc.resend_email_verify(user_id).await.unwrap(),
            ResendVerifyOutcome::AlreadyVerified
        );
        assert!(svc.store.user(user_id).unwrap().email_verify_token.is_empty());
    }

    #[tokio::test]
    async fn forgot_password_then_reset_consumes_the_token() {
        let svc = test_service();
        let user_id = registered_user(&svc, "a@x.com", "p1").await;

        let unknown = svc.forgot_password("b@x.com").await.unwrap_err();
        assert_eq!(error_code(&unknown), ErrorCode::UserNotFound);

        svc.forgot_password("a@x.com").await.unwrap();
        let token = svc.store.user(user_id).unwrap().forgot_password_token;
        assert!(!token.is_empty());

        svc.verify_forgot_password_token(user_id, &token).await.unwrap();
        svc.reset_password(user_id, &token, "p2").await.unwrap();

        let user = svc.store.user(user_id).unwrap();
        assert!(user.forgot_password_token.is_empty());
        assert_eq!(user.password, svc.hash_password("p2"));
        svc.login("a@x.com", "p2").await.unwrap();

        // the cleared token cannot be replayed
        let replay = svc.reset_password(user_id, &token, "p3").await.unwrap_err();
        assert_eq!(error_code(&replay), ErrorCode::ForgotPasswordTokenInvalid);
        assert_eq!(svc.store.user(user_id).unwrap().password, svc.hash_password("p2"));
    }

    #[tokio::test]
    async fn change_password_requires_the_old_secret() {
        let svc = test_service();
        let user_id = registered_user(&svc, "a@x.com", "p1").await;

        svc.change_password(user_id, "p1", "p2").await.unwrap();
        assert_eq!(svc.store.user(user_id).unwrap().password, svc.hash_password("p2"));

        let err = svc.change_password(user_id, "wrong", "p3").await.unwrap_err();
        assert_eq!(error_code(&err), ErrorCode::UserNotFound);
        assert_eq!(svc.store.user(user_id).unwrap().password, svc.hash_password("p2"));
    }

    #[tokio::test]
    async fn refresh_rotates_and_invalidates_the_old_token() {
        let svc = test_service();
        let user_id = registered_user(&svc, "a@x.com", "p1").await;
        let pair = svc.login("a@x.com", "p1").await.unwrap();

        svc.check_refresh_token(user_id, &pair.refresh_token).await.unwrap();
        let rotated = svc.refresh(user_id, &pair.refresh_token).await.unwrap();
        assert_ne!(rotated.refresh_token, pair.refresh_token);

        // old token is gone for both refresh and logout
        let again = svc.refresh(user_id, &pair.refresh_token).await.unwrap_err();
        assert_eq!(error_code(&again), ErrorCode::RefreshTokenInvalid);
        let logout = svc.logout(user_id, user_id, &pair.refresh_token).await.unwrap_err();
        assert_eq!(error_code(&logout), ErrorCode::RefreshTokenInvalid);

        // register issued one record, login a second, rotation replaced the second
        assert_eq!(svc.store.refresh_count_for(user_id), 2);
        assert!(svc.store.find_refresh_token(user_id, &rotated.refresh_token).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn get_me_strips_sensitive_fields() {
        let svc = test_service();
        let user_id = registered_user(&svc, "a@x.com", "p1").await;

        let view = svc.get_me(user_id).await.unwrap();
        assert_eq!(view.email, "a@x.com");
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("email_verify_token").is_none());

        let missing = svc.get_me(ObjectId::new()).await.unwrap_err();
        assert_eq!(error_code(&missing), ErrorCode::UserNotFound);
    }

    #[tokio::test]
    async fn update_me_requires_verified_account() {
        let svc = test_service();
        let user_id = registered_user(&svc, "a@x.com", "p1").await;

        let input = UpdateMeInput {
            bio: Some("hello".into()),
            ..Default::default()
        };
        let err = svc.update_me(user_id, input.clone()).await.unwrap_err();
        assert_eq!(error_code(&err), ErrorCode::UserNotVerified);

        let token = svc.store.user(user_id).unwrap().email_verify_token;
        svc.verify_email(user_id, &token).await.unwrap();

        let view = svc.update_me(user_id, input).await.unwrap();
        assert_eq!(view.bio, "hello");
    }

    #[tokio::test]
    async fn update_me_enforces_username_uniqueness() {
        let svc = test_service();
        let alice = registered_user(&svc, "a@x.com", "p1").await;
        let bob = registered_user(&svc, "b@x.com", "p1").await;
        for id in [alice, bob] {
            let token = svc.store.user(id).unwrap().email_verify_token;
            svc.verify_email(id, &token).await.unwrap();
        }

        svc.update_me(
            alice,
            UpdateMeInput {
                username: Some("alice".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = svc
            .update_me(
                bob,
                UpdateMeInput {
                    username: Some("alice".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(error_code(&err), ErrorCode::UsernameAlreadyExists);

        // re-submitting your own username is not a conflict
        svc.update_me(
            alice,
            UpdateMeInput {
                username: Some("alice".into()),
                bio: Some("still me".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    }
}
