use bson::doc;
use bson::oid::ObjectId;
use mongodb::options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};

use chirp_shared::errors::AppError;

use crate::models::{RefreshTokenDoc, UserDoc, UserUpdate};

/// Which inline single-use token field a lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingToken {
    EmailVerify,
    PasswordReset,
}

impl PendingToken {
    fn field(self) -> &'static str {
        match self {
            PendingToken::EmailVerify => "email_verify_token",
            PendingToken::PasswordReset => "forgot_password_token",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    Duplicate,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_duplicate_key(&err) {
            StoreError::Duplicate
        } else {
            StoreError::Backend(err.into())
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            // Callers with a unique-sensitive write intercept Duplicate
            // themselves; this arm is the fallback.
            StoreError::Duplicate => AppError::bad_request("duplicate value for a unique field"),
            StoreError::Backend(e) => AppError::Internal(e),
        }
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == 11000,
        ErrorKind::Command(e) => e.code == 11000,
        _ => false,
    }
}

/// The credential-store contract consumed by the session manager. Lookups
/// against a missing id/token are `None`, never errors.
pub(crate) trait UserStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDoc>, StoreError>;
    async fn find_user_by_id(&self, id: ObjectId) -> Result<Option<UserDoc>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserDoc>, StoreError>;
    async fn find_user_by_email_and_password(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<UserDoc>, StoreError>;
    async fn find_user_by_id_and_password(
        &self,
        id: ObjectId,
        password_hash: &str,
    ) -> Result<Option<UserDoc>, StoreError>;
    async fn find_user_by_pending_token(
        &self,
        id: ObjectId,
        kind: PendingToken,
        token: &str,
    ) -> Result<Option<UserDoc>, StoreError>;
    async fn insert_user(&self, user: UserDoc) -> Result<(), StoreError>;
    /// Atomic partial update; returns the post-update document.
    async fn update_user(
        &self,
        id: ObjectId,
        update: UserUpdate,
    ) -> Result<Option<UserDoc>, StoreError>;
    async fn find_refresh_token(
        &self,
        user_id: ObjectId,
        token: &str,
    ) -> Result<Option<RefreshTokenDoc>, StoreError>;
    async fn insert_refresh_token(&self, record: RefreshTokenDoc) -> Result<(), StoreError>;
    /// Conditional delete: reports whether a record actually existed.
    async fn delete_refresh_token(&self, token: &str) -> Result<bool, StoreError>;
}

#[derive(Clone)]
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn users(&self) -> Collection<UserDoc> {
        self.db.collection("users")
    }

    fn refresh_tokens(&self) -> Collection<RefreshTokenDoc> {
        self.db.collection("refresh_tokens")
    }

    /// Unique indexes on email/username are the authoritative duplicate
    /// guard; service-level pre-checks are an optimization only.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let unique = |keys: bson::Document| {
            IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().unique(true).build())
                .build()
        };

        self.users().create_index(unique(doc! { "email": 1 }), None).await?;
        self.users().create_index(unique(doc! { "username": 1 }), None).await?;
        self.refresh_tokens()
            .create_index(IndexModel::builder().keys(doc! { "token": 1 }).build(), None)
            .await?;
        self.refresh_tokens()
            .create_index(IndexModel::builder().keys(doc! { "user_id": 1 }).build(), None)
            .await?;

        Ok(())
    }
}

impl UserStore for MongoStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserDoc>, StoreError> {
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    async fn find_user_by_id(&self, id: ObjectId) -> Result<Option<UserDoc>, StoreError> {
        Ok(self.users().find_one(doc! { "_id": id }, None).await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<UserDoc>, StoreError> {
        Ok(self.users().find_one(doc! { "username": username }, None).await?)
    }

    async fn find_user_by_email_and_password(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<UserDoc>, StoreError> {
        Ok(self
            .users()
            .find_one(doc! { "email": email, "password": password_hash }, None)
            .await?)
    }

    async fn find_user_by_id_and_password(
        &self,
        id: ObjectId,
        password_hash: &str,
    ) -> Result<Option<UserDoc>, StoreError> {
        Ok(self
            .users()
            .find_one(doc! { "_id": id, "password": password_hash }, None)
            .await?)
    }

    async fn find_user_by_pending_token(
        &self,
        id: ObjectId,
        kind: PendingToken,
        token: &str,
    ) -> Result<Option<UserDoc>, StoreError> {
        let mut filter = doc! { "_id": id };
        filter.insert(kind.field(), token);
        Ok(self.users().find_one(filter, None).await?)
    }

    async fn insert_user(&self, user: UserDoc) -> Result<(), StoreError> {
        self.users().insert_one(user, None).await?;
        Ok(())
    }

    async fn update_user(
        &self,
        id: ObjectId,
        update: UserUpdate,
    ) -> Result<Option<UserDoc>, StoreError> {
        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();
        Ok(self
            .users()
            .find_one_and_update(doc! { "_id": id }, update.into_set_document(), options)
            .await?)
    }

    async fn find_refresh_token(
        &self,
        user_id: ObjectId,
        token: &str,
    ) -> Result<Option<RefreshTokenDoc>, StoreError> {
        Ok(self
            .refresh_tokens()
            .find_one(doc! { "user_id": user_id, "token": token }, None)
            .await?)
    }

    async fn insert_refresh_token(&self, record: RefreshTokenDoc) -> Result<(), StoreError> {
        self.refresh_tokens().insert_one(record, None).await?;
        Ok(())
    }

    async fn delete_refresh_token(&self, token: &str) -> Result<bool, StoreError> {
        let result = self
            .refresh_tokens()
            .delete_one(doc! { "token": token }, None)
            .await?;
        Ok(result.deleted_count == 1)
    }
}
