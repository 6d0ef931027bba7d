use bson::oid::ObjectId;
use bson::DateTime;
use chrono::Utc;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerifyStatus {
    Unverified,
    Verified,
    Banned,
}

impl UserVerifyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserVerifyStatus::Unverified => "unverified",
            UserVerifyStatus::Verified => "verified",
            UserVerifyStatus::Banned => "banned",
        }
    }
}

impl std::fmt::Display for UserVerifyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user document. Pending single-use tokens live inline: the empty string
/// means "nothing pending".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub email: String,
    pub username: String,
    pub password: String,
    pub verify: UserVerifyStatus,
    pub email_verify_token: String,
    pub forgot_password_token: String,
    pub name: String,
    pub date_of_birth: DateTime,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub avatar: String,
    #[serde(default)]
    pub cover_photo: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// A persisted refresh-token capability. The token string is the signed
/// value itself; a refresh token is usable iff its record exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenDoc {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub token: String,
    pub user_id: ObjectId,
    pub created_at: DateTime,
}

/// Response projection of a user: everything except the hashed password and
/// the pending token fields.
#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: String,
    pub email: String,
    pub username: String,
    pub verify: UserVerifyStatus,
    pub name: String,
    pub date_of_birth: chrono::DateTime<Utc>,
    pub bio: String,
    pub location: String,
    pub website: String,
    pub avatar: String,
    pub cover_photo: String,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl From<UserDoc> for UserView {
    fn from(user: UserDoc) -> Self {
        Self {
            id: user.id.to_hex(),
            email: user.email,
            username: user.username,
            verify: user.verify,
            name: user.name,
            date_of_birth: user.date_of_birth.to_chrono(),
            bio: user.bio,
            location: user.location,
            website: user.website,
            avatar: user.avatar,
            cover_photo: user.cover_photo,
            created_at: user.created_at.to_chrono(),
            updated_at: user.updated_at.to_chrono(),
        }
    }
}

/// Partial update of a user document. Only the fields that are `Some` are
/// written; `updated_at` is always stamped.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub date_of_birth: Option<DateTime>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub cover_photo: Option<String>,
    pub password: Option<String>,
    pub verify: Option<UserVerifyStatus>,
    pub email_verify_token: Option<String>,
    pub forgot_password_token: Option<String>,
}

impl UserUpdate {
    /// Build the `$set` document for a MongoDB partial update.
    pub fn into_set_document(self) -> bson::Document {
        let mut set = bson::Document::new();
        if let Some(v) = self.name {
            set.insert("name", v);
        }
        if let Some(v) = self.date_of_birth {
            set.insert("date_of_birth", v);
        }
        if let Some(v) = self.bio {
            set.insert("bio", v);
        }
        if let Some(v) = self.location {
            set.insert("location", v);
        }
        if let Some(v) = self.website {
            set.insert("website", v);
        }
        if let Some(v) = self.username {
            set.insert("username", v);
        }
        if let Some(v) = self.avatar {
            set.insert("avatar", v);
        }
        if let Some(v) = self.cover_photo {
            set.insert("cover_photo", v);
        }
        if let Some(v) = self.password {
            set.insert("password", v);
        }
        if let Some(v) = self.verify {
            set.insert("verify", v.as_str());
        }
        if let Some(v) = self.email_verify_token {
            set.insert("email_verify_token", v);
        }
        if let Some(v) = self.forgot_password_token {
            set.insert("forgot_password_token", v);
        }
        set.insert("updated_at", DateTime::now());
        bson::doc! { "$set": set }
    }

    /// Apply the same partial update in-process. Used by in-memory stores.
    pub fn apply(self, user: &mut UserDoc) {
        if let Some(v) = self.name {
            user.name = v;
        }
        if let Some(v) = self.date_of_birth {
            user.date_of_birth = v;
        }
        if let Some(v) = self.bio {
            user.bio = v;
        }
        if let Some(v) = self.location {
            user.location = v;
        }
        if let Some(v) = self.website {
            user.website = v;
        }
        if let Some(v) = self.username {
            user.username = v;
        }
        if let Some(v) = self.avatar {
            user.avatar = v;
        }
        if let Some(v) = self.cover_photo {
            user.cover_photo = v;
        }
        if let Some(v) = self.password {
            user.password = v;
        }
        if let Some(v) = self.verify {
            user.verify = v;
        }
        if let Some(v) = self.email_verify_token {
            user.email_verify_token = v;
        }
        if let Some(v) = self.forgot_password_token {
            user.forgot_password_token = v;
        }
        user.updated_at = DateTime::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> UserDoc {
        UserDoc {
            id: ObjectId::new(),
            email: "a@x.com".into(),
            username: "usera".into(),
            password: "hashed".into(),
            verify: UserVerifyStatus::Unverified,
            email_verify_token: "pending".into(),
            forgot_password_token: String::new(),
            name: "A".into(),
            date_of_birth: DateTime::now(),
            bio: String::new(),
            location: String::new(),
            website: String::new(),
            avatar: String::new(),
            cover_photo: String::new(),
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }

    #[test]
    fn set_document_only_contains_supplied_fields() {
        let update = UserUpdate {
            bio: Some("hello".into()),
            verify: Some(UserVerifyStatus::Verified),
            ..Default::default()
        };
        let doc = update.into_set_document();
        let set = doc.get_document("$set").unwrap();

        assert_eq!(set.get_str("bio").unwrap(), "hello");
        assert_eq!(set.get_str("verify").unwrap(), "verified");
        assert!(set.get("updated_at").is_some());
        assert!(set.get("name").is_none());
        assert!(set.get("password").is_none());
    }

    #[test]
    fn apply_touches_only_supplied_fields() {
        let mut user = sample_user();
        let update = UserUpdate {
            username: Some("newname".into()),
            email_verify_token: Some(String::new()),
            ..Default::default()
        };
        update.apply(&mut user);

        assert_eq!(user.username, "newname");
        assert_eq!(user.email_verify_token, "");
        assert_eq!(user.email, "a@x.com");
        assert_eq!(user.password, "hashed");
    }

    #[test]
    fn view_strips_secret_and_pending_tokens() {
        let user = sample_user();
        let view = UserView::from(user.clone());
        let json = serde_json::to_value(&view).unwrap();

        assert!(json.get("password").is_none());
        assert!(json.get("email_verify_token").is_none());
        assert!(json.get("forgot_password_token").is_none());
        assert_eq!(json.get("email").unwrap(), "a@x.com");
        assert_eq!(json.get("id").unwrap(), &serde_json::json!(user.id.to_hex()));
    }

    #[test]
    fn verify_status_serializes_lowercase() {
        let json = serde_json::to_string(&UserVerifyStatus::Unverified).unwrap();
        assert_eq!(json, "\"unverified\"");
        assert_eq!(UserVerifyStatus::Banned.as_str(), "banned");
    }
}
