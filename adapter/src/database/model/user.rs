use chrono::{DateTime, Utc};
use kernel::model::{id::UserId, user::User};
use mongodb::bson::{oid::ObjectId, serde_helpers::chrono_datetime_as_bson_datetime};
use serde::{Deserialize, Serialize};
use shared::error::AppError;

use crate::database::object_id;

// users コレクションのドキュメント型。
// is_active と is_admin は古いレコードに無いことがあるので既定値を補う
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

fn default_is_active() -> bool {
    true
}

impl UserDocument {
    // 新規保存用。ID はこのストアで採番し直し、他のフィールドは写す
    pub fn from_new(user: &User) -> Self {
        Self {
            id: ObjectId::new(),
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            is_active: user.is_active,
            is_admin: user.is_admin,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// 既存レコードの置き換え用。ID は変えない
impl TryFrom<&User> for UserDocument {
    type Error = AppError;

    fn try_from(value: &User) -> Result<Self, Self::Error> {
        Ok(Self {
            id: object_id(value.id.as_str())?,
            name: value.name.clone(),
            email: value.email.clone(),
            password_hash: value.password_hash.clone(),
            is_active: value.is_active,
            is_admin: value.is_admin,
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

impl From<UserDocument> for User {
    fn from(value: UserDocument) -> Self {
        let UserDocument {
            id,
            name,
            email,
            password_hash,
            is_active,
            is_admin,
            created_at,
            updated_at,
        } = value;
        User {
            id: UserId::from_raw(id.to_hex()),
            name,
            email,
            password_hash,
            is_active,
            is_admin,
            created_at,
            updated_at,
        }
    }
}
