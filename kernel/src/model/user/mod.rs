// kernel/src/model/user/mod.rs
use chrono::{DateTime, Utc};

use crate::model::id::UserId;
pub mod event;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// イベントに埋め込む作成者のビュー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventCreator {
    pub id: UserId,
    pub name: String,
}

impl From<User> for EventCreator {
    fn from(value: User) -> Self {
        let User { id, name, .. } = value;
        Self { id, name }
    }
}
