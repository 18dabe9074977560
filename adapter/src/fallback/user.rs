use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kernel::model::{id::UserId, user::User};
use kernel::repository::user::UserRepository;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult};

use crate::fallback::JsonFile;

pub(crate) const USERS_FILE: &str = "fallback_users.json";

// フォールバックファイル上のユーザーレコード
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_active: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserRecord {
    fn from(value: &User) -> Self {
        Self {
            id: value.id.as_str().to_string(),
            name: value.name.clone(),
            email: value.email.clone(),
            password_hash: value.password_hash.clone(),
            is_active: value.is_active,
            is_admin: value.is_admin,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<UserRecord> for User {
    fn from(value: UserRecord) -> Self {
        let UserRecord {
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
            id: UserId::from_raw(id),
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

pub struct FallbackUserRepositoryImpl {
    file: JsonFile<UserRecord>,
}

impl FallbackUserRepositoryImpl {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            file: JsonFile::new(data_dir.as_ref().join(USERS_FILE)),
        }
    }
}

#[async_trait]
impl UserRepository for FallbackUserRepositoryImpl {
    async fn insert(&self, user: &User) -> AppResult<User> {
        let record = UserRecord::from(user);
        // 自然キーはメール。既にあれば位置を保ったまま置き換える
        self.file
            .with_records(|records| {
                match records.iter_mut().find(|r| r.email == record.email) {
                    Some(existing) => *existing = record,
                    None => records.push(record),
                }
            })
            .await?;
        Ok(user.clone())
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<User>> {
        Ok(self
            .file
            .load()
            .await
            .into_iter()
            .find(|r| r.id == user_id.as_str())
            .map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        Ok(self
            .file
            .load()
            .await
            .into_iter()
            .find(|r| r.email == email)
            .map(User::from))
    }

    async fn find_all(&self) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self.file.load().await.into_iter().map(User::from).collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn update(&self, user: &User) -> AppResult<()> {
        let record = UserRecord::from(user);
        let found = self
            .file
            .with_records(|records| match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => {
                    *existing = record;
                    true
                }
                None => false,
            })
            .await?;
        if !found {
            return Err(AppError::EntityNotFound("user not found".into()));
        }
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> AppResult<()> {
        let found = self
            .file
            .with_records(|records| {
                let before = records.len();
                records.retain(|r| r.id != user_id.as_str());
                records.len() < before
            })
            .await?;
        if !found {
            return Err(AppError::EntityNotFound("user not found".into()));
        }
        Ok(())
    }

    async fn count(&self) -> AppResult<u64> {
        Ok(self.file.load().await.len() as u64)
    }
}
