use std::sync::Arc;

use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::Utc;
use derive_new::new;
use tracing::warn;

use crate::{
    model::{
        id::UserId,
        store::Served,
        user::{
            event::{CreateUser, UpdateProfile},
            User,
        },
    },
    repository::{health::HealthCheckRepository, user::UserRepository},
    service::{migration::MigrationTrigger, normalize_email},
};
use shared::error::{AppError, AppResult};

// ユーザー操作のルーター。プライマリ優先で、接続断のときだけ
// フォールバックに切り替える。どちらが処理したかは Served で返す。
#[derive(new)]
pub struct UserService {
    primary: Arc<dyn UserRepository>,
    fallback: Arc<dyn UserRepository>,
    health_check: Arc<dyn HealthCheckRepository>,
    migration: Arc<dyn MigrationTrigger>,
}

impl UserService {
    pub async fn register_user(&self, event: CreateUser) -> AppResult<Served<User>> {
        let email = normalize_email(&event.email);

        // フォールバック側の重複を先に確認する。ここで作らせてしまうと
        // プライマリ復旧後の移行で同じメールが衝突する
        if self.fallback.find_by_email(&email).await?.is_some() {
            return Err(AppError::DuplicateKey(
                "User with this email already exists".into(),
            ));
        }

        let now = Utc::now();
        let user = User {
            id: UserId::new(),
            name: event.name,
            email: email.clone(),
            password_hash: hash(event.password, DEFAULT_COST)?,
            is_active: true,
            is_admin: false,
            created_at: now,
            updated_at: now,
        };

        if self.health_check.check_db().await {
            match self.primary.find_by_email(&email).await {
                Ok(Some(_)) => {
                    return Err(AppError::DuplicateKey(
                        "User with this email already exists".into(),
                    ))
                }
                Ok(None) => match self.primary.insert(&user).await {
                    Ok(stored) => {
                        self.migration.trigger();
                        return Ok(Served::primary(stored));
                    }
                    Err(e) if e.is_connectivity() => {
                        warn!(error = %e, "primary store lost during registration; falling back");
                    }
                    Err(e) => return Err(e),
                },
                Err(e) if e.is_connectivity() => {
                    warn!(error = %e, "primary store unreachable for duplicate check; falling back");
                }
                Err(e) => return Err(e),
            }
        }

        self.fallback.insert(&user).await.map(Served::fallback)
    }

    pub async fn authenticate_user(&self, email: &str, password: &str) -> AppResult<Served<User>> {
        let email = normalize_email(email);

        if self.health_check.check_db().await {
            match self.primary.find_by_email(&email).await {
                Ok(found) => {
                    // プライマリが応答したので、滞留レコードの移行を仕掛けておく
                    self.migration.trigger();
                    if let Some(user) = found {
                        return Self::verify_login(user, password).map(Served::primary);
                    }
                    // メールは自然キーなので、不在ならフォールバック側も見る
                }
                Err(e) if e.is_connectivity() => {
                    warn!(error = %e, "primary store unreachable during login; falling back");
                }
                Err(e) => return Err(e),
            }
        }

        match self.fallback.find_by_email(&email).await? {
            Some(user) => Self::verify_login(user, password).map(Served::fallback),
            None => Err(AppError::EntityNotFound("user not found".into())),
        }
    }

    pub async fn get_profile(&self, email: &str) -> AppResult<Served<User>> {
        let email = normalize_email(email);

        if self.health_check.check_db().await {
            match self.primary.find_by_email(&email).await {
                Ok(found) => {
                    self.migration.trigger();
                    if let Some(user) = found {
                        return Ok(Served::primary(user));
                    }
                }
                Err(e) if e.is_connectivity() => {
                    warn!(error = %e, "primary store unreachable; reading profile from fallback");
                }
                Err(e) => return Err(e),
            }
        }

        match self.fallback.find_by_email(&email).await? {
            Some(user) => Ok(Served::fallback(user)),
            None => Err(AppError::EntityNotFound("user not found".into())),
        }
    }

    // 名前の変更はレコードが見つかったストアにそのまま書き戻す
    pub async fn update_profile(&self, event: UpdateProfile) -> AppResult<Served<User>> {
        let email = normalize_email(&event.email);
        let name = event.name.trim().to_string();

        if self.health_check.check_db().await {
            match self.primary.find_by_email(&email).await {
                Ok(Some(mut user)) => {
                    self.migration.trigger();
                    user.name = name;
                    user.updated_at = Utc::now();
                    self.primary.update(&user).await?;
                    return Ok(Served::primary(user));
                }
                Ok(None) => {}
                Err(e) if e.is_connectivity() => {
                    warn!(error = %e, "primary store unreachable; updating profile on fallback");
                }
                Err(e) => return Err(e),
            }
        }

        match self.fallback.find_by_email(&email).await? {
            Some(mut user) => {
                user.name = name;
                user.updated_at = Utc::now();
                self.fallback.update(&user).await?;
                Ok(Served::fallback(user))
            }
            None => Err(AppError::EntityNotFound("user not found".into())),
        }
    }

    fn verify_login(user: User, password: &str) -> AppResult<User> {
        // 無効化されたアカウントは存在しないものとして扱う
        if !user.is_active {
            return Err(AppError::EntityNotFound("user not found".into()));
        }
        if !verify(password, &user.password_hash)? {
            return Err(AppError::UnauthenticatedError);
        }
        Ok(user)
    }
}
