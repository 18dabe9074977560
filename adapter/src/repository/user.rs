use async_trait::async_trait;
use derive_new::new;
use futures::TryStreamExt;
use kernel::model::{id::UserId, user::User};
use kernel::repository::user::UserRepository;
use mongodb::{bson::doc, options::FindOptions};
use shared::error::{AppError, AppResult};

use crate::database::{classify_error, model::user::UserDocument, object_id, ConnectionPool};

#[derive(new)]
pub struct UserRepositoryImpl {
    db: ConnectionPool,
}

#[async_trait]
impl UserRepository for UserRepositoryImpl {
    async fn insert(&self, user: &User) -> AppResult<User> {
        let document = UserDocument::from_new(user);
        self.db
            .users()
            .insert_one(&document, None)
            .await
            .map_err(classify_error)?;
        Ok(User::from(document))
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<User>> {
        let id = object_id(user_id.as_str())?;
        let found = self
            .db
            .users()
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(classify_error)?;
        Ok(found.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let found = self
            .db
            .users()
            .find_one(doc! { "email": email }, None)
            .await
            .map_err(classify_error)?;
        Ok(found.map(User::from))
    }

    async fn find_all(&self) -> AppResult<Vec<User>> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let documents: Vec<UserDocument> = self
            .db
            .users()
            .find(doc! {}, options)
            .await
            .map_err(classify_error)?
            .try_collect()
            .await
            .map_err(classify_error)?;
        Ok(documents.into_iter().map(User::from).collect())
    }

    async fn update(&self, user: &User) -> AppResult<()> {
        let document = UserDocument::try_from(user)?;
        let result = self
            .db
            .users()
            .replace_one(doc! { "_id": document.id }, &document, None)
            .await
            .map_err(classify_error)?;
        if result.matched_count == 0 {
            return Err(AppError::EntityNotFound("user not found".into()));
        }
        Ok(())
    }

    async fn delete(&self, user_id: UserId) -> AppResult<()> {
        let id = object_id(user_id.as_str())?;
        let result = self
            .db
            .users()
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(classify_error)?;
        if result.deleted_count == 0 {
            return Err(AppError::EntityNotFound("user not found".into()));
        }
        Ok(())
    }

    async fn count(&self) -> AppResult<u64> {
        self.db
            .users()
            .count_documents(doc! {}, None)
            .await
            .map_err(classify_error)
    }
}
