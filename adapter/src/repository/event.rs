use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use derive_new::new;
use futures::TryStreamExt;
use kernel::model::{
    event::Event,
    id::{EventId, UserId},
};
use kernel::repository::event::EventRepository;
use mongodb::{
    bson::{doc, oid::ObjectId},
    options::FindOptions,
};
use shared::error::{AppError, AppResult};

use crate::database::{
    classify_error,
    model::{
        event::{EventDocument, DATE_FORMAT},
        user::UserDocument,
    },
    object_id, ConnectionPool,
};

#[derive(new)]
pub struct EventRepositoryImpl {
    db: ConnectionPool,
}

impl EventRepositoryImpl {
    // ドキュメントには作成者の ObjectId しか入っていないので、
    // users をまとめて引いて名前を付ける
    async fn attach_creators(&self, documents: Vec<EventDocument>) -> AppResult<Vec<Event>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let creator_ids: Vec<ObjectId> = documents
            .iter()
            .map(|d| d.created_by)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let users: Vec<UserDocument> = self
            .db
            .users()
            .find(doc! { "_id": { "$in": creator_ids } }, None)
            .await
            .map_err(classify_error)?
            .try_collect()
            .await
            .map_err(classify_error)?;
        let names: HashMap<ObjectId, String> =
            users.into_iter().map(|u| (u.id, u.name)).collect();

        documents
            .into_iter()
            .map(|document| {
                let name = names
                    .get(&document.created_by)
                    .cloned()
                    // 作成者が消えていても一覧は壊さない
                    .unwrap_or_else(|| "Unknown User".to_string());
                document.into_event(name)
            })
            .collect()
    }
}

#[async_trait]
impl EventRepository for EventRepositoryImpl {
    async fn insert(&self, event: &Event) -> AppResult<Event> {
        let created_by = object_id(event.created_by.id.as_str())?;
        let document = EventDocument::from_new(event, created_by);
        self.db
            .events()
            .insert_one(&document, None)
            .await
            .map_err(classify_error)?;
        document.into_event(event.created_by.name.clone())
    }

    async fn find_by_id(&self, event_id: EventId) -> AppResult<Option<Event>> {
        let id = object_id(event_id.as_str())?;
        let found = self
            .db
            .events()
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(classify_error)?;
        match found {
            Some(document) => Ok(self.attach_creators(vec![document]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_by_natural_key(
        &self,
        name: &str,
        date: NaiveDate,
        created_by: UserId,
    ) -> AppResult<Option<Event>> {
        // 作成者がこのストアの ID でなければ該当レコードはあり得ない
        let Ok(creator) = object_id(created_by.as_str()) else {
            return Ok(None);
        };
        let filter = doc! {
            "name": name,
            "date": date.format(DATE_FORMAT).to_string(),
            "created_by": creator,
        };
        let found = self
            .db
            .events()
            .find_one(filter, None)
            .await
            .map_err(classify_error)?;
        match found {
            Some(document) => Ok(self.attach_creators(vec![document]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn find_all(&self) -> AppResult<Vec<Event>> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let documents: Vec<EventDocument> = self
            .db
            .events()
            .find(doc! {}, options)
            .await
            .map_err(classify_error)?
            .try_collect()
            .await
            .map_err(classify_error)?;
        self.attach_creators(documents).await
    }

    async fn find_by_creator(&self, created_by: UserId) -> AppResult<Vec<Event>> {
        let Ok(creator) = object_id(created_by.as_str()) else {
            return Ok(Vec::new());
        };
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();
        let documents: Vec<EventDocument> = self
            .db
            .events()
            .find(doc! { "created_by": creator }, options)
            .await
            .map_err(classify_error)?
            .try_collect()
            .await
            .map_err(classify_error)?;
        self.attach_creators(documents).await
    }

    async fn update(&self, event: &Event) -> AppResult<()> {
        let document = EventDocument::try_from(event)?;
        let result = self
            .db
            .events()
            .replace_one(doc! { "_id": document.id }, &document, None)
            .await
            .map_err(classify_error)?;
        if result.matched_count == 0 {
            return Err(AppError::EntityNotFound("event not found".into()));
        }
        Ok(())
    }

    async fn delete(&self, event_id: EventId) -> AppResult<()> {
        let id = object_id(event_id.as_str())?;
        let result = self
            .db
            .events()
            .delete_one(doc! { "_id": id }, None)
            .await
            .map_err(classify_error)?;
        if result.deleted_count == 0 {
            return Err(AppError::EntityNotFound("event not found".into()));
        }
        Ok(())
    }

    async fn count(&self) -> AppResult<u64> {
        self.db
            .events()
            .count_documents(doc! {}, None)
            .await
            .map_err(classify_error)
    }
}
