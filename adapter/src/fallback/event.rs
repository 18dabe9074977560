use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use kernel::model::{
    event::{Event, Rsvp},
    id::{EventId, UserId},
    user::EventCreator,
};
use kernel::repository::event::EventRepository;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult};

use crate::fallback::JsonFile;

pub(crate) const EVENTS_FILE: &str = "fallback_events.json";

// フォールバックファイル上のイベントレコード。作成者は ID と名前を
// そのまま埋め込む
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: String,
    #[serde(default)]
    pub image: Option<String>,
    pub max_seats: i32,
    pub created_by: EventCreatorRecord,
    #[serde(default)]
    pub rsvps: Vec<RsvpRecord>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCreatorRecord {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsvpRecord {
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Event> for EventRecord {
    fn from(value: &Event) -> Self {
        Self {
            id: value.id.as_str().to_string(),
            name: value.name.clone(),
            description: value.description.clone(),
            date: value.date,
            time: value.time,
            location: value.location.clone(),
            image: value.image.clone(),
            max_seats: value.max_seats,
            created_by: EventCreatorRecord {
                id: value.created_by.id.as_str().to_string(),
                name: value.created_by.name.clone(),
            },
            rsvps: value
                .rsvps
                .iter()
                .map(|r| RsvpRecord {
                    name: r.name.clone(),
                    email: r.email.clone(),
                    created_at: r.created_at,
                })
                .collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<EventRecord> for Event {
    fn from(value: EventRecord) -> Self {
        let EventRecord {
            id,
            name,
            description,
            date,
            time,
            location,
            image,
            max_seats,
            created_by,
            rsvps,
            created_at,
            updated_at,
        } = value;
        Event {
            id: EventId::from_raw(id),
            name,
            description,
            date,
            time,
            location,
            image,
            max_seats,
            created_by: EventCreator {
                id: UserId::from_raw(created_by.id),
                name: created_by.name,
            },
            rsvps: rsvps
                .into_iter()
                .map(|r| Rsvp {
                    name: r.name,
                    email: r.email,
                    created_at: r.created_at,
                })
                .collect(),
            created_at,
            updated_at,
        }
    }
}

pub struct FallbackEventRepositoryImpl {
    file: JsonFile<EventRecord>,
}

impl FallbackEventRepositoryImpl {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            file: JsonFile::new(data_dir.as_ref().join(EVENTS_FILE)),
        }
    }
}

#[async_trait]
impl EventRepository for FallbackEventRepositoryImpl {
    async fn insert(&self, event: &Event) -> AppResult<Event> {
        let record = EventRecord::from(event);
        // 同じ ID のレコードは位置を保ったまま置き換える
        self.file
            .with_records(|records| match records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => records.push(record),
            })
            .await?;
        Ok(event.clone())
    }

    async fn find_by_id(&self, event_id: EventId) -> AppResult<Option<Event>> {
        Ok(self
            .file
            .load()
            .await
            .into_iter()
            .find(|r| r.id == event_id.as_str())
            .map(Event::from))
    }

    async fn find_by_natural_key(
        &self,
        name: &str,
        date: NaiveDate,
        created_by: UserId,
    ) -> AppResult<Option<Event>> {
        Ok(self
            .file
            .load()
            .await
            .into_iter()
            .find(|r| r.name == name && r.date == date && r.created_by.id == created_by.as_str())
            .map(Event::from))
    }

    async fn find_all(&self) -> AppResult<Vec<Event>> {
        let mut events: Vec<Event> = self.file.load().await.into_iter().map(Event::from).collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }

    async fn find_by_creator(&self, created_by: UserId) -> AppResult<Vec<Event>> {
        let mut events: Vec<Event> = self
            .file
            .load()
            .await
            .into_iter()
            .filter(|r| r.created_by.id == created_by.as_str())
            .map(Event::from)
            .collect();
        events.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(events)
    }

    async fn update(&self, event: &Event) -> AppResult<()> {
        let record = EventRecord::from(event);
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
            return Err(AppError::EntityNotFound("event not found".into()));
        }
        Ok(())
    }

    async fn delete(&self, event_id: EventId) -> AppResult<()> {
        let found = self
            .file
            .with_records(|records| {
                let before = records.len();
                records.retain(|r| r.id != event_id.as_str());
                records.len() < before
            })
            .await?;
        if !found {
            return Err(AppError::EntityNotFound("event not found".into()));
        }
        Ok(())
    }

    async fn count(&self) -> AppResult<u64> {
        Ok(self.file.load().await.len() as u64)
    }
}
