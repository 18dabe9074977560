use std::sync::Arc;

use chrono::Utc;
use derive_new::new;
use tracing::warn;

use crate::{
    model::{
        event::{
            event::{AddRsvp, CreateEvent, UpdateEvent},
            Event,
        },
        id::{EventId, UserId},
        store::{Served, StoreKind},
        user::EventCreator,
    },
    repository::{event::EventRepository, health::HealthCheckRepository, user::UserRepository},
    service::{migration::MigrationTrigger, normalize_email},
};
use shared::error::{AppError, AppResult};

// イベント操作のルーター。一覧と作成はプライマリ優先、
// ID 指定の読み書きは ID を採番したストアに固定する。
#[derive(new)]
pub struct EventService {
    primary: Arc<dyn EventRepository>,
    fallback: Arc<dyn EventRepository>,
    users_primary: Arc<dyn UserRepository>,
    users_fallback: Arc<dyn UserRepository>,
    health_check: Arc<dyn HealthCheckRepository>,
    migration: Arc<dyn MigrationTrigger>,
}

impl EventService {
    pub async fn create_event(&self, event: CreateEvent) -> AppResult<Served<Event>> {
        let creator = self.resolve_creator(&event.created_by).await?;
        let now = Utc::now();
        let record = Event {
            id: EventId::new(),
            name: event.name,
            description: event.description,
            date: event.date,
            time: event.time,
            location: event.location,
            image: event.image.filter(|s| !s.trim().is_empty()),
            max_seats: event.max_seats,
            created_by: creator,
            rsvps: Vec::new(),
            created_at: now,
            updated_at: now,
        };

        // 作成者がフォールバック採番のままなら、プライマリ側には
        // 参照を張れないのでフォールバックへ書く
        if record.created_by.id.store_kind() == StoreKind::Fallback {
            return self.fallback.insert(&record).await.map(Served::fallback);
        }

        if self.health_check.check_db().await {
            match self.primary.insert(&record).await {
                Ok(stored) => {
                    self.migration.trigger();
                    return Ok(Served::primary(stored));
                }
                Err(e) if e.is_connectivity() => {
                    warn!(error = %e, "primary store lost during event creation; falling back");
                }
                Err(e) => return Err(e),
            }
        }

        self.fallback.insert(&record).await.map(Served::fallback)
    }

    pub async fn list_events(&self) -> AppResult<Served<Vec<Event>>> {
        if self.health_check.check_db().await {
            match self.primary.find_all().await {
                Ok(events) if !events.is_empty() => {
                    self.migration.trigger();
                    return Ok(Served::primary(events));
                }
                // プライマリが空のときはフォールバック側の一覧をそのまま返す。
                // 2 つのストアをレコード単位で混ぜることはしない
                Ok(_) => {
                    self.migration.trigger();
                }
                Err(e) if e.is_connectivity() => {
                    warn!(error = %e, "primary store unreachable; listing events from fallback");
                }
                Err(e) => return Err(e),
            }
        }

        self.fallback.find_all().await.map(Served::fallback)
    }

    pub async fn list_events_by_creator(&self, created_by: UserId) -> AppResult<Served<Vec<Event>>> {
        if self.health_check.check_db().await {
            match self.primary.find_by_creator(created_by.clone()).await {
                Ok(events) if !events.is_empty() => {
                    self.migration.trigger();
                    return Ok(Served::primary(events));
                }
                Ok(_) => {
                    self.migration.trigger();
                }
                Err(e) if e.is_connectivity() => {
                    warn!(error = %e, "primary store unreachable; listing events from fallback");
                }
                Err(e) => return Err(e),
            }
        }

        self.fallback
            .find_by_creator(created_by)
            .await
            .map(Served::fallback)
    }

    // ID はそれを採番したストアでしか意味を持たないので、
    // ここではフォールバックへの振り替えはしない
    pub async fn get_event(&self, event_id: EventId) -> AppResult<Served<Event>> {
        let kind = event_id.store_kind();
        let found = self.repo_for(kind).find_by_id(event_id).await?;
        if kind == StoreKind::Primary {
            self.migration.trigger();
        }
        found
            .map(|event| Served {
                value: event,
                served_by: kind,
            })
            .ok_or_else(|| AppError::EntityNotFound("event not found".into()))
    }

    pub async fn update_event(&self, event: UpdateEvent) -> AppResult<Served<Event>> {
        let kind = event.event_id.store_kind();
        let repo = self.repo_for(kind);
        let mut record = repo
            .find_by_id(event.event_id.clone())
            .await?
            .ok_or_else(|| AppError::EntityNotFound("event not found".into()))?;

        if let Some(name) = event.name {
            record.name = name;
        }
        if let Some(description) = event.description {
            record.description = description;
        }
        if let Some(date) = event.date {
            record.date = date;
        }
        if let Some(time) = event.time {
            record.time = time;
        }
        if let Some(location) = event.location {
            record.location = location;
        }
        if let Some(image) = event.image {
            // 空文字は「画像なし」への変更として扱う
            record.image = (!image.trim().is_empty()).then_some(image);
        }
        if let Some(max_seats) = event.max_seats {
            record.max_seats = max_seats;
        }
        record.updated_at = Utc::now();

        repo.update(&record).await?;
        if kind == StoreKind::Primary {
            self.migration.trigger();
        }
        Ok(Served {
            value: record,
            served_by: kind,
        })
    }

    pub async fn delete_event(&self, event_id: EventId) -> AppResult<Served<()>> {
        let kind = event_id.store_kind();
        self.repo_for(kind).delete(event_id).await?;
        if kind == StoreKind::Primary {
            self.migration.trigger();
        }
        Ok(Served {
            value: (),
            served_by: kind,
        })
    }

    pub async fn add_rsvp(&self, event: AddRsvp) -> AppResult<Served<Event>> {
        let kind = event.event_id.store_kind();
        let repo = self.repo_for(kind);
        let mut record = repo
            .find_by_id(event.event_id.clone())
            .await?
            .ok_or_else(|| AppError::EntityNotFound("event not found".into()))?;

        record.add_rsvp(event.name.trim(), &normalize_email(&event.email))?;
        repo.update(&record).await?;

        if kind == StoreKind::Primary {
            self.migration.trigger();
        }
        Ok(Served {
            value: record,
            served_by: kind,
        })
    }

    fn repo_for(&self, kind: StoreKind) -> &dyn EventRepository {
        match kind {
            StoreKind::Primary => self.primary.as_ref(),
            StoreKind::Fallback => self.fallback.as_ref(),
        }
    }

    // 作成者参照を解決する。フォールバック採番の ID でも、同じメールの
    // ユーザーが既にプライマリへ移行済みならそちらの ID に読み替える
    async fn resolve_creator(&self, created_by: &UserId) -> AppResult<EventCreator> {
        match created_by.store_kind() {
            StoreKind::Primary => self
                .users_primary
                .find_by_id(created_by.clone())
                .await?
                .map(EventCreator::from)
                .ok_or_else(|| AppError::EntityNotFound("creator not found".into())),
            StoreKind::Fallback => {
                let user = self
                    .users_fallback
                    .find_by_id(created_by.clone())
                    .await?
                    .ok_or_else(|| AppError::EntityNotFound("creator not found".into()))?;
                if self.health_check.check_db().await {
                    match self.users_primary.find_by_email(&user.email).await {
                        Ok(Some(promoted)) => return Ok(promoted.into()),
                        Ok(None) => {}
                        Err(e) if e.is_connectivity() => {
                            warn!(error = %e, "primary lookup failed while resolving creator");
                        }
                        Err(e) => return Err(e),
                    }
                }
                Ok(user.into())
            }
        }
    }
}
