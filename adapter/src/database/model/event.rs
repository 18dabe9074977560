use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use kernel::model::{
    event::{Event, Rsvp},
    id::{EventId, UserId},
    user::EventCreator,
};
use mongodb::bson::{oid::ObjectId, serde_helpers::chrono_datetime_as_bson_datetime};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult};

use crate::database::object_id;

// 既存データと互換の保存形式
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
pub(crate) const TIME_FORMAT: &str = "%H:%M";

// events コレクションのドキュメント型。開催日と開始時刻は
// 既存レコードに合わせて文字列のまま持つ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDocument {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub name: String,
    pub description: String,
    pub date: String,
    pub time: String,
    pub location: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_max_seats")]
    pub max_seats: i32,
    pub created_by: ObjectId,
    #[serde(default)]
    pub rsvps: Vec<RsvpDocument>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsvpDocument {
    pub name: String,
    pub email: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

fn default_max_seats() -> i32 {
    50
}

impl EventDocument {
    // 新規保存用。ID はこのストアで採番し直す。作成者は解決済みの
    // ObjectId を受け取る
    pub fn from_new(event: &Event, created_by: ObjectId) -> Self {
        Self {
            id: ObjectId::new(),
            name: event.name.clone(),
            description: event.description.clone(),
            date: event.date.format(DATE_FORMAT).to_string(),
            time: event.time.format(TIME_FORMAT).to_string(),
            location: event.location.clone(),
            image: event.image.clone(),
            max_seats: event.max_seats,
            created_by,
            rsvps: event.rsvps.iter().map(RsvpDocument::from).collect(),
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }

    // ドキュメントは作成者の名前を持たないので、外から渡してもらう
    pub fn into_event(self, creator_name: String) -> AppResult<Event> {
        let EventDocument {
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
        } = self;
        let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .map_err(|e| AppError::ConversionEntityError(format!("bad event date {date:?}: {e}")))?;
        let time = NaiveTime::parse_from_str(&time, TIME_FORMAT)
            .map_err(|e| AppError::ConversionEntityError(format!("bad event time {time:?}: {e}")))?;
        Ok(Event {
            id: EventId::from_raw(id.to_hex()),
            name,
            description,
            date,
            time,
            location,
            image,
            max_seats,
            created_by: EventCreator {
                id: UserId::from_raw(created_by.to_hex()),
                name: creator_name,
            },
            rsvps: rsvps.into_iter().map(Rsvp::from).collect(),
            created_at,
            updated_at,
        })
    }
}

// 既存レコードの置き換え用。イベント ID も作成者参照も変えない
impl TryFrom<&Event> for EventDocument {
    type Error = AppError;

    fn try_from(value: &Event) -> Result<Self, Self::Error> {
        Ok(Self {
            id: object_id(value.id.as_str())?,
            name: value.name.clone(),
            description: value.description.clone(),
            date: value.date.format(DATE_FORMAT).to_string(),
            time: value.time.format(TIME_FORMAT).to_string(),
            location: value.location.clone(),
            image: value.image.clone(),
            max_seats: value.max_seats,
            created_by: object_id(value.created_by.id.as_str())?,
            rsvps: value.rsvps.iter().map(RsvpDocument::from).collect(),
            created_at: value.created_at,
            updated_at: value.updated_at,
        })
    }
}

impl From<&Rsvp> for RsvpDocument {
    fn from(value: &Rsvp) -> Self {
        Self {
            name: value.name.clone(),
            email: value.email.clone(),
            created_at: value.created_at,
        }
    }
}

impl From<RsvpDocument> for Rsvp {
    fn from(value: RsvpDocument) -> Self {
        let RsvpDocument {
            name,
            email,
            created_at,
        } = value;
        Rsvp {
            name,
            email,
            created_at,
        }
    }
}
