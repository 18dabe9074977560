use chrono::{DateTime, Local, NaiveDate, NaiveTime, Utc};
use strum::Display;

use crate::model::{id::EventId, user::EventCreator};
use shared::error::{AppError, AppResult};

pub mod event;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub description: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: String,
    pub image: Option<String>,
    pub max_seats: i32,
    pub created_by: EventCreator,
    pub rsvps: Vec<Rsvp>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rsvp {
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum EventStatus {
    Open,
    Full,
    Completed,
}

impl Event {
    pub fn rsvp_count(&self) -> usize {
        self.rsvps.len()
    }

    // 残席は 0 未満にならない
    pub fn available_seats(&self) -> i32 {
        (self.max_seats - self.rsvps.len() as i32).max(0)
    }

    // 状態の優先順位は completed > full > open。
    // 開催日当日はまだ completed にしない。
    pub fn status_on(&self, today: NaiveDate) -> EventStatus {
        if self.date < today {
            EventStatus::Completed
        } else if self.available_seats() == 0 {
            EventStatus::Full
        } else {
            EventStatus::Open
        }
    }

    pub fn status(&self) -> EventStatus {
        self.status_on(Local::now().date_naive())
    }

    // 参加登録。満席と同一メールの再登録はここで弾く
    pub fn add_rsvp(&mut self, name: &str, email: &str) -> AppResult<()> {
        if self
            .rsvps
            .iter()
            .any(|r| r.email.eq_ignore_ascii_case(email))
        {
            return Err(AppError::DuplicateRsvp(
                "Email already registered for this event".into(),
            ));
        }
        if self.rsvps.len() as i32 >= self.max_seats {
            return Err(AppError::EventFull("no seats available".into()));
        }
        self.rsvps.push(Rsvp {
            name: name.to_string(),
            email: email.to_string(),
            created_at: Utc::now(),
        });
        self.updated_at = Utc::now();
        Ok(())
    }
}
