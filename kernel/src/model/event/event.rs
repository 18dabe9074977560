use chrono::{NaiveDate, NaiveTime};
use derive_new::new;

use crate::model::id::{EventId, UserId};

#[derive(new)]
pub struct CreateEvent {
    pub name: String,
    pub description: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: String,
    pub image: Option<String>,
    pub max_seats: i32,
    pub created_by: UserId,
}

#[derive(Debug, new)]
pub struct UpdateEvent {
    pub event_id: EventId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub location: Option<String>,
    pub image: Option<String>,
    pub max_seats: Option<i32>,
}

#[derive(Debug, new)]
pub struct AddRsvp {
    pub event_id: EventId,
    pub name: String,
    pub email: String,
}
