use async_trait::async_trait;
use chrono::NaiveDate;
use shared::error::AppResult;

use crate::model::{
    event::Event,
    id::{EventId, UserId},
};

#[async_trait]
pub trait EventRepository: Send + Sync {
    // 新規レコードとして保存し、保存された形を返す
    async fn insert(&self, event: &Event) -> AppResult<Event>;
    // ID からイベントを取得する
    async fn find_by_id(&self, event_id: EventId) -> AppResult<Option<Event>>;
    // 自然キー（名前・開催日・作成者）でイベントを取得する
    async fn find_by_natural_key(
        &self,
        name: &str,
        date: NaiveDate,
        created_by: UserId,
    ) -> AppResult<Option<Event>>;
    // 全イベントを作成日時の降順で取得する
    async fn find_all(&self) -> AppResult<Vec<Event>>;
    // 作成者 ID に紐づくイベント一覧を取得する
    async fn find_by_creator(&self, created_by: UserId) -> AppResult<Vec<Event>>;
    // レコード全体を ID で置き換える
    async fn update(&self, event: &Event) -> AppResult<()>;
    // ID のレコードを削除する
    async fn delete(&self, event_id: EventId) -> AppResult<()>;
    // 件数を数える
    async fn count(&self) -> AppResult<u64>;
}
