// サービス層テスト用のインメモリストア。プライマリ実装と同じ採番規則と
// エラー分類（接続断は StoreUnavailable）を再現する。

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};

use crate::{
    model::{
        event::Event,
        id::{EventId, UserId},
        store::StoreKind,
        user::{EventCreator, User},
    },
    repository::{event::EventRepository, health::HealthCheckRepository, user::UserRepository},
    service::migration::MigrationTrigger,
};
use shared::error::{AppError, AppResult};

// プライマリの死活をテストから切り替えるスイッチ。
// probe は死活確認の応答、reachable はストア実体への到達可否。
// 確認は通ったが直後の操作で落ちる、という順序を再現できる。
#[derive(Clone, Default)]
pub(crate) struct PrimarySwitch {
    probe: Arc<AtomicBool>,
    reachable: Arc<AtomicBool>,
}

impl PrimarySwitch {
    pub(crate) fn up() -> Self {
        let switch = Self::default();
        switch.set_probe(true);
        switch.set_reachable(true);
        switch
    }

    pub(crate) fn down() -> Self {
        Self::default()
    }

    pub(crate) fn set_probe(&self, up: bool) {
        self.probe.store(up, Ordering::SeqCst);
    }

    pub(crate) fn set_reachable(&self, up: bool) {
        self.reachable.store(up, Ordering::SeqCst);
    }

    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthCheckRepository for PrimarySwitch {
    async fn check_db(&self) -> bool {
        self.probe.load(Ordering::SeqCst)
    }
}

fn unreachable_err() -> AppError {
    AppError::StoreUnavailable(anyhow!("connection refused"))
}

// 移行トリガの呼ばれた回数だけを記録する
#[derive(Clone, Default)]
pub(crate) struct RecordingTrigger(Arc<AtomicUsize>);

impl RecordingTrigger {
    pub(crate) fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl MigrationTrigger for RecordingTrigger {
    fn trigger(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

pub(crate) struct MemoryUserStore {
    kind: StoreKind,
    switch: Option<PrimarySwitch>,
    rows: Mutex<Vec<User>>,
    insert_budget: Mutex<Option<usize>>,
}

impl MemoryUserStore {
    pub(crate) fn primary(switch: &PrimarySwitch) -> Self {
        Self {
            kind: StoreKind::Primary,
            switch: Some(switch.clone()),
            rows: Mutex::new(Vec::new()),
            insert_budget: Mutex::new(None),
        }
    }

    pub(crate) fn fallback() -> Self {
        Self {
            kind: StoreKind::Fallback,
            switch: None,
            rows: Mutex::new(Vec::new()),
            insert_budget: Mutex::new(None),
        }
    }

    // n 回目までの insert は通し、それ以降を接続断として失敗させる
    pub(crate) fn fail_after(&self, inserts: usize) {
        *self.insert_budget.lock().unwrap() = Some(inserts);
    }

    fn ensure_reachable(&self) -> AppResult<()> {
        match &self.switch {
            Some(switch) if !switch.is_reachable() => Err(unreachable_err()),
            _ => Ok(()),
        }
    }

    fn consume_insert_budget(&self) -> AppResult<()> {
        let mut budget = self.insert_budget.lock().unwrap();
        match budget.as_mut() {
            Some(0) => Err(unreachable_err()),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl UserRepository for MemoryUserStore {
    async fn insert(&self, user: &User) -> AppResult<User> {
        self.ensure_reachable()?;
        self.consume_insert_budget()?;
        let mut stored = user.clone();
        let mut rows = self.rows.lock().unwrap();
        match self.kind {
            StoreKind::Primary => {
                // メールのユニーク索引を模す
                if rows.iter().any(|r| r.email == stored.email) {
                    return Err(AppError::DuplicateKey("duplicate key".into()));
                }
                stored.id = UserId::from_raw(mint_primary_id());
                rows.push(stored.clone());
            }
            StoreKind::Fallback => match rows.iter_mut().find(|r| r.email == stored.email) {
                Some(existing) => *existing = stored.clone(),
                None => rows.push(stored.clone()),
            },
        }
        Ok(stored)
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<User>> {
        self.ensure_reachable()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == user_id)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        self.ensure_reachable()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.email == email)
            .cloned())
    }

    async fn find_all(&self) -> AppResult<Vec<User>> {
        self.ensure_reachable()?;
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn update(&self, user: &User) -> AppResult<()> {
        self.ensure_reachable()?;
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|r| r.id == user.id) {
            Some(row) => {
                *row = user.clone();
                Ok(())
            }
            None => Err(AppError::EntityNotFound("user not found".into())),
        }
    }

    async fn delete(&self, user_id: UserId) -> AppResult<()> {
        self.ensure_reachable()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.id != user_id);
        if rows.len() == before {
            return Err(AppError::EntityNotFound("user not found".into()));
        }
        Ok(())
    }

    async fn count(&self) -> AppResult<u64> {
        self.ensure_reachable()?;
        Ok(self.rows.lock().unwrap().len() as u64)
    }
}

pub(crate) struct MemoryEventStore {
    kind: StoreKind,
    switch: Option<PrimarySwitch>,
    rows: Mutex<Vec<Event>>,
    insert_budget: Mutex<Option<usize>>,
}

impl MemoryEventStore {
    pub(crate) fn primary(switch: &PrimarySwitch) -> Self {
        Self {
            kind: StoreKind::Primary,
            switch: Some(switch.clone()),
            rows: Mutex::new(Vec::new()),
            insert_budget: Mutex::new(None),
        }
    }

    pub(crate) fn fallback() -> Self {
        Self {
            kind: StoreKind::Fallback,
            switch: None,
            rows: Mutex::new(Vec::new()),
            insert_budget: Mutex::new(None),
        }
    }

    // n 回目までの insert は通し、それ以降を接続断として失敗させる
    pub(crate) fn fail_after(&self, inserts: usize) {
        *self.insert_budget.lock().unwrap() = Some(inserts);
    }

    fn ensure_reachable(&self) -> AppResult<()> {
        match &self.switch {
            Some(switch) if !switch.is_reachable() => Err(unreachable_err()),
            _ => Ok(()),
        }
    }

    fn consume_insert_budget(&self) -> AppResult<()> {
        let mut budget = self.insert_budget.lock().unwrap();
        match budget.as_mut() {
            Some(0) => Err(unreachable_err()),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl EventRepository for MemoryEventStore {
    async fn insert(&self, event: &Event) -> AppResult<Event> {
        self.ensure_reachable()?;
        self.consume_insert_budget()?;
        let mut stored = event.clone();
        let mut rows = self.rows.lock().unwrap();
        match self.kind {
            StoreKind::Primary => {
                stored.id = EventId::from_raw(mint_primary_id());
                rows.push(stored.clone());
            }
            StoreKind::Fallback => match rows.iter_mut().find(|r| r.id == stored.id) {
                Some(existing) => *existing = stored.clone(),
                None => rows.push(stored.clone()),
            },
        }
        Ok(stored)
    }

    async fn find_by_id(&self, event_id: EventId) -> AppResult<Option<Event>> {
        self.ensure_reachable()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == event_id)
            .cloned())
    }

    async fn find_by_natural_key(
        &self,
        name: &str,
        date: NaiveDate,
        created_by: UserId,
    ) -> AppResult<Option<Event>> {
        self.ensure_reachable()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.name == name && r.date == date && r.created_by.id == created_by)
            .cloned())
    }

    async fn find_all(&self) -> AppResult<Vec<Event>> {
        self.ensure_reachable()?;
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn find_by_creator(&self, created_by: UserId) -> AppResult<Vec<Event>> {
        self.ensure_reachable()?;
        let mut rows: Vec<Event> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.created_by.id == created_by)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn update(&self, event: &Event) -> AppResult<()> {
        self.ensure_reachable()?;
        let mut rows = self.rows.lock().unwrap();
        match rows.iter_mut().find(|r| r.id == event.id) {
            Some(row) => {
                *row = event.clone();
                Ok(())
            }
            None => Err(AppError::EntityNotFound("event not found".into())),
        }
    }

    async fn delete(&self, event_id: EventId) -> AppResult<()> {
        self.ensure_reachable()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.id != event_id);
        if rows.len() == before {
            return Err(AppError::EntityNotFound("event not found".into()));
        }
        Ok(())
    }

    async fn count(&self) -> AppResult<u64> {
        self.ensure_reachable()?;
        Ok(self.rows.lock().unwrap().len() as u64)
    }
}

// ObjectId と同じ 24 桁 16 進の ID を作る
fn mint_primary_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..24].to_string()
}

pub(crate) fn seeded_user(name: &str, email: &str, password: &str) -> User {
    let now = Utc::now();
    User {
        id: UserId::new(),
        name: name.into(),
        email: email.into(),
        // テストでは最小コストでハッシュ化する
        password_hash: bcrypt::hash(password, 4).unwrap(),
        is_active: true,
        is_admin: false,
        created_at: now,
        updated_at: now,
    }
}

pub(crate) fn seeded_event(name: &str, date: NaiveDate, creator: &User) -> Event {
    let now = Utc::now();
    Event {
        id: EventId::new(),
        name: name.into(),
        description: "seeded for tests".into(),
        date,
        time: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
        location: "Community Hall".into(),
        image: None,
        max_seats: 50,
        created_by: EventCreator {
            id: creator.id.clone(),
            name: creator.name.clone(),
        },
        rsvps: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}
