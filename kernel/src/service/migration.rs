use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use derive_new::new;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    model::{event::Event, store::StoreKind, user::EventCreator},
    repository::{event::EventRepository, health::HealthCheckRepository, user::UserRepository},
};
use shared::error::AppResult;

// プライマリの生存を観測した側から移行を仕掛けるための口
pub trait MigrationTrigger: Send + Sync {
    fn trigger(&self);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub users_migrated: usize,
    pub events_migrated: usize,
    pub events_skipped: usize,
}

impl MigrationReport {
    pub fn total(&self) -> usize {
        self.users_migrated + self.events_migrated
    }
}

// フォールバックに滞留したレコードをプライマリへ写す。
// 写すだけで消さない。どのレコードが先に写っても壊れないよう、
// ユーザー → イベントの順で処理する。
#[derive(Clone, new)]
pub struct MigrationService {
    users_primary: Arc<dyn UserRepository>,
    users_fallback: Arc<dyn UserRepository>,
    events_primary: Arc<dyn EventRepository>,
    events_fallback: Arc<dyn EventRepository>,
    health_check: Arc<dyn HealthCheckRepository>,
    #[new(default)]
    in_flight: Arc<AtomicBool>,
    #[new(default)]
    run_lock: Arc<Mutex<()>>,
}

impl MigrationService {
    pub async fn migrate_fallback(&self) -> AppResult<MigrationReport> {
        // 同時に走らせない。後から来た方は先行の結果の残りを拾う
        let _guard = self.run_lock.lock().await;

        if !self.health_check.check_db().await {
            debug!("primary store unavailable; skipping fallback migration");
            return Ok(MigrationReport::default());
        }

        let mut report = MigrationReport::default();
        if self.migrate_users(&mut report).await? {
            self.migrate_events(&mut report).await?;
        }

        if report.total() > 0 {
            info!(
                users = report.users_migrated,
                events = report.events_migrated,
                skipped = report.events_skipped,
                "copied fallback records into the primary store"
            );
        }
        Ok(report)
    }

    // 戻り値はプライマリがまだ応答しているか
    async fn migrate_users(&self, report: &mut MigrationReport) -> AppResult<bool> {
        for user in self.users_fallback.find_all().await? {
            match self.users_primary.find_by_email(&user.email).await {
                // 既にプライマリに居るなら触らない。プライマリ側が常に勝つ
                Ok(Some(_)) => {}
                Ok(None) => match self.users_primary.insert(&user).await {
                    Ok(stored) => {
                        report.users_migrated += 1;
                        debug!(email = %stored.email, "migrated user");
                    }
                    Err(e) if e.is_connectivity() => {
                        warn!(error = %e, "primary store lost during user migration");
                        return Ok(false);
                    }
                    Err(e) => warn!(error = %e, email = %user.email, "could not migrate user"),
                },
                Err(e) if e.is_connectivity() => {
                    warn!(error = %e, "primary store lost during user migration");
                    return Ok(false);
                }
                Err(e) => warn!(error = %e, email = %user.email, "could not check user"),
            }
        }
        Ok(true)
    }

    async fn migrate_events(&self, report: &mut MigrationReport) -> AppResult<()> {
        for event in self.events_fallback.find_all().await? {
            let creator = match self.resolve_creator(&event).await {
                Ok(Some(creator)) => creator,
                Ok(None) => {
                    report.events_skipped += 1;
                    continue;
                }
                Err(e) if e.is_connectivity() => {
                    warn!(error = %e, "primary store lost during event migration");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, event = %event.name, "could not resolve creator");
                    report.events_skipped += 1;
                    continue;
                }
            };

            // 名前・開催日・作成者の自然キーで重複を見る
            match self
                .events_primary
                .find_by_natural_key(&event.name, event.date, creator.id.clone())
                .await
            {
                Ok(Some(_)) => {}
                Ok(None) => {
                    let migrated = Event {
                        created_by: creator,
                        ..event.clone()
                    };
                    match self.events_primary.insert(&migrated).await {
                        Ok(stored) => {
                            report.events_migrated += 1;
                            debug!(event = %stored.name, "migrated event");
                        }
                        Err(e) if e.is_connectivity() => {
                            warn!(error = %e, "primary store lost during event migration");
                            return Ok(());
                        }
                        Err(e) => {
                            warn!(error = %e, event = %event.name, "could not migrate event");
                            report.events_skipped += 1;
                        }
                    }
                }
                Err(e) if e.is_connectivity() => {
                    warn!(error = %e, "primary store lost during event migration");
                    return Ok(());
                }
                Err(e) => {
                    warn!(error = %e, event = %event.name, "could not check event");
                    report.events_skipped += 1;
                }
            }
        }
        Ok(())
    }

    // 移行先で使う作成者参照を求める。ユーザーを先に移行している前提で、
    // フォールバック採番の作成者はメール経由でプライマリ側の ID に読み替える
    async fn resolve_creator(&self, event: &Event) -> AppResult<Option<EventCreator>> {
        let creator = &event.created_by;
        match creator.id.store_kind() {
            StoreKind::Primary => Ok(self
                .users_primary
                .find_by_id(creator.id.clone())
                .await?
                .map(EventCreator::from)),
            StoreKind::Fallback => {
                let Some(user) = self.users_fallback.find_by_id(creator.id.clone()).await? else {
                    warn!(event = %event.name, "creator record missing from fallback store");
                    return Ok(None);
                };
                Ok(self
                    .users_primary
                    .find_by_email(&user.email)
                    .await?
                    .map(EventCreator::from))
            }
        }
    }

    // 運用者の明示操作。移行済みと確認できたフォールバックレコードを消す
    pub async fn remove_migrated(&self) -> AppResult<usize> {
        let _guard = self.run_lock.lock().await;

        if !self.health_check.check_db().await {
            return Ok(0);
        }

        // 作成者参照の解決にフォールバック側のユーザーが要るので、
        // 移行とは逆にイベント → ユーザーの順で消す
        let mut removed = 0;
        for event in self.events_fallback.find_all().await? {
            let Some(creator) = self.resolve_creator(&event).await? else {
                continue;
            };
            if self
                .events_primary
                .find_by_natural_key(&event.name, event.date, creator.id.clone())
                .await?
                .is_some()
            {
                self.events_fallback.delete(event.id.clone()).await?;
                removed += 1;
            }
        }
        for user in self.users_fallback.find_all().await? {
            if self.users_primary.find_by_email(&user.email).await?.is_some() {
                self.users_fallback.delete(user.id.clone()).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "removed fallback records already present in primary");
        }
        Ok(removed)
    }

    // 移行待ちのフォールバックレコード数（ユーザー, イベント)
    pub async fn pending_records(&self) -> AppResult<(u64, u64)> {
        Ok((
            self.users_fallback.count().await?,
            self.events_fallback.count().await?,
        ))
    }

    // プライマリの生存を見かけた側から呼ぶ。実行中なら何もしない
    pub fn spawn_opportunistic(&self) {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.migrate_fallback().await {
                warn!(error = %e, "opportunistic migration failed");
            }
            this.in_flight.store(false, Ordering::SeqCst);
        });
    }
}

impl MigrationTrigger for MigrationService {
    fn trigger(&self) {
        self.spawn_opportunistic();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        service::test_support::{
            seeded_event, seeded_user, MemoryEventStore, MemoryUserStore, PrimarySwitch,
        },
        service::user::UserService,
    };
    use anyhow::Result;
    use chrono::{NaiveDate, Utc};

    struct Harness {
        switch: PrimarySwitch,
        users_primary: Arc<MemoryUserStore>,
        users_fallback: Arc<MemoryUserStore>,
        events_primary: Arc<MemoryEventStore>,
        events_fallback: Arc<MemoryEventStore>,
        service: MigrationService,
    }

    fn harness(primary_up: bool) -> Harness {
        let switch = if primary_up {
            PrimarySwitch::up()
        } else {
            PrimarySwitch::down()
        };
        let users_primary = Arc::new(MemoryUserStore::primary(&switch));
        let users_fallback = Arc::new(MemoryUserStore::fallback());
        let events_primary = Arc::new(MemoryEventStore::primary(&switch));
        let events_fallback = Arc::new(MemoryEventStore::fallback());
        let service = MigrationService::new(
            users_primary.clone(),
            users_fallback.clone(),
            events_primary.clone(),
            events_fallback.clone(),
            Arc::new(switch.clone()),
        );
        Harness {
            switch,
            users_primary,
            users_fallback,
            events_primary,
            events_fallback,
            service,
        }
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn migrates_users_before_events_and_remaps_the_creator() -> Result<()> {
        let h = harness(true);
        let bob = h
            .users_fallback
            .insert(&seeded_user("Bob", "bob@example.com", "pw"))
            .await?;
        let mut event = seeded_event("Fallback Meetup", day(2025, 7, 2), &bob);
        event.add_rsvp("Carol", "carol@example.com").unwrap();
        event.add_rsvp("Dave", "dave@example.com").unwrap();
        h.events_fallback.insert(&event).await?;

        let report = h.service.migrate_fallback().await?;

        assert_eq!(report.users_migrated, 1);
        assert_eq!(report.events_migrated, 1);
        assert_eq!(report.events_skipped, 0);

        // 作成者参照はプライマリ採番の ID に読み替えられている
        let migrated_user = h.users_primary.find_by_email("bob@example.com").await?.unwrap();
        assert_eq!(migrated_user.id.store_kind(), StoreKind::Primary);
        let events = h.events_primary.find_all().await?;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].created_by.id, migrated_user.id);

        // RSVP も一緒に運ばれる
        assert_eq!(events[0].rsvp_count(), 2);

        // 移行は複製であって移動ではない
        assert_eq!(h.users_fallback.count().await?, 1);
        assert_eq!(h.events_fallback.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn migration_is_idempotent() -> Result<()> {
        let h = harness(true);
        let bob = h
            .users_fallback
            .insert(&seeded_user("Bob", "bob@example.com", "pw"))
            .await?;
        h.events_fallback
            .insert(&seeded_event("Fallback Meetup", day(2025, 7, 2), &bob))
            .await?;

        let first = h.service.migrate_fallback().await?;
        assert_eq!(first.total(), 2);

        let second = h.service.migrate_fallback().await?;
        assert_eq!(second.total(), 0);

        assert_eq!(h.users_primary.count().await?, 1);
        assert_eq!(h.events_primary.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn primary_copy_wins_over_the_fallback_copy() -> Result<()> {
        let h = harness(true);
        h.users_primary
            .insert(&seeded_user("New Name", "bob@example.com", "pw"))
            .await?;
        h.users_fallback
            .insert(&seeded_user("Old Name", "bob@example.com", "pw"))
            .await?;

        let report = h.service.migrate_fallback().await?;

        assert_eq!(report.users_migrated, 0);
        let kept = h.users_primary.find_by_email("bob@example.com").await?.unwrap();
        assert_eq!(kept.name, "New Name");
        assert_eq!(h.users_primary.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn event_with_unresolvable_creator_is_skipped_not_dropped() -> Result<()> {
        let h = harness(true);
        // 作成者がどちらのストアにも居ないイベント
        let ghost = seeded_user("Ghost", "ghost@example.com", "pw");
        h.events_fallback
            .insert(&seeded_event("Orphan Meetup", day(2025, 7, 2), &ghost))
            .await?;

        let report = h.service.migrate_fallback().await?;

        assert_eq!(report.events_migrated, 0);
        assert_eq!(report.events_skipped, 1);
        assert_eq!(h.events_primary.count().await?, 0);
        // フォールバック側には残っているので、後から解決できれば移行される
        assert_eq!(h.events_fallback.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn natural_key_prevents_duplicate_events() -> Result<()> {
        let h = harness(true);
        let bob = h
            .users_fallback
            .insert(&seeded_user("Bob", "bob@example.com", "pw"))
            .await?;
        h.events_fallback
            .insert(&seeded_event("Fallback Meetup", day(2025, 7, 2), &bob))
            .await?;

        h.service.migrate_fallback().await?;
        // 同じ名前・開催日・作成者のレコードをもう一度流し込んでも増えない
        let report = h.service.migrate_fallback().await?;

        assert_eq!(report.events_migrated, 0);
        assert_eq!(h.events_primary.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn does_nothing_while_primary_is_down() -> Result<()> {
        let h = harness(false);
        h.users_fallback
            .insert(&seeded_user("Bob", "bob@example.com", "pw"))
            .await?;

        let report = h.service.migrate_fallback().await?;

        assert_eq!(report, MigrationReport::default());
        Ok(())
    }

    #[tokio::test]
    async fn remove_migrated_only_deletes_confirmed_copies() -> Result<()> {
        let h = harness(true);
        let bob = h
            .users_fallback
            .insert(&seeded_user("Bob", "bob@example.com", "pw"))
            .await?;
        h.events_fallback
            .insert(&seeded_event("Fallback Meetup", day(2025, 7, 2), &bob))
            .await?;
        // こちらは移行されないレコード
        let ghost = seeded_user("Ghost", "ghost@example.com", "pw");
        h.events_fallback
            .insert(&seeded_event("Orphan Meetup", day(2025, 7, 3), &ghost))
            .await?;

        h.service.migrate_fallback().await?;
        let removed = h.service.remove_migrated().await?;

        assert_eq!(removed, 2);
        assert_eq!(h.users_fallback.count().await?, 0);
        assert_eq!(h.events_fallback.count().await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn pending_records_counts_the_backlog() -> Result<()> {
        let h = harness(false);
        let bob = h
            .users_fallback
            .insert(&seeded_user("Bob", "bob@example.com", "pw"))
            .await?;
        h.events_fallback
            .insert(&seeded_event("Fallback Meetup", day(2025, 7, 2), &bob))
            .await?;

        assert_eq!(h.service.pending_records().await?, (1, 1));
        Ok(())
    }

    #[tokio::test]
    async fn fallback_registration_becomes_visible_after_recovery() -> Result<()> {
        use crate::model::user::event::CreateUser;

        let h = harness(false);
        let user_service = UserService::new(
            h.users_primary.clone(),
            h.users_fallback.clone(),
            Arc::new(h.switch.clone()),
            Arc::new(h.service.clone()),
        );

        // 停止中に登録する
        let registered = user_service
            .register_user(CreateUser::new(
                "Alice".into(),
                "alice@example.com".into(),
                "secret123".into(),
            ))
            .await?;
        assert_eq!(registered.served_by, StoreKind::Fallback);

        // 復旧後の移行でプライマリへ写る
        h.switch.set_probe(true);
        h.switch.set_reachable(true);
        h.service.migrate_fallback().await?;

        let served = user_service
            .authenticate_user("alice@example.com", "secret123")
            .await?;
        assert_eq!(served.served_by, StoreKind::Primary);
        assert_eq!(served.value.name, "Alice");
        assert_eq!(served.value.created_at, registered.value.created_at);
        Ok(())
    }

    #[tokio::test]
    async fn fallback_event_becomes_visible_after_recovery() -> Result<()> {
        use crate::model::event::event::CreateEvent;
        use crate::service::event::EventService;
        use chrono::NaiveTime;

        let h = harness(false);
        let event_service = EventService::new(
            h.events_primary.clone(),
            h.events_fallback.clone(),
            h.users_primary.clone(),
            h.users_fallback.clone(),
            Arc::new(h.switch.clone()),
            Arc::new(h.service.clone()),
        );
        let bob = h
            .users_fallback
            .insert(&seeded_user("Bob", "bob@example.com", "pw"))
            .await?;

        // 停止中に作成する
        let created = event_service
            .create_event(CreateEvent::new(
                "Recovery Meetup".into(),
                "created during the outage".into(),
                day(2025, 7, 2),
                NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
                "Community Hall".into(),
                None,
                50,
                bob.id.clone(),
            ))
            .await?;
        assert_eq!(created.served_by, StoreKind::Fallback);

        let listed = event_service.list_events().await?;
        assert_eq!(listed.served_by, StoreKind::Fallback);
        assert_eq!(listed.value.len(), 1);

        // 復旧後の移行で、同じ名前・開催日のイベントがプライマリから見える
        h.switch.set_probe(true);
        h.switch.set_reachable(true);
        h.service.migrate_fallback().await?;

        let listed = event_service.list_events().await?;
        assert_eq!(listed.served_by, StoreKind::Primary);
        assert_eq!(listed.value.len(), 1);
        assert_eq!(listed.value[0].name, "Recovery Meetup");
        assert_eq!(listed.value[0].date, created.value.date);
        assert_eq!(listed.value[0].created_by.id.store_kind(), StoreKind::Primary);
        Ok(())
    }

    #[tokio::test]
    async fn mid_run_outage_stops_quietly_with_a_partial_report() -> Result<()> {
        let h = harness(true);
        h.users_fallback
            .insert(&seeded_user("Bob", "bob@example.com", "pw"))
            .await?;
        let mut second = seeded_user("Carol", "carol@example.com", "pw");
        second.created_at = Utc::now() - chrono::Duration::seconds(60);
        h.users_fallback.insert(&second).await?;

        // 1 人目を写した直後に接続が落ちる
        h.users_primary.fail_after(1);

        let report = h.service.migrate_fallback().await?;

        assert_eq!(report.users_migrated, 1);
        assert_eq!(report.events_migrated, 0);
        Ok(())
    }
}
