use std::time::Duration;

use adapter::database::connect_database_with;
use anyhow::Result;
use kernel::repository::health::HealthCheckRepository;
use registry::AppRegistry;
use shared::config::AppConfig;
use tokio::time::sleep;

use shared::env::{which, Environment};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    init_logger()?;
    bootstrap().await
}

fn init_logger() -> Result<()> {
    let log_level = match which() {
        Environment::Development => "debug",
        Environment::Production => "info",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| log_level.into());

    let subscriber = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(subscriber)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

async fn bootstrap() -> Result<()> {
    let app_config = AppConfig::new()?;
    let interval = Duration::from_secs(app_config.migration.interval_secs);

    let pool = connect_database_with(&app_config.database).await?;
    // プライマリが止まっていて張れない索引は、次回起動以降に任せる
    if let Err(e) = pool.ensure_indexes().await {
        tracing::warn!(
            error.cause_chain = ?e, error.message = %e,
            "could not ensure primary store indexes"
        );
    }

    let registry = AppRegistry::new(pool, app_config);
    report_store_status(&registry).await;

    // --------------------------
    // フォールバック移行ループ
    // --------------------------
    // リクエスト契機の移行だけだと、復旧後に誰も触らないレコードが
    // 残り続けるため、定期的にも拾う
    loop {
        match registry.migration_service().migrate_fallback().await {
            Ok(report) if report.total() > 0 => {
                tracing::info!(
                    users = report.users_migrated,
                    events = report.events_migrated,
                    skipped = report.events_skipped,
                    "fallback records migrated"
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    error.cause_chain = ?e, error.message = %e,
                    "fallback migration failed"
                );
            }
        }
        sleep(interval).await;
    }
}

async fn report_store_status(registry: &AppRegistry) {
    let primary_available = registry.health_check_repository().check_db().await;
    match registry.migration_service().pending_records().await {
        Ok((users, events)) => {
            tracing::info!(
                primary_available,
                pending_users = users,
                pending_events = events,
                "storage status at startup"
            );
        }
        Err(e) => {
            tracing::warn!(
                error.cause_chain = ?e, error.message = %e,
                "could not read fallback backlog"
            );
        }
    }
}
