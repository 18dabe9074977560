use std::{env, path::PathBuf, time::Duration};

use anyhow::Result;

pub struct AppConfig {
    pub database: DatabaseConfig,
    pub fallback: FallbackConfig,
    pub migration: MigrationConfig,
}

impl AppConfig {
    pub fn new() -> Result<Self> {
        let database = DatabaseConfig {
            uri: env::var("MONGODB_URI").unwrap_or_else(|_| "mongodb://localhost:27017".into()),
            database: env::var("MONGODB_DB_NAME").unwrap_or_else(|_| "ems_database".into()),
            timeout_secs: env::var("MONGODB_TIMEOUT_SECS")
                .unwrap_or_else(|_| "3".into())
                .parse()?,
        };
        let fallback = FallbackConfig {
            data_dir: env::var("FALLBACK_DATA_DIR")
                .unwrap_or_else(|_| "data".into())
                .into(),
        };
        let migration = MigrationConfig {
            interval_secs: env::var("MIGRATION_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()?,
        };
        Ok(Self {
            database,
            fallback,
            migration,
        })
    }
}

pub struct DatabaseConfig {
    pub uri: String,
    pub database: String,
    pub timeout_secs: u64,
}

impl DatabaseConfig {
    /// 死活監視と接続確立の両方に使う打ち切り時間
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

pub struct FallbackConfig {
    pub data_dir: PathBuf,
}

pub struct MigrationConfig {
    pub interval_secs: u64,
}
