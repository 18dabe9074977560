use std::time::Duration;

use async_trait::async_trait;
use derive_new::new;
use kernel::repository::health::HealthCheckRepository;
use mongodb::bson::doc;

use crate::database::ConnectionPool;

#[derive(new)]
pub struct HealthCheckRepositoryImpl {
    db: ConnectionPool,
    timeout: Duration,
}

#[async_trait]
impl HealthCheckRepository for HealthCheckRepositoryImpl {
    // 最も安価な問い合わせを 1 回だけ投げる。ドライバ側の打ち切りに加えて
    // こちらでも時間を区切り、どんな失敗も「利用不可」に丸める
    async fn check_db(&self) -> bool {
        let ping = self.db.inner_ref().run_command(doc! { "ping": 1 }, None);
        matches!(tokio::time::timeout(self.timeout, ping).await, Ok(Ok(_)))
    }
}
