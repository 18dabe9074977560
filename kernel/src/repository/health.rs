use async_trait::async_trait;

#[async_trait]
pub trait HealthCheckRepository: Send + Sync {
    // プライマリストアに到達できるかを返す。失敗しても Err にはしない
    async fn check_db(&self) -> bool;
}
