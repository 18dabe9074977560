use std::sync::Arc;

use adapter::fallback::{event::FallbackEventRepositoryImpl, user::FallbackUserRepositoryImpl};
use adapter::repository::event::EventRepositoryImpl;
use adapter::repository::user::UserRepositoryImpl;
use adapter::{database::ConnectionPool, repository::health::HealthCheckRepositoryImpl};
use kernel::repository::event::EventRepository;
use kernel::repository::health::HealthCheckRepository;
use kernel::repository::user::UserRepository;
use kernel::service::event::EventService;
use kernel::service::migration::{MigrationService, MigrationTrigger};
use kernel::service::user::UserService;
use shared::config::AppConfig;

#[derive(Clone)]
pub struct AppRegistry {
    health_check_repository: Arc<dyn HealthCheckRepository>,
    user_service: Arc<UserService>,
    event_service: Arc<EventService>,
    migration_service: Arc<MigrationService>,
}

impl AppRegistry {
    pub fn new(pool: ConnectionPool, app_config: AppConfig) -> Self {
        let health_check_repository: Arc<dyn HealthCheckRepository> = Arc::new(
            HealthCheckRepositoryImpl::new(pool.clone(), app_config.database.probe_timeout()),
        );

        // 同じエンティティをプライマリとフォールバックの 2 系統で持つ
        let user_primary: Arc<dyn UserRepository> = Arc::new(UserRepositoryImpl::new(pool.clone()));
        let user_fallback: Arc<dyn UserRepository> = Arc::new(FallbackUserRepositoryImpl::new(
            &app_config.fallback.data_dir,
        ));
        let event_primary: Arc<dyn EventRepository> =
            Arc::new(EventRepositoryImpl::new(pool.clone()));
        let event_fallback: Arc<dyn EventRepository> = Arc::new(FallbackEventRepositoryImpl::new(
            &app_config.fallback.data_dir,
        ));

        let migration_service = Arc::new(MigrationService::new(
            user_primary.clone(),
            user_fallback.clone(),
            event_primary.clone(),
            event_fallback.clone(),
            health_check_repository.clone(),
        ));
        let migration_trigger: Arc<dyn MigrationTrigger> =
            Arc::new(migration_service.as_ref().clone());

        let user_service = Arc::new(UserService::new(
            user_primary.clone(),
            user_fallback.clone(),
            health_check_repository.clone(),
            migration_trigger.clone(),
        ));
        let event_service = Arc::new(EventService::new(
            event_primary,
            event_fallback,
            user_primary,
            user_fallback,
            health_check_repository.clone(),
            migration_trigger,
        ));

        Self {
            health_check_repository,
            user_service,
            event_service,
            migration_service,
        }
    }

    pub fn health_check_repository(&self) -> Arc<dyn HealthCheckRepository> {
        self.health_check_repository.clone()
    }

    pub fn user_service(&self) -> Arc<UserService> {
        self.user_service.clone()
    }

    pub fn event_service(&self) -> Arc<EventService> {
        self.event_service.clone()
    }

    pub fn migration_service(&self) -> Arc<MigrationService> {
        self.migration_service.clone()
    }
}
