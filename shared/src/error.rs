use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    EntityNotFound(String),
    #[error("{0}")]
    DuplicateKey(String),
    #[error("{0}")]
    DuplicateRsvp(String),
    #[error("{0}")]
    EventFull(String),
    #[error("invalid id format: {0}")]
    InvalidId(String),
    #[error("invalid email or password")]
    UnauthenticatedError,
    #[error("{0}")]
    ConversionEntityError(String),
    #[error("primary store is unreachable")]
    StoreUnavailable(#[source] anyhow::Error),
    #[error("fallback store I/O failed")]
    FileStoreError(#[source] std::io::Error),
    #[error("fallback store serialization failed")]
    SerializationError(#[from] serde_json::Error),
    #[error("password hashing failed")]
    BcryptError(#[from] bcrypt::BcryptError),
    #[error("primary store operation failed")]
    SpecificOperationError(#[source] anyhow::Error),
}

impl AppError {
    /// 接続断に由来するエラーか。真ならフォールバック側で救済できる
    pub fn is_connectivity(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }
}

pub type AppResult<T> = Result<T, AppError>;
