use mongodb::{
    bson::{doc, oid::ObjectId},
    options::{ClientOptions, IndexOptions},
    Client, Collection, Database, IndexModel,
};
use shared::{
    config::DatabaseConfig,
    error::{AppError, AppResult},
};

use crate::database::model::{event::EventDocument, user::UserDocument};

pub mod model;

#[derive(Clone)]
pub struct ConnectionPool {
    db: Database,
}

impl ConnectionPool {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn inner_ref(&self) -> &Database {
        &self.db
    }

    pub fn users(&self) -> Collection<UserDocument> {
        self.db.collection("users")
    }

    pub fn events(&self) -> Collection<EventDocument> {
        self.db.collection("events")
    }

    // 既存の運用と同じ索引を冪等に張る。接続できないときは呼び出し側が諦める
    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let unique_email = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.users()
            .create_indexes([unique_email], None)
            .await
            .map_err(classify_error)?;

        let by_creator = IndexModel::builder().keys(doc! { "created_by": 1 }).build();
        let by_date = IndexModel::builder().keys(doc! { "date": 1 }).build();
        self.events()
            .create_indexes([by_creator, by_date], None)
            .await
            .map_err(classify_error)?;
        Ok(())
    }
}

// 接続は遅延で張られる。ここではまだサーバーに触らない
pub async fn connect_database_with(cfg: &DatabaseConfig) -> AppResult<ConnectionPool> {
    let mut options = ClientOptions::parse(&cfg.uri).await.map_err(classify_error)?;
    options.app_name = Some("ems-backend".into());
    options.server_selection_timeout = Some(cfg.probe_timeout());
    options.connect_timeout = Some(cfg.probe_timeout());
    let client = Client::with_options(options).map_err(classify_error)?;
    Ok(ConnectionPool::new(client.database(&cfg.database)))
}

// ドライバのエラーを閉じた種別に読み替える。分類はこの境界でだけ行い、
// サービス層は is_connectivity だけで分岐する
pub(crate) fn classify_error(e: mongodb::error::Error) -> AppError {
    use mongodb::error::{ErrorKind, WriteFailure};

    let connectivity = matches!(
        e.kind.as_ref(),
        ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::DnsResolve { .. }
            | ErrorKind::Authentication { .. }
            | ErrorKind::ConnectionPoolCleared { .. }
    );
    if connectivity {
        return AppError::StoreUnavailable(anyhow::Error::new(e));
    }

    let duplicate = match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write)) => write.code == 11000,
        ErrorKind::Command(command) => command.code == 11000,
        _ => false,
    };
    if duplicate {
        return AppError::DuplicateKey("duplicate key".into());
    }

    AppError::SpecificOperationError(anyhow::Error::new(e))
}

// 24 桁 16 進でなければこのストアの ID ではない
pub(crate) fn object_id(raw: &str) -> AppResult<ObjectId> {
    ObjectId::parse_str(raw).map_err(|_| AppError::InvalidId(raw.to_string()))
}
