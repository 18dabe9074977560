use std::{io::ErrorKind, marker::PhantomData, path::PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use shared::error::{AppError, AppResult};
use tokio::sync::Mutex;
use tracing::warn;

pub mod event;
pub mod user;

// エンティティ種別ごとに 1 つの JSON 配列ファイルを受け持つ。
// 書き込みはファイル単位の排他で直列化する。
pub(crate) struct JsonFile<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> JsonFile<T> {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    // 読み出しは失敗しない。ファイルが無い・読めない・壊れている、の
    // いずれも空として扱う
    pub(crate) async fn load(&self) -> Vec<T> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "fallback file unreadable; treating as empty");
                return Vec::new();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(records) => records,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "fallback file corrupt; treating as empty");
                Vec::new()
            }
        }
    }

    async fn save(&self, records: &[T]) -> AppResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(AppError::FileStoreError)?;
        }
        let json = serde_json::to_vec_pretty(records)?;
        // 書き込みの途中で落ちても元のファイルが残るよう、隣に書いてから置き換える
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(AppError::FileStoreError)?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(AppError::FileStoreError)?;
        Ok(())
    }

    // load → 変形 → save を 1 回の排他区間で行う
    pub(crate) async fn with_records<R>(
        &self,
        apply: impl FnOnce(&mut Vec<T>) -> R,
    ) -> AppResult<R> {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await;
        let out = apply(&mut records);
        self.save(&records).await?;
        Ok(out)
    }
}
