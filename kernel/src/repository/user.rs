use async_trait::async_trait;
use shared::error::AppResult;

use crate::model::{id::UserId, user::User};

// ユーザーストアの共通契約。プライマリとフォールバックの両実装が従う。
// insert の ID はストア側で採番し直してよく、呼び出し側は戻り値の ID を使う。
#[async_trait]
pub trait UserRepository: Send + Sync {
    // 新規レコードとして保存し、保存された形を返す
    async fn insert(&self, user: &User) -> AppResult<User>;
    // ID からユーザーを取得する
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<User>>;
    // メールアドレス（自然キー）からユーザーを取得する
    async fn find_by_email(&self, email: &str) -> AppResult<Option<User>>;
    // 全ユーザーを作成日時の降順で取得する
    async fn find_all(&self) -> AppResult<Vec<User>>;
    // レコード全体を ID で置き換える
    async fn update(&self, user: &User) -> AppResult<()>;
    // ID のレコードを削除する
    async fn delete(&self, user_id: UserId) -> AppResult<()>;
    // 件数を数える
    async fn count(&self) -> AppResult<u64>;
}
