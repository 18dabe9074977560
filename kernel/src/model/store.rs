use strum::Display;

// どちらのストアが要求を処理したかを表すタグ。
// 利用側はこのタグを応答にそのまま載せられる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StoreKind {
    Primary,
    Fallback,
}

// 処理結果と、それを処理したストアの組。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served<T> {
    pub value: T,
    pub served_by: StoreKind,
}

impl<T> Served<T> {
    pub fn primary(value: T) -> Self {
        Self {
            value,
            served_by: StoreKind::Primary,
        }
    }

    pub fn fallback(value: T) -> Self {
        Self {
            value,
            served_by: StoreKind::Fallback,
        }
    }
}
