pub mod event;
pub mod migration;
pub mod user;

#[cfg(test)]
pub(crate) mod test_support;

// メールアドレスは保存時も照合時も同じ形に正規化する
pub(crate) fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}
