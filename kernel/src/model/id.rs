use std::str::FromStr;

use crate::model::store::StoreKind;

macro_rules! define_id {
    ($id_type:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $id_type(String);

        impl $id_type {
            // フォールバック側で採番する ID は UUID v4。
            // プライマリ側の ID は 24 桁 16 進で、ストアが採番する。
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn from_raw(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            // ID の形からどちらのストアが採番したかを判定する。
            // UUID はハイフンを含むため 24 桁 16 進とは衝突しない。
            pub fn store_kind(&self) -> StoreKind {
                if self.0.len() == 24 && self.0.bytes().all(|b| b.is_ascii_hexdigit()) {
                    StoreKind::Primary
                } else {
                    StoreKind::Fallback
                }
            }
        }

        impl Default for $id_type {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $id_type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $id_type {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl FromStr for $id_type {
            type Err = std::convert::Infallible;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.to_string()))
            }
        }
    };
}

define_id!(UserId);
define_id!(EventId);
