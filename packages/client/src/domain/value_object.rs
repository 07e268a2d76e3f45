//! Value Object 定義
//!
//! ボス ID・イベント ID などはバックエンドが発行する不透明な識別子として扱い、
//! ここでは検証を行いません（呼び出し側が正しい値を渡す前提）。

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! opaque_string {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

opaque_string!(
    /// ボスの識別子
    BossId
);

opaque_string!(
    /// イベントの識別子
    EventId
);

opaque_string!(
    /// バトル中に表示されるニックネーム
    Nickname
);

opaque_string!(
    /// 永続化キーに使う ID（認証ユーザーのトークン、またはゲストトークン）
    IdentityToken
);
