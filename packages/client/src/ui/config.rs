//! Client configuration.

use std::{path::PathBuf, time::Duration};

use crate::domain::IdentityToken;

pub use crate::infrastructure::storage::file::DEFAULT_POLL_INTERVAL;

pub const DEFAULT_STORAGE_DIR: &str = ".bossbattle";
pub const DEFAULT_SOCKET_URL: &str = "ws://127.0.0.1:8080/preview";

/// Settings consumed by [`run_client`](super::run_client)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Directory shared by every client process on this machine
    pub storage_dir: PathBuf,
    /// Base endpoint of the realtime preview server
    pub socket_url: String,
    /// Authenticated identity; guests get a generated token instead
    pub user_token: Option<IdentityToken>,
    /// How often the storage directory is checked for external changes
    pub poll_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            user_token: None,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // テスト項目: デフォルト設定が期待する値になる
        // given (前提条件):

        // when (操作):
        let config = ClientConfig::default();

        // then (期待する結果):
        assert_eq!(config.storage_dir, PathBuf::from(".bossbattle"));
        assert_eq!(config.socket_url, "ws://127.0.0.1:8080/preview");
        assert_eq!(config.user_token, None);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }
}
