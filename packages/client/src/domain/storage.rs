//! キーバリューストレージのポート
//!
//! ブラウザの localStorage と storage イベントに相当する抽象化です。
//! 書き込んだハンドル自身には通知されず、同じストレージを共有する
//! 他のハンドル（他のタブ・他のプロセス）にのみ変更が通知されます。

use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};

use super::error::StorageError;

/// 他のハンドルによるストレージ変更の通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEvent {
    pub key: String,
    /// 新しい値（削除された場合は `None`）
    pub new_value: Option<String>,
}

/// 通知元ハンドルを含む内部通知
#[derive(Debug, Clone)]
pub struct StorageNotice {
    /// 通知元ハンドルの ID（ストレージ外部からの変更は 0）
    pub source: u64,
    pub event: StorageEvent,
}

/// ストレージ変更の購読
///
/// 自分自身（`source` が一致するハンドル）の変更は読み飛ばします。
pub struct StorageSubscription {
    receiver: broadcast::Receiver<StorageNotice>,
    source: u64,
}

impl StorageSubscription {
    pub fn new(receiver: broadcast::Receiver<StorageNotice>, source: u64) -> Self {
        Self { receiver, source }
    }

    /// 次の変更通知を待つ
    ///
    /// ストレージが破棄された場合は `None` を返す。取りこぼした通知はスキップする。
    pub async fn recv(&mut self) -> Option<StorageEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(notice) if notice.source == self.source => continue,
                Ok(notice) => return Some(notice.event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Storage subscriber lagged, skipped {} notices", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// キーバリューストレージ
///
/// 読み書きはベストエフォートで、呼び出し側はエラーをログに記録して継続する想定。
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    async fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// 他のハンドルによる変更の購読を開始
    fn subscribe(&self) -> StorageSubscription;
}
