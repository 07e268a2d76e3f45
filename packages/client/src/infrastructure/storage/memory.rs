//! InMemory KeyValueStorage 実装
//!
//! 同一オリジンの複数タブを同一プロセス内で再現します。
//! `open_tab()` で作ったハンドル同士はデータを共有し、
//! 互いの変更を storage イベントとして受け取ります。

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use tokio::sync::{Mutex, broadcast};

use crate::domain::{
    KeyValueStorage, StorageError, StorageEvent, StorageNotice, StorageSubscription,
};

use super::{EXTERNAL_SOURCE, NOTICE_CHANNEL_CAPACITY};

/// 複数タブで共有されるオリジン
struct Origin {
    entries: Mutex<HashMap<String, String>>,
    notices: broadcast::Sender<StorageNotice>,
    next_source: AtomicU64,
}

/// インメモリストレージの 1 タブ分のハンドル
pub struct InMemoryStorage {
    origin: Arc<Origin>,
    source: u64,
}

impl InMemoryStorage {
    /// 新しいオリジンとその最初のタブを作成
    pub fn new() -> Self {
        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        let origin = Arc::new(Origin {
            entries: Mutex::new(HashMap::new()),
            notices,
            next_source: AtomicU64::new(EXTERNAL_SOURCE + 1),
        });
        Self::attach(origin)
    }

    /// 同じオリジンを共有する別のタブを開く
    pub fn open_tab(&self) -> Self {
        Self::attach(self.origin.clone())
    }

    fn attach(origin: Arc<Origin>) -> Self {
        let source = origin.next_source.fetch_add(1, Ordering::Relaxed);
        Self { origin, source }
    }

    fn notify(&self, key: &str, new_value: Option<String>) {
        let notice = StorageNotice {
            source: self.source,
            event: StorageEvent {
                key: key.to_string(),
                new_value,
            },
        };
        // 購読者がいない場合の送信失敗は無視してよい
        let _ = self.origin.notices.send(notice);
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStorage for InMemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if key.is_empty() {
            return Err(StorageError::EmptyKey);
        }
        let entries = self.origin.entries.lock().await;
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::EmptyKey);
        }
        let mut entries = self.origin.entries.lock().await;
        let previous = entries.insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            self.notify(key, Some(value.to_string()));
        }
        tracing::debug!("Stored '{}' (tab {})", key, self.source);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::EmptyKey);
        }
        let mut entries = self.origin.entries.lock().await;
        if entries.remove(key).is_some() {
            self.notify(key, None);
            tracing::debug!("Removed '{}' (tab {})", key, self.source);
        }
        Ok(())
    }

    fn subscribe(&self) -> StorageSubscription {
        StorageSubscription::new(self.origin.notices.subscribe(), self.source)
    }
}
