//! File KeyValueStorage 実装
//!
//! ディレクトリ配下にキーごとの JSON ファイル（`<dir>/<key>.json`）を置きます。
//! 同じディレクトリを開いた他のプロセスの変更は、一定間隔のポーリングで
//! 検出して storage イベントとして通知します。
//!
//! ## 設計ノート
//!
//! - 書き込みは一時ファイルへの書き込み + rename で行う
//! - `known` は最後に観測した（または自分で書き込んだ）ディスクの内容で、
//!   ディスク操作とポーリングはすべてこのロックの下で行う。
//!   自分の書き込みは `known` に先に反映されるため、自分に通知が戻ることはない
//! - 同じキーへの同時書き込みは後勝ち（ロックは取らない）

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use tokio::{
    sync::{Mutex, broadcast},
    task::JoinHandle,
    time::MissedTickBehavior,
};

use crate::domain::{
    KeyValueStorage, StorageError, StorageEvent, StorageNotice, StorageSubscription,
};

use super::{EXTERNAL_SOURCE, NOTICE_CHANNEL_CAPACITY};

/// デフォルトのポーリング間隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

const FILE_SUFFIX: &str = ".json";
const LOCAL_SOURCE: u64 = EXTERNAL_SOURCE + 1;

struct Inner {
    dir: PathBuf,
    known: Mutex<HashMap<String, String>>,
    notices: broadcast::Sender<StorageNotice>,
}

/// ファイルベースのストレージ
pub struct FileStorage {
    inner: Arc<Inner>,
    poller: JoinHandle<()>,
}

impl FileStorage {
    /// ディレクトリを開き（無ければ作成し）、変更のポーリングを開始
    pub async fn open(
        dir: impl Into<PathBuf>,
        poll_interval: Duration,
    ) -> Result<Self, StorageError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        let known = scan(&dir).await?;

        let (notices, _) = broadcast::channel(NOTICE_CHANNEL_CAPACITY);
        let inner = Arc::new(Inner {
            dir,
            known: Mutex::new(known),
            notices,
        });

        let poller = tokio::spawn(poll_loop(
            inner.clone(),
            poll_interval.max(Duration::from_millis(1)),
        ));

        tracing::debug!("Opened file storage at {}", inner.dir.display());

        Ok(Self { inner, poller })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }
}

impl Drop for FileStorage {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

#[async_trait]
impl KeyValueStorage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.inner.path_for(key)?;
        read_optional(&path).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.inner.path_for(key)?;
        let tmp = self
            .inner
            .dir
            .join(format!(".{}.{}.tmp", encode_key(key), uuid::Uuid::new_v4()));

        let mut known = self.inner.known.lock().await;
        tokio::fs::write(&tmp, value).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        known.insert(key.to_string(), value.to_string());
        tracing::debug!("Stored '{}' at {}", key, path.display());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.inner.path_for(key)?;

        let mut known = self.inner.known.lock().await;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!("Removed '{}'", key),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        known.remove(key);
        Ok(())
    }

    fn subscribe(&self) -> StorageSubscription {
        StorageSubscription::new(self.inner.notices.subscribe(), LOCAL_SOURCE)
    }
}

impl Inner {
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() {
            return Err(StorageError::EmptyKey);
        }
        Ok(self.dir.join(format!("{}{}", encode_key(key), FILE_SUFFIX)))
    }

    /// ディスクの内容を `known` と比較し、差分を通知する
    async fn poll_once(&self) -> Result<(), StorageError> {
        let mut known = self.known.lock().await;
        let on_disk = scan(&self.dir).await?;

        for (key, value) in &on_disk {
            if known.get(key) != Some(value) {
                self.emit(key, Some(value.clone()));
            }
        }
        for key in known.keys() {
            if !on_disk.contains_key(key) {
                self.emit(key, None);
            }
        }

        *known = on_disk;
        Ok(())
    }

    fn emit(&self, key: &str, new_value: Option<String>) {
        tracing::debug!("Detected external change of '{}'", key);
        let _ = self.notices.send(StorageNotice {
            source: EXTERNAL_SOURCE,
            event: StorageEvent {
                key: key.to_string(),
                new_value,
            },
        });
    }
}

async fn poll_loop(inner: Arc<Inner>, poll_interval: Duration) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = inner.poll_once().await {
            tracing::warn!("Failed to poll {}: {}", inner.dir.display(), e);
        }
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>, StorageError> {
    match tokio::fs::read_to_string(path).await {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// ディレクトリ内の全エントリを読み込む
async fn scan(dir: &Path) -> Result<HashMap<String, String>, StorageError> {
    let mut entries = HashMap::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = read_dir.next_entry().await? {
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let Some(key) = name.strip_suffix(FILE_SUFFIX).and_then(decode_key) else {
            continue;
        };
        // 読み込み直前に削除された場合は存在しないものとして扱う
        if let Some(value) = read_optional(&entry.path()).await? {
            entries.insert(key, value);
        }
    }

    Ok(entries)
}

fn is_plain(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-'
}

/// キーをファイル名に使える形に変換（英数字・`_`・`-` 以外は `%XX`）
pub(crate) fn encode_key(key: &str) -> String {
    let mut encoded = String::with_capacity(key.len());
    for byte in key.bytes() {
        if is_plain(byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

pub(crate) fn decode_key(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = encoded.get(i + 1..i + 3)?;
                decoded.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            byte if is_plain(byte) => {
                decoded.push(byte);
                i += 1;
            }
            _ => return None,
        }
    }

    String::from_utf8(decoded).ok()
}
