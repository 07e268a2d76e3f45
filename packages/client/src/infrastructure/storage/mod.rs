//! KeyValueStorage の実装
//!
//! - `memory`: 同一プロセス内のタブを模したインメモリ実装
//! - `file`: ディレクトリ上の JSON ファイルとポーリングによるプロセス間共有

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::InMemoryStorage;

/// ストレージ外部からの変更を示す通知元 ID
pub(crate) const EXTERNAL_SOURCE: u64 = 0;

/// 通知チャンネルの容量
pub(crate) const NOTICE_CHANNEL_CAPACITY: usize = 64;
