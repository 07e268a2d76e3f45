//! Domain 層
//!
//! 参加状態（JoinRecord）と接続状態（ConnectionStatus）のモデル、および
//! Infrastructure 層が実装するポート（trait）を定義します。

pub mod entity;
pub mod error;
pub mod identity;
pub mod service;
pub mod storage;
pub mod transport;
pub mod value_object;

pub use entity::{ConnectionStatus, JoinRecord, PreviewTarget};
pub use error::{JoinError, StorageError, TransportError};
pub use identity::{GuestTokenProvider, IdentityProvider};
pub use service::{STORAGE_KEY_PREFIX, can_join, storage_key_for};
pub use storage::{KeyValueStorage, StorageEvent, StorageNotice, StorageSubscription};
pub use transport::{ConnectionEvent, OutboundMessage, RealtimeConnection, RealtimeConnector};
pub use value_object::{BossId, EventId, IdentityToken, Nickname};
