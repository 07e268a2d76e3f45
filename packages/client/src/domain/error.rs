//! Domain 層のエラー型

use thiserror::Error;

use super::entity::JoinRecord;

/// ストレージ操作のエラー
#[derive(Debug, Error)]
pub enum StorageError {
    /// キーが空
    #[error("Storage key must not be empty")]
    EmptyKey,

    /// 入出力エラー
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// リアルタイム接続のエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// 接続先 URL が不正
    #[error("Invalid realtime endpoint: {0}")]
    InvalidEndpoint(String),

    /// 認証情報をヘッダーに載せられない
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// 接続確立に失敗
    #[error("Connection error: {0}")]
    Connect(String),

    /// 送信に失敗
    #[error("Send error: {0}")]
    Send(String),

    /// 切断処理に失敗
    #[error("Close error: {0}")]
    Close(String),
}

/// 参加（join）の拒否理由
///
/// `can_join` が false の状態で参加チェック付きの join を行った場合のみ返される。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JoinError {
    #[error("Already joined {current}; leave first")]
    AlreadyJoined { current: JoinRecord },
}
