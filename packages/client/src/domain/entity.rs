//! Entity 定義

use std::fmt;

use serde::{Deserialize, Serialize};

use super::value_object::{BossId, EventId, Nickname};

/// ある ID が現在参加しているボスの情報
///
/// 永続化フォーマットは `{"bossId":…,"eventId":…,"nickname":…}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRecord {
    pub boss_id: BossId,
    pub event_id: EventId,
    pub nickname: Nickname,
}

impl JoinRecord {
    pub fn new(boss_id: BossId, event_id: EventId, nickname: Nickname) -> Self {
        Self {
            boss_id,
            event_id,
            nickname,
        }
    }

    /// 永続化用の JSON 文字列に変換
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// 永続化された JSON 文字列から復元
    ///
    /// フィールド欠落・型不一致・JSON 以外の文字列はすべてエラーになる。
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl fmt::Display for JoinRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "boss '{}' in event '{}' as '{}'",
            self.boss_id, self.event_id, self.nickname
        )
    }
}

/// リアルタイム接続の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    /// 状態遷移が許可されているか
    ///
    /// - `Disconnected → Connecting`
    /// - `Connecting → Connected | Error`
    /// - `Connected → Error`
    /// - 任意の状態 `→ Disconnected`（切断・後始末）
    pub fn can_transition_to(self, next: ConnectionStatus) -> bool {
        use ConnectionStatus::*;

        match (self, next) {
            (current, next) if current == next => false,
            (_, Disconnected) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Connected) | (Connecting, Error) => true,
            (Connected, Error) => true,
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// リアルタイム接続の対象（ボスとイベントの組）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewTarget {
    pub boss_id: BossId,
    pub event_id: EventId,
}

impl PreviewTarget {
    pub fn new(boss_id: BossId, event_id: EventId) -> Self {
        Self { boss_id, event_id }
    }

    /// 両方の ID が揃っている場合のみ接続対象を構築する
    pub fn from_parts(boss_id: Option<BossId>, event_id: Option<EventId>) -> Option<Self> {
        Some(Self::new(boss_id?, event_id?))
    }
}
