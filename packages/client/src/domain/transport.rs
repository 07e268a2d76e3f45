//! リアルタイム接続のポート
//!
//! 接続確立（connect の成功）、切断通知、接続エラー、および
//! 離脱通知（preview:leave）の送信のみを扱い、メッセージのルーティングは行いません。

use async_trait::async_trait;

use super::{
    entity::PreviewTarget,
    error::TransportError,
    value_object::{BossId, EventId, IdentityToken},
};

/// クライアントから送信するメッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    /// プレビュー画面から離脱する通知
    PreviewLeave {
        boss_id: BossId,
        event_id: EventId,
        left_at: i64,
    },
}

/// 確立済みの接続上で発生するイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// いずれかの側による正常な切断
    Closed,
    /// 接続レベルの障害
    Failed(String),
    /// その他のサーバーメッセージ（本クレートでは解釈しない）
    Message(String),
}

/// リアルタイム接続を開く
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    /// 接続を確立する。戻り値が `Ok` になった時点を接続確認（ack）とみなす。
    async fn connect(
        &self,
        target: &PreviewTarget,
        credential: Option<&IdentityToken>,
    ) -> Result<Box<dyn RealtimeConnection>, TransportError>;
}

/// 確立済みのリアルタイム接続
#[async_trait]
pub trait RealtimeConnection: Send {
    async fn send(&mut self, message: OutboundMessage) -> Result<(), TransportError>;

    /// 次のイベントを待つ。`tokio::select!` 内で使うためキャンセル安全であること。
    async fn next_event(&mut self) -> ConnectionEvent;

    async fn close(&mut self) -> Result<(), TransportError>;
}
