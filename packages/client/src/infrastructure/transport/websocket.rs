//! WebSocket を使った RealtimeConnector 実装
//!
//! ## ライフサイクルの対応
//!
//! - ハンドシェイク完了 → 接続確認（connect ack）
//! - Close フレーム、またはテキストフレーム `{"type":"disconnect"}` → 切断通知
//! - 読み込みエラー → 接続エラー
//! - 離脱通知 → テキストフレーム `{"type":"preview:leave",…}`

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        self,
        client::IntoClientRequest,
        http::{HeaderValue, header::AUTHORIZATION},
        protocol::Message,
    },
};

use crate::{
    domain::{
        ConnectionEvent, IdentityToken, OutboundMessage, PreviewTarget, RealtimeConnection,
        RealtimeConnector, TransportError,
    },
    infrastructure::dto::websocket::{PreviewLeaveMessage, ServerNotice},
};

/// WebSocket で接続する RealtimeConnector
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    base_url: String,
}

impl WebSocketConnector {
    /// # 引数
    ///
    /// - `base_url`: 接続先のベース URL（例: `ws://127.0.0.1:8080/preview`）
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 接続対象をクエリパラメータに載せた URL を組み立てる
    pub fn endpoint_for(&self, target: &PreviewTarget) -> String {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}bossId={}&eventId={}",
            self.base_url,
            separator,
            encode_query_component(target.boss_id.as_str()),
            encode_query_component(target.event_id.as_str()),
        )
    }
}

#[async_trait]
impl RealtimeConnector for WebSocketConnector {
    async fn connect(
        &self,
        target: &PreviewTarget,
        credential: Option<&IdentityToken>,
    ) -> Result<Box<dyn RealtimeConnection>, TransportError> {
        let url = self.endpoint_for(target);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;

        if let Some(token) = credential {
            let value = HeaderValue::from_str(&format!("Bearer {}", token.as_str()))
                .map_err(|e| TransportError::InvalidCredential(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        tracing::debug!(
            "Realtime handshake with {} completed ({})",
            url,
            response.status()
        );

        Ok(Box::new(WebSocketConnection { stream }))
    }
}

/// 確立済みの WebSocket 接続
pub struct WebSocketConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl RealtimeConnection for WebSocketConnection {
    async fn send(&mut self, message: OutboundMessage) -> Result<(), TransportError> {
        let dto: PreviewLeaveMessage = message.into();
        let json =
            serde_json::to_string(&dto).map_err(|e| TransportError::Send(e.to_string()))?;

        self.stream
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn next_event(&mut self) -> ConnectionEvent {
        loop {
            match self.stream.next().await {
                None => return ConnectionEvent::Closed,
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!("Server closed the realtime connection: {:?}", frame);
                    return ConnectionEvent::Closed;
                }
                Some(Ok(Message::Text(text))) => {
                    if ServerNotice::is_disconnect(&text) {
                        return ConnectionEvent::Closed;
                    }
                    return ConnectionEvent::Message(text.as_str().to_string());
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::trace!("Ignoring binary frame ({} bytes)", data.len());
                }
                // Ping/pong is handled by tungstenite
                Some(Ok(_)) => {}
                Some(Err(e)) => return ConnectionEvent::Failed(e.to_string()),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(TransportError::Close(e.to_string())),
        }
    }
}

/// クエリパラメータ用のパーセントエンコード（RFC 3986 の unreserved 以外を変換）
fn encode_query_component(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BossId, EventId};

    fn target(boss: &str, event: &str) -> PreviewTarget {
        PreviewTarget::new(BossId::new(boss), EventId::new(event))
    }

    #[test]
    fn test_endpoint_for_appends_query() {
        // テスト項目: ベース URL にボス ID とイベント ID のクエリが付与される
        // given (前提条件):
        let connector = WebSocketConnector::new("ws://127.0.0.1:8080/preview");

        // when (操作):
        let url = connector.endpoint_for(&target("b1", "e1"));

        // then (期待する結果):
        assert_eq!(url, "ws://127.0.0.1:8080/preview?bossId=b1&eventId=e1");
    }

    #[test]
    fn test_endpoint_for_keeps_existing_query() {
        // テスト項目: 既存のクエリがある場合は & で連結される
        // given (前提条件):
        let connector = WebSocketConnector::new("ws://host/preview?v=2");

        // when (操作):
        let url = connector.endpoint_for(&target("b1", "e1"));

        // then (期待する結果):
        assert_eq!(url, "ws://host/preview?v=2&bossId=b1&eventId=e1");
    }

    #[test]
    fn test_endpoint_for_encodes_ids() {
        // テスト項目: ID に含まれる特殊文字がエンコードされる
        // given (前提条件):
        let connector = WebSocketConnector::new("ws://host/preview");

        // when (操作):
        let url = connector.endpoint_for(&target("boss 1&x", "é"));

        // then (期待する結果):
        assert_eq!(url, "ws://host/preview?bossId=boss%201%26x&eventId=%C3%A9");
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_endpoint() {
        // テスト項目: 不正な URL は InvalidEndpoint エラーになる
        // given (前提条件):
        let connector = WebSocketConnector::new("not a url");

        // when (操作):
        let result = connector.connect(&target("b1", "e1"), None).await;

        // then (期待する結果):
        assert!(matches!(result, Err(TransportError::InvalidEndpoint(_))));
    }
}
