//! UseCase: リアルタイム接続のライフサイクル管理
//!
//! (bossId, eventId) の組に対する 1 本の接続を管理し、接続状態を公開します。
//! メッセージのルーティングや再接続は行いません。
//!
//! ## 状態遷移
//!
//! ```text
//! disconnected → connecting → connected | error
//! connected → disconnected（正常切断）| error（障害）
//! 任意の状態 → disconnected（後始末）
//! ```
//!
//! ## 世代（generation）
//!
//! activate ごとに世代番号を進め、接続タスクは自分の世代が最新の場合にのみ
//! 状態を更新できます。後始末は世代を同期的に進めてから始めるため、
//! 置き換えられた接続からの状態更新が後から反映されることはありません。

use std::sync::{Arc, Mutex, PoisonError};

use bossbattle_shared::time::Clock;
use tokio::{
    sync::{broadcast, oneshot, watch},
    task::JoinHandle,
};

use crate::domain::{
    BossId, ConnectionEvent, ConnectionStatus, EventId, IdentityToken, OutboundMessage,
    PreviewTarget, RealtimeConnection, RealtimeConnector,
};

const STATUS_CHANNEL_CAPACITY: usize = 64;

/// 状態遷移の記録
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: ConnectionStatus,
    pub to: ConnectionStatus,
    /// Unix timestamp (milliseconds)
    pub at: i64,
}

struct TrackerState {
    generation: u64,
    status: ConnectionStatus,
}

/// 世代付きの接続状態
struct StatusTracker {
    state: Mutex<TrackerState>,
    current: watch::Sender<ConnectionStatus>,
    changes: broadcast::Sender<StatusChange>,
    clock: Arc<dyn Clock>,
}

impl StatusTracker {
    fn new(clock: Arc<dyn Clock>) -> Self {
        let (current, _) = watch::channel(ConnectionStatus::Disconnected);
        let (changes, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(TrackerState {
                generation: 0,
                status: ConnectionStatus::Disconnected,
            }),
            current,
            changes,
            clock,
        }
    }

    fn status(&self) -> ConnectionStatus {
        self.lock().status
    }

    /// 世代を進めて遷移する（以前の世代からの更新は以降すべて無視される）
    fn advance(&self, next: ConnectionStatus) -> u64 {
        let mut state = self.lock();
        state.generation += 1;
        self.transition(&mut state, next);
        state.generation
    }

    /// `generation` が最新の場合のみ遷移する
    fn apply(&self, generation: u64, next: ConnectionStatus) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            tracing::trace!(
                "Dropping '{}' from superseded connection (generation {})",
                next,
                generation
            );
            return false;
        }
        self.transition(&mut state, next)
    }

    fn transition(&self, state: &mut TrackerState, next: ConnectionStatus) -> bool {
        if !state.status.can_transition_to(next) {
            return false;
        }

        let change = StatusChange {
            from: state.status,
            to: next,
            at: self.clock.now_millis(),
        };
        state.status = next;
        self.current.send_replace(next);
        let _ = self.changes.send(change);
        tracing::debug!("Realtime status: {} -> {}", change.from, change.to);
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// 動作中の接続セッション
struct ActiveSession {
    target: PreviewTarget,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

/// 接続タスクに渡すコンテキスト
struct SessionContext {
    connector: Arc<dyn RealtimeConnector>,
    credential: Option<IdentityToken>,
    clock: Arc<dyn Clock>,
    tracker: Arc<StatusTracker>,
    generation: u64,
    target: PreviewTarget,
}

/// リアルタイム接続ハンドル
///
/// 1 つのハンドルが同時に持つ接続は高々 1 本。
/// ハンドルを破棄すると後始末（離脱通知と切断）がバックグラウンドで行われる。
pub struct RealtimeConnectionHandle {
    connector: Arc<dyn RealtimeConnector>,
    clock: Arc<dyn Clock>,
    credential: Option<IdentityToken>,
    tracker: Arc<StatusTracker>,
    session: Option<ActiveSession>,
}

impl RealtimeConnectionHandle {
    pub fn new(connector: Arc<dyn RealtimeConnector>, clock: Arc<dyn Clock>) -> Self {
        Self {
            connector,
            tracker: Arc::new(StatusTracker::new(clock.clone())),
            clock,
            credential: None,
            session: None,
        }
    }

    /// 接続時に送る認証情報を設定
    #[must_use]
    pub fn with_credential(mut self, credential: Option<IdentityToken>) -> Self {
        self.credential = credential;
        self
    }

    /// 以降の接続で使う認証情報を差し替える（確立済みの接続には影響しない）
    pub fn set_credential(&mut self, credential: Option<IdentityToken>) {
        self.credential = credential;
    }

    /// 接続を開始する
    ///
    /// - どちらかの ID が欠けている場合は既存の接続を後始末して待機状態になる
    /// - 同じ組で接続中の場合は何もしない
    /// - 別の組の場合は既存の接続を後始末してから新しく接続する
    pub async fn activate(&mut self, boss_id: Option<BossId>, event_id: Option<EventId>) {
        let target = PreviewTarget::from_parts(boss_id, event_id);

        if let (Some(target), Some(session)) = (target.as_ref(), self.session.as_ref())
            && session.target == *target
            && !session.task.is_finished()
        {
            tracing::debug!("Already previewing boss '{}'", target.boss_id);
            return;
        }

        self.deactivate().await;

        let Some(target) = target else {
            tracing::debug!("Realtime preview idle: boss and event are both required");
            return;
        };

        let generation = self.tracker.advance(ConnectionStatus::Connecting);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let context = SessionContext {
            connector: self.connector.clone(),
            credential: self.credential.clone(),
            clock: self.clock.clone(),
            tracker: self.tracker.clone(),
            generation,
            target: target.clone(),
        };

        tracing::info!(
            "Connecting realtime preview for boss '{}' in event '{}'",
            target.boss_id,
            target.event_id
        );

        let task = tokio::spawn(run_session(context, shutdown_rx));
        self.session = Some(ActiveSession {
            target,
            shutdown: Some(shutdown_tx),
            task,
        });
    }

    /// 接続を後始末し、完了まで待つ
    ///
    /// 確立済みの接続には離脱通知を 1 回だけ送ってから切断する。
    pub async fn deactivate(&mut self) {
        let Some(mut session) = self.begin_teardown() else {
            return;
        };

        if let Err(e) = (&mut session.task).await
            && e.is_panic()
        {
            tracing::warn!("Realtime session task panicked: {}", e);
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        self.tracker.status()
    }

    /// 現在の状態を購読（中間状態は間引かれる場合がある）
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.tracker.current.subscribe()
    }

    /// すべての状態遷移を発生順に購読
    pub fn status_changes(&self) -> broadcast::Receiver<StatusChange> {
        self.tracker.changes.subscribe()
    }

    /// 現在の接続対象
    pub fn target(&self) -> Option<&PreviewTarget> {
        self.session.as_ref().map(|session| &session.target)
    }

    /// 世代を進めて状態を disconnected にし、接続タスクに停止を指示する
    fn begin_teardown(&mut self) -> Option<ActiveSession> {
        let mut session = self.session.take()?;
        self.tracker.advance(ConnectionStatus::Disconnected);
        if let Some(shutdown) = session.shutdown.take() {
            // タスクが既に終了している場合は送信に失敗するが問題ない
            let _ = shutdown.send(());
        }
        tracing::info!(
            "Closing realtime preview for boss '{}'",
            session.target.boss_id
        );
        Some(session)
    }
}

impl Drop for RealtimeConnectionHandle {
    fn drop(&mut self) {
        // 接続タスクは離脱通知と切断を終えてから自分で終了する
        let _ = self.begin_teardown();
    }
}

async fn run_session(context: SessionContext, mut shutdown: oneshot::Receiver<()>) {
    let SessionContext {
        connector,
        credential,
        clock,
        tracker,
        generation,
        target,
    } = context;

    let mut connection: Box<dyn RealtimeConnection> = tokio::select! {
        _ = &mut shutdown => {
            tracing::debug!("Realtime preview torn down before connection was established");
            return;
        }
        result = connector.connect(&target, credential.as_ref()) => match result {
            Ok(connection) => connection,
            Err(e) => {
                tracing::warn!("Realtime connection failed: {}", e);
                tracker.apply(generation, ConnectionStatus::Error);
                return;
            }
        },
    };

    tracker.apply(generation, ConnectionStatus::Connected);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let notice = OutboundMessage::PreviewLeave {
                    boss_id: target.boss_id.clone(),
                    event_id: target.event_id.clone(),
                    left_at: clock.now_millis(),
                };
                if let Err(e) = connection.send(notice).await {
                    tracing::warn!("Failed to send preview leave notice: {}", e);
                }
                close_quietly(&mut *connection).await;
                break;
            }
            event = connection.next_event() => match event {
                ConnectionEvent::Message(text) => {
                    tracing::trace!("Ignoring realtime message: {}", text);
                }
                ConnectionEvent::Closed => {
                    tracing::info!("Realtime connection closed");
                    tracker.apply(generation, ConnectionStatus::Disconnected);
                    close_quietly(&mut *connection).await;
                    break;
                }
                ConnectionEvent::Failed(reason) => {
                    tracing::warn!("Realtime connection error: {}", reason);
                    tracker.apply(generation, ConnectionStatus::Error);
                    close_quietly(&mut *connection).await;
                    break;
                }
            },
        }
    }
}

/// 相手側の状態に関わらず切断を試みる（失敗はログのみ）
async fn close_quietly(connection: &mut dyn RealtimeConnection) {
    if let Err(e) = connection.close().await {
        tracing::debug!("Failed to close realtime connection cleanly: {}", e);
    }
}
