//! UseCase: 参加状態の管理
//!
//! 「この ID はイベント Y のボス X にニックネーム Z で参加している」という
//! 状態の唯一の保持者です。状態はストレージに永続化され、同じストレージを
//! 共有する他のクライアント（タブ・プロセス）と同期されます。
//!
//! ## 同期の規則
//!
//! - 自分のキー（`boss_join_<token>`）への外部からの書き込み → 取り込む
//! - 自分のキーの外部からの削除 → メモリ上の記録を消す
//! - 壊れた値（初回読み込み・外部通知どちらも）→ 未参加として扱い、エントリを削除
//! - 認証状態が変わったら ID を解決し直し、新しいキーから読み込み直す
//! - 同時書き込みは後勝ち

use std::sync::Arc;

use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
};

use crate::domain::{
    BossId, EventId, GuestTokenProvider, IdentityProvider, IdentityToken, JoinError, JoinRecord,
    KeyValueStorage, Nickname, StorageEvent, StorageSubscription, can_join, storage_key_for,
};

/// 現在の ID と参加記録
struct JoinState {
    token: IdentityToken,
    /// `token` を解決したときの認証済みトークン（未認証なら None）
    authenticated: Option<IdentityToken>,
    record: Option<JoinRecord>,
}

struct Shared {
    storage: Arc<dyn KeyValueStorage>,
    identity: Arc<dyn IdentityProvider>,
    guest: Arc<dyn GuestTokenProvider>,
    /// ストレージ操作と状態更新はこのロックの下で行う
    state: Mutex<JoinState>,
    /// 読み取り専用スナップショット（`state` のロック中にのみ更新する）
    snapshot: watch::Sender<Option<JoinRecord>>,
}

/// 参加状態ストア
///
/// 同期タスク（ストレージ通知と認証状態の変更を監視）はストアの破棄と同時に停止する。
///
/// # 使用例
///
/// ```ignore
/// let store = JoinStateStore::start(storage, identity, guest).await;
/// if store.can_join(&boss_id) {
///     store.join(boss_id, event_id, nickname).await;
/// }
/// ```
pub struct JoinStateStore {
    shared: Arc<Shared>,
    sync_task: JoinHandle<()>,
}

impl JoinStateStore {
    /// ID を解決して永続化された記録を読み込み、同期を開始する
    pub async fn start(
        storage: Arc<dyn KeyValueStorage>,
        identity: Arc<dyn IdentityProvider>,
        guest: Arc<dyn GuestTokenProvider>,
    ) -> Self {
        // 読み込み中の変更を取りこぼさないよう、先に購読しておく
        let subscription = storage.subscribe();
        let identity_changes = identity.watch();

        let authenticated = identity.current();
        let token = resolve_identity(authenticated.as_ref(), guest.as_ref()).await;
        let record = load_record(storage.as_ref(), &storage_key_for(&token)).await;
        tracing::info!(
            "Join state loaded for '{}': {}",
            token,
            describe(record.as_ref())
        );

        let (snapshot, _) = watch::channel(record.clone());
        let shared = Arc::new(Shared {
            storage,
            identity,
            guest,
            state: Mutex::new(JoinState {
                token,
                authenticated,
                record,
            }),
            snapshot,
        });

        let sync_task = tokio::spawn(sync_loop(
            shared.clone(),
            subscription,
            identity_changes,
        ));

        Self { shared, sync_task }
    }

    /// ボスに参加する
    ///
    /// 既存の記録は無条件に置き換えられる（マージしない）。保存はベストエフォート。
    pub async fn join(&self, boss_id: BossId, event_id: EventId, nickname: Nickname) -> JoinRecord {
        let record = JoinRecord::new(boss_id, event_id, nickname);
        let mut state = self.shared.state.lock().await;
        self.shared.sync_identity(&mut state).await;
        self.shared.store_record(&mut state, record.clone()).await;
        record
    }

    /// 参加チェック付きでボスに参加する
    ///
    /// 別のボスに参加中の場合は `JoinError::AlreadyJoined` を返し、状態は変えない。
    pub async fn try_join(
        &self,
        boss_id: BossId,
        event_id: EventId,
        nickname: Nickname,
    ) -> Result<JoinRecord, JoinError> {
        let mut state = self.shared.state.lock().await;
        self.shared.sync_identity(&mut state).await;
        if let Some(current) = state.record.as_ref()
            && !can_join(Some(current), &boss_id)
        {
            return Err(JoinError::AlreadyJoined {
                current: current.clone(),
            });
        }

        let record = JoinRecord::new(boss_id, event_id, nickname);
        self.shared.store_record(&mut state, record.clone()).await;
        Ok(record)
    }

    /// 参加をやめる
    pub async fn leave(&self) {
        let mut state = self.shared.state.lock().await;
        self.shared.sync_identity(&mut state).await;
        let key = storage_key_for(&state.token);
        state.record = None;
        if let Err(e) = self.shared.storage.remove(&key).await {
            tracing::warn!("Failed to remove join record '{}': {}", key, e);
        }
        self.shared.publish(&state);
        tracing::info!("Left boss battle as '{}'", state.token);
    }

    /// 指定したボスに参加できるか（副作用なし）
    pub fn can_join(&self, boss_id: &BossId) -> bool {
        can_join(self.shared.snapshot.borrow().as_ref(), boss_id)
    }

    /// 現在の参加記録のスナップショット
    pub fn current(&self) -> Option<JoinRecord> {
        self.shared.snapshot.borrow().clone()
    }

    /// 参加記録の変更を購読
    pub fn subscribe(&self) -> watch::Receiver<Option<JoinRecord>> {
        self.shared.snapshot.subscribe()
    }

    /// 現在の ID
    pub async fn identity(&self) -> IdentityToken {
        self.shared.state.lock().await.token.clone()
    }

    /// 現在の ID に対応する永続化キー
    pub async fn storage_key(&self) -> String {
        storage_key_for(&self.shared.state.lock().await.token)
    }

    /// ID を解決し直し、永続化された記録を読み込み直す
    ///
    /// 認証状態の変更時には同期タスクから自動で呼ばれる。
    pub async fn refresh_identity(&self) {
        self.shared.refresh_identity().await;
    }
}

impl Drop for JoinStateStore {
    fn drop(&mut self) {
        self.sync_task.abort();
    }
}

impl Shared {
    async fn store_record(&self, state: &mut JoinState, record: JoinRecord) {
        let key = storage_key_for(&state.token);
        match record.to_json() {
            Ok(json) => {
                if let Err(e) = self.storage.set(&key, &json).await {
                    tracing::warn!("Failed to persist join record '{}': {}", key, e);
                }
            }
            Err(e) => tracing::warn!("Failed to serialize join record: {}", e),
        }
        tracing::info!("Joined {} (identity '{}')", record, state.token);
        state.record = Some(record);
        self.publish(state);
    }

    fn publish(&self, state: &JoinState) {
        self.snapshot.send_if_modified(|current| {
            if *current == state.record {
                false
            } else {
                *current = state.record.clone();
                true
            }
        });
    }

    async fn refresh_identity(&self) {
        let mut state = self.state.lock().await;
        self.reload(&mut state).await;
    }

    async fn follow_identity(&self) {
        let mut state = self.state.lock().await;
        self.sync_identity(&mut state).await;
    }

    /// 認証状態が前回の解決時から変わっていれば、変更前に読み込み直す
    ///
    /// 同期タスクが変更通知を処理する前に行われる操作も、新しい ID のキーに対して行われる。
    async fn sync_identity(&self, state: &mut JoinState) {
        if self.identity.current() != state.authenticated {
            self.reload(state).await;
        }
    }

    async fn reload(&self, state: &mut JoinState) {
        let authenticated = self.identity.current();
        let token = resolve_identity(authenticated.as_ref(), self.guest.as_ref()).await;
        let record = load_record(self.storage.as_ref(), &storage_key_for(&token)).await;

        if token != state.token {
            tracing::info!("Identity changed from '{}' to '{}'", state.token, token);
        }
        tracing::debug!("Join state reloaded: {}", describe(record.as_ref()));

        state.token = token;
        state.authenticated = authenticated;
        state.record = record;
        self.publish(state);
    }

    async fn apply_storage_event(&self, event: StorageEvent) {
        let mut state = self.state.lock().await;
        let key = storage_key_for(&state.token);
        if event.key != key {
            return;
        }

        state.record = match event.new_value {
            None => {
                tracing::debug!("Join record '{}' removed by another client", key);
                None
            }
            Some(raw) => match JoinRecord::from_json(&raw) {
                Ok(record) => {
                    tracing::debug!("Adopted join record from another client: {}", record);
                    Some(record)
                }
                Err(e) => {
                    tracing::warn!("Discarding malformed join record '{}': {}", key, e);
                    if let Err(e) = self.storage.remove(&key).await {
                        tracing::warn!("Failed to remove join record '{}': {}", key, e);
                    }
                    None
                }
            },
        };
        self.publish(&state);
    }
}

async fn sync_loop(
    shared: Arc<Shared>,
    mut subscription: StorageSubscription,
    mut identity_changes: watch::Receiver<Option<IdentityToken>>,
) {
    let mut identity_open = true;

    loop {
        tokio::select! {
            event = subscription.recv() => match event {
                Some(event) => shared.apply_storage_event(event).await,
                None => {
                    tracing::debug!("Storage closed; join state sync stopped");
                    break;
                }
            },
            changed = identity_changes.changed(), if identity_open => {
                if changed.is_err() {
                    identity_open = false;
                    continue;
                }
                // 直前の操作で既に読み込み直している場合は何もしない
                shared.follow_identity().await;
            }
        }
    }
}

/// 認証済みならそのトークン、未認証ならゲストトークンを使う
async fn resolve_identity(
    authenticated: Option<&IdentityToken>,
    guest: &dyn GuestTokenProvider,
) -> IdentityToken {
    match authenticated {
        Some(token) => token.clone(),
        None => guest.guest_token().await,
    }
}

/// 永続化された記録を読み込む
///
/// 壊れた値は削除して未参加として扱う。読み込みエラーも未参加として扱う。
async fn load_record(storage: &dyn KeyValueStorage, key: &str) -> Option<JoinRecord> {
    let raw = match storage.get(key).await {
        Ok(raw) => raw?,
        Err(e) => {
            tracing::warn!("Failed to read join record '{}': {}", key, e);
            return None;
        }
    };

    match JoinRecord::from_json(&raw) {
        Ok(record) => Some(record),
        Err(e) => {
            tracing::warn!("Discarding malformed join record '{}': {}", key, e);
            if let Err(e) = storage.remove(key).await {
                tracing::warn!("Failed to remove join record '{}': {}", key, e);
            }
            None
        }
    }
}

fn describe(record: Option<&JoinRecord>) -> String {
    match record {
        Some(record) => record.to_string(),
        None => "not joined".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::{
        domain::identity::{MockGuestTokenProvider, MockIdentityProvider},
        infrastructure::{
            identity::{SessionIdentity, StoredGuestTokenProvider},
            storage::InMemoryStorage,
        },
    };

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - join / leave / can_join / try_join の振る舞い
    // - 永続化（再起動後の復元、保存フォーマット、壊れた値の破棄）
    // - 他タブからの変更の取り込み
    // - 認証状態の変更に伴う読み込み直し
    //
    // 【どのようなシナリオをテストするか】
    // 1. 参加前・参加後・離脱後の can_join
    // 2. 2 回目の join は上書き（マージしない）
    // 3. try_join は別ボスへの参加を拒否する
    // 4. 再起動後に同じ記録が復元される
    // 5. 壊れた値は読み込み時に削除される
    // 6. 他タブの書き込み・削除・壊れた値
    // 7. ログイン・ログアウトでキーが切り替わる
    // 8. ログイン直後の操作は新しい ID のキーに対して行われる
    // 9. 2 つのタブが順に参加すると、両方が後の記録に収束する（後勝ち）
    // ========================================

    const WAIT: Duration = Duration::from_secs(5);

    fn boss(id: &str) -> BossId {
        BossId::new(id)
    }

    fn event(id: &str) -> EventId {
        EventId::new(id)
    }

    fn nick(name: &str) -> Nickname {
        Nickname::new(name)
    }

    fn record(b: &str, e: &str, n: &str) -> JoinRecord {
        JoinRecord::new(boss(b), event(e), nick(n))
    }

    async fn start_as(storage: InMemoryStorage, session: Arc<SessionIdentity>) -> JoinStateStore {
        let storage: Arc<dyn KeyValueStorage> = Arc::new(storage);
        let guest = Arc::new(StoredGuestTokenProvider::new(storage.clone()));
        JoinStateStore::start(storage, session, guest).await
    }

    async fn start_user(storage: InMemoryStorage, user: &str) -> JoinStateStore {
        start_as(
            storage,
            Arc::new(SessionIdentity::new(Some(IdentityToken::new(user)))),
        )
        .await
    }

    async fn wait_for_record(store: &JoinStateStore, expected: Option<JoinRecord>) {
        let mut rx = store.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(|current| *current == expected))
            .await
            .expect("timed out waiting for join state")
            .expect("join state channel closed");
    }

    #[tokio::test]
    async fn test_can_join_before_any_join() {
        // テスト項目: 参加前はどのボスにも参加できる
        // given (前提条件):
        let store = start_user(InMemoryStorage::new(), "user-1").await;

        // then (期待する結果):
        assert!(store.current().is_none());
        assert!(store.can_join(&boss("b1")));
        assert!(store.can_join(&boss("b2")));
    }

    #[tokio::test]
    async fn test_can_join_after_join_and_leave() {
        // テスト項目: 参加後は同じボスのみ、離脱後は再びどのボスにも参加できる
        // given (前提条件):
        let store = start_user(InMemoryStorage::new(), "user-1").await;

        // when (操作):
        store.join(boss("B"), event("E"), nick("neo")).await;

        // then (期待する結果):
        assert!(store.can_join(&boss("B")));
        assert!(!store.can_join(&boss("X")));

        store.leave().await;
        assert!(store.can_join(&boss("B")));
        assert!(store.can_join(&boss("X")));
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_second_join_overwrites_first() {
        // テスト項目: 2 回目の join は 1 回目の記録を丸ごと置き換える
        // given (前提条件):
        let storage = InMemoryStorage::new();
        let reader = storage.open_tab();
        let store = start_user(storage, "user-1").await;

        // when (操作):
        store.join(boss("b1"), event("e1"), nick("n1")).await;
        store.join(boss("b2"), event("e2"), nick("n2")).await;

        // then (期待する結果):
        assert_eq!(store.current(), Some(record("b2", "e2", "n2")));
        let persisted = reader.get("boss_join_user-1").await.unwrap().unwrap();
        assert_eq!(
            JoinRecord::from_json(&persisted).unwrap(),
            record("b2", "e2", "n2")
        );
    }

    #[tokio::test]
    async fn test_try_join_rejects_different_boss() {
        // テスト項目: 参加チェック付き join は別ボスへの参加を拒否し、状態を変えない
        // given (前提条件):
        let store = start_user(InMemoryStorage::new(), "user-1").await;
        store.join(boss("b1"), event("e1"), nick("neo")).await;

        // when (操作):
        let result = store.try_join(boss("b2"), event("e1"), nick("neo")).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(JoinError::AlreadyJoined {
                current: record("b1", "e1", "neo")
            })
        );
        assert_eq!(store.current(), Some(record("b1", "e1", "neo")));
    }

    #[tokio::test]
    async fn test_try_join_allows_rejoining_same_boss() {
        // テスト項目: 同じボスへの再参加は許可され、記録が置き換わる
        // given (前提条件):
        let store = start_user(InMemoryStorage::new(), "user-1").await;
        store.join(boss("b1"), event("e1"), nick("neo")).await;

        // when (操作):
        let result = store.try_join(boss("b1"), event("e2"), nick("trinity")).await;

        // then (期待する結果):
        assert_eq!(result, Ok(record("b1", "e2", "trinity")));
        assert_eq!(store.current(), Some(record("b1", "e2", "trinity")));
    }

    #[tokio::test]
    async fn test_persisted_record_roundtrips_through_reload() {
        // テスト項目: join 後に再起動しても同じ記録が復元される
        // given (前提条件):
        let storage = InMemoryStorage::new();
        let reopened = storage.open_tab();
        let store = start_user(storage, "user-1").await;
        store.join(boss("B"), event("E"), nick("N")).await;
        drop(store);

        // when (操作):
        let store = start_user(reopened, "user-1").await;

        // then (期待する結果):
        assert_eq!(store.current(), Some(record("B", "E", "N")));
    }

    #[tokio::test]
    async fn test_persisted_format() {
        // テスト項目: キーは boss_join_<token>、値は camelCase の JSON で保存される
        // given (前提条件):
        let storage = InMemoryStorage::new();
        let reader = storage.open_tab();
        let store = start_user(storage, "user-1").await;

        // when (操作):
        store.join(boss("b1"), event("e1"), nick("neo")).await;

        // then (期待する結果):
        assert_eq!(store.storage_key().await, "boss_join_user-1");
        assert_eq!(
            reader.get("boss_join_user-1").await.unwrap().as_deref(),
            Some(r#"{"bossId":"b1","eventId":"e1","nickname":"neo"}"#)
        );
    }

    #[tokio::test]
    async fn test_malformed_value_on_load_is_discarded() {
        // テスト項目: 壊れた値を読み込んだ場合、未参加として扱いエントリを削除する
        // given (前提条件):
        let storage = InMemoryStorage::new();
        storage.set("boss_join_user-1", "not-json").await.unwrap();
        let reader = storage.open_tab();

        // when (操作):
        let store = start_user(storage, "user-1").await;

        // then (期待する結果):
        assert!(store.current().is_none());
        assert_eq!(reader.get("boss_join_user-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_leave_removes_persisted_entry() {
        // テスト項目: leave で永続化されたエントリが削除される
        // given (前提条件):
        let storage = InMemoryStorage::new();
        let reader = storage.open_tab();
        let store = start_user(storage, "user-1").await;
        store.join(boss("b1"), event("e1"), nick("neo")).await;

        // when (操作):
        store.leave().await;

        // then (期待する結果):
        assert_eq!(reader.get("boss_join_user-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cross_tab_write_is_adopted() {
        // テスト項目: 他タブが同じキーに書き込んだ記録を取り込む
        // given (前提条件):
        let tab1 = InMemoryStorage::new();
        let tab2 = tab1.open_tab();
        let store1 = start_user(tab1, "user-1").await;
        let store2 = start_user(tab2, "user-1").await;

        // when (操作):
        store1.join(boss("b1"), event("e1"), nick("neo")).await;

        // then (期待する結果):
        wait_for_record(&store2, Some(record("b1", "e1", "neo"))).await;
        assert!(!store2.can_join(&boss("b2")));
    }

    #[tokio::test]
    async fn test_cross_tab_removal_clears_state() {
        // テスト項目: 他タブがエントリを削除するとメモリ上の記録も消える
        // given (前提条件):
        let tab1 = InMemoryStorage::new();
        let tab2 = tab1.open_tab();
        let store1 = start_user(tab1, "user-1").await;
        store1.join(boss("b1"), event("e1"), nick("neo")).await;
        let store2 = start_user(tab2, "user-1").await;
        assert_eq!(store2.current(), Some(record("b1", "e1", "neo")));

        // when (操作):
        store1.leave().await;

        // then (期待する結果):
        wait_for_record(&store2, None).await;
    }

    #[tokio::test]
    async fn test_cross_tab_malformed_value_is_discarded() {
        // テスト項目: 他タブから届いた壊れた値は未参加として扱い、エントリを削除する
        // given (前提条件):
        let tab1 = InMemoryStorage::new();
        let raw_tab = tab1.open_tab();
        let store = start_user(tab1, "user-1").await;
        store.join(boss("b1"), event("e1"), nick("neo")).await;

        // when (操作):
        raw_tab.set("boss_join_user-1", "{broken").await.unwrap();

        // then (期待する結果):
        wait_for_record(&store, None).await;
        assert_eq!(raw_tab.get("boss_join_user-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cross_tab_write_for_other_identity_is_ignored() {
        // テスト項目: 別の ID のキーへの書き込みは無視される
        // given (前提条件):
        let tab1 = InMemoryStorage::new();
        let tab2 = tab1.open_tab();
        let store = start_user(tab1, "user-1").await;
        let other = start_user(tab2, "user-2").await;

        // when (操作):
        other.join(boss("b9"), event("e9"), nick("smith")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // then (期待する結果):
        assert!(store.current().is_none());
    }

    #[tokio::test]
    async fn test_identity_change_reloads_record() {
        // テスト項目: ログイン・ログアウトで ID が切り替わり、対応する記録が読み込まれる
        // given (前提条件):
        let session = Arc::new(SessionIdentity::new(Some(IdentityToken::new("user-1"))));
        let store = start_as(InMemoryStorage::new(), session.clone()).await;
        store.join(boss("b1"), event("e1"), nick("neo")).await;

        // when (操作): ログアウトするとゲストとして読み込み直される
        session.logout();

        // then (期待する結果):
        wait_for_record(&store, None).await;
        assert!(store.identity().await.as_str().starts_with("guest_"));

        // 再ログインすると以前の記録が復元される
        session.login(IdentityToken::new("user-1"));
        wait_for_record(&store, Some(record("b1", "e1", "neo"))).await;
        assert_eq!(store.identity().await, IdentityToken::new("user-1"));
    }

    #[tokio::test]
    async fn test_join_right_after_login_uses_new_identity() {
        // テスト項目: ログイン直後の join は新しい ID のキーに保存され、失われない
        // given (前提条件):
        let storage = InMemoryStorage::new();
        let reader = storage.open_tab();
        let session = Arc::new(SessionIdentity::anonymous());
        let store = start_as(storage, session.clone()).await;
        let guest_key = store.storage_key().await;

        // when (操作):
        session.login(IdentityToken::new("user-1"));
        store.join(boss("b1"), event("e1"), nick("neo")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        // then (期待する結果):
        assert_eq!(store.identity().await, IdentityToken::new("user-1"));
        assert_eq!(store.current(), Some(record("b1", "e1", "neo")));
        let stored = reader.get("boss_join_user-1").await.unwrap().unwrap();
        assert_eq!(
            JoinRecord::from_json(&stored).unwrap(),
            record("b1", "e1", "neo")
        );
        assert_eq!(reader.get(&guest_key).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_try_join_right_after_login_checks_new_identity() {
        // テスト項目: ログイン直後の try_join は新しい ID の記録で参加可否を判定する
        // given (前提条件):
        let storage = InMemoryStorage::new();
        let existing = start_user(storage.open_tab(), "user-1").await;
        existing.join(boss("b9"), event("e9"), nick("neo")).await;
        let session = Arc::new(SessionIdentity::anonymous());
        let store = start_as(storage, session.clone()).await;
        assert!(store.current().is_none());

        // when (操作):
        session.login(IdentityToken::new("user-1"));
        let result = store.try_join(boss("b1"), event("e1"), nick("neo")).await;

        // then (期待する結果):
        assert_eq!(
            result,
            Err(JoinError::AlreadyJoined {
                current: record("b9", "e9", "neo"),
            })
        );
        assert_eq!(store.current(), Some(record("b9", "e9", "neo")));
    }

    #[tokio::test]
    async fn test_leave_right_after_logout_clears_guest_entry() {
        // テスト項目: ログアウト直後の leave はゲストのキーに対して行われ、ユーザーの記録は残る
        // given (前提条件):
        let storage = InMemoryStorage::new();
        let reader = storage.open_tab();
        let session = Arc::new(SessionIdentity::new(Some(IdentityToken::new("user-1"))));
        let store = start_as(storage, session.clone()).await;
        store.join(boss("b1"), event("e1"), nick("neo")).await;

        // when (操作):
        session.logout();
        store.leave().await;

        // then (期待する結果):
        assert!(store.identity().await.as_str().starts_with("guest_"));
        assert!(store.current().is_none());
        assert!(reader.get("boss_join_user-1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sequential_joins_from_two_tabs_converge_on_last_write() {
        // テスト項目: 同じ ID の 2 つのタブが順に別のボスへ参加すると、両方が後の記録に収束する
        // given (前提条件):
        let tab1 = InMemoryStorage::new();
        let tab2 = tab1.open_tab();
        let reader = tab1.open_tab();
        let store1 = start_user(tab1, "user-1").await;
        let store2 = start_user(tab2, "user-1").await;
        store1.join(boss("b1"), event("e1"), nick("neo")).await;
        wait_for_record(&store2, Some(record("b1", "e1", "neo"))).await;

        // when (操作):
        store2.join(boss("b2"), event("e1"), nick("trinity")).await;

        // then (期待する結果):
        wait_for_record(&store1, Some(record("b2", "e1", "trinity"))).await;
        assert_eq!(store2.current(), Some(record("b2", "e1", "trinity")));
        let stored = reader.get("boss_join_user-1").await.unwrap().unwrap();
        assert_eq!(
            JoinRecord::from_json(&stored).unwrap(),
            record("b2", "e1", "trinity")
        );
    }

    #[tokio::test]
    async fn test_guest_identity_used_when_unauthenticated() {
        // テスト項目: 未認証の場合はゲストトークンで永続化キーが決まる
        // given (前提条件):
        let (_identity_tx, identity_rx) = watch::channel(None);
        let mut identity = MockIdentityProvider::new();
        identity.expect_current().returning(|| None);
        identity
            .expect_watch()
            .returning(move || identity_rx.clone());
        let mut guest = MockGuestTokenProvider::new();
        guest
            .expect_guest_token()
            .times(1)
            .returning(|| IdentityToken::new("guest_fixed"));

        // when (操作):
        let store = JoinStateStore::start(
            Arc::new(InMemoryStorage::new()),
            Arc::new(identity),
            Arc::new(guest),
        )
        .await;

        // then (期待する結果):
        assert_eq!(store.identity().await, IdentityToken::new("guest_fixed"));
        assert_eq!(store.storage_key().await, "boss_join_guest_fixed");
    }

    #[tokio::test]
    async fn test_authenticated_identity_skips_guest_token() {
        // テスト項目: 認証済みの場合はゲストトークンを発行しない
        // given (前提条件):
        let (_identity_tx, identity_rx) = watch::channel(Some(IdentityToken::new("user-7")));
        let mut identity = MockIdentityProvider::new();
        identity
            .expect_current()
            .returning(|| Some(IdentityToken::new("user-7")));
        identity
            .expect_watch()
            .returning(move || identity_rx.clone());
        let mut guest = MockGuestTokenProvider::new();
        guest.expect_guest_token().times(0);

        // when (操作):
        let store = JoinStateStore::start(
            Arc::new(InMemoryStorage::new()),
            Arc::new(identity),
            Arc::new(guest),
        )
        .await;

        // then (期待する結果):
        assert_eq!(store.identity().await, IdentityToken::new("user-7"));
    }
}
