//! 認証セッション
//!
//! ログイン・ログアウトで認証済みトークンを切り替え、購読者へ通知します。

use tokio::sync::watch;

use crate::domain::{IdentityProvider, IdentityToken};

/// 認証セッションの状態を保持する IdentityProvider 実装
pub struct SessionIdentity {
    sender: watch::Sender<Option<IdentityToken>>,
}

impl SessionIdentity {
    pub fn new(initial: Option<IdentityToken>) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }

    /// 未認証のセッションを作成
    pub fn anonymous() -> Self {
        Self::new(None)
    }

    pub fn login(&self, token: IdentityToken) {
        self.replace(Some(token));
    }

    pub fn logout(&self) {
        self.replace(None);
    }

    /// 値が変わった場合のみ購読者に通知する
    fn replace(&self, next: Option<IdentityToken>) {
        let changed = self.sender.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next.clone();
                true
            }
        });
        if changed {
            tracing::info!(
                "Authenticated identity changed: {}",
                next.as_ref().map(IdentityToken::as_str).unwrap_or("<guest>")
            );
        }
    }
}

impl IdentityProvider for SessionIdentity {
    fn current(&self) -> Option<IdentityToken> {
        self.sender.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<IdentityToken>> {
        self.sender.subscribe()
    }
}
