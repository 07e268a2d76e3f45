//! ゲストトークンの発行と永続化

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{GuestTokenProvider, IdentityToken, KeyValueStorage};

/// ゲストトークンの永続化キー
pub const GUEST_TOKEN_KEY: &str = "boss_guest_token";

/// ストレージにゲストトークンを保存する GuestTokenProvider 実装
///
/// 保存済みのトークンがあれば再利用し、無ければ `guest_<uuid>` を発行する。
/// 保存に失敗してもプロセス内では同じトークンを返し続ける。
pub struct StoredGuestTokenProvider {
    storage: Arc<dyn KeyValueStorage>,
    cached: Mutex<Option<IdentityToken>>,
}

impl StoredGuestTokenProvider {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl GuestTokenProvider for StoredGuestTokenProvider {
    async fn guest_token(&self) -> IdentityToken {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            return token.clone();
        }

        match self.storage.get(GUEST_TOKEN_KEY).await {
            Ok(Some(stored)) if !stored.trim().is_empty() => {
                let token = IdentityToken::new(stored.trim());
                *cached = Some(token.clone());
                return token;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to read guest token: {}", e),
        }

        let token = IdentityToken::new(format!("guest_{}", uuid::Uuid::new_v4()));
        if let Err(e) = self.storage.set(GUEST_TOKEN_KEY, token.as_str()).await {
            tracing::warn!("Failed to persist guest token: {}", e);
        }
        tracing::info!("Issued guest token '{}'", token);
        *cached = Some(token.clone());
        token
    }
}
