//! ID 解決のポート
//!
//! 認証済みユーザーのトークンと、未認証時のゲストトークンを提供します。

use async_trait::async_trait;
use tokio::sync::watch;

use super::value_object::IdentityToken;

/// 認証セッション
#[cfg_attr(test, mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    /// 現在の認証済みトークン（未認証なら `None`）
    fn current(&self) -> Option<IdentityToken>;

    /// ログイン・ログアウトによる変更を購読
    fn watch(&self) -> watch::Receiver<Option<IdentityToken>>;
}

/// ゲストトークンの発行元
///
/// 一度発行したトークンは永続化され、以降は同じ値を返す。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GuestTokenProvider: Send + Sync {
    async fn guest_token(&self) -> IdentityToken;
}
