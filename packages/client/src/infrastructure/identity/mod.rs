//! ID 解決ポートの実装

pub mod guest;
pub mod session;

pub use guest::{GUEST_TOKEN_KEY, StoredGuestTokenProvider};
pub use session::SessionIdentity;
