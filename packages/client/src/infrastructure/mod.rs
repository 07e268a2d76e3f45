//! Infrastructure 層
//!
//! Domain 層が定義するポートの具体的な実装を提供します。

pub mod dto;
pub mod identity;
pub mod storage;
pub mod transport;
