//! 参加状態に関する純粋関数
//!
//! 副作用を持たないため、UseCase 層から独立してテストできます。

use super::{entity::JoinRecord, value_object::BossId, value_object::IdentityToken};

/// 参加記録の永続化キーのプレフィックス
pub const STORAGE_KEY_PREFIX: &str = "boss_join_";

/// ID に対応する永続化キーを導出
pub fn storage_key_for(token: &IdentityToken) -> String {
    format!("{}{}", STORAGE_KEY_PREFIX, token.as_str())
}

/// 指定したボスに参加できるか判定
///
/// 未参加、または同じボスへの再参加のみ許可する。
pub fn can_join(current: Option<&JoinRecord>, boss_id: &BossId) -> bool {
    match current {
        None => true,
        Some(record) => &record.boss_id == boss_id,
    }
}
