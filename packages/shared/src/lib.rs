//! Utilities shared by the boss battle client crates.

pub mod logger;
pub mod time;
