//! Boss battle client library.
//!
//! Keeps a per-identity join record in storage shared between client
//! processes, and manages a realtime preview connection for a boss.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
