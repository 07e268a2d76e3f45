//! Interactive CLI client.
//!
//! Reads commands from the terminal, drives the join state store and the
//! realtime preview handle, and prints changes as they happen.

mod command;
mod config;
mod error;
mod formatter;
mod runner;
mod session;

pub use command::{Command, CommandParseError, parse_command};
pub use config::{ClientConfig, DEFAULT_POLL_INTERVAL, DEFAULT_SOCKET_URL, DEFAULT_STORAGE_DIR};
pub use error::ClientError;
pub use runner::run_client;
