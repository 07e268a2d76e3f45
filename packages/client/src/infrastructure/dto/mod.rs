//! Data Transfer Objects (DTOs) for the realtime preview channel.

pub mod conversion;
pub mod websocket;
