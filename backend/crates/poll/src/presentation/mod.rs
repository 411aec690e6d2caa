//! Presentation Layer
//!
//! HTTP handlers, DTOs, request limits and the live WebSocket.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod ws;
