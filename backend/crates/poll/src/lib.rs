//! Real-time Polls Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Polls, the fairness gate, voter aggregation, repository traits
//! - `application/` - Use cases, per-poll locks, visitor tokens, config
//! - `infra/` - PostgreSQL and in-memory stores, broadcast rooms
//! - `presentation/` - HTTP handlers, request limits, WebSocket
//!
//! ## Fairness Model
//! - Every vote is checked against the poll's address, visitor token and
//!   User-Agent logs; all three can be forged or shared, so the gate is a
//!   best-effort deterrent, not a security boundary
//! - Load, gate, count and publish are serialized per poll
//! - Tallies and the vote log are committed together or not at all
//! - Observers only ever see committed tallies

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::config::PollConfig;
pub use application::expiry::ExpirePollsUseCase;
pub use error::{PollError, PollResult};
pub use infra::broadcast::BroadcastHub;
pub use infra::memory::InMemoryPollRepository;
pub use infra::postgres::PgPollRepository;
pub use presentation::router::{poll_router_generic, poll_router_with_state};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
