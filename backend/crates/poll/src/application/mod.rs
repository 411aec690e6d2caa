//! Application Layer - Use Cases
//!
//! This layer orchestrates domain logic and infrastructure.
//! Contains use case implementations.

pub mod cast_vote;
pub mod config;
pub mod create_poll;
pub mod expiry;
pub mod locks;
pub mod poll_queries;
pub mod visitor;
