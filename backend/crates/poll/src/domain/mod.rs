//! Domain Layer - Business logic and entities
//!
//! This layer contains:
//! - Domain entities (Poll, PollOption, VoteRecord)
//! - Domain value objects (PollId, VoteSignals, SignalKind)
//! - The fairness gate and the voter-detail aggregator
//! - Repository and publisher traits (interfaces)

pub mod entities;
pub mod fairness;
pub mod repository;
pub mod services;
pub mod value_objects;
pub mod voters;
