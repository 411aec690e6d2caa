//! Infrastructure Layer
//!
//! Storage backends and the live broadcast hub.

pub mod broadcast;
pub mod memory;
pub mod postgres;
