//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Client identification from request headers (address, User-Agent)
//! - Cryptographic utilities (HMAC-SHA256, Base64, random tokens)
//! - Cookie management
//! - Fixed-window request rate limiting

pub mod client;
pub mod cookie;
pub mod crypto;
pub mod rate_limit;
