//! Shared Kernel - vocabulary shared by every backend crate
//!
//! - [`error`]: the unified [`AppError`](error::app_error::AppError) type,
//!   its [`ErrorKind`](error::kind::ErrorKind) classification and the
//!   RFC 7807 HTTP rendering (behind the `axum` feature)
//! - [`id`]: typed UUID identifiers
//!
//! Only things with the same meaning in every domain belong here.

pub mod error {
    pub mod app_error;
    pub mod conversions;
    pub mod kind;
}
pub mod id;
