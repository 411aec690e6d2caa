//! Application Error - Unified error type for the application
//!
//! Defines [`AppError`] struct and [`AppResult<T>`] type alias.

use std::borrow::Cow;
use std::error::Error;
use std::fmt;

use serde_json::{Map, Value};

use super::kind::ErrorKind;

/// Unified application error.
///
/// Built with a small builder API. Domain crates keep their own `thiserror`
/// enums and convert into this type at the HTTP boundary.
///
/// ## Fields
/// * `kind` - classification (maps to the HTTP status)
/// * `message` - user-facing message
/// * `action` - what the user should do next (optional)
/// * `retry_after_secs` - rendered as a `Retry-After` header (optional)
/// * `extensions` - extra problem-detail members, e.g. per-check reasons
/// * `source` - underlying error, never rendered
///
/// ## Examples
/// ```rust
/// use kernel::error::app_error::AppError;
///
/// let err = AppError::too_many_requests("Vote rejected")
///     .with_action("Try again later")
///     .with_retry_after(3600);
/// assert_eq!(err.status_code(), 429);
/// assert_eq!(err.retry_after_secs(), Some(3600));
/// ```
pub struct AppError {
    kind: ErrorKind,
    message: Cow<'static, str>,
    action: Option<Cow<'static, str>>,
    retry_after_secs: Option<u64>,
    extensions: Map<String, Value>,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

/// `Result<T, AppError>`
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    // ========================================================================
    // Constructors
    // ========================================================================

    #[inline]
    pub fn new(kind: ErrorKind, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind,
            message: message.into(),
            action: None,
            retry_after_secs: None,
            extensions: Map::new(),
            source: None,
        }
    }

    /// 400 Bad Request
    #[inline]
    pub fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    /// 404 Not Found
    #[inline]
    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// 429 Too Many Requests
    #[inline]
    pub fn too_many_requests(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::TooManyRequests, message)
    }

    /// 500 Internal Server Error
    #[inline]
    pub fn internal(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::InternalServerError, message)
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    #[inline]
    pub fn with_action(mut self, action: impl Into<Cow<'static, str>>) -> Self {
        self.action = Some(action.into());
        self
    }

    #[inline]
    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after_secs = Some(secs);
        self
    }

    /// Add an RFC 7807 extension member to the rendered body.
    ///
    /// Reserved member names (`type`, `title`, `status`, `detail`, `action`)
    /// are ignored.
    pub fn with_extension(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        if !matches!(
            name.as_str(),
            "type" | "title" | "status" | "detail" | "action"
        ) {
            self.extensions.insert(name, value);
        }
        self
    }

    #[inline]
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Error + Send + Sync + 'static,
    {
        self.source = Some(Box::new(source));
        self
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline]
    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    #[inline]
    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after_secs
    }

    #[inline]
    pub fn extensions(&self) -> &Map<String, Value> {
        &self.extensions
    }

    #[inline]
    pub fn is_server_error(&self) -> bool {
        self.kind.is_server_error()
    }

    #[inline]
    pub fn is_client_error(&self) -> bool {
        self.kind.is_client_error()
    }

    /// RFC 7807 problem-details body
    pub fn problem_body(&self) -> Value {
        let mut body = Map::new();
        body.insert(
            "type".into(),
            Value::String(format!("https://httpstatuses.io/{}", self.status_code())),
        );
        body.insert("title".into(), Value::String(self.kind.as_str().into()));
        body.insert("status".into(), Value::from(self.status_code()));
        body.insert("detail".into(), Value::String(self.message.to_string()));
        body.insert(
            "action".into(),
            self.action
                .as_ref()
                .map(|a| Value::String(a.to_string()))
                .unwrap_or(Value::Null),
        );
        body.insert("success".into(), Value::Bool(false));
        for (name, value) in &self.extensions {
            body.insert(name.clone(), value.clone());
        }
        Value::Object(body)
    }
}

impl fmt::Debug for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("AppError");
        builder.field("kind", &self.kind);
        builder.field("message", &self.message);
        if let Some(action) = &self.action {
            builder.field("action", action);
        }
        if let Some(secs) = &self.retry_after_secs {
            builder.field("retry_after_secs", secs);
        }
        if !self.extensions.is_empty() {
            builder.field("extensions", &self.extensions);
        }
        if let Some(source) = &self.source {
            builder.field("source", source);
        }
        builder.finish()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(action) = &self.action {
            write!(f, " (Action: {})", action)?;
        }
        Ok(())
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_error() {
        let err = AppError::new(ErrorKind::NotFound, "Poll not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.status_code(), 404);
        assert_eq!(err.message(), "Poll not found");
        assert!(err.action().is_none());
        assert!(err.retry_after_secs().is_none());
    }

    #[test]
    fn test_convenience_constructors() {
        assert_eq!(AppError::bad_request("test").status_code(), 400);
        assert_eq!(AppError::not_found("test").status_code(), 404);
        assert_eq!(AppError::too_many_requests("test").status_code(), 429);
        assert_eq!(AppError::internal("test").status_code(), 500);
    }

    #[test]
    fn test_problem_body_members() {
        let err = AppError::too_many_requests("Vote rejected")
            .with_action("Wait before voting again")
            .with_extension("errors", json!([{"check": "ipCheck"}]));

        let body = err.problem_body();
        assert_eq!(body["status"], 429);
        assert_eq!(body["title"], "Too Many Requests");
        assert_eq!(body["detail"], "Vote rejected");
        assert_eq!(body["action"], "Wait before voting again");
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"][0]["check"], "ipCheck");
    }

    #[test]
    fn test_reserved_extension_ignored() {
        let err = AppError::bad_request("Invalid").with_extension("status", json!(200));
        assert!(err.extensions().is_empty());
        assert_eq!(err.problem_body()["status"], 400);
    }

    #[test]
    fn test_with_source() {
        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = AppError::internal("Failed to persist").with_source(io_err);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_display() {
        let err = AppError::not_found("Poll not found");
        assert_eq!(err.to_string(), "[Not Found] Poll not found");

        let err = AppError::bad_request("Invalid option").with_action("Pick a listed option");
        assert!(err.to_string().contains("Action:"));
    }
}
