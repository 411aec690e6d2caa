//! Request rate limiting middleware
//!
//! Fixed-window limits per client address, applied before any handler work.
//! Every API request draws on a shared budget; creation and votes have
//! their own on top, and votes are keyed by poll so each poll has one.

use crate::domain::repository::PollRepository;
use crate::domain::value_objects::PollId;
use crate::error::PollError;
use crate::presentation::handlers::PollAppState;
use axum::extract::{ConnectInfo, Path, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use platform::client::{address_key, extract_client_ip};
use platform::rate_limit::{RateLimitConfig, RateLimitStore, now_ms};
use std::net::SocketAddr;

/// Limit every poll API request per address
pub async fn limit_api_requests<R>(
    State(state): State<PollAppState<R>>,
    req: Request,
    next: Next,
) -> Response
where
    R: PollRepository + Send + Sync + 'static,
{
    let key = format!("api:{}", client_address(&state, &req));
    enforce(&state, &key, &state.config.api_rate_limit, req, next).await
}

/// Limit POST /create per address
pub async fn limit_poll_creation<R>(
    State(state): State<PollAppState<R>>,
    req: Request,
    next: Next,
) -> Response
where
    R: PollRepository + Send + Sync + 'static,
{
    let key = format!("create:{}", client_address(&state, &req));
    enforce(&state, &key, &state.config.create_rate_limit, req, next).await
}

/// Limit POST /{poll_id}/vote per address and poll
pub async fn limit_votes<R>(
    State(state): State<PollAppState<R>>,
    Path(poll_id): Path<String>,
    req: Request,
    next: Next,
) -> Response
where
    R: PollRepository + Send + Sync + 'static,
{
    // Ids parse case-insensitively, so key on the canonical form
    let poll_key = match PollId::parse(&poll_id) {
        Ok(id) => id.to_string(),
        Err(_) => poll_id.to_ascii_lowercase(),
    };
    let key = format!("vote:{}:{}", client_address(&state, &req), poll_key);
    enforce(&state, &key, &state.config.vote_rate_limit, req, next).await
}

async fn enforce<R>(
    state: &PollAppState<R>,
    key: &str,
    config: &RateLimitConfig,
    req: Request,
    next: Next,
) -> Response
where
    R: PollRepository + Send + Sync + 'static,
{
    let result = match state.rate_limits.check_and_increment(key, config).await {
        Ok(result) => result,
        Err(e) => return PollError::from(e).into_response(),
    };

    if !result.allowed {
        tracing::debug!(key, reset_at_ms = result.reset_at_ms, "Request limit reached");
        return PollError::RateLimitExceeded {
            retry_after_secs: result.retry_after_secs(now_ms()),
        }
        .into_response();
    }

    next.run(req).await
}

fn client_address<R>(state: &PollAppState<R>, req: &Request) -> String
where
    R: PollRepository + Send + Sync + 'static,
{
    let direct_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    address_key(extract_client_ip(
        req.headers(),
        direct_ip,
        state.config.trust_forwarded_for,
    ))
}
