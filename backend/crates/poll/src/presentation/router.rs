//! Poll Router

use crate::application::config::PollConfig;
use crate::domain::repository::PollRepository;
use crate::presentation::handlers::{self, PollAppState};
use crate::presentation::{middleware, ws};
use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

/// Create a generic poll router for any repository implementation
pub fn poll_router_generic<R>(repo: R, config: PollConfig) -> Router
where
    R: PollRepository + Send + Sync + 'static,
{
    poll_router_with_state(PollAppState::new(repo, config))
}

/// Create the poll router around existing state
pub fn poll_router_with_state<R>(state: PollAppState<R>) -> Router
where
    R: PollRepository + Send + Sync + 'static,
{
    Router::new()
        .route(
            "/create",
            post(handlers::create_poll::<R>).route_layer(from_fn_with_state(
                state.clone(),
                middleware::limit_poll_creation::<R>,
            )),
        )
        .route("/", get(handlers::list_polls::<R>))
        .route("/limits", get(handlers::vote_limits::<R>))
        .route("/ws", get(ws::ws_handler::<R>))
        .route(
            "/{poll_id}",
            get(handlers::get_poll::<R>).delete(handlers::delete_poll::<R>),
        )
        .route(
            "/{poll_id}/vote",
            post(handlers::cast_vote::<R>).route_layer(from_fn_with_state(
                state.clone(),
                middleware::limit_votes::<R>,
            )),
        )
        .route("/{poll_id}/vote-status", get(handlers::vote_status::<R>))
        .route("/{poll_id}/stats", get(handlers::vote_stats::<R>))
        .route("/{poll_id}/voters", get(handlers::voter_details::<R>))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::limit_api_requests::<R>,
        ))
        .with_state(state)
}
