//! HTTP Handlers

use crate::application::cast_vote::{CastVoteInput, CastVoteUseCase};
use crate::application::config::PollConfig;
use crate::application::create_poll::CreatePollUseCase;
use crate::application::locks::PollLocks;
use crate::application::poll_queries::PollQueries;
use crate::application::visitor::{Visitor, verify_visitor_token};
use crate::domain::entities::{PollFilter, TallySnapshot};
use crate::domain::repository::PollRepository;
use crate::domain::value_objects::{PollId, VoteSignals};
use crate::error::PollResult;
use crate::infra::broadcast::BroadcastHub;
use crate::presentation::dto::{
    ApiResponse, CreatePollRequest, CreatePollResponse, LimitsResponse, ListPollsQuery,
    PollListResponse, PollResponse, TallyResponse, VoteRequest, VoteStatsResponse,
    VoteStatusResponse, VoterDetailsResponse,
};
use axum::Json;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use platform::client::extract_identity;
use platform::cookie::{CookieConfig, extract_cookie};
use platform::rate_limit::InMemoryRateLimitStore;
use std::net::SocketAddr;
use std::sync::Arc;

/// Shared state for poll handlers
pub struct PollAppState<R>
where
    R: PollRepository + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub hub: Arc<BroadcastHub>,
    pub locks: Arc<PollLocks>,
    pub rate_limits: Arc<InMemoryRateLimitStore>,
    pub config: Arc<PollConfig>,
}

impl<R> Clone for PollAppState<R>
where
    R: PollRepository + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            hub: self.hub.clone(),
            locks: self.locks.clone(),
            rate_limits: self.rate_limits.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R> PollAppState<R>
where
    R: PollRepository + Send + Sync + 'static,
{
    pub fn new(repo: R, config: PollConfig) -> Self {
        Self {
            repo: Arc::new(repo),
            hub: Arc::new(BroadcastHub::new(config.broadcast_capacity)),
            locks: Arc::new(PollLocks::new()),
            rate_limits: Arc::new(InMemoryRateLimitStore::new()),
            config: Arc::new(config),
        }
    }

    fn queries(&self) -> PollQueries<R> {
        PollQueries::new(self.repo.clone(), self.config.clone())
    }

    fn visitor_cookie(&self) -> CookieConfig {
        CookieConfig {
            name: self.config.visitor_cookie_name.clone(),
            secure: self.config.cookie_secure,
            http_only: true,
            same_site: self.config.cookie_same_site,
            path: "/".to_string(),
            max_age: Some(self.config.visitor_cookie_ttl),
        }
    }

    /// Visitor from the request cookie, issuing a new one if needed
    fn resolve_visitor(&self, headers: &HeaderMap) -> Visitor {
        let presented = extract_cookie(headers, &self.config.visitor_cookie_name);
        Visitor::resolve(presented.as_deref(), &self.config.visitor_secret)
    }

    /// Attach Set-Cookie for a newly issued visitor
    fn with_visitor_cookie(&self, mut response: Response, visitor: &Visitor) -> Response {
        if let Some(token) = &visitor.issued_token {
            match self.visitor_cookie().set_cookie_header(token) {
                Some(value) => {
                    response.headers_mut().append(header::SET_COOKIE, value);
                }
                None => tracing::error!("Visitor cookie is not a valid header value"),
            }
        }
        response
    }
}

/// POST /api/polls/create
pub async fn create_poll<R>(
    State(state): State<PollAppState<R>>,
    headers: HeaderMap,
    Json(req): Json<CreatePollRequest>,
) -> Response
where
    R: PollRepository + Send + Sync + 'static,
{
    let visitor = state.resolve_visitor(&headers);
    let use_case = CreatePollUseCase::new(state.repo.clone(), state.config.clone());

    let response = match use_case.execute(&req.question, &req.options).await {
        Ok(output) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok(CreatePollResponse::from(output))),
        )
            .into_response(),
        Err(e) => e.into_response(),
    };
    state.with_visitor_cookie(response, &visitor)
}

/// GET /api/polls
pub async fn list_polls<R>(
    State(state): State<PollAppState<R>>,
    Query(query): Query<ListPollsQuery>,
) -> PollResult<Json<PollListResponse>>
where
    R: PollRepository + Send + Sync + 'static,
{
    let filter = PollFilter::new(query.search, query.limit).with_page(query.page);
    let polls = state.queries().list(&filter).await?;
    Ok(Json(PollListResponse::new(&filter, polls)))
}

/// GET /api/polls/{poll_id}
pub async fn get_poll<R>(
    State(state): State<PollAppState<R>>,
    Path(poll_id): Path<String>,
) -> PollResult<Json<ApiResponse<PollResponse>>>
where
    R: PollRepository + Send + Sync + 'static,
{
    let poll_id = PollId::parse(&poll_id)?;
    let poll = state.queries().get(&poll_id).await?;
    Ok(Json(ApiResponse::ok(poll.into())))
}

/// DELETE /api/polls/{poll_id}
pub async fn delete_poll<R>(
    State(state): State<PollAppState<R>>,
    Path(poll_id): Path<String>,
) -> PollResult<Json<ApiResponse<()>>>
where
    R: PollRepository + Send + Sync + 'static,
{
    let poll_id = PollId::parse(&poll_id)?;
    state.queries().delete(&poll_id).await?;
    Ok(Json(
        ApiResponse::ok(()).with_message("Poll deleted successfully"),
    ))
}

/// POST /api/polls/{poll_id}/vote
pub async fn cast_vote<R>(
    State(state): State<PollAppState<R>>,
    Path(poll_id): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<VoteRequest>,
) -> Response
where
    R: PollRepository + Send + Sync + 'static,
{
    let visitor = state.resolve_visitor(&headers);
    let result = record_vote(&state, &poll_id, addr, &headers, &visitor, req.option_index).await;

    let response = match result {
        Ok(snapshot) => Json(
            ApiResponse::ok(TallyResponse::from(snapshot)).with_message("Vote recorded successfully"),
        )
        .into_response(),
        Err(e) => e.into_response(),
    };
    state.with_visitor_cookie(response, &visitor)
}

async fn record_vote<R>(
    state: &PollAppState<R>,
    poll_id: &str,
    addr: SocketAddr,
    headers: &HeaderMap,
    visitor: &Visitor,
    option_index: i64,
) -> PollResult<TallySnapshot>
where
    R: PollRepository + Send + Sync + 'static,
{
    let poll_id = PollId::parse(poll_id)?;
    let identity = extract_identity(headers, Some(addr.ip()), state.config.trust_forwarded_for)?;
    let signals = VoteSignals::new(identity.address(), visitor.signal(), identity.user_agent);

    let use_case = CastVoteUseCase::new(
        state.repo.clone(),
        state.hub.clone(),
        state.locks.clone(),
        state.config.clone(),
    );
    use_case
        .execute(CastVoteInput {
            poll_id,
            option_index,
            signals,
        })
        .await
}

/// GET /api/polls/{poll_id}/vote-status
pub async fn vote_status<R>(
    State(state): State<PollAppState<R>>,
    Path(poll_id): Path<String>,
    headers: HeaderMap,
) -> PollResult<Json<ApiResponse<VoteStatusResponse>>>
where
    R: PollRepository + Send + Sync + 'static,
{
    let poll_id = PollId::parse(&poll_id)?;
    let token = extract_cookie(&headers, &state.config.visitor_cookie_name)
        .and_then(|t| verify_visitor_token(&t, &state.config.visitor_secret))
        .map(|id| id.to_string());

    let has_voted = state
        .queries()
        .vote_status(&poll_id, token.as_deref(), Utc::now())
        .await?;
    Ok(Json(ApiResponse::ok(VoteStatusResponse { has_voted })))
}

/// GET /api/polls/{poll_id}/stats
pub async fn vote_stats<R>(
    State(state): State<PollAppState<R>>,
    Path(poll_id): Path<String>,
) -> PollResult<Json<ApiResponse<VoteStatsResponse>>>
where
    R: PollRepository + Send + Sync + 'static,
{
    let poll_id = PollId::parse(&poll_id)?;
    let stats = state.queries().stats(&poll_id, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(stats.into())))
}

/// GET /api/polls/{poll_id}/voters
pub async fn voter_details<R>(
    State(state): State<PollAppState<R>>,
    Path(poll_id): Path<String>,
) -> PollResult<Json<ApiResponse<VoterDetailsResponse>>>
where
    R: PollRepository + Send + Sync + 'static,
{
    let poll_id = PollId::parse(&poll_id)?;
    let details = state.queries().voters(&poll_id).await?;
    Ok(Json(ApiResponse::ok(details.into())))
}

/// GET /api/polls/limits
pub async fn vote_limits<R>(
    State(state): State<PollAppState<R>>,
) -> Json<ApiResponse<LimitsResponse>>
where
    R: PollRepository + Send + Sync + 'static,
{
    Json(ApiResponse::ok(LimitsResponse::from(&state.config.fairness)))
}
