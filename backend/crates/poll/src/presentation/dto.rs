//! API DTOs (Data Transfer Objects)

use crate::application::create_poll::CreatePollOutput;
use crate::domain::entities::{PollFilter, PollOption, PollSummary, TallySnapshot};
use crate::domain::fairness::{FairnessPolicy, SignalLimit};
use crate::domain::services::VoteStats;
use crate::domain::voters::{VoterDetails, VoterEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Success envelope shared by every JSON endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Request for POST /api/polls/create
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollRequest {
    pub question: String,
    pub options: Vec<String>,
}

/// Request for POST /api/polls/{poll_id}/vote
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub option_index: i64,
}

/// Query for GET /api/polls
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPollsQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
}

/// Response for GET /api/polls
#[derive(Debug, Clone, Serialize)]
pub struct PollListResponse {
    pub success: bool,
    pub data: Vec<PollResponse>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    /// Polls on this page
    pub total: usize,
}

impl PollListResponse {
    pub fn new(filter: &PollFilter, polls: Vec<PollSummary>) -> Self {
        let data: Vec<PollResponse> = polls.into_iter().map(PollResponse::from).collect();
        Self {
            success: true,
            pagination: Pagination {
                page: filter.page,
                limit: filter.limit,
                total: data.len(),
            },
            data,
        }
    }
}

/// Response for POST /api/polls/create
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePollResponse {
    pub poll_id: String,
    pub question: String,
    pub shareable_link: String,
    pub created_at: DateTime<Utc>,
}

impl From<CreatePollOutput> for CreatePollResponse {
    fn from(output: CreatePollOutput) -> Self {
        Self {
            poll_id: output.poll_id.into_string(),
            question: output.question,
            shareable_link: output.shareable_link,
            created_at: output.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionResponse {
    pub text: String,
    pub votes: i64,
}

impl From<PollOption> for OptionResponse {
    fn from(option: PollOption) -> Self {
        Self {
            text: option.text,
            votes: option.votes,
        }
    }
}

/// Sanitized poll
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub poll_id: String,
    pub question: String,
    pub options: Vec<OptionResponse>,
    pub total_votes: i64,
    pub created_at: DateTime<Utc>,
}

impl From<PollSummary> for PollResponse {
    fn from(summary: PollSummary) -> Self {
        Self {
            poll_id: summary.id.into_string(),
            question: summary.question,
            options: summary.options.into_iter().map(Into::into).collect(),
            total_votes: summary.total_votes,
            created_at: summary.created_at,
        }
    }
}

/// Tallies after a vote; also the live `vote-update` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TallyResponse {
    pub poll_id: String,
    pub options: Vec<OptionResponse>,
    pub total_votes: i64,
}

impl From<TallySnapshot> for TallyResponse {
    fn from(snapshot: TallySnapshot) -> Self {
        Self {
            poll_id: snapshot.poll_id.into_string(),
            options: snapshot.options.into_iter().map(Into::into).collect(),
            total_votes: snapshot.total_votes,
        }
    }
}

/// Response for GET /api/polls/{poll_id}/vote-status
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatusResponse {
    pub has_voted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptionStatsResponse {
    pub text: String,
    pub votes: i64,
    pub percentage: f64,
}

/// Response for GET /api/polls/{poll_id}/stats
#[derive(Debug, Clone, Serialize)]
pub struct VoteStatsResponse {
    pub total: i64,
    pub options: Vec<OptionStatsResponse>,
    pub timestamp: DateTime<Utc>,
}

impl From<VoteStats> for VoteStatsResponse {
    fn from(stats: VoteStats) -> Self {
        Self {
            total: stats.total,
            options: stats
                .options
                .into_iter()
                .map(|o| OptionStatsResponse {
                    text: o.text,
                    votes: o.votes,
                    percentage: o.percentage,
                })
                .collect(),
            timestamp: stats.computed_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterResponse {
    pub voter_id: String,
    pub method: &'static str,
    pub choice: usize,
    pub voted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cookie: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub is_anonymous: bool,
}

impl From<VoterEntry> for VoterResponse {
    fn from(entry: VoterEntry) -> Self {
        Self {
            voter_id: entry.voter_id,
            method: entry.primary.label(),
            choice: entry.choice,
            voted_at: entry.voted_at,
            ip: entry.address,
            cookie: entry.token,
            user_agent: entry.client_string,
            is_anonymous: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionVotersResponse {
    pub option_index: usize,
    pub text: String,
    pub count: usize,
    pub voter_ids: Vec<String>,
}

/// Response for GET /api/polls/{poll_id}/voters
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoterDetailsResponse {
    pub total_voters: usize,
    pub voters_by_option: Vec<OptionVotersResponse>,
    pub voters: Vec<VoterResponse>,
}

impl From<VoterDetails> for VoterDetailsResponse {
    fn from(details: VoterDetails) -> Self {
        Self {
            total_voters: details.total_voters,
            voters_by_option: details
                .voters_by_option
                .into_iter()
                .map(|b| OptionVotersResponse {
                    option_index: b.option_index,
                    text: b.text,
                    count: b.voter_ids.len(),
                    voter_ids: b.voter_ids,
                })
                .collect(),
            voters: details.voters.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitResponse {
    pub max: u32,
    pub window_ms: i64,
}

impl From<SignalLimit> for LimitResponse {
    fn from(limit: SignalLimit) -> Self {
        Self {
            max: limit.max,
            window_ms: limit.window_ms(),
        }
    }
}

/// Response for GET /api/polls/limits
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsResponse {
    pub ip: LimitResponse,
    pub cookie: LimitResponse,
    pub user_agent: LimitResponse,
}

impl From<&FairnessPolicy> for LimitsResponse {
    fn from(policy: &FairnessPolicy) -> Self {
        Self {
            ip: policy.address.into(),
            cookie: policy.token.into(),
            user_agent: policy.client_string.into(),
        }
    }
}
