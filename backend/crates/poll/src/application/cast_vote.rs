//! Cast Vote Use Case

use crate::application::config::PollConfig;
use crate::application::locks::PollLocks;
use crate::domain::entities::TallySnapshot;
use crate::domain::repository::{PollRepository, TallyPublisher};
use crate::domain::value_objects::{PollId, VoteSignals};
use crate::error::{PollError, PollResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Input DTO for cast vote
#[derive(Debug, Clone)]
pub struct CastVoteInput {
    pub poll_id: PollId,
    /// As sent by the client; range-checked against the loaded poll
    pub option_index: i64,
    pub signals: VoteSignals,
}

/// Cast Vote Use Case
///
/// Load, gate, count and publish run under the poll's lock, so concurrent
/// votes on one poll are serialized and observers receive tallies in commit
/// order.
pub struct CastVoteUseCase<R, P>
where
    R: PollRepository,
    P: TallyPublisher,
{
    repo: Arc<R>,
    publisher: Arc<P>,
    locks: Arc<PollLocks>,
    config: Arc<PollConfig>,
}

impl<R, P> CastVoteUseCase<R, P>
where
    R: PollRepository,
    P: TallyPublisher,
{
    pub fn new(
        repo: Arc<R>,
        publisher: Arc<P>,
        locks: Arc<PollLocks>,
        config: Arc<PollConfig>,
    ) -> Self {
        Self {
            repo,
            publisher,
            locks,
            config,
        }
    }

    pub async fn execute(&self, input: CastVoteInput) -> PollResult<TallySnapshot> {
        self.process(input, None).await
    }

    /// Process a vote as if it arrived at `now`
    pub async fn execute_at(
        &self,
        input: CastVoteInput,
        now: DateTime<Utc>,
    ) -> PollResult<TallySnapshot> {
        self.process(input, Some(now)).await
    }

    async fn process(
        &self,
        input: CastVoteInput,
        at: Option<DateTime<Utc>>,
    ) -> PollResult<TallySnapshot> {
        let CastVoteInput {
            poll_id,
            option_index,
            signals,
        } = input;

        let _guard = self.locks.acquire(&poll_id).await;
        // Read the clock under the guard so the vote log stays time-ordered
        let now = at.unwrap_or_else(Utc::now);

        let poll = self
            .repo
            .get_by_id(&poll_id)
            .await?
            .ok_or(PollError::PollNotFound)?;

        let option_index = usize::try_from(option_index)
            .ok()
            .filter(|&i| poll.has_option(i))
            .ok_or(PollError::InvalidOption)?;

        let verdict = self.config.fairness.evaluate(&poll, &signals, now);
        if !verdict.allowed() {
            tracing::warn!(
                poll_id = %poll_id,
                option_index,
                failed = verdict.failed_checks.len(),
                "Vote failed fairness checks"
            );
            return Err(PollError::FairnessRejected {
                failed_checks: verdict.failed_checks,
            });
        }

        let updated = self
            .repo
            .increment_vote_and_append_audit(&poll_id, option_index, &signals, now)
            .await?;

        let snapshot = updated.snapshot();
        let delivered = self.publisher.publish(snapshot.clone());

        tracing::info!(
            poll_id = %poll_id,
            option_index,
            total_votes = snapshot.total_votes,
            observers = delivered,
            "Vote recorded"
        );

        Ok(snapshot)
    }
}
