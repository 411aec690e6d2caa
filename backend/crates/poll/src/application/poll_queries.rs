//! Poll read and delete use cases

use crate::application::config::PollConfig;
use crate::domain::entities::{Poll, PollFilter, PollSummary};
use crate::domain::repository::PollRepository;
use crate::domain::services::{self, VoteStats};
use crate::domain::value_objects::PollId;
use crate::domain::voters::{self, VoterDetails};
use crate::error::{PollError, PollResult};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct PollQueries<R>
where
    R: PollRepository,
{
    repo: Arc<R>,
    config: Arc<PollConfig>,
}

impl<R> PollQueries<R>
where
    R: PollRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<PollConfig>) -> Self {
        Self { repo, config }
    }

    async fn load(&self, poll_id: &PollId) -> PollResult<Poll> {
        self.repo
            .get_by_id(poll_id)
            .await?
            .ok_or(PollError::PollNotFound)
    }

    pub async fn get(&self, poll_id: &PollId) -> PollResult<PollSummary> {
        Ok(self.load(poll_id).await?.summary())
    }

    pub async fn list(&self, filter: &PollFilter) -> PollResult<Vec<PollSummary>> {
        self.repo.list(filter).await
    }

    pub async fn delete(&self, poll_id: &PollId) -> PollResult<()> {
        if !self.repo.delete(poll_id).await? {
            return Err(PollError::PollNotFound);
        }
        tracing::info!(poll_id = %poll_id, "Poll deleted");
        Ok(())
    }

    /// Whether the visitor has a vote inside the token window
    ///
    /// A visitor without a token has not voted; the poll is not loaded.
    pub async fn vote_status(
        &self,
        poll_id: &PollId,
        token: Option<&str>,
        now: DateTime<Utc>,
    ) -> PollResult<bool> {
        let Some(token) = token else {
            return Ok(false);
        };
        let poll = self.load(poll_id).await?;
        Ok(services::has_voted(
            &poll,
            token,
            self.config.fairness.token,
            now,
        ))
    }

    pub async fn stats(&self, poll_id: &PollId, now: DateTime<Utc>) -> PollResult<VoteStats> {
        let poll = self.load(poll_id).await?;
        Ok(services::vote_stats(&poll, now))
    }

    pub async fn voters(&self, poll_id: &PollId) -> PollResult<VoterDetails> {
        let poll = self.load(poll_id).await?;
        Ok(voters::aggregate(&poll, self.config.dedup_window))
    }
}
