//! Create Poll Use Case

use crate::application::config::PollConfig;
use crate::domain::entities::NewPoll;
use crate::domain::repository::PollRepository;
use crate::domain::value_objects::PollId;
use crate::error::PollResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Output DTO for create poll
#[derive(Debug, Clone)]
pub struct CreatePollOutput {
    pub poll_id: PollId,
    pub question: String,
    pub shareable_link: String,
    pub created_at: DateTime<Utc>,
}

/// Create Poll Use Case
pub struct CreatePollUseCase<R>
where
    R: PollRepository,
{
    repo: Arc<R>,
    config: Arc<PollConfig>,
}

impl<R> CreatePollUseCase<R>
where
    R: PollRepository,
{
    pub fn new(repo: Arc<R>, config: Arc<PollConfig>) -> Self {
        Self { repo, config }
    }

    pub async fn execute(&self, question: &str, options: &[String]) -> PollResult<CreatePollOutput> {
        let new_poll = NewPoll::new(question, options)?;
        let poll = self.repo.create(&new_poll).await?;

        tracing::info!(
            poll_id = %poll.id,
            options = poll.options.len(),
            "Poll created"
        );

        Ok(CreatePollOutput {
            shareable_link: self.config.shareable_link(poll.id.as_str()),
            poll_id: poll.id,
            question: poll.question,
            created_at: poll.created_at,
        })
    }
}
