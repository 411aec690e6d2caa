//! Expire Polls Use Case
//!
//! Polls are kept for a fixed retention period from creation.

use crate::domain::repository::PollRepository;
use crate::error::PollResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct ExpirePollsUseCase<R>
where
    R: PollRepository,
{
    repo: Arc<R>,
    retention: Duration,
}

impl<R> ExpirePollsUseCase<R>
where
    R: PollRepository + Sync + 'static,
{
    pub fn new(repo: Arc<R>, retention: Duration) -> Self {
        Self { repo, retention }
    }

    /// Delete polls created more than `retention` before `now`
    pub async fn execute_at(&self, now: DateTime<Utc>) -> PollResult<u64> {
        let retention = chrono::Duration::from_std(self.retention)
            .unwrap_or_else(|_| chrono::Duration::days(30));
        let deleted = self.repo.delete_expired(now - retention).await?;
        if deleted > 0 {
            tracing::info!(deleted, "Expired polls removed");
        }
        Ok(deleted)
    }

    /// Sweep at startup and then every `interval`; failures are logged
    pub fn spawn(self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.execute_at(Utc::now()).await {
                    tracing::error!(error = %e, "Poll expiry sweep failed");
                }
            }
        })
    }
}
