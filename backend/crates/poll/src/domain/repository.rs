//! Repository Traits
//!
//! Interfaces for persistence and tally fan-out. Implementations are in the
//! infrastructure layer.

use crate::domain::entities::{NewPoll, Poll, PollFilter, PollSummary, TallySnapshot};
use crate::domain::value_objects::{PollId, VoteSignals};
use crate::error::PollResult;
use chrono::{DateTime, Utc};

/// Poll repository trait
#[trait_variant::make(PollRepository: Send)]
pub trait LocalPollRepository {
    /// Create a poll with zeroed tallies under a fresh id
    async fn create(&self, new_poll: &NewPoll) -> PollResult<Poll>;

    /// Load a poll with its full vote log
    async fn get_by_id(&self, poll_id: &PollId) -> PollResult<Option<Poll>>;

    /// Newest first, filtered by question text
    async fn list(&self, filter: &PollFilter) -> PollResult<Vec<PollSummary>>;

    /// Returns whether a poll was removed
    async fn delete(&self, poll_id: &PollId) -> PollResult<bool>;

    /// Remove polls created before `before`; returns the number removed
    async fn delete_expired(&self, before: DateTime<Utc>) -> PollResult<u64>;

    /// Count one vote and append its audit entries in a single commit
    ///
    /// Either the tallies and the vote log both change or neither does.
    async fn increment_vote_and_append_audit(
        &self,
        poll_id: &PollId,
        option_index: usize,
        signals: &VoteSignals,
        voted_at: DateTime<Utc>,
    ) -> PollResult<Poll>;
}

/// Fan-out of committed tallies to live observers
pub trait TallyPublisher: Send + Sync {
    /// Deliver to every current observer of the poll; returns how many received it
    fn publish(&self, snapshot: TallySnapshot) -> usize;
}

impl<T: TallyPublisher + ?Sized> TallyPublisher for std::sync::Arc<T> {
    fn publish(&self, snapshot: TallySnapshot) -> usize {
        (**self).publish(snapshot)
    }
}
