//! In-memory repository
//!
//! Process-local store used when no database is configured and by tests.
//! All writes take the map's write lock, which makes each vote atomic.

use crate::domain::entities::{NewPoll, Poll, PollFilter, PollSummary};
use crate::domain::repository::PollRepository;
use crate::domain::value_objects::{PollId, VoteSignals};
use crate::error::{PollError, PollResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct InMemoryPollRepository {
    polls: Arc<RwLock<HashMap<PollId, Poll>>>,
}

impl InMemoryPollRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.polls.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.polls.read().await.is_empty()
    }
}

impl PollRepository for InMemoryPollRepository {
    async fn create(&self, new_poll: &NewPoll) -> PollResult<Poll> {
        let mut polls = self.polls.write().await;
        let mut id = PollId::generate();
        while polls.contains_key(&id) {
            id = PollId::generate();
        }

        let poll = Poll::new(id.clone(), new_poll, Utc::now());
        polls.insert(id, poll.clone());
        Ok(poll)
    }

    async fn get_by_id(&self, poll_id: &PollId) -> PollResult<Option<Poll>> {
        Ok(self.polls.read().await.get(poll_id).cloned())
    }

    async fn list(&self, filter: &PollFilter) -> PollResult<Vec<PollSummary>> {
        let polls = self.polls.read().await;
        let mut matching: Vec<&Poll> = polls
            .values()
            .filter(|p| filter.matches(&p.question))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(matching
            .into_iter()
            .skip(filter.offset())
            .take(filter.limit)
            .map(Poll::summary)
            .collect())
    }

    async fn delete(&self, poll_id: &PollId) -> PollResult<bool> {
        Ok(self.polls.write().await.remove(poll_id).is_some())
    }

    async fn delete_expired(&self, before: DateTime<Utc>) -> PollResult<u64> {
        let mut polls = self.polls.write().await;
        let count = polls.len();
        polls.retain(|_, p| p.created_at >= before);
        Ok((count - polls.len()) as u64)
    }

    async fn increment_vote_and_append_audit(
        &self,
        poll_id: &PollId,
        option_index: usize,
        signals: &VoteSignals,
        voted_at: DateTime<Utc>,
    ) -> PollResult<Poll> {
        let mut polls = self.polls.write().await;
        let poll = polls.get_mut(poll_id).ok_or(PollError::PollNotFound)?;
        poll.record_vote(option_index, signals, voted_at)?;
        Ok(poll.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_poll(question: &str) -> NewPoll {
        NewPoll::new(question, &["Yes".to_string(), "No".to_string()]).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryPollRepository::new();
        let poll = repo.create(&new_poll("Ship it?")).await.unwrap();

        let loaded = repo.get_by_id(&poll.id).await.unwrap().unwrap();
        assert_eq!(loaded.question, "Ship it?");
        assert_eq!(loaded.total_votes, 0);
        assert!(loaded.options.iter().all(|o| o.votes == 0));
    }

    #[tokio::test]
    async fn test_increment_keeps_counters_and_log_together() {
        let repo = InMemoryPollRepository::new();
        let poll = repo.create(&new_poll("Ship it?")).await.unwrap();
        let signals = VoteSignals::new("1.2.3.4", "tok", "ua");

        let updated = repo
            .increment_vote_and_append_audit(&poll.id, 1, &signals, Utc::now())
            .await
            .unwrap();
        assert_eq!(updated.total_votes, 1);
        assert_eq!(updated.options[1].votes, 1);
        assert_eq!(updated.votes.len(), 1);
        assert!(updated.is_consistent());

        let bad = repo
            .increment_vote_and_append_audit(&poll.id, 2, &signals, Utc::now())
            .await;
        assert!(matches!(bad, Err(PollError::InvalidOption)));
        let after = repo.get_by_id(&poll.id).await.unwrap().unwrap();
        assert_eq!(after.total_votes, 1);
        assert_eq!(after.votes.len(), 1);
    }

    #[tokio::test]
    async fn test_list_search_and_order() {
        let repo = InMemoryPollRepository::new();
        repo.create(&new_poll("Favourite colour?")).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        repo.create(&new_poll("Best COLOUR scheme?")).await.unwrap();
        repo.create(&new_poll("Lunch spot?")).await.unwrap();

        let filter = PollFilter::new(Some("colour".to_string()), None);
        let found = repo.list(&filter).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].question, "Best COLOUR scheme?");

        let limited = repo.list(&PollFilter::new(None, Some(1))).await.unwrap();
        assert_eq!(limited.len(), 1);

        let second_page = repo
            .list(&PollFilter::new(Some("colour".to_string()), Some(1)).with_page(Some(2)))
            .await
            .unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].question, "Favourite colour?");

        let past_end = repo
            .list(&PollFilter::new(None, Some(10)).with_page(Some(2)))
            .await
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn test_delete_and_expire() {
        let repo = InMemoryPollRepository::new();
        let a = repo.create(&new_poll("First poll")).await.unwrap();
        repo.create(&new_poll("Second poll")).await.unwrap();

        assert!(repo.delete(&a.id).await.unwrap());
        assert!(!repo.delete(&a.id).await.unwrap());

        assert_eq!(
            repo.delete_expired(Utc::now() - Duration::days(30)).await.unwrap(),
            0
        );
        assert_eq!(
            repo.delete_expired(Utc::now() + Duration::seconds(1)).await.unwrap(),
            1
        );
        assert!(repo.is_empty().await);
    }
}
