//! Domain Services
//!
//! Read-side computations over a loaded poll.

use crate::domain::entities::Poll;
use crate::domain::fairness::SignalLimit;
use crate::domain::value_objects::SignalKind;
use chrono::{DateTime, Utc};

/// Per-option share of the vote
#[derive(Debug, Clone, PartialEq)]
pub struct OptionStats {
    pub text: String,
    pub votes: i64,
    /// Rounded to one decimal; 0 when the poll has no votes
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoteStats {
    pub total: i64,
    pub options: Vec<OptionStats>,
    pub computed_at: DateTime<Utc>,
}

/// Whether `token` has a vote inside the token window
pub fn has_voted(poll: &Poll, token: &str, limit: SignalLimit, now: DateTime<Utc>) -> bool {
    let window_start_ms = now.timestamp_millis() - limit.window_ms();
    poll.audit_log(SignalKind::Token)
        .any(|e| e.value == token && e.voted_at.timestamp_millis() > window_start_ms)
}

pub fn vote_stats(poll: &Poll, now: DateTime<Utc>) -> VoteStats {
    let total = poll.total_votes;
    let options = poll
        .options
        .iter()
        .map(|option| OptionStats {
            text: option.text.clone(),
            votes: option.votes,
            percentage: percentage(option.votes, total),
        })
        .collect();

    VoteStats {
        total,
        options,
        computed_at: now,
    }
}

fn percentage(votes: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    (votes as f64 * 1000.0 / total as f64).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::NewPoll;
    use crate::domain::value_objects::{PollId, VoteSignals};
    use chrono::TimeZone;
    use std::time::Duration;

    fn poll() -> Poll {
        let options = vec!["A".to_string(), "B".to_string(), "C".to_string()];
        let new_poll = NewPoll::new("Pick one", &options).unwrap();
        Poll::new(PollId::generate(), &new_poll, Utc.timestamp_opt(0, 0).unwrap())
    }

    #[test]
    fn test_percentages_one_decimal() {
        let mut p = poll();
        let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        for (i, choice) in [0, 0, 1].into_iter().enumerate() {
            let signals = VoteSignals::new("1.1.1.1", format!("t{i}"), "ua");
            p.record_vote(choice, &signals, now).unwrap();
        }

        let stats = vote_stats(&p, now);
        assert_eq!(stats.total, 3);
        let pct: Vec<f64> = stats.options.iter().map(|o| o.percentage).collect();
        assert_eq!(pct, vec![66.7, 33.3, 0.0]);
    }

    #[test]
    fn test_percentages_zero_without_votes() {
        let stats = vote_stats(&poll(), Utc::now());
        assert!(stats.options.iter().all(|o| o.percentage == 0.0));
    }

    #[test]
    fn test_has_voted_respects_window() {
        let mut p = poll();
        let voted_at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        p.record_vote(2, &VoteSignals::new("1.1.1.1", "tok", "ua"), voted_at)
            .unwrap();
        let limit = SignalLimit::new(1, Duration::from_secs(86_400));

        assert!(has_voted(&p, "tok", limit, voted_at + chrono::Duration::hours(23)));
        assert!(!has_voted(&p, "tok", limit, voted_at + chrono::Duration::hours(24)));
        assert!(!has_voted(&p, "other", limit, voted_at));
    }
}
