//! Fairness Gate
//!
//! Decides whether a vote attempt may be counted, given the poll's prior
//! votes. Each signal has its own trailing-window limit and every check runs,
//! so a rejection lists all failed checks at once.
//!
//! The signals are trivially spoofable (addresses are shared behind NAT,
//! cookies can be cleared, User-Agent strings collide across real users).
//! Layering them raises the cost of casual ballot stuffing; it does not stop
//! a determined client.

use crate::domain::entities::Poll;
use crate::domain::value_objects::{SignalKind, VoteSignals};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Limit for one signal: at most `max` votes inside the trailing `window`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalLimit {
    pub max: u32,
    pub window: Duration,
}

impl SignalLimit {
    pub const fn new(max: u32, window: Duration) -> Self {
        Self { max, window }
    }

    pub fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }
}

/// Per-signal vote limits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FairnessPolicy {
    pub address: SignalLimit,
    pub token: SignalLimit,
    pub client_string: SignalLimit,
}

impl Default for FairnessPolicy {
    fn default() -> Self {
        Self {
            address: SignalLimit::new(3, Duration::from_secs(60 * 60)),
            token: SignalLimit::new(1, Duration::from_secs(24 * 60 * 60)),
            client_string: SignalLimit::new(5, Duration::from_secs(60 * 60)),
        }
    }
}

impl FairnessPolicy {
    pub fn limit(&self, kind: SignalKind) -> SignalLimit {
        match kind {
            SignalKind::Address => self.address,
            SignalKind::Token => self.token,
            SignalKind::ClientString => self.client_string,
        }
    }

    /// Evaluate all three checks against the poll's audit logs
    pub fn evaluate(&self, poll: &Poll, signals: &VoteSignals, now: DateTime<Utc>) -> FairnessVerdict {
        let failed_checks = SignalKind::ALL
            .into_iter()
            .filter_map(|kind| self.check(poll, kind, signals.value(kind), now))
            .collect();
        FairnessVerdict { failed_checks }
    }

    fn check(
        &self,
        poll: &Poll,
        kind: SignalKind,
        value: &str,
        now: DateTime<Utc>,
    ) -> Option<FailedCheck> {
        let limit = self.limit(kind);
        let now_ms = now.timestamp_millis();
        let window_start_ms = now_ms - limit.window_ms();

        let mut recent: Vec<i64> = poll
            .audit_log(kind)
            .filter(|entry| entry.value == value)
            .map(|entry| entry.voted_at.timestamp_millis())
            .filter(|&voted_at_ms| voted_at_ms > window_start_ms)
            .collect();

        if recent.len() < limit.max as usize {
            return None;
        }

        recent.sort_unstable();
        // Oldest entry that has to leave the window before the count drops below max
        let release_ms = recent
            .get(recent.len() - limit.max as usize)
            .map(|&voted_at_ms| voted_at_ms + limit.window_ms() - now_ms)
            .unwrap_or(limit.window_ms());

        Some(FailedCheck {
            kind,
            reason: reason(kind, limit),
            retry_after_minutes: ceil_minutes(release_ms),
        })
    }
}

/// One failed fairness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedCheck {
    pub kind: SignalKind,
    pub reason: String,
    pub retry_after_minutes: u64,
}

impl FailedCheck {
    pub fn check_name(&self) -> &'static str {
        self.kind.check_name()
    }
}

/// Outcome of [`FairnessPolicy::evaluate`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FairnessVerdict {
    pub failed_checks: Vec<FailedCheck>,
}

impl FairnessVerdict {
    pub fn allowed(&self) -> bool {
        self.failed_checks.is_empty()
    }

    /// Longest retry hint among the failed checks
    pub fn retry_after_minutes(&self) -> Option<u64> {
        self.failed_checks
            .iter()
            .map(|c| c.retry_after_minutes)
            .max()
    }
}

fn reason(kind: SignalKind, limit: SignalLimit) -> String {
    match kind {
        SignalKind::Address => format!(
            "Too many votes from this IP address. Maximum {} votes per {}.",
            limit.max,
            describe_window(limit.window)
        ),
        SignalKind::Token => format!(
            "You have already voted on this poll. Please wait {} between votes.",
            describe_window_span(limit.window)
        ),
        SignalKind::ClientString => "Suspicious voting pattern detected.".to_string(),
    }
}

/// "hour", "24 hours", "30 minutes"
fn describe_window(window: Duration) -> String {
    match describe_window_span(window).as_str() {
        "1 hour" => "hour".to_string(),
        "1 minute" => "minute".to_string(),
        other => other.to_string(),
    }
}

fn describe_window_span(window: Duration) -> String {
    let secs = window.as_secs();
    let (n, unit) = if secs >= 3600 && secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else {
        (secs.div_ceil(60).max(1), "minute")
    };
    if n == 1 {
        format!("1 {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

fn ceil_minutes(ms: i64) -> u64 {
    let ms = ms.max(0) as u64;
    ms.div_ceil(60_000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::NewPoll;
    use crate::domain::value_objects::PollId;
    use chrono::TimeZone;

    fn poll() -> Poll {
        let new_poll = NewPoll::new("Pick one", &["A".to_string(), "B".to_string()]).unwrap();
        Poll::new(PollId::generate(), &new_poll, Utc.timestamp_opt(0, 0).unwrap())
    }

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap() + chrono::Duration::minutes(minutes)
    }

    #[test]
    fn test_all_checks_reported_together() {
        let mut p = poll();
        let policy = FairnessPolicy {
            address: SignalLimit::new(1, Duration::from_secs(3600)),
            token: SignalLimit::new(1, Duration::from_secs(86_400)),
            client_string: SignalLimit::new(1, Duration::from_secs(3600)),
        };
        let signals = VoteSignals::new("10.0.0.1", "tok", "ua");
        p.record_vote(0, &signals, at(0)).unwrap();

        let verdict = policy.evaluate(&p, &signals, at(1));
        assert!(!verdict.allowed());
        let names: Vec<_> = verdict.failed_checks.iter().map(|c| c.check_name()).collect();
        assert_eq!(names, ["ipCheck", "cookieCheck", "userAgentCheck"]);
    }

    #[test]
    fn test_address_cap_of_three_per_hour() {
        let mut p = poll();
        let policy = FairnessPolicy::default();
        for (i, minute) in [0, 10, 20].into_iter().enumerate() {
            let signals = VoteSignals::new("10.0.0.1", format!("tok-{i}"), format!("ua-{i}"));
            assert!(policy.evaluate(&p, &signals, at(minute)).allowed());
            p.record_vote(0, &signals, at(minute)).unwrap();
        }

        let fourth = VoteSignals::new("10.0.0.1", "tok-new", "ua-new");
        let verdict = policy.evaluate(&p, &fourth, at(30));
        assert_eq!(verdict.failed_checks.len(), 1);
        let failed = &verdict.failed_checks[0];
        assert_eq!(failed.kind, SignalKind::Address);
        assert_eq!(
            failed.reason,
            "Too many votes from this IP address. Maximum 3 votes per hour."
        );
        // First vote at minute 0 leaves the window at minute 60
        assert_eq!(failed.retry_after_minutes, 30);

        // Once the oldest vote is out of the window the address may vote again
        assert!(policy.evaluate(&p, &fourth, at(60)).allowed());
    }

    #[test]
    fn test_token_window_is_exclusive_at_boundary() {
        let mut p = poll();
        let policy = FairnessPolicy::default();
        let first = VoteSignals::new("10.0.0.1", "tok", "ua");
        p.record_vote(1, &first, at(0)).unwrap();

        let again = VoteSignals::new("10.9.9.9", "tok", "other-ua");
        let verdict = policy.evaluate(&p, &again, at(24 * 60 - 1));
        assert_eq!(verdict.failed_checks.len(), 1);
        assert_eq!(verdict.failed_checks[0].kind, SignalKind::Token);
        assert_eq!(verdict.failed_checks[0].retry_after_minutes, 1);
        assert_eq!(
            verdict.failed_checks[0].reason,
            "You have already voted on this poll. Please wait 24 hours between votes."
        );

        assert!(policy.evaluate(&p, &again, at(24 * 60)).allowed());
    }

    #[test]
    fn test_client_string_is_looser() {
        let mut p = poll();
        let policy = FairnessPolicy::default();
        for i in 0..4 {
            let signals = VoteSignals::new(format!("10.0.0.{i}"), format!("tok-{i}"), "shared-ua");
            p.record_vote(0, &signals, at(i)).unwrap();
        }
        let fifth = VoteSignals::new("10.0.1.1", "tok-5", "shared-ua");
        assert!(policy.evaluate(&p, &fifth, at(5)).allowed());
        p.record_vote(0, &fifth, at(5)).unwrap();

        let sixth = VoteSignals::new("10.0.1.2", "tok-6", "shared-ua");
        let verdict = policy.evaluate(&p, &sixth, at(6));
        assert_eq!(verdict.failed_checks.len(), 1);
        assert_eq!(verdict.failed_checks[0].check_name(), "userAgentCheck");
        assert_eq!(verdict.failed_checks[0].reason, "Suspicious voting pattern detected.");
    }

    #[test]
    fn test_verdict_retry_after_takes_longest() {
        let verdict = FairnessVerdict {
            failed_checks: vec![
                FailedCheck {
                    kind: SignalKind::Address,
                    reason: String::new(),
                    retry_after_minutes: 12,
                },
                FailedCheck {
                    kind: SignalKind::Token,
                    reason: String::new(),
                    retry_after_minutes: 1_400,
                },
            ],
        };
        assert_eq!(verdict.retry_after_minutes(), Some(1_400));
        assert_eq!(FairnessVerdict::default().retry_after_minutes(), None);
    }

    #[test]
    fn test_describe_window() {
        assert_eq!(describe_window(Duration::from_secs(3600)), "hour");
        assert_eq!(describe_window(Duration::from_secs(7200)), "2 hours");
        assert_eq!(describe_window(Duration::from_secs(1800)), "30 minutes");
        assert_eq!(describe_window_span(Duration::from_secs(86_400)), "24 hours");
    }
}
