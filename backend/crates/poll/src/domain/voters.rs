//! Voter-detail aggregation
//!
//! Folds the three audit logs into one list of distinct voters for display.
//! Signal values are redacted before they leave this module. The result is
//! informational only and never feeds back into tallies.

use crate::domain::entities::{AuditEntry, Poll};
use crate::domain::value_objects::SignalKind;
use chrono::{DateTime, Utc};
use std::net::IpAddr;
use std::time::Duration;

const TOKEN_PREFIX_CHARS: usize = 8;
const CLIENT_STRING_PREFIX_CHARS: usize = 24;
const ELLIPSIS: char = '…';

/// One distinct voter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterEntry {
    pub voter_id: String,
    /// Signal that first introduced this voter
    pub primary: SignalKind,
    pub choice: usize,
    pub voted_at: DateTime<Utc>,
    pub address: Option<String>,
    pub token: Option<String>,
    pub client_string: Option<String>,
}

impl VoterEntry {
    fn slot(&self, kind: SignalKind) -> &Option<String> {
        match kind {
            SignalKind::Address => &self.address,
            SignalKind::Token => &self.token,
            SignalKind::ClientString => &self.client_string,
        }
    }

    fn slot_mut(&mut self, kind: SignalKind) -> &mut Option<String> {
        match kind {
            SignalKind::Address => &mut self.address,
            SignalKind::Token => &mut self.token,
            SignalKind::ClientString => &mut self.client_string,
        }
    }
}

/// Voters that picked one option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionVoters {
    pub option_index: usize,
    pub text: String,
    pub voter_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoterDetails {
    pub total_voters: usize,
    /// One bucket per option, in option order
    pub voters_by_option: Vec<OptionVoters>,
    /// Newest first
    pub voters: Vec<VoterEntry>,
}

/// Merge the audit logs of `poll` into distinct voters
///
/// Token entries are processed first, then address, then client-string
/// entries. An entry joins the earliest voter that has no entry of its kind
/// yet, chose the same option and voted within `dedup_window`; otherwise it
/// starts a new voter.
pub fn aggregate(poll: &Poll, dedup_window: Duration) -> VoterDetails {
    let window_ms = dedup_window.as_millis() as i64;
    let mut voters: Vec<VoterEntry> = Vec::new();

    for kind in [SignalKind::Token, SignalKind::Address, SignalKind::ClientString] {
        let mut entries: Vec<AuditEntry<'_>> = poll.audit_log(kind).collect();
        entries.sort_by_key(|e| e.voted_at);
        let mut seeded = 0usize;

        for entry in entries {
            let redacted = redact(kind, entry.value);
            let matched = voters.iter_mut().find(|v| {
                v.slot(kind).is_none()
                    && v.choice == entry.option_index
                    && (v.voted_at - entry.voted_at).num_milliseconds().abs() <= window_ms
            });

            match matched {
                Some(voter) => *voter.slot_mut(kind) = Some(redacted),
                None => {
                    seeded += 1;
                    let mut voter = VoterEntry {
                        voter_id: voter_id(kind, entry.value, seeded),
                        primary: kind,
                        choice: entry.option_index,
                        voted_at: entry.voted_at,
                        address: None,
                        token: None,
                        client_string: None,
                    };
                    *voter.slot_mut(kind) = Some(redacted);
                    // Keep seeds ordered by time so later kinds fold into the earliest match
                    let at = voters.partition_point(|v| v.voted_at <= voter.voted_at);
                    voters.insert(at, voter);
                }
            }
        }
    }

    let voters_by_option = poll
        .options
        .iter()
        .enumerate()
        .map(|(option_index, option)| OptionVoters {
            option_index,
            text: option.text.clone(),
            voter_ids: voters
                .iter()
                .filter(|v| v.choice == option_index)
                .map(|v| v.voter_id.clone())
                .collect(),
        })
        .collect();

    voters.sort_by(|a, b| b.voted_at.cmp(&a.voted_at));

    VoterDetails {
        total_voters: voters.len(),
        voters_by_option,
        voters,
    }
}

fn voter_id(kind: SignalKind, value: &str, ordinal: usize) -> String {
    match kind {
        SignalKind::Token => format!("cookie_{}", value.chars().take(TOKEN_PREFIX_CHARS).collect::<String>()),
        SignalKind::Address => format!("ip_{ordinal}"),
        SignalKind::ClientString => format!("ua_{ordinal}"),
    }
}

/// Redact one signal value for display
pub fn redact(kind: SignalKind, value: &str) -> String {
    match kind {
        SignalKind::Address => mask_address(value),
        SignalKind::Token => truncate(value, TOKEN_PREFIX_CHARS),
        SignalKind::ClientString => truncate(value, CLIENT_STRING_PREFIX_CHARS),
    }
}

/// Keep the first two components of an address
pub fn mask_address(value: &str) -> String {
    match value.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            let [a, b, _, _] = v4.octets();
            format!("{a}.{b}.x.x")
        }
        Ok(IpAddr::V6(v6)) => {
            let segments = v6.segments();
            format!("{:x}:{:x}:{ELLIPSIS}", segments[0], segments[1])
        }
        Err(_) => value.to_string(),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}{ELLIPSIS}")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::NewPoll;
    use crate::domain::value_objects::{PollId, VoteSignals};
    use chrono::TimeZone;

    const WINDOW: Duration = Duration::from_secs(2);

    fn poll(options: &[&str]) -> Poll {
        let options: Vec<String> = options.iter().map(|s| s.to_string()).collect();
        let new_poll = NewPoll::new("Which one?", &options).unwrap();
        Poll::new(PollId::generate(), &new_poll, Utc.timestamp_opt(0, 0).unwrap())
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_one_voter_per_vote() {
        let mut p = poll(&["A", "B", "C"]);
        let votes = [(0, 0), (0, 1), (1, 1), (2, 5), (0, 5), (1, 30)];
        for (i, (choice, secs)) in votes.into_iter().enumerate() {
            let signals = VoteSignals::new(
                "10.0.0.1",
                format!("{i:08}-token-value"),
                "Mozilla/5.0 (X11; Linux x86_64) Firefox/120.0",
            );
            p.record_vote(choice, &signals, at(secs)).unwrap();
        }

        let details = aggregate(&p, WINDOW);
        assert_eq!(details.total_voters as i64, p.total_votes);
        for bucket in &details.voters_by_option {
            assert_eq!(
                bucket.voter_ids.len() as i64,
                p.options[bucket.option_index].votes
            );
        }
        assert!(details.voters.iter().all(|v| v.primary == SignalKind::Token));
        assert!(details
            .voters
            .iter()
            .all(|v| v.address.is_some() && v.client_string.is_some()));
    }

    #[test]
    fn test_sorted_newest_first() {
        let mut p = poll(&["A", "B"]);
        for (i, secs) in [10, 0, 20].into_iter().enumerate() {
            let signals = VoteSignals::new(format!("10.0.0.{i}"), format!("token-{i}"), "ua");
            p.record_vote(i % 2, &signals, at(secs)).unwrap();
        }

        let details = aggregate(&p, WINDOW);
        let times: Vec<_> = details.voters.iter().map(|v| v.voted_at).collect();
        assert_eq!(times, vec![at(20), at(10), at(0)]);
    }

    #[test]
    fn test_buckets_exist_for_every_option() {
        let p = poll(&["A", "B", "C", "D"]);
        let details = aggregate(&p, WINDOW);
        assert_eq!(details.total_voters, 0);
        assert_eq!(details.voters_by_option.len(), 4);
        assert!(details.voters_by_option.iter().all(|b| b.voter_ids.is_empty()));
    }

    #[test]
    fn test_voter_ids_and_redaction() {
        let mut p = poll(&["A", "B"]);
        let signals = VoteSignals::new(
            "203.0.113.77",
            "0123456789abcdef",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
        );
        p.record_vote(1, &signals, at(0)).unwrap();

        let details = aggregate(&p, WINDOW);
        let voter = &details.voters[0];
        assert_eq!(voter.voter_id, "cookie_01234567");
        assert_eq!(voter.token.as_deref(), Some("01234567…"));
        assert_eq!(voter.address.as_deref(), Some("203.0.x.x"));
        assert_eq!(
            voter.client_string.as_deref(),
            Some("Mozilla/5.0 (Windows NT …")
        );
        assert_eq!(details.voters_by_option[1].voter_ids, vec!["cookie_01234567"]);
    }

    #[test]
    fn test_mask_address() {
        assert_eq!(mask_address("192.168.1.20"), "192.168.x.x");
        assert_eq!(mask_address("2001:db8::1"), "2001:db8:…");
        assert_eq!(mask_address("unknown"), "unknown");
    }

    #[test]
    fn test_truncate_short_values_untouched() {
        assert_eq!(redact(SignalKind::Token, "short"), "short");
        assert_eq!(redact(SignalKind::ClientString, "curl/8.0"), "curl/8.0");
    }
}
