//! Domain Entities
//!
//! A [`Poll`] owns its options and the append-only log of accepted votes.
//! The per-signal audit logs are projections of that log, so appending one
//! [`VoteRecord`] extends all three at once.

use crate::domain::value_objects::{PollId, SignalKind, VoteSignals};
use crate::error::{PollError, PollResult};
use chrono::{DateTime, Utc};
use kernel::id::VoteId;

pub const QUESTION_MIN_CHARS: usize = 3;
pub const QUESTION_MAX_CHARS: usize = 500;
pub const OPTION_MAX_CHARS: usize = 200;
pub const MIN_OPTIONS: usize = 2;
pub const MAX_OPTIONS: usize = 10;

/// One answer of a poll with its running tally
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOption {
    pub text: String,
    pub votes: i64,
}

/// One accepted vote, carrying every signal seen with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRecord {
    pub id: VoteId,
    pub option_index: usize,
    pub signals: VoteSignals,
    pub voted_at: DateTime<Utc>,
}

/// Borrowed view of one audit-log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditEntry<'a> {
    pub value: &'a str,
    pub voted_at: DateTime<Utc>,
    pub option_index: usize,
}

/// Poll aggregate
#[derive(Debug, Clone)]
pub struct Poll {
    pub id: PollId,
    pub question: String,
    pub options: Vec<PollOption>,
    pub total_votes: i64,
    pub created_at: DateTime<Utc>,
    /// Accepted votes in commit order
    pub votes: Vec<VoteRecord>,
}

impl Poll {
    /// A fresh poll with zeroed tallies
    pub fn new(id: PollId, new_poll: &NewPoll, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            question: new_poll.question.clone(),
            options: new_poll
                .options
                .iter()
                .map(|text| PollOption {
                    text: text.clone(),
                    votes: 0,
                })
                .collect(),
            total_votes: 0,
            created_at,
            votes: Vec::new(),
        }
    }

    pub fn has_option(&self, option_index: usize) -> bool {
        option_index < self.options.len()
    }

    /// Entries of the audit log for one signal kind, in commit order
    pub fn audit_log(&self, kind: SignalKind) -> impl Iterator<Item = AuditEntry<'_>> + '_ {
        self.votes.iter().map(move |vote| AuditEntry {
            value: vote.signals.value(kind),
            voted_at: vote.voted_at,
            option_index: vote.option_index,
        })
    }

    /// Count one vote and append it to the log
    ///
    /// Tallies and log change together or not at all.
    pub fn record_vote(
        &mut self,
        option_index: usize,
        signals: &VoteSignals,
        voted_at: DateTime<Utc>,
    ) -> PollResult<VoteId> {
        let option = self
            .options
            .get_mut(option_index)
            .ok_or(PollError::InvalidOption)?;
        option.votes += 1;
        self.total_votes += 1;

        let id = VoteId::new();
        self.votes.push(VoteRecord {
            id,
            option_index,
            signals: signals.clone(),
            voted_at,
        });
        Ok(id)
    }

    /// `total_votes` matches both the option tallies and the vote log
    pub fn is_consistent(&self) -> bool {
        let sum: i64 = self.options.iter().map(|o| o.votes).sum();
        sum == self.total_votes && self.votes.len() as i64 == self.total_votes
    }

    pub fn snapshot(&self) -> TallySnapshot {
        TallySnapshot {
            poll_id: self.id.clone(),
            options: self.options.clone(),
            total_votes: self.total_votes,
        }
    }

    /// Public view without any signal data
    pub fn summary(&self) -> PollSummary {
        PollSummary {
            id: self.id.clone(),
            question: self.question.clone(),
            options: self.options.clone(),
            total_votes: self.total_votes,
            created_at: self.created_at,
        }
    }
}

/// Current tallies of one poll, as pushed to observers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TallySnapshot {
    pub poll_id: PollId,
    pub options: Vec<PollOption>,
    pub total_votes: i64,
}

/// Sanitized poll, safe to return to any caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSummary {
    pub id: PollId,
    pub question: String,
    pub options: Vec<PollOption>,
    pub total_votes: i64,
    pub created_at: DateTime<Utc>,
}

/// Validated input for poll creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPoll {
    pub question: String,
    pub options: Vec<String>,
}

impl NewPoll {
    /// Trim and validate a question with its options
    ///
    /// Blank options are dropped before counting.
    pub fn new(question: &str, options: &[String]) -> PollResult<Self> {
        let question = question.trim();
        let question_len = question.chars().count();
        if !(QUESTION_MIN_CHARS..=QUESTION_MAX_CHARS).contains(&question_len) {
            return Err(PollError::Validation(format!(
                "Question must be between {QUESTION_MIN_CHARS} and {QUESTION_MAX_CHARS} characters"
            )));
        }

        let options: Vec<String> = options
            .iter()
            .map(|o| o.trim())
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect();

        if options.len() < MIN_OPTIONS {
            return Err(PollError::Validation(format!(
                "At least {MIN_OPTIONS} valid options are required"
            )));
        }
        if options.len() > MAX_OPTIONS {
            return Err(PollError::Validation(format!(
                "At most {MAX_OPTIONS} options are allowed"
            )));
        }
        if options.iter().any(|o| o.chars().count() > OPTION_MAX_CHARS) {
            return Err(PollError::Validation(format!(
                "Each option must be at most {OPTION_MAX_CHARS} characters"
            )));
        }

        let mut seen: Vec<String> = Vec::with_capacity(options.len());
        for option in &options {
            let folded = option.to_lowercase();
            if seen.contains(&folded) {
                return Err(PollError::Validation(
                    "Options must be unique".to_string(),
                ));
            }
            seen.push(folded);
        }

        Ok(Self {
            question: question.to_string(),
            options,
        })
    }
}

/// Listing filter; `limit` is already clamped and `page` starts at 1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollFilter {
    pub search: Option<String>,
    pub limit: usize,
    pub page: usize,
}

impl PollFilter {
    pub const DEFAULT_LIMIT: usize = 50;
    pub const MAX_LIMIT: usize = 100;

    pub fn new(search: Option<String>, limit: Option<i64>) -> Self {
        let search = search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let limit = match limit {
            Some(l) => l.clamp(1, Self::MAX_LIMIT as i64) as usize,
            None => Self::DEFAULT_LIMIT,
        };
        Self {
            search,
            limit,
            page: 1,
        }
    }

    pub fn with_page(mut self, page: Option<i64>) -> Self {
        self.page = page.map_or(1, |p| p.max(1) as usize);
        self
    }

    /// Polls skipped before this page
    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Case-insensitive question match
    pub fn matches(&self, question: &str) -> bool {
        match &self.search {
            Some(needle) => question.to_lowercase().contains(&needle.to_lowercase()),
            None => true,
        }
    }
}

impl Default for PollFilter {
    fn default() -> Self {
        Self::new(None, None)
    }
}
