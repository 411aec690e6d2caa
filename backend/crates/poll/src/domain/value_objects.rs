//! Domain Value Objects
//!
//! Immutable value types for the polls domain.

use crate::error::{PollError, PollResult};
use std::fmt;
use std::str::FromStr;

/// Public poll identifier: 8 lowercase hex characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PollId(String);

impl PollId {
    pub const LEN: usize = 8;

    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(platform::crypto::random_hex(Self::LEN / 2))
    }

    /// Parse a user-supplied id (case-insensitive, surrounding whitespace ignored)
    pub fn parse(raw: &str) -> PollResult<Self> {
        let raw = raw.trim();
        if raw.len() != Self::LEN || !raw.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(PollError::InvalidPollId);
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PollId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for PollId {
    type Err = PollError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for PollId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The three identifying signals attached to a vote attempt
///
/// All three are client-controlled or proxy-controlled. They are hints for
/// abuse deterrence, not proof of identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteSignals {
    /// Client network address (`"unknown"` when unavailable)
    pub address: String,
    /// Tracking token from the visitor cookie
    pub token: String,
    /// Declared client software string (User-Agent)
    pub client_string: String,
}

impl VoteSignals {
    pub fn new(
        address: impl Into<String>,
        token: impl Into<String>,
        client_string: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            token: token.into(),
            client_string: client_string.into(),
        }
    }

    pub fn value(&self, kind: SignalKind) -> &str {
        match kind {
            SignalKind::Address => &self.address,
            SignalKind::Token => &self.token,
            SignalKind::ClientString => &self.client_string,
        }
    }
}

/// Kind of identifying signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Address,
    Token,
    ClientString,
}

impl SignalKind {
    pub const ALL: [SignalKind; 3] = [
        SignalKind::Address,
        SignalKind::Token,
        SignalKind::ClientString,
    ];

    /// Name of the fairness check guarding this signal
    pub fn check_name(&self) -> &'static str {
        match self {
            SignalKind::Address => "ipCheck",
            SignalKind::Token => "cookieCheck",
            SignalKind::ClientString => "userAgentCheck",
        }
    }

    /// Display label used in voter details
    pub fn label(&self) -> &'static str {
        match self {
            SignalKind::Address => "IP",
            SignalKind::Token => "Cookie",
            SignalKind::ClientString => "UserAgent",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
