//! Session identifier newtype.
//!
//! A [`SessionId`] names one open client stream. Identifiers are drawn from a
//! monotonic counter owned by the session registry, so within a registry they
//! are unique for the lifetime of the process and never reused after
//! teardown — a stale reference can never resolve to a newer session. The
//! ordering of two ids is the ordering of their creation.
//!
//! Wire form is the string `sess_<n>`, which doubles as the correlation
//! token clients attach to message submissions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prefix of the wire form.
const PREFIX: &str = "sess_";

/// Unique identifier for a session (one open client stream).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct SessionId(u64);

/// Failure to parse a [`SessionId`] from its wire form.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid session id: {0:?}")]
pub struct ParseSessionIdError(String);

impl SessionId {
    /// Wrap a raw counter value.
    #[must_use]
    pub fn from_raw(n: u64) -> Self {
        Self(n)
    }

    /// The raw counter value.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = ParseSessionIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix(PREFIX)
            .ok_or_else(|| ParseSessionIdError(s.to_owned()))?;
        let n = digits
            .parse::<u64>()
            .map_err(|_| ParseSessionIdError(s.to_owned()))?;
        Ok(Self(n))
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for SessionId {
    type Error = ParseSessionIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_has_prefix() {
        let id = SessionId::from_raw(7);
        assert_eq!(id.to_string(), "sess_7");
    }

    #[test]
    fn parse_roundtrip() {
        let id = SessionId::from_raw(42);
        let back: SessionId = id.to_string().parse().unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn parse_rejects_missing_prefix() {
        assert!("42".parse::<SessionId>().is_err());
    }

    #[test]
    fn parse_rejects_garbage_digits() {
        assert!("sess_abc".parse::<SessionId>().is_err());
        assert!("sess_".parse::<SessionId>().is_err());
    }

    #[test]
    fn ordering_follows_creation_order() {
        let a = SessionId::from_raw(1);
        let b = SessionId::from_raw(2);
        assert!(a < b);
    }

    #[test]
    fn serde_uses_wire_form() {
        let id = SessionId::from_raw(3);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"sess_3\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn serde_rejects_bad_wire_form() {
        let result: Result<SessionId, _> = serde_json::from_str("\"nope\"");
        assert!(result.is_err());
    }

    #[test]
    fn hash_and_eq() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        let _ = set.insert(SessionId::from_raw(9));
        let _ = set.insert(SessionId::from_raw(9));
        assert_eq!(set.len(), 1);
    }
}
