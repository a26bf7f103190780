use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::GroupError;

// ── AccountId ────────────────────────────────────────────────────────────

/// Account identifier on the underlying log (e.g. `"0x5fd2…"`).
///
/// Opaque to the protocol: compared byte-for-byte, never parsed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    /// Build an account id, trimming whitespace. Rejects empty input.
    pub fn new(raw: impl AsRef<str>) -> Result<Self, GroupError> {
        let trimmed = raw.as_ref().trim();
        if trimmed.is_empty() {
            return Err(GroupError::InvalidEvent {
                reason: "empty account id".into(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountId {
    type Err = GroupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── SequenceId ───────────────────────────────────────────────────────────

/// Log-assigned identifier of an appended record.
///
/// Unique across the whole log. Used for deduplication only; it says
/// nothing about ordering between different senders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceId(pub u64);

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Operation ────────────────────────────────────────────────────────────

/// Gated operations of the group contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    AddMember,
    RequestToken,
    SendToken,
    Communicate,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::AddMember => "addMember",
            Operation::RequestToken => "requestToken",
            Operation::SendToken => "sendToken",
            Operation::Communicate => "communicate",
        };
        f.write_str(name)
    }
}
