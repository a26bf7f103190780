/// Events carried by the log.
///
/// `LedgerEvent` is the wire form emitted by the contract and stored
/// MessagePack-encoded in a `LogRecord`. The relay only ever sees
/// `RelayEvent`, the validated form: every field present, keys parsed.
use serde::{Deserialize, Serialize};

use crate::crypto::PublicKey;
use crate::types::{AccountId, SequenceId};
use crate::GroupError;

/// Event as emitted by the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LedgerEvent {
    /// A member asks the owner for the group token.
    TokenRequested { from: AccountId, public_key: String },
    /// The owner delivers a wrapped token to one member.
    TokenSent { to: AccountId, ciphertext: Vec<u8> },
    /// A member broadcasts an encrypted message.
    Communicated { from: AccountId, ciphertext: Vec<u8> },
}

/// Raw record as delivered by the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub sequence_id: SequenceId,
    pub payload: Vec<u8>,
}

impl LogRecord {
    pub fn encode(sequence_id: SequenceId, event: &LedgerEvent) -> Result<Self, GroupError> {
        Ok(Self {
            sequence_id,
            payload: rmp_serde::to_vec(event)?,
        })
    }

    /// Decode and validate. Malformed payloads are rejected here, never
    /// downstream.
    pub fn decode(&self) -> Result<LogEntry, GroupError> {
        let raw: LedgerEvent = rmp_serde::from_slice(&self.payload)?;
        let event = RelayEvent::validate(raw, self.sequence_id)?;
        Ok(LogEntry {
            sequence_id: self.sequence_id,
            event,
        })
    }
}

// ── Validated events ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct TokenRequest {
    pub requester: AccountId,
    pub public_key: PublicKey,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WrappedToken {
    pub recipient: AccountId,
    pub ciphertext: Vec<u8>,
    pub sequence_id: SequenceId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub sender: AccountId,
    pub ciphertext: Vec<u8>,
    pub sequence_id: SequenceId,
}

/// Closed set of events the relay dispatches.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    TokenRequest(TokenRequest),
    WrappedToken(WrappedToken),
    Message(Message),
}

impl RelayEvent {
    fn validate(raw: LedgerEvent, sequence_id: SequenceId) -> Result<Self, GroupError> {
        match raw {
            LedgerEvent::TokenRequested { from, public_key } => {
                let requester = require_account(from)?;
                let public_key = PublicKey::decode(&public_key).map_err(|e| {
                    GroupError::InvalidEvent {
                        reason: format!("token request from {requester}: {e}"),
                    }
                })?;
                Ok(RelayEvent::TokenRequest(TokenRequest {
                    requester,
                    public_key,
                }))
            }
            LedgerEvent::TokenSent { to, ciphertext } => {
                let recipient = require_account(to)?;
                require_ciphertext(&ciphertext, "wrapped token")?;
                Ok(RelayEvent::WrappedToken(WrappedToken {
                    recipient,
                    ciphertext,
                    sequence_id,
                }))
            }
            LedgerEvent::Communicated { from, ciphertext } => {
                let sender = require_account(from)?;
                require_ciphertext(&ciphertext, "message")?;
                Ok(RelayEvent::Message(Message {
                    sender,
                    ciphertext,
                    sequence_id,
                }))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RelayEvent::TokenRequest(_) => "TokenRequest",
            RelayEvent::WrappedToken(_) => "WrappedToken",
            RelayEvent::Message(_) => "Message",
        }
    }
}

/// A validated record.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub sequence_id: SequenceId,
    pub event: RelayEvent,
}

// Serde bypasses `AccountId::new`, so re-check here.
fn require_account(id: AccountId) -> Result<AccountId, GroupError> {
    AccountId::new(id.as_str())
}

fn require_ciphertext(ciphertext: &[u8], what: &str) -> Result<(), GroupError> {
    if ciphertext.is_empty() {
        return Err(GroupError::InvalidEvent {
            reason: format!("empty {what} ciphertext"),
        });
    }
    Ok(())
}
