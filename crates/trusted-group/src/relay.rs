/// EventRelay — single ingress for log records.
///
/// Decodes each record at the boundary, filters by role and recipient,
/// and drops redelivered token events by `SequenceId`. A token request is
/// seen once routed; a wrapped token only once the key exchange has
/// consumed it (`mark_consumed`). Messages pass through to the channel,
/// which owns their deduplication: a message that could not be decrypted
/// yet stays eligible if redelivered later.
use std::collections::HashSet;

use crate::event::{LogRecord, Message, RelayEvent, TokenRequest, WrappedToken};
use crate::ledger::Checkpoint;
use crate::types::{AccountId, SequenceId};

/// Where a record goes after filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Owner only: wrap the token for the requester.
    AnswerRequest(TokenRequest),
    /// Addressed to us: unwrap and cache.
    InstallToken(WrappedToken),
    /// Every subscriber: try to decrypt.
    Deliver(Message),
}

/// Relay counters since subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub dispatched: u64,
    pub duplicates: u64,
    pub filtered: u64,
    pub malformed: u64,
}

/// Per-participant relay state.
pub struct EventRelay {
    local_id: AccountId,
    is_owner: bool,
    checkpoint: Checkpoint,
    seen_token_events: HashSet<SequenceId>,
    stats: RelayStats,
}

impl EventRelay {
    /// Subscribe at `checkpoint` (normally the log head: no backfill).
    pub fn new(local_id: AccountId, is_owner: bool, checkpoint: Checkpoint) -> Self {
        Self {
            local_id,
            is_owner,
            checkpoint,
            seen_token_events: HashSet::new(),
            stats: RelayStats::default(),
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    /// Move the cursor after a successful poll. Never goes backwards.
    pub fn advance(&mut self, checkpoint: Checkpoint) {
        self.checkpoint = self.checkpoint.max(checkpoint);
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    /// Decode, filter and deduplicate one record.
    pub fn route(&mut self, record: &LogRecord) -> Option<Dispatch> {
        let entry = match record.decode() {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!("relay: rejecting record {}: {e}", record.sequence_id);
                self.stats.malformed += 1;
                return None;
            }
        };

        let kind = entry.event.kind();
        let dispatch = match entry.event {
            RelayEvent::TokenRequest(request) => {
                if !self.is_owner {
                    return self.filtered(entry.sequence_id, kind);
                }
                if !self.first_sighting(entry.sequence_id) {
                    return None;
                }
                Dispatch::AnswerRequest(request)
            }
            RelayEvent::WrappedToken(delivery) => {
                if delivery.recipient != self.local_id {
                    return self.filtered(entry.sequence_id, kind);
                }
                if self.seen_token_events.contains(&entry.sequence_id) {
                    return self.duplicate(entry.sequence_id);
                }
                Dispatch::InstallToken(delivery)
            }
            RelayEvent::Message(message) => Dispatch::Deliver(message),
        };

        self.stats.dispatched += 1;
        Some(dispatch)
    }

    fn filtered(&mut self, sequence_id: SequenceId, kind: &str) -> Option<Dispatch> {
        tracing::trace!("relay: {kind} {sequence_id} not for {}", self.local_id);
        self.stats.filtered += 1;
        None
    }

    /// The key exchange acted on this wrapped token; drop redeliveries.
    pub fn mark_consumed(&mut self, sequence_id: SequenceId) {
        self.seen_token_events.insert(sequence_id);
    }

    fn first_sighting(&mut self, sequence_id: SequenceId) -> bool {
        if self.seen_token_events.insert(sequence_id) {
            return true;
        }
        self.duplicate(sequence_id);
        false
    }

    fn duplicate(&mut self, sequence_id: SequenceId) -> Option<Dispatch> {
        tracing::debug!("relay: duplicate delivery of {sequence_id}");
        self.stats.duplicates += 1;
        None
    }
}
