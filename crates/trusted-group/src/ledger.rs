/// The external log the protocol runs on.
///
/// In production this is a contract on a ledger with per-account ordering.
/// `InMemoryLedger` plays the same role in-process: it owns the
/// `MembershipRegistry`, enforces the permission table before appending,
/// and exposes a poll-based delivery stream with fault injection.
use std::sync::{Arc, Mutex, MutexGuard};

use crate::event::{LedgerEvent, LogRecord};
use crate::registry::MembershipRegistry;
use crate::types::{AccountId, Operation, SequenceId};
use crate::GroupError;

/// Cursor into the delivery stream.
///
/// Counts deliveries, not sequence ids: a redelivered record advances the
/// cursor while keeping its original `SequenceId`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Checkpoint(pub usize);

/// Records delivered since a checkpoint.
#[derive(Debug, Clone, Default)]
pub struct PollBatch {
    pub records: Vec<LogRecord>,
    pub checkpoint: Checkpoint,
}

/// Contract calls and log subscription.
///
/// Mutating calls take the caller's account and fail with
/// `PermissionDenied` without emitting anything when the caller is not
/// allowed. Any call may fail with `Transport`.
#[async_trait::async_trait]
pub trait Ledger: Send + Sync {
    async fn owner(&self) -> Result<AccountId, GroupError>;

    async fn members(&self) -> Result<Vec<AccountId>, GroupError>;

    async fn is_member(&self, id: &AccountId) -> Result<bool, GroupError>;

    async fn add_member(&self, caller: &AccountId, id: AccountId) -> Result<(), GroupError>;

    async fn request_token(
        &self,
        caller: &AccountId,
        public_key: String,
    ) -> Result<SequenceId, GroupError>;

    async fn send_token(
        &self,
        caller: &AccountId,
        ciphertext: Vec<u8>,
        to: AccountId,
    ) -> Result<SequenceId, GroupError>;

    async fn communicate(
        &self,
        caller: &AccountId,
        ciphertext: Vec<u8>,
    ) -> Result<SequenceId, GroupError>;

    /// Cursor at the head of the stream ("from latest").
    async fn latest_checkpoint(&self) -> Result<Checkpoint, GroupError>;

    /// Everything delivered after `after`.
    async fn poll(&self, after: Checkpoint) -> Result<PollBatch, GroupError>;
}

// ── InMemoryLedger ──────────────────────────────────────────────────────

struct LedgerState {
    registry: MembershipRegistry,
    deliveries: Vec<LogRecord>,
    next_sequence: u64,
    reachable: bool,
}

impl LedgerState {
    fn emit(&mut self, event: LedgerEvent) -> Result<SequenceId, GroupError> {
        let sequence_id = SequenceId(self.next_sequence);
        let record = LogRecord::encode(sequence_id, &event)?;
        self.next_sequence += 1;
        self.deliveries.push(record);
        tracing::debug!("ledger: appended {sequence_id}");
        Ok(sequence_id)
    }
}

/// Shared in-process log. Clones observe the same state.
#[derive(Clone)]
pub struct InMemoryLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedger {
    /// Deploy a new group owned by `owner`.
    pub fn new(owner: AccountId) -> Self {
        Self {
            state: Arc::new(Mutex::new(LedgerState {
                registry: MembershipRegistry::new(owner),
                deliveries: Vec::new(),
                next_sequence: 1,
                reachable: true,
            })),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, GroupError> {
        self.state
            .lock()
            .map_err(|_| GroupError::Transport("ledger state poisoned".into()))
    }

    /// Lock and fail with `Transport` if the ledger is marked unreachable.
    fn connect(&self) -> Result<MutexGuard<'_, LedgerState>, GroupError> {
        let state = self.lock()?;
        if !state.reachable {
            return Err(GroupError::Transport("ledger unreachable".into()));
        }
        Ok(state)
    }

    /// Simulate the network going away (or coming back).
    pub fn set_reachable(&self, reachable: bool) {
        if let Ok(mut state) = self.lock() {
            state.reachable = reachable;
        }
    }

    /// Deliver an existing record again, as a log reorganization would.
    ///
    /// Returns `false` if no record has that sequence id.
    pub fn redeliver(&self, sequence_id: SequenceId) -> bool {
        let Ok(mut state) = self.lock() else {
            return false;
        };
        let Some(record) = state
            .deliveries
            .iter()
            .find(|r| r.sequence_id == sequence_id)
            .cloned()
        else {
            return false;
        };
        state.deliveries.push(record);
        true
    }

    /// Append an arbitrary payload, bypassing the contract.
    pub fn inject_raw(&self, payload: Vec<u8>) -> Result<SequenceId, GroupError> {
        let mut state = self.lock()?;
        let sequence_id = SequenceId(state.next_sequence);
        state.next_sequence += 1;
        state.deliveries.push(LogRecord {
            sequence_id,
            payload,
        });
        Ok(sequence_id)
    }

    /// Number of deliveries so far, including redeliveries.
    pub fn delivery_count(&self) -> usize {
        self.lock().map(|s| s.deliveries.len()).unwrap_or(0)
    }
}

#[async_trait::async_trait]
impl Ledger for InMemoryLedger {
    async fn owner(&self) -> Result<AccountId, GroupError> {
        Ok(self.connect()?.registry.owner().clone())
    }

    async fn members(&self) -> Result<Vec<AccountId>, GroupError> {
        Ok(self.connect()?.registry.members())
    }

    async fn is_member(&self, id: &AccountId) -> Result<bool, GroupError> {
        Ok(self.connect()?.registry.is_member(id))
    }

    async fn add_member(&self, caller: &AccountId, id: AccountId) -> Result<(), GroupError> {
        let mut state = self.connect()?;
        if state.registry.add_member(caller, id.clone())? {
            tracing::info!("ledger: {id} added to group");
        }
        Ok(())
    }

    async fn request_token(
        &self,
        caller: &AccountId,
        public_key: String,
    ) -> Result<SequenceId, GroupError> {
        let mut state = self.connect()?;
        state.registry.require(caller, Operation::RequestToken)?;
        state.emit(LedgerEvent::TokenRequested {
            from: caller.clone(),
            public_key,
        })
    }

    async fn send_token(
        &self,
        caller: &AccountId,
        ciphertext: Vec<u8>,
        to: AccountId,
    ) -> Result<SequenceId, GroupError> {
        let mut state = self.connect()?;
        state.registry.require(caller, Operation::SendToken)?;
        state.emit(LedgerEvent::TokenSent { to, ciphertext })
    }

    async fn communicate(
        &self,
        caller: &AccountId,
        ciphertext: Vec<u8>,
    ) -> Result<SequenceId, GroupError> {
        let mut state = self.connect()?;
        state.registry.require(caller, Operation::Communicate)?;
        state.emit(LedgerEvent::Communicated {
            from: caller.clone(),
            ciphertext,
        })
    }

    async fn latest_checkpoint(&self) -> Result<Checkpoint, GroupError> {
        Ok(Checkpoint(self.connect()?.deliveries.len()))
    }

    async fn poll(&self, after: Checkpoint) -> Result<PollBatch, GroupError> {
        let state = self.connect()?;
        let start = after.0.min(state.deliveries.len());
        Ok(PollBatch {
            records: state.deliveries[start..].to_vec(),
            checkpoint: Checkpoint(state.deliveries.len()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RelayEvent;

    fn account(name: &str) -> AccountId {
        AccountId::new(name).unwrap()
    }

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new(account("owner"))
    }

    #[tokio::test]
    async fn owner_and_membership() {
        let ledger = ledger();
        assert_eq!(ledger.owner().await.unwrap(), account("owner"));
        assert!(ledger.is_member(&account("owner")).await.unwrap());
        assert!(!ledger.is_member(&account("bob")).await.unwrap());

        ledger
            .add_member(&account("owner"), account("bob"))
            .await
            .unwrap();
        assert!(ledger.is_member(&account("bob")).await.unwrap());
        assert_eq!(ledger.members().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn denied_calls_emit_nothing() {
        let ledger = ledger();
        let stranger = account("mallory");

        assert!(ledger
            .request_token(&stranger, "00".repeat(32))
            .await
            .is_err());
        assert!(ledger.communicate(&stranger, vec![1]).await.is_err());
        assert!(ledger
            .send_token(&stranger, vec![1], account("owner"))
            .await
            .is_err());
        assert_eq!(ledger.delivery_count(), 0);
    }

    #[tokio::test]
    async fn sequence_ids_are_monotonic() {
        let ledger = ledger();
        let owner = account("owner");
        let a = ledger.communicate(&owner, vec![1]).await.unwrap();
        let b = ledger.communicate(&owner, vec![2]).await.unwrap();
        assert!(a < b);
    }

    #[tokio::test]
    async fn poll_from_latest_skips_history() {
        let ledger = ledger();
        let owner = account("owner");
        ledger.communicate(&owner, vec![1]).await.unwrap();

        let from = ledger.latest_checkpoint().await.unwrap();
        ledger.communicate(&owner, vec![2]).await.unwrap();

        let batch = ledger.poll(from).await.unwrap();
        assert_eq!(batch.records.len(), 1);
        let RelayEvent::Message(msg) = batch.records[0].decode().unwrap().event else {
            panic!("expected Message");
        };
        assert_eq!(msg.ciphertext, vec![2]);
        assert_eq!(batch.checkpoint, Checkpoint(2));

        let again = ledger.poll(batch.checkpoint).await.unwrap();
        assert!(again.records.is_empty());
    }

    #[tokio::test]
    async fn redelivery_keeps_sequence_id() {
        let ledger = ledger();
        let owner = account("owner");
        let seq = ledger.communicate(&owner, vec![1]).await.unwrap();

        assert!(ledger.redeliver(seq));
        assert!(!ledger.redeliver(SequenceId(999)));

        let batch = ledger.poll(Checkpoint::default()).await.unwrap();
        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.records[0].sequence_id, batch.records[1].sequence_id);
    }

    #[tokio::test]
    async fn unreachable_ledger_fails_with_transport() {
        let ledger = ledger();
        ledger.set_reachable(false);
        assert!(matches!(
            ledger.owner().await,
            Err(GroupError::Transport(_))
        ));
        assert!(matches!(
            ledger.poll(Checkpoint::default()).await,
            Err(GroupError::Transport(_))
        ));

        ledger.set_reachable(true);
        assert!(ledger.owner().await.is_ok());
    }
}
