use crate::channel::{ChannelMessage, GroupChannel};
use crate::crypto::GroupToken;
use crate::key_exchange::TokenStatus;
use crate::ledger::Ledger;
use crate::relay::RelayStats;
use crate::types::{AccountId, SequenceId};
use crate::GroupError;

use super::effect::RuntimeEffect;
use super::state::ClientState;
use super::ClientEvent;

/// One participant (owner or member) bound to a ledger.
///
/// Operations suspend on the ledger for as long as it takes; nothing here
/// times out or retries.
pub struct GroupClient<L> {
    ledger: L,
    state: ClientState,
}

impl<L: Ledger> GroupClient<L> {
    /// Join the group as `local_id` and subscribe from the log head.
    ///
    /// `owner_token` is only used when `local_id` turns out to be the owner.
    pub async fn connect(
        ledger: L,
        local_id: AccountId,
        owner_token: Option<GroupToken>,
    ) -> Result<Self, GroupError> {
        let owner = ledger.owner().await?;
        let is_owner = owner == local_id;
        let checkpoint = ledger.latest_checkpoint().await?;

        tracing::info!(
            "{local_id}: connected as {}",
            if is_owner { "owner" } else { "participant" }
        );

        Ok(Self {
            ledger,
            state: ClientState::new(local_id, is_owner, owner_token, checkpoint),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn local_id(&self) -> &AccountId {
        &self.state.local_id
    }

    pub fn is_owner(&self) -> bool {
        self.state.is_owner
    }

    pub fn token_status(&self) -> TokenStatus {
        self.state.key_exchange.status()
    }

    /// Decrypted messages in delivery order, one per sequence id.
    pub fn messages(&self) -> &[ChannelMessage] {
        self.state.channel.messages()
    }

    pub fn relay_stats(&self) -> RelayStats {
        self.state.relay.stats()
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub async fn is_member(&self, id: &AccountId) -> Result<bool, GroupError> {
        self.ledger.is_member(id).await
    }

    pub async fn members(&self) -> Result<Vec<AccountId>, GroupError> {
        self.ledger.members().await
    }

    // ── Contract calls ───────────────────────────────────────────────────

    /// Owner only; the contract refuses anyone else.
    pub async fn add_member(&self, id: AccountId) -> Result<(), GroupError> {
        self.ledger.add_member(&self.state.local_id, id).await
    }

    /// Ask the owner for the group token.
    pub async fn request_token(&mut self) -> Result<SequenceId, GroupError> {
        let public_key = self.state.key_exchange.request_key();
        let sequence_id = self
            .ledger
            .request_token(&self.state.local_id, public_key.encode())
            .await?;
        self.state.key_exchange.on_request_sent();
        Ok(sequence_id)
    }

    /// Encrypt and broadcast `text`. Refused locally without a token.
    pub async fn send_message(&self, text: &str) -> Result<SequenceId, GroupError> {
        let ciphertext = GroupChannel::seal(text, self.state.key_exchange.token())?;
        self.ledger
            .communicate(&self.state.local_id, ciphertext)
            .await
    }

    // ── Event processing ─────────────────────────────────────────────────

    /// Poll the log once and handle everything new.
    ///
    /// A failed handler never stops the batch. The checkpoint advances only
    /// when the poll itself succeeded.
    pub async fn sync(&mut self) -> Result<Vec<ClientEvent>, GroupError> {
        let batch = self.ledger.poll(self.state.relay.checkpoint()).await?;

        let mut events = Vec::new();
        for record in &batch.records {
            for effect in self.state.handle_record(record) {
                events.push(self.execute(effect).await);
            }
        }
        self.state.relay.advance(batch.checkpoint);

        Ok(events)
    }

    async fn execute(&self, effect: RuntimeEffect) -> ClientEvent {
        match effect {
            RuntimeEffect::SendToken { to, ciphertext } => {
                match self
                    .ledger
                    .send_token(&self.state.local_id, ciphertext, to.clone())
                    .await
                {
                    Ok(sequence_id) => ClientEvent::TokenRequestAnswered {
                        requester: to,
                        sequence_id,
                    },
                    Err(e) => {
                        tracing::warn!("{}: sendToken to {to} failed: {e}", self.state.local_id);
                        ClientEvent::Notice {
                            description: format!("could not send token to {to}: {e}"),
                        }
                    }
                }
            }
            RuntimeEffect::Emit(event) => event,
        }
    }
}
