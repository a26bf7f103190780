use crate::channel::{GroupChannel, ReceiveOutcome};
use crate::crypto::GroupToken;
use crate::event::LogRecord;
use crate::key_exchange::{DeliveryOutcome, KeyExchange};
use crate::ledger::Checkpoint;
use crate::relay::{Dispatch, EventRelay};
use crate::types::AccountId;

use super::effect::RuntimeEffect;
use super::ClientEvent;

/// Complete local state of one participant — pure logic, no I/O.
///
/// Each handler runs to completion and returns the effects to execute.
/// Token installation and message appends happen in a single assignment,
/// so no partially updated state is ever observable.
pub struct ClientState {
    pub(crate) local_id: AccountId,
    pub(crate) is_owner: bool,
    pub(crate) key_exchange: KeyExchange,
    pub(crate) channel: GroupChannel,
    pub(crate) relay: EventRelay,
}

impl ClientState {
    /// Build the state for `local_id`, subscribed at `checkpoint`.
    ///
    /// The owner starts with `owner_token`, or a fresh random token if none
    /// is given. Members ignore `owner_token`.
    pub fn new(
        local_id: AccountId,
        is_owner: bool,
        owner_token: Option<GroupToken>,
        checkpoint: Checkpoint,
    ) -> Self {
        let key_exchange = if is_owner {
            KeyExchange::owner(
                local_id.clone(),
                owner_token.unwrap_or_else(GroupToken::generate),
            )
        } else {
            KeyExchange::member(local_id.clone())
        };

        Self {
            relay: EventRelay::new(local_id.clone(), is_owner, checkpoint),
            local_id,
            is_owner,
            key_exchange,
            channel: GroupChannel::new(),
        }
    }

    /// Route one delivered record through the relay and handle it.
    pub fn handle_record(&mut self, record: &LogRecord) -> Vec<RuntimeEffect> {
        let Some(dispatch) = self.relay.route(record) else {
            return vec![];
        };

        match dispatch {
            Dispatch::AnswerRequest(request) => {
                match self.key_exchange.answer_request(&request) {
                    Ok(ciphertext) => {
                        tracing::info!(
                            "{}: answering token request from {}",
                            self.local_id,
                            request.requester
                        );
                        vec![RuntimeEffect::SendToken {
                            to: request.requester,
                            ciphertext,
                        }]
                    }
                    Err(e) => {
                        tracing::warn!("{}: cannot answer token request: {e}", self.local_id);
                        vec![RuntimeEffect::Emit(ClientEvent::Notice {
                            description: format!(
                                "token request from {} not answered: {e}",
                                request.requester
                            ),
                        })]
                    }
                }
            }

            Dispatch::InstallToken(delivery) => match self.key_exchange.accept_delivery(&delivery) {
                DeliveryOutcome::Installed => {
                    self.relay.mark_consumed(delivery.sequence_id);
                    vec![RuntimeEffect::Emit(ClientEvent::TokenInstalled)]
                }
                DeliveryOutcome::Failed(e) => {
                    self.relay.mark_consumed(delivery.sequence_id);
                    vec![RuntimeEffect::Emit(ClientEvent::TokenUnwrapFailed {
                        reason: e.to_string(),
                    })]
                }
                DeliveryOutcome::NoKeypair => {
                    tracing::debug!(
                        "{}: wrapped token received without a pending request",
                        self.local_id
                    );
                    vec![]
                }
                DeliveryOutcome::NotAddressed => vec![],
            },

            Dispatch::Deliver(message) => {
                match self.channel.receive(&message, self.key_exchange.token()) {
                    ReceiveOutcome::Appended(entry) => {
                        vec![RuntimeEffect::Emit(ClientEvent::MessageReceived(entry))]
                    }
                    ReceiveOutcome::Duplicate
                    | ReceiveOutcome::NoToken
                    | ReceiveOutcome::Undecryptable => vec![],
                }
            }
        }
    }
}
