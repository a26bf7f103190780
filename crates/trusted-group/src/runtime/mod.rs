/// Client runtime — drives one participant against the ledger.
///
/// `ClientState` is the pure core; `GroupClient` adds the async contract
/// calls; `GroupRuntime` runs a client as a single task with a channel-based
/// API so the application never touches records or key material.
mod client;
mod effect;
mod r#loop;
mod state;

pub use client::GroupClient;
pub use effect::RuntimeEffect;
pub use state::ClientState;

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use crate::channel::ChannelMessage;
use crate::key_exchange::TokenStatus;
use crate::ledger::Ledger;
use crate::types::{AccountId, SequenceId};

// ── Configuration ─────────────────────────────────────────────────────

/// Environment variable overriding the default poll interval (ms).
pub const POLL_INTERVAL_ENV: &str = "TRUSTED_GROUP_POLL_MS";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Configuration for the client runtime.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How often the log is polled for new records.
    pub poll_interval: Duration,
    /// Capacity of the command channel (app → runtime).
    pub command_buffer: usize,
    /// Capacity of the event channel (runtime → app).
    pub event_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeConfig {
    /// Defaults, with `TRUSTED_GROUP_POLL_MS` applied if set and valid.
    pub fn new() -> Self {
        let poll_interval = std::env::var(POLL_INTERVAL_ENV)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        Self {
            poll_interval,
            command_buffer: 64,
            event_buffer: 256,
        }
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn command_buffer(mut self, capacity: usize) -> Self {
        self.command_buffer = capacity.max(1);
        self
    }

    pub fn event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(1);
        self
    }
}

// ── Commands (app → runtime) ──────────────────────────────────────────

/// Commands the application sends to the runtime task.
pub enum RuntimeCommand {
    /// Owner only.
    AddMember { id: AccountId },
    /// Ask the owner for the group token.
    RequestToken,
    /// Encrypt and broadcast a text message.
    SendMessage { text: String },
    /// Query: local message list.
    GetMessages {
        reply: oneshot::Sender<Vec<ChannelMessage>>,
    },
    /// Query: where we stand with the token.
    GetTokenStatus { reply: oneshot::Sender<TokenStatus> },
    /// Graceful shutdown.
    Shutdown,
}

// ── Events (runtime → app) ───────────────────────────────────────────

/// Events the application may want to observe.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Owner: a wrapped token was sent in answer to a request.
    TokenRequestAnswered {
        requester: AccountId,
        sequence_id: SequenceId,
    },
    /// Our token request was accepted by the contract.
    TokenRequested { sequence_id: SequenceId },
    /// The group token was unwrapped and cached.
    TokenInstalled,
    /// A wrapped token addressed to us could not be unwrapped.
    TokenUnwrapFailed { reason: String },
    /// The owner added a member.
    MemberAdded { id: AccountId },
    /// Our broadcast was accepted by the contract.
    MessageSent { sequence_id: SequenceId },
    /// A new message was decrypted and appended.
    MessageReceived(ChannelMessage),
    /// Non-fatal notice for the user (denied call, missing token, network).
    Notice { description: String },
}

// ── Handle ───────────────────────────────────────────────────────────

/// Cheap, cloneable handle to a running client.
#[derive(Clone)]
pub struct RuntimeHandle {
    cmd_tx: mpsc::Sender<RuntimeCommand>,
}

impl RuntimeHandle {
    pub async fn add_member(&self, id: AccountId) {
        let _ = self.cmd_tx.send(RuntimeCommand::AddMember { id }).await;
    }

    pub async fn request_token(&self) {
        let _ = self.cmd_tx.send(RuntimeCommand::RequestToken).await;
    }

    pub async fn send_message(&self, text: impl Into<String>) {
        let _ = self
            .cmd_tx
            .send(RuntimeCommand::SendMessage { text: text.into() })
            .await;
    }

    /// Current message list, or empty if the runtime is gone.
    pub async fn messages(&self) -> Vec<ChannelMessage> {
        let (reply, rx) = oneshot::channel();
        if self
            .cmd_tx
            .send(RuntimeCommand::GetMessages { reply })
            .await
            .is_err()
        {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Token status, or `None` if the runtime is gone.
    pub async fn token_status(&self) -> Option<TokenStatus> {
        let (reply, rx) = oneshot::channel();
        self.cmd_tx
            .send(RuntimeCommand::GetTokenStatus { reply })
            .await
            .ok()?;
        rx.await.ok()
    }

    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(RuntimeCommand::Shutdown).await;
    }
}

/// Everything the application needs from a spawned runtime.
pub struct RuntimeChannels {
    pub handle: RuntimeHandle,
    pub events: mpsc::Receiver<ClientEvent>,
    /// Resolves when the runtime task exits.
    pub join: tokio::task::JoinHandle<()>,
}

/// Spawns client runtimes.
pub struct GroupRuntime;

impl GroupRuntime {
    /// Run `client` on its own task. Must be called within a tokio runtime.
    pub fn spawn<L>(client: GroupClient<L>, config: RuntimeConfig) -> RuntimeChannels
    where
        L: Ledger + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer.max(1));
        let (event_tx, events) = mpsc::channel(config.event_buffer.max(1));

        let join = tokio::spawn(r#loop::runtime_loop(client, config, cmd_rx, event_tx));

        RuntimeChannels {
            handle: RuntimeHandle { cmd_tx },
            events,
            join,
        }
    }
}
