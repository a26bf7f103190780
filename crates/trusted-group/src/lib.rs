//! Trusted group protocol.
//!
//! An owner controls a closed member set. Members obtain the shared group
//! token through a per-member key exchange, then broadcast messages only
//! token holders can read.
//!
//! Wire format: MessagePack (compact binary).
//! Crypto: X25519 + XChaCha20-Poly1305 token wrapping, XChaCha20-Poly1305
//! group channel keyed via HKDF-SHA256.

pub mod channel;
pub mod crypto;
pub mod error;
pub mod event;
pub mod key_exchange;
pub mod ledger;
pub mod registry;
pub mod relay;
pub mod runtime;
pub mod types;

pub use channel::{ChannelMessage, GroupChannel, MessageLog, ReceiveOutcome};
pub use crypto::{GroupToken, KeyPair, PublicKey};
pub use error::GroupError;
pub use event::{LedgerEvent, LogEntry, LogRecord, Message, RelayEvent, TokenRequest, WrappedToken};
pub use key_exchange::{DeliveryOutcome, KeyExchange, TokenState, TokenStatus};
pub use ledger::{Checkpoint, InMemoryLedger, Ledger, PollBatch};
pub use registry::{DenyReason, MembershipRegistry, Permission};
pub use relay::{Dispatch, EventRelay, RelayStats};
pub use runtime::{
    ClientEvent, ClientState, GroupClient, GroupRuntime, RuntimeChannels, RuntimeCommand,
    RuntimeConfig, RuntimeHandle,
};
pub use types::{AccountId, Operation, SequenceId};
