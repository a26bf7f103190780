use crate::types::AccountId;

use super::ClientEvent;

/// Intent produced by the pure `ClientState` handlers.
///
/// The client executes contract calls against the ledger; events go to
/// the application.
#[derive(Debug)]
pub enum RuntimeEffect {
    /// Owner only: call `sendToken(ciphertext, to)`.
    SendToken { to: AccountId, ciphertext: Vec<u8> },

    /// Surface an event to the application.
    Emit(ClientEvent),
}
