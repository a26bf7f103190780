/// Key exchange — how the group token reaches a member.
///
/// Per-member progression: `NoToken → AwaitingToken → HasToken`.
/// Pure state machine, no I/O: the client performs the contract calls
/// and feeds the outcomes back in.
use crate::crypto::{self, GroupToken, KeyPair, PublicKey};
use crate::event::{TokenRequest, WrappedToken};
use crate::types::AccountId;
use crate::GroupError;

/// Where this participant stands with respect to the group token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenState {
    NoToken,
    AwaitingToken,
    HasToken(GroupToken),
}

/// Observable summary of [`TokenState`] without the secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenStatus {
    NoToken,
    AwaitingToken,
    HasToken,
}

/// Result of feeding a `WrappedToken` event to the state machine.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// Addressed to another account.
    NotAddressed,
    /// Addressed to us, but we never generated a keypair this session.
    NoKeypair,
    /// Token unwrapped and cached.
    Installed,
    /// Unwrap failed; state unchanged.
    Failed(GroupError),
}

/// Token-exchange state of one participant.
pub struct KeyExchange {
    local_id: AccountId,
    /// Session keypair, created on first request and reused afterwards
    /// so that a late answer to an earlier request still unwraps.
    keypair: Option<KeyPair>,
    state: TokenState,
}

impl KeyExchange {
    /// A member that has not received the token yet.
    pub fn member(local_id: AccountId) -> Self {
        Self {
            local_id,
            keypair: None,
            state: TokenState::NoToken,
        }
    }

    /// The owner holds the token from group creation.
    pub fn owner(local_id: AccountId, token: GroupToken) -> Self {
        Self {
            local_id,
            keypair: None,
            state: TokenState::HasToken(token),
        }
    }

    pub fn local_id(&self) -> &AccountId {
        &self.local_id
    }

    pub fn state(&self) -> &TokenState {
        &self.state
    }

    pub fn status(&self) -> TokenStatus {
        match self.state {
            TokenState::NoToken => TokenStatus::NoToken,
            TokenState::AwaitingToken => TokenStatus::AwaitingToken,
            TokenState::HasToken(_) => TokenStatus::HasToken,
        }
    }

    pub fn token(&self) -> Option<&GroupToken> {
        match &self.state {
            TokenState::HasToken(token) => Some(token),
            _ => None,
        }
    }

    // ── Member side ──────────────────────────────────────────────────────

    /// Public key to attach to a token request, generating the session
    /// keypair on first use.
    pub fn request_key(&mut self) -> PublicKey {
        self.keypair.get_or_insert_with(KeyPair::generate).public()
    }

    /// The contract accepted our request.
    pub fn on_request_sent(&mut self) {
        if self.state == TokenState::NoToken {
            tracing::info!("{}: awaiting group token", self.local_id);
            self.state = TokenState::AwaitingToken;
        }
    }

    /// Handle a delivered wrapped token.
    pub fn accept_delivery(&mut self, delivery: &WrappedToken) -> DeliveryOutcome {
        if delivery.recipient != self.local_id {
            return DeliveryOutcome::NotAddressed;
        }
        let Some(keypair) = &self.keypair else {
            return DeliveryOutcome::NoKeypair;
        };

        match crypto::unwrap_token(&delivery.ciphertext, &self.local_id, keypair) {
            Ok(token) => {
                tracing::info!("{}: group token installed", self.local_id);
                self.state = TokenState::HasToken(token);
                DeliveryOutcome::Installed
            }
            Err(e) => {
                tracing::warn!("{}: token unwrap failed: {e}", self.local_id);
                DeliveryOutcome::Failed(e)
            }
        }
    }

    // ── Owner side ───────────────────────────────────────────────────────

    /// Wrap the current token for a requester.
    ///
    /// No deduplication: every request gets its own answer.
    pub fn answer_request(&self, request: &TokenRequest) -> Result<Vec<u8>, GroupError> {
        let token = self.token().ok_or(GroupError::MissingToken)?;
        crypto::wrap_token(token, &request.requester, &request.public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SequenceId;

    fn account(name: &str) -> AccountId {
        AccountId::new(name).unwrap()
    }

    fn token() -> GroupToken {
        GroupToken::from_passphrase("Secure Group Token").unwrap()
    }

    /// Owner answers `member`'s request; returns the delivery event.
    fn answered(owner: &KeyExchange, member: &mut KeyExchange) -> WrappedToken {
        let request = TokenRequest {
            requester: member.local_id().clone(),
            public_key: member.request_key(),
        };
        member.on_request_sent();
        WrappedToken {
            recipient: member.local_id().clone(),
            ciphertext: owner.answer_request(&request).unwrap(),
            sequence_id: SequenceId(1),
        }
    }

    #[test]
    fn member_starts_without_token() {
        let kx = KeyExchange::member(account("bob"));
        assert_eq!(kx.status(), TokenStatus::NoToken);
        assert!(kx.token().is_none());
    }

    #[test]
    fn owner_starts_with_token() {
        let kx = KeyExchange::owner(account("owner"), token());
        assert_eq!(kx.status(), TokenStatus::HasToken);
        assert_eq!(kx.token(), Some(&token()));
    }

    #[test]
    fn full_exchange() {
        let owner = KeyExchange::owner(account("owner"), token());
        let mut bob = KeyExchange::member(account("bob"));

        let delivery = answered(&owner, &mut bob);
        assert_eq!(bob.status(), TokenStatus::AwaitingToken);

        assert!(matches!(
            bob.accept_delivery(&delivery),
            DeliveryOutcome::Installed
        ));
        assert_eq!(bob.token(), Some(&token()));
    }

    #[test]
    fn request_key_is_stable_within_session() {
        let mut bob = KeyExchange::member(account("bob"));
        let first = bob.request_key();
        let second = bob.request_key();
        assert_eq!(first, second);
    }

    #[test]
    fn late_answer_to_first_request_still_unwraps() {
        let owner = KeyExchange::owner(account("owner"), token());
        let mut bob = KeyExchange::member(account("bob"));

        let first = answered(&owner, &mut bob);
        let _second = answered(&owner, &mut bob);

        assert!(matches!(
            bob.accept_delivery(&first),
            DeliveryOutcome::Installed
        ));
    }

    #[test]
    fn duplicate_delivery_is_harmless() {
        let owner = KeyExchange::owner(account("owner"), token());
        let mut bob = KeyExchange::member(account("bob"));
        let delivery = answered(&owner, &mut bob);

        bob.accept_delivery(&delivery);
        bob.accept_delivery(&delivery);
        assert_eq!(bob.token(), Some(&token()));
    }

    #[test]
    fn delivery_for_someone_else_is_ignored() {
        let owner = KeyExchange::owner(account("owner"), token());
        let mut bob = KeyExchange::member(account("bob"));
        let mut carol = KeyExchange::member(account("carol"));
        carol.request_key();

        let delivery = answered(&owner, &mut bob);
        assert!(matches!(
            carol.accept_delivery(&delivery),
            DeliveryOutcome::NotAddressed
        ));
        assert_eq!(carol.status(), TokenStatus::NoToken);
    }

    #[test]
    fn delivery_without_keypair() {
        let mut bob = KeyExchange::member(account("bob"));
        let delivery = WrappedToken {
            recipient: account("bob"),
            ciphertext: vec![1, 2, 3],
            sequence_id: SequenceId(1),
        };
        assert!(matches!(
            bob.accept_delivery(&delivery),
            DeliveryOutcome::NoKeypair
        ));
    }

    #[test]
    fn corrupted_delivery_keeps_awaiting() {
        let owner = KeyExchange::owner(account("owner"), token());
        let mut bob = KeyExchange::member(account("bob"));
        let mut delivery = answered(&owner, &mut bob);
        let last = delivery.ciphertext.len() - 1;
        delivery.ciphertext[last] ^= 0xFF;

        assert!(matches!(
            bob.accept_delivery(&delivery),
            DeliveryOutcome::Failed(_)
        ));
        assert_eq!(bob.status(), TokenStatus::AwaitingToken);
    }

    #[test]
    fn member_without_token_cannot_answer() {
        let bob = KeyExchange::member(account("bob"));
        let request = TokenRequest {
            requester: account("carol"),
            public_key: KeyPair::generate().public(),
        };
        assert!(matches!(
            bob.answer_request(&request),
            Err(GroupError::MissingToken)
        ));
    }

    #[test]
    fn request_after_token_keeps_token() {
        let mut owner = KeyExchange::owner(account("owner"), token());
        owner.on_request_sent();
        assert_eq!(owner.status(), TokenStatus::HasToken);
    }
}
