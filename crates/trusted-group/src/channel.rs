/// GroupChannel — encrypted broadcast keyed by the group token.
///
/// Send side refuses locally without a token. Receive side drops what it
/// cannot decrypt without surfacing anything, and keeps a deduplicated,
/// append-only message list keyed by `SequenceId`.
use std::collections::HashSet;

use crate::crypto::{self, GroupToken};
use crate::event::Message;
use crate::types::{AccountId, SequenceId};
use crate::GroupError;

/// A decrypted broadcast in the local message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub sequence_id: SequenceId,
    pub sender: AccountId,
    pub text: String,
}

/// What happened to a delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Appended(ChannelMessage),
    /// Same `SequenceId` already in the list.
    Duplicate,
    /// No token cached yet.
    NoToken,
    /// Wrong token, tampered bytes, or non-UTF-8 plaintext.
    Undecryptable,
}

/// Strictly growing list with at most one entry per `SequenceId`.
#[derive(Debug, Default)]
pub struct MessageLog {
    entries: Vec<ChannelMessage>,
    seen: HashSet<SequenceId>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unless the sequence id is already present. Returns whether
    /// the entry was added.
    pub fn record(&mut self, message: ChannelMessage) -> bool {
        if !self.seen.insert(message.sequence_id) {
            return false;
        }
        self.entries.push(message);
        true
    }

    pub fn contains(&self, sequence_id: SequenceId) -> bool {
        self.seen.contains(&sequence_id)
    }

    pub fn entries(&self) -> &[ChannelMessage] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Local view of the group channel.
#[derive(Debug, Default)]
pub struct GroupChannel {
    log: MessageLog,
}

impl GroupChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encrypt `text` for the group. Fails with `MissingToken` before any
    /// crypto when no token is cached.
    pub fn seal(text: &str, token: Option<&GroupToken>) -> Result<Vec<u8>, GroupError> {
        let token = token.ok_or(GroupError::MissingToken)?;
        crypto::encrypt_group_message(text.as_bytes(), token)
    }

    /// Decrypt a sealed broadcast into text.
    pub fn open(sealed: &[u8], token: &GroupToken) -> Result<String, GroupError> {
        let plaintext = crypto::decrypt_group_message(sealed, token)?;
        String::from_utf8(plaintext)
            .map_err(|e| GroupError::Crypto(format!("plaintext is not UTF-8: {e}")))
    }

    /// Handle a delivered `Message` event.
    pub fn receive(&mut self, message: &Message, token: Option<&GroupToken>) -> ReceiveOutcome {
        if self.log.contains(message.sequence_id) {
            return ReceiveOutcome::Duplicate;
        }
        let Some(token) = token else {
            return ReceiveOutcome::NoToken;
        };

        match Self::open(&message.ciphertext, token) {
            Ok(text) => {
                let entry = ChannelMessage {
                    sequence_id: message.sequence_id,
                    sender: message.sender.clone(),
                    text,
                };
                self.log.record(entry.clone());
                ReceiveOutcome::Appended(entry)
            }
            Err(e) => {
                tracing::debug!("dropping message {}: {e}", message.sequence_id);
                ReceiveOutcome::Undecryptable
            }
        }
    }

    pub fn messages(&self) -> &[ChannelMessage] {
        self.log.entries()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(name: &str) -> AccountId {
        AccountId::new(name).unwrap()
    }

    fn token() -> GroupToken {
        GroupToken::from_passphrase("Secure Group Token").unwrap()
    }

    fn message(seq: u64, text: &str, token: &GroupToken) -> Message {
        Message {
            sender: account("bob"),
            ciphertext: GroupChannel::seal(text, Some(token)).unwrap(),
            sequence_id: SequenceId(seq),
        }
    }

    #[test]
    fn seal_without_token_is_refused() {
        assert!(matches!(
            GroupChannel::seal("hi", None),
            Err(GroupError::MissingToken)
        ));
    }

    #[test]
    fn receive_appends() {
        let mut channel = GroupChannel::new();
        let outcome = channel.receive(&message(1, "hello", &token()), Some(&token()));

        let ReceiveOutcome::Appended(entry) = outcome else {
            panic!("expected Appended");
        };
        assert_eq!(entry.text, "hello");
        assert_eq!(entry.sender, account("bob"));
        assert_eq!(channel.messages().len(), 1);
    }

    #[test]
    fn redelivery_is_deduplicated() {
        let mut channel = GroupChannel::new();
        let msg = message(1, "hello", &token());

        channel.receive(&msg, Some(&token()));
        assert_eq!(
            channel.receive(&msg, Some(&token())),
            ReceiveOutcome::Duplicate
        );
        assert_eq!(channel.messages().len(), 1);
    }

    #[test]
    fn wrong_token_is_dropped_silently() {
        let mut channel = GroupChannel::new();
        let msg = message(1, "hello", &GroupToken::generate());

        assert_eq!(
            channel.receive(&msg, Some(&token())),
            ReceiveOutcome::Undecryptable
        );
        assert!(channel.messages().is_empty());
    }

    #[test]
    fn no_token_drops_without_marking_seen() {
        let mut channel = GroupChannel::new();
        let msg = message(1, "hello", &token());

        assert_eq!(channel.receive(&msg, None), ReceiveOutcome::NoToken);
        // Later redelivery after the token arrived is accepted.
        assert!(matches!(
            channel.receive(&msg, Some(&token())),
            ReceiveOutcome::Appended(_)
        ));
    }

    #[test]
    fn garbage_ciphertext_is_dropped() {
        let mut channel = GroupChannel::new();
        let msg = Message {
            sender: account("bob"),
            ciphertext: vec![0xde, 0xad],
            sequence_id: SequenceId(4),
        };
        assert_eq!(
            channel.receive(&msg, Some(&token())),
            ReceiveOutcome::Undecryptable
        );
    }

    #[test]
    fn log_keeps_delivery_order() {
        let mut log = MessageLog::new();
        for seq in [5, 2, 9] {
            log.record(ChannelMessage {
                sequence_id: SequenceId(seq),
                sender: account("bob"),
                text: format!("m{seq}"),
            });
        }
        let texts: Vec<&str> = log.entries().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["m5", "m2", "m9"]);
        assert_eq!(log.len(), 3);
    }
}
