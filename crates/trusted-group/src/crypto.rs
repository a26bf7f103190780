/// Cryptography for the trusted group protocol.
///
/// Two primitives:
/// - Token wrapping: ephemeral X25519 Diffie-Hellman + HKDF-SHA256 +
///   XChaCha20-Poly1305, bound to the recipient account as associated data.
/// - Group channel: XChaCha20-Poly1305 keyed by HKDF-SHA256 over the group
///   token. Wrong token fails authentication.
use chacha20poly1305::{
    aead::{
        rand_core::{OsRng, RngCore},
        Aead, KeyInit, Payload,
    },
    XChaCha20Poly1305, XNonce,
};
use hkdf::Hkdf;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::fmt;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

use crate::types::AccountId;
use crate::GroupError;

/// HKDF info for token wrapping keys.
const WRAP_INFO: &[u8] = b"trusted-group-token-wrap-xchacha20poly1305-v1";

/// HKDF info for the group channel key.
const CHANNEL_INFO: &[u8] = b"trusted-group-channel-xchacha20poly1305-v1";

/// Length of a freshly generated group token.
pub const GROUP_TOKEN_LEN: usize = 32;

// ── GroupToken ───────────────────────────────────────────────────────────

/// The shared group secret. Opaque bytes of any non-zero length.
#[derive(Clone, PartialEq, Eq)]
pub struct GroupToken(Vec<u8>);

impl GroupToken {
    /// Fresh random 32-byte token.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; GROUP_TOKEN_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Use a UTF-8 phrase as the token (e.g. `"Secure Group Token"`).
    /// An empty phrase is no token at all.
    pub fn from_passphrase(phrase: &str) -> Result<Self, GroupError> {
        Self::from_bytes(phrase.as_bytes().to_vec())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, GroupError> {
        if bytes.is_empty() {
            return Err(GroupError::InvalidKey("empty group token".into()));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for GroupToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupToken(<{} bytes>)", self.0.len())
    }
}

// ── Keys ─────────────────────────────────────────────────────────────────

/// Public half of a member's exchange keypair.
///
/// Travels on the log as a lowercase hex string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encode for transmission.
    pub fn encode(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode a transmitted key. Rejects wrong length and non-hex input.
    pub fn decode(encoded: &str) -> Result<Self, GroupError> {
        let bytes = hex::decode(encoded.trim())
            .map_err(|e| GroupError::InvalidKey(format!("public key is not hex: {e}")))?;
        let array: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            GroupError::InvalidKey(format!("public key must be 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(array))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Ephemeral exchange keypair, held only by the member that generated it.
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self::from_secret(StaticSecret::random_from_rng(OsRng))
    }

    /// Rebuild a keypair from stored secret bytes.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self::from_secret(StaticSecret::from(bytes))
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey(X25519PublicKey::from(&secret).to_bytes());
        Self { secret, public }
    }

    pub fn public(&self) -> PublicKey {
        self.public
    }

    pub fn secret_bytes(&self) -> [u8; 32] {
        self.secret.to_bytes()
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public.encode())
            .finish_non_exhaustive()
    }
}

// ── Wire payloads ────────────────────────────────────────────────────────

/// Wrapped group token as carried in a `TokenSent` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SealedToken {
    /// Includes the 16-byte Poly1305 tag.
    ciphertext: Vec<u8>,
    nonce: [u8; 24],
    /// Sender's ephemeral X25519 public key.
    ephemeral_pk: [u8; 32],
}

/// Encrypted broadcast as carried in a `Communicated` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SealedMessage {
    ciphertext: Vec<u8>,
    nonce: [u8; 24],
}

fn derive_key(ikm: &[u8], info: &[u8]) -> Result<[u8; 32], GroupError> {
    let hkdf = Hkdf::<Sha256>::new(None, ikm);
    let mut key = [0u8; 32];
    hkdf.expand(info, &mut key)
        .map_err(|e| GroupError::Crypto(format!("key derivation failed: {e}")))?;
    Ok(key)
}

fn random_nonce() -> [u8; 24] {
    let mut nonce = [0u8; 24];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

// ── Token wrapping ───────────────────────────────────────────────────────

/// Wrap the group token for `recipient` under their public key.
pub fn wrap_token(
    token: &GroupToken,
    recipient: &AccountId,
    recipient_pk: &PublicKey,
) -> Result<Vec<u8>, GroupError> {
    let ephemeral_secret = StaticSecret::random_from_rng(OsRng);
    let ephemeral_public = X25519PublicKey::from(&ephemeral_secret);

    let shared = ephemeral_secret.diffie_hellman(&X25519PublicKey::from(recipient_pk.0));
    let key = derive_key(shared.as_bytes(), WRAP_INFO)?;
    let cipher = XChaCha20Poly1305::new(&key.into());

    let nonce = random_nonce();
    let ciphertext = cipher
        .encrypt(
            &XNonce::from(nonce),
            Payload {
                msg: token.as_bytes(),
                aad: recipient.as_str().as_bytes(),
            },
        )
        .map_err(|e| GroupError::Crypto(format!("token wrap failed: {e}")))?;

    let sealed = SealedToken {
        ciphertext,
        nonce,
        ephemeral_pk: ephemeral_public.to_bytes(),
    };
    Ok(rmp_serde::to_vec(&sealed)?)
}

/// Unwrap a token addressed to `recipient` with the matching keypair.
///
/// Fails on corrupted bytes, a foreign keypair, or a token wrapped for a
/// different account.
pub fn unwrap_token(
    wrapped: &[u8],
    recipient: &AccountId,
    keypair: &KeyPair,
) -> Result<GroupToken, GroupError> {
    let sealed: SealedToken = rmp_serde::from_slice(wrapped)?;

    let shared = keypair
        .secret
        .diffie_hellman(&X25519PublicKey::from(sealed.ephemeral_pk));
    let key = derive_key(shared.as_bytes(), WRAP_INFO)?;
    let cipher = XChaCha20Poly1305::new(&key.into());

    let plaintext = cipher
        .decrypt(
            &XNonce::from(sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad: recipient.as_str().as_bytes(),
            },
        )
        .map_err(|_| GroupError::Crypto("token unwrap failed: authentication error".into()))?;

    GroupToken::from_bytes(plaintext)
}

// ── Group channel ────────────────────────────────────────────────────────

/// Encrypt a broadcast under the group token. Randomized per call.
pub fn encrypt_group_message(plaintext: &[u8], token: &GroupToken) -> Result<Vec<u8>, GroupError> {
    let key = derive_key(token.as_bytes(), CHANNEL_INFO)?;
    let cipher = XChaCha20Poly1305::new(&key.into());
    let nonce = random_nonce();
    let ciphertext = cipher
        .encrypt(&XNonce::from(nonce), plaintext)
        .map_err(|e| GroupError::Crypto(format!("encryption failed: {e}")))?;
    Ok(rmp_serde::to_vec(&SealedMessage { ciphertext, nonce })?)
}

/// Decrypt a broadcast. Wrong token or tampered bytes fail explicitly.
pub fn decrypt_group_message(sealed: &[u8], token: &GroupToken) -> Result<Vec<u8>, GroupError> {
    let sealed: SealedMessage = rmp_serde::from_slice(sealed)?;
    let key = derive_key(token.as_bytes(), CHANNEL_INFO)?;
    let cipher = XChaCha20Poly1305::new(&key.into());
    cipher
        .decrypt(&XNonce::from(sealed.nonce), sealed.ciphertext.as_ref())
        .map_err(|_| GroupError::Crypto("decryption failed: authentication error".into()))
}
