use serde::Serialize;
use std::io::Write;
use trusted_group::KeyPair;

/// Emit a JSON line to stdout (flushed immediately for piped output).
pub fn emit<T: Serialize>(event: &T) {
    if let Ok(json) = serde_json::to_string(event) {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        let _ = writeln!(lock, "{json}");
        let _ = lock.flush();
    }
}

// ── Keygen ──────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventKeygen {
    pub event: &'static str,
    pub public_key: String,
    pub secret_key: String,
}

impl EventKeygen {
    pub fn new(keypair: &KeyPair) -> Self {
        Self {
            event: "keygen",
            public_key: keypair.public().encode(),
            secret_key: hex::encode(keypair.secret_bytes()),
        }
    }
}

// ── Demo transcript ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct EventStep {
    pub event: &'static str,
    pub actor: String,
    pub action: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl EventStep {
    pub fn ok(actor: impl ToString, action: &'static str, detail: impl Into<String>) -> Self {
        Self {
            event: "step",
            actor: actor.to_string(),
            action,
            ok: true,
            detail: detail.into(),
        }
    }

    pub fn failed(actor: impl ToString, action: &'static str, detail: impl Into<String>) -> Self {
        Self {
            ok: false,
            ..Self::ok(actor, action, detail)
        }
    }
}

#[derive(Serialize)]
pub struct EventSummary {
    pub event: &'static str,
    pub members: usize,
    pub token_holders: usize,
    pub messages_per_reader: Vec<usize>,
    pub outsider_refused: bool,
}
