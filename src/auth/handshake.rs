//! Handshake frames exchanged by [`Client::connect`](crate::Client::connect).
//!
//! ```text
//! client ── Hello { client_id } ─────────────────► server
//! client ◄──────────── Challenge { session, nonce? } server   (nonce omitted without a secret)
//! client ── Proof { session, digest? } ──────────► server
//! client ◄──────────── Verdict { success, reason? }  server
//! ```

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

use super::session::SessionId;

/// Opens a handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hello {
    /// Caller-chosen client name.
    pub client_id: String,
}

/// Server's answer to [`Hello`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Session opened for this connection.
    pub session: SessionId,
    /// Nonce to sign; absent when no shared secret is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// Client's answer to [`Challenge`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Session from the challenge.
    pub session: SessionId,
    /// `hex(HMAC-SHA256(secret, nonce))`, absent when the client has no key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Final handshake result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    /// Whether the session is now authenticated.
    pub success: bool,
    /// Failure explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl From<&Result<(), AuthError>> for Verdict {
    fn from(res: &Result<(), AuthError>) -> Self {
        match res {
            Ok(()) => Verdict {
                success: true,
                reason: None,
            },
            Err(e) => Verdict {
                success: false,
                reason: Some(e.to_string()),
            },
        }
    }
}
