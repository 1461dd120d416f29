//! # Connect handshake and session gating.
//!
//! - [`Authenticator`] - issues challenges, verifies proofs, owns the session table
//! - [`Hello`], [`Challenge`], [`Proof`], [`Verdict`] - handshake frames
//! - [`sign_nonce`] - client-side digest computation

mod authenticator;
mod digest;
mod handshake;
mod session;

pub use authenticator::Authenticator;
pub use digest::{NONCE_LEN, sign_nonce};
pub use handshake::{Challenge, Hello, Proof, Verdict};
pub use session::{Session, SessionId};
