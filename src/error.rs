use crate::*;

use thiserror::Error;

/// Cryptographic error types
#[derive(Debug, Error)]
pub enum Error {
    #[error("pollcrypt: key generation failed after {0} attempts")]
    KeygenFailed(u32),

    #[error("pollcrypt: plaintext out of range for this public key")]
    PlaintextOutOfRange,

    #[error("pollcrypt: invalid nonce - not a unit modulo n")]
    InvalidNonce,

    #[error("pollcrypt: invalid ciphertext - outside the ciphertext group")]
    InvalidCiphertext,

    #[error("pollcrypt: ciphertext exponent mismatch: {0} vs {1}")]
    CiphertextExponentMismatch(i64, i64),

    #[error("pollcrypt: aggregate decryption failed for option {0}")]
    DecryptionFailure(usize),

    #[error("pollcrypt: malformed ballot vector: expected {expected} components, found {found}")]
    BallotShape { expected: usize, found: usize },

    #[error("pollcrypt: JSON error: {0}")]
    JSONSerialization(#[from] serde_json::Error),
}

/// Ballot and token validation errors
///
/// Every rejection carries the specific reason - an unverifiable ballot is
/// reported and excluded, never counted toward a default option.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("pollcrypt validation: invalid proof: {0}")]
    InvalidProof(&'static str),

    #[error("pollcrypt validation: expected {expected} binary proofs and exactly one sum proof, found {found} proofs")]
    ProofCountMismatch { expected: usize, found: usize },

    #[error("pollcrypt validation: ballot has {found} components but the poll has {expected} options")]
    BallotLengthMismatch { expected: usize, found: usize },

    #[error("pollcrypt validation: token signature is invalid")]
    InvalidTokenSignature,

    #[error("pollcrypt validation: token already used")]
    TokenAlreadyUsed,

    #[error("pollcrypt validation: identity already requested a token")]
    DuplicateRequest,

    #[error("pollcrypt validation: identity never registered a token request")]
    NotRegistered,

    #[error("pollcrypt validation: a token was already issued for this identity")]
    AlreadyIssued,

    #[error("pollcrypt validation: operation not valid while the poll is {0}")]
    WrongPhase(PollPhase),

    #[error("pollcrypt validation: poll not found: {0}")]
    PollNotFound(String),

    #[error("pollcrypt validation: poll already exists: {0}")]
    PollExists(String),

    #[error("pollcrypt validation: a poll needs at least two options")]
    TooFewOptions,

    #[error("pollcrypt validation: crypto error: {0}")]
    Crypto(#[from] Error),
}
