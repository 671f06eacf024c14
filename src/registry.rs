use crate::*;

use indexmap::IndexMap;
use num_bigint::BigUint;
use std::collections::HashSet;

/// Issuance record for one identity. Tracks that a token was requested and
/// signed - never the vote content, and never the unblinded signature.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct VotingToken {
    pub identity: String,
    pub issued_at: u64,

    /// SHA-256 of the blinded integer the server signed. Content-free: the
    /// client's blinding factor makes it uncorrelatable with the unblinded
    /// signature that later casts the vote.
    pub blinded_hash: Option<String>,

    pub signed: bool,

    /// Consumption is keyed by unblinded-signature hash, which cannot be
    /// linked back to an identity, so this flag never flips inside the
    /// anonymous flow. It exists for the issuance-audit shape only.
    pub used: bool,
}

/// Per-poll token issuance and consumption state.
///
/// Issuance is identity-bound (one request, one signature per identity);
/// consumption is identity-free (a set of used signature hashes). The two
/// sides are deliberately unlinkable.
#[derive(Default, Debug, Clone)]
pub struct AnonymityTokenRegistry {
    requests: IndexMap<String, VotingToken>,
    used_signatures: HashSet<String>,
}

impl AnonymityTokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a token request. A second request from the same identity is
    /// rejected.
    pub fn register_request(&mut self, identity: &str) -> Result<(), ValidationError> {
        if self.requests.contains_key(identity) {
            return Err(ValidationError::DuplicateRequest);
        }
        self.requests.insert(
            identity.to_string(),
            VotingToken {
                identity: identity.to_string(),
                issued_at: unix_timestamp(),
                blinded_hash: None,
                signed: false,
                used: false,
            },
        );
        Ok(())
    }

    /// Blind-sign a registered identity's token. Requires a prior
    /// `register_request`; at most one signature per identity.
    pub fn issue(
        &mut self,
        identity: &str,
        blinded: &BigUint,
        rsa: &RsaKeyPair,
    ) -> Result<BigUint, ValidationError> {
        let token = self
            .requests
            .get_mut(identity)
            .ok_or(ValidationError::NotRegistered)?;
        if token.signed {
            return Err(ValidationError::AlreadyIssued);
        }

        let signature = rsa.sign_blinded(blinded);
        token.signed = true;
        token.blinded_hash = Some(sha256_hex(&blinded.to_bytes_be()));
        debug!("issued blind signature for a registered identity");
        Ok(signature)
    }

    /// Atomic check-and-insert of a used signature hash. Returns false if
    /// the hash was already consumed; the caller must then reject the vote.
    /// This is the sole double-voting defense.
    pub fn consume(&mut self, signature_hash: &str) -> bool {
        self.used_signatures.insert(signature_hash.to_string())
    }

    pub fn used_token_count(&self) -> usize {
        self.used_signatures.len()
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }
}
