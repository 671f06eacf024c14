use crate::*;

use num_bigint::BigUint;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Public key material published to clients at poll creation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PublicKeyBundle {
    pub paillier: PaillierPublicKey,
    pub rsa: RsaPublicComponents,
}

/// A voter's request for an anonymous voting token. The blinded token is
/// opaque to the server; only the identity tag is meaningful here.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenRequest {
    pub identity: String,

    #[serde(with = "biguint_hex")]
    pub blinded_token: BigUint,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenResponse {
    #[serde(with = "biguint_hex")]
    pub signature: BigUint,
}

/// A client-encrypted ballot as it arrives from the web layer. This is the
/// single accepted shape; non-conforming payloads fail deserialization and
/// are rejected, never reinterpreted.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BallotSubmission {
    /// Sent by some clients alongside the ciphertexts. Never read: counting
    /// anything from a plaintext index would leak the vote to the server
    /// and bypass the proofs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_index: Option<u32>,

    pub encrypted_vote: Vec<Ciphertext>,

    pub zk_proofs: Vec<ZkProof>,

    #[serde(with = "biguint_hex")]
    pub signature: BigUint,

    pub message: String,
}

/// A validated ballot in a poll's ordered store. Holds ciphertexts, the
/// proofs they were admitted under and the consumed signature hash - never
/// a voter identity.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct EncryptedBallot {
    pub ciphertexts: Vec<Ciphertext>,
    pub binary_proofs: Vec<BinaryProof>,
    pub sum_proof: SumProof,
    pub signature_hash: String,
    pub submitted_at: u64,
}

/// Returned to the caller when a ballot is accepted.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BallotReceipt {
    pub ballot_id: Uuid,
    pub position: usize,
}

/// Final per-option counts, published when the poll closes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TallyResult {
    pub per_option_counts: Vec<u64>,
    pub total: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inconsistency: Option<TallyInconsistency>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SystemStatus {
    pub paillier_ready: bool,
    pub rsa_ready: bool,
    pub used_token_count: usize,
}

pub(crate) fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ballot_submission_rejects_malformed_payload() {
        // Loosely-shaped payloads from older clients must fail parsing
        // instead of being heuristically reinterpreted.
        let malformed = r#"{"encrypted_vector": ["abc"], "proof": {"valid": true}}"#;
        assert!(serde_json::from_str::<BallotSubmission>(malformed).is_err());
    }

    #[test]
    fn ballot_submission_tolerates_missing_vote_index() {
        let payload = r#"{
            "encrypted_vote": [{"c": "2a", "exponent": 0}],
            "zk_proofs": [],
            "signature": "1f",
            "message": "token-message"
        }"#;
        let submission: BallotSubmission = serde_json::from_str(payload).unwrap();
        assert_eq!(submission.vote_index, None);
        assert_eq!(submission.encrypted_vote.len(), 1);
    }
}
