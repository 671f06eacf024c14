use crate::*;

use std::fmt;
use uuid::Uuid;

/// Production key strength. Tests use shorter keys.
pub const DEFAULT_KEY_BITS: usize = 2048;

/// Lifecycle of a poll's crypto state:
/// Created (keys exist) → Open (tokens/votes accepted) → Closed (tally
/// computed once, cached) → Archived (read-only).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PollPhase {
    Created,
    Open,
    Closed,
    Archived,
}

impl fmt::Display for PollPhase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let phase = match self {
            PollPhase::Created => "created",
            PollPhase::Open => "open",
            PollPhase::Closed => "closed",
            PollPhase::Archived => "archived",
        };
        write!(f, "{}", phase)
    }
}

/// All cryptographic state for one poll: one Paillier key pair, one RSA key
/// pair, one token registry and the ordered encrypted-ballot store. The only
/// stateful orchestration object in the crate.
pub struct PollCryptoContext {
    paillier_public: PaillierPublicKey,
    paillier_private: PaillierPrivateKey,
    rsa: RsaKeyPair,
    registry: AnonymityTokenRegistry,
    ballots: Vec<EncryptedBallot>,
    options: usize,
    phase: PollPhase,
    cached_tally: Option<TallyOutcome>,
}

impl PollCryptoContext {
    /// Generate both key pairs for a new poll. This is the one long-running
    /// operation in the crate (prime search at `bits` strength); callers
    /// dispatch it off request-serving threads.
    pub fn new(options: usize, bits: usize) -> Result<Self, ValidationError> {
        if options < 2 {
            return Err(ValidationError::TooFewOptions);
        }

        let (paillier_public, paillier_private) = generate_keypair(bits)?;
        let rsa = RsaKeyPair::generate(bits)?;
        info!("poll crypto context created: {} options, {}-bit keys", options, bits);

        Ok(PollCryptoContext {
            paillier_public,
            paillier_private,
            rsa,
            registry: AnonymityTokenRegistry::new(),
            ballots: Vec::new(),
            options,
            phase: PollPhase::Created,
            cached_tally: None,
        })
    }

    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    pub fn options(&self) -> usize {
        self.options
    }

    pub fn ballot_count(&self) -> usize {
        self.ballots.len()
    }

    pub fn paillier_public(&self) -> &PaillierPublicKey {
        &self.paillier_public
    }

    /// The published key material. Never includes private components.
    pub fn public_key_bundle(&self) -> PublicKeyBundle {
        PublicKeyBundle {
            paillier: self.paillier_public.clone(),
            rsa: self.rsa.public_components(),
        }
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            paillier_ready: true,
            rsa_ready: true,
            used_token_count: self.registry.used_token_count(),
        }
    }

    /// Created → Open.
    pub fn open(&mut self) -> Result<(), ValidationError> {
        self.require_phase(PollPhase::Created)?;
        self.phase = PollPhase::Open;
        info!("poll opened for voting");
        Ok(())
    }

    /// Register the identity and blind-sign its token in one step. The
    /// registry's two-stage errors (DuplicateRequest / NotRegistered /
    /// AlreadyIssued) pass through unchanged.
    pub fn request_token(&mut self, request: &TokenRequest) -> Result<TokenResponse, ValidationError> {
        self.require_phase(PollPhase::Open)?;
        self.registry.register_request(&request.identity)?;
        let signature = self
            .registry
            .issue(&request.identity, &request.blinded_token, &self.rsa)?;
        Ok(TokenResponse { signature })
    }

    /// Validate and store a client-encrypted ballot.
    ///
    /// Order matters: the typed shape, the token signature and every proof
    /// are checked before the token is consumed, so a rejected ballot does
    /// not burn its token. A ballot failing any step is excluded with a
    /// specific error - never counted toward a default option.
    pub fn submit_ballot(
        &mut self,
        submission: &BallotSubmission,
    ) -> Result<BallotReceipt, ValidationError> {
        self.require_phase(PollPhase::Open)?;

        if submission.encrypted_vote.len() != self.options {
            return Err(ValidationError::BallotLengthMismatch {
                expected: self.options,
                found: submission.encrypted_vote.len(),
            });
        }

        // Exactly one binary proof per component plus exactly one sum proof.
        let mut binary_proofs: Vec<&BinaryProof> = Vec::with_capacity(self.options);
        let mut sum_proof: Option<&SumProof> = None;
        for proof in &submission.zk_proofs {
            match proof {
                ZkProof::Binary(proof) => binary_proofs.push(proof),
                ZkProof::Sum(proof) => {
                    if sum_proof.replace(proof).is_some() {
                        return Err(ValidationError::ProofCountMismatch {
                            expected: self.options,
                            found: submission.zk_proofs.len(),
                        });
                    }
                }
            }
        }
        let sum_proof = match sum_proof {
            Some(proof) if binary_proofs.len() == self.options => proof,
            _ => {
                return Err(ValidationError::ProofCountMismatch {
                    expected: self.options,
                    found: submission.zk_proofs.len(),
                })
            }
        };

        if !self
            .rsa
            .public_components()
            .verify(submission.message.as_bytes(), &submission.signature)
        {
            warn!("ballot rejected: invalid token signature");
            return Err(ValidationError::InvalidTokenSignature);
        }

        for (ciphertext, proof) in submission.encrypted_vote.iter().zip(&binary_proofs) {
            verify_binary(&self.paillier_public, ciphertext, proof)?;
        }
        verify_sum(&self.paillier_public, &submission.encrypted_vote, sum_proof)?;

        let signature_hash = signature_hash(&submission.signature);
        if !self.registry.consume(&signature_hash) {
            warn!("ballot rejected: token already used");
            return Err(ValidationError::TokenAlreadyUsed);
        }

        let receipt = BallotReceipt {
            ballot_id: Uuid::new_v4(),
            position: self.ballots.len(),
        };
        self.ballots.push(EncryptedBallot {
            ciphertexts: submission.encrypted_vote.clone(),
            binary_proofs: binary_proofs.into_iter().cloned().collect(),
            sum_proof: sum_proof.clone(),
            signature_hash,
            submitted_at: unix_timestamp(),
        });
        debug!("ballot {} accepted at position {}", receipt.ballot_id, receipt.position);
        Ok(receipt)
    }

    /// Open → Closed. Accumulates every stored ballot, decrypts only the
    /// per-option aggregates and caches the outcome; reachable exactly once.
    pub fn close(&mut self) -> Result<TallyOutcome, ValidationError> {
        self.require_phase(PollPhase::Open)?;

        let accumulator = accumulate(&self.paillier_public, &self.ballots, self.options)
            .map_err(ValidationError::Crypto)?;
        let outcome = finalize(&accumulator, &self.paillier_private);

        self.phase = PollPhase::Closed;
        self.cached_tally = Some(outcome.clone());
        info!("poll closed: {} ballots tallied", outcome.total_ballots);
        Ok(outcome)
    }

    /// The cached tally, available once the poll has closed.
    pub fn tally_outcome(&self) -> Option<&TallyOutcome> {
        self.cached_tally.as_ref()
    }

    pub fn tally_result(&self) -> Result<TallyResult, ValidationError> {
        self.cached_tally
            .as_ref()
            .map(TallyOutcome::to_result)
            .ok_or(ValidationError::WrongPhase(self.phase))
    }

    /// Closed → Archived.
    pub fn archive(&mut self) -> Result<(), ValidationError> {
        self.require_phase(PollPhase::Closed)?;
        self.phase = PollPhase::Archived;
        Ok(())
    }

    fn require_phase(&self, expected: PollPhase) -> Result<(), ValidationError> {
        if self.phase != expected {
            return Err(ValidationError::WrongPhase(self.phase));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY_BITS: usize = 512;

    #[test]
    fn phase_machine_gates_operations() {
        let mut context = PollCryptoContext::new(2, TEST_KEY_BITS).unwrap();
        assert_eq!(context.phase(), PollPhase::Created);

        let bundle = context.public_key_bundle();
        let (blinded, _) = bundle.rsa.blind(b"early token");
        let request = TokenRequest { identity: "voter-1".into(), blinded_token: blinded };

        // Tokens are not issued before the poll opens.
        assert!(matches!(
            context.request_token(&request),
            Err(ValidationError::WrongPhase(PollPhase::Created))
        ));
        assert!(context.close().is_err());
        assert!(context.archive().is_err());

        context.open().unwrap();
        assert!(context.open().is_err());
        context.request_token(&request).unwrap();

        context.close().unwrap();
        assert!(matches!(
            context.request_token(&request),
            Err(ValidationError::WrongPhase(PollPhase::Closed))
        ));
        assert!(context.close().is_err());

        context.archive().unwrap();
        assert_eq!(context.phase(), PollPhase::Archived);
        assert!(context.tally_result().is_ok());
    }

    #[test]
    fn rejects_too_few_options() {
        assert!(matches!(
            PollCryptoContext::new(1, TEST_KEY_BITS),
            Err(ValidationError::TooFewOptions)
        ));
    }
}
