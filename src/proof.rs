use crate::*;

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

const BINARY_TRANSCRIPT_DOMAIN: &[u8] = b"pollcrypt-binary-proof-v1";
const SUM_TRANSCRIPT_DOMAIN: &[u8] = b"pollcrypt-sum-proof-v1";

/// Non-interactive proofs attached to a ballot, tagged by protocol.
///
/// Anything not deserializing into one of these variants is rejected at the
/// boundary; there is no fallback interpretation of loosely-shaped payloads.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "protocol")]
pub enum ZkProof {
    #[serde(rename = "binary-validity-v1")]
    Binary(BinaryProof),

    #[serde(rename = "exactly-one-sum-v1")]
    Sum(SumProof),
}

/// Sigma-protocol OR-proof that a ciphertext encrypts 0 or 1, hiding which.
///
/// The underlying relation is knowledge of the encryption nonce: for branch
/// i the statement is uᵢ = c·g⁻ⁱ mod n², claimed to be an n-th power. The
/// true branch is proven honestly, the false branch is simulated backward,
/// and the Fiat-Shamir challenge is split across the branches so exactly one
/// of them can be simulated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BinaryProof {
    #[serde(with = "biguint_hex_pair")]
    pub commitments: [BigUint; 2],

    /// Branch 0's share of the global challenge; branch 1's share is
    /// derived by the verifier from the recomputed transcript hash.
    #[serde(with = "biguint_hex")]
    pub challenge: BigUint,

    #[serde(with = "biguint_hex_pair")]
    pub responses: [BigUint; 2],

    pub key_fingerprint: String,
}

/// Sigma proof that the homomorphic sum of a ballot's components encrypts
/// exactly 1: knowledge of the combined nonce R with c_sum = g·Rⁿ mod n².
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SumProof {
    #[serde(with = "biguint_hex")]
    pub commitment: BigUint,

    #[serde(with = "biguint_hex")]
    pub challenge: BigUint,

    #[serde(with = "biguint_hex")]
    pub response: BigUint,

    pub key_fingerprint: String,
}

/// Per-index outcome of `batch_verify`.
#[derive(Debug, Clone)]
pub struct BatchVerification {
    pub results: Vec<bool>,
    pub all_valid: bool,
}

/// A (statement, proof) pair for batch verification.
pub enum ProofInstance<'a> {
    Binary {
        ciphertext: &'a Ciphertext,
        proof: &'a BinaryProof,
    },
    Sum {
        ciphertexts: &'a [Ciphertext],
        proof: &'a SumProof,
    },
}

/// Prove that `ciphertext` encrypts 0 or 1, given the plaintext and the
/// encryption nonce. Client-side by design.
///
/// The claimed plaintext is deliberately not range-checked here: the
/// verifier is the trust boundary, and a proof honestly constructed for an
/// out-of-range plaintext must simply fail verification.
pub fn prove_binary(
    public: &PaillierPublicKey,
    ciphertext: &Ciphertext,
    vote: u64,
    nonce: &BigUint,
) -> Result<BinaryProof, Error> {
    let nn = public.nn();
    let mut rng = OsRng;

    let honest = if vote == 0 { 0 } else { 1 };
    let simulated = 1 - honest;

    // Honest branch: commit to a fresh n-th power.
    let s = random_nonce(public);
    let honest_commitment = s.modpow(&public.n, &nn);

    // Simulated branch: pick the response and branch challenge first, then
    // derive the commitment that satisfies the verification equation.
    let sim_response = random_nonce(public);
    let sim_challenge = rng.gen_biguint_below(&public.n);
    let sim_statement = branch_statement(public, ciphertext, simulated)?;
    let sim_commitment = sim_response.modpow(&public.n, &nn)
        * sim_statement
            .modpow(&sim_challenge, &nn)
            .modinv(&nn)
            .ok_or(Error::InvalidCiphertext)?
        % &nn;

    let commitments = if honest == 0 {
        [honest_commitment, sim_commitment]
    } else {
        [sim_commitment, honest_commitment]
    };

    let global = binary_challenge(public, ciphertext, &commitments);
    let honest_challenge = (&global + &public.n - &sim_challenge) % &public.n;
    let honest_response = s * nonce.modpow(&honest_challenge, &public.n) % &public.n;

    let (challenge, responses) = if honest == 0 {
        (honest_challenge, [honest_response, sim_response])
    } else {
        (sim_challenge, [sim_response, honest_response])
    };

    Ok(BinaryProof {
        commitments,
        challenge,
        responses,
        key_fingerprint: public.fingerprint(),
    })
}

/// Verify a binary-validity proof against the ciphertext it claims to cover.
///
/// Acceptance is the conjunction of both branch equations under the
/// challenge split recomputed from the transcript - never "either branch
/// individually verifies".
pub fn verify_binary(
    public: &PaillierPublicKey,
    ciphertext: &Ciphertext,
    proof: &BinaryProof,
) -> Result<(), ValidationError> {
    if proof.key_fingerprint != public.fingerprint() {
        return Err(ValidationError::InvalidProof("public-key fingerprint mismatch"));
    }

    let nn = public.nn();
    if ciphertext.c.is_zero() || ciphertext.c >= nn || !ciphertext.c.gcd(&public.n).is_one() {
        return Err(ValidationError::InvalidProof("ciphertext outside the group"));
    }
    if proof.challenge >= public.n {
        return Err(ValidationError::InvalidProof("challenge out of range"));
    }
    for value in proof.commitments.iter() {
        if value.is_zero() || *value >= nn {
            return Err(ValidationError::InvalidProof("commitment out of range"));
        }
    }
    for value in proof.responses.iter() {
        if value.is_zero() || *value >= public.n {
            return Err(ValidationError::InvalidProof("response out of range"));
        }
    }

    // challenge₀ + challenge₁ ≡ H(c ‖ a₀ ‖ a₁ ‖ n ‖ g) (mod n)
    let global = binary_challenge(public, ciphertext, &proof.commitments);
    let challenges = [
        proof.challenge.clone(),
        (&global + &public.n - &proof.challenge) % &public.n,
    ];

    for branch in 0..2 {
        let statement = branch_statement(public, ciphertext, branch)
            .map_err(|_| ValidationError::InvalidProof("ciphertext outside the group"))?;
        let lhs = proof.responses[branch].modpow(&public.n, &nn);
        let rhs =
            &proof.commitments[branch] * statement.modpow(&challenges[branch], &nn) % &nn;
        if lhs != rhs {
            return Err(ValidationError::InvalidProof("branch equation failed"));
        }
    }

    Ok(())
}

/// Prove that the homomorphic sum of `ciphertexts` encrypts exactly 1, given
/// the per-component encryption nonces. Client-side by design.
pub fn prove_sum(
    public: &PaillierPublicKey,
    ciphertexts: &[Ciphertext],
    nonces: &[BigUint],
) -> Result<SumProof, Error> {
    if nonces.len() != ciphertexts.len() {
        return Err(Error::BallotShape {
            expected: ciphertexts.len(),
            found: nonces.len(),
        });
    }

    let combined = sum_ciphertexts(public, ciphertexts)?;
    let nn = public.nn();

    // The combined ciphertext is g^Σm · Rⁿ with R the product of nonces.
    let witness = nonces
        .iter()
        .fold(BigUint::from(1u8), |acc, nonce| acc * nonce % &public.n);

    let s = random_nonce(public);
    let commitment = s.modpow(&public.n, &nn);
    let challenge = sum_challenge(public, &combined, &commitment);
    let response = s * witness.modpow(&challenge, &public.n) % &public.n;

    Ok(SumProof {
        commitment,
        challenge,
        response,
        key_fingerprint: public.fingerprint(),
    })
}

/// Verify an exactly-one-sum proof against the ballot's actual components.
///
/// The sum ciphertext is recomputed from the submitted vector before any
/// equation is checked, so a proof cannot be replayed against a different
/// ballot.
pub fn verify_sum(
    public: &PaillierPublicKey,
    ciphertexts: &[Ciphertext],
    proof: &SumProof,
) -> Result<(), ValidationError> {
    if proof.key_fingerprint != public.fingerprint() {
        return Err(ValidationError::InvalidProof("public-key fingerprint mismatch"));
    }

    let combined = sum_ciphertexts(public, ciphertexts)
        .map_err(|_| ValidationError::InvalidProof("ciphertext outside the group"))?;

    let nn = public.nn();
    if proof.commitment.is_zero() || proof.commitment >= nn {
        return Err(ValidationError::InvalidProof("commitment out of range"));
    }
    if proof.response.is_zero() || proof.response >= public.n {
        return Err(ValidationError::InvalidProof("response out of range"));
    }

    let expected = sum_challenge(public, &combined, &proof.commitment);
    if expected != proof.challenge {
        return Err(ValidationError::InvalidProof("challenge does not match transcript"));
    }

    // z ⁿ ≡ a · (c_sum · g⁻¹)^e (mod n²)
    let statement = sum_statement(public, &combined)
        .map_err(|_| ValidationError::InvalidProof("ciphertext outside the group"))?;
    let lhs = proof.response.modpow(&public.n, &nn);
    let rhs = &proof.commitment * statement.modpow(&proof.challenge, &nn) % &nn;
    if lhs != rhs {
        return Err(ValidationError::InvalidProof("sum equation failed"));
    }

    Ok(())
}

/// Verify a list of proof instances, reporting per-index pass/fail plus an
/// aggregate flag. Never short-circuits, so the caller can see exactly
/// which item failed.
pub fn batch_verify(public: &PaillierPublicKey, instances: &[ProofInstance]) -> BatchVerification {
    let results: Vec<bool> = instances
        .iter()
        .map(|instance| match instance {
            ProofInstance::Binary { ciphertext, proof } => {
                verify_binary(public, ciphertext, proof).is_ok()
            }
            ProofInstance::Sum { ciphertexts, proof } => {
                verify_sum(public, ciphertexts, proof).is_ok()
            }
        })
        .collect();

    let all_valid = results.iter().all(|ok| *ok);
    BatchVerification { results, all_valid }
}

/// Branch statement uᵢ = c · g⁻ⁱ mod n²: an n-th power exactly when the
/// ciphertext encrypts i.
fn branch_statement(
    public: &PaillierPublicKey,
    ciphertext: &Ciphertext,
    branch: usize,
) -> Result<BigUint, Error> {
    let nn = public.nn();
    if branch == 0 {
        Ok(ciphertext.c.clone() % &nn)
    } else {
        let g_inv = public.g.modinv(&nn).ok_or(Error::InvalidCiphertext)?;
        Ok(&ciphertext.c * g_inv % &nn)
    }
}

/// Statement for the sum proof: c_sum · g⁻¹ mod n².
fn sum_statement(public: &PaillierPublicKey, combined: &Ciphertext) -> Result<BigUint, Error> {
    let nn = public.nn();
    let g_inv = public.g.modinv(&nn).ok_or(Error::InvalidCiphertext)?;
    Ok(&combined.c * g_inv % &nn)
}

/// Fiat-Shamir challenge for the binary proof:
/// SHA-256(domain ‖ c ‖ a₀ ‖ a₁ ‖ n ‖ g) reduced mod n. Each integer is
/// length-prefixed so transcripts cannot collide across field boundaries.
fn binary_challenge(
    public: &PaillierPublicKey,
    ciphertext: &Ciphertext,
    commitments: &[BigUint; 2],
) -> BigUint {
    transcript_hash(
        BINARY_TRANSCRIPT_DOMAIN,
        &[
            &ciphertext.c,
            &commitments[0],
            &commitments[1],
            &public.n,
            &public.g,
        ],
    ) % &public.n
}

/// Fiat-Shamir challenge for the sum proof over (c_sum ‖ a ‖ n ‖ g).
fn sum_challenge(
    public: &PaillierPublicKey,
    combined: &Ciphertext,
    commitment: &BigUint,
) -> BigUint {
    transcript_hash(
        SUM_TRANSCRIPT_DOMAIN,
        &[&combined.c, commitment, &public.n, &public.g],
    ) % &public.n
}

fn transcript_hash(domain: &[u8], values: &[&BigUint]) -> BigUint {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    for value in values {
        let bytes = value.to_bytes_be();
        hasher.update(&(bytes.len() as u64).to_be_bytes());
        hasher.update(&bytes);
    }
    BigUint::from_bytes_be(&hasher.finalize())
}
