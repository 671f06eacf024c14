use crate::*;

use num_traits::ToPrimitive;

/// Per-option running ciphertexts built by homomorphic multiplication.
/// Exists only transiently while a poll is being closed; individual ballots
/// are never decrypted, only these aggregates.
pub struct TallyAccumulator {
    slots: Vec<Option<Ciphertext>>,
    ballots: u64,
}

impl TallyAccumulator {
    pub fn ballot_count(&self) -> u64 {
        self.ballots
    }
}

/// Diagnostic raised when the decrypted totals do not add up to the number
/// of accumulated ballots. Surfaced alongside the results, never silently
/// corrected.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TallyInconsistency {
    pub expected_total: u64,
    pub actual_total: u64,
}

/// Outcome of finalizing a poll's accumulators.
#[derive(Debug, Clone)]
pub struct TallyOutcome {
    pub per_option_counts: Vec<u64>,
    pub total_ballots: u64,

    /// Options whose aggregate failed to decrypt. Fatal for those options
    /// only; the rest still finalize.
    pub failed_options: Vec<usize>,

    pub inconsistency: Option<TallyInconsistency>,
}

impl TallyOutcome {
    /// The boundary shape published to the web layer.
    pub fn to_result(&self) -> TallyResult {
        TallyResult {
            per_option_counts: self.per_option_counts.clone(),
            total: self.per_option_counts.iter().sum(),
            inconsistency: self.inconsistency.clone(),
        }
    }
}

/// Fold `add` across every ballot's i-th ciphertext for each option i.
/// Pure function of the ballot set; the group operation is commutative, so
/// the result is order-independent.
pub fn accumulate(
    public: &PaillierPublicKey,
    ballots: &[EncryptedBallot],
    options: usize,
) -> Result<TallyAccumulator, Error> {
    let mut slots: Vec<Option<Ciphertext>> = vec![None; options];

    for ballot in ballots {
        if ballot.ciphertexts.len() != options {
            return Err(Error::BallotShape {
                expected: options,
                found: ballot.ciphertexts.len(),
            });
        }
        for (slot, ciphertext) in slots.iter_mut().zip(&ballot.ciphertexts) {
            *slot = Some(match slot.take() {
                Some(acc) => add(public, &acc, ciphertext)?,
                None => ciphertext.clone(),
            });
        }
    }

    Ok(TallyAccumulator {
        slots,
        ballots: ballots.len() as u64,
    })
}

/// Decrypt each option's accumulator exactly once. A slot that never saw a
/// ballot counts zero; a slot that fails to decrypt is reported in
/// `failed_options` while the remaining options still finalize.
pub fn finalize(accumulator: &TallyAccumulator, private: &PaillierPrivateKey) -> TallyOutcome {
    let mut counts = vec![0u64; accumulator.slots.len()];
    let mut failed_options = Vec::new();

    for (index, slot) in accumulator.slots.iter().enumerate() {
        let ciphertext = match slot {
            Some(ciphertext) => ciphertext,
            None => continue,
        };
        match decrypt(private, ciphertext).ok().and_then(|m| m.to_u64()) {
            Some(count) => counts[index] = count,
            None => {
                error!("aggregate decryption failed for option {}", index);
                failed_options.push(index);
            }
        }
    }

    let inconsistency = if failed_options.is_empty() {
        let actual_total: u64 = counts.iter().sum();
        if actual_total != accumulator.ballots {
            warn!(
                "tally inconsistency: {} ballots accumulated but totals sum to {}",
                accumulator.ballots, actual_total
            );
            Some(TallyInconsistency {
                expected_total: accumulator.ballots,
                actual_total,
            })
        } else {
            None
        }
    } else {
        None
    };

    TallyOutcome {
        per_option_counts: counts,
        total_ballots: accumulator.ballots,
        failed_options,
        inconsistency,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    const TEST_KEY_BITS: usize = 256;

    fn ballot(public: &PaillierPublicKey, components: &[u64]) -> EncryptedBallot {
        let mut ciphertexts = Vec::new();
        let mut nonces = Vec::new();
        let mut binary_proofs = Vec::new();
        for m in components {
            let nonce = random_nonce(public);
            let ciphertext = encrypt_with_nonce(public, *m, &nonce).unwrap();
            binary_proofs.push(prove_binary(public, &ciphertext, *m, &nonce).unwrap());
            ciphertexts.push(ciphertext);
            nonces.push(nonce);
        }
        let sum_proof = prove_sum(public, &ciphertexts, &nonces).unwrap();
        EncryptedBallot {
            ciphertexts,
            binary_proofs,
            sum_proof,
            signature_hash: signature_hash(&BigUint::from(1u8)),
            submitted_at: 0,
        }
    }

    #[test]
    fn accumulates_and_finalizes() {
        let (public, private) = generate_keypair(TEST_KEY_BITS).unwrap();
        let ballots = vec![
            ballot(&public, &[1, 0]),
            ballot(&public, &[0, 1]),
            ballot(&public, &[1, 0]),
        ];

        let accumulator = accumulate(&public, &ballots, 2).unwrap();
        assert_eq!(accumulator.ballot_count(), 3);

        let outcome = finalize(&accumulator, &private);
        assert_eq!(outcome.per_option_counts, vec![2, 1]);
        assert_eq!(outcome.total_ballots, 3);
        assert!(outcome.failed_options.is_empty());
        assert!(outcome.inconsistency.is_none());

        let result = outcome.to_result();
        assert_eq!(result.total, 3);
    }

    #[test]
    fn empty_poll_tallies_to_zero() {
        let (public, private) = generate_keypair(TEST_KEY_BITS).unwrap();
        let accumulator = accumulate(&public, &[], 3).unwrap();
        let outcome = finalize(&accumulator, &private);
        assert_eq!(outcome.per_option_counts, vec![0, 0, 0]);
        assert!(outcome.inconsistency.is_none());
    }

    #[test]
    fn rejects_wrong_length_ballot() {
        let (public, _) = generate_keypair(TEST_KEY_BITS).unwrap();
        let ballots = vec![ballot(&public, &[1, 0, 0])];
        assert!(matches!(
            accumulate(&public, &ballots, 2),
            Err(Error::BallotShape { expected: 2, found: 3 })
        ));
    }

    #[test]
    fn reports_inconsistency_without_correcting() {
        let (public, private) = generate_keypair(TEST_KEY_BITS).unwrap();
        // A ballot that slipped past validation with two set components.
        let ballots = vec![ballot(&public, &[1, 1]), ballot(&public, &[1, 0])];
        let accumulator = accumulate(&public, &ballots, 2).unwrap();
        let outcome = finalize(&accumulator, &private);
        assert_eq!(outcome.per_option_counts, vec![2, 1]);
        assert_eq!(
            outcome.inconsistency,
            Some(TallyInconsistency { expected_total: 2, actual_total: 3 })
        );
    }
}
