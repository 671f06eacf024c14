use crate::*;

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_prime::nt_funcs::is_prime;
use num_prime::PrimalityTestConfig;
use num_traits::{One, Zero};
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

/// Bound on keygen retries before poll creation is aborted.
pub const MAX_KEYGEN_ATTEMPTS: u32 = 16;

const KEY_FINGERPRINT_DOMAIN: &[u8] = b"pollcrypt-paillier-key-v1";

/// Paillier public key with the simplified generator g = n + 1.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PaillierPublicKey {
    #[serde(with = "biguint_hex")]
    pub n: BigUint,

    #[serde(with = "biguint_hex")]
    pub g: BigUint,
}

impl PaillierPublicKey {
    /// The ciphertext modulus n².
    pub fn nn(&self) -> BigUint {
        &self.n * &self.n
    }

    /// Hex digest binding proofs to this key. Proofs produced against a
    /// different key pair are rejected by fingerprint before any equation
    /// is checked.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(KEY_FINGERPRINT_DOMAIN);
        hasher.update(&self.n.to_bytes_be());
        hasher.update(&self.g.to_bytes_be());
        hex::encode(hasher.finalize())
    }
}

/// Paillier private key. Exclusively owned by its `PollCryptoContext`;
/// deliberately not serializable so it can never leave the server through
/// a boundary shape.
#[derive(Clone)]
pub struct PaillierPrivateKey {
    lambda: BigUint,
    mu: BigUint,
    n: BigUint,
}

/// A Paillier ciphertext: an integer in [1, n²).
///
/// The exponent field is bookkeeping kept for compatibility with scaled
/// fixed-point encodings; in this protocol every ciphertext represents an
/// exact integer plaintext and the exponent stays 0. `add` rejects
/// mismatched exponents rather than rescaling.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Ciphertext {
    #[serde(with = "biguint_hex")]
    pub c: BigUint,

    #[serde(default)]
    pub exponent: i64,
}

/// Generate a Paillier key pair: p, q primes of bits/2, n = pq,
/// λ = lcm(p-1, q-1), g = n + 1, μ = L(g^λ mod n²)⁻¹ mod n.
pub fn generate_keypair(bits: usize) -> Result<(PaillierPublicKey, PaillierPrivateKey), Error> {
    for _ in 0..MAX_KEYGEN_ATTEMPTS {
        let p = random_prime(bits / 2);
        let q = random_prime(bits / 2);
        if p == q {
            continue;
        }

        let n = &p * &q;
        let nn = &n * &n;
        let g = &n + 1u32;
        let lambda = (&p - 1u32).lcm(&(&q - 1u32));

        // With g = n + 1 the invertibility of L(g^λ mod n²) is equivalent
        // to gcd(λ, n) = 1; a failed inverse means a degenerate prime pair.
        let l = l_function(&g.modpow(&lambda, &nn), &n);
        let mu = match l.modinv(&n) {
            Some(mu) => mu,
            None => continue,
        };

        info!("generated {}-bit Paillier key pair", bits);
        let public = PaillierPublicKey { n: n.clone(), g };
        let private = PaillierPrivateKey { lambda, mu, n };
        return Ok((public, private));
    }

    Err(Error::KeygenFailed(MAX_KEYGEN_ATTEMPTS))
}

/// Encrypt a vote-range integer under a fresh uniform nonce. Two calls with
/// the same plaintext yield different ciphertexts.
pub fn encrypt(public: &PaillierPublicKey, m: u64) -> Result<Ciphertext, Error> {
    let nonce = random_nonce(public);
    encrypt_with_nonce(public, m, &nonce)
}

/// Encrypt with a caller-held nonce, so the caller can later prove validity
/// of the ciphertext. c = g^m · r^n mod n².
pub fn encrypt_with_nonce(
    public: &PaillierPublicKey,
    m: u64,
    nonce: &BigUint,
) -> Result<Ciphertext, Error> {
    let m = BigUint::from(m);
    if m >= public.n {
        return Err(Error::PlaintextOutOfRange);
    }
    if nonce.is_zero() || *nonce >= public.n || !nonce.gcd(&public.n).is_one() {
        return Err(Error::InvalidNonce);
    }

    let nn = public.nn();
    let c = public.g.modpow(&m, &nn) * nonce.modpow(&public.n, &nn) % &nn;
    Ok(Ciphertext { c, exponent: 0 })
}

/// Uniform encryption nonce in [1, n) with gcd(r, n) = 1.
pub fn random_nonce(public: &PaillierPublicKey) -> BigUint {
    let mut rng = OsRng;
    loop {
        let r = rng.gen_biguint_range(&BigUint::one(), &public.n);
        if r.gcd(&public.n).is_one() {
            return r;
        }
    }
}

/// Decrypt a ciphertext: m = L(c^λ mod n²) · μ mod n.
///
/// Malformed input is an error, never a guessed plaintext.
pub fn decrypt(private: &PaillierPrivateKey, ciphertext: &Ciphertext) -> Result<BigUint, Error> {
    let nn = &private.n * &private.n;
    if ciphertext.c.is_zero() || ciphertext.c >= nn {
        return Err(Error::InvalidCiphertext);
    }
    if !ciphertext.c.gcd(&private.n).is_one() {
        return Err(Error::InvalidCiphertext);
    }

    let l = l_function(&ciphertext.c.modpow(&private.lambda, &nn), &private.n);
    Ok(l * &private.mu % &private.n)
}

/// Homomorphic addition: c1 · c2 mod n² encrypts m1 + m2. This identity is
/// the basis of both tallying and the sum proof, so it is computed exactly.
pub fn add(
    public: &PaillierPublicKey,
    c1: &Ciphertext,
    c2: &Ciphertext,
) -> Result<Ciphertext, Error> {
    if c1.exponent != c2.exponent {
        return Err(Error::CiphertextExponentMismatch(c1.exponent, c2.exponent));
    }
    let nn = public.nn();
    check_in_group(&c1.c, public, &nn)?;
    check_in_group(&c2.c, public, &nn)?;

    Ok(Ciphertext {
        c: &c1.c * &c2.c % &nn,
        exponent: c1.exponent,
    })
}

/// Fold `add` across a ballot's ciphertext vector, producing the encryption
/// of the component sum.
pub fn sum_ciphertexts(
    public: &PaillierPublicKey,
    ciphertexts: &[Ciphertext],
) -> Result<Ciphertext, Error> {
    let (first, rest) = ciphertexts
        .split_first()
        .ok_or(Error::BallotShape { expected: 1, found: 0 })?;

    check_in_group(&first.c, public, &public.nn())?;
    let mut acc = first.clone();
    for ciphertext in rest {
        acc = add(public, &acc, ciphertext)?;
    }
    Ok(acc)
}

/// L(x) = (x - 1) / n
fn l_function(x: &BigUint, n: &BigUint) -> BigUint {
    (x - 1u32) / n
}

fn check_in_group(c: &BigUint, public: &PaillierPublicKey, nn: &BigUint) -> Result<(), Error> {
    if c.is_zero() || c >= nn || !c.gcd(&public.n).is_one() {
        return Err(Error::InvalidCiphertext);
    }
    Ok(())
}

/// Random prime of exactly `bits` length (high bit forced), Miller-Rabin
/// tested. Shared by Paillier and RSA key generation.
pub(crate) fn random_prime(bits: usize) -> BigUint {
    let mut rng = OsRng;
    loop {
        let mut candidate = rng.gen_biguint(bits as u64);
        candidate.set_bit(bits as u64 - 1, true);
        candidate.set_bit(0, true);
        if is_prime(&candidate, Some(PrimalityTestConfig::default())).probably() {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::ToPrimitive;

    const TEST_KEY_BITS: usize = 256;

    #[test]
    fn encrypt_decrypt_round_trip() {
        let (public, private) = generate_keypair(TEST_KEY_BITS).unwrap();
        for m in &[0u64, 1] {
            let ciphertext = encrypt(&public, *m).unwrap();
            assert_eq!(decrypt(&private, &ciphertext).unwrap().to_u64(), Some(*m));
        }
    }

    #[test]
    fn encryption_is_randomized() {
        let (public, _) = generate_keypair(TEST_KEY_BITS).unwrap();
        let c1 = encrypt(&public, 1).unwrap();
        let c2 = encrypt(&public, 1).unwrap();
        assert_ne!(c1, c2);
    }

    #[test]
    fn homomorphic_addition() {
        let (public, private) = generate_keypair(TEST_KEY_BITS).unwrap();
        for (a, b) in &[(0u64, 0u64), (0, 1), (1, 0), (1, 1)] {
            let ca = encrypt(&public, *a).unwrap();
            let cb = encrypt(&public, *b).unwrap();
            let sum = add(&public, &ca, &cb).unwrap();
            assert_eq!(decrypt(&private, &sum).unwrap().to_u64(), Some(a + b));
        }
    }

    #[test]
    fn sum_of_vector() {
        let (public, private) = generate_keypair(TEST_KEY_BITS).unwrap();
        let ciphertexts: Vec<Ciphertext> = [1u64, 0, 1, 1]
            .iter()
            .map(|m| encrypt(&public, *m).unwrap())
            .collect();
        let sum = sum_ciphertexts(&public, &ciphertexts).unwrap();
        assert_eq!(decrypt(&private, &sum).unwrap().to_u64(), Some(3));
    }

    #[test]
    fn rejects_malformed_ciphertext() {
        let (public, private) = generate_keypair(TEST_KEY_BITS).unwrap();

        let zero = Ciphertext { c: BigUint::zero(), exponent: 0 };
        assert!(matches!(decrypt(&private, &zero), Err(Error::InvalidCiphertext)));

        let out_of_range = Ciphertext { c: public.nn() + 1u32, exponent: 0 };
        assert!(matches!(decrypt(&private, &out_of_range), Err(Error::InvalidCiphertext)));

        // Shares a factor with n, so it is outside the unit group.
        let non_unit = Ciphertext { c: public.n.clone(), exponent: 0 };
        assert!(matches!(decrypt(&private, &non_unit), Err(Error::InvalidCiphertext)));
    }

    #[test]
    fn rejects_exponent_mismatch() {
        let (public, _) = generate_keypair(TEST_KEY_BITS).unwrap();
        let c1 = encrypt(&public, 1).unwrap();
        let mut c2 = encrypt(&public, 0).unwrap();
        c2.exponent = -4;
        assert!(matches!(
            add(&public, &c1, &c2),
            Err(Error::CiphertextExponentMismatch(0, -4))
        ));
    }

    #[test]
    fn private_key_never_in_public_shape() {
        let (public, _) = generate_keypair(TEST_KEY_BITS).unwrap();
        let json = serde_json::to_value(&public).unwrap();
        let fields: Vec<&String> = json.as_object().unwrap().keys().collect();
        assert_eq!(fields, vec!["n", "g"]);
    }
}
