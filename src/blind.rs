use crate::*;

use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::One;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

const TOKEN_HASH_DOMAIN: &[u8] = b"pollcrypt-voting-token-v1";
const RSA_PUBLIC_EXPONENT: u32 = 65537;

/// RSA key pair used exclusively for blind token signatures. The private
/// exponent never leaves this struct; the only operation performed with it
/// is `sign_blinded`, which receives a content-free blinded integer.
#[derive(Clone)]
pub struct RsaKeyPair {
    n: BigUint,
    e: BigUint,
    d: BigUint,
}

impl RsaKeyPair {
    /// Generate an RSA key pair with e = 65537 and a bounded retry on
    /// degenerate prime pairs.
    pub fn generate(bits: usize) -> Result<Self, Error> {
        let e = BigUint::from(RSA_PUBLIC_EXPONENT);
        for _ in 0..MAX_KEYGEN_ATTEMPTS {
            let p = random_prime(bits / 2);
            let q = random_prime(bits / 2);
            if p == q {
                continue;
            }

            let n = &p * &q;
            let phi = (&p - 1u32) * (&q - 1u32);
            if !e.gcd(&phi).is_one() {
                continue;
            }
            let d = match e.modinv(&phi) {
                Some(d) => d,
                None => continue,
            };

            info!("generated {}-bit RSA key pair for blind signatures", bits);
            return Ok(RsaKeyPair { n, e: e.clone(), d });
        }

        Err(Error::KeygenFailed(MAX_KEYGEN_ATTEMPTS))
    }

    /// Sign an opaque blinded integer: blinded^d mod n.
    ///
    /// This is the only private-key operation the server performs for a
    /// token request. The input is reduced mod n and nothing about the
    /// originating message is read or inferred, so an unblinded signature
    /// cannot later be correlated with this call.
    pub fn sign_blinded(&self, blinded: &BigUint) -> BigUint {
        let reduced = blinded % &self.n;
        reduced.modpow(&self.d, &self.n)
    }

    /// The distributable public half {n, e}.
    pub fn public_components(&self) -> RsaPublicComponents {
        RsaPublicComponents {
            n: self.n.clone(),
            e: self.e.clone(),
        }
    }

    pub fn modulus(&self) -> &BigUint {
        &self.n
    }
}

/// Public RSA components {n, e}, the shape published to clients.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicComponents {
    #[serde(with = "biguint_hex")]
    pub n: BigUint,

    #[serde(with = "biguint_hex")]
    pub e: BigUint,
}

impl RsaPublicComponents {
    /// Verify an unblinded token signature: signature^e mod n == H(message).
    /// Pure and stateless.
    pub fn verify(&self, message: &[u8], signature: &BigUint) -> bool {
        signature.modpow(&self.e, &self.n) == hash_to_int(&self.n, message)
    }

    /// Client-side blinding: blinded = H(message) · k^e mod n for a uniform
    /// unit k. Runs outside the server trust boundary by design; it lives
    /// here so tests and clients share one implementation. Returns the
    /// blinded integer and the unblinding factor k.
    pub fn blind(&self, message: &[u8]) -> (BigUint, BigUint) {
        let digest = hash_to_int(&self.n, message);
        let mut rng = OsRng;
        loop {
            let k = rng.gen_biguint_range(&BigUint::one(), &self.n);
            if !k.gcd(&self.n).is_one() {
                continue;
            }
            let blinded = digest.clone() * k.modpow(&self.e, &self.n) % &self.n;
            return (blinded, k);
        }
    }

    /// Client-side unblinding: signature = blind_signature · k⁻¹ mod n.
    pub fn unblind(&self, blind_signature: &BigUint, unblinder: &BigUint) -> Result<BigUint, Error> {
        let k_inv = unblinder.modinv(&self.n).ok_or(Error::InvalidNonce)?;
        Ok(blind_signature * k_inv % &self.n)
    }
}

/// Domain-separated message hash reduced into Z_n:
/// SHA-256(tag ‖ message) interpreted big-endian, mod n.
pub fn hash_to_int(n: &BigUint, message: &[u8]) -> BigUint {
    let mut hasher = Sha256::new();
    hasher.update(TOKEN_HASH_DOMAIN);
    hasher.update(message);
    BigUint::from_bytes_be(&hasher.finalize()) % n
}

/// Hex SHA-256 of a signature integer; the consumption key for the
/// used-token set.
pub fn signature_hash(signature: &BigUint) -> String {
    sha256_hex(&signature.to_bytes_be())
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY_BITS: usize = 512;

    #[test]
    fn blind_sign_verify_round_trip() {
        let keypair = RsaKeyPair::generate(TEST_KEY_BITS).unwrap();
        let public = keypair.public_components();

        let message = b"anonymous ballot token 42";
        let (blinded, unblinder) = public.blind(message);

        // The server only ever sees `blinded`.
        assert_ne!(blinded, hash_to_int(&public.n, message));

        let blind_signature = keypair.sign_blinded(&blinded);
        let signature = public.unblind(&blind_signature, &unblinder).unwrap();

        assert!(public.verify(message, &signature));
        assert!(!public.verify(b"a different message", &signature));
    }

    #[test]
    fn rejects_forged_signature() {
        let keypair = RsaKeyPair::generate(TEST_KEY_BITS).unwrap();
        let public = keypair.public_components();
        let forged = BigUint::from(123456789u64);
        assert!(!public.verify(b"anything", &forged));
    }

    #[test]
    fn sign_blinded_reduces_oversized_input() {
        let keypair = RsaKeyPair::generate(TEST_KEY_BITS).unwrap();
        let oversized = keypair.modulus() * 3u32 + 7u32;
        let reduced = BigUint::from(7u32);
        assert_eq!(keypair.sign_blinded(&oversized), keypair.sign_blinded(&reduced));
    }

    #[test]
    fn blinding_is_randomized() {
        let keypair = RsaKeyPair::generate(TEST_KEY_BITS).unwrap();
        let public = keypair.public_components();
        let (b1, _) = public.blind(b"same message");
        let (b2, _) = public.blind(b"same message");
        assert_ne!(b1, b2);
    }
}
