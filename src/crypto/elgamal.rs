use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::Add;
use thiserror::Error;

use crate::crypto::{PublicKey, SecretKey};

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Value cannot be encoded into the plaintext space: {0}")]
    EncodingFailed(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    #[error("Malformed key material: {0}")]
    MalformedKey(String),
}

/// An exponential-ElGamal ciphertext `(r*G, m*G + r*P)`.
///
/// Component-wise addition of two ciphertexts yields a ciphertext of the
/// sum of the plaintexts, which is the homomorphic property relays use to
/// combine swarm-aggregate values without decryption.
#[derive(Clone, PartialEq, Eq)]
pub struct Ciphertext {
    c1: RistrettoPoint,
    c2: RistrettoPoint,
}

impl Ciphertext {
    pub(crate) fn c1(&self) -> &RistrettoPoint {
        &self.c1
    }

    pub(crate) fn c2(&self) -> &RistrettoPoint {
        &self.c2
    }

    /// Homomorphically combines two ciphertexts into an encryption of the
    /// sum of their plaintexts.
    pub fn combine(&self, other: &Ciphertext) -> Ciphertext {
        Ciphertext {
            c1: self.c1 + other.c1,
            c2: self.c2 + other.c2,
        }
    }

    /// Converts the ciphertext to a 64-byte array for storage or transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(64);
        buffer.extend_from_slice(self.c1.compress().as_bytes());
        buffer.extend_from_slice(self.c2.compress().as_bytes());
        buffer
    }

    /// Creates a ciphertext from a byte array
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 64 {
            return Err(CryptoError::MalformedCiphertext(format!(
                "Expected 64 bytes, got {}",
                bytes.len()
            )));
        }

        let c1_bytes: [u8; 32] = bytes[0..32]
            .try_into()
            .map_err(|_| CryptoError::MalformedCiphertext("Failed to extract c1".to_string()))?;
        let c2_bytes: [u8; 32] = bytes[32..64]
            .try_into()
            .map_err(|_| CryptoError::MalformedCiphertext("Failed to extract c2".to_string()))?;

        let c1 = CompressedRistretto(c1_bytes)
            .decompress()
            .ok_or_else(|| CryptoError::MalformedCiphertext("Invalid point c1".to_string()))?;
        let c2 = CompressedRistretto(c2_bytes)
            .decompress()
            .ok_or_else(|| CryptoError::MalformedCiphertext("Invalid point c2".to_string()))?;

        Ok(Self { c1, c2 })
    }
}

impl Add for &Ciphertext {
    type Output = Ciphertext;

    fn add(self, other: &Ciphertext) -> Ciphertext {
        self.combine(other)
    }
}

impl Serialize for Ciphertext {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_bytes().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Ciphertext {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        Ciphertext::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Ciphertext({}...)",
            hex::encode(&self.c1.compress().as_bytes()[0..4])
        )
    }
}

/// Encrypts an integer under the given public key.
///
/// Fails with `EncodingFailed` if the value does not fit the key's
/// plaintext space. No network side effect.
pub fn encrypt(public_key: &PublicKey, value: u64) -> Result<Ciphertext, CryptoError> {
    let (ciphertext, _) = encrypt_with_randomness(public_key, value)?;
    Ok(ciphertext)
}

/// Encrypts an integer and also returns the encryption randomness.
///
/// The randomness is the private witness for the knowledge-of-value
/// proof that accompanies a stored record; it must never be transmitted.
pub fn encrypt_with_randomness(
    public_key: &PublicKey,
    value: u64,
) -> Result<(Ciphertext, Scalar), CryptoError> {
    let bits = public_key.plaintext_bits();
    if bits < 64 && value >= (1u64 << bits) {
        return Err(CryptoError::EncodingFailed(format!(
            "Value {} exceeds the {}-bit plaintext space",
            value, bits
        )));
    }

    let randomness = Scalar::random(&mut rand::thread_rng());
    let c1 = randomness * RISTRETTO_BASEPOINT_POINT;
    let c2 = Scalar::from(value) * RISTRETTO_BASEPOINT_POINT + randomness * public_key.point();

    Ok((Ciphertext { c1, c2 }, randomness))
}

/// Decrypts a ciphertext produced under this node's public key.
///
/// Fails with `DecryptionFailed` if the ciphertext was produced under a
/// different key or is otherwise not an encryption of a representable value.
pub fn decrypt(secret_key: &SecretKey, ciphertext: &Ciphertext) -> Result<u64, CryptoError> {
    secret_key.decrypt(ciphertext)
}

/// Baby-step/giant-step table for recovering `m` from `m*G` when `m` is
/// bounded by the plaintext space.
#[derive(Clone)]
pub(crate) struct DlogTable {
    /// Baby steps: `j*G -> j` for `j < 2^half_bits`
    baby: HashMap<[u8; 32], u64>,

    /// Giant step `2^half_bits * G`
    giant: RistrettoPoint,

    /// Number of giant steps to try
    giant_steps: u64,

    /// Baby-step stride
    stride: u64,
}

impl DlogTable {
    pub(crate) fn new(plaintext_bits: u32) -> Self {
        let half_bits = (plaintext_bits + 1) / 2;
        let stride = 1u64 << half_bits;
        let giant_steps = 1u64 << (plaintext_bits - half_bits);

        let mut baby = HashMap::with_capacity(stride as usize);
        let mut current = RistrettoPoint::identity();
        for j in 0..stride {
            baby.insert(current.compress().to_bytes(), j);
            current += RISTRETTO_BASEPOINT_POINT;
        }

        let giant = Scalar::from(stride) * RISTRETTO_BASEPOINT_POINT;

        Self {
            baby,
            giant,
            giant_steps,
            stride,
        }
    }

    /// Solves `target = m*G` for `m` within the table's range.
    pub(crate) fn solve(&self, target: &RistrettoPoint) -> Option<u64> {
        let mut current = *target;
        for i in 0..self.giant_steps {
            if let Some(j) = self.baby.get(&current.compress().to_bytes()) {
                return Some(i * self.stride + j);
            }
            current -= self.giant;
        }
        None
    }
}
