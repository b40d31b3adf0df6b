use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use zeroize::Zeroize;

use crate::crypto::elgamal::{Ciphertext, CryptoError, DlogTable};

/// Default bit length of the representable plaintext space.
pub const DEFAULT_PLAINTEXT_BITS: u32 = 32;

/// Upper bound on the plaintext space so bounded discrete-log recovery
/// stays tractable.
pub const MAX_PLAINTEXT_BITS: u32 = 40;

/// Represents a public encryption key in the VeilDHT system.
///
/// Anyone holding the public key can produce ciphertexts; only the
/// matching [`SecretKey`] can decrypt them.
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    /// ElGamal public point `x * G`
    point: RistrettoPoint,

    /// Bit length of the plaintext space this key was generated for
    plaintext_bits: u32,
}

impl PublicKey {
    pub(crate) fn new(point: RistrettoPoint, plaintext_bits: u32) -> Self {
        Self {
            point,
            plaintext_bits,
        }
    }

    /// Returns the ElGamal public point.
    pub(crate) fn point(&self) -> &RistrettoPoint {
        &self.point
    }

    /// Returns the bit length of the plaintext space.
    pub fn plaintext_bits(&self) -> u32 {
        self.plaintext_bits
    }

    /// Converts the public key to a byte array for storage or transmission
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(36);
        buffer.extend_from_slice(self.point.compress().as_bytes());
        buffer.extend_from_slice(&self.plaintext_bits.to_le_bytes());
        buffer
    }

    /// Creates a public key from a byte array
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 36 {
            return Err(CryptoError::MalformedKey(format!(
                "Expected 36 bytes, got {}",
                bytes.len()
            )));
        }

        let point_bytes: [u8; 32] = bytes[0..32]
            .try_into()
            .map_err(|_| CryptoError::MalformedKey("Failed to extract point".to_string()))?;
        let point = CompressedRistretto(point_bytes)
            .decompress()
            .ok_or_else(|| CryptoError::MalformedKey("Invalid Ristretto point".to_string()))?;

        let bits_bytes: [u8; 4] = bytes[32..36]
            .try_into()
            .map_err(|_| CryptoError::MalformedKey("Failed to extract bit length".to_string()))?;
        let plaintext_bits = u32::from_le_bytes(bits_bytes);

        if plaintext_bits == 0 || plaintext_bits > MAX_PLAINTEXT_BITS {
            return Err(CryptoError::MalformedKey(format!(
                "Plaintext bit length {} out of range",
                plaintext_bits
            )));
        }

        Ok(Self {
            point,
            plaintext_bits,
        })
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_bytes().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        PublicKey::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PublicKey({}...)",
            hex::encode(&self.point.compress().as_bytes()[0..4])
        )
    }
}

/// Represents a secret decryption key in the VeilDHT system.
///
/// Owned exclusively by the local node, generated once at startup and
/// never transmitted. Regenerating a keypair invalidates all ciphertexts
/// previously stored under the old public key; that is an operational
/// invariant, not an error condition.
pub struct SecretKey {
    /// ElGamal secret scalar
    scalar: Scalar,

    /// Bit length of the plaintext space
    plaintext_bits: u32,

    /// Lookup table for bounded discrete-log recovery, built on first use
    table: OnceLock<DlogTable>,
}

impl SecretKey {
    pub(crate) fn new(scalar: Scalar, plaintext_bits: u32) -> Self {
        Self {
            scalar,
            plaintext_bits,
            table: OnceLock::new(),
        }
    }

    /// Decrypts a ciphertext produced under this key's public half.
    pub fn decrypt(&self, ciphertext: &Ciphertext) -> Result<u64, CryptoError> {
        // Recover M = c2 - x*c1 = m*G, then solve the bounded discrete log.
        let message_point = ciphertext.c2() - self.scalar * ciphertext.c1();

        let table = self
            .table
            .get_or_init(|| DlogTable::new(self.plaintext_bits));

        table.solve(&message_point).ok_or_else(|| {
            CryptoError::DecryptionFailed(
                "Plaintext not in the representable space (wrong key or malformed ciphertext)"
                    .to_string(),
            )
        })
    }

    /// Converts the secret key to a byte array for storage
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer = Vec::with_capacity(36);
        buffer.extend_from_slice(&self.scalar.to_bytes());
        buffer.extend_from_slice(&self.plaintext_bits.to_le_bytes());
        buffer
    }

    /// Creates a secret key from a byte array
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 36 {
            return Err(CryptoError::MalformedKey(format!(
                "Expected 36 bytes, got {}",
                bytes.len()
            )));
        }

        let scalar_bytes: [u8; 32] = bytes[0..32]
            .try_into()
            .map_err(|_| CryptoError::MalformedKey("Failed to extract scalar".to_string()))?;
        let scalar: Option<Scalar> = Scalar::from_canonical_bytes(scalar_bytes).into();
        let scalar =
            scalar.ok_or_else(|| CryptoError::MalformedKey("Non-canonical scalar".to_string()))?;

        let bits_bytes: [u8; 4] = bytes[32..36]
            .try_into()
            .map_err(|_| CryptoError::MalformedKey("Failed to extract bit length".to_string()))?;
        let plaintext_bits = u32::from_le_bytes(bits_bytes);

        if plaintext_bits == 0 || plaintext_bits > MAX_PLAINTEXT_BITS {
            return Err(CryptoError::MalformedKey(format!(
                "Plaintext bit length {} out of range",
                plaintext_bits
            )));
        }

        Ok(Self::new(scalar, plaintext_bits))
    }
}

impl Clone for SecretKey {
    fn clone(&self) -> Self {
        // The dlog table is key-independent; let the clone rebuild it lazily.
        Self::new(self.scalar, self.plaintext_bits)
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.scalar.zeroize();
    }
}

impl Serialize for SecretKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_bytes().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = Vec::<u8>::deserialize(deserializer)?;
        SecretKey::from_bytes(&bytes).map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey {{ <redacted> }}")
    }
}

/// Represents a key pair (public and secret keys) for the homomorphic
/// encryption scheme. 1:1 with a node instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPair {
    pub public: PublicKey,
    pub secret: SecretKey,
}

impl KeyPair {
    /// Generates a new random key pair with the default plaintext space.
    pub fn generate() -> Result<Self, CryptoError> {
        Self::generate_with_bits(DEFAULT_PLAINTEXT_BITS)
    }

    /// Generates a new random key pair.
    ///
    /// `plaintext_bits` is the security/capacity parameter: values up to
    /// `2^plaintext_bits - 1` can be encrypted and recovered.
    pub fn generate_with_bits(plaintext_bits: u32) -> Result<Self, CryptoError> {
        if plaintext_bits == 0 || plaintext_bits > MAX_PLAINTEXT_BITS {
            return Err(CryptoError::MalformedKey(format!(
                "Plaintext bit length must be in 1..={}, got {}",
                MAX_PLAINTEXT_BITS, plaintext_bits
            )));
        }

        let scalar = Scalar::random(&mut rand::thread_rng());
        let point = scalar * RISTRETTO_BASEPOINT_POINT;

        Ok(Self {
            public: PublicKey::new(point, plaintext_bits),
            secret: SecretKey::new(scalar, plaintext_bits),
        })
    }

    /// Creates a key pair from an existing secret key
    pub fn from_secret(secret: SecretKey) -> Self {
        let point = secret.scalar * RISTRETTO_BASEPOINT_POINT;
        let public = PublicKey::new(point, secret.plaintext_bits);

        Self { public, secret }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_generation() {
        let keypair = KeyPair::generate().expect("Failed to generate keypair");

        assert_eq!(keypair.public.plaintext_bits(), DEFAULT_PLAINTEXT_BITS);
    }

    #[test]
    fn test_public_key_serialization() {
        let keypair = KeyPair::generate().expect("Failed to generate keypair");

        let bytes = keypair.public.to_bytes();
        let deserialized = PublicKey::from_bytes(&bytes).expect("Failed to deserialize public key");

        assert_eq!(keypair.public, deserialized);
    }

    #[test]
    fn test_secret_key_round_trip() {
        let keypair = KeyPair::generate().expect("Failed to generate keypair");

        let bytes = keypair.secret.to_bytes();
        let restored = SecretKey::from_bytes(&bytes).expect("Failed to deserialize secret key");
        let rebuilt = KeyPair::from_secret(restored);

        assert_eq!(keypair.public, rebuilt.public);
    }

    #[test]
    fn test_rejects_oversized_parameter() {
        assert!(KeyPair::generate_with_bits(MAX_PLAINTEXT_BITS + 1).is_err());
        assert!(KeyPair::generate_with_bits(0).is_err());
    }
}
