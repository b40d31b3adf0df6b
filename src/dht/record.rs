use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::Ciphertext;
use crate::proofs::ProofBundle;

/// Wire format version for stored records.
pub const RECORD_VERSION: u16 = 1;

#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Record codec error: {0}")]
    Codec(String),

    #[error("Unsupported record version: {0}")]
    UnsupportedVersion(u16),
}

/// The unit stored in the base overlay under an obfuscated key: the
/// ciphertext together with a knowledge proof whose ordered public
/// signals start with the relevant commitment.
///
/// A record is written only by the holder of the encrypting public key;
/// anyone holding the overlay key may read it, but only the matching
/// secret key decrypts it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncryptedRecord {
    /// Wire format version, for forward-compatible decoding
    pub version: u16,

    /// The homomorphic ciphertext hiding the stored value
    pub ciphertext: Ciphertext,

    /// Knowledge-of-value proof anchored on the key commitment
    pub proof: ProofBundle,
}

impl EncryptedRecord {
    pub fn new(ciphertext: Ciphertext, proof: ProofBundle) -> Self {
        Self {
            version: RECORD_VERSION,
            ciphertext,
            proof,
        }
    }

    /// Serializes the record for storage in the overlay
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        bincode::serialize(self).map_err(|e| RecordError::Codec(e.to_string()))
    }

    /// Decodes a record fetched from the overlay
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        let record: EncryptedRecord =
            bincode::deserialize(bytes).map_err(|e| RecordError::Codec(e.to_string()))?;

        if record.version != RECORD_VERSION {
            return Err(RecordError::UnsupportedVersion(record.version));
        }
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{encrypt_with_randomness, KeyPair};
    use crate::proofs::{ProofSystem, SchnorrBackend, Witness};

    #[test]
    fn test_record_wire_round_trip() {
        let keypair = KeyPair::generate_with_bits(16).unwrap();
        let (ciphertext, randomness) = encrypt_with_randomness(&keypair.public, 42).unwrap();

        let proof = SchnorrBackend::new()
            .prove(&Witness::ValueEncryption {
                public_key: keypair.public.clone(),
                ciphertext: ciphertext.clone(),
                randomness,
                key: b"k1".to_vec(),
                value: 42,
            })
            .unwrap();

        let record = EncryptedRecord::new(ciphertext, proof);
        let bytes = record.to_bytes().unwrap();
        let restored = EncryptedRecord::from_bytes(&bytes).unwrap();

        assert_eq!(restored.version, RECORD_VERSION);
        assert_eq!(restored.ciphertext, record.ciphertext);
        assert_eq!(restored.proof, record.proof);
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let keypair = KeyPair::generate_with_bits(16).unwrap();
        let (ciphertext, randomness) = encrypt_with_randomness(&keypair.public, 1).unwrap();

        let proof = SchnorrBackend::new()
            .prove(&Witness::ValueEncryption {
                public_key: keypair.public.clone(),
                ciphertext: ciphertext.clone(),
                randomness,
                key: b"k".to_vec(),
                value: 1,
            })
            .unwrap();

        let mut record = EncryptedRecord::new(ciphertext, proof);
        record.version = 99;

        let bytes = bincode::serialize(&record).unwrap();
        assert!(matches!(
            EncryptedRecord::from_bytes(&bytes),
            Err(RecordError::UnsupportedVersion(99))
        ));
    }
}
