use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::crypto::{Ciphertext, Commitment, PublicKey};
use crate::obfuscate::ObfuscatedId;

#[derive(Error, Debug)]
pub enum ProofError {
    #[error("Witness encoding failed: {0}")]
    EncodingFailed(String),

    #[error("Proof generation failed: {0}")]
    GenerationFailed(String),

    #[error("Proof generation timed out after {0:?}")]
    Timeout(Duration),
}

/// The four statement families the proof subsystem supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitKind {
    /// Knowledge of a hidden value behind a public commitment (and,
    /// for stored records, that an accompanying ciphertext encrypts it)
    KnowledgeOfValue,

    /// Possession of the data for a specific piece index
    PiecePossession,

    /// Possession consistent with a committed have-set bitfield
    HaveSetPossession,

    /// Possession consistent with a complete file commitment
    CompleteFilePossession,
}

impl CircuitKind {
    /// Transcript domain tag for this circuit kind.
    pub fn tag(&self) -> &'static [u8] {
        match self {
            CircuitKind::KnowledgeOfValue => b"knowledge-of-value",
            CircuitKind::PiecePossession => b"piece-possession",
            CircuitKind::HaveSetPossession => b"have-set-possession",
            CircuitKind::CompleteFilePossession => b"complete-file-possession",
        }
    }
}

impl fmt::Display for CircuitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(self.tag()))
    }
}

/// A non-interactive proof together with its public context.
///
/// `public_signals` is an ordered list of field elements; the first is
/// always the relevant commitment, so a verifier can perform a cheap
/// local equality check before any curve arithmetic. Bundles are
/// immutable after creation.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    pub circuit_kind: CircuitKind,

    /// Backend-specific proof bytes
    pub proof: Vec<u8>,

    /// Ordered public signals; `public_signals[0]` is the commitment
    pub public_signals: Vec<[u8; 32]>,

    /// The commitment this proof is anchored on
    pub commitment: Commitment,
}

impl ProofBundle {
    /// Serializes the bundle for transmission
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProofError> {
        bincode::serialize(self).map_err(|e| ProofError::EncodingFailed(e.to_string()))
    }

    /// Deserializes a bundle received from a peer
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProofError> {
        bincode::deserialize(bytes).map_err(|e| ProofError::EncodingFailed(e.to_string()))
    }
}

impl fmt::Debug for ProofBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProofBundle")
            .field("circuit_kind", &self.circuit_kind)
            .field("proof", &format!("[{} bytes]", self.proof.len()))
            .field("public_signals", &self.public_signals.len())
            .field("commitment", &self.commitment)
            .finish()
    }
}

/// Private inputs for one proof generation request.
///
/// Witness data stays on the prover side; only the resulting bundle
/// crosses a trust boundary.
pub enum Witness {
    /// A stored (key, value) pair and the ciphertext that hides the
    /// value. Produces a `KnowledgeOfValue` bundle proving the
    /// ciphertext is a correct encryption of the committed value.
    ValueEncryption {
        public_key: PublicKey,
        ciphertext: Ciphertext,
        randomness: curve25519_dalek::scalar::Scalar,
        key: Vec<u8>,
        value: u64,
    },

    /// Knowledge of a real identifier behind its obfuscated routing
    /// form. Produces a `KnowledgeOfValue` bundle an announce observer
    /// can verify without learning the identifier.
    IdentifierKnowledge {
        real_id: Vec<u8>,
        obfuscated: ObfuscatedId,
    },

    /// Possession of one piece of a file.
    Piece { index: u32, data: Vec<u8> },

    /// The prover's current have-set.
    HaveSet { bitfield: Vec<bool> },

    /// Possession of a complete file.
    CompleteFile { data: Vec<u8> },
}

impl Witness {
    pub fn circuit_kind(&self) -> CircuitKind {
        match self {
            Witness::ValueEncryption { .. } | Witness::IdentifierKnowledge { .. } => {
                CircuitKind::KnowledgeOfValue
            }
            Witness::Piece { .. } => CircuitKind::PiecePossession,
            Witness::HaveSet { .. } => CircuitKind::HaveSetPossession,
            Witness::CompleteFile { .. } => CircuitKind::CompleteFilePossession,
        }
    }
}

/// The abstract prover/verifier capability.
///
/// The façade and engine depend only on this seam, so the concrete
/// sigma-protocol backend can be swapped for another NIZK scheme
/// without touching the DHT layer.
pub trait ProofSystem: Send + Sync {
    /// Constructs a proof bundle from private inputs. Deterministic
    /// witness encoding, probabilistic proof.
    fn prove(&self, witness: &Witness) -> Result<ProofBundle, ProofError>;

    /// Cryptographically verifies a bundle against its own public
    /// signals. A boolean predicate: invalid proofs are `false`,
    /// never an error.
    fn verify(&self, bundle: &ProofBundle) -> bool;

    /// Checks that a knowledge-of-value bundle's statement is about
    /// exactly this ciphertext under this public key, so a relay cannot
    /// pair a valid proof with a swapped ciphertext. Cheap byte
    /// comparison, no curve arithmetic.
    fn binds_encryption(
        &self,
        bundle: &ProofBundle,
        public_key: &PublicKey,
        ciphertext: &Ciphertext,
    ) -> bool;
}

/// Per-item outcome of a batch verification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOutcome {
    pub commitment: Commitment,
    pub is_valid: bool,
}
