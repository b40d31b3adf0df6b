use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::crypto::{decrypt, encrypt_with_randomness, Commitment, CryptoError, KeyPair, PublicKey};
use crate::dht::{EncryptedRecord, NodeDescriptor, Overlay, OverlayError, RecordError};
use crate::obfuscate::{obfuscate, ObfuscatedId};
use crate::proofs::{
    BatchOutcome, ProofBundle, ProofEngine, ProofEngineConfig, ProofError, SchnorrBackend, Witness,
};

#[derive(Error, Debug)]
pub enum DhtError {
    #[error("Overlay operation failed: {0}")]
    Overlay(#[from] OverlayError),

    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Proof error: {0}")]
    Proof(#[from] ProofError),

    #[error("Record codec error: {0}")]
    Record(#[from] RecordError),
}

/// Configuration for the privacy-preserving DHT façade
#[derive(Clone, Debug)]
pub struct PrivateDhtConfig {
    /// Number of proof workers; 0 sizes to available cores
    pub proof_workers: usize,

    /// Wall-clock budget per proof generation
    pub proof_timeout: Duration,

    /// Verification cache entry lifetime
    pub cache_ttl: Duration,

    /// Verification cache capacity
    pub cache_capacity: usize,
}

impl Default for PrivateDhtConfig {
    fn default() -> Self {
        Self {
            proof_workers: 0,
            proof_timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 1024,
        }
    }
}

/// Acknowledgement of an announce, carrying the knowledge proof third
/// parties can verify against the obfuscated info-hash alone.
#[derive(Clone, Debug)]
pub struct AnnounceReceipt {
    pub obfuscated: ObfuscatedId,
    pub proof: ProofBundle,
}

/// The privacy-preserving DHT façade.
///
/// Composes (rather than extends) an injected base overlay: every
/// operation obfuscates identifiers, runs the confidentiality layer
/// and/or proof subsystem, then delegates the network step to the
/// overlay. Each call is independent; the only long-lived state is the
/// node keypair and the overlay reference. Concurrent puts on the same
/// key resolve by the overlay's own semantics, and overlay failures
/// pass through unmodified - retry policy belongs to the caller.
pub struct PrivateDht<O: Overlay> {
    keypair: Arc<KeyPair>,
    overlay: Arc<O>,
    engine: ProofEngine,
}

impl<O: Overlay> PrivateDht<O> {
    pub fn new(keypair: KeyPair, overlay: O, config: PrivateDhtConfig) -> Self {
        let engine = ProofEngine::new(
            Arc::new(SchnorrBackend::new()),
            ProofEngineConfig {
                workers: config.proof_workers,
                generation_timeout: config.proof_timeout,
                cache_ttl: config.cache_ttl,
                cache_capacity: config.cache_capacity,
            },
        );

        info!("Private DHT façade initialized");

        Self {
            keypair: Arc::new(keypair),
            overlay: Arc::new(overlay),
            engine,
        }
    }

    /// The node's public encryption key.
    pub fn public_key(&self) -> &PublicKey {
        &self.keypair.public
    }

    /// The proof engine, for callers that verify proofs received out of
    /// band (piece exchange, announce observation).
    pub fn engine(&self) -> &ProofEngine {
        &self.engine
    }

    /// Encrypts a value, proves knowledge of it, and stores the record
    /// in the overlay under the obfuscated key.
    pub async fn put(&self, key: &[u8], value: u64) -> Result<(), DhtError> {
        let (ciphertext, randomness) = encrypt_with_randomness(&self.keypair.public, value)?;

        let proof = self
            .engine
            .generate(Witness::ValueEncryption {
                public_key: self.keypair.public.clone(),
                ciphertext: ciphertext.clone(),
                randomness,
                key: key.to_vec(),
                value,
            })
            .await?;

        let record = EncryptedRecord::new(ciphertext, proof);
        let obfuscated = obfuscate(key);

        debug!("Storing record under {}", obfuscated);
        self.overlay
            .store(obfuscated.as_bytes(), &record.to_bytes()?)
            .await?;
        Ok(())
    }

    /// Fetches and decrypts the value stored under a key.
    ///
    /// Returns `None` both when the key is absent and when the attached
    /// proof fails verification; the two cases are deliberately not
    /// distinguishable to the caller. Rejections are logged so an
    /// operator can still tell them apart locally.
    pub async fn get(&self, key: &[u8]) -> Result<Option<u64>, DhtError> {
        let obfuscated = obfuscate(key);

        let Some(bytes) = self.overlay.fetch(obfuscated.as_bytes()).await? else {
            return Ok(None);
        };

        let record = match EncryptedRecord::from_bytes(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!("Discarding undecodable record under {}: {}", obfuscated, e);
                return Ok(None);
            }
        };

        // The proof must be anchored on this exact key, and its
        // statement must bind the record's own ciphertext under our key.
        let expected = Commitment::of_bytes(key);
        if !self
            .engine
            .binds_encryption(&record.proof, &self.keypair.public, &record.ciphertext)
        {
            warn!("Record under {} carries a proof for a different ciphertext", obfuscated);
            return Ok(None);
        }
        if !self.engine.verify(&record.proof, &expected).await {
            warn!("Rejecting record under {} with invalid proof", obfuscated);
            return Ok(None);
        }

        match decrypt(&self.keypair.secret, &record.ciphertext) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!("Record under {} did not decrypt: {}", obfuscated, e);
                Ok(None)
            }
        }
    }

    /// Announces this node for an info-hash, returning the overlay
    /// acknowledgement together with a proof that the announcer knows
    /// the real info-hash behind the obfuscated one.
    pub async fn announce(&self, info_hash: &[u8], port: u16) -> Result<AnnounceReceipt, DhtError> {
        let obfuscated = obfuscate(info_hash);

        let proof = self
            .engine
            .generate(Witness::IdentifierKnowledge {
                real_id: info_hash.to_vec(),
                obfuscated,
            })
            .await?;

        debug!("Announcing {} on port {}", obfuscated, port);
        self.overlay.announce(obfuscated.as_bytes(), port).await?;

        Ok(AnnounceReceipt { obfuscated, proof })
    }

    /// Looks up nodes close to an identifier.
    ///
    /// The returned descriptors carry obfuscated identifiers only; the
    /// transform is one-way, and no inverse is claimed. They remain
    /// directly usable for further routing.
    pub async fn find_node(&self, id: &[u8]) -> Result<Vec<NodeDescriptor>, DhtError> {
        let obfuscated = obfuscate(id);
        let nodes = self.overlay.lookup(obfuscated.as_bytes()).await?;
        debug!("Lookup for {} returned {} nodes", obfuscated, nodes.len());
        Ok(nodes)
    }

    /// Proves possession of one piece of a file.
    pub async fn generate_piece_proof(
        &self,
        index: u32,
        data: &[u8],
    ) -> Result<ProofBundle, ProofError> {
        self.engine
            .generate(Witness::Piece {
                index,
                data: data.to_vec(),
            })
            .await
    }

    /// Verifies a piece proof against the expected commitment and index.
    pub async fn verify_piece_proof(
        &self,
        bundle: &ProofBundle,
        expected: &Commitment,
        expected_index: u32,
    ) -> bool {
        self.engine
            .verify_piece(bundle, expected, expected_index)
            .await
    }

    /// Proves the node's current have-set.
    pub async fn generate_have_set_proof(
        &self,
        bitfield: &[bool],
    ) -> Result<ProofBundle, ProofError> {
        self.engine
            .generate(Witness::HaveSet {
                bitfield: bitfield.to_vec(),
            })
            .await
    }

    /// Verifies a have-set proof against a bitfield commitment.
    pub async fn verify_have_set_proof(
        &self,
        bundle: &ProofBundle,
        expected: &Commitment,
    ) -> bool {
        self.engine.verify(bundle, expected).await
    }

    /// Proves possession of a complete file.
    pub async fn generate_file_proof(&self, data: &[u8]) -> Result<ProofBundle, ProofError> {
        self.engine
            .generate(Witness::CompleteFile {
                data: data.to_vec(),
            })
            .await
    }

    /// Verifies a complete-file proof against a file commitment.
    pub async fn verify_file_proof(&self, bundle: &ProofBundle, expected: &Commitment) -> bool {
        self.engine.verify(bundle, expected).await
    }

    /// Verifies an announce proof against an obfuscated info-hash.
    pub async fn verify_announce_proof(
        &self,
        bundle: &ProofBundle,
        obfuscated: &ObfuscatedId,
    ) -> bool {
        self.engine.verify_announce(bundle, obfuscated).await
    }

    /// Verifies a batch of proofs independently, returning per-item
    /// results.
    pub async fn batch_verify(&self, bundles: Vec<ProofBundle>) -> Vec<BatchOutcome> {
        self.engine.batch_verify(bundles).await
    }
}
