use curve25519_dalek::scalar::Scalar;
use log::{debug, warn};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, Semaphore};
use tokio::task;
use tokio::time;

use crate::crypto::Commitment;
use crate::obfuscate::ObfuscatedId;
use crate::proofs::{BatchOutcome, CircuitKind, ProofBundle, ProofError, ProofSystem, Witness};

/// Configuration for the proof engine
#[derive(Clone, Debug)]
pub struct ProofEngineConfig {
    /// Number of CPU workers for proof generation and verification;
    /// 0 means size to available cores
    pub workers: usize,

    /// Wall-clock budget per proof generation call
    pub generation_timeout: Duration,

    /// How long a verification result stays cached
    pub cache_ttl: Duration,

    /// Maximum number of cached verification results
    pub cache_capacity: usize,
}

impl Default for ProofEngineConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            generation_timeout: Duration::from_secs(30),
            cache_ttl: Duration::from_secs(300),
            cache_capacity: 1024,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    kind: CircuitKind,
    commitment: [u8; 32],
    /// Digest of proof bytes and signals, so a tampered bundle can
    /// never hit the entry of a valid one
    bundle_digest: [u8; 32],
}

impl CacheKey {
    fn for_bundle(bundle: &ProofBundle) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&bundle.proof);
        for signal in &bundle.public_signals {
            hasher.update(signal);
        }
        Self {
            kind: bundle.circuit_kind,
            commitment: *bundle.commitment.as_bytes(),
            bundle_digest: hasher.finalize().into(),
        }
    }
}

struct CacheEntry {
    is_valid: bool,
    inserted: Instant,
}

/// Dispatches proof construction and verification to a bounded CPU
/// worker pool so they never block the network event loop.
///
/// Verification results are cached with a bounded, time-expiring map;
/// the cache is a performance optimization only and is safe to evict
/// under memory pressure.
#[derive(Clone)]
pub struct ProofEngine {
    system: Arc<dyn ProofSystem>,
    workers: Arc<Semaphore>,
    generation_timeout: Duration,
    cache: Arc<RwLock<HashMap<CacheKey, CacheEntry>>>,
    cache_ttl: Duration,
    cache_capacity: usize,
}

impl ProofEngine {
    /// Creates an engine over the given backend.
    pub fn new(system: Arc<dyn ProofSystem>, config: ProofEngineConfig) -> Self {
        let workers = if config.workers > 0 {
            config.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        };

        Self {
            system,
            workers: Arc::new(Semaphore::new(workers)),
            generation_timeout: config.generation_timeout,
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl: config.cache_ttl,
            cache_capacity: config.cache_capacity,
        }
    }

    /// Constructs a proof bundle from the given private inputs.
    ///
    /// Fails with `ProofError::Timeout` when the wall-clock budget is
    /// exceeded; the caller may retry with backoff or a smaller input.
    pub async fn generate(&self, witness: Witness) -> Result<ProofBundle, ProofError> {
        debug!("Generating {} proof", witness.circuit_kind());

        let permit = self
            .workers
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| ProofError::GenerationFailed(e.to_string()))?;

        let system = self.system.clone();
        let handle = task::spawn_blocking(move || {
            let _permit = permit;
            system.prove(&witness)
        });

        match time::timeout(self.generation_timeout, handle).await {
            Err(_) => {
                warn!(
                    "Proof generation exceeded its {:?} budget",
                    self.generation_timeout
                );
                Err(ProofError::Timeout(self.generation_timeout))
            }
            Ok(Err(join_err)) => Err(ProofError::GenerationFailed(join_err.to_string())),
            Ok(Ok(result)) => result,
        }
    }

    /// Verifies a bundle against an expected commitment.
    ///
    /// A cheap equality check on the first public signal runs before
    /// any cryptographic work, so obviously-wrong proofs short-circuit.
    /// Always a boolean predicate: "proof invalid" is an expected
    /// outcome, never an error.
    pub async fn verify(&self, bundle: &ProofBundle, expected: &Commitment) -> bool {
        let Some(first) = bundle.public_signals.first() else {
            debug!("Rejecting bundle with no public signals");
            return false;
        };
        if *first != expected.as_signal() {
            debug!(
                "Commitment mismatch on {} proof, skipping verification",
                bundle.circuit_kind
            );
            return false;
        }

        let key = CacheKey::for_bundle(bundle);
        if let Some(cached) = self.cache_lookup(&key).await {
            return cached;
        }

        let result = self.verify_uncached(bundle).await;
        self.cache_insert(key, result).await;
        result
    }

    /// Checks that a knowledge-of-value bundle's statement binds this
    /// exact ciphertext under this public key. Cheap, synchronous.
    pub fn binds_encryption(
        &self,
        bundle: &ProofBundle,
        public_key: &crate::crypto::PublicKey,
        ciphertext: &crate::crypto::Ciphertext,
    ) -> bool {
        self.system.binds_encryption(bundle, public_key, ciphertext)
    }

    /// Verifies a `PiecePossession` bundle, additionally comparing the
    /// public piece-index signal against the caller's expectation.
    pub async fn verify_piece(
        &self,
        bundle: &ProofBundle,
        expected: &Commitment,
        expected_index: u32,
    ) -> bool {
        if bundle.circuit_kind != CircuitKind::PiecePossession {
            return false;
        }
        let index_signal = Scalar::from(u64::from(expected_index)).to_bytes();
        if bundle.public_signals.get(1) != Some(&index_signal) {
            debug!("Piece index signal does not match expected index {}", expected_index);
            return false;
        }

        self.verify(bundle, expected).await
    }

    /// Verifies an announce proof against the obfuscated identifier the
    /// verifier holds. The verifier never learns the real identifier.
    pub async fn verify_announce(&self, bundle: &ProofBundle, obfuscated: &ObfuscatedId) -> bool {
        if bundle.circuit_kind != CircuitKind::KnowledgeOfValue {
            return false;
        }
        if bundle.public_signals.get(1) != Some(&obfuscated.as_signal()) {
            debug!("Announce proof bound to a different obfuscated identifier");
            return false;
        }

        // The commitment anchor is opaque to an observer who only holds
        // the obfuscated identifier; take it from the bundle.
        let expected = bundle.commitment.clone();
        self.verify(bundle, &expected).await
    }

    /// Runs verifications independently and concurrently, collecting
    /// per-item results. One bad proof never fails the batch.
    pub async fn batch_verify(&self, bundles: Vec<ProofBundle>) -> Vec<BatchOutcome> {
        let mut tasks = Vec::with_capacity(bundles.len());

        for bundle in bundles {
            let engine = self.clone();
            let commitment = bundle.commitment.clone();
            tasks.push((
                commitment.clone(),
                tokio::spawn(async move {
                    let is_valid = engine.verify(&bundle, &commitment).await;
                    BatchOutcome {
                        commitment,
                        is_valid,
                    }
                }),
            ));
        }

        // One outcome per input bundle, in input order, even if a task
        // never completes.
        let mut outcomes = Vec::with_capacity(tasks.len());
        for (commitment, handle) in tasks {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!("Batch verification task failed: {}", e);
                    outcomes.push(BatchOutcome {
                        commitment,
                        is_valid: false,
                    });
                }
            }
        }
        outcomes
    }

    async fn verify_uncached(&self, bundle: &ProofBundle) -> bool {
        let permit = match self.workers.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!("Verification worker pool unavailable: {}", e);
                return false;
            }
        };

        let system = self.system.clone();
        let bundle = bundle.clone();
        let handle = task::spawn_blocking(move || {
            let _permit = permit;
            system.verify(&bundle)
        });

        handle.await.unwrap_or(false)
    }

    async fn cache_lookup(&self, key: &CacheKey) -> Option<bool> {
        let cache = self.cache.read().await;
        let entry = cache.get(key)?;
        if entry.inserted.elapsed() > self.cache_ttl {
            return None;
        }
        Some(entry.is_valid)
    }

    async fn cache_insert(&self, key: CacheKey, is_valid: bool) {
        let mut cache = self.cache.write().await;

        if cache.len() >= self.cache_capacity {
            let ttl = self.cache_ttl;
            cache.retain(|_, entry| entry.inserted.elapsed() <= ttl);

            // Still full after dropping expired entries: evict oldest.
            while cache.len() >= self.cache_capacity {
                let oldest = cache
                    .iter()
                    .min_by_key(|(_, entry)| entry.inserted)
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(key) => {
                        cache.remove(&key);
                    }
                    None => break,
                }
            }
        }

        cache.insert(
            key,
            CacheEntry {
                is_valid,
                inserted: Instant::now(),
            },
        );
    }
}
