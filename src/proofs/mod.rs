mod bundle;
mod engine;
mod schnorr;

pub use bundle::{BatchOutcome, CircuitKind, ProofBundle, ProofError, ProofSystem, Witness};
pub use engine::{ProofEngine, ProofEngineConfig};
pub use schnorr::SchnorrBackend;

/*
 * Proof subsystem for VeilDHT
 *
 * Four circuit kinds are supported:
 * - KnowledgeOfValue: the prover knows the hidden value behind a public
 *   commitment (and, for stored records, that the attached ciphertext
 *   encrypts it)
 * - PiecePossession: the prover holds the data for a specific piece index
 * - HaveSetPossession: the prover's have-set matches a bitfield commitment
 * - CompleteFilePossession: the prover holds data matching a file commitment
 *
 * The concrete backend is a Fiat-Shamir sigma-protocol scheme over
 * Ristretto255; it sits behind the ProofSystem trait so a circuit-based
 * NIZK (Groth16, Plonk, ...) can replace it without touching callers.
 * Generation and verification are CPU-bound and run on a bounded worker
 * pool owned by the ProofEngine.
 */
