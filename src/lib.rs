pub mod crypto;
pub mod dht;
pub mod obfuscate;
pub mod proofs;
pub mod utils;

/*
 * VeilDHT - a privacy-preserving DHT layer for P2P swarm metadata
 *
 * The crate wraps a generic key->value overlay network with a
 * confidentiality and verifiability layer:
 *
 * 1. Confidentiality - values are stored as additively homomorphic
 *    ciphertexts and never appear in the clear on the wire or at rest
 * 2. Verifiability - zero-knowledge proofs let peers prove facts about
 *    hidden values (knowledge of a stored value, possession of a piece,
 *    a have-set, or a complete file) without revealing them
 * 3. Unlinkability - identifiers are routed through a deterministic
 *    one-way transform so observers cannot correlate overlay keys back
 *    to real info-hashes or node IDs
 *
 * The base overlay (routing, replication, node lookup) is an injected
 * dependency with no knowledge of the privacy semantics.
 */
