mod overlay;
mod private_dht;
mod record;

pub use overlay::{MemoryOverlay, NodeDescriptor, Overlay, OverlayError, SledOverlay, StoredValue};
pub use private_dht::{AnnounceReceipt, DhtError, PrivateDht, PrivateDhtConfig};
pub use record::{EncryptedRecord, RecordError, RECORD_VERSION};

/*
 * Privacy-preserving DHT layer for VeilDHT
 *
 * The façade (PrivateDht) wraps an injected base overlay with the
 * confidentiality and verifiability semantics:
 *
 * - put/get store and retrieve homomorphic ciphertexts with attached
 *   knowledge proofs, keyed by obfuscated identifiers
 * - announce publishes a provable claim of knowing an info-hash without
 *   revealing it
 * - find_node routes by obfuscated identifiers only
 *
 * The overlay itself (routing tables, bucket maintenance, replication)
 * is out of scope and specified purely at the Overlay trait boundary;
 * in-memory and sled-backed implementations are provided for tests and
 * single-node deployments.
 */
