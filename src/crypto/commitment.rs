use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::scalar::Scalar;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;

/// A collision-resistant binding of a (possibly large) plaintext to a
/// short public value.
///
/// Commitments are computed over a fixed canonical serialization
/// (domain tag plus length-prefixed fields), so two honest parties
/// computing one on the same logical value always agree. They serve as
/// the first public signal of every proof bundle and as the
/// post-verification comparison anchor.
///
/// Two representations share the type. Byte commitments (`of_bytes`,
/// `of_key_value`) are plain SHA-256 digests. Possession commitments
/// (`of_piece`, `of_bitfield`, `of_file`) are compressed Ristretto
/// points `w*G`, where `w` is hash-derived from the committed data:
/// still deterministic and one-way, and a possession proof anchors on
/// the point itself, so forging one without the data means extracting
/// its discrete log.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    /// Commits to an opaque byte string (e.g. an overlay key or an
    /// info-hash).
    pub fn of_bytes(data: &[u8]) -> Self {
        Self(tagged_digest(b"veil-dht/commit/bytes/v1", &[data]))
    }

    /// Commits to a key/value pair stored in the overlay.
    pub fn of_key_value(key: &[u8], value: u64) -> Self {
        Self(tagged_digest(
            b"veil-dht/commit/key-value/v1",
            &[key, &value.to_le_bytes()],
        ))
    }

    /// Commits to one piece of a file, bound to its index.
    pub fn of_piece(index: u32, data: &[u8]) -> Self {
        Self(point_commitment(piece_scalar(index, data)))
    }

    /// Commits to a have-set bitfield.
    ///
    /// The bitfield is packed into bytes with an explicit bit count so
    /// `[1,0,1,1]` and `[1,0,1,1,0,0,0,0]` commit to different values.
    pub fn of_bitfield(bits: &[bool]) -> Self {
        Self(point_commitment(bitfield_scalar(bits)))
    }

    /// Commits to a complete file.
    pub fn of_file(data: &[u8]) -> Self {
        Self(point_commitment(file_scalar(data)))
    }

    /// Canonical public-signal encoding of the commitment.
    pub fn as_signal(&self) -> [u8; 32] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Commitment({})", hex::encode(&self.0[..6]))
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Scalar behind a piece commitment; the proof subsystem proves
/// knowledge of it.
pub(crate) fn piece_scalar(index: u32, data: &[u8]) -> Scalar {
    hash_to_scalar(b"veil-dht/commit/piece/v1", &[&index.to_le_bytes(), data])
}

/// Scalar behind a bitfield commitment.
pub(crate) fn bitfield_scalar(bits: &[bool]) -> Scalar {
    let packed = pack_bits(bits);
    hash_to_scalar(
        b"veil-dht/commit/bitfield/v1",
        &[&(bits.len() as u64).to_le_bytes(), &packed],
    )
}

/// Scalar behind a complete-file commitment.
pub(crate) fn file_scalar(data: &[u8]) -> Scalar {
    hash_to_scalar(b"veil-dht/commit/file/v1", &[data])
}

fn point_commitment(w: Scalar) -> [u8; 32] {
    (w * RISTRETTO_BASEPOINT_POINT).compress().to_bytes()
}

/// SHA-256 over a domain tag and length-prefixed fields.
fn tagged_digest(tag: &[u8], parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// SHA-512 over a domain tag and length-prefixed fields, reduced into
/// the Ristretto scalar field.
fn hash_to_scalar(tag: &[u8], parts: &[&[u8]]) -> Scalar {
    let mut hasher = Sha512::new();
    hasher.update(tag);
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    let digest: [u8; 64] = hasher.finalize().into();
    Scalar::from_bytes_mod_order_wide(&digest)
}

/// Packs a bitfield into bytes, most significant bit first within each byte.
fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut packed = vec![0u8; (bits.len() + 7) / 8];
    for (i, &bit) in bits.iter().enumerate() {
        if bit {
            packed[i / 8] |= 1 << (7 - (i % 8));
        }
    }
    packed
}
