mod commitment;
mod elgamal;
mod keys;

pub use commitment::Commitment;
pub(crate) use commitment::{bitfield_scalar, file_scalar, piece_scalar};
pub use elgamal::{decrypt, encrypt, encrypt_with_randomness, Ciphertext, CryptoError};
pub use keys::{KeyPair, PublicKey, SecretKey, DEFAULT_PLAINTEXT_BITS, MAX_PLAINTEXT_BITS};

/*
 * Cryptography module for VeilDHT
 *
 * This module handles the confidentiality primitives:
 * - Key generation for the additively homomorphic scheme
 * - Exponential ElGamal encryption over Ristretto255
 * - Canonical commitments shared by the proof subsystem
 *
 * The scheme is additively homomorphic: adding two ciphertexts yields a
 * ciphertext of the sum of the plaintexts, so swarm-aggregate values can
 * be combined by relays without decryption.
 */
