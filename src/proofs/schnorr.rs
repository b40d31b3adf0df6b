use curve25519_dalek::constants::RISTRETTO_BASEPOINT_POINT;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use log::debug;
use merlin::Transcript;

use crate::crypto::{bitfield_scalar, file_scalar, piece_scalar, Commitment};
use crate::obfuscate::knowledge_scalar;
use crate::proofs::{CircuitKind, ProofBundle, ProofError, ProofSystem, Witness};

/// Layout marker for the two-scalar encryption-correctness sigma proof.
const FLAVOR_ENCRYPTION: u8 = 1;

/// Layout marker for the single-scalar possession proof.
const FLAVOR_POSSESSION: u8 = 2;

/// Fiat-Shamir sigma-protocol backend over Ristretto255.
///
/// Two proof shapes cover the four circuit kinds:
///
/// - `ValueEncryption` statements get a two-scalar sigma proof that the
///   attached ElGamal ciphertext `(A, B)` satisfies `A = r*G` and
///   `B = v*G + r*P` for the hidden `(v, r)`, with the key/value
///   commitments bound into the challenge.
/// - Possession statements (identifier, piece, have-set, file) get a
///   Schnorr proof of knowledge of the discrete log of the commitment
///   point itself (for announce, of the obfuscated identifier point).
///   The verifier recomputes the expected anchor from the public
///   signals and rejects any proof whose anchor differs, so producing
///   a valid bundle without the secret data means extracting a
///   discrete log.
///
/// Proof bytes are self-contained: they carry the statement points, so
/// `verify` needs nothing beyond the bundle itself.
pub struct SchnorrBackend;

impl SchnorrBackend {
    pub fn new() -> Self {
        Self
    }

    fn prove_encryption(
        &self,
        witness: &Witness,
    ) -> Result<ProofBundle, ProofError> {
        let Witness::ValueEncryption {
            public_key,
            ciphertext,
            randomness,
            key,
            value,
        } = witness
        else {
            return Err(ProofError::EncodingFailed(
                "Wrong witness shape for encryption proof".to_string(),
            ));
        };

        let key_commitment = Commitment::of_bytes(key);
        let kv_commitment = Commitment::of_key_value(key, *value);
        let signals = vec![key_commitment.as_signal(), kv_commitment.as_signal()];

        let p = *public_key.point();
        let a = *ciphertext.c1();
        let b = *ciphertext.c2();
        let value_scalar = Scalar::from(*value);

        let mut rng = rand::thread_rng();
        let sv = Scalar::random(&mut rng);
        let sr = Scalar::random(&mut rng);
        let t1 = sr * RISTRETTO_BASEPOINT_POINT;
        let t2 = sv * RISTRETTO_BASEPOINT_POINT + sr * p;

        let mut transcript = proof_transcript(CircuitKind::KnowledgeOfValue, &signals);
        transcript.append_message(b"pubkey", p.compress().as_bytes());
        transcript.append_message(b"c1", a.compress().as_bytes());
        transcript.append_message(b"c2", b.compress().as_bytes());
        transcript.append_message(b"t1", t1.compress().as_bytes());
        transcript.append_message(b"t2", t2.compress().as_bytes());
        let c = challenge_scalar(&mut transcript);

        let zv = sv + c * value_scalar;
        let zr = sr + c * randomness;

        let mut proof = Vec::with_capacity(225);
        proof.push(FLAVOR_ENCRYPTION);
        proof.extend_from_slice(p.compress().as_bytes());
        proof.extend_from_slice(a.compress().as_bytes());
        proof.extend_from_slice(b.compress().as_bytes());
        proof.extend_from_slice(t1.compress().as_bytes());
        proof.extend_from_slice(t2.compress().as_bytes());
        proof.extend_from_slice(&zv.to_bytes());
        proof.extend_from_slice(&zr.to_bytes());

        Ok(ProofBundle {
            circuit_kind: CircuitKind::KnowledgeOfValue,
            proof,
            public_signals: signals,
            commitment: key_commitment,
        })
    }

    fn prove_possession(
        &self,
        kind: CircuitKind,
        witness: Scalar,
        signals: Vec<[u8; 32]>,
        commitment: Commitment,
    ) -> ProofBundle {
        let anchor = witness * RISTRETTO_BASEPOINT_POINT;

        let s = Scalar::random(&mut rand::thread_rng());
        let t = s * RISTRETTO_BASEPOINT_POINT;

        let mut transcript = proof_transcript(kind, &signals);
        transcript.append_message(b"anchor", anchor.compress().as_bytes());
        transcript.append_message(b"t", t.compress().as_bytes());
        let c = challenge_scalar(&mut transcript);

        let z = s + c * witness;

        let mut proof = Vec::with_capacity(97);
        proof.push(FLAVOR_POSSESSION);
        proof.extend_from_slice(anchor.compress().as_bytes());
        proof.extend_from_slice(t.compress().as_bytes());
        proof.extend_from_slice(&z.to_bytes());

        ProofBundle {
            circuit_kind: kind,
            proof,
            public_signals: signals,
            commitment,
        }
    }

    fn verify_encryption(&self, bundle: &ProofBundle) -> bool {
        if bundle.proof.len() != 225 {
            debug!("Encryption proof has wrong length: {}", bundle.proof.len());
            return false;
        }

        let Some(p) = read_point(&bundle.proof[1..33]) else {
            return false;
        };
        let Some(a) = read_point(&bundle.proof[33..65]) else {
            return false;
        };
        let Some(b) = read_point(&bundle.proof[65..97]) else {
            return false;
        };
        let Some(t1) = read_point(&bundle.proof[97..129]) else {
            return false;
        };
        let Some(t2) = read_point(&bundle.proof[129..161]) else {
            return false;
        };
        let Some(zv) = read_scalar(&bundle.proof[161..193]) else {
            return false;
        };
        let Some(zr) = read_scalar(&bundle.proof[193..225]) else {
            return false;
        };

        let mut transcript = proof_transcript(bundle.circuit_kind, &bundle.public_signals);
        transcript.append_message(b"pubkey", p.compress().as_bytes());
        transcript.append_message(b"c1", a.compress().as_bytes());
        transcript.append_message(b"c2", b.compress().as_bytes());
        transcript.append_message(b"t1", t1.compress().as_bytes());
        transcript.append_message(b"t2", t2.compress().as_bytes());
        let c = challenge_scalar(&mut transcript);

        zr * RISTRETTO_BASEPOINT_POINT == t1 + c * a
            && zv * RISTRETTO_BASEPOINT_POINT + zr * p == t2 + c * b
    }

    fn verify_possession(&self, bundle: &ProofBundle) -> bool {
        if bundle.proof.len() != 97 {
            debug!("Possession proof has wrong length: {}", bundle.proof.len());
            return false;
        }

        // The anchor is not prover-chosen: it must equal the point the
        // statement is about. Possession kinds anchor on the commitment
        // point; identifier-knowledge proofs anchor on the obfuscated
        // identifier carried as the second signal.
        let expected_anchor: &[u8; 32] = match bundle.circuit_kind {
            CircuitKind::KnowledgeOfValue => match bundle.public_signals.get(1) {
                Some(signal) => signal,
                None => return false,
            },
            _ => bundle.commitment.as_bytes(),
        };
        if bundle.proof[1..33] != expected_anchor[..] {
            debug!("Possession proof anchor does not match its statement");
            return false;
        }

        let Some(anchor) = read_point(&bundle.proof[1..33]) else {
            return false;
        };
        let Some(t) = read_point(&bundle.proof[33..65]) else {
            return false;
        };
        let Some(z) = read_scalar(&bundle.proof[65..97]) else {
            return false;
        };

        let mut transcript = proof_transcript(bundle.circuit_kind, &bundle.public_signals);
        transcript.append_message(b"anchor", anchor.compress().as_bytes());
        transcript.append_message(b"t", t.compress().as_bytes());
        let c = challenge_scalar(&mut transcript);

        z * RISTRETTO_BASEPOINT_POINT == t + c * anchor
    }
}

impl Default for SchnorrBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ProofSystem for SchnorrBackend {
    fn prove(&self, witness: &Witness) -> Result<ProofBundle, ProofError> {
        match witness {
            Witness::ValueEncryption { .. } => self.prove_encryption(witness),

            Witness::IdentifierKnowledge { real_id, obfuscated } => {
                let commitment = Commitment::of_bytes(real_id);
                let signals = vec![commitment.as_signal(), obfuscated.as_signal()];
                // The witness is the discrete log of the obfuscated point.
                let w = knowledge_scalar(real_id);
                Ok(self.prove_possession(CircuitKind::KnowledgeOfValue, w, signals, commitment))
            }

            Witness::Piece { index, data } => {
                let commitment = Commitment::of_piece(*index, data);
                let signals = vec![
                    commitment.as_signal(),
                    Scalar::from(u64::from(*index)).to_bytes(),
                ];
                let w = piece_scalar(*index, data);
                Ok(self.prove_possession(CircuitKind::PiecePossession, w, signals, commitment))
            }

            Witness::HaveSet { bitfield } => {
                let commitment = Commitment::of_bitfield(bitfield);
                let signals = vec![commitment.as_signal()];
                let w = bitfield_scalar(bitfield);
                Ok(self.prove_possession(CircuitKind::HaveSetPossession, w, signals, commitment))
            }

            Witness::CompleteFile { data } => {
                let commitment = Commitment::of_file(data);
                let signals = vec![commitment.as_signal()];
                let w = file_scalar(data);
                Ok(self.prove_possession(
                    CircuitKind::CompleteFilePossession,
                    w,
                    signals,
                    commitment,
                ))
            }
        }
    }

    fn binds_encryption(
        &self,
        bundle: &ProofBundle,
        public_key: &crate::crypto::PublicKey,
        ciphertext: &crate::crypto::Ciphertext,
    ) -> bool {
        bundle.circuit_kind == CircuitKind::KnowledgeOfValue
            && bundle.proof.len() == 225
            && bundle.proof[0] == FLAVOR_ENCRYPTION
            && bundle.proof[1..33] == public_key.point().compress().to_bytes()
            && bundle.proof[33..97] == ciphertext.to_bytes()[..]
    }

    fn verify(&self, bundle: &ProofBundle) -> bool {
        if bundle.public_signals.is_empty() {
            return false;
        }

        // The commitment field must match the first public signal; a
        // bundle claiming otherwise is malformed.
        if bundle.public_signals[0] != bundle.commitment.as_signal() {
            return false;
        }

        match bundle.proof.first() {
            Some(&FLAVOR_ENCRYPTION) => self.verify_encryption(bundle),
            Some(&FLAVOR_POSSESSION) => self.verify_possession(bundle),
            _ => false,
        }
    }
}

/// Builds the Fiat-Shamir transcript shared by prover and verifier.
/// Every public signal is bound in order before any statement data.
fn proof_transcript(kind: CircuitKind, signals: &[[u8; 32]]) -> Transcript {
    let mut transcript = Transcript::new(b"veil-dht/proof/v1");
    transcript.append_message(b"kind", kind.tag());
    for signal in signals {
        transcript.append_message(b"signal", signal);
    }
    transcript
}

fn challenge_scalar(transcript: &mut Transcript) -> Scalar {
    let mut buf = [0u8; 64];
    transcript.challenge_bytes(b"challenge", &mut buf);
    Scalar::from_bytes_mod_order_wide(&buf)
}

fn read_point(bytes: &[u8]) -> Option<RistrettoPoint> {
    let arr: [u8; 32] = bytes.try_into().ok()?;
    CompressedRistretto(arr).decompress()
}

fn read_scalar(bytes: &[u8]) -> Option<Scalar> {
    let arr: [u8; 32] = bytes.try_into().ok()?;
    Scalar::from_canonical_bytes(arr).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{encrypt_with_randomness, KeyPair};
    use crate::obfuscate::obfuscate;

    #[test]
    fn test_value_encryption_proof() {
        let keypair = KeyPair::generate_with_bits(16).unwrap();
        let (ciphertext, randomness) = encrypt_with_randomness(&keypair.public, 42).unwrap();

        let backend = SchnorrBackend::new();
        let bundle = backend
            .prove(&Witness::ValueEncryption {
                public_key: keypair.public.clone(),
                ciphertext,
                randomness,
                key: b"k1".to_vec(),
                value: 42,
            })
            .unwrap();

        assert_eq!(bundle.circuit_kind, CircuitKind::KnowledgeOfValue);
        assert_eq!(bundle.commitment, Commitment::of_bytes(b"k1"));
        assert!(backend.verify(&bundle));
    }

    #[test]
    fn test_encryption_proof_rejects_wrong_value() {
        // Prove with a witness value that does not match the ciphertext.
        let keypair = KeyPair::generate_with_bits(16).unwrap();
        let (ciphertext, randomness) = encrypt_with_randomness(&keypair.public, 42).unwrap();

        let backend = SchnorrBackend::new();
        let bundle = backend
            .prove(&Witness::ValueEncryption {
                public_key: keypair.public.clone(),
                ciphertext,
                randomness,
                key: b"k1".to_vec(),
                value: 43,
            })
            .unwrap();

        assert!(!backend.verify(&bundle));
    }

    #[test]
    fn test_possession_proof_round_trip() {
        let backend = SchnorrBackend::new();

        let bundle = backend
            .prove(&Witness::Piece {
                index: 3,
                data: b"piece-bytes".to_vec(),
            })
            .unwrap();
        assert!(backend.verify(&bundle));

        let bundle = backend
            .prove(&Witness::HaveSet {
                bitfield: vec![true, false, true, true],
            })
            .unwrap();
        assert!(backend.verify(&bundle));

        let bundle = backend
            .prove(&Witness::CompleteFile {
                data: b"whole-file".to_vec(),
            })
            .unwrap();
        assert!(backend.verify(&bundle));
    }

    #[test]
    fn test_identifier_knowledge_proof() {
        let backend = SchnorrBackend::new();
        let info_hash = b"real-info-hash";

        let bundle = backend
            .prove(&Witness::IdentifierKnowledge {
                real_id: info_hash.to_vec(),
                obfuscated: obfuscate(info_hash),
            })
            .unwrap();

        assert!(backend.verify(&bundle));
        // The obfuscated identifier travels as the second public signal.
        assert_eq!(bundle.public_signals[1], obfuscate(info_hash).as_signal());
    }

    #[test]
    fn test_tampered_proof_is_rejected() {
        let backend = SchnorrBackend::new();
        let mut bundle = backend
            .prove(&Witness::Piece {
                index: 0,
                data: b"data".to_vec(),
            })
            .unwrap();

        bundle.proof[40] ^= 0x01;
        assert!(!backend.verify(&bundle));
    }

    #[test]
    fn test_tampered_signal_is_rejected() {
        let backend = SchnorrBackend::new();
        let mut bundle = backend
            .prove(&Witness::Piece {
                index: 7,
                data: b"data".to_vec(),
            })
            .unwrap();

        // Claim a different piece index; the transcript no longer matches.
        bundle.public_signals[1] = Scalar::from(8u64).to_bytes();
        assert!(!backend.verify(&bundle));
    }

    #[test]
    fn test_forged_piece_proof_from_random_scalar_is_rejected() {
        // An attacker holding only the public commitment picks their
        // own scalar and builds an otherwise well-formed proof of
        // knowing its discrete log. The anchor cannot match the
        // commitment point, so verification must fail.
        let backend = SchnorrBackend::new();
        let commitment = Commitment::of_piece(3, b"data-the-attacker-does-not-hold");
        let signals = vec![commitment.as_signal(), Scalar::from(3u64).to_bytes()];

        let w = Scalar::random(&mut rand::thread_rng());
        let forged =
            backend.prove_possession(CircuitKind::PiecePossession, w, signals, commitment);

        assert!(!backend.verify(&forged));
    }

    #[test]
    fn test_forged_announce_proof_from_obfuscated_id_is_rejected() {
        // The obfuscated identifier is public on the overlay; knowing
        // it alone must not be enough to produce an accepted knowledge
        // proof.
        let backend = SchnorrBackend::new();
        let obfuscated = obfuscate(b"hidden-info-hash");

        let claimed = Commitment::of_bytes(b"attacker-guess");
        let signals = vec![claimed.as_signal(), obfuscated.as_signal()];

        let w = Scalar::random(&mut rand::thread_rng());
        let forged =
            backend.prove_possession(CircuitKind::KnowledgeOfValue, w, signals, claimed);

        assert!(!backend.verify(&forged));
    }

    #[test]
    fn test_forged_file_proof_anchor_is_rejected() {
        let backend = SchnorrBackend::new();
        let commitment = Commitment::of_file(b"the-complete-file");
        let signals = vec![commitment.as_signal()];

        let w = Scalar::random(&mut rand::thread_rng());
        let forged =
            backend.prove_possession(CircuitKind::CompleteFilePossession, w, signals, commitment);

        assert!(!backend.verify(&forged));
    }

    #[test]
    fn test_inconsistent_commitment_field_is_rejected() {
        let backend = SchnorrBackend::new();
        let mut bundle = backend
            .prove(&Witness::CompleteFile {
                data: b"file".to_vec(),
            })
            .unwrap();

        bundle.commitment = Commitment::of_file(b"other-file");
        assert!(!backend.verify(&bundle));
    }
}
