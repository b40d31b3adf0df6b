use veil_dht::crypto::{decrypt, encrypt, Ciphertext, CryptoError, KeyPair, PublicKey};
use veil_dht::obfuscate::obfuscate;

/// Homomorphism: decrypt(encrypt(a) + encrypt(b)) == a + b
#[test]
fn test_homomorphic_addition() {
    let keypair = KeyPair::generate_with_bits(16).unwrap();

    for (a, b) in [(0u64, 0u64), (1, 2), (42, 58), (1000, 24000)] {
        let ca = encrypt(&keypair.public, a).unwrap();
        let cb = encrypt(&keypair.public, b).unwrap();
        let sum = ca.combine(&cb);

        assert_eq!(
            decrypt(&keypair.secret, &sum).unwrap(),
            a + b,
            "Homomorphism failed for {} + {}",
            a,
            b
        );
    }
}

/// Relays can fold many ciphertexts together without the secret key.
#[test]
fn test_multi_party_aggregate() {
    let keypair = KeyPair::generate_with_bits(16).unwrap();

    let contributions = [3u64, 7, 11, 19];
    let mut aggregate: Option<Ciphertext> = None;
    for &value in &contributions {
        let ct = encrypt(&keypair.public, value).unwrap();
        aggregate = Some(match aggregate {
            Some(acc) => acc.combine(&ct),
            None => ct,
        });
    }

    let total: u64 = contributions.iter().sum();
    assert_eq!(decrypt(&keypair.secret, &aggregate.unwrap()).unwrap(), total);
}

/// Round trip: decrypt(encrypt(v)) == v across the plaintext space edges.
#[test]
fn test_encrypt_decrypt_round_trip() {
    let keypair = KeyPair::generate_with_bits(12).unwrap();

    for value in [0u64, 1, 2, 4095] {
        let ciphertext = encrypt(&keypair.public, value).unwrap();
        assert_eq!(decrypt(&keypair.secret, &ciphertext).unwrap(), value);
    }
}

#[test]
fn test_encoding_error_is_not_retryable_state() {
    let keypair = KeyPair::generate_with_bits(12).unwrap();

    // 2^12 is the first value outside the plaintext space.
    let result = encrypt(&keypair.public, 4096);
    assert!(matches!(result, Err(CryptoError::EncodingFailed(_))));

    // The keypair remains fully usable afterwards.
    let ciphertext = encrypt(&keypair.public, 4095).unwrap();
    assert_eq!(decrypt(&keypair.secret, &ciphertext).unwrap(), 4095);
}

/// Regenerating a keypair invalidates previously produced ciphertexts.
#[test]
fn test_key_rotation_invalidates_old_ciphertexts() {
    let old = KeyPair::generate_with_bits(8).unwrap();
    let ciphertext = encrypt(&old.public, 99).unwrap();

    let fresh = KeyPair::generate_with_bits(8).unwrap();
    assert!(decrypt(&fresh.secret, &ciphertext).is_err());
}

/// Obfuscation determinism across independent call sites with no
/// shared secret.
#[test]
fn test_obfuscation_is_deterministic_everywhere() {
    let id = b"shared-info-hash";

    let here = obfuscate(id);
    let there = obfuscate(id);
    assert_eq!(here, there);

    // And it survives a serialization boundary.
    let wire = here.to_vec();
    let reparsed = veil_dht::obfuscate::ObfuscatedId::try_from(wire.as_slice()).unwrap();
    assert_eq!(here, reparsed);
}

#[test]
fn test_public_key_wire_round_trip() {
    let keypair = KeyPair::generate_with_bits(16).unwrap();

    let bytes = keypair.public.to_bytes();
    let restored = PublicKey::from_bytes(&bytes).unwrap();
    assert_eq!(keypair.public, restored);

    // Values encrypted under the restored key decrypt under the
    // original secret.
    let ciphertext = encrypt(&restored, 5).unwrap();
    assert_eq!(decrypt(&keypair.secret, &ciphertext).unwrap(), 5);
}
