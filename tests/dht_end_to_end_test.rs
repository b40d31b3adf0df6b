use std::sync::Arc;

use veil_dht::crypto::{Commitment, KeyPair};
use veil_dht::dht::{MemoryOverlay, NodeDescriptor, Overlay, PrivateDht, PrivateDhtConfig};
use veil_dht::obfuscate::obfuscate;
use veil_dht::proofs::{ProofEngine, ProofEngineConfig, SchnorrBackend};

fn new_dht() -> PrivateDht<MemoryOverlay> {
    let keypair = KeyPair::generate_with_bits(16).unwrap();
    PrivateDht::new(keypair, MemoryOverlay::new(), PrivateDhtConfig::default())
}

/// End-to-end scenario 1: put("k1", 42) then get("k1") returns 42.
#[tokio::test]
async fn test_put_then_get_returns_value() {
    let dht = new_dht();

    dht.put(b"k1", 42).await.unwrap();
    assert_eq!(dht.get(b"k1").await.unwrap(), Some(42));
}

#[tokio::test]
async fn test_get_unknown_key_is_none() {
    let dht = new_dht();
    assert_eq!(dht.get(b"never-stored").await.unwrap(), None);
}

#[tokio::test]
async fn test_put_overwrites_previous_value() {
    let dht = new_dht();

    dht.put(b"counter", 1).await.unwrap();
    dht.put(b"counter", 2).await.unwrap();
    assert_eq!(dht.get(b"counter").await.unwrap(), Some(2));
}

/// The overlay only ever sees obfuscated keys and opaque ciphertext;
/// neither the plaintext key nor the value appears in stored bytes.
#[tokio::test]
async fn test_overlay_never_sees_plaintext() {
    let keypair = KeyPair::generate_with_bits(16).unwrap();
    let overlay = MemoryOverlay::new();
    let observer = overlay.clone();
    let dht = PrivateDht::new(keypair, overlay, PrivateDhtConfig::default());

    dht.put(b"secret-key-name", 7).await.unwrap();

    // Nothing is stored under the real key.
    assert_eq!(observer.fetch(b"secret-key-name").await.unwrap(), None);

    // The record sits under the obfuscated key and does not contain
    // the plaintext key bytes.
    let obfuscated = obfuscate(b"secret-key-name");
    let stored = observer.fetch(obfuscated.as_bytes()).await.unwrap().unwrap();
    assert!(!stored
        .windows(b"secret-key-name".len())
        .any(|w| w == b"secret-key-name"));
}

/// End-to-end scenario 3: announce returns a proof an independent
/// verifier can check holding only the obfuscated info-hash.
#[tokio::test]
async fn test_announce_with_third_party_verification() {
    let dht = new_dht();

    let receipt = dht.announce(b"real-info-hash", 6881).await.unwrap();
    assert_eq!(receipt.obfuscated, obfuscate(b"real-info-hash"));

    // An independent verifier with no keypair and no real info-hash,
    // holding only the obfuscated identifier and the bundle.
    let verifier = ProofEngine::new(
        Arc::new(SchnorrBackend::new()),
        ProofEngineConfig::default(),
    );
    assert!(
        verifier
            .verify_announce(&receipt.proof, &receipt.obfuscated)
            .await
    );

    // The proof is bound to that identifier and no other.
    assert!(
        !verifier
            .verify_announce(&receipt.proof, &obfuscate(b"other-info-hash"))
            .await
    );
}

#[tokio::test]
async fn test_announce_reaches_overlay_under_obfuscated_key() {
    let keypair = KeyPair::generate_with_bits(16).unwrap();
    let overlay = MemoryOverlay::new();
    let observer = overlay.clone();

    let dht = PrivateDht::new(keypair, overlay, PrivateDhtConfig::default());
    dht.announce(b"ih", 6881).await.unwrap();

    // The overlay saw the announce under the obfuscated key only.
    let obfuscated = obfuscate(b"ih");
    assert_eq!(observer.announced_ports(obfuscated.as_bytes()).await, vec![6881]);
    assert!(observer.announced_ports(b"ih").await.is_empty());
}

/// find_node returns obfuscated descriptors only, usable for further
/// routing; nothing claims to recover real identifiers.
#[tokio::test]
async fn test_find_node_returns_obfuscated_descriptors() {
    let keypair = KeyPair::generate_with_bits(16).unwrap();
    let overlay = MemoryOverlay::new();

    let near = NodeDescriptor {
        id: obfuscate(b"node-near"),
        addr: "127.0.0.1:7001".parse().unwrap(),
    };
    let far = NodeDescriptor {
        id: obfuscate(b"node-far"),
        addr: "127.0.0.1:7002".parse().unwrap(),
    };
    overlay.add_node(near.clone()).await;
    overlay.add_node(far.clone()).await;

    let dht = PrivateDht::new(keypair, overlay, PrivateDhtConfig::default());
    let nodes = dht.find_node(b"node-near").await.unwrap();

    // The exact target sorts first by XOR distance.
    assert_eq!(nodes[0], near);
    assert_eq!(nodes.len(), 2);
}

/// Piece-exchange surface: generate and verify piece and have-set
/// proofs through the façade.
#[tokio::test]
async fn test_piece_and_have_set_proofs_via_facade() {
    let dht = new_dht();

    let piece = b"piece seven bytes";
    let proof = dht.generate_piece_proof(7, piece).await.unwrap();
    let commitment = Commitment::of_piece(7, piece);

    assert!(dht.verify_piece_proof(&proof, &commitment, 7).await);
    assert!(!dht.verify_piece_proof(&proof, &commitment, 8).await);

    let bitfield = [true, false, true, true];
    let proof = dht.generate_have_set_proof(&bitfield).await.unwrap();
    assert!(
        dht.verify_have_set_proof(&proof, &Commitment::of_bitfield(&bitfield))
            .await
    );

    let file = b"all the pieces together";
    let proof = dht.generate_file_proof(file).await.unwrap();
    assert!(dht.verify_file_proof(&proof, &Commitment::of_file(file)).await);
}

/// Concurrent puts on distinct keys are independent.
#[tokio::test]
async fn test_concurrent_puts_on_distinct_keys() {
    let dht = Arc::new(new_dht());

    let mut handles = Vec::new();
    for i in 0..8u64 {
        let dht = dht.clone();
        handles.push(tokio::spawn(async move {
            let key = format!("key-{}", i);
            dht.put(key.as_bytes(), i).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for i in 0..8u64 {
        let key = format!("key-{}", i);
        assert_eq!(dht.get(key.as_bytes()).await.unwrap(), Some(i));
    }
}
