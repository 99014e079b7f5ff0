//! Property-based tests for the quantified invariants of spec.md Section 8.
//!
//! Property 5 (the Salsa20 ECRYPT vector) is a fixed known-answer test,
//! not a property over arbitrary input, and lives in `crypto::csprng`'s
//! own unit tests instead of here.

use quickcheck::quickcheck;

use sealmux::crypto::backend::rustcrypto::RustCryptoBackend;
use sealmux::crypto::backend::KdfParams;
use sealmux::crypto::csprng::EntropySource;
use sealmux::crypto::mem::Protected;
use sealmux::error::Error;
use sealmux::key_provider::SymmetricKeyProvider;
use sealmux::manifest::pipeline::{ItemInput, ManifestKeyRequest, ReadSession, WriteRequest, WriteSession};
use sealmux::manifest::{
    EntropyScheme, FabricParams, FrameshiftParams, ItemCipherConfig, ItemCipherConfigKind, ItemId, ItemMacConfig,
    ItemType, LayoutScheme, PayloadConfiguration, PayloadItem,
};
use sealmux::multiplex::{fabric, frameshift, ItemCiphertext, ItemSpan};
use sealmux::registry::{KdfAlgorithm, MacAlgorithm, StreamCipherAlgorithm};

fn stream_item(id: u128, plaintext: Vec<u8>) -> ItemInput {
    let key = Protected::from(vec![0x13u8; 32]);
    let nonce = vec![0x17u8; 8];
    ItemInput {
        item: PayloadItem {
            id: ItemId(id),
            path: format!("item-{}", id),
            declared_len: 0,
            cipher: ItemCipherConfig::Stream { algorithm: StreamCipherAlgorithm::Salsa20, key: key.clone(), nonce },
            mac: ItemMacConfig { algorithm: MacAlgorithm::HmacSha256, key, nonce: None, tag: None },
            item_type: ItemType::File,
            kdf: None,
        },
        plaintext,
    }
}

fn chunk_items(blobs: &[Vec<u8>]) -> Vec<ItemInput> {
    blobs
        .iter()
        .enumerate()
        .map(|(i, b)| stream_item((i + 1) as u128, b.clone()))
        .collect()
}

fn simple_request(pre_key: Protected, entropy_key: Vec<u8>, entropy_nonce: Vec<u8>) -> WriteRequest {
    WriteRequest {
        version: 1,
        key_request: ManifestKeyRequest::SymmetricDirect { pre_key },
        manifest_cipher: ItemCipherConfigKind::Stream { algorithm: StreamCipherAlgorithm::XSalsa20 },
        manifest_mac_algorithm: MacAlgorithm::HmacSha256,
        kdf_algorithm: KdfAlgorithm::Pbkdf2,
        kdf_params: KdfParams::Pbkdf2 { iterations: 100 },
        salt: vec![0x2Au8; 16],
        include_key_confirmation: true,
        payload_config: PayloadConfiguration {
            scheme: LayoutScheme::Simple,
            entropy: EntropyScheme::StreamCipherCsprng {
                algorithm: StreamCipherAlgorithm::Salsa20,
                key: Protected::from(entropy_key),
                nonce: entropy_nonce,
            },
            frameshift: None,
            fabric: None,
        },
        trailer_enabled: true,
    }
}

fn cap_blobs(raw: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
    let mut blobs: Vec<Vec<u8>> = raw.into_iter().take(5).map(|mut b| { b.truncate(200); b }).collect();
    if blobs.is_empty() {
        blobs.push(vec![0u8; 1]);
    }
    blobs
}

quickcheck! {
    // Property 1: round-trip preserves every item's bytes, id, and length.
    fn prop_roundtrip(raw_blobs: Vec<Vec<u8>>, key_seed: u8) -> bool {
        let blobs = cap_blobs(raw_blobs);
        let backend = RustCryptoBackend;
        let pre_key = Protected::from(vec![key_seed.wrapping_add(1); 16]);
        let request = simple_request(pre_key.clone(), vec![key_seed; 32], vec![key_seed; 8]);

        let mut writer = WriteSession::new(&backend);
        if writer.write_header(&request, chunk_items(&blobs), None).is_err() { return false; }
        if writer.seal_manifest().is_err() { return false; }
        if writer.write_payload().is_err() { return false; }
        let package = match writer.finish() { Ok(p) => p, Err(_) => return false };

        let provider = SymmetricKeyProvider::new(vec![pre_key]);
        let mut reader = ReadSession::new(&backend, package);
        if reader.parse_header().is_err() { return false; }
        if reader.verify_manifest(&provider).is_err() { return false; }
        let mut recovered = match reader.read_payload() { Ok(r) => r, Err(_) => return false };
        if reader.finish().is_err() { return false; }

        recovered.sort_by_key(|(id, _)| id.0);
        recovered.len() == blobs.len()
            && recovered.iter().zip(blobs.iter()).all(|((_, got), want)| got == want)
    }

    // Property 2: flipping any single byte of a sealed package causes a
    // verification failure somewhere (manifest, item, or trailer scope),
    // never a silent successful decode of wrong bytes.
    fn prop_bitflip_always_fails(raw_blobs: Vec<Vec<u8>>, key_seed: u8, flip_at: usize) -> bool {
        let blobs = cap_blobs(raw_blobs);
        let backend = RustCryptoBackend;
        let pre_key = Protected::from(vec![key_seed.wrapping_add(3); 16]);
        let request = simple_request(pre_key.clone(), vec![key_seed.wrapping_add(5); 32], vec![key_seed; 8]);

        let mut writer = WriteSession::new(&backend);
        if writer.write_header(&request, chunk_items(&blobs), None).is_err() { return true; }
        if writer.seal_manifest().is_err() { return true; }
        if writer.write_payload().is_err() { return true; }
        let mut package = match writer.finish() { Ok(p) => p, Err(_) => return true };
        if package.is_empty() { return true; }

        let idx = flip_at % package.len();
        package[idx] ^= 0x01;

        let provider = SymmetricKeyProvider::new(vec![pre_key]);
        let mut reader = ReadSession::new(&backend, package);
        let outcome = (|| -> sealmux::error::Result<()> {
            reader.parse_header()?;
            reader.verify_manifest(&provider)?;
            let recovered = reader.read_payload()?;
            reader.finish()?;
            // A flipped header/version byte can legitimately be rejected
            // by parse_header with a non-auth error; everything past that
            // point must fail closed rather than decode silently-wrong
            // bytes, so a reported success is only acceptable if nothing
            // was actually corrupted in a way that changes the plaintext
            // (the flip landed in bytes not covered by any check, which
            // does not happen in this wire format once past the header).
            let _ = recovered;
            Ok(())
        })();
        outcome.is_err()
    }

    // Property 4: two writers given identical inputs and entropy seeds
    // produce byte-identical packages.
    fn prop_layout_determinism(raw_blobs: Vec<Vec<u8>>, key_seed: u8) -> bool {
        let blobs = cap_blobs(raw_blobs);
        let backend = RustCryptoBackend;
        let pre_key = Protected::from(vec![key_seed.wrapping_add(7); 16]);

        let run = || {
            let request = simple_request(pre_key.clone(), vec![key_seed; 32], vec![key_seed.wrapping_add(9); 8]);
            let mut writer = WriteSession::new(&backend);
            writer.write_header(&request, chunk_items(&blobs), None).unwrap();
            writer.seal_manifest().unwrap();
            writer.write_payload().unwrap();
            writer.finish().unwrap()
        };

        run() == run()
    }

    // Property 6: Fabric weaving recovers every item's exact ciphertext,
    // regardless of how many stripes it took to drain each one.
    fn prop_fabric_fairness(raw_blobs: Vec<Vec<u8>>, stripe_seed: u8) -> bool {
        let blobs = cap_blobs(raw_blobs);
        let backend = RustCryptoBackend;
        let items: Vec<ItemCiphertext> = blobs
            .iter()
            .enumerate()
            .map(|(i, b)| ItemCiphertext { id: ItemId((i + 1) as u128), ciphertext: b.clone() })
            .collect();
        let spans: Vec<ItemSpan> = items.iter().map(|i| ItemSpan { id: i.id, ciphertext_len: i.ciphertext.len() as u64 }).collect();

        let min_stripe = (stripe_seed as u32 % 8) + 1;
        let params = FabricParams { min_stripe, max_stripe: min_stripe + 16 };

        let entropy_key = vec![stripe_seed; 32];
        let entropy_nonce = vec![stripe_seed.wrapping_add(1); 8];
        let mut write_entropy = EntropySource::Prng(
            sealmux::crypto::csprng::CsPrng::new(&backend, StreamCipherAlgorithm::Salsa20, &entropy_key, &entropy_nonce).unwrap(),
        );
        let (bytes, _) = match fabric::write(&items, &mut write_entropy, params) {
            Ok(v) => v,
            Err(_) => return false,
        };
        let total: usize = items.iter().map(|i| i.ciphertext.len()).sum();
        if bytes.len() != total { return false; }

        let mut read_entropy = EntropySource::Prng(
            sealmux::crypto::csprng::CsPrng::new(&backend, StreamCipherAlgorithm::Salsa20, &entropy_key, &entropy_nonce).unwrap(),
        );
        let recovered = match fabric::read(&spans, &mut read_entropy, params, &bytes) {
            Ok(v) => v,
            Err(_) => return false,
        };
        recovered.iter().zip(items.iter()).all(|(a, b)| a.id == b.id && a.ciphertext == b.ciphertext)
    }

    // Property 7: Frameshift's total overhead stays within
    // [2*n*min_pad, 2*n*max_pad] for n items.
    fn prop_frameshift_overhead_bound(raw_blobs: Vec<Vec<u8>>, pad_seed: u8) -> bool {
        let blobs = cap_blobs(raw_blobs);
        let items: Vec<ItemCiphertext> = blobs
            .iter()
            .enumerate()
            .map(|(i, b)| ItemCiphertext { id: ItemId((i + 1) as u128), ciphertext: b.clone() })
            .collect();
        let n = items.len() as u64;

        let min_padding = (pad_seed as u32 % 16) + 1;
        let params = FrameshiftParams { min_padding, max_padding: min_padding + 32 };

        let backend = RustCryptoBackend;
        let mut entropy = EntropySource::Prng(
            sealmux::crypto::csprng::CsPrng::new(&backend, StreamCipherAlgorithm::Salsa20, &[pad_seed; 32], &[pad_seed; 8]).unwrap(),
        );
        let (bytes, report) = match frameshift::write(&items, &mut entropy, params) {
            Ok(v) => v,
            Err(_) => return false,
        };
        let item_total: u64 = items.iter().map(|i| i.ciphertext.len() as u64).sum();

        bytes.len() as u64 == item_total + report.padding_overhead
            && report.padding_overhead >= 2 * n * min_padding as u64
            && report.padding_overhead <= 2 * n * params.max_padding as u64
    }
}

// Property 3: key confirmation correctness. Given N candidates of which
// exactly one is correct, the reader must select it; with none correct,
// it must raise NoMatchingKey. Expressed as explicit tests rather than a
// quickcheck! block since the interesting variable (which index is
// correct, if any) is small and enumerable.
#[test]
fn prop_key_confirmation_finds_the_right_candidate_among_many() {
    let backend = RustCryptoBackend;
    let correct = Protected::from(vec![0x5Eu8; 16]);
    let request = simple_request(correct.clone(), vec![0x5Eu8; 32], vec![0x5Eu8; 8]);

    let mut writer = WriteSession::new(&backend);
    writer.write_header(&request, vec![stream_item(1, b"payload".to_vec())], None).unwrap();
    writer.seal_manifest().unwrap();
    writer.write_payload().unwrap();
    let package = writer.finish().unwrap();

    for correct_index in 0..5usize {
        let mut candidates = Vec::new();
        for i in 0..5usize {
            if i == correct_index {
                candidates.push(correct.clone());
            } else {
                candidates.push(Protected::from(vec![i as u8; 16]));
            }
        }
        let provider = SymmetricKeyProvider::new(candidates);
        let mut reader = ReadSession::new(&backend, package.clone());
        reader.parse_header().unwrap();
        reader.verify_manifest(&provider).unwrap();
    }

    let wrong_candidates = (0..5usize).map(|i| Protected::from(vec![(i + 100) as u8; 16])).collect();
    let provider = SymmetricKeyProvider::new(wrong_candidates);
    let mut reader = ReadSession::new(&backend, package);
    reader.parse_header().unwrap();
    let err = reader.verify_manifest(&provider).unwrap_err();
    assert!(matches!(err, Error::NoMatchingKey));
}
