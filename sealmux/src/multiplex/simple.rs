//! Simple layout (spec.md Section 4.5): concatenation in a PRNG-chosen
//! order, no padding, no interleaving.

use super::{ItemCiphertext, ItemSpan, MultiplexReport};
use crate::crypto::csprng::EntropySource;
use crate::error::{Error, Result};

/// Concatenates `items` in an order chosen by a Fisher-Yates shuffle.
pub fn write(
    items: &[ItemCiphertext],
    entropy: &mut EntropySource,
) -> Result<(Vec<u8>, MultiplexReport)> {
    let order = super::shuffle_order(items.len(), entropy)?;
    let total: usize = items.iter().map(|i| i.ciphertext.len()).sum();
    let mut out = Vec::with_capacity(total);
    for idx in order {
        out.extend_from_slice(&items[idx].ciphertext);
    }
    Ok((out, MultiplexReport::default()))
}

/// Reverses [`write`]: reproduces the same shuffle, then slices `input`
/// into per-item ciphertext spans using each item's known length.
pub fn read(
    spans: &[ItemSpan],
    entropy: &mut EntropySource,
    input: &[u8],
) -> Result<Vec<ItemCiphertext>> {
    let order = super::shuffle_order(spans.len(), entropy)?;
    let mut out: Vec<Option<ItemCiphertext>> = vec![None; spans.len()];
    let mut cursor = 0usize;
    for idx in order {
        let len = spans[idx].ciphertext_len as usize;
        if cursor + len > input.len() {
            return Err(Error::TruncatedPayload);
        }
        out[idx] = Some(ItemCiphertext {
            id: spans[idx].id,
            ciphertext: input[cursor..cursor + len].to_vec(),
        });
        cursor += len;
    }
    if cursor != input.len() {
        return Err(Error::TruncatedPayload);
    }
    Ok(out.into_iter().map(|o| o.expect("every span filled exactly once")).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::backend::rustcrypto::RustCryptoBackend;
    use crate::crypto::csprng::CsPrng;
    use crate::manifest::ItemId;
    use crate::registry::StreamCipherAlgorithm;

    fn entropy() -> EntropySource {
        let backend = RustCryptoBackend;
        let key = vec![0x9Cu8; 32];
        let nonce = vec![0x02u8; 8];
        EntropySource::Prng(CsPrng::new(&backend, StreamCipherAlgorithm::Salsa20, &key, &nonce).unwrap())
    }

    #[test]
    fn roundtrip() {
        let items = vec![
            ItemCiphertext { id: ItemId(1), ciphertext: b"aaaaaaaaaa".to_vec() },
            ItemCiphertext { id: ItemId(2), ciphertext: b"bb".to_vec() },
            ItemCiphertext { id: ItemId(3), ciphertext: b"ccccc".to_vec() },
        ];
        let spans: Vec<ItemSpan> = items
            .iter()
            .map(|i| ItemSpan { id: i.id, ciphertext_len: i.ciphertext.len() as u64 })
            .collect();

        let (bytes, _) = write(&items, &mut entropy()).unwrap();
        let recovered = read(&spans, &mut entropy(), &bytes).unwrap();
        for (original, back) in items.iter().zip(recovered.iter()) {
            assert_eq!(original.id, back.id);
            assert_eq!(original.ciphertext, back.ciphertext);
        }
    }

    #[test]
    fn truncated_input_fails() {
        let items = vec![ItemCiphertext { id: ItemId(1), ciphertext: b"0123456789".to_vec() }];
        let spans = vec![ItemSpan { id: ItemId(1), ciphertext_len: 10 }];
        assert!(read(&spans, &mut entropy(), b"012").is_err());
    }
}
