//! Frameshift layout (spec.md Section 4.5): the Simple ordering step, plus
//! a pseudo-random padding span before and after each item.
//!
//! Per the resolved open question in spec.md Section 9 (see DESIGN.md),
//! padding length and padding byte content are drawn from the same
//! `EntropySource` used for ordering, not a separately domain-separated
//! stream — so every draw below, in both `write` and `read`, must happen
//! in the exact same order for the two sides to stay synchronized.

use super::{ItemCiphertext, ItemSpan, MultiplexReport};
use crate::crypto::csprng::EntropySource;
use crate::error::{Error, Result};
use crate::manifest::FrameshiftParams;

/// Weaves `items` with leading/trailing padding per item.
pub fn write(
    items: &[ItemCiphertext],
    entropy: &mut EntropySource,
    params: FrameshiftParams,
) -> Result<(Vec<u8>, MultiplexReport)> {
    let order = super::shuffle_order(items.len(), entropy)?;
    let mut out = Vec::new();
    let mut overhead = 0u64;

    for idx in order {
        overhead += emit_padding(entropy, params, &mut out)?;
        out.extend_from_slice(&items[idx].ciphertext);
        overhead += emit_padding(entropy, params, &mut out)?;
    }

    Ok((out, MultiplexReport { padding_overhead: overhead }))
}

/// Reverses [`write`]: reproduces the same order and padding draws,
/// discarding padding bytes and collecting each item's ciphertext span.
pub fn read(
    spans: &[ItemSpan],
    entropy: &mut EntropySource,
    params: FrameshiftParams,
    input: &[u8],
) -> Result<Vec<ItemCiphertext>> {
    let order = super::shuffle_order(spans.len(), entropy)?;
    let mut out: Vec<Option<ItemCiphertext>> = vec![None; spans.len()];
    let mut cursor = 0usize;

    for idx in order {
        cursor = skip_padding(entropy, params, input, cursor)?;

        let len = spans[idx].ciphertext_len as usize;
        let end = cursor.checked_add(len).ok_or(Error::TruncatedPayload)?;
        if end > input.len() {
            return Err(Error::TruncatedPayload);
        }
        out[idx] = Some(ItemCiphertext {
            id: spans[idx].id,
            ciphertext: input[cursor..end].to_vec(),
        });
        cursor = end;

        cursor = skip_padding(entropy, params, input, cursor)?;
    }

    if cursor != input.len() {
        return Err(Error::TruncatedPayload);
    }
    Ok(out.into_iter().map(|o| o.expect("every span filled exactly once")).collect())
}

fn draw_padding_len(entropy: &mut EntropySource, params: FrameshiftParams) -> Result<usize> {
    let len = entropy.next_in_range(params.min_padding as i32, params.max_padding as i32 + 1)?;
    Ok(len.max(0) as usize)
}

fn emit_padding(
    entropy: &mut EntropySource,
    params: FrameshiftParams,
    out: &mut Vec<u8>,
) -> Result<u64> {
    let len = draw_padding_len(entropy, params)?;
    let mut pad = vec![0u8; len];
    entropy.next_bytes(&mut pad)?;
    out.extend_from_slice(&pad);
    Ok(len as u64)
}

fn skip_padding(
    entropy: &mut EntropySource,
    params: FrameshiftParams,
    input: &[u8],
    cursor: usize,
) -> Result<usize> {
    let len = draw_padding_len(entropy, params)?;
    let mut discard = vec![0u8; len];
    entropy.next_bytes(&mut discard)?;
    let end = cursor.checked_add(len).ok_or(Error::TruncatedPayload)?;
    if end > input.len() {
        return Err(Error::TruncatedPayload);
    }
    Ok(end)
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
        let key = vec![0x3Du8; 32];
        let nonce = vec![0x03u8; 8];
        EntropySource::Prng(CsPrng::new(&backend, StreamCipherAlgorithm::Salsa20, &key, &nonce).unwrap())
    }

    #[test]
    fn roundtrip_and_overhead_bound() {
        let items = vec![
            ItemCiphertext { id: ItemId(1), ciphertext: b"hello world".to_vec() },
            ItemCiphertext { id: ItemId(2), ciphertext: b"x".to_vec() },
        ];
        let spans: Vec<ItemSpan> = items
            .iter()
            .map(|i| ItemSpan { id: i.id, ciphertext_len: i.ciphertext.len() as u64 })
            .collect();
        let params = FrameshiftParams { min_padding: 4, max_padding: 12 };

        let (bytes, report) = write(&items, &mut entropy(), params).unwrap();
        let n = items.len() as u64;
        assert!(report.padding_overhead >= 2 * n * params.min_padding as u64);
        assert!(report.padding_overhead <= 2 * n * params.max_padding as u64);

        let item_total: usize = items.iter().map(|i| i.ciphertext.len()).sum();
        assert_eq!(bytes.len() as u64, item_total as u64 + report.padding_overhead);

        let recovered = read(&spans, &mut entropy(), params, &bytes).unwrap();
        for (original, back) in items.iter().zip(recovered.iter()) {
            assert_eq!(original.id, back.id);
            assert_eq!(original.ciphertext, back.ciphertext);
        }
    }
}
