//! Fabric layout (spec.md Section 4.5): interleaves items stripe by stripe,
//! picking the next item from an "active set" of items that still have
//! unwritten ciphertext.
//!
//! Per the resolved open question in spec.md Section 9 (see DESIGN.md), the
//! active set preserves insertion order as items complete and drop out of
//! it — it is a `Vec<usize>` pruned with `remove`, never `swap_remove`, so
//! a given seed always drives the same sequence of stripe choices.

use super::{ItemCiphertext, ItemSpan, MultiplexReport};
use crate::crypto::csprng::EntropySource;
use crate::error::{Error, Result};
use crate::manifest::FabricParams;

/// Interleaves `items` into stripes of pseudo-random length.
pub fn write(
    items: &[ItemCiphertext],
    entropy: &mut EntropySource,
    params: FabricParams,
) -> Result<(Vec<u8>, MultiplexReport)> {
    let mut remaining: Vec<u64> = items.iter().map(|i| i.ciphertext.len() as u64).collect();
    let mut cursor: Vec<usize> = vec![0; items.len()];
    let mut active: Vec<usize> = (0..items.len()).filter(|&i| remaining[i] > 0).collect();

    let total: u64 = remaining.iter().sum();
    let mut out = Vec::with_capacity(total as usize);

    while !active.is_empty() {
        let slot = pick_active_slot(entropy, active.len())?;
        let item_idx = active[slot];
        let stripe = draw_stripe_len(entropy, params, remaining[item_idx])?;

        let start = cursor[item_idx];
        let end = start + stripe;
        out.extend_from_slice(&items[item_idx].ciphertext[start..end]);
        cursor[item_idx] = end;
        remaining[item_idx] -= stripe as u64;

        if remaining[item_idx] == 0 {
            active.remove(slot);
        }
    }

    Ok((out, MultiplexReport::default()))
}

/// Reverses [`write`]: reproduces the same stripe-selection sequence,
/// reading `input` sequentially and sorting each stripe into its item.
pub fn read(
    spans: &[ItemSpan],
    entropy: &mut EntropySource,
    params: FabricParams,
    input: &[u8],
) -> Result<Vec<ItemCiphertext>> {
    let mut remaining: Vec<u64> = spans.iter().map(|s| s.ciphertext_len).collect();
    let mut out_bufs: Vec<Vec<u8>> = spans
        .iter()
        .map(|s| Vec::with_capacity(s.ciphertext_len as usize))
        .collect();
    let mut active: Vec<usize> = (0..spans.len()).filter(|&i| remaining[i] > 0).collect();
    let mut input_cursor = 0usize;

    while !active.is_empty() {
        let slot = pick_active_slot(entropy, active.len())?;
        let item_idx = active[slot];
        let stripe = draw_stripe_len(entropy, params, remaining[item_idx])?;

        let end = input_cursor.checked_add(stripe).ok_or(Error::TruncatedPayload)?;
        if end > input.len() {
            return Err(Error::TruncatedPayload);
        }
        out_bufs[item_idx].extend_from_slice(&input[input_cursor..end]);
        input_cursor = end;
        remaining[item_idx] -= stripe as u64;

        if remaining[item_idx] == 0 {
            active.remove(slot);
        }
    }

    if input_cursor != input.len() {
        return Err(Error::TruncatedPayload);
    }
    Ok(spans
        .iter()
        .zip(out_bufs)
        .map(|(s, buf)| ItemCiphertext { id: s.id, ciphertext: buf })
        .collect())
}

/// If more than one item remains active, draws a uniform pick among them;
/// with exactly one left there is nothing to decide, and no draw is made.
fn pick_active_slot(entropy: &mut EntropySource, active_len: usize) -> Result<usize> {
    if active_len > 1 {
        Ok(entropy.next_bounded(active_len as i32)? as usize)
    } else {
        Ok(0)
    }
}

fn draw_stripe_len(entropy: &mut EntropySource, params: FabricParams, remaining: u64) -> Result<usize> {
    let s = entropy.next_in_range(params.min_stripe as i32, params.max_stripe as i32 + 1)?;
    Ok((s.max(0) as u64).min(remaining) as usize)
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
        let key = vec![0x7Eu8; 32];
        let nonce = vec![0x04u8; 8];
        EntropySource::Prng(CsPrng::new(&backend, StreamCipherAlgorithm::Salsa20, &key, &nonce).unwrap())
    }

    fn sample_items() -> Vec<ItemCiphertext> {
        vec![
            ItemCiphertext { id: ItemId(1), ciphertext: vec![0xAAu8; 13] },
            ItemCiphertext { id: ItemId(2), ciphertext: vec![0xBBu8; 777] },
            ItemCiphertext { id: ItemId(3), ciphertext: vec![0xCCu8; 4096] },
        ]
    }

    #[test]
    fn roundtrip_interleaves_and_recovers() {
        let items = sample_items();
        let spans: Vec<ItemSpan> = items
            .iter()
            .map(|i| ItemSpan { id: i.id, ciphertext_len: i.ciphertext.len() as u64 })
            .collect();
        let params = FabricParams { min_stripe: 16, max_stripe: 64 };

        let (bytes, _) = write(&items, &mut entropy(), params).unwrap();
        let total: usize = items.iter().map(|i| i.ciphertext.len()).sum();
        assert_eq!(bytes.len(), total);

        let recovered = read(&spans, &mut entropy(), params, &bytes).unwrap();
        for (original, back) in items.iter().zip(recovered.iter()) {
            assert_eq!(original.id, back.id);
            assert_eq!(original.ciphertext, back.ciphertext);
        }
    }

    #[test]
    fn single_item_never_draws_a_pick() {
        let items = vec![ItemCiphertext { id: ItemId(1), ciphertext: vec![0x11u8; 40] }];
        let spans = vec![ItemSpan { id: ItemId(1), ciphertext_len: 40 }];
        let params = FabricParams { min_stripe: 8, max_stripe: 8 };
        let (bytes, _) = write(&items, &mut entropy(), params).unwrap();
        let recovered = read(&spans, &mut entropy(), params, &bytes).unwrap();
        assert_eq!(recovered[0].ciphertext, items[0].ciphertext);
    }

    #[test]
    fn truncated_input_fails() {
        let items = sample_items();
        let spans: Vec<ItemSpan> = items
            .iter()
            .map(|i| ItemSpan { id: i.id, ciphertext_len: i.ciphertext.len() as u64 })
            .collect();
        let params = FabricParams { min_stripe: 16, max_stripe: 64 };
        assert!(read(&spans, &mut entropy(), params, b"short").is_err());
    }
}
