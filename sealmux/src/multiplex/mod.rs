//! The payload multiplexer (spec.md Section 4.5).
//!
//! The three layouts operate purely on already-enciphered item bytes: a
//! `PayloadItem`'s cipher and MAC (spec.md Sections 4.2/4.3) are applied by
//! the manifest pipeline before a layout ever sees the item, since a
//! MAC scoped to a single item's ciphertext is the same tag whether it is
//! folded in one pass or split across the interleaved stripes a Fabric
//! write actually emits it in. This lets each layout be a pure,
//! easily-tested function of `(items, entropy)` with no cipher state of
//! its own — see DESIGN.md.

pub mod fabric;
pub mod frameshift;
pub mod simple;

use crate::crypto::csprng::EntropySource;
use crate::error::Result;
use crate::manifest::{ItemId, LayoutScheme, PayloadConfiguration};

/// A single item's complete ciphertext, ready to be woven into a package.
#[derive(Clone, Debug)]
pub struct ItemCiphertext {
    /// The item's identifier.
    pub id: ItemId,
    /// The item's ciphertext, with no tag attached: AEAD tags and MAC
    /// tags alike live only in the manifest's `ItemMacConfig`, recovered
    /// once the manifest itself is decrypted.
    pub ciphertext: Vec<u8>,
}

/// An item's identity and ciphertext length, known to the reader from the
/// already-decrypted manifest before any payload bytes are consumed.
#[derive(Clone, Copy, Debug)]
pub struct ItemSpan {
    /// The item's identifier.
    pub id: ItemId,
    /// The item's ciphertext length, in bytes.
    pub ciphertext_len: u64,
}

/// Bookkeeping a multiplexer run reports back to the manifest pipeline.
#[derive(Clone, Copy, Debug, Default)]
pub struct MultiplexReport {
    /// Total padding bytes emitted (Frameshift only; zero otherwise).
    pub padding_overhead: u64,
}

/// Builds a Fisher-Yates permutation of `0..n` via bounded PRNG draws
/// (spec.md Section 4.5, "Simple layout"). Shared by Simple and Frameshift,
/// which use an identical ordering step.
pub fn shuffle_order(n: usize, entropy: &mut EntropySource) -> Result<Vec<usize>> {
    let mut order: Vec<usize> = (0..n).collect();
    if n > 1 {
        for i in (1..n).rev() {
            let j = entropy.next_bounded((i + 1) as i32)? as usize;
            order.swap(i, j);
        }
    }
    Ok(order)
}

/// Weaves `items` into a single ciphertext stream per `config`.
pub fn write(
    config: &PayloadConfiguration,
    items: &[ItemCiphertext],
    entropy: &mut EntropySource,
) -> Result<(Vec<u8>, MultiplexReport)> {
    match config.scheme {
        LayoutScheme::Simple => simple::write(items, entropy),
        LayoutScheme::Frameshift => {
            let params = config.frameshift.unwrap_or_default();
            frameshift::write(items, entropy, params)
        }
        LayoutScheme::Fabric => {
            let params = config.fabric.ok_or_else(missing_fabric_params)?;
            fabric::write(items, entropy, params)
        }
    }
}

/// Reverses [`write`], reassembling each item's full ciphertext from the
/// multiplexed `input`.
pub fn read(
    config: &PayloadConfiguration,
    spans: &[ItemSpan],
    entropy: &mut EntropySource,
    input: &[u8],
) -> Result<Vec<ItemCiphertext>> {
    match config.scheme {
        LayoutScheme::Simple => simple::read(spans, entropy, input),
        LayoutScheme::Frameshift => {
            let params = config.frameshift.unwrap_or_default();
            frameshift::read(spans, entropy, params, input)
        }
        LayoutScheme::Fabric => {
            let params = config.fabric.ok_or_else(missing_fabric_params)?;
            fabric::read(spans, entropy, params, input)
        }
    }
}

fn missing_fabric_params() -> crate::error::Error {
    crate::error::Error::InvalidConfiguration {
        what: "Fabric layout selected without stripe parameters".into(),
        allowed: "a PayloadConfiguration.fabric value".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::backend::rustcrypto::RustCryptoBackend;
    use crate::crypto::csprng::CsPrng;
    use crate::registry::StreamCipherAlgorithm;

    fn entropy() -> EntropySource {
        let backend = RustCryptoBackend;
        let key = vec![0x5Au8; 32];
        let nonce = vec![0x01u8; 8];
        EntropySource::Prng(CsPrng::new(&backend, StreamCipherAlgorithm::Salsa20, &key, &nonce).unwrap())
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut e = entropy();
        let order = shuffle_order(7, &mut e).unwrap();
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, vec![0, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn shuffle_of_zero_or_one_is_trivial() {
        let mut e = entropy();
        assert_eq!(shuffle_order(0, &mut e).unwrap(), Vec::<usize>::new());
        assert_eq!(shuffle_order(1, &mut e).unwrap(), vec![0]);
    }
}
