//! The `KeyProvider` external-collaborator interface (spec.md Section 6):
//! candidate keys a reader tries in turn against a package's key
//! confirmation (or, lacking one, against the manifest MAC directly).
//!
//! Mirrors the teacher's own decrypt-side pattern of collecting every
//! secret the caller named (`--secret-key-file`, repeatable) into a
//! `Vec` and trying each one in turn (`sq/src/sq.rs`'s `load_keys` plus
//! `commands::decrypt`'s per-PKESK trial loop) rather than asking the
//! caller to pick the right key up front.

use crate::crypto::mem::Protected;
use crate::registry::EcCurve;

/// A candidate EC keypair for the UM1-hybrid trial-decryption path: the
/// reader's own static secret, paired with a sender static public key to
/// try it against.
#[derive(Clone)]
pub struct EcKeypairCandidate {
    /// The curve both keys live on.
    pub curve: EcCurve,
    /// The reader's static secret.
    pub receiver_secret: Protected,
    /// A sender static public key to pair it with.
    pub sender_public: [u8; 32],
}

/// Supplies the candidate keys a reader tries during manifest
/// trial-decryption (spec.md Section 4.6, read sequence step 1).
///
/// Borrowed for the duration of a single read; a packaging session never
/// stores a `&dyn KeyProvider` past the call that took it (spec.md
/// Section 9, "Cyclic key-management references").
pub trait KeyProvider {
    /// Candidate raw pre-keys for `ManifestKeyScheme::SymmetricDirect`.
    fn symmetric_candidates(&self) -> Vec<Protected>;

    /// Candidate EC keypairs for `ManifestKeyScheme::Um1Hybrid`.
    fn ec_candidates(&self) -> Vec<EcKeypairCandidate>;
}

/// A [`KeyProvider`] over a fixed list of raw symmetric pre-keys.
pub struct SymmetricKeyProvider {
    keys: Vec<Protected>,
}

impl SymmetricKeyProvider {
    /// Builds a provider from the given candidate pre-keys, tried in the
    /// order given.
    pub fn new(keys: Vec<Protected>) -> Self {
        SymmetricKeyProvider { keys }
    }
}

impl KeyProvider for SymmetricKeyProvider {
    fn symmetric_candidates(&self) -> Vec<Protected> {
        self.keys.clone()
    }

    fn ec_candidates(&self) -> Vec<EcKeypairCandidate> {
        Vec::new()
    }
}

/// A [`KeyProvider`] over a fixed list of candidate EC keypairs.
pub struct EcKeyProvider {
    candidates: Vec<EcKeypairCandidate>,
}

impl EcKeyProvider {
    /// Builds a provider from the given candidate keypairs, tried in the
    /// order given.
    pub fn new(candidates: Vec<EcKeypairCandidate>) -> Self {
        EcKeyProvider { candidates }
    }
}

impl KeyProvider for EcKeyProvider {
    fn symmetric_candidates(&self) -> Vec<Protected> {
        Vec::new()
    }

    fn ec_candidates(&self) -> Vec<EcKeypairCandidate> {
        self.candidates.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_provider_returns_keys_in_order() {
        let provider = SymmetricKeyProvider::new(vec![
            Protected::from(vec![1u8; 32]),
            Protected::from(vec![2u8; 32]),
        ]);
        let candidates = provider.symmetric_candidates();
        assert_eq!(candidates.len(), 2);
        assert_eq!(&*candidates[0], &[1u8; 32][..]);
        assert_eq!(&*candidates[1], &[2u8; 32][..]);
        assert!(provider.ec_candidates().is_empty());
    }

    #[test]
    fn ec_provider_returns_candidates() {
        let provider = EcKeyProvider::new(vec![EcKeypairCandidate {
            curve: EcCurve::Curve25519,
            receiver_secret: Protected::from(vec![3u8; 32]),
            sender_public: [4u8; 32],
        }]);
        assert_eq!(provider.ec_candidates().len(), 1);
        assert!(provider.symmetric_candidates().is_empty());
    }
}
