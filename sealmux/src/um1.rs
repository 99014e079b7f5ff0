//! UM1 one-pass unified-model Diffie-Hellman key agreement (spec.md
//! Section 6, `EcKeyAgreement`), used to establish a manifest key for
//! `ManifestKeyScheme::Um1Hybrid` packages without a second round trip.
//!
//! The sender combines a static-static and an ephemeral-static X25519
//! agreement into one shared secret:
//!
//! ```text
//! Z = DH(sender_static_sk, receiver_static_pk) || DH(ephemeral_sk, receiver_static_pk)
//! ```
//!
//! The receiver, holding only its own static secret plus the sender's
//! static public key and the ephemeral public key carried in the clear
//! header, recomputes the same `Z` since X25519 agreement is commutative
//! in its arguments: `DH(a, B) == DH(b, A)` for a keypair `(a, A)` and
//! `(b, B)`.

use crate::crypto::backend::Backend;
use crate::crypto::mem::Protected;
use crate::error::Result;

/// Runs the sender's half of UM1: generates a fresh ephemeral keypair and
/// returns `(shared_secret, ephemeral_public)`. The ephemeral public key
/// must be carried in the package header for the receiver to recover `Z`.
pub fn um1_initiate(
    backend: &dyn Backend,
    sender_static_secret: &Protected,
    receiver_static_public: &[u8; 32],
) -> Result<(Protected, [u8; 32])> {
    let (ephemeral_secret, ephemeral_public) = backend.x25519_generate_key()?;
    let z1 = backend.x25519_shared_point(sender_static_secret, receiver_static_public)?;
    let z2 = backend.x25519_shared_point(&ephemeral_secret, receiver_static_public)?;
    Ok((concat_shared(&z1, &z2), ephemeral_public))
}

/// Runs the receiver's half of UM1, recovering the same shared secret
/// `um1_initiate` produced.
pub fn um1_respond(
    backend: &dyn Backend,
    receiver_static_secret: &Protected,
    sender_static_public: &[u8; 32],
    ephemeral_public: &[u8; 32],
) -> Result<Protected> {
    let z1 = backend.x25519_shared_point(receiver_static_secret, sender_static_public)?;
    let z2 = backend.x25519_shared_point(receiver_static_secret, ephemeral_public)?;
    Ok(concat_shared(&z1, &z2))
}

fn concat_shared(z1: &Protected, z2: &Protected) -> Protected {
    let mut z = Vec::with_capacity(z1.len() + z2.len());
    z.extend_from_slice(z1);
    z.extend_from_slice(z2);
    Protected::from(z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::backend::rustcrypto::RustCryptoBackend;

    #[test]
    fn initiate_and_respond_agree() {
        let backend = RustCryptoBackend;
        let (sender_sk, _sender_pk) = backend.x25519_generate_key().unwrap();
        let (receiver_sk, receiver_pk) = backend.x25519_generate_key().unwrap();
        let sender_pk = backend.x25519_derive_public(&sender_sk).unwrap();

        let (ss_initiator, ephemeral_pk) =
            um1_initiate(&backend, &sender_sk, &receiver_pk).unwrap();
        let ss_responder =
            um1_respond(&backend, &receiver_sk, &sender_pk, &ephemeral_pk).unwrap();

        assert_eq!(&*ss_initiator, &*ss_responder);
    }

    #[test]
    fn wrong_receiver_key_disagrees() {
        let backend = RustCryptoBackend;
        let (sender_sk, _) = backend.x25519_generate_key().unwrap();
        let (_receiver_sk, receiver_pk) = backend.x25519_generate_key().unwrap();
        let (wrong_sk, _) = backend.x25519_generate_key().unwrap();
        let sender_pk = backend.x25519_derive_public(&sender_sk).unwrap();

        let (ss_initiator, ephemeral_pk) =
            um1_initiate(&backend, &sender_sk, &receiver_pk).unwrap();
        let ss_wrong = um1_respond(&backend, &wrong_sk, &sender_pk, &ephemeral_pk).unwrap();

        assert_ne!(&*ss_initiator, &*ss_wrong);
    }
}
