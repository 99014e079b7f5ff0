//! The crypto-backend abstraction.
//!
//! Mirrors the split the teacher uses between a small set of trait
//! objects at session-construction boundaries and tagged enums for the
//! hot inner loop (spec.md Section 9, "Dynamic dispatch over
//! primitives"). [`Backend`] is the factory a [`crate::manifest::pipeline`]
//! session is constructed with; it hands out narrow, `Send` trait objects
//! for the actual byte-level work.

#[cfg(feature = "backend-rustcrypto")]
pub mod rustcrypto;

use crate::crypto::mem::Protected;
use crate::error::Result;
use crate::registry::{
    BlockCipherAlgorithm, BlockCipherMode, HashAlgorithm, MacAlgorithm,
    StreamCipherAlgorithm,
};

/// KDF cost parameters. Which variant is meaningful depends on the
/// [`crate::registry::KdfAlgorithm`] selected.
#[derive(Clone, Copy, Debug)]
pub enum KdfParams {
    /// scrypt cost parameters.
    Scrypt {
        /// CPU/memory cost, as a power of two (`N = 2^log_n`).
        log_n: u8,
        /// Block size parameter.
        r: u32,
        /// Parallelization parameter.
        p: u32,
    },
    /// PBKDF2 iteration count.
    Pbkdf2 {
        /// Number of HMAC iterations.
        iterations: u32,
    },
}

/// A keystream-producing cipher: stream ciphers, and the non-AEAD block
/// modes (CTR, CFB, OFB), which all reduce to the same `StreamCipher`
/// shape once keyed.
pub trait KeystreamCipher: Send {
    /// XORs `buf` in place with the next `buf.len()` keystream bytes.
    fn apply_keystream(&mut self, buf: &mut [u8]);
}

#[cfg(feature = "backend-rustcrypto")]
impl<T: cipher::StreamCipher + Send + 'static> KeystreamCipher for T {
    fn apply_keystream(&mut self, buf: &mut [u8]) {
        cipher::StreamCipher::apply_keystream(self, buf);
    }
}

// `cfb_mode`'s `Encryptor`/`Decryptor` don't implement `cipher::StreamCipher`
// (CFB is block-chained, not a pure keystream); its buffered variants expose
// the same incremental `apply_keystream` shape as an inherent method instead.
// A local newtype sidesteps the coherence conflict with the blanket
// `StreamCipher` impl above.
/// Newtype around [`cfb_mode::BufEncryptor`] so it can implement
/// [`KeystreamCipher`] without conflicting with the blanket `StreamCipher` impl.
#[cfg(feature = "backend-rustcrypto")]
pub struct CfbBufEncryptor<C>(pub cfb_mode::BufEncryptor<C>)
where
    C: cipher::BlockEncryptMut + cipher::BlockCipher;

#[cfg(feature = "backend-rustcrypto")]
impl<C> KeystreamCipher for CfbBufEncryptor<C>
where
    C: cipher::BlockEncryptMut + cipher::BlockCipher + Send + 'static,
{
    fn apply_keystream(&mut self, buf: &mut [u8]) {
        self.0.encrypt(buf);
    }
}

/// Newtype around [`cfb_mode::BufDecryptor`] so it can implement
/// [`KeystreamCipher`] without conflicting with the blanket `StreamCipher` impl.
#[cfg(feature = "backend-rustcrypto")]
pub struct CfbBufDecryptor<C>(pub cfb_mode::BufDecryptor<C>)
where
    C: cipher::BlockEncryptMut + cipher::BlockCipher;

#[cfg(feature = "backend-rustcrypto")]
impl<C> KeystreamCipher for CfbBufDecryptor<C>
where
    C: cipher::BlockEncryptMut + cipher::BlockCipher + Send + 'static,
{
    fn apply_keystream(&mut self, buf: &mut [u8]) {
        self.0.decrypt(buf);
    }
}

/// A raw block primitive: single-block encrypt/decrypt, used by the
/// cipher stream wrapper to implement CBC chaining and padding itself.
pub trait BlockPrimitive: Send {
    /// The primitive's fixed block size, in bytes.
    fn block_size(&self) -> usize;
    /// Encrypts exactly one block in place.
    fn encrypt_block(&self, block: &mut [u8]);
    /// Decrypts exactly one block in place.
    fn decrypt_block(&self, block: &mut [u8]);
}

/// An authenticated cipher (GCM, EAX): produces/consumes ciphertext and a
/// detached tag in one shot per chunk.
pub trait AeadCipher: Send {
    /// Encrypts `plaintext`, returning `(ciphertext, tag)`.
    fn encrypt(&self, nonce: &[u8], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)>;
    /// Decrypts `ciphertext` against the detached `tag`.
    fn decrypt(&self, nonce: &[u8], ciphertext: &[u8], tag: &[u8]) -> Result<Vec<u8>>;
    /// The tag size, in bytes.
    fn tag_size(&self) -> usize;
}

/// A streaming MAC.
pub trait MacEngine: Send {
    /// Folds `data` into the running MAC.
    fn update(&mut self, data: &[u8]);
    /// Consumes the engine, producing the final tag.
    fn finalize(self: Box<Self>) -> Vec<u8>;
    /// The tag size, in bytes.
    fn tag_size(&self) -> usize;
}

/// A streaming (unkeyed) hash.
pub trait HashEngine: Send {
    /// Folds `data` into the running hash.
    fn update(&mut self, data: &[u8]);
    /// Consumes the engine, producing the final digest.
    fn finalize(self: Box<Self>) -> Vec<u8>;
    /// The digest size, in bytes.
    fn digest_size(&self) -> usize;
}

/// Factory for concrete primitive implementations.
///
/// A packaging session is constructed with a `&dyn Backend` and never
/// reaches around it to a concrete cipher crate. Swapping backends (for
/// instance, to one wired to a hardware security module) only requires a
/// new `impl Backend`.
pub trait Backend: Send + Sync {
    /// A short, human-readable name for inclusion in diagnostics.
    fn name(&self) -> &'static str;

    /// Fills `buf` with cryptographically secure random bytes.
    fn random(&self, buf: &mut [u8]) -> Result<()>;

    /// Constructs a keystream cipher.
    fn new_keystream_cipher(
        &self,
        algo: StreamCipherAlgorithm,
        key: &[u8],
        nonce: &[u8],
    ) -> Result<Box<dyn KeystreamCipher>>;

    /// Constructs a raw block primitive (for CBC/padding handling).
    fn new_block_primitive(
        &self,
        algo: BlockCipherAlgorithm,
        key: &[u8],
    ) -> Result<Box<dyn BlockPrimitive>>;

    /// Constructs a keystream cipher for a non-AEAD block mode (CTR, CFB,
    /// OFB). `encrypting` only matters for CFB, whose encryptor and
    /// decryptor are distinct types; CTR and OFB ignore it.
    fn new_block_mode_keystream(
        &self,
        algo: BlockCipherAlgorithm,
        mode: BlockCipherMode,
        key: &[u8],
        iv: &[u8],
        encrypting: bool,
    ) -> Result<Box<dyn KeystreamCipher>>;

    /// Constructs an AEAD cipher.
    fn new_aead(
        &self,
        algo: BlockCipherAlgorithm,
        mode: BlockCipherMode,
        key: &[u8],
    ) -> Result<Box<dyn AeadCipher>>;

    /// Constructs a keyed MAC.
    fn new_mac(&self, algo: MacAlgorithm, key: &[u8]) -> Result<Box<dyn MacEngine>>;

    /// Constructs an unkeyed hash.
    fn new_hash(&self, algo: HashAlgorithm) -> Result<Box<dyn HashEngine>>;

    /// Derives a key from `pre_key` and `salt` using the configured KDF.
    fn kdf(
        &self,
        algo: crate::registry::KdfAlgorithm,
        pre_key: &[u8],
        salt: &[u8],
        out_len: usize,
        params: KdfParams,
    ) -> Result<Protected>;

    /// Generates an X25519 key pair, returning `(secret, public)`.
    fn x25519_generate_key(&self) -> Result<(Protected, [u8; 32])>;

    /// Computes the X25519 public key for a given secret.
    fn x25519_derive_public(&self, secret: &Protected) -> Result<[u8; 32]>;

    /// Computes the X25519 shared point.
    fn x25519_shared_point(
        &self,
        secret: &Protected,
        public: &[u8; 32],
    ) -> Result<Protected>;

    /// Generates an Ed25519 key pair, returning `(secret, public)`.
    fn ed25519_generate_key(&self) -> Result<(Protected, [u8; 32])>;

    /// Signs `digest` with an Ed25519 secret key.
    fn ed25519_sign(&self, secret: &Protected, digest: &[u8]) -> Result<[u8; 64]>;

    /// Verifies an Ed25519 signature.
    fn ed25519_verify(
        &self,
        public: &[u8; 32],
        digest: &[u8],
        signature: &[u8; 64],
    ) -> Result<bool>;
}
