//! The default backend, built on the RustCrypto family of crates.
//!
//! Grounded in the teacher's own swappable-backend pattern
//! (`crypto/backend/nettle`); where the teacher picks one backend at
//! compile time via Cargo features, this backend is selected the same
//! way (`backend-rustcrypto`, on by default) but is itself a `dyn
//! Backend` value so a caller can substitute another implementation
//! without recompiling the engine.

use aes::{Aes128, Aes192, Aes256};
use aes_gcm::{Aes128Gcm, Aes256Gcm};
use cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use digest::Digest;
use hmac::{Hmac, Mac as HmacMacTrait};
use rand::RngCore;

use crate::crypto::mem::Protected;
use crate::error::{Error, Result};
use crate::registry::{
    BlockCipherAlgorithm, BlockCipherMode, HashAlgorithm, KdfAlgorithm,
    MacAlgorithm, StreamCipherAlgorithm,
};

use super::{
    AeadCipher, Backend, BlockPrimitive, CfbBufDecryptor, CfbBufEncryptor, HashEngine,
    KdfParams, KeystreamCipher, MacEngine,
};

/// The default, RustCrypto-backed implementation of [`Backend`].
#[derive(Default)]
pub struct RustCryptoBackend;

impl Backend for RustCryptoBackend {
    fn name(&self) -> &'static str {
        "rustcrypto"
    }

    fn random(&self, buf: &mut [u8]) -> Result<()> {
        rand::rngs::OsRng.fill_bytes(buf);
        Ok(())
    }

    fn new_keystream_cipher(
        &self,
        algo: StreamCipherAlgorithm,
        key: &[u8],
        nonce: &[u8],
    ) -> Result<Box<dyn KeystreamCipher>> {
        use cipher::KeyIvInit;

        match algo {
            StreamCipherAlgorithm::Salsa20 => {
                let c = salsa20::Salsa20::new_from_slices(key, nonce)
                    .map_err(|_| invalid_len("Salsa20"))?;
                Ok(Box::new(c))
            }
            StreamCipherAlgorithm::XSalsa20 => {
                let c = salsa20::XSalsa20::new_from_slices(key, nonce)
                    .map_err(|_| invalid_len("XSalsa20"))?;
                Ok(Box::new(c))
            }
            StreamCipherAlgorithm::ChaCha20 => {
                let c = chacha20::ChaCha20::new_from_slices(key, nonce)
                    .map_err(|_| invalid_len("ChaCha20"))?;
                Ok(Box::new(c))
            }
            StreamCipherAlgorithm::Hc128
            | StreamCipherAlgorithm::Sosemanuk
            | StreamCipherAlgorithm::Rabbit => {
                Err(Error::InvalidConfiguration {
                    what: format!("{:?} has no wired backend implementation", algo),
                    allowed: "Salsa20, XSalsa20, ChaCha20".into(),
                })
            }
        }
    }

    fn new_block_primitive(
        &self,
        algo: BlockCipherAlgorithm,
        key: &[u8],
    ) -> Result<Box<dyn BlockPrimitive>> {
        match algo {
            BlockCipherAlgorithm::Aes => match key.len() {
                16 => Ok(Box::new(AesPrimitive::Aes128(
                    Aes128::new_from_slice(key).map_err(|_| invalid_len("AES-128"))?,
                ))),
                24 => Ok(Box::new(AesPrimitive::Aes192(
                    Aes192::new_from_slice(key).map_err(|_| invalid_len("AES-192"))?,
                ))),
                32 => Ok(Box::new(AesPrimitive::Aes256(
                    Aes256::new_from_slice(key).map_err(|_| invalid_len("AES-256"))?,
                ))),
                _ => Err(invalid_len("AES")),
            },
            BlockCipherAlgorithm::Twofish => {
                let c = twofish::Twofish::new_from_slice(key)
                    .map_err(|_| invalid_len("Twofish"))?;
                Ok(Box::new(TwofishPrimitive(c)))
            }
            BlockCipherAlgorithm::Serpent => Err(Error::InvalidConfiguration {
                what: "Serpent has no wired backend implementation".into(),
                allowed: "AES, Twofish".into(),
            }),
        }
    }

    fn new_block_mode_keystream(
        &self,
        algo: BlockCipherAlgorithm,
        mode: BlockCipherMode,
        key: &[u8],
        iv: &[u8],
        encrypting: bool,
    ) -> Result<Box<dyn KeystreamCipher>> {
        use cipher::KeyIvInit;

        match (algo, mode) {
            (BlockCipherAlgorithm::Aes, BlockCipherMode::Ctr) => match key.len() {
                16 => Ok(Box::new(
                    ctr::Ctr128BE::<Aes128>::new_from_slices(key, iv).map_err(|_| invalid_len("AES-CTR"))?,
                )),
                24 => Ok(Box::new(
                    ctr::Ctr128BE::<Aes192>::new_from_slices(key, iv).map_err(|_| invalid_len("AES-CTR"))?,
                )),
                32 => Ok(Box::new(
                    ctr::Ctr128BE::<Aes256>::new_from_slices(key, iv).map_err(|_| invalid_len("AES-CTR"))?,
                )),
                _ => Err(invalid_len("AES-CTR")),
            },
            (BlockCipherAlgorithm::Aes, BlockCipherMode::Ofb) => match key.len() {
                16 => Ok(Box::new(
                    ofb::Ofb::<Aes128>::new_from_slices(key, iv).map_err(|_| invalid_len("AES-OFB"))?,
                )),
                24 => Ok(Box::new(
                    ofb::Ofb::<Aes192>::new_from_slices(key, iv).map_err(|_| invalid_len("AES-OFB"))?,
                )),
                32 => Ok(Box::new(
                    ofb::Ofb::<Aes256>::new_from_slices(key, iv).map_err(|_| invalid_len("AES-OFB"))?,
                )),
                _ => Err(invalid_len("AES-OFB")),
            },
            (BlockCipherAlgorithm::Aes, BlockCipherMode::Cfb) => match (key.len(), encrypting) {
                (16, true) => Ok(Box::new(
                    CfbBufEncryptor(cfb_mode::BufEncryptor::<Aes128>::new_from_slices(key, iv).map_err(|_| invalid_len("AES-CFB"))?),
                )),
                (16, false) => Ok(Box::new(
                    CfbBufDecryptor(cfb_mode::BufDecryptor::<Aes128>::new_from_slices(key, iv).map_err(|_| invalid_len("AES-CFB"))?),
                )),
                (24, true) => Ok(Box::new(
                    CfbBufEncryptor(cfb_mode::BufEncryptor::<Aes192>::new_from_slices(key, iv).map_err(|_| invalid_len("AES-CFB"))?),
                )),
                (24, false) => Ok(Box::new(
                    CfbBufDecryptor(cfb_mode::BufDecryptor::<Aes192>::new_from_slices(key, iv).map_err(|_| invalid_len("AES-CFB"))?),
                )),
                (32, true) => Ok(Box::new(
                    CfbBufEncryptor(cfb_mode::BufEncryptor::<Aes256>::new_from_slices(key, iv).map_err(|_| invalid_len("AES-CFB"))?),
                )),
                (32, false) => Ok(Box::new(
                    CfbBufDecryptor(cfb_mode::BufDecryptor::<Aes256>::new_from_slices(key, iv).map_err(|_| invalid_len("AES-CFB"))?),
                )),
                _ => Err(invalid_len("AES-CFB")),
            },
            (BlockCipherAlgorithm::Twofish, BlockCipherMode::Ctr) => Ok(Box::new(
                ctr::Ctr128BE::<twofish::Twofish>::new_from_slices(key, iv).map_err(|_| invalid_len("Twofish-CTR"))?,
            )),
            (BlockCipherAlgorithm::Twofish, BlockCipherMode::Ofb) => Ok(Box::new(
                ofb::Ofb::<twofish::Twofish>::new_from_slices(key, iv).map_err(|_| invalid_len("Twofish-OFB"))?,
            )),
            (BlockCipherAlgorithm::Twofish, BlockCipherMode::Cfb) => {
                if encrypting {
                    Ok(Box::new(
                        CfbBufEncryptor(cfb_mode::BufEncryptor::<twofish::Twofish>::new_from_slices(key, iv)
                            .map_err(|_| invalid_len("Twofish-CFB"))?),
                    ))
                } else {
                    Ok(Box::new(
                        CfbBufDecryptor(cfb_mode::BufDecryptor::<twofish::Twofish>::new_from_slices(key, iv)
                            .map_err(|_| invalid_len("Twofish-CFB"))?),
                    ))
                }
            }
            (BlockCipherAlgorithm::Serpent, _) => Err(Error::InvalidConfiguration {
                what: "Serpent has no wired backend implementation".into(),
                allowed: "AES, Twofish".into(),
            }),
            (_, mode) => Err(Error::ModePaddingIncompatible(format!(
                "{:?} is not a keystream block mode", mode
            ))),
        }
    }

    fn new_aead(
        &self,
        algo: BlockCipherAlgorithm,
        mode: BlockCipherMode,
        key: &[u8],
    ) -> Result<Box<dyn AeadCipher>> {
        match (algo, mode) {
            (BlockCipherAlgorithm::Aes, BlockCipherMode::Gcm) => match key.len() {
                16 => Ok(Box::new(GcmCipher::Aes128(
                    Aes128Gcm::new_from_slice(key).map_err(|_| invalid_len("AES-128-GCM"))?,
                ))),
                32 => Ok(Box::new(GcmCipher::Aes256(
                    Aes256Gcm::new_from_slice(key).map_err(|_| invalid_len("AES-256-GCM"))?,
                ))),
                _ => Err(invalid_len("AES-GCM")),
            },
            (BlockCipherAlgorithm::Aes, BlockCipherMode::Eax) => {
                let c = eax::Eax::<Aes256>::new_from_slice(key)
                    .map_err(|_| invalid_len("AES-EAX"))?;
                Ok(Box::new(EaxCipher(c)))
            }
            _ => Err(Error::ModePaddingIncompatible(format!(
                "no AEAD implementation for {:?}/{:?}", algo, mode
            ))),
        }
    }

    fn new_mac(&self, algo: MacAlgorithm, key: &[u8]) -> Result<Box<dyn MacEngine>> {
        match algo {
            MacAlgorithm::HmacSha256 => {
                let m = <Hmac<sha2::Sha256> as HmacMacTrait>::new_from_slice(key)
                    .map_err(|_| invalid_len("HMAC-SHA256"))?;
                Ok(Box::new(HmacEngine32(m)))
            }
            MacAlgorithm::HmacSha512 => {
                let m = <Hmac<sha2::Sha512> as HmacMacTrait>::new_from_slice(key)
                    .map_err(|_| invalid_len("HMAC-SHA512"))?;
                Ok(Box::new(HmacEngine64(m)))
            }
            MacAlgorithm::CmacAes => {
                let m = match key.len() {
                    16 => <cmac::Cmac<Aes128> as HmacMacTrait>::new_from_slice(key)
                        .map(CmacVariant::Aes128)
                        .map_err(|_| invalid_len("CMAC-AES"))?,
                    24 => <cmac::Cmac<Aes192> as HmacMacTrait>::new_from_slice(key)
                        .map(CmacVariant::Aes192)
                        .map_err(|_| invalid_len("CMAC-AES"))?,
                    32 => <cmac::Cmac<Aes256> as HmacMacTrait>::new_from_slice(key)
                        .map(CmacVariant::Aes256)
                        .map_err(|_| invalid_len("CMAC-AES"))?,
                    _ => return Err(invalid_len("CMAC-AES")),
                };
                Ok(Box::new(m))
            }
            MacAlgorithm::Poly1305 => {
                if key.len() != 32 {
                    return Err(invalid_len("Poly1305"));
                }
                let mut k = [0u8; 32];
                k.copy_from_slice(key);
                Ok(Box::new(Poly1305Engine {
                    key: k,
                    buf: Vec::new(),
                }))
            }
            MacAlgorithm::Blake2bKeyed => {
                let m = <Blake2bMac256 as KeyInit>::new_from_slice(key)
                    .map_err(|_| invalid_len("keyed BLAKE2b"))?;
                Ok(Box::new(Blake2bMacEngine(m)))
            }
        }
    }

    fn new_hash(&self, algo: HashAlgorithm) -> Result<Box<dyn HashEngine>> {
        match algo {
            HashAlgorithm::Blake2b256 => Ok(Box::new(DigestEngine::<Blake2b256>::new(32))),
            HashAlgorithm::Blake2b512 => Ok(Box::new(DigestEngine::<blake2::Blake2b512>::new(64))),
            HashAlgorithm::Sha256 => Ok(Box::new(DigestEngine::<sha2::Sha256>::new(32))),
            HashAlgorithm::Sha512 => Ok(Box::new(DigestEngine::<sha2::Sha512>::new(64))),
            HashAlgorithm::Sha3_256 => Ok(Box::new(DigestEngine::<sha3::Sha3_256>::new(32))),
            HashAlgorithm::Ripemd160 => Ok(Box::new(DigestEngine::<ripemd::Ripemd160>::new(20))),
            HashAlgorithm::Whirlpool | HashAlgorithm::Tiger => {
                Err(Error::InvalidConfiguration {
                    what: format!("{:?} has no wired backend implementation", algo),
                    allowed: "BLAKE2b, SHA-256/512, SHA3-256, RIPEMD-160".into(),
                })
            }
        }
    }

    fn kdf(
        &self,
        algo: KdfAlgorithm,
        pre_key: &[u8],
        salt: &[u8],
        out_len: usize,
        params: KdfParams,
    ) -> Result<Protected> {
        let mut out = vec![0u8; out_len];
        match (algo, params) {
            (KdfAlgorithm::Scrypt, KdfParams::Scrypt { log_n, r, p }) => {
                let sp = scrypt::Params::new(log_n, r, p, out_len)
                    .map_err(|e| Error::InvalidConfiguration {
                        what: format!("bad scrypt parameters: {}", e),
                        allowed: "log_n in 1..64, r*p < 2^30".into(),
                    })?;
                scrypt::scrypt(pre_key, salt, &sp, &mut out)
                    .map_err(|_| Error::InvalidConfiguration {
                        what: "scrypt output length too large".into(),
                        allowed: "out_len <= (2^32 - 1) * 32".into(),
                    })?;
            }
            (KdfAlgorithm::Pbkdf2, KdfParams::Pbkdf2 { iterations }) => {
                pbkdf2::pbkdf2_hmac::<sha2::Sha256>(pre_key, salt, iterations, &mut out);
            }
            (algo, params) => {
                return Err(Error::InvalidConfiguration {
                    what: format!("KDF {:?} does not accept {:?} parameters", algo, params),
                    allowed: "matching KdfAlgorithm/KdfParams pair".into(),
                });
            }
        }
        Ok(Protected::new(out))
    }

    fn x25519_generate_key(&self) -> Result<(Protected, [u8; 32])> {
        let secret = x25519_dalek::StaticSecret::random_from_rng(rand::rngs::OsRng);
        let public = x25519_dalek::PublicKey::from(&secret);
        Ok((Protected::new(secret.to_bytes().to_vec()), public.to_bytes()))
    }

    fn x25519_derive_public(&self, secret: &Protected) -> Result<[u8; 32]> {
        let sk = static_secret_from(secret)?;
        Ok(x25519_dalek::PublicKey::from(&sk).to_bytes())
    }

    fn x25519_shared_point(
        &self,
        secret: &Protected,
        public: &[u8; 32],
    ) -> Result<Protected> {
        let sk = static_secret_from(secret)?;
        let pk = x25519_dalek::PublicKey::from(*public);
        let shared = sk.diffie_hellman(&pk);
        Ok(Protected::new(shared.to_bytes().to_vec()))
    }

    fn ed25519_generate_key(&self) -> Result<(Protected, [u8; 32])> {
        let signing = ed25519_dalek::SigningKey::generate(&mut rand::rngs::OsRng);
        let verifying = signing.verifying_key();
        Ok((
            Protected::new(signing.to_bytes().to_vec()),
            verifying.to_bytes(),
        ))
    }

    fn ed25519_sign(&self, secret: &Protected, digest: &[u8]) -> Result<[u8; 64]> {
        use ed25519_dalek::Signer;
        let sk = signing_key_from(secret)?;
        Ok(sk.sign(digest).to_bytes())
    }

    fn ed25519_verify(
        &self,
        public: &[u8; 32],
        digest: &[u8],
        signature: &[u8; 64],
    ) -> Result<bool> {
        use ed25519_dalek::Verifier;
        let vk = ed25519_dalek::VerifyingKey::from_bytes(public).map_err(|_| {
            Error::InvalidConfiguration {
                what: "malformed Ed25519 public key".into(),
                allowed: "32-byte compressed Edwards point".into(),
            }
        })?;
        let sig = ed25519_dalek::Signature::from_bytes(signature);
        Ok(vk.verify(digest, &sig).is_ok())
    }
}

fn invalid_len(what: &str) -> Error {
    Error::KeySizeMismatch {
        got: 0,
        expected: format!("a key size {} accepts", what),
    }
}

fn static_secret_from(secret: &Protected) -> Result<x25519_dalek::StaticSecret> {
    let bytes: [u8; 32] = (**secret).try_into().map_err(|_| invalid_len("X25519"))?;
    Ok(x25519_dalek::StaticSecret::from(bytes))
}

fn signing_key_from(secret: &Protected) -> Result<ed25519_dalek::SigningKey> {
    let bytes: [u8; 32] = (**secret).try_into().map_err(|_| invalid_len("Ed25519"))?;
    Ok(ed25519_dalek::SigningKey::from_bytes(&bytes))
}

// --- Block primitives ---------------------------------------------------

enum AesPrimitive {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl BlockPrimitive for AesPrimitive {
    fn block_size(&self) -> usize {
        16
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let b = cipher::generic_array::GenericArray::from_mut_slice(block);
        match self {
            AesPrimitive::Aes128(c) => c.encrypt_block(b),
            AesPrimitive::Aes192(c) => c.encrypt_block(b),
            AesPrimitive::Aes256(c) => c.encrypt_block(b),
        }
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let b = cipher::generic_array::GenericArray::from_mut_slice(block);
        match self {
            AesPrimitive::Aes128(c) => c.decrypt_block(b),
            AesPrimitive::Aes192(c) => c.decrypt_block(b),
            AesPrimitive::Aes256(c) => c.decrypt_block(b),
        }
    }
}

struct TwofishPrimitive(twofish::Twofish);

impl BlockPrimitive for TwofishPrimitive {
    fn block_size(&self) -> usize {
        16
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let b = cipher::generic_array::GenericArray::from_mut_slice(block);
        self.0.encrypt_block(b);
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let b = cipher::generic_array::GenericArray::from_mut_slice(block);
        self.0.decrypt_block(b);
    }
}

// --- AEAD ----------------------------------------------------------------

enum GcmCipher {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

impl AeadCipher for GcmCipher {
    fn encrypt(&self, nonce: &[u8], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        use aes_gcm::aead::{AeadInPlace, generic_array::GenericArray};
        let mut buf = plaintext.to_vec();
        let n = GenericArray::from_slice(nonce);
        let tag = match self {
            GcmCipher::Aes128(c) => c.encrypt_in_place_detached(n, b"", &mut buf),
            GcmCipher::Aes256(c) => c.encrypt_in_place_detached(n, b"", &mut buf),
        }
        .map_err(|_| Error::InvalidConfiguration {
            what: "AEAD encryption failed".into(),
            allowed: "nonce of the configured size".into(),
        })?;
        Ok((buf, tag.to_vec()))
    }

    fn decrypt(&self, nonce: &[u8], ciphertext: &[u8], tag: &[u8]) -> Result<Vec<u8>> {
        use aes_gcm::aead::{AeadInPlace, generic_array::GenericArray};
        let mut buf = ciphertext.to_vec();
        let n = GenericArray::from_slice(nonce);
        let t = GenericArray::from_slice(tag);
        let r = match self {
            GcmCipher::Aes128(c) => c.decrypt_in_place_detached(n, b"", &mut buf, t),
            GcmCipher::Aes256(c) => c.decrypt_in_place_detached(n, b"", &mut buf, t),
        };
        r.map_err(|_| Error::MacMismatch {
            scope: crate::error::MacScope::Item(crate::manifest::ItemId::ZERO),
        })?;
        Ok(buf)
    }

    fn tag_size(&self) -> usize {
        16
    }
}

struct EaxCipher(eax::Eax<Aes256>);

impl AeadCipher for EaxCipher {
    fn encrypt(&self, nonce: &[u8], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
        use aes_gcm::aead::{AeadInPlace, generic_array::GenericArray};
        let mut buf = plaintext.to_vec();
        let n = GenericArray::from_slice(nonce);
        let tag = self
            .0
            .encrypt_in_place_detached(n, b"", &mut buf)
            .map_err(|_| Error::InvalidConfiguration {
                what: "EAX encryption failed".into(),
                allowed: "nonce of the configured size".into(),
            })?;
        Ok((buf, tag.to_vec()))
    }

    fn decrypt(&self, nonce: &[u8], ciphertext: &[u8], tag: &[u8]) -> Result<Vec<u8>> {
        use aes_gcm::aead::{AeadInPlace, generic_array::GenericArray};
        let mut buf = ciphertext.to_vec();
        let n = GenericArray::from_slice(nonce);
        let t = GenericArray::from_slice(tag);
        self.0
            .decrypt_in_place_detached(n, b"", &mut buf, t)
            .map_err(|_| Error::MacMismatch {
                scope: crate::error::MacScope::Item(crate::manifest::ItemId::ZERO),
            })?;
        Ok(buf)
    }

    fn tag_size(&self) -> usize {
        16
    }
}

// --- MACs ------------------------------------------------------------------

struct HmacEngine32(Hmac<sha2::Sha256>);
impl MacEngine for HmacEngine32 {
    fn update(&mut self, data: &[u8]) {
        HmacMacTrait::update(&mut self.0, data);
    }
    fn finalize(self: Box<Self>) -> Vec<u8> {
        HmacMacTrait::finalize(self.0).into_bytes().to_vec()
    }
    fn tag_size(&self) -> usize {
        32
    }
}

struct HmacEngine64(Hmac<sha2::Sha512>);
impl MacEngine for HmacEngine64 {
    fn update(&mut self, data: &[u8]) {
        HmacMacTrait::update(&mut self.0, data);
    }
    fn finalize(self: Box<Self>) -> Vec<u8> {
        HmacMacTrait::finalize(self.0).into_bytes().to_vec()
    }
    fn tag_size(&self) -> usize {
        64
    }
}

enum CmacVariant {
    Aes128(cmac::Cmac<Aes128>),
    Aes192(cmac::Cmac<Aes192>),
    Aes256(cmac::Cmac<Aes256>),
}
impl MacEngine for CmacVariant {
    fn update(&mut self, data: &[u8]) {
        use cmac::Mac as _;
        match self {
            CmacVariant::Aes128(m) => m.update(data),
            CmacVariant::Aes192(m) => m.update(data),
            CmacVariant::Aes256(m) => m.update(data),
        }
    }
    fn finalize(self: Box<Self>) -> Vec<u8> {
        use cmac::Mac as _;
        match *self {
            CmacVariant::Aes128(m) => m.finalize().into_bytes().to_vec(),
            CmacVariant::Aes192(m) => m.finalize().into_bytes().to_vec(),
            CmacVariant::Aes256(m) => m.finalize().into_bytes().to_vec(),
        }
    }
    fn tag_size(&self) -> usize {
        16
    }
}

/// Poly1305 is a one-shot (non-incremental, unpadded) MAC; we buffer the
/// input and compute the tag at `finalize`.
struct Poly1305Engine {
    key: [u8; 32],
    buf: Vec<u8>,
}
impl MacEngine for Poly1305Engine {
    fn update(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }
    fn finalize(self: Box<Self>) -> Vec<u8> {
        use poly1305::universal_hash::KeyInit as _;
        let mac = poly1305::Poly1305::new_from_slice(&self.key)
            .expect("poly1305 keys are fixed size");
        mac.compute_unpadded(&self.buf).to_vec()
    }
    fn tag_size(&self) -> usize {
        16
    }
}

type Blake2b256 = blake2::Blake2b<blake2::digest::consts::U32>;
type Blake2bMac256 = blake2::Blake2bMac<blake2::digest::consts::U32>;

struct Blake2bMacEngine(Blake2bMac256);
impl MacEngine for Blake2bMacEngine {
    fn update(&mut self, data: &[u8]) {
        blake2::digest::Update::update(&mut self.0, data);
    }
    fn finalize(self: Box<Self>) -> Vec<u8> {
        use blake2::digest::FixedOutput;
        self.0.finalize_fixed().to_vec()
    }
    fn tag_size(&self) -> usize {
        32
    }
}

// --- Hashes ------------------------------------------------------------

struct DigestEngine<D: Digest> {
    ctx: D,
    digest_size: usize,
}

impl<D: Digest> DigestEngine<D> {
    fn new(digest_size: usize) -> Self {
        DigestEngine { ctx: D::new(), digest_size }
    }
}

impl<D: Digest + Send> HashEngine for DigestEngine<D> {
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.ctx, data);
    }
    fn finalize(self: Box<Self>) -> Vec<u8> {
        self.ctx.finalize().to_vec()
    }
    fn digest_size(&self) -> usize {
        self.digest_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::backend::Backend as _;

    /// ECRYPT Salsa20 test vector (spec.md Section 8, property 5 / S6).
    #[test]
    fn salsa20_ecrypt_vector() {
        let backend = RustCryptoBackend;
        let key = hex("0053A6F94C9FF24598EB3E91E4378ADD3083D6297CCF2275C81B6EC11467BA0");
        let nonce = hex("0D74DB42A91077DE");
        let mut cipher = backend
            .new_keystream_cipher(StreamCipherAlgorithm::Salsa20, &key, &nonce)
            .unwrap();
        let mut buf = vec![0u8; 64];
        cipher.apply_keystream(&mut buf);
        let expected = hex(
            "F5FAD53F79F9DF58C4AEA0D0ED9A9601F278112CA7180D565B420A48019670E\
             AF24CE493A86263F677B46ACE1924773D2BB25571E1AA8593758FC382B1280B7"
        );
        assert_eq!(buf, expected);
    }

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }
}
