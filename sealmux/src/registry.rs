//! The primitive registry (spec.md Section 4.1).
//!
//! A pure, static lookup table describing every cipher, hash, MAC, and KDF
//! identifier this crate knows about: allowable key/nonce sizes, block
//! size, padding requirement, and nonce-reuse policy. Every configuration
//! builder and streaming wrapper consults this table before any bytes
//! move.
//!
//! Primitives named in spec.md's out-of-scope list that have no actively
//! maintained crates.io implementation (SOSEMANUK, HC-128, Whirlpool,
//! Tiger) are still fully described here so configuration validation and
//! wire-format round-tripping work; they are simply never selected by
//! [`crate::backend::rustcrypto::RustCryptoBackend`]. See DESIGN.md.

use crate::error::{Error, Result};

/// Whether padding is required for a given cipher configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PaddingRequirement {
    /// The mode never needs padding (stream ciphers, CTR/CFB/OFB, AEAD).
    None,
    /// Padding is only needed if the final chunk is shorter than one
    /// block.
    IfUnderOneBlock,
    /// Padding is always applied (CBC).
    Always,
}

/// How a primitive tolerates nonce reuse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NonceReusePolicy {
    /// The primitive has no nonce (e.g. ECB-less ciphers, plain hashes).
    NotApplicable,
    /// Reusing a nonce is cryptographically acceptable for this primitive.
    ReuseAllowed,
    /// A monotonic counter nonce is acceptable; fully random is also fine.
    CounterAllowed,
    /// The nonce MUST be freshly random for every use.
    RequireRandom,
}

/// Block cipher chaining modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockCipherMode {
    /// Counter mode.
    Ctr,
    /// Cipher Block Chaining.
    Cbc,
    /// Cipher Feedback.
    Cfb,
    /// Output Feedback.
    Ofb,
    /// Galois/Counter Mode (AEAD).
    Gcm,
    /// EAX (AEAD).
    Eax,
}

/// Padding schemes for block-mode ciphers (spec.md Section 4.2).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PaddingScheme {
    /// ISO 10126-2: random bytes, final byte is the pad length.
    Iso10126,
    /// ISO 7816-4: a single `0x80` byte followed by zeros.
    Iso7816,
    /// PKCS#7: every pad byte equals the pad length.
    Pkcs7,
    /// Trailing-bit-complement.
    Tbc,
    /// ANSI X.923: zeros followed by the pad length.
    AnsiX923,
}

/// Block cipher identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockCipherAlgorithm {
    /// AES (Rijndael), 128/192/256-bit key.
    Aes,
    /// Twofish, 256-bit key.
    Twofish,
    /// Serpent, 256-bit key. Registry-only: no wired backend
    /// implementation (see module docs).
    Serpent,
}

/// Stream cipher identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamCipherAlgorithm {
    /// Salsa20, 256-bit key, 64-bit nonce.
    Salsa20,
    /// XSalsa20, 256-bit key, 192-bit nonce.
    XSalsa20,
    /// ChaCha20 (IETF variant), 256-bit key, 96-bit nonce.
    ChaCha20,
    /// HC-128. Registry-only: no wired backend implementation.
    Hc128,
    /// SOSEMANUK. Registry-only: no wired backend implementation.
    Sosemanuk,
    /// Rabbit. Registry-only: no wired backend implementation.
    Rabbit,
}

/// Hash function identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// BLAKE2b-256.
    Blake2b256,
    /// BLAKE2b-512.
    Blake2b512,
    /// SHA-256.
    Sha256,
    /// SHA-512.
    Sha512,
    /// SHA3-256 (Keccak).
    Sha3_256,
    /// RIPEMD-160.
    Ripemd160,
    /// Whirlpool. Registry-only: no wired backend implementation.
    Whirlpool,
    /// Tiger. Registry-only: no wired backend implementation.
    Tiger,
}

/// Keyed MAC identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MacAlgorithm {
    /// HMAC over the given hash.
    HmacSha256,
    /// HMAC-SHA512.
    HmacSha512,
    /// CMAC over AES.
    CmacAes,
    /// Poly1305.
    Poly1305,
    /// Keyed BLAKE2b.
    Blake2bKeyed,
}

/// KDF identifiers for deriving manifest keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KdfAlgorithm {
    /// scrypt.
    Scrypt,
    /// PBKDF2-HMAC-SHA256.
    Pbkdf2,
}

/// Elliptic curve identifiers used for UM1 key agreement and signing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EcCurve {
    /// Curve25519 (X25519 for agreement).
    Curve25519,
    /// Ed25519 (signing).
    Ed25519,
    /// NIST P-256. Registry-only: no wired backend implementation.
    NistP256,
    /// brainpoolP256r1. Registry-only: no wired backend implementation.
    BrainpoolP256r1,
}

/// Static descriptor for a block cipher.
#[derive(Clone, Copy, Debug)]
pub struct BlockCipherDescriptor {
    /// Allowable key sizes, in bits.
    pub allowable_key_sizes_bits: &'static [usize],
    /// The default key size, in bits.
    pub default_key_size_bits: usize,
    /// The cipher's fixed block size, in bits.
    pub block_size_bits: usize,
    /// The mode used when none is specified.
    pub default_mode: BlockCipherMode,
}

/// Static descriptor for a stream cipher.
#[derive(Clone, Copy, Debug)]
pub struct StreamCipherDescriptor {
    /// Allowable key sizes, in bits.
    pub allowable_key_sizes_bits: &'static [usize],
    /// The default key size, in bits.
    pub default_key_size_bits: usize,
    /// Allowable nonce sizes, in bits.
    pub allowable_nonce_sizes_bits: &'static [usize],
    /// The default nonce size, in bits.
    pub default_nonce_size_bits: usize,
    /// The nonce reuse policy for this cipher.
    pub nonce_reuse_policy: NonceReusePolicy,
}

/// Static descriptor for a hash function.
#[derive(Clone, Copy, Debug)]
pub struct HashDescriptor {
    /// Output digest size, in bits.
    pub digest_size_bits: usize,
}

/// Static descriptor for a keyed MAC.
#[derive(Clone, Copy, Debug)]
pub struct MacDescriptor {
    /// Allowable key sizes, in bits.
    pub allowable_key_sizes_bits: &'static [usize],
    /// The default key size, in bits.
    pub default_key_size_bits: usize,
    /// Allowable nonce sizes, in bits. Empty if the MAC takes no nonce.
    pub allowable_nonce_sizes_bits: &'static [usize],
    /// Output tag size, in bits.
    pub tag_size_bits: usize,
}

/// Returns the descriptor for a block cipher/mode/padding combination,
/// validating that the combination is legal.
///
/// Fails with [`Error::InvalidConfiguration`] for AEAD modes layered over
/// a cipher whose block size is not 128 bits (e.g. GCM over a 64-bit
/// block cipher), and with [`Error::ModePaddingIncompatible`] for any
/// other nonsensical mode/padding pairing.
pub fn block_cipher_descriptor(
    algo: BlockCipherAlgorithm,
) -> BlockCipherDescriptor {
    match algo {
        BlockCipherAlgorithm::Aes => BlockCipherDescriptor {
            allowable_key_sizes_bits: &[128, 192, 256],
            default_key_size_bits: 256,
            block_size_bits: 128,
            default_mode: BlockCipherMode::Gcm,
        },
        BlockCipherAlgorithm::Twofish => BlockCipherDescriptor {
            allowable_key_sizes_bits: &[128, 192, 256],
            default_key_size_bits: 256,
            block_size_bits: 128,
            default_mode: BlockCipherMode::Ctr,
        },
        BlockCipherAlgorithm::Serpent => BlockCipherDescriptor {
            allowable_key_sizes_bits: &[128, 192, 256],
            default_key_size_bits: 256,
            block_size_bits: 128,
            default_mode: BlockCipherMode::Ctr,
        },
    }
}

/// Validates a block-cipher mode/padding pairing against the registry.
pub fn validate_block_mode(
    algo: BlockCipherAlgorithm,
    mode: BlockCipherMode,
    padding: Option<PaddingScheme>,
) -> Result<PaddingRequirement> {
    let desc = block_cipher_descriptor(algo);

    let requirement = match mode {
        BlockCipherMode::Cbc => PaddingRequirement::Always,
        BlockCipherMode::Ctr | BlockCipherMode::Cfb | BlockCipherMode::Ofb => {
            PaddingRequirement::None
        }
        BlockCipherMode::Gcm | BlockCipherMode::Eax => {
            if desc.block_size_bits != 128 {
                return Err(Error::InvalidConfiguration {
                    what: format!(
                        "{:?} requires a 128-bit block cipher, {:?} has {} bits",
                        mode, algo, desc.block_size_bits
                    ),
                    allowed: "128-bit block ciphers".into(),
                });
            }
            PaddingRequirement::None
        }
    };

    match (requirement, padding) {
        (PaddingRequirement::Always, None) => {
            Err(Error::ModePaddingIncompatible(format!(
                "{:?} requires a padding scheme", mode
            )))
        }
        (PaddingRequirement::None, Some(_)) => {
            Err(Error::ModePaddingIncompatible(format!(
                "{:?} does not accept a padding scheme", mode
            )))
        }
        _ => Ok(requirement),
    }
}

/// Returns the descriptor for a stream cipher.
pub fn stream_cipher_descriptor(
    algo: StreamCipherAlgorithm,
) -> StreamCipherDescriptor {
    match algo {
        StreamCipherAlgorithm::Salsa20 => StreamCipherDescriptor {
            allowable_key_sizes_bits: &[128, 256],
            default_key_size_bits: 256,
            allowable_nonce_sizes_bits: &[64],
            default_nonce_size_bits: 64,
            nonce_reuse_policy: NonceReusePolicy::RequireRandom,
        },
        StreamCipherAlgorithm::XSalsa20 => StreamCipherDescriptor {
            allowable_key_sizes_bits: &[256],
            default_key_size_bits: 256,
            allowable_nonce_sizes_bits: &[192],
            default_nonce_size_bits: 192,
            nonce_reuse_policy: NonceReusePolicy::RequireRandom,
        },
        StreamCipherAlgorithm::ChaCha20 => StreamCipherDescriptor {
            allowable_key_sizes_bits: &[256],
            default_key_size_bits: 256,
            allowable_nonce_sizes_bits: &[96],
            default_nonce_size_bits: 96,
            nonce_reuse_policy: NonceReusePolicy::RequireRandom,
        },
        StreamCipherAlgorithm::Hc128 => StreamCipherDescriptor {
            allowable_key_sizes_bits: &[128],
            default_key_size_bits: 128,
            allowable_nonce_sizes_bits: &[128],
            default_nonce_size_bits: 128,
            nonce_reuse_policy: NonceReusePolicy::RequireRandom,
        },
        StreamCipherAlgorithm::Sosemanuk => StreamCipherDescriptor {
            allowable_key_sizes_bits: &[128, 256],
            default_key_size_bits: 256,
            allowable_nonce_sizes_bits: &[128],
            default_nonce_size_bits: 128,
            nonce_reuse_policy: NonceReusePolicy::RequireRandom,
        },
        StreamCipherAlgorithm::Rabbit => StreamCipherDescriptor {
            allowable_key_sizes_bits: &[128],
            default_key_size_bits: 128,
            allowable_nonce_sizes_bits: &[64],
            default_nonce_size_bits: 64,
            nonce_reuse_policy: NonceReusePolicy::RequireRandom,
        },
    }
}

/// Returns the descriptor for a hash function.
pub fn hash_descriptor(algo: HashAlgorithm) -> HashDescriptor {
    match algo {
        HashAlgorithm::Blake2b256 => HashDescriptor { digest_size_bits: 256 },
        HashAlgorithm::Blake2b512 => HashDescriptor { digest_size_bits: 512 },
        HashAlgorithm::Sha256 => HashDescriptor { digest_size_bits: 256 },
        HashAlgorithm::Sha512 => HashDescriptor { digest_size_bits: 512 },
        HashAlgorithm::Sha3_256 => HashDescriptor { digest_size_bits: 256 },
        HashAlgorithm::Ripemd160 => HashDescriptor { digest_size_bits: 160 },
        HashAlgorithm::Whirlpool => HashDescriptor { digest_size_bits: 512 },
        HashAlgorithm::Tiger => HashDescriptor { digest_size_bits: 192 },
    }
}

/// Returns the descriptor for a keyed MAC.
pub fn mac_descriptor(algo: MacAlgorithm) -> MacDescriptor {
    match algo {
        MacAlgorithm::HmacSha256 => MacDescriptor {
            allowable_key_sizes_bits: &[256],
            default_key_size_bits: 256,
            allowable_nonce_sizes_bits: &[],
            tag_size_bits: 256,
        },
        MacAlgorithm::HmacSha512 => MacDescriptor {
            allowable_key_sizes_bits: &[512],
            default_key_size_bits: 512,
            allowable_nonce_sizes_bits: &[],
            tag_size_bits: 512,
        },
        MacAlgorithm::CmacAes => MacDescriptor {
            allowable_key_sizes_bits: &[128, 192, 256],
            default_key_size_bits: 256,
            allowable_nonce_sizes_bits: &[],
            tag_size_bits: 128,
        },
        MacAlgorithm::Poly1305 => MacDescriptor {
            allowable_key_sizes_bits: &[256],
            default_key_size_bits: 256,
            allowable_nonce_sizes_bits: &[],
            tag_size_bits: 128,
        },
        MacAlgorithm::Blake2bKeyed => MacDescriptor {
            allowable_key_sizes_bits: &[256],
            default_key_size_bits: 256,
            allowable_nonce_sizes_bits: &[],
            tag_size_bits: 256,
        },
    }
}

/// Validates a key length against a primitive's allowable sizes.
pub fn validate_key_size(
    allowable_bits: &[usize],
    got_bytes: usize,
) -> Result<()> {
    let got_bits = got_bytes * 8;
    if allowable_bits.contains(&got_bits) {
        Ok(())
    } else {
        Err(Error::KeySizeMismatch {
            got: got_bits,
            expected: format!("{:?}", allowable_bits),
        })
    }
}

/// Validates a nonce length against a primitive's allowable sizes.
pub fn validate_nonce_size(
    allowable_bits: &[usize],
    got_bytes: usize,
) -> Result<()> {
    let got_bits = got_bytes * 8;
    if allowable_bits.contains(&got_bits) {
        Ok(())
    } else {
        Err(Error::NonceSizeMismatch {
            got: got_bits,
            expected: format!("{:?}", allowable_bits),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gcm_requires_128_bit_block() {
        assert!(validate_block_mode(
            BlockCipherAlgorithm::Aes,
            BlockCipherMode::Gcm,
            None
        )
        .is_ok());
    }

    #[test]
    fn cbc_requires_padding() {
        assert!(validate_block_mode(
            BlockCipherAlgorithm::Aes,
            BlockCipherMode::Cbc,
            None
        )
        .is_err());
        assert!(validate_block_mode(
            BlockCipherAlgorithm::Aes,
            BlockCipherMode::Cbc,
            Some(PaddingScheme::Pkcs7)
        )
        .is_ok());
    }

    #[test]
    fn ctr_rejects_padding() {
        assert!(validate_block_mode(
            BlockCipherAlgorithm::Aes,
            BlockCipherMode::Ctr,
            Some(PaddingScheme::Pkcs7)
        )
        .is_err());
    }
}
