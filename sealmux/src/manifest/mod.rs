//! The manifest data model (spec.md Section 3).
//!
//! These are the DTOs the [`crate::manifest::codec`] serializes and the
//! [`crate::manifest::pipeline`] seals and verifies. Nothing in this module
//! performs I/O or cryptography; it only describes the shape of a package.

pub mod codec;
pub mod pipeline;

use crate::registry::{
    BlockCipherAlgorithm, BlockCipherMode, HashAlgorithm, KdfAlgorithm,
    MacAlgorithm, PaddingScheme, StreamCipherAlgorithm,
};

/// A payload item's unique 128-bit identifier.
///
/// Identifiers are unique within a package (spec.md Section 3); this type
/// does not itself enforce uniqueness, the manifest builder does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId(pub u128);

impl ItemId {
    /// The all-zero identifier, used as a placeholder when no item-scoped
    /// error context is available (e.g. an AEAD failure surfaced below the
    /// multiplexer, before it has attributed the stripe to an item).
    pub const ZERO: ItemId = ItemId(0);

    /// Generates a fresh random identifier using `backend`.
    pub fn random(backend: &dyn crate::crypto::backend::Backend) -> crate::error::Result<Self> {
        let mut buf = [0u8; 16];
        backend.random(&mut buf)?;
        Ok(ItemId(u128::from_be_bytes(buf)))
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// What kind of payload an item carries.
///
/// Purely descriptive; the multiplexer and cipher stream treat every item
/// identically regardless of type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ItemType {
    /// An opaque file body.
    File,
    /// A short message payload.
    Message,
    /// A key-exchange artefact (e.g. an exported public key).
    KeyAction,
}

/// How an item's ciphertext is produced.
#[derive(Clone, Debug)]
pub enum ItemCipherConfig {
    /// A block cipher in a non-AEAD mode, with padding.
    Block {
        /// Which block cipher.
        algorithm: BlockCipherAlgorithm,
        /// Which chaining mode.
        mode: BlockCipherMode,
        /// The padding scheme (required for CBC, absent for CTR/CFB/OFB).
        padding: Option<PaddingScheme>,
        /// The item's symmetric key.
        key: crate::crypto::mem::Protected,
        /// The item's nonce or IV.
        nonce: Vec<u8>,
    },
    /// A block cipher in an AEAD mode.
    Aead {
        /// Which block cipher.
        algorithm: BlockCipherAlgorithm,
        /// Which AEAD mode (GCM or EAX).
        mode: BlockCipherMode,
        /// The item's symmetric key.
        key: crate::crypto::mem::Protected,
        /// The item's nonce.
        nonce: Vec<u8>,
    },
    /// A stream cipher.
    Stream {
        /// Which stream cipher.
        algorithm: StreamCipherAlgorithm,
        /// The item's symmetric key.
        key: crate::crypto::mem::Protected,
        /// The item's nonce.
        nonce: Vec<u8>,
    },
}

/// An item's authentication configuration.
///
/// `tag` is empty until the item has been sealed on write; on read it
/// carries the tag recovered from the manifest, to be compared against
/// the one computed while consuming the item's ciphertext.
#[derive(Clone, Debug)]
pub struct ItemMacConfig {
    /// Which MAC.
    pub algorithm: MacAlgorithm,
    /// The item's MAC key.
    pub key: crate::crypto::mem::Protected,
    /// The MAC's nonce, if the algorithm takes one.
    pub nonce: Option<Vec<u8>>,
    /// The expected tag, populated on write once the item is sealed.
    pub tag: Option<Vec<u8>>,
}

/// Optional per-item key derivation, applied before the cipher/MAC keys
/// are used (e.g. deriving both from a single random pre-key).
#[derive(Clone, Debug)]
pub struct ItemKdfConfig {
    /// Which KDF.
    pub algorithm: KdfAlgorithm,
    /// The salt used for this item's derivation.
    pub salt: Vec<u8>,
}

/// A per-item descriptor (spec.md Section 3, `PayloadItem`).
#[derive(Clone, Debug)]
pub struct PayloadItem {
    /// The item's unique identifier.
    pub id: ItemId,
    /// The item's logical path, e.g. `"docs/readme.txt"`.
    pub path: String,
    /// The plaintext length, in bytes. Authoritative: the multiplexer uses
    /// this (not an in-stream length prefix) to know when the item ends.
    pub declared_len: u64,
    /// How the item's bytes are enciphered.
    pub cipher: ItemCipherConfig,
    /// How the item's ciphertext is authenticated.
    pub mac: ItemMacConfig,
    /// What kind of payload this is.
    pub item_type: ItemType,
    /// Optional KDF used to derive this item's keys.
    pub kdf: Option<ItemKdfConfig>,
}

/// The index of a package (spec.md Section 3, `Manifest`).
///
/// Exactly one manifest exists per package. It is opaque to anyone
/// without the manifest key.
#[derive(Clone, Debug)]
pub struct Manifest {
    /// The manifest schema's format version.
    pub format_version: u16,
    /// The payload's weaving scheme and its parameters.
    pub payload_config: PayloadConfiguration,
    /// The items, in the order the caller added them. The multiplexer may
    /// reorder them on the wire; this list is the order of record.
    pub items: Vec<PayloadItem>,
    /// Optional free-form package metadata.
    pub metadata: Option<std::collections::BTreeMap<String, String>>,
}

/// How the manifest key is established (spec.md Section 3).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ManifestKeyScheme {
    /// A raw pre-key run through a KDF with a per-package salt.
    SymmetricDirect,
    /// UM1 one-pass ephemeral-static Diffie-Hellman, KDF'd with a salt.
    Um1Hybrid,
}

/// Manifest cipher parameters carried in clear in the header.
#[derive(Clone, Debug)]
pub struct ManifestCipherConfig {
    /// Which cipher (typically a stream cipher or AEAD block cipher).
    pub cipher: ItemCipherConfigKind,
    /// The KDF used to derive the manifest key.
    pub kdf_algorithm: KdfAlgorithm,
    /// KDF cost parameters.
    pub kdf_params: crate::crypto::backend::KdfParams,
    /// The per-package salt.
    pub salt: Vec<u8>,
}

/// The cipher algorithm/mode/padding selection for the manifest cipher,
/// without key material (the header carries only the clear configuration;
/// the key itself is never serialized).
#[derive(Clone, Copy, Debug)]
pub enum ItemCipherConfigKind {
    /// A block cipher in a non-AEAD mode.
    Block {
        /// Which block cipher.
        algorithm: BlockCipherAlgorithm,
        /// Which chaining mode.
        mode: BlockCipherMode,
        /// The padding scheme, if any.
        padding: Option<PaddingScheme>,
    },
    /// A block cipher in an AEAD mode.
    Aead {
        /// Which block cipher.
        algorithm: BlockCipherAlgorithm,
        /// Which AEAD mode.
        mode: BlockCipherMode,
    },
    /// A stream cipher.
    Stream {
        /// Which stream cipher.
        algorithm: StreamCipherAlgorithm,
    },
}

/// Manifest MAC parameters carried in clear in the header.
#[derive(Clone, Copy, Debug)]
pub struct ManifestMacConfig {
    /// Which MAC (or unkeyed hash, for the confirmation token).
    pub algorithm: MacAlgorithm,
}

/// The clear-text preamble of a package (spec.md Section 3, `PackageHeader`).
#[derive(Clone, Debug)]
pub struct PackageHeader {
    /// Format version.
    pub version: u16,
    /// How the manifest key is established.
    pub scheme: ManifestKeyScheme,
    /// Manifest cipher configuration.
    pub manifest_cipher: ManifestCipherConfig,
    /// The manifest cipher's nonce.
    pub manifest_nonce: Vec<u8>,
    /// Manifest MAC configuration.
    pub manifest_mac: ManifestMacConfig,
    /// The manifest MAC's nonce, if the algorithm takes one.
    pub manifest_mac_nonce: Option<Vec<u8>>,
    /// The ephemeral EC public key, present only for UM1-hybrid packages.
    pub ephemeral_public: Option<[u8; 32]>,
    /// The curve the ephemeral key (and receiver static key) live on,
    /// present only for UM1-hybrid packages.
    pub ephemeral_curve: Option<crate::registry::EcCurve>,
    /// Optional key-confirmation blob, letting a reader identify the
    /// correct candidate key without a full trial decryption.
    pub key_confirmation: Option<Vec<u8>>,
    /// The payload's weaving scheme, entropy seed, and layout parameters
    /// (spec.md Section 6 lists these among the header's clear fields).
    /// This mirrors the manifest's own `payload_config`; the multiplexer
    /// itself is always driven from the manifest's copy, once decrypted,
    /// so the header alone stays self-describing for tooling that only
    /// needs to know the package's shape without the manifest key.
    pub payload_config: PayloadConfiguration,
    /// Whether a trailing MAC follows the payload.
    pub trailer_present: bool,
}

/// The payload weaving scheme (spec.md Section 3/4.5).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayoutScheme {
    /// Concatenation in a PRNG-chosen order.
    Simple,
    /// Simple plus leading/trailing padding per item.
    Frameshift,
    /// Stripe-interleaved items.
    Fabric,
}

/// Where the multiplexer's non-determinism comes from (spec.md Section 4.4).
#[derive(Clone, Debug)]
pub enum EntropyScheme {
    /// A fixed, pre-generated byte blob consumed in order.
    Preallocation {
        /// The blob itself.
        data: Vec<u8>,
    },
    /// A CS-PRNG seeded from a stream cipher key and nonce.
    StreamCipherCsprng {
        /// Which stream cipher drives the CS-PRNG.
        algorithm: StreamCipherAlgorithm,
        /// The CS-PRNG's key.
        key: crate::crypto::mem::Protected,
        /// The CS-PRNG's nonce.
        nonce: Vec<u8>,
    },
}

/// Frameshift-specific padding bounds.
#[derive(Clone, Copy, Debug)]
pub struct FrameshiftParams {
    /// Minimum padding span length, in bytes.
    pub min_padding: u32,
    /// Maximum padding span length, in bytes (inclusive).
    pub max_padding: u32,
}

impl Default for FrameshiftParams {
    fn default() -> Self {
        FrameshiftParams { min_padding: 8, max_padding: 512 }
    }
}

/// Fabric-specific stripe bounds.
#[derive(Clone, Copy, Debug)]
pub struct FabricParams {
    /// Minimum stripe length, in bytes.
    pub min_stripe: u32,
    /// Maximum stripe length, in bytes (inclusive).
    pub max_stripe: u32,
}

/// Describes how items are woven together (spec.md Section 3,
/// `PayloadConfiguration`).
#[derive(Clone, Debug)]
pub struct PayloadConfiguration {
    /// The weaving scheme.
    pub scheme: LayoutScheme,
    /// The entropy source driving that scheme's non-determinism.
    pub entropy: EntropyScheme,
    /// Padding bounds, present iff `scheme == Frameshift`.
    pub frameshift: Option<FrameshiftParams>,
    /// Stripe bounds, present iff `scheme == Fabric`.
    pub fabric: Option<FabricParams>,
}
