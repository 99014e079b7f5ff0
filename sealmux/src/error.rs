//! The error taxonomy for the packaging engine.

use crate::manifest::ItemId;

/// Where an authentication failure occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MacScope {
    /// The manifest ciphertext's MAC.
    Manifest,
    /// A payload item's MAC.
    Item(ItemId),
    /// The trailing MAC over the whole package.
    Trailer,
}

impl std::fmt::Display for MacScope {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MacScope::Manifest => write!(f, "manifest"),
            MacScope::Item(id) => write!(f, "item {}", id),
            MacScope::Trailer => write!(f, "trailer"),
        }
    }
}

/// Errors produced by the packaging engine.
///
/// Variant messages never include candidate key material; see
/// spec.md Section 7.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A primitive/size/mode combination was rejected by the registry.
    #[error("invalid configuration: {what} (allowed: {allowed})")]
    InvalidConfiguration {
        /// What was rejected.
        what: String,
        /// A human-readable description of the allowed values.
        allowed: String,
    },

    /// The supplied key does not match one of the primitive's allowable
    /// sizes.
    #[error("key size mismatch: got {got} bits, expected one of {expected}")]
    KeySizeMismatch {
        /// Size supplied, in bits.
        got: usize,
        /// Human-readable description of the accepted sizes.
        expected: String,
    },

    /// The supplied nonce does not match one of the primitive's allowable
    /// sizes.
    #[error("nonce size mismatch: got {got} bits, expected one of {expected}")]
    NonceSizeMismatch {
        /// Size supplied, in bits.
        got: usize,
        /// Human-readable description of the accepted sizes.
        expected: String,
    },

    /// A requested mode/padding combination is incompatible, e.g. an AEAD
    /// mode layered over a cipher with the wrong block size.
    #[error("mode and padding are incompatible: {0}")]
    ModePaddingIncompatible(String),

    /// Decrypt-side padding was malformed.
    #[error("invalid padding")]
    InvalidPadding,

    /// An authentication tag did not verify.
    #[error("authentication failed: {scope}")]
    MacMismatch {
        /// Which part of the package failed to authenticate.
        scope: MacScope,
    },

    /// None of the candidate keys offered by the `KeyProvider` matched.
    #[error("no matching key found among the candidates offered")]
    NoMatchingKey,

    /// The payload ended before every item was fully produced.
    #[error("payload ended prematurely")]
    TruncatedPayload,

    /// The header ended before it was fully parsed.
    #[error("header ended prematurely")]
    TruncatedHeader,

    /// The manifest ciphertext ended before it was fully parsed.
    #[error("manifest ended prematurely")]
    TruncatedManifest,

    /// A `Preallocation` entropy source ran out of bytes.
    #[error("entropy source exhausted")]
    InsufficientEntropy,

    /// The package declares a format version this implementation does not
    /// understand.
    #[error("unsupported schema version: {0}")]
    SchemaVersionUnsupported(u16),

    /// A manifest item's declared path escapes the extraction directory
    /// it would be written under (`..`, an absolute path, or a prefix
    /// component).
    #[error("unsafe item path: {0}")]
    UnsafeItemPath(String),
}

/// The result type used throughout this crate.
pub type Result<T> = std::result::Result<T, Error>;
