//! sealmux: an order-hiding, length-hiding authenticated package format.
//!
//! A package bundles any number of named items into a single opaque blob.
//! Item boundaries, ordering, and (depending on the chosen layout) lengths
//! are hidden from anyone without the manifest key; every ciphertext span
//! is authenticated independently under an encrypt-then-MAC discipline.
//!
//! The moving pieces:
//!
//! - [`registry`] describes every cipher, hash, MAC, and KDF identifier
//!   this crate knows about, and the sizes/modes each one allows.
//! - [`crypto`] supplies the backend abstraction and the streaming
//!   cipher/MAC/hash/CS-PRNG wrappers built on top of it.
//! - [`manifest`] defines the package's data model ([`manifest::Manifest`],
//!   [`manifest::PackageHeader`], [`manifest::PayloadItem`]), its wire
//!   codec, and the [`manifest::pipeline`] write/read sessions that tie
//!   everything together.
//! - [`multiplex`] implements the three payload layouts (Simple,
//!   Frameshift, Fabric) as pure functions of already-enciphered item
//!   bytes and an entropy source.
//! - [`key_provider`] and [`um1`] cover manifest-key establishment: a
//!   caller-supplied pre-key, or UM1 one-pass hybrid Diffie-Hellman.
//!
//! A non-goal of this crate is dictating how items should be named,
//! discovered, or stored before they reach a package; callers assemble
//! their own [`manifest::PayloadItem`] list. See DESIGN.md for the
//! rationale behind some of the less obvious choices below.
//!
//! # Example
//!
//! ```no_run
//! use sealmux::crypto::backend::rustcrypto::RustCryptoBackend;
//! use sealmux::crypto::mem::Protected;
//! use sealmux::key_provider::SymmetricKeyProvider;
//! use sealmux::manifest::pipeline::{ManifestKeyRequest, ReadSession, WriteSession};
//!
//! let backend = RustCryptoBackend;
//! let pre_key = Protected::from(vec![0x42u8; 32]);
//!
//! let mut write = WriteSession::new(&backend);
//! // ... build a WriteRequest and a Vec<ItemInput>, then:
//! // write.write_header(&request, items, None)?;
//! // write.seal_manifest()?;
//! // write.write_payload()?;
//! // let package = write.finish()?;
//!
//! let mut read = ReadSession::new(&backend, Vec::new());
//! let provider = SymmetricKeyProvider::new(vec![pre_key]);
//! // read.parse_header()?;
//! // read.verify_manifest(&provider)?;
//! // let items = read.read_payload()?;
//! // read.finish()?;
//! # let _ = (write.state(), read.state(), ManifestKeyRequest::SymmetricDirect {
//! #     pre_key: Protected::from(vec![0u8; 32]),
//! # });
//! ```

#![warn(missing_docs)]

pub mod crypto;
pub mod error;
pub mod key_provider;
pub mod manifest;
pub mod multiplex;
pub mod registry;
pub mod um1;

pub use error::{Error, Result};
