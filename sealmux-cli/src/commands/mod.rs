//! Shared plumbing for the `pack`/`list`/`extract` subcommands.

pub mod extract;
pub mod list;
pub mod pack;

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};

use sealmux::crypto::backend::Backend;
use sealmux::crypto::mem::Protected;
use sealmux::error::Error as SealError;
use sealmux::manifest::pipeline::ItemInput;
use sealmux::manifest::{ItemCipherConfig, ItemId, ItemMacConfig, ItemType, PayloadItem};
use sealmux::registry::{MacAlgorithm, StreamCipherAlgorithm};

/// Reads a passphrase file, trimming a single trailing newline, matching
/// how a shell `$(cat passphrase.txt)` would strip one.
pub fn read_passphrase(path: &Path) -> Result<Protected> {
    let raw = fs::read(path).with_context(|| format!("reading passphrase file {}", path.display()))?;
    let trimmed = raw.strip_suffix(b"\n").unwrap_or(&raw);
    let trimmed = trimmed.strip_suffix(b"\r").unwrap_or(trimmed);
    Ok(Protected::from(trimmed.to_vec()))
}

/// Builds an item with a fresh random Salsa20 cipher key/nonce and a
/// fresh random HMAC-SHA256 MAC key, both of which travel only inside
/// the encrypted manifest.
pub fn build_stream_item(backend: &dyn Backend, id: u128, path: String, plaintext: Vec<u8>) -> Result<ItemInput> {
    let mut cipher_key = vec![0u8; 32];
    backend.random(&mut cipher_key)?;
    let mut nonce = vec![0u8; 8];
    backend.random(&mut nonce)?;
    let mut mac_key = vec![0u8; 32];
    backend.random(&mut mac_key)?;

    Ok(ItemInput {
        item: PayloadItem {
            id: ItemId(id),
            path,
            declared_len: 0,
            cipher: ItemCipherConfig::Stream {
                algorithm: StreamCipherAlgorithm::Salsa20,
                key: Protected::from(cipher_key),
                nonce,
            },
            mac: ItemMacConfig {
                algorithm: MacAlgorithm::HmacSha256,
                key: Protected::from(mac_key),
                nonce: None,
                tag: None,
            },
            item_type: ItemType::File,
            kdf: None,
        },
        plaintext,
    })
}

/// Maps a failure to the exit-code contract (spec.md Section 6): 2 bad
/// config, 3 authentication failure, 4 key not found, 5 truncation or
/// format error. Anything else not raised by the library itself (file
/// I/O, argument errors) also falls back to 2.
pub fn exit_code_for(err: &anyhow::Error) -> ExitCode {
    match err.downcast_ref::<SealError>() {
        Some(SealError::MacMismatch { .. }) => ExitCode::from(3),
        Some(SealError::NoMatchingKey) => ExitCode::from(4),
        Some(
            SealError::TruncatedHeader
            | SealError::TruncatedManifest
            | SealError::TruncatedPayload
            | SealError::SchemaVersionUnsupported(_)
            | SealError::InvalidPadding
            | SealError::UnsafeItemPath(_),
        ) => ExitCode::from(5),
        _ => ExitCode::from(2),
    }
}
