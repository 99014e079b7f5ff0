//! `sealmux pack`: bundles every file under a directory into a sealed
//! package, encrypted under a passphrase-derived manifest key.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;

use sealmux::crypto::backend::rustcrypto::RustCryptoBackend;
use sealmux::crypto::backend::{Backend, KdfParams};
use sealmux::crypto::mem::Protected;
use sealmux::manifest::pipeline::{ManifestKeyRequest, WriteRequest, WriteSession};
use sealmux::manifest::{EntropyScheme, ItemCipherConfigKind, LayoutScheme, PayloadConfiguration};
use sealmux::registry::{KdfAlgorithm, MacAlgorithm, StreamCipherAlgorithm};

use super::{build_stream_item, read_passphrase};

/// Pack a directory into a sealed package.
#[derive(Args)]
pub struct PackArgs {
    /// Directory whose files become package items.
    pub source: PathBuf,

    /// Where to write the sealed package.
    #[arg(short, long)]
    pub output: PathBuf,

    /// File holding the packaging passphrase.
    #[arg(long, value_name = "FILE")]
    pub passphrase_file: PathBuf,
}

pub fn run(args: PackArgs) -> Result<()> {
    let pre_key = read_passphrase(&args.passphrase_file)?;
    let backend = RustCryptoBackend;

    let mut files = Vec::new();
    collect_files(&args.source, &args.source, &mut files)?;
    if files.is_empty() {
        bail!("{} contains no files to pack", args.source.display());
    }

    let mut inputs = Vec::with_capacity(files.len());
    for (id, (rel_path, plaintext)) in files.into_iter().enumerate() {
        inputs.push(build_stream_item(&backend, (id + 1) as u128, rel_path, plaintext)?);
    }
    let item_count = inputs.len();

    let mut salt = vec![0u8; 16];
    backend.random(&mut salt)?;
    let mut entropy_key = vec![0u8; 32];
    backend.random(&mut entropy_key)?;
    let mut entropy_nonce = vec![0u8; 8];
    backend.random(&mut entropy_nonce)?;

    let request = WriteRequest {
        version: 1,
        key_request: ManifestKeyRequest::SymmetricDirect { pre_key },
        manifest_cipher: ItemCipherConfigKind::Stream { algorithm: StreamCipherAlgorithm::XSalsa20 },
        manifest_mac_algorithm: MacAlgorithm::Blake2bKeyed,
        kdf_algorithm: KdfAlgorithm::Scrypt,
        kdf_params: KdfParams::Scrypt { log_n: 15, r: 8, p: 1 },
        salt,
        include_key_confirmation: true,
        payload_config: PayloadConfiguration {
            scheme: LayoutScheme::Simple,
            entropy: EntropyScheme::StreamCipherCsprng {
                algorithm: StreamCipherAlgorithm::Salsa20,
                key: Protected::from(entropy_key),
                nonce: entropy_nonce,
            },
            frameshift: None,
            fabric: None,
        },
        trailer_enabled: true,
    };

    let mut writer = WriteSession::new(&backend);
    writer.write_header(&request, inputs, None).context("assembling package header")?;
    writer.seal_manifest().context("sealing manifest")?;
    writer.write_payload().context("weaving payload")?;
    let package = writer.finish().context("finishing package")?;

    fs::write(&args.output, &package).with_context(|| format!("writing {}", args.output.display()))?;
    tracing::info!(items = item_count, bytes = package.len(), output = %args.output.display(), "packed");
    Ok(())
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) -> Result<()> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("reading {}", dir.display()))?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else {
            let rel = path.strip_prefix(root).unwrap_or(&path).to_string_lossy().into_owned();
            let bytes = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            out.push((rel, bytes));
        }
    }
    Ok(())
}
