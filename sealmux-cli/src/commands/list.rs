//! `sealmux list`: prints a package's item table without decrypting any
//! payload bytes.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use sealmux::crypto::backend::rustcrypto::RustCryptoBackend;
use sealmux::key_provider::SymmetricKeyProvider;
use sealmux::manifest::pipeline::ReadSession;

use super::read_passphrase;

/// List the items sealed inside a package.
#[derive(Args)]
pub struct ListArgs {
    /// Package to inspect.
    pub package: PathBuf,

    /// File holding the packaging passphrase.
    #[arg(long, value_name = "FILE")]
    pub passphrase_file: PathBuf,
}

pub fn run(args: ListArgs) -> Result<()> {
    let pre_key = read_passphrase(&args.passphrase_file)?;
    let bytes = fs::read(&args.package).with_context(|| format!("reading {}", args.package.display()))?;
    let backend = RustCryptoBackend;
    let provider = SymmetricKeyProvider::new(vec![pre_key]);

    let mut reader = ReadSession::new(&backend, bytes);
    reader.parse_header().context("parsing package header")?;
    reader.verify_manifest(&provider).context("verifying manifest")?;
    let manifest = reader.manifest().expect("verify_manifest succeeded");

    for item in &manifest.items {
        println!("{:<40} {:>10} bytes  {:?}", item.path, item.declared_len, item.item_type);
    }
    Ok(())
}
