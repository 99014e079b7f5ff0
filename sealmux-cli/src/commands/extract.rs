//! `sealmux extract`: recovers every item's plaintext and writes it back
//! out under a destination directory.

use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use sealmux::crypto::backend::rustcrypto::RustCryptoBackend;
use sealmux::error::Error as SealError;
use sealmux::key_provider::SymmetricKeyProvider;
use sealmux::manifest::pipeline::ReadSession;

use super::read_passphrase;

/// Joins `item_path` onto `output_dir`, rejecting anything that would
/// escape it: parent-directory, root, or prefix components, or a join
/// that otherwise lands outside `output_dir`. Manifest paths are
/// attacker-controlled for any package the caller didn't author
/// themselves, so this must fail closed rather than sanitize.
fn safe_join(output_dir: &Path, item_path: &str) -> Result<PathBuf, SealError> {
    let rel = Path::new(item_path);
    for component in rel.components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(SealError::UnsafeItemPath(item_path.to_string()));
            }
        }
    }
    let dest = output_dir.join(rel);
    if dest.strip_prefix(output_dir).is_err() {
        return Err(SealError::UnsafeItemPath(item_path.to_string()));
    }
    Ok(dest)
}

/// Extract every item from a sealed package.
#[derive(Args)]
pub struct ExtractArgs {
    /// Package to extract.
    pub package: PathBuf,

    /// File holding the packaging passphrase.
    #[arg(long, value_name = "FILE")]
    pub passphrase_file: PathBuf,

    /// Directory to extract items into.
    #[arg(short, long)]
    pub output_dir: PathBuf,
}

pub fn run(args: ExtractArgs) -> Result<()> {
    let pre_key = read_passphrase(&args.passphrase_file)?;
    let bytes = fs::read(&args.package).with_context(|| format!("reading {}", args.package.display()))?;
    let backend = RustCryptoBackend;
    let provider = SymmetricKeyProvider::new(vec![pre_key]);

    let mut reader = ReadSession::new(&backend, bytes);
    reader.parse_header().context("parsing package header")?;
    reader.verify_manifest(&provider).context("verifying manifest")?;
    let manifest = reader.manifest().expect("verify_manifest succeeded").clone();
    let recovered = reader.read_payload().context("reading payload")?;
    reader.finish().context("verifying trailer")?;

    for (item_id, plaintext) in recovered {
        let item = manifest
            .items
            .iter()
            .find(|candidate| candidate.id == item_id)
            .expect("read_payload only returns manifest items");
        let dest = safe_join(&args.output_dir, &item.path)
            .with_context(|| format!("rejecting item path {}", item.path))?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        fs::write(&dest, &plaintext).with_context(|| format!("writing {}", dest.display()))?;
        tracing::info!(path = %item.path, bytes = plaintext.len(), "extracted");
    }
    Ok(())
}
