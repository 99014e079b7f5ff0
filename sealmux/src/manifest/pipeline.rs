//! The manifest pipeline (spec.md Section 4.6): assembles, seals, and
//! verifies a package end to end. `WriteSession` and `ReadSession` each
//! enforce a one-way state machine over their half of the exchange,
//! failing closed into a terminal `Failed` state the moment anything
//! goes wrong.
//!
//! Every ciphertext span (manifest, each item, the optional trailer) is
//! Encrypt-then-MAC: the manifest and items are enciphered first, then a
//! MAC runs over the resulting ciphertext bytes — except where an item
//! chooses an AEAD cipher, whose own authentication tag fills that role
//! directly rather than being wrapped in a second, redundant MAC. The
//! manifest cipher itself is restricted to non-AEAD ciphers so its EtM
//! step always stays explicit (see DESIGN.md).

use std::collections::HashMap;

use crate::crypto::backend::{Backend, KdfParams};
use crate::crypto::cipher_stream::CipherStream;
use crate::crypto::csprng::{CsPrng, EntropySource};
use crate::crypto::mac_stream::MacStream;
use crate::crypto::mem::{secure_cmp, Protected};
use crate::error::{Error, MacScope, Result};
use crate::key_provider::KeyProvider;
use crate::manifest::{
    codec, EntropyScheme, ItemCipherConfig, ItemCipherConfigKind, ItemId, Manifest,
    ManifestKeyScheme, PackageHeader, PayloadConfiguration, PayloadItem,
};
use crate::multiplex::{self, ItemCiphertext, ItemSpan};
use crate::registry::{self, BlockCipherMode, EcCurve, KdfAlgorithm, MacAlgorithm};
use crate::um1;

const MAGIC: &[u8; 4] = b"OBSC";
const CONFIRMATION_TAG: &[u8] = b"sealmux-manifest-key-confirmation-v1";

/// The write-side state machine (spec.md Section 4.6). Transitions are
/// one-way; any error drives the session into `Failed` regardless of
/// which step raised it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteState {
    Idle,
    HeaderWritten,
    ManifestSealed,
    PayloadFlowing,
    Sealed,
    Failed,
}

/// The read-side state machine, mirroring [`WriteState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadState {
    Idle,
    HeaderParsed,
    ManifestVerified,
    PayloadFlowing,
    Verified,
    Failed,
}

/// How a package's manifest key is established.
pub enum ManifestKeyRequest {
    /// A raw pre-key, run through a KDF with the package salt.
    SymmetricDirect {
        /// The pre-key.
        pre_key: Protected,
    },
    /// UM1 one-pass ephemeral-static Diffie-Hellman, then a KDF.
    Um1Hybrid {
        /// The sender's static secret.
        sender_static_secret: Protected,
        /// The receiver's static public key.
        receiver_static_public: [u8; 32],
        /// The curve both keys live on.
        curve: EcCurve,
    },
}

/// A single item's manifest descriptor (minus its MAC tag, which the
/// pipeline fills in once the item is sealed) paired with its plaintext.
pub struct ItemInput {
    /// The item's descriptor. `declared_len` and `mac.tag` are
    /// overwritten during sealing; the rest must already be set.
    pub item: PayloadItem,
    /// The item's plaintext bytes.
    pub plaintext: Vec<u8>,
}

/// Everything [`WriteSession::write_header`] needs to assemble a package's
/// clear header and derive its manifest key.
pub struct WriteRequest {
    /// The package format version.
    pub version: u16,
    /// How the manifest key is established.
    pub key_request: ManifestKeyRequest,
    /// The manifest's own cipher (must be non-AEAD; see the module docs).
    pub manifest_cipher: ItemCipherConfigKind,
    /// The manifest's MAC algorithm. Also used for the optional trailer.
    pub manifest_mac_algorithm: MacAlgorithm,
    /// The KDF used to derive the manifest key.
    pub kdf_algorithm: KdfAlgorithm,
    /// KDF cost parameters.
    pub kdf_params: KdfParams,
    /// The per-package salt.
    pub salt: Vec<u8>,
    /// Whether to include a key-confirmation blob in the header, letting
    /// a reader identify the right candidate key without a full trial
    /// decryption.
    pub include_key_confirmation: bool,
    /// The payload's weaving scheme and parameters.
    pub payload_config: PayloadConfiguration,
    /// Whether to append a trailing MAC over the whole package.
    pub trailer_enabled: bool,
}

/// Drives the write side of spec.md Section 4.6 end to end, in memory.
pub struct WriteSession<'b> {
    backend: &'b dyn Backend,
    state: WriteState,
    output: Vec<u8>,
    manifest_key: Option<Protected>,
    manifest_bytes: Option<Vec<u8>>,
    manifest_nonce: Option<Vec<u8>>,
    manifest_cipher_kind: Option<ItemCipherConfigKind>,
    manifest_mac_algorithm: Option<MacAlgorithm>,
    ciphertexts: Option<Vec<ItemCiphertext>>,
    payload_config: Option<PayloadConfiguration>,
    trailer_enabled: bool,
}

impl<'b> WriteSession<'b> {
    /// Starts a new, empty write session.
    pub fn new(backend: &'b dyn Backend) -> Self {
        WriteSession {
            backend,
            state: WriteState::Idle,
            output: Vec::new(),
            manifest_key: None,
            manifest_bytes: None,
            manifest_nonce: None,
            manifest_cipher_kind: None,
            manifest_mac_algorithm: None,
            ciphertexts: None,
            payload_config: None,
            trailer_enabled: false,
        }
    }

    /// The session's current state.
    pub fn state(&self) -> WriteState {
        self.state
    }

    fn require(&mut self, expected: WriteState) -> Result<()> {
        if self.state != expected {
            let what = format!("write session in state {:?}, expected {:?}", self.state, expected);
            self.state = WriteState::Failed;
            return Err(Error::InvalidConfiguration { what, allowed: format!("{:?}", expected) });
        }
        Ok(())
    }

    fn fail(&mut self, err: Error) -> Error {
        self.state = WriteState::Failed;
        err
    }

    /// Step 1 (spec.md 4.6): seals every item, assembles and serializes
    /// the manifest, derives the manifest key, and writes the clear
    /// header. `metadata` is attached to the manifest unchanged.
    pub fn write_header(
        &mut self,
        request: &WriteRequest,
        items: Vec<ItemInput>,
        metadata: Option<std::collections::BTreeMap<String, String>>,
    ) -> Result<()> {
        self.require(WriteState::Idle)?;

        let mut sealed_items = Vec::with_capacity(items.len());
        let mut ciphertexts = Vec::with_capacity(items.len());
        for ItemInput { mut item, plaintext } in items {
            let ciphertext = match seal_item(self.backend, &mut item, &plaintext) {
                Ok(ct) => ct,
                Err(e) => return Err(self.fail(e)),
            };
            ciphertexts.push(ItemCiphertext { id: item.id, ciphertext });
            sealed_items.push(item);
        }

        let manifest = Manifest {
            format_version: request.version,
            payload_config: request.payload_config.clone(),
            items: sealed_items,
            metadata,
        };
        let manifest_bytes = codec::encode_manifest(&manifest);

        let (manifest_key, ephemeral_public, ephemeral_curve, scheme) =
            match derive_manifest_key(self.backend, request) {
                Ok(v) => v,
                Err(e) => return Err(self.fail(e)),
            };

        let nonce_len = match manifest_cipher_nonce_len(&request.manifest_cipher) {
            Ok(n) => n,
            Err(e) => return Err(self.fail(e)),
        };
        let mut manifest_nonce = vec![0u8; nonce_len];
        if let Err(e) = self.backend.random(&mut manifest_nonce) {
            return Err(self.fail(e));
        }

        let key_confirmation = if request.include_key_confirmation {
            match confirmation_token(
                self.backend,
                request.manifest_mac_algorithm,
                &manifest_key,
                ephemeral_public.as_ref(),
                &request.salt,
            ) {
                Ok(token) => Some(token),
                Err(e) => return Err(self.fail(e)),
            }
        } else {
            None
        };

        let header = PackageHeader {
            version: request.version,
            scheme,
            manifest_cipher: crate::manifest::ManifestCipherConfig {
                cipher: request.manifest_cipher,
                kdf_algorithm: request.kdf_algorithm,
                kdf_params: request.kdf_params,
                salt: request.salt.clone(),
            },
            manifest_nonce: manifest_nonce.clone(),
            manifest_mac: crate::manifest::ManifestMacConfig { algorithm: request.manifest_mac_algorithm },
            manifest_mac_nonce: None,
            ephemeral_public,
            ephemeral_curve,
            key_confirmation,
            payload_config: request.payload_config.clone(),
            trailer_present: request.trailer_enabled,
        };
        let header_bytes = codec::encode_header(&header);

        self.output.extend_from_slice(MAGIC);
        self.output.extend_from_slice(&header.version.to_be_bytes());
        self.output.extend_from_slice(&(header_bytes.len() as u32).to_be_bytes());
        self.output.extend_from_slice(&header_bytes);

        self.manifest_key = Some(manifest_key);
        self.manifest_bytes = Some(manifest_bytes);
        self.manifest_nonce = Some(manifest_nonce);
        self.manifest_cipher_kind = Some(request.manifest_cipher);
        self.manifest_mac_algorithm = Some(request.manifest_mac_algorithm);
        self.ciphertexts = Some(ciphertexts);
        self.payload_config = Some(request.payload_config.clone());
        self.trailer_enabled = request.trailer_enabled;
        self.state = WriteState::HeaderWritten;
        Ok(())
    }

    /// Step 2: Encrypt-then-MAC seals the already-serialized manifest and
    /// appends `[len][ciphertext][tag]`.
    pub fn seal_manifest(&mut self) -> Result<()> {
        self.require(WriteState::HeaderWritten)?;
        let manifest_key = self.manifest_key.as_ref().expect("HeaderWritten implies manifest_key").clone();
        let manifest_bytes = self.manifest_bytes.take().expect("HeaderWritten implies manifest_bytes");
        let manifest_nonce = self.manifest_nonce.clone().expect("HeaderWritten implies manifest_nonce");
        let cipher_kind = self.manifest_cipher_kind.expect("HeaderWritten implies manifest_cipher_kind");
        let mac_algorithm = self.manifest_mac_algorithm.expect("HeaderWritten implies manifest_mac_algorithm");

        let result = (|| -> Result<()> {
            let cipher_config = item_cipher_config_from_kind(&cipher_kind, manifest_key.clone(), manifest_nonce)?;
            let mut cipher = CipherStream::new(true, &cipher_config, self.backend)?;
            let mut ciphertext = cipher.process_bytes(&manifest_bytes)?;
            ciphertext.extend(cipher.finalize()?);

            let mut mac = MacStream::new(self.backend, mac_algorithm, &manifest_key)?;
            mac.update(&ciphertext)?;
            let tag = mac.finalize()?;

            self.output.extend_from_slice(&(ciphertext.len() as u64).to_be_bytes());
            self.output.extend_from_slice(&ciphertext);
            self.output.extend_from_slice(&tag);
            Ok(())
        })();

        match result {
            Ok(()) => {
                self.state = WriteState::ManifestSealed;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Step 3: drives the payload multiplexer over the already-sealed
    /// item ciphertexts and appends the woven payload bytes.
    pub fn write_payload(&mut self) -> Result<()> {
        self.require(WriteState::ManifestSealed)?;
        let ciphertexts = self.ciphertexts.take().expect("ManifestSealed implies ciphertexts");
        let payload_config = self.payload_config.take().expect("ManifestSealed implies payload_config");

        let result = (|| -> Result<()> {
            let mut entropy = entropy_source(self.backend, &payload_config.entropy)?;
            let (bytes, _report) = multiplex::write(&payload_config, &ciphertexts, &mut entropy)?;
            self.output.extend_from_slice(&bytes);
            Ok(())
        })();

        match result {
            Ok(()) => {
                self.state = WriteState::PayloadFlowing;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Step 4: optionally appends a trailing MAC over the entire
    /// preceding stream, then returns the finished package bytes.
    pub fn finish(mut self) -> Result<Vec<u8>> {
        self.require(WriteState::PayloadFlowing)?;
        if self.trailer_enabled {
            let manifest_key = self.manifest_key.clone().expect("trailer requires manifest_key");
            let algorithm = self.manifest_mac_algorithm.expect("trailer requires manifest_mac_algorithm");
            let tag = match (|| -> Result<Vec<u8>> {
                let mut mac = MacStream::new(self.backend, algorithm, &manifest_key)?;
                mac.update(&self.output)?;
                mac.finalize()
            })() {
                Ok(t) => t,
                Err(e) => return Err(self.fail(e)),
            };
            self.output.extend_from_slice(&tag);
        }
        self.state = WriteState::Sealed;
        Ok(self.output)
    }
}

/// Drives the read side of spec.md Section 4.6 end to end, in memory.
pub struct ReadSession<'b> {
    backend: &'b dyn Backend,
    state: ReadState,
    input: Vec<u8>,
    cursor: usize,
    header: Option<PackageHeader>,
    manifest_key: Option<Protected>,
    manifest: Option<Manifest>,
}

impl<'b> ReadSession<'b> {
    /// Starts a new read session over a complete package's bytes.
    pub fn new(backend: &'b dyn Backend, input: Vec<u8>) -> Self {
        ReadSession { backend, state: ReadState::Idle, input, cursor: 0, header: None, manifest_key: None, manifest: None }
    }

    /// The session's current state.
    pub fn state(&self) -> ReadState {
        self.state
    }

    /// The decrypted manifest, available once [`Self::verify_manifest`] has
    /// succeeded. Lets callers inspect the item table (paths, types,
    /// declared lengths) without decrypting any payload bytes.
    pub fn manifest(&self) -> Option<&Manifest> {
        self.manifest.as_ref()
    }

    fn require(&mut self, expected: ReadState) -> Result<()> {
        if self.state != expected {
            let what = format!("read session in state {:?}, expected {:?}", self.state, expected);
            self.state = ReadState::Failed;
            return Err(Error::InvalidConfiguration { what, allowed: format!("{:?}", expected) });
        }
        Ok(())
    }

    fn fail(&mut self, err: Error) -> Error {
        self.state = ReadState::Failed;
        err
    }

    /// Step 1: parses `[magic][version][header_len][header_bytes]`.
    pub fn parse_header(&mut self) -> Result<()> {
        self.require(ReadState::Idle)?;
        if self.input.len() < 10 {
            return Err(self.fail(Error::TruncatedHeader));
        }
        if &self.input[0..4] != MAGIC {
            return Err(self.fail(Error::TruncatedHeader));
        }
        let version = u16::from_be_bytes([self.input[4], self.input[5]]);
        let header_len = u32::from_be_bytes([self.input[6], self.input[7], self.input[8], self.input[9]]) as usize;
        let start = 10usize;
        let end = match start.checked_add(header_len) {
            Some(e) if e <= self.input.len() => e,
            _ => return Err(self.fail(Error::TruncatedHeader)),
        };
        let header = match codec::decode_header(&self.input[start..end]) {
            Ok(h) => h,
            Err(e) => return Err(self.fail(e)),
        };
        if header.version != version {
            return Err(self.fail(Error::SchemaVersionUnsupported(version)));
        }

        self.cursor = end;
        self.header = Some(header);
        self.state = ReadState::HeaderParsed;
        Ok(())
    }

    /// Step 2: finds the matching candidate key via `key_provider`,
    /// verifies the manifest MAC, and decrypts the manifest.
    pub fn verify_manifest(&mut self, key_provider: &dyn KeyProvider) -> Result<()> {
        self.require(ReadState::HeaderParsed)?;
        let header = self.header.clone().expect("HeaderParsed implies header");

        let result = (|| -> Result<(usize, Protected, Manifest)> {
            let mut cursor = self.cursor;
            if self.input.len() < cursor + 8 {
                return Err(Error::TruncatedManifest);
            }
            let ct_len = u64::from_be_bytes(self.input[cursor..cursor + 8].try_into().unwrap()) as usize;
            cursor += 8;
            let ct_end = cursor.checked_add(ct_len).filter(|&e| e <= self.input.len()).ok_or(Error::TruncatedManifest)?;
            let ciphertext = self.input[cursor..ct_end].to_vec();
            cursor = ct_end;

            let tag_len = registry::mac_descriptor(header.manifest_mac.algorithm).tag_size_bits / 8;
            let tag_end = cursor.checked_add(tag_len).filter(|&e| e <= self.input.len()).ok_or(Error::TruncatedManifest)?;
            let mac_tag = self.input[cursor..tag_end].to_vec();
            cursor = tag_end;

            let manifest_key = find_manifest_key(self.backend, &header, key_provider, &ciphertext, &mac_tag)?;

            let mut mac = MacStream::new(self.backend, header.manifest_mac.algorithm, &manifest_key)?;
            mac.update(&ciphertext)?;
            let computed = mac.finalize()?;
            if !secure_cmp(&computed, &mac_tag) {
                return Err(Error::MacMismatch { scope: MacScope::Manifest });
            }

            let cipher_config =
                item_cipher_config_from_kind(&header.manifest_cipher.cipher, manifest_key.clone(), header.manifest_nonce.clone())?;
            let mut cipher = CipherStream::new(false, &cipher_config, self.backend)?;
            let mut plaintext = cipher.process_bytes(&ciphertext)?;
            plaintext.extend(cipher.finalize()?);
            let manifest = codec::decode_manifest(&plaintext)?;

            Ok((cursor, manifest_key, manifest))
        })();

        match result {
            Ok((cursor, manifest_key, manifest)) => {
                self.cursor = cursor;
                self.manifest_key = Some(manifest_key);
                self.manifest = Some(manifest);
                self.state = ReadState::ManifestVerified;
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Step 3: drives the payload multiplexer in reverse, recovering and
    /// decrypting each item's plaintext.
    pub fn read_payload(&mut self) -> Result<Vec<(ItemId, Vec<u8>)>> {
        self.require(ReadState::ManifestVerified)?;
        let manifest = self.manifest.clone().expect("ManifestVerified implies manifest");
        let header = self.header.clone().expect("ManifestVerified implies header");

        let result = (|| -> Result<(usize, Vec<(ItemId, Vec<u8>)>)> {
            let trailer_tag_len = if header.trailer_present {
                registry::mac_descriptor(header.manifest_mac.algorithm).tag_size_bits / 8
            } else {
                0
            };
            if self.input.len() < self.cursor + trailer_tag_len {
                return Err(Error::TruncatedPayload);
            }
            let payload_end = self.input.len() - trailer_tag_len;
            let payload_bytes = &self.input[self.cursor..payload_end];

            let spans: Vec<ItemSpan> =
                manifest.items.iter().map(|item| ItemSpan { id: item.id, ciphertext_len: item_ciphertext_len(item) }).collect();
            let mut entropy = entropy_source(self.backend, &manifest.payload_config.entropy)?;
            let ciphertexts = multiplex::read(&manifest.payload_config, &spans, &mut entropy, payload_bytes)?;

            let mut items_by_id: HashMap<ItemId, &PayloadItem> = manifest.items.iter().map(|i| (i.id, i)).collect();
            let mut out = Vec::with_capacity(ciphertexts.len());
            for ct in &ciphertexts {
                let item = items_by_id.remove(&ct.id).ok_or_else(|| Error::InvalidConfiguration {
                    what: format!("multiplexer produced unknown item id {}", ct.id),
                    allowed: "ids drawn from the manifest's item list".into(),
                })?;
                let plaintext = open_item(self.backend, item, &ct.ciphertext)?;
                out.push((ct.id, plaintext));
            }
            Ok((payload_end, out))
        })();

        match result {
            Ok((cursor, out)) => {
                self.cursor = cursor;
                self.state = ReadState::PayloadFlowing;
                Ok(out)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Step 4: verifies the optional trailing MAC over everything read
    /// so far.
    pub fn finish(mut self) -> Result<()> {
        self.require(ReadState::PayloadFlowing)?;
        let header = self.header.clone().expect("PayloadFlowing implies header");
        if header.trailer_present {
            let manifest_key = self.manifest_key.clone().expect("trailer requires manifest_key");
            let result = (|| -> Result<()> {
                let mut mac = MacStream::new(self.backend, header.manifest_mac.algorithm, &manifest_key)?;
                mac.update(&self.input[..self.cursor])?;
                let computed = mac.finalize()?;
                let tag = &self.input[self.cursor..];
                if !secure_cmp(&computed, tag) {
                    return Err(Error::MacMismatch { scope: MacScope::Trailer });
                }
                Ok(())
            })();
            if let Err(e) = result {
                return Err(self.fail(e));
            }
        }
        self.state = ReadState::Verified;
        Ok(())
    }
}

fn derive_manifest_key(
    backend: &dyn Backend,
    request: &WriteRequest,
) -> Result<(Protected, Option<[u8; 32]>, Option<EcCurve>, ManifestKeyScheme)> {
    let key_len = manifest_cipher_key_len(&request.manifest_cipher);
    match &request.key_request {
        ManifestKeyRequest::SymmetricDirect { pre_key } => {
            let key = backend.kdf(request.kdf_algorithm, pre_key, &request.salt, key_len, request.kdf_params)?;
            Ok((key, None, None, ManifestKeyScheme::SymmetricDirect))
        }
        ManifestKeyRequest::Um1Hybrid { sender_static_secret, receiver_static_public, curve } => {
            let (shared, ephemeral_public) = um1::um1_initiate(backend, sender_static_secret, receiver_static_public)?;
            let key = backend.kdf(request.kdf_algorithm, &shared, &request.salt, key_len, request.kdf_params)?;
            Ok((key, Some(ephemeral_public), Some(*curve), ManifestKeyScheme::Um1Hybrid))
        }
    }
}

/// Tries every candidate key `key_provider` offers, returning the first
/// one that matches the header's key-confirmation blob (or, lacking one,
/// the manifest MAC itself).
fn find_manifest_key(
    backend: &dyn Backend,
    header: &PackageHeader,
    key_provider: &dyn KeyProvider,
    ciphertext: &[u8],
    mac_tag: &[u8],
) -> Result<Protected> {
    let key_len = manifest_cipher_key_len(&header.manifest_cipher.cipher);
    let candidates: Vec<Protected> = match header.scheme {
        ManifestKeyScheme::SymmetricDirect => key_provider
            .symmetric_candidates()
            .into_iter()
            .map(|pre_key| {
                backend.kdf(
                    header.manifest_cipher.kdf_algorithm,
                    &pre_key,
                    &header.manifest_cipher.salt,
                    key_len,
                    header.manifest_cipher.kdf_params,
                )
            })
            .collect::<Result<Vec<_>>>()?,
        ManifestKeyScheme::Um1Hybrid => {
            let ephemeral_public = header.ephemeral_public.ok_or_else(|| Error::InvalidConfiguration {
                what: "UM1-hybrid header is missing its ephemeral public key".into(),
                allowed: "ephemeral_public present for Um1Hybrid".into(),
            })?;
            key_provider
                .ec_candidates()
                .into_iter()
                .map(|cand| {
                    let shared = um1::um1_respond(backend, &cand.receiver_secret, &cand.sender_public, &ephemeral_public)?;
                    backend.kdf(
                        header.manifest_cipher.kdf_algorithm,
                        &shared,
                        &header.manifest_cipher.salt,
                        key_len,
                        header.manifest_cipher.kdf_params,
                    )
                })
                .collect::<Result<Vec<_>>>()?
        }
    };

    for key in candidates {
        let matches = if let Some(expected) = &header.key_confirmation {
            let token = confirmation_token(
                backend,
                header.manifest_mac.algorithm,
                &key,
                header.ephemeral_public.as_ref(),
                &header.manifest_cipher.salt,
            )?;
            secure_cmp(&token, expected)
        } else {
            let mut mac = MacStream::new(backend, header.manifest_mac.algorithm, &key)?;
            mac.update(ciphertext)?;
            let tag = mac.finalize()?;
            secure_cmp(&tag, mac_tag)
        };
        if matches {
            return Ok(key);
        }
    }
    Err(Error::NoMatchingKey)
}

fn confirmation_token(
    backend: &dyn Backend,
    algorithm: MacAlgorithm,
    manifest_key: &Protected,
    ephemeral_public: Option<&[u8; 32]>,
    salt: &[u8],
) -> Result<Vec<u8>> {
    let mut mac = MacStream::new(backend, algorithm, manifest_key)?;
    mac.update(CONFIRMATION_TAG)?;
    mac.update(ephemeral_public.map(|p| p.as_slice()).unwrap_or(&[0u8; 32]))?;
    mac.update(salt)?;
    mac.finalize()
}

/// Converts the header's key-free cipher selection into a concrete,
/// keyed [`ItemCipherConfig`] for the manifest's own cipher stream.
/// Rejects AEAD: the manifest always gets an explicit, separate MAC.
fn item_cipher_config_from_kind(kind: &ItemCipherConfigKind, key: Protected, nonce: Vec<u8>) -> Result<ItemCipherConfig> {
    match kind {
        ItemCipherConfigKind::Block { algorithm, mode, padding } => {
            Ok(ItemCipherConfig::Block { algorithm: *algorithm, mode: *mode, padding: *padding, key, nonce })
        }
        ItemCipherConfigKind::Stream { algorithm } => Ok(ItemCipherConfig::Stream { algorithm: *algorithm, key, nonce }),
        ItemCipherConfigKind::Aead { .. } => Err(Error::InvalidConfiguration {
            what: "the manifest cipher must be a non-AEAD cipher".into(),
            allowed: "Block or Stream; an AEAD manifest cipher would fold authentication into the cipher itself, bypassing the explicit manifest MAC step".into(),
        }),
    }
}

fn manifest_cipher_key_len(kind: &ItemCipherConfigKind) -> usize {
    match kind {
        ItemCipherConfigKind::Block { algorithm, .. } | ItemCipherConfigKind::Aead { algorithm, .. } => {
            registry::block_cipher_descriptor(*algorithm).default_key_size_bits / 8
        }
        ItemCipherConfigKind::Stream { algorithm } => registry::stream_cipher_descriptor(*algorithm).default_key_size_bits / 8,
    }
}

fn manifest_cipher_nonce_len(kind: &ItemCipherConfigKind) -> Result<usize> {
    match kind {
        ItemCipherConfigKind::Block { algorithm, .. } => Ok(registry::block_cipher_descriptor(*algorithm).block_size_bits / 8),
        ItemCipherConfigKind::Stream { algorithm } => {
            Ok(registry::stream_cipher_descriptor(*algorithm).default_nonce_size_bits / 8)
        }
        ItemCipherConfigKind::Aead { .. } => Err(Error::InvalidConfiguration {
            what: "the manifest cipher must be a non-AEAD cipher".into(),
            allowed: "Block or Stream".into(),
        }),
    }
}

/// The ciphertext length a sealed item occupies in the multiplexed
/// payload, derivable from the manifest alone (no length prefix needed
/// in the payload stream itself).
fn item_ciphertext_len(item: &PayloadItem) -> u64 {
    match &item.cipher {
        ItemCipherConfig::Stream { .. } | ItemCipherConfig::Aead { .. } => item.declared_len,
        ItemCipherConfig::Block { mode: BlockCipherMode::Cbc, algorithm, .. } => {
            let block_size = (registry::block_cipher_descriptor(*algorithm).block_size_bits / 8) as u64;
            item.declared_len + (block_size - (item.declared_len % block_size))
        }
        ItemCipherConfig::Block { .. } => item.declared_len,
    }
}

/// Seals one item in place: enciphers `plaintext`, fills `item.mac.tag`,
/// and returns the ciphertext bytes destined for the multiplexer. For
/// AEAD items the tag comes directly from `finalize_aead`; for
/// everything else, a separate MAC runs over the finished ciphertext.
fn seal_item(backend: &dyn Backend, item: &mut PayloadItem, plaintext: &[u8]) -> Result<Vec<u8>> {
    item.declared_len = plaintext.len() as u64;
    let mut cipher = CipherStream::new(true, &item.cipher, backend)?;
    match &item.cipher {
        ItemCipherConfig::Aead { .. } => {
            cipher.process_bytes(plaintext)?;
            let (ciphertext, tag) = cipher.finalize_aead(item.id)?;
            item.mac.tag = tag;
            Ok(ciphertext)
        }
        _ => {
            let mut ciphertext = cipher.process_bytes(plaintext)?;
            ciphertext.extend(cipher.finalize()?);
            let mut mac = MacStream::new(backend, item.mac.algorithm, &item.mac.key)?;
            mac.update(&ciphertext)?;
            item.mac.tag = Some(mac.finalize()?);
            Ok(ciphertext)
        }
    }
}

/// Reverses [`seal_item`]: verifies the item's tag (AEAD inline, or a
/// separate MAC otherwise) and deciphers its ciphertext.
fn open_item(backend: &dyn Backend, item: &PayloadItem, ciphertext: &[u8]) -> Result<Vec<u8>> {
    match &item.cipher {
        ItemCipherConfig::Aead { .. } => {
            let tag = item.mac.tag.clone().ok_or(Error::MacMismatch { scope: MacScope::Item(item.id) })?;
            let mut cipher = CipherStream::new(false, &item.cipher, backend)?;
            cipher.process_bytes(ciphertext)?;
            cipher.set_expected_tag(tag)?;
            let (plaintext, _) = cipher.finalize_aead(item.id)?;
            Ok(plaintext)
        }
        _ => {
            let expected_tag = item.mac.tag.as_ref().ok_or(Error::MacMismatch { scope: MacScope::Item(item.id) })?;
            let mut mac = MacStream::new(backend, item.mac.algorithm, &item.mac.key)?;
            mac.update(ciphertext)?;
            let computed = mac.finalize()?;
            if !secure_cmp(&computed, expected_tag) {
                return Err(Error::MacMismatch { scope: MacScope::Item(item.id) });
            }
            let mut cipher = CipherStream::new(false, &item.cipher, backend)?;
            let mut plaintext = cipher.process_bytes(ciphertext)?;
            plaintext.extend(cipher.finalize()?);
            Ok(plaintext)
        }
    }
}

fn entropy_source(backend: &dyn Backend, scheme: &EntropyScheme) -> Result<EntropySource> {
    match scheme {
        EntropyScheme::Preallocation { data } => Ok(EntropySource::Preallocation { data: data.clone(), pos: 0 }),
        EntropyScheme::StreamCipherCsprng { algorithm, key, nonce } => {
            Ok(EntropySource::Prng(CsPrng::new(backend, *algorithm, key, nonce)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::backend::rustcrypto::RustCryptoBackend;
    use crate::key_provider::{EcKeyProvider, EcKeypairCandidate, SymmetricKeyProvider};
    use crate::manifest::{FrameshiftParams, ItemKdfConfig, ItemMacConfig, ItemType, LayoutScheme};
    use crate::registry::{BlockCipherAlgorithm, StreamCipherAlgorithm};

    fn symmetric_request(pre_key: Protected, payload_config: PayloadConfiguration) -> WriteRequest {
        WriteRequest {
            version: 1,
            key_request: ManifestKeyRequest::SymmetricDirect { pre_key },
            manifest_cipher: ItemCipherConfigKind::Stream { algorithm: StreamCipherAlgorithm::XSalsa20 },
            manifest_mac_algorithm: MacAlgorithm::HmacSha256,
            kdf_algorithm: KdfAlgorithm::Scrypt,
            kdf_params: KdfParams::Scrypt { log_n: 4, r: 8, p: 1 },
            salt: vec![0x5Au8; 16],
            include_key_confirmation: true,
            payload_config,
            trailer_enabled: true,
        }
    }

    fn item_input(id: u128, plaintext: &[u8]) -> ItemInput {
        let key = Protected::from(vec![0x11u8; 32]);
        let nonce = vec![0x22u8; 8];
        ItemInput {
            item: PayloadItem {
                id: ItemId(id),
                path: format!("item-{}", id),
                declared_len: 0,
                cipher: ItemCipherConfig::Stream { algorithm: StreamCipherAlgorithm::Salsa20, key: key.clone(), nonce },
                mac: ItemMacConfig { algorithm: MacAlgorithm::HmacSha256, key, nonce: None, tag: None },
                item_type: ItemType::File,
                kdf: None,
            },
            plaintext: plaintext.to_vec(),
        }
    }

    fn simple_payload_config() -> PayloadConfiguration {
        PayloadConfiguration {
            scheme: LayoutScheme::Simple,
            entropy: EntropyScheme::StreamCipherCsprng {
                algorithm: StreamCipherAlgorithm::Salsa20,
                key: Protected::from(vec![0x33u8; 32]),
                nonce: vec![0x44u8; 8],
            },
            frameshift: None,
            fabric: None,
        }
    }

    #[test]
    fn symmetric_roundtrip_simple_layout() {
        let backend = RustCryptoBackend;
        let pre_key = Protected::from(vec![0x99u8; 16]);
        let request = symmetric_request(pre_key.clone(), simple_payload_config());

        let items = vec![
            item_input(1, b"hello from item one"),
            item_input(2, b"a second item, a little longer than the first"),
        ];

        let mut writer = WriteSession::new(&backend);
        writer.write_header(&request, items, None).unwrap();
        writer.seal_manifest().unwrap();
        writer.write_payload().unwrap();
        let package = writer.finish().unwrap();

        let provider = SymmetricKeyProvider::new(vec![pre_key]);
        let mut reader = ReadSession::new(&backend, package);
        reader.parse_header().unwrap();
        reader.verify_manifest(&provider).unwrap();
        let mut recovered = reader.read_payload().unwrap();
        reader.finish().unwrap();

        recovered.sort_by_key(|(id, _)| id.0);
        assert_eq!(recovered[0].1, b"hello from item one");
        assert_eq!(recovered[1].1, b"a second item, a little longer than the first");
    }

    #[test]
    fn wrong_key_fails_with_no_matching_key() {
        let backend = RustCryptoBackend;
        let pre_key = Protected::from(vec![0x99u8; 16]);
        let request = symmetric_request(pre_key, simple_payload_config());

        let mut writer = WriteSession::new(&backend);
        writer.write_header(&request, vec![item_input(1, b"secret")], None).unwrap();
        writer.seal_manifest().unwrap();
        writer.write_payload().unwrap();
        let package = writer.finish().unwrap();

        let provider = SymmetricKeyProvider::new(vec![Protected::from(vec![0x00u8; 16])]);
        let mut reader = ReadSession::new(&backend, package);
        reader.parse_header().unwrap();
        let err = reader.verify_manifest(&provider).unwrap_err();
        assert!(matches!(err, Error::NoMatchingKey));
        assert_eq!(reader.state(), ReadState::Failed);
    }

    #[test]
    fn tampered_manifest_fails_with_mac_mismatch() {
        let backend = RustCryptoBackend;
        let pre_key = Protected::from(vec![0x99u8; 16]);
        let request = symmetric_request(pre_key.clone(), simple_payload_config());

        let mut writer = WriteSession::new(&backend);
        writer.write_header(&request, vec![item_input(1, b"secret")], None).unwrap();
        writer.seal_manifest().unwrap();
        writer.write_payload().unwrap();
        let mut package = writer.finish().unwrap();

        let tamper_at = package.len() / 2;
        package[tamper_at] ^= 0xFF;

        let provider = SymmetricKeyProvider::new(vec![pre_key]);
        let mut reader = ReadSession::new(&backend, package);
        reader.parse_header().unwrap();
        let err = reader.verify_manifest(&provider);
        assert!(err.is_err());
        assert_eq!(reader.state(), ReadState::Failed);
    }

    #[test]
    fn um1_hybrid_roundtrip() {
        let backend = RustCryptoBackend;
        let (sender_sk, _sender_pk) = backend.x25519_generate_key().unwrap();
        let sender_pk = backend.x25519_derive_public(&sender_sk).unwrap();
        let (receiver_sk, receiver_pk) = backend.x25519_generate_key().unwrap();

        let request = WriteRequest {
            version: 1,
            key_request: ManifestKeyRequest::Um1Hybrid {
                sender_static_secret: sender_sk,
                receiver_static_public: receiver_pk,
                curve: EcCurve::Curve25519,
            },
            manifest_cipher: ItemCipherConfigKind::Block {
                algorithm: BlockCipherAlgorithm::Aes,
                mode: BlockCipherMode::Ctr,
                padding: None,
            },
            manifest_mac_algorithm: MacAlgorithm::HmacSha256,
            kdf_algorithm: KdfAlgorithm::Scrypt,
            kdf_params: KdfParams::Scrypt { log_n: 4, r: 8, p: 1 },
            salt: vec![0x7Bu8; 16],
            include_key_confirmation: true,
            payload_config: PayloadConfiguration {
                scheme: LayoutScheme::Frameshift,
                entropy: EntropyScheme::StreamCipherCsprng {
                    algorithm: StreamCipherAlgorithm::Salsa20,
                    key: Protected::from(vec![0x5Cu8; 32]),
                    nonce: vec![0x6Du8; 8],
                },
                frameshift: Some(FrameshiftParams { min_padding: 4, max_padding: 12 }),
                fabric: None,
            },
            trailer_enabled: false,
        };

        let mut writer = WriteSession::new(&backend);
        writer.write_header(&request, vec![item_input(42, b"um1 hybrid payload")], None).unwrap();
        writer.seal_manifest().unwrap();
        writer.write_payload().unwrap();
        let package = writer.finish().unwrap();

        let provider = EcKeyProvider::new(vec![EcKeypairCandidate {
            curve: EcCurve::Curve25519,
            receiver_secret: receiver_sk,
            sender_public: sender_pk,
        }]);
        let mut reader = ReadSession::new(&backend, package);
        reader.parse_header().unwrap();
        reader.verify_manifest(&provider).unwrap();
        let recovered = reader.read_payload().unwrap();
        reader.finish().unwrap();
        assert_eq!(recovered[0].1, b"um1 hybrid payload");
    }

    #[test]
    fn out_of_order_calls_fail_closed() {
        let backend = RustCryptoBackend;
        let mut writer = WriteSession::new(&backend);
        let err = writer.seal_manifest().unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
        assert_eq!(writer.state(), WriteState::Failed);
    }

    #[test]
    fn item_kdf_config_is_accepted_but_unused_by_the_pipeline() {
        // ItemKdfConfig is descriptive metadata on PayloadItem; the pipeline
        // always ciphers with the key already present on the item.
        let _ = ItemKdfConfig { algorithm: KdfAlgorithm::Scrypt, salt: vec![1, 2, 3] };
    }
}
