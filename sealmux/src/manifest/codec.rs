//! The `DtoCodec` external-collaborator interface (spec.md Section 6):
//! `encode`/`decode` for [`PackageHeader`], [`Manifest`], and
//! [`PayloadConfiguration`].
//!
//! This is a hand-rolled tag-length-value binary format, not a `serde`
//! derive: every enum gets a fixed one-byte discriminant and every
//! variable-length field a length prefix, matching the teacher's own
//! practice of writing packet bodies by hand in `serialize/mod.rs` rather
//! than deriving a generic encoding. Malformed header bytes surface as
//! [`Error::TruncatedHeader`]; malformed manifest bytes (this codec only
//! ever sees the manifest's plaintext, post-decryption) surface as
//! [`Error::TruncatedManifest`].

use std::collections::BTreeMap;

use super::{
    EntropyScheme, FabricParams, FrameshiftParams, ItemCipherConfig, ItemCipherConfigKind,
    ItemId, ItemKdfConfig, ItemMacConfig, ItemType, LayoutScheme, Manifest, ManifestCipherConfig,
    ManifestKeyScheme, ManifestMacConfig, PackageHeader, PayloadConfiguration, PayloadItem,
};
use crate::crypto::backend::KdfParams;
use crate::crypto::mem::Protected;
use crate::error::{Error, Result};
use crate::registry::{
    BlockCipherAlgorithm, BlockCipherMode, EcCurve, KdfAlgorithm, MacAlgorithm, PaddingScheme,
    StreamCipherAlgorithm,
};

/// Which truncation variant a malformed read should surface as.
#[derive(Clone, Copy)]
enum Ctx {
    Header,
    Manifest,
}

impl Ctx {
    fn err(self) -> Error {
        match self {
            Ctx::Header => Error::TruncatedHeader,
            Ctx::Manifest => Error::TruncatedManifest,
        }
    }
}

struct Writer(Vec<u8>);

impl Writer {
    fn new() -> Self {
        Writer(Vec::new())
    }

    fn u8(&mut self, v: u8) {
        self.0.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.0.extend_from_slice(&v.to_be_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.0.extend_from_slice(&v.to_be_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.0.extend_from_slice(&v.to_be_bytes());
    }

    fn bytes(&mut self, b: &[u8]) {
        self.u32(b.len() as u32);
        self.0.extend_from_slice(b);
    }

    fn str(&mut self, s: &str) {
        self.u16(s.len() as u16);
        self.0.extend_from_slice(s.as_bytes());
    }

    fn opt<T>(&mut self, v: &Option<T>, f: impl FnOnce(&mut Self, &T)) {
        match v {
            None => self.u8(0),
            Some(inner) => {
                self.u8(1);
                f(self, inner);
            }
        }
    }

    fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
    ctx: Ctx,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8], ctx: Ctx) -> Self {
        Reader { buf, pos: 0, ctx }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return Err(self.ctx.err());
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u32()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn str(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        let raw = self.take(len)?;
        String::from_utf8(raw.to_vec()).map_err(|_| self.ctx.err())
    }

    fn opt<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<Option<T>> {
        match self.u8()? {
            0 => Ok(None),
            1 => Ok(Some(f(self)?)),
            _ => Err(self.ctx.err()),
        }
    }

    fn finish(&self) -> Result<()> {
        if self.pos == self.buf.len() {
            Ok(())
        } else {
            Err(self.ctx.err())
        }
    }
}

// --- enum tags -------------------------------------------------------

fn tag_block_cipher_mode(w: &mut Writer, m: BlockCipherMode) {
    w.u8(match m {
        BlockCipherMode::Ctr => 0,
        BlockCipherMode::Cbc => 1,
        BlockCipherMode::Cfb => 2,
        BlockCipherMode::Ofb => 3,
        BlockCipherMode::Gcm => 4,
        BlockCipherMode::Eax => 5,
    });
}

fn untag_block_cipher_mode(r: &mut Reader) -> Result<BlockCipherMode> {
    Ok(match r.u8()? {
        0 => BlockCipherMode::Ctr,
        1 => BlockCipherMode::Cbc,
        2 => BlockCipherMode::Cfb,
        3 => BlockCipherMode::Ofb,
        4 => BlockCipherMode::Gcm,
        5 => BlockCipherMode::Eax,
        _ => return Err(r.ctx.err()),
    })
}

fn tag_padding_scheme(w: &mut Writer, p: PaddingScheme) {
    w.u8(match p {
        PaddingScheme::Iso10126 => 0,
        PaddingScheme::Iso7816 => 1,
        PaddingScheme::Pkcs7 => 2,
        PaddingScheme::Tbc => 3,
        PaddingScheme::AnsiX923 => 4,
    });
}

fn untag_padding_scheme(r: &mut Reader) -> Result<PaddingScheme> {
    Ok(match r.u8()? {
        0 => PaddingScheme::Iso10126,
        1 => PaddingScheme::Iso7816,
        2 => PaddingScheme::Pkcs7,
        3 => PaddingScheme::Tbc,
        4 => PaddingScheme::AnsiX923,
        _ => return Err(r.ctx.err()),
    })
}

fn tag_block_cipher_algorithm(w: &mut Writer, a: BlockCipherAlgorithm) {
    w.u8(match a {
        BlockCipherAlgorithm::Aes => 0,
        BlockCipherAlgorithm::Twofish => 1,
        BlockCipherAlgorithm::Serpent => 2,
    });
}

fn untag_block_cipher_algorithm(r: &mut Reader) -> Result<BlockCipherAlgorithm> {
    Ok(match r.u8()? {
        0 => BlockCipherAlgorithm::Aes,
        1 => BlockCipherAlgorithm::Twofish,
        2 => BlockCipherAlgorithm::Serpent,
        _ => return Err(r.ctx.err()),
    })
}

fn tag_stream_cipher_algorithm(w: &mut Writer, a: StreamCipherAlgorithm) {
    w.u8(match a {
        StreamCipherAlgorithm::Salsa20 => 0,
        StreamCipherAlgorithm::XSalsa20 => 1,
        StreamCipherAlgorithm::ChaCha20 => 2,
        StreamCipherAlgorithm::Hc128 => 3,
        StreamCipherAlgorithm::Sosemanuk => 4,
        StreamCipherAlgorithm::Rabbit => 5,
    });
}

fn untag_stream_cipher_algorithm(r: &mut Reader) -> Result<StreamCipherAlgorithm> {
    Ok(match r.u8()? {
        0 => StreamCipherAlgorithm::Salsa20,
        1 => StreamCipherAlgorithm::XSalsa20,
        2 => StreamCipherAlgorithm::ChaCha20,
        3 => StreamCipherAlgorithm::Hc128,
        4 => StreamCipherAlgorithm::Sosemanuk,
        5 => StreamCipherAlgorithm::Rabbit,
        _ => return Err(r.ctx.err()),
    })
}

fn tag_mac_algorithm(w: &mut Writer, a: MacAlgorithm) {
    w.u8(match a {
        MacAlgorithm::HmacSha256 => 0,
        MacAlgorithm::HmacSha512 => 1,
        MacAlgorithm::CmacAes => 2,
        MacAlgorithm::Poly1305 => 3,
        MacAlgorithm::Blake2bKeyed => 4,
    });
}

fn untag_mac_algorithm(r: &mut Reader) -> Result<MacAlgorithm> {
    Ok(match r.u8()? {
        0 => MacAlgorithm::HmacSha256,
        1 => MacAlgorithm::HmacSha512,
        2 => MacAlgorithm::CmacAes,
        3 => MacAlgorithm::Poly1305,
        4 => MacAlgorithm::Blake2bKeyed,
        _ => return Err(r.ctx.err()),
    })
}

fn tag_kdf_algorithm(w: &mut Writer, a: KdfAlgorithm) {
    w.u8(match a {
        KdfAlgorithm::Scrypt => 0,
        KdfAlgorithm::Pbkdf2 => 1,
    });
}

fn untag_kdf_algorithm(r: &mut Reader) -> Result<KdfAlgorithm> {
    Ok(match r.u8()? {
        0 => KdfAlgorithm::Scrypt,
        1 => KdfAlgorithm::Pbkdf2,
        _ => return Err(r.ctx.err()),
    })
}

fn tag_ec_curve(w: &mut Writer, c: EcCurve) {
    w.u8(match c {
        EcCurve::Curve25519 => 0,
        EcCurve::Ed25519 => 1,
        EcCurve::NistP256 => 2,
        EcCurve::BrainpoolP256r1 => 3,
    });
}

fn untag_ec_curve(r: &mut Reader) -> Result<EcCurve> {
    Ok(match r.u8()? {
        0 => EcCurve::Curve25519,
        1 => EcCurve::Ed25519,
        2 => EcCurve::NistP256,
        3 => EcCurve::BrainpoolP256r1,
        _ => return Err(r.ctx.err()),
    })
}

fn tag_item_type(w: &mut Writer, t: ItemType) {
    w.u8(match t {
        ItemType::File => 0,
        ItemType::Message => 1,
        ItemType::KeyAction => 2,
    });
}

fn untag_item_type(r: &mut Reader) -> Result<ItemType> {
    Ok(match r.u8()? {
        0 => ItemType::File,
        1 => ItemType::Message,
        2 => ItemType::KeyAction,
        _ => return Err(r.ctx.err()),
    })
}

fn tag_key_scheme(w: &mut Writer, s: ManifestKeyScheme) {
    w.u8(match s {
        ManifestKeyScheme::SymmetricDirect => 0,
        ManifestKeyScheme::Um1Hybrid => 1,
    });
}

fn untag_key_scheme(r: &mut Reader) -> Result<ManifestKeyScheme> {
    Ok(match r.u8()? {
        0 => ManifestKeyScheme::SymmetricDirect,
        1 => ManifestKeyScheme::Um1Hybrid,
        _ => return Err(r.ctx.err()),
    })
}

fn tag_layout_scheme(w: &mut Writer, s: LayoutScheme) {
    w.u8(match s {
        LayoutScheme::Simple => 0,
        LayoutScheme::Frameshift => 1,
        LayoutScheme::Fabric => 2,
    });
}

fn untag_layout_scheme(r: &mut Reader) -> Result<LayoutScheme> {
    Ok(match r.u8()? {
        0 => LayoutScheme::Simple,
        1 => LayoutScheme::Frameshift,
        2 => LayoutScheme::Fabric,
        _ => return Err(r.ctx.err()),
    })
}

// --- compound fields ---------------------------------------------------

fn write_kdf_params(w: &mut Writer, p: &KdfParams) {
    match *p {
        KdfParams::Scrypt { log_n, r, p } => {
            w.u8(0);
            w.u8(log_n);
            w.u32(r);
            w.u32(p);
        }
        KdfParams::Pbkdf2 { iterations } => {
            w.u8(1);
            w.u32(iterations);
        }
    }
}

fn read_kdf_params(r: &mut Reader) -> Result<KdfParams> {
    Ok(match r.u8()? {
        0 => KdfParams::Scrypt { log_n: r.u8()?, r: r.u32()?, p: r.u32()? },
        1 => KdfParams::Pbkdf2 { iterations: r.u32()? },
        _ => return Err(r.ctx.err()),
    })
}

fn write_cipher_kind(w: &mut Writer, k: &ItemCipherConfigKind) {
    match *k {
        ItemCipherConfigKind::Block { algorithm, mode, padding } => {
            w.u8(0);
            tag_block_cipher_algorithm(w, algorithm);
            tag_block_cipher_mode(w, mode);
            w.opt(&padding, |w, p| tag_padding_scheme(w, *p));
        }
        ItemCipherConfigKind::Aead { algorithm, mode } => {
            w.u8(1);
            tag_block_cipher_algorithm(w, algorithm);
            tag_block_cipher_mode(w, mode);
        }
        ItemCipherConfigKind::Stream { algorithm } => {
            w.u8(2);
            tag_stream_cipher_algorithm(w, algorithm);
        }
    }
}

fn read_cipher_kind(r: &mut Reader) -> Result<ItemCipherConfigKind> {
    Ok(match r.u8()? {
        0 => ItemCipherConfigKind::Block {
            algorithm: untag_block_cipher_algorithm(r)?,
            mode: untag_block_cipher_mode(r)?,
            padding: r.opt(|r| untag_padding_scheme(r))?,
        },
        1 => ItemCipherConfigKind::Aead {
            algorithm: untag_block_cipher_algorithm(r)?,
            mode: untag_block_cipher_mode(r)?,
        },
        2 => ItemCipherConfigKind::Stream { algorithm: untag_stream_cipher_algorithm(r)? },
        _ => return Err(r.ctx.err()),
    })
}

fn write_item_cipher_config(w: &mut Writer, c: &ItemCipherConfig) {
    match c {
        ItemCipherConfig::Block { algorithm, mode, padding, key, nonce } => {
            w.u8(0);
            tag_block_cipher_algorithm(w, *algorithm);
            tag_block_cipher_mode(w, *mode);
            w.opt(padding, |w, p| tag_padding_scheme(w, *p));
            w.bytes(key);
            w.bytes(nonce);
        }
        ItemCipherConfig::Aead { algorithm, mode, key, nonce } => {
            w.u8(1);
            tag_block_cipher_algorithm(w, *algorithm);
            tag_block_cipher_mode(w, *mode);
            w.bytes(key);
            w.bytes(nonce);
        }
        ItemCipherConfig::Stream { algorithm, key, nonce } => {
            w.u8(2);
            tag_stream_cipher_algorithm(w, *algorithm);
            w.bytes(key);
            w.bytes(nonce);
        }
    }
}

fn read_item_cipher_config(r: &mut Reader) -> Result<ItemCipherConfig> {
    Ok(match r.u8()? {
        0 => ItemCipherConfig::Block {
            algorithm: untag_block_cipher_algorithm(r)?,
            mode: untag_block_cipher_mode(r)?,
            padding: r.opt(|r| untag_padding_scheme(r))?,
            key: Protected::from(r.bytes()?),
            nonce: r.bytes()?,
        },
        1 => ItemCipherConfig::Aead {
            algorithm: untag_block_cipher_algorithm(r)?,
            mode: untag_block_cipher_mode(r)?,
            key: Protected::from(r.bytes()?),
            nonce: r.bytes()?,
        },
        2 => ItemCipherConfig::Stream {
            algorithm: untag_stream_cipher_algorithm(r)?,
            key: Protected::from(r.bytes()?),
            nonce: r.bytes()?,
        },
        _ => return Err(r.ctx.err()),
    })
}

fn write_item_mac_config(w: &mut Writer, m: &ItemMacConfig) {
    tag_mac_algorithm(w, m.algorithm);
    w.bytes(&m.key);
    w.opt(&m.nonce, |w, n| w.bytes(n));
    w.opt(&m.tag, |w, t| w.bytes(t));
}

fn read_item_mac_config(r: &mut Reader) -> Result<ItemMacConfig> {
    Ok(ItemMacConfig {
        algorithm: untag_mac_algorithm(r)?,
        key: Protected::from(r.bytes()?),
        nonce: r.opt(|r| r.bytes())?,
        tag: r.opt(|r| r.bytes())?,
    })
}

fn write_item_kdf_config(w: &mut Writer, k: &ItemKdfConfig) {
    tag_kdf_algorithm(w, k.algorithm);
    w.bytes(&k.salt);
}

fn read_item_kdf_config(r: &mut Reader) -> Result<ItemKdfConfig> {
    Ok(ItemKdfConfig { algorithm: untag_kdf_algorithm(r)?, salt: r.bytes()? })
}

fn write_payload_item(w: &mut Writer, item: &PayloadItem) {
    w.u64(item.id.0 as u64);
    w.u64((item.id.0 >> 64) as u64);
    w.str(&item.path);
    w.u64(item.declared_len);
    write_item_cipher_config(w, &item.cipher);
    write_item_mac_config(w, &item.mac);
    tag_item_type(w, item.item_type);
    w.opt(&item.kdf, |w, k| write_item_kdf_config(w, k));
}

fn read_payload_item(r: &mut Reader) -> Result<PayloadItem> {
    let lo = r.u64()? as u128;
    let hi = r.u64()? as u128;
    Ok(PayloadItem {
        id: ItemId(lo | (hi << 64)),
        path: r.str()?,
        declared_len: r.u64()?,
        cipher: read_item_cipher_config(r)?,
        mac: read_item_mac_config(r)?,
        item_type: untag_item_type(r)?,
        kdf: r.opt(|r| read_item_kdf_config(r))?,
    })
}

fn write_entropy_scheme(w: &mut Writer, e: &EntropyScheme) {
    match e {
        EntropyScheme::Preallocation { data } => {
            w.u8(0);
            w.bytes(data);
        }
        EntropyScheme::StreamCipherCsprng { algorithm, key, nonce } => {
            w.u8(1);
            tag_stream_cipher_algorithm(w, *algorithm);
            w.bytes(key);
            w.bytes(nonce);
        }
    }
}

fn read_entropy_scheme(r: &mut Reader) -> Result<EntropyScheme> {
    Ok(match r.u8()? {
        0 => EntropyScheme::Preallocation { data: r.bytes()? },
        1 => EntropyScheme::StreamCipherCsprng {
            algorithm: untag_stream_cipher_algorithm(r)?,
            key: Protected::from(r.bytes()?),
            nonce: r.bytes()?,
        },
        _ => return Err(r.ctx.err()),
    })
}

fn write_payload_configuration(w: &mut Writer, c: &PayloadConfiguration) {
    tag_layout_scheme(w, c.scheme);
    write_entropy_scheme(w, &c.entropy);
    w.opt(&c.frameshift, |w, p| {
        w.u32(p.min_padding);
        w.u32(p.max_padding);
    });
    w.opt(&c.fabric, |w, p| {
        w.u32(p.min_stripe);
        w.u32(p.max_stripe);
    });
}

fn read_payload_configuration(r: &mut Reader) -> Result<PayloadConfiguration> {
    Ok(PayloadConfiguration {
        scheme: untag_layout_scheme(r)?,
        entropy: read_entropy_scheme(r)?,
        frameshift: r.opt(|r| {
            Ok(FrameshiftParams { min_padding: r.u32()?, max_padding: r.u32()? })
        })?,
        fabric: r.opt(|r| Ok(FabricParams { min_stripe: r.u32()?, max_stripe: r.u32()? }))?,
    })
}

fn write_manifest_cipher_config(w: &mut Writer, c: &ManifestCipherConfig) {
    write_cipher_kind(w, &c.cipher);
    tag_kdf_algorithm(w, c.kdf_algorithm);
    write_kdf_params(w, &c.kdf_params);
    w.bytes(&c.salt);
}

fn read_manifest_cipher_config(r: &mut Reader) -> Result<ManifestCipherConfig> {
    Ok(ManifestCipherConfig {
        cipher: read_cipher_kind(r)?,
        kdf_algorithm: untag_kdf_algorithm(r)?,
        kdf_params: read_kdf_params(r)?,
        salt: r.bytes()?,
    })
}

fn write_manifest_mac_config(w: &mut Writer, m: &ManifestMacConfig) {
    tag_mac_algorithm(w, m.algorithm);
}

fn read_manifest_mac_config(r: &mut Reader) -> Result<ManifestMacConfig> {
    Ok(ManifestMacConfig { algorithm: untag_mac_algorithm(r)? })
}

// --- top-level DTOs ------------------------------------------------------

/// Encodes a [`PackageHeader`] to its clear-text wire form.
pub fn encode_header(header: &PackageHeader) -> Vec<u8> {
    let mut w = Writer::new();
    w.u16(header.version);
    tag_key_scheme(&mut w, header.scheme);
    write_manifest_cipher_config(&mut w, &header.manifest_cipher);
    w.bytes(&header.manifest_nonce);
    write_manifest_mac_config(&mut w, &header.manifest_mac);
    w.opt(&header.manifest_mac_nonce, |w, n| w.bytes(n));
    w.opt(&header.ephemeral_public, |w, p| w.0.extend_from_slice(p));
    w.opt(&header.ephemeral_curve, |w, c| tag_ec_curve(w, *c));
    w.opt(&header.key_confirmation, |w, c| w.bytes(c));
    write_payload_configuration(&mut w, &header.payload_config);
    w.u8(header.trailer_present as u8);
    w.into_vec()
}

/// Decodes a [`PackageHeader`] from its clear-text wire form.
pub fn decode_header(buf: &[u8]) -> Result<PackageHeader> {
    let mut r = Reader::new(buf, Ctx::Header);
    let header = PackageHeader {
        version: r.u16()?,
        scheme: untag_key_scheme(&mut r)?,
        manifest_cipher: read_manifest_cipher_config(&mut r)?,
        manifest_nonce: r.bytes()?,
        manifest_mac: read_manifest_mac_config(&mut r)?,
        manifest_mac_nonce: r.opt(|r| r.bytes())?,
        ephemeral_public: r.opt(|r| {
            let raw = r.take(32)?;
            let mut out = [0u8; 32];
            out.copy_from_slice(raw);
            Ok(out)
        })?,
        ephemeral_curve: r.opt(|r| untag_ec_curve(r))?,
        key_confirmation: r.opt(|r| r.bytes())?,
        payload_config: read_payload_configuration(&mut r)?,
        trailer_present: match r.u8()? {
            0 => false,
            1 => true,
            _ => return Err(Ctx::Header.err()),
        },
    };
    r.finish()?;
    Ok(header)
}

/// Encodes a [`Manifest`] to its plaintext wire form (the bytes that get
/// sealed under the manifest cipher and MAC).
pub fn encode_manifest(manifest: &Manifest) -> Vec<u8> {
    let mut w = Writer::new();
    w.u16(manifest.format_version);
    write_payload_configuration(&mut w, &manifest.payload_config);
    w.u32(manifest.items.len() as u32);
    for item in &manifest.items {
        write_payload_item(&mut w, item);
    }
    w.opt(&manifest.metadata, |w, meta| {
        w.u32(meta.len() as u32);
        for (k, v) in meta {
            w.str(k);
            w.str(v);
        }
    });
    w.into_vec()
}

/// Decodes a [`Manifest`] from its plaintext wire form.
pub fn decode_manifest(buf: &[u8]) -> Result<Manifest> {
    let mut r = Reader::new(buf, Ctx::Manifest);
    let format_version = r.u16()?;
    let payload_config = read_payload_configuration(&mut r)?;
    let item_count = r.u32()? as usize;
    let mut items = Vec::with_capacity(item_count);
    for _ in 0..item_count {
        items.push(read_payload_item(&mut r)?);
    }
    let metadata = r.opt(|r| {
        let n = r.u32()? as usize;
        let mut map = BTreeMap::new();
        for _ in 0..n {
            let k = r.str()?;
            let v = r.str()?;
            map.insert(k, v);
        }
        Ok(map)
    })?;
    r.finish()?;
    Ok(Manifest { format_version, payload_config, items, metadata })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{ItemCipherConfigKind, ManifestKeyScheme};
    use crate::registry::{BlockCipherAlgorithm, BlockCipherMode, MacAlgorithm};

    fn sample_header() -> PackageHeader {
        PackageHeader {
            version: 1,
            scheme: ManifestKeyScheme::SymmetricDirect,
            manifest_cipher: ManifestCipherConfig {
                cipher: ItemCipherConfigKind::Aead {
                    algorithm: BlockCipherAlgorithm::Aes,
                    mode: BlockCipherMode::Gcm,
                },
                kdf_algorithm: KdfAlgorithm::Scrypt,
                kdf_params: KdfParams::Scrypt { log_n: 15, r: 8, p: 1 },
                salt: vec![0x01; 16],
            },
            manifest_nonce: vec![0x02; 12],
            manifest_mac: ManifestMacConfig { algorithm: MacAlgorithm::HmacSha256 },
            manifest_mac_nonce: None,
            ephemeral_public: None,
            ephemeral_curve: None,
            key_confirmation: Some(vec![0xAB; 32]),
            payload_config: PayloadConfiguration {
                scheme: LayoutScheme::Frameshift,
                entropy: EntropyScheme::StreamCipherCsprng {
                    algorithm: StreamCipherAlgorithm::Salsa20,
                    key: Protected::from(vec![0x03u8; 32]),
                    nonce: vec![0x04u8; 8],
                },
                frameshift: Some(FrameshiftParams { min_padding: 8, max_padding: 512 }),
                fabric: None,
            },
            trailer_present: true,
        }
    }

    #[test]
    fn header_roundtrip() {
        let header = sample_header();
        let bytes = encode_header(&header);
        let back = decode_header(&bytes).unwrap();
        assert_eq!(back.version, header.version);
        assert_eq!(back.trailer_present, header.trailer_present);
        assert_eq!(back.key_confirmation, header.key_confirmation);
    }

    #[test]
    fn header_truncated_fails() {
        let bytes = encode_header(&sample_header());
        assert!(decode_header(&bytes[..bytes.len() - 1]).is_err());
    }

    fn sample_manifest() -> Manifest {
        Manifest {
            format_version: 1,
            payload_config: PayloadConfiguration {
                scheme: LayoutScheme::Simple,
                entropy: EntropyScheme::Preallocation { data: vec![0x00u8; 64] },
                frameshift: None,
                fabric: None,
            },
            items: vec![PayloadItem {
                id: ItemId(0x0102030405060708090a0b0c0d0e0f10),
                path: "docs/readme.txt".into(),
                declared_len: 42,
                cipher: ItemCipherConfig::Stream {
                    algorithm: StreamCipherAlgorithm::ChaCha20,
                    key: Protected::from(vec![0x05u8; 32]),
                    nonce: vec![0x06u8; 12],
                },
                mac: ItemMacConfig {
                    algorithm: MacAlgorithm::Poly1305,
                    key: Protected::from(vec![0x07u8; 32]),
                    nonce: None,
                    tag: Some(vec![0x08u8; 16]),
                },
                item_type: ItemType::File,
                kdf: None,
            }],
            metadata: Some(BTreeMap::from([("created-by".to_string(), "test".to_string())])),
        }
    }

    #[test]
    fn manifest_roundtrip() {
        let manifest = sample_manifest();
        let bytes = encode_manifest(&manifest);
        let back = decode_manifest(&bytes).unwrap();
        assert_eq!(back.format_version, manifest.format_version);
        assert_eq!(back.items.len(), 1);
        assert_eq!(back.items[0].id, manifest.items[0].id);
        assert_eq!(back.items[0].path, manifest.items[0].path);
        assert_eq!(back.metadata, manifest.metadata);
    }

    #[test]
    fn manifest_item_id_round_trips_full_128_bits() {
        let id = ItemId(u128::MAX);
        let manifest = Manifest {
            format_version: 1,
            payload_config: PayloadConfiguration {
                scheme: LayoutScheme::Simple,
                entropy: EntropyScheme::Preallocation { data: vec![] },
                frameshift: None,
                fabric: None,
            },
            items: vec![PayloadItem {
                id,
                path: "x".into(),
                declared_len: 0,
                cipher: ItemCipherConfig::Stream {
                    algorithm: StreamCipherAlgorithm::Salsa20,
                    key: Protected::from(vec![0u8; 32]),
                    nonce: vec![0u8; 8],
                },
                mac: ItemMacConfig {
                    algorithm: MacAlgorithm::HmacSha256,
                    key: Protected::from(vec![0u8; 32]),
                    nonce: None,
                    tag: None,
                },
                item_type: ItemType::Message,
                kdf: None,
            }],
            metadata: None,
        };
        let back = decode_manifest(&encode_manifest(&manifest)).unwrap();
        assert_eq!(back.items[0].id, id);
    }
}
