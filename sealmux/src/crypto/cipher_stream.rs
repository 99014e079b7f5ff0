//! The cipher stream wrapper (spec.md Section 4.2).
//!
//! A uniform streaming transformer over any block-mode-with-padding or
//! stream cipher: `process_bytes` consumes input and emits as much output
//! as is available without look-ahead, `finalize` emits whatever remains
//! (the padded/unpadded tail for block modes, the detached tag handling for
//! AEAD). This is the "stride" primitive the multiplexer drives one chunk
//! at a time.

use crate::crypto::backend::{AeadCipher, Backend, BlockPrimitive, KeystreamCipher};
use crate::crypto::padding;
use crate::error::{Error, Result};
use crate::manifest::ItemCipherConfig;
use crate::registry::{self, BlockCipherMode, PaddingScheme};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Encrypt,
    Decrypt,
}

/// A uniform streaming cipher transform.
pub struct CipherStream {
    kind: Kind,
    direction: Direction,
    finalized: bool,
}

enum Kind {
    Stream(Box<dyn KeystreamCipher>),
    Block(BlockModeState),
    Aead(AeadState),
}

/// State for CBC, the one block mode this crate implements by hand
/// against the raw block primitive (it needs padding, and padding needs
/// to see the whole span before it can identify the final block). CTR,
/// CFB, and OFB are keystream ciphers in disguise and go through
/// `Kind::Stream` instead, backed directly by the `ctr`/`cfb-mode`/`ofb`
/// crates.
struct BlockModeState {
    primitive: Box<dyn BlockPrimitive>,
    padding: Option<PaddingScheme>,
    block_size: usize,
    register: Vec<u8>,
    /// Buffered input for CBC, which must see the whole span before it can
    /// identify (and correctly pad/unpad) the final block.
    cbc_buffer: Vec<u8>,
}

struct AeadState {
    aead: Box<dyn AeadCipher>,
    nonce: Vec<u8>,
    buffer: Vec<u8>,
    /// The detached tag: supplied by the caller before `finalize` on
    /// decrypt, produced by `finalize` on encrypt.
    tag: Option<Vec<u8>>,
}

impl CipherStream {
    /// Constructs a new wrapper. `encrypting` selects the direction;
    /// `config` carries the algorithm, mode, padding, key, and nonce,
    /// already validated against the registry by the manifest/item
    /// builder that produced it.
    pub fn new(
        encrypting: bool,
        config: &ItemCipherConfig,
        backend: &dyn Backend,
    ) -> Result<Self> {
        let direction = if encrypting { Direction::Encrypt } else { Direction::Decrypt };
        let kind = match config {
            ItemCipherConfig::Stream { algorithm, key, nonce } => {
                let desc = registry::stream_cipher_descriptor(*algorithm);
                registry::validate_key_size(desc.allowable_key_sizes_bits, key.len())?;
                registry::validate_nonce_size(desc.allowable_nonce_sizes_bits, nonce.len())?;
                Kind::Stream(backend.new_keystream_cipher(*algorithm, key, nonce)?)
            }
            ItemCipherConfig::Aead { algorithm, mode, key, nonce } => {
                registry::validate_block_mode(*algorithm, *mode, None)?;
                let aead = backend.new_aead(*algorithm, *mode, key)?;
                Kind::Aead(AeadState {
                    aead,
                    nonce: nonce.clone(),
                    buffer: Vec::new(),
                    tag: None,
                })
            }
            ItemCipherConfig::Block { algorithm, mode: BlockCipherMode::Cbc, padding, key, nonce } => {
                registry::validate_block_mode(*algorithm, BlockCipherMode::Cbc, *padding)?;
                let primitive = backend.new_block_primitive(*algorithm, key)?;
                let block_size = primitive.block_size();
                if nonce.len() != block_size {
                    return Err(Error::NonceSizeMismatch {
                        got: nonce.len() * 8,
                        expected: format!("{}", block_size * 8),
                    });
                }
                Kind::Block(BlockModeState {
                    primitive,
                    padding: *padding,
                    block_size,
                    register: nonce.clone(),
                    cbc_buffer: Vec::new(),
                })
            }
            ItemCipherConfig::Block { algorithm, mode, padding, key, nonce } => {
                registry::validate_block_mode(*algorithm, *mode, *padding)?;
                let expected_block_size = registry::block_cipher_descriptor(*algorithm).block_size_bits / 8;
                if nonce.len() != expected_block_size {
                    return Err(Error::NonceSizeMismatch {
                        got: nonce.len() * 8,
                        expected: format!("{}", expected_block_size * 8),
                    });
                }
                Kind::Stream(backend.new_block_mode_keystream(*algorithm, *mode, key, nonce, encrypting)?)
            }
        };
        Ok(CipherStream { kind, direction, finalized: false })
    }

    /// Streams `input` through the cipher, returning the output produced so
    /// far (may be shorter than `input`, or empty, depending on the mode's
    /// internal buffering).
    pub fn process_bytes(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        if self.finalized {
            return Err(Error::InvalidConfiguration {
                what: "process_bytes called after finalize".into(),
                allowed: "calls only before finalize".into(),
            });
        }
        match &mut self.kind {
            Kind::Stream(cipher) => {
                let mut buf = input.to_vec();
                cipher.apply_keystream(&mut buf);
                Ok(buf)
            }
            Kind::Block(state) => {
                state.cbc_buffer.extend_from_slice(input);
                Ok(Vec::new())
            }
            Kind::Aead(state) => {
                state.buffer.extend_from_slice(input);
                Ok(Vec::new())
            }
        }
    }

    /// Supplies the detached AEAD tag to verify against, for decrypt-side
    /// AEAD streams. Must be called before `finalize`.
    pub fn set_expected_tag(&mut self, tag: Vec<u8>) -> Result<()> {
        match &mut self.kind {
            Kind::Aead(state) => {
                state.tag = Some(tag);
                Ok(())
            }
            _ => Err(Error::InvalidConfiguration {
                what: "set_expected_tag is only meaningful for AEAD streams".into(),
                allowed: "AEAD cipher configuration".into(),
            }),
        }
    }

    /// Finalizes the stream, returning any remaining output. For encrypting
    /// AEAD streams, also returns the detached tag via `finalize_aead_tag`.
    pub fn finalize(&mut self) -> Result<Vec<u8>> {
        if self.finalized {
            return Err(Error::InvalidConfiguration {
                what: "finalize called twice".into(),
                allowed: "a single finalize call".into(),
            });
        }
        self.finalized = true;
        match &mut self.kind {
            Kind::Stream(_) => Ok(Vec::new()),
            Kind::Block(state) => finalize_cbc(state, self.direction),
            Kind::Aead(_) => Err(Error::InvalidConfiguration {
                what: "AEAD streams must be finalized via finalize_aead".into(),
                allowed: "call finalize_aead instead".into(),
            }),
        }
    }

    /// Finalizes an AEAD stream. On encrypt, returns `(ciphertext, tag)`.
    /// On decrypt, `set_expected_tag` must have been called first; returns
    /// `(plaintext, ())`, failing with `MacMismatch` if the tag is wrong
    /// (reusing that scope since AEAD folds encryption and authentication
    /// into one step).
    pub fn finalize_aead(&mut self, item: crate::manifest::ItemId) -> Result<(Vec<u8>, Option<Vec<u8>>)> {
        if self.finalized {
            return Err(Error::InvalidConfiguration {
                what: "finalize called twice".into(),
                allowed: "a single finalize call".into(),
            });
        }
        self.finalized = true;
        let state = match &mut self.kind {
            Kind::Aead(state) => state,
            _ => {
                return Err(Error::InvalidConfiguration {
                    what: "finalize_aead is only meaningful for AEAD streams".into(),
                    allowed: "AEAD cipher configuration".into(),
                })
            }
        };
        match self.direction {
            Direction::Encrypt => {
                let (ciphertext, tag) = state.aead.encrypt(&state.nonce, &state.buffer)?;
                Ok((ciphertext, Some(tag)))
            }
            Direction::Decrypt => {
                let tag = state.tag.clone().ok_or_else(|| Error::InvalidConfiguration {
                    what: "AEAD decrypt finalized without an expected tag".into(),
                    allowed: "call set_expected_tag first".into(),
                })?;
                let plaintext = state
                    .aead
                    .decrypt(&state.nonce, &state.buffer, &tag)
                    .map_err(|_| Error::MacMismatch { scope: crate::error::MacScope::Item(item) })?;
                Ok((plaintext, None))
            }
        }
    }
}

fn finalize_cbc(state: &mut BlockModeState, direction: Direction) -> Result<Vec<u8>> {
    let block_size = state.block_size;
    match direction {
        Direction::Encrypt => {
            let mut buffer = std::mem::take(&mut state.cbc_buffer);
            let padding_scheme = state.padding.ok_or(Error::ModePaddingIncompatible(
                "CBC encryption requires a padding scheme".into(),
            ))?;
            padding::pad(padding_scheme, block_size, &mut buffer, &mut |_| Ok(()))?;
            let mut out = Vec::with_capacity(buffer.len());
            let mut prev = state.register.clone();
            for chunk in buffer.chunks(block_size) {
                let mut block = chunk.to_vec();
                xor_in_place(&mut block, &prev);
                state.primitive.encrypt_block(&mut block);
                prev = block.clone();
                out.extend_from_slice(&block);
            }
            state.register = prev;
            Ok(out)
        }
        Direction::Decrypt => {
            let buffer = std::mem::take(&mut state.cbc_buffer);
            if buffer.is_empty() || buffer.len() % block_size != 0 {
                return Err(Error::TruncatedPayload);
            }
            let mut out = Vec::with_capacity(buffer.len());
            let mut prev = state.register.clone();
            for chunk in buffer.chunks(block_size) {
                let mut block = chunk.to_vec();
                let ciphertext_block = block.clone();
                state.primitive.decrypt_block(&mut block);
                xor_in_place(&mut block, &prev);
                prev = ciphertext_block;
                out.extend_from_slice(&block);
            }
            state.register = prev;
            let padding_scheme = state.padding.ok_or(Error::ModePaddingIncompatible(
                "CBC decryption requires a padding scheme".into(),
            ))?;
            padding::unpad(padding_scheme, block_size, &mut out)?;
            Ok(out)
        }
    }
}

fn xor_in_place(a: &mut [u8], b: &[u8]) {
    for (x, y) in a.iter_mut().zip(b.iter()) {
        *x ^= y;
    }
}
