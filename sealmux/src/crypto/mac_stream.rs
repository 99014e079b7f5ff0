//! MAC and hash streams (spec.md Section 4.3).
//!
//! Pass-through streams: every byte absorbed into the running MAC/hash is
//! also handed back to the caller unchanged, so these can be spliced into
//! an Encrypt-then-MAC chain (`plaintext -> cipher -> mac -> sink` on
//! write, `sink -> verify_mac -> decipher -> plaintext` on read) without
//! the chain needing to buffer anything beyond what the cipher stream
//! already buffers.

use crate::crypto::backend::{Backend, HashEngine, MacEngine};
use crate::error::{Error, Result};
use crate::registry::{HashAlgorithm, MacAlgorithm};

/// A pass-through MAC stream.
pub struct MacStream {
    engine: Option<Box<dyn MacEngine>>,
    finalized: bool,
}

impl MacStream {
    /// Constructs a keyed MAC stream.
    pub fn new(backend: &dyn Backend, algorithm: MacAlgorithm, key: &[u8]) -> Result<Self> {
        Ok(MacStream { engine: Some(backend.new_mac(algorithm, key)?), finalized: false })
    }

    /// Folds `data` into the running MAC. Returns `data` unchanged so the
    /// caller can chain this into a sink without copying twice.
    pub fn update<'a>(&mut self, data: &'a [u8]) -> Result<&'a [u8]> {
        if self.finalized {
            return Err(Error::InvalidConfiguration {
                what: "MAC stream written to after finalize".into(),
                allowed: "writes only before finalize".into(),
            });
        }
        self.engine.as_mut().expect("engine present until finalize").update(data);
        Ok(data)
    }

    /// Finalizes the MAC, returning the tag. Subsequent writes fail.
    pub fn finalize(&mut self) -> Result<Vec<u8>> {
        if self.finalized {
            return Err(Error::InvalidConfiguration {
                what: "finalize called twice".into(),
                allowed: "a single finalize call".into(),
            });
        }
        self.finalized = true;
        Ok(self.engine.take().expect("engine present until finalize").finalize())
    }
}

/// A pass-through hash stream (unkeyed).
pub struct HashStream {
    engine: Option<Box<dyn HashEngine>>,
    finalized: bool,
}

impl HashStream {
    /// Constructs an unkeyed hash stream.
    pub fn new(backend: &dyn Backend, algorithm: HashAlgorithm) -> Result<Self> {
        Ok(HashStream { engine: Some(backend.new_hash(algorithm)?), finalized: false })
    }

    /// Folds `data` into the running hash.
    pub fn update<'a>(&mut self, data: &'a [u8]) -> Result<&'a [u8]> {
        if self.finalized {
            return Err(Error::InvalidConfiguration {
                what: "hash stream written to after finalize".into(),
                allowed: "writes only before finalize".into(),
            });
        }
        self.engine.as_mut().expect("engine present until finalize").update(data);
        Ok(data)
    }

    /// Finalizes the hash, returning the digest.
    pub fn finalize(&mut self) -> Result<Vec<u8>> {
        if self.finalized {
            return Err(Error::InvalidConfiguration {
                what: "finalize called twice".into(),
                allowed: "a single finalize call".into(),
            });
        }
        self.finalized = true;
        Ok(self.engine.take().expect("engine present until finalize").finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::backend::rustcrypto::RustCryptoBackend;

    #[test]
    fn mac_stream_passes_bytes_through() {
        let backend = RustCryptoBackend;
        let key = vec![0u8; 32];
        let mut mac = MacStream::new(&backend, MacAlgorithm::HmacSha256, &key).unwrap();
        let echoed = mac.update(b"hello").unwrap();
        assert_eq!(echoed, b"hello");
        let tag = mac.finalize().unwrap();
        assert_eq!(tag.len(), 32);
    }

    #[test]
    fn mac_stream_rejects_writes_after_finalize() {
        let backend = RustCryptoBackend;
        let key = vec![0u8; 32];
        let mut mac = MacStream::new(&backend, MacAlgorithm::HmacSha256, &key).unwrap();
        mac.update(b"hello").unwrap();
        mac.finalize().unwrap();
        assert!(mac.update(b"more").is_err());
    }

    #[test]
    fn same_input_same_tag() {
        let backend = RustCryptoBackend;
        let key = vec![7u8; 32];
        let mut a = MacStream::new(&backend, MacAlgorithm::HmacSha256, &key).unwrap();
        a.update(b"deterministic").unwrap();
        let tag_a = a.finalize().unwrap();

        let mut b = MacStream::new(&backend, MacAlgorithm::HmacSha256, &key).unwrap();
        b.update(b"deterministic").unwrap();
        let tag_b = b.finalize().unwrap();
        assert_eq!(tag_a, tag_b);
    }

    #[test]
    fn hash_stream_basics() {
        let backend = RustCryptoBackend;
        let mut h = HashStream::new(&backend, HashAlgorithm::Sha256).unwrap();
        h.update(b"abc").unwrap();
        let digest = h.finalize().unwrap();
        assert_eq!(digest.len(), 32);
    }
}
