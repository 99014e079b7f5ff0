//! The CS-PRNG (spec.md Section 4.4).
//!
//! A deterministic byte generator over `(stream_cipher, key, nonce)`. The
//! writer and reader each construct one from the same seed material
//! (carried in [`crate::manifest::EntropyScheme`]) and must therefore make
//! identical ordering and length decisions — this is what lets a Frameshift
//! or Fabric package round-trip at all.
//!
//! Per the open question in spec.md Section 9, this implementation keeps a
//! *single* stream for every draw a layout makes (ordering, padding/stripe
//! lengths, and padding byte fill) rather than splitting padding content
//! onto a second stream; see DESIGN.md.

use crate::crypto::backend::{Backend, KeystreamCipher};
use crate::error::{Error, Result};
use crate::registry::StreamCipherAlgorithm;

/// A deterministic pseudorandom byte/value source built from a keyed
/// stream cipher.
pub struct CsPrng {
    cipher: Box<dyn KeystreamCipher>,
}

impl CsPrng {
    /// Constructs a CS-PRNG from a stream cipher, key, and nonce.
    pub fn new(
        backend: &dyn Backend,
        algorithm: StreamCipherAlgorithm,
        key: &[u8],
        nonce: &[u8],
    ) -> Result<Self> {
        let cipher = backend.new_keystream_cipher(algorithm, key, nonce)?;
        Ok(CsPrng { cipher })
    }

    /// Fills `buf` with the next `buf.len()` pseudorandom bytes.
    pub fn next_bytes(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            *b = 0;
        }
        self.cipher.apply_keystream(buf);
    }

    /// Draws the next 4 bytes as a big-endian `u32`.
    pub fn next_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.next_bytes(&mut buf);
        u32::from_be_bytes(buf)
    }

    /// Draws the next 4 bytes reinterpreted as a signed integer.
    pub fn next_i32(&mut self) -> i32 {
        self.next_u32() as i32
    }

    /// Draws a uniformly distributed value in `0..max_exclusive` by
    /// rejection sampling against the nearest power-of-two upper bound, so
    /// every implementation produces the same sequence for the same seed.
    pub fn next_bounded(&mut self, max_exclusive: i32) -> Result<i32> {
        if max_exclusive <= 0 {
            return Err(Error::InvalidConfiguration {
                what: "next_bounded requires a positive exclusive bound".into(),
                allowed: "max_exclusive > 0".into(),
            });
        }
        let bound = max_exclusive as u64;
        if bound & bound.wrapping_sub(1) == 0 {
            let r = (self.next_u32() >> 1) as u64;
            return Ok(((bound * r) >> 31) as i32);
        }
        loop {
            let bits = (self.next_u32() >> 1) as u64;
            let val = bits % bound;
            if bits - val + (bound - 1) <= i32::MAX as u64 {
                return Ok(val as i32);
            }
        }
    }

    /// Draws a uniformly distributed value in `min_inclusive..max_exclusive`.
    /// Falls back to full-range rejection sampling if the interval is empty
    /// or would overflow `i32` arithmetic.
    pub fn next_in_range(&mut self, min_inclusive: i32, max_exclusive: i32) -> Result<i32> {
        let width = max_exclusive as i64 - min_inclusive as i64;
        if width > 0 && width <= i32::MAX as i64 {
            let r = self.next_bounded(width as i32)?;
            Ok(min_inclusive.wrapping_add(r))
        } else {
            Ok(self.next_i32())
        }
    }
}

/// Either alternative entropy source named in spec.md Section 4.4: a
/// `CsPrng` driven by a stream cipher, or a fixed pre-generated blob that
/// writer and reader consume in lockstep.
pub enum EntropySource {
    /// A stream-cipher-backed CS-PRNG.
    Prng(CsPrng),
    /// A pre-generated byte blob, consumed front-to-back.
    Preallocation {
        /// The blob.
        data: Vec<u8>,
        /// The next unconsumed offset.
        pos: usize,
    },
}

impl EntropySource {
    /// Fills `buf`, failing with `InsufficientEntropy` if a `Preallocation`
    /// source runs out.
    pub fn next_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        match self {
            EntropySource::Prng(p) => {
                p.next_bytes(buf);
                Ok(())
            }
            EntropySource::Preallocation { data, pos } => {
                if *pos + buf.len() > data.len() {
                    return Err(Error::InsufficientEntropy);
                }
                buf.copy_from_slice(&data[*pos..*pos + buf.len()]);
                *pos += buf.len();
                Ok(())
            }
        }
    }

    /// Draws the next 4 bytes as a big-endian `u32`.
    pub fn next_u32(&mut self) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.next_bytes(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// Draws a uniformly distributed value in `0..max_exclusive`.
    pub fn next_bounded(&mut self, max_exclusive: i32) -> Result<i32> {
        match self {
            EntropySource::Prng(p) => p.next_bounded(max_exclusive),
            EntropySource::Preallocation { .. } => {
                if max_exclusive <= 0 {
                    return Err(Error::InvalidConfiguration {
                        what: "next_bounded requires a positive exclusive bound".into(),
                        allowed: "max_exclusive > 0".into(),
                    });
                }
                let bound = max_exclusive as u64;
                if bound & bound.wrapping_sub(1) == 0 {
                    let r = (self.next_u32()? >> 1) as u64;
                    return Ok(((bound * r) >> 31) as i32);
                }
                loop {
                    let bits = (self.next_u32()? >> 1) as u64;
                    let val = bits % bound;
                    if bits - val + (bound - 1) <= i32::MAX as u64 {
                        return Ok(val as i32);
                    }
                }
            }
        }
    }

    /// Draws a uniformly distributed value in `min_inclusive..max_exclusive`.
    pub fn next_in_range(&mut self, min_inclusive: i32, max_exclusive: i32) -> Result<i32> {
        let width = max_exclusive as i64 - min_inclusive as i64;
        if width > 0 && width <= i32::MAX as i64 {
            let r = self.next_bounded(width as i32)?;
            Ok(min_inclusive.wrapping_add(r))
        } else {
            Ok(self.next_u32()? as i32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::backend::rustcrypto::RustCryptoBackend;

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn determinism_across_two_instances() {
        let backend = RustCryptoBackend;
        let key = vec![0x11u8; 32];
        let nonce = vec![0x22u8; 8];
        let mut a = CsPrng::new(&backend, StreamCipherAlgorithm::Salsa20, &key, &nonce).unwrap();
        let mut b = CsPrng::new(&backend, StreamCipherAlgorithm::Salsa20, &key, &nonce).unwrap();
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
        for _ in 0..100 {
            assert_eq!(a.next_bounded(997).unwrap(), b.next_bounded(997).unwrap());
        }
    }

    #[test]
    fn bounded_is_in_range() {
        let backend = RustCryptoBackend;
        let key = vec![0x33u8; 32];
        let nonce = vec![0x44u8; 8];
        let mut p = CsPrng::new(&backend, StreamCipherAlgorithm::Salsa20, &key, &nonce).unwrap();
        for _ in 0..1000 {
            let v = p.next_bounded(13).unwrap();
            assert!((0..13).contains(&v));
        }
    }

    #[test]
    fn salsa20_ecrypt_vector_via_csprng() {
        let backend = RustCryptoBackend;
        let key = hex("0053A6F94C9FF24598EB3E91E4378ADD3083D6297CCF2275C81B6EC11467BA0");
        let nonce = hex("0D74DB42A91077DE");
        let mut p = CsPrng::new(&backend, StreamCipherAlgorithm::Salsa20, &key, &nonce).unwrap();
        let mut buf = vec![0u8; 64];
        p.next_bytes(&mut buf);
        let expected = hex(
            "F5FAD53F79F9DF58C4AEA0D0ED9A9601F278112CA7180D565B420A48019670E\
             AF24CE493A86263F677B46ACE1924773D2BB25571E1AA8593758FC382B1280B7",
        );
        assert_eq!(buf, expected);
    }

    #[test]
    fn preallocation_exhaustion() {
        let mut src = EntropySource::Preallocation { data: vec![0xAA; 4], pos: 0 };
        let mut buf = [0u8; 4];
        src.next_bytes(&mut buf).unwrap();
        assert!(src.next_bytes(&mut [0u8; 1]).is_err());
    }

    #[test]
    fn preallocation_matches_prng_shape() {
        let mut src = EntropySource::Preallocation { data: vec![0xAA; 4096], pos: 0 };
        for _ in 0..100 {
            let v = src.next_bounded(17).unwrap();
            assert!((0..17).contains(&v));
        }
    }
}
