//! Block-cipher padding schemes (spec.md Section 4.2).
//!
//! Each scheme is a pluggable policy object keyed by [`crate::registry::PaddingScheme`].
//! `pad` always emits a full block's worth of padding (1..=block_size bytes,
//! chosen so the total length becomes a multiple of `block_size`); `unpad`
//! validates and strips it, failing closed with [`Error::InvalidPadding`] on
//! any malformed trailer rather than guessing.

use crate::error::{Error, Result};
use crate::registry::PaddingScheme;

/// Computes how many padding bytes `pad` will emit for a final chunk of
/// `tail_len` bytes (always in `1..=block_size`).
pub fn pad_len(block_size: usize, tail_len: usize) -> usize {
    block_size - (tail_len % block_size)
}

/// Appends padding to `buf` so that its length becomes a multiple of
/// `block_size`. `random` supplies filler bytes for ISO 10126-2.
pub fn pad(
    scheme: PaddingScheme,
    block_size: usize,
    buf: &mut Vec<u8>,
    random: &mut dyn FnMut(&mut [u8]) -> Result<()>,
) -> Result<()> {
    let n = pad_len(block_size, buf.len());
    match scheme {
        PaddingScheme::Pkcs7 => {
            buf.resize(buf.len() + n, n as u8);
        }
        PaddingScheme::AnsiX923 => {
            buf.resize(buf.len() + n - 1, 0);
            buf.push(n as u8);
        }
        PaddingScheme::Iso7816 => {
            buf.push(0x80);
            buf.resize(buf.len() + n - 1, 0);
        }
        PaddingScheme::Iso10126 => {
            let start = buf.len();
            buf.resize(start + n - 1, 0);
            random(&mut buf[start..])?;
            buf.push(n as u8);
        }
        PaddingScheme::Tbc => {
            let complement = buf.last().map(|&b| !(b & 1) & 1).unwrap_or(1);
            let fill = if complement == 1 { 0xFF } else { 0x00 };
            buf.resize(buf.len() + n, fill);
        }
    }
    Ok(())
}

/// Validates and strips padding from the final block(s) of `buf`, failing
/// closed on any malformed trailer.
pub fn unpad(scheme: PaddingScheme, block_size: usize, buf: &mut Vec<u8>) -> Result<()> {
    if buf.is_empty() || buf.len() % block_size != 0 {
        return Err(Error::InvalidPadding);
    }
    let new_len = match scheme {
        PaddingScheme::Pkcs7 => {
            let n = *buf.last().ok_or(Error::InvalidPadding)? as usize;
            if n == 0 || n > block_size || n > buf.len() {
                return Err(Error::InvalidPadding);
            }
            if !buf[buf.len() - n..].iter().all(|&b| b as usize == n) {
                return Err(Error::InvalidPadding);
            }
            buf.len() - n
        }
        PaddingScheme::AnsiX923 => {
            let n = *buf.last().ok_or(Error::InvalidPadding)? as usize;
            if n == 0 || n > block_size || n > buf.len() {
                return Err(Error::InvalidPadding);
            }
            if !buf[buf.len() - n..buf.len() - 1].iter().all(|&b| b == 0) {
                return Err(Error::InvalidPadding);
            }
            buf.len() - n
        }
        PaddingScheme::Iso7816 => {
            let tail_start = buf.len().saturating_sub(block_size);
            let marker = buf[tail_start..]
                .iter()
                .rposition(|&b| b != 0)
                .map(|i| tail_start + i);
            match marker {
                Some(i) if buf[i] == 0x80 => i,
                _ => return Err(Error::InvalidPadding),
            }
        }
        PaddingScheme::Iso10126 => {
            let n = *buf.last().ok_or(Error::InvalidPadding)? as usize;
            if n == 0 || n > block_size || n > buf.len() {
                return Err(Error::InvalidPadding);
            }
            buf.len() - n
        }
        PaddingScheme::Tbc => {
            let last = *buf.last().ok_or(Error::InvalidPadding)?;
            let fill = last;
            if fill != 0x00 && fill != 0xFF {
                return Err(Error::InvalidPadding);
            }
            let tail_start = buf.len().saturating_sub(block_size);
            let boundary = buf[tail_start..]
                .iter()
                .rposition(|&b| b != fill)
                .map(|i| tail_start + i + 1)
                .unwrap_or(tail_start);
            boundary
        }
    };
    buf.truncate(new_len);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(scheme: PaddingScheme, tail_len: usize) {
        let block_size = 16;
        let mut buf = vec![0x42u8; tail_len];
        let original_len = buf.len();
        pad(scheme, block_size, &mut buf, &mut |b| {
            for x in b.iter_mut() {
                *x = 0x24;
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(buf.len() % block_size, 0);
        unpad(scheme, block_size, &mut buf).unwrap();
        assert_eq!(buf.len(), original_len);
        assert!(buf.iter().all(|&b| b == 0x42));
    }

    #[test]
    fn pkcs7_roundtrip() {
        roundtrip(PaddingScheme::Pkcs7, 0);
        roundtrip(PaddingScheme::Pkcs7, 5);
        roundtrip(PaddingScheme::Pkcs7, 16);
    }

    #[test]
    fn ansi_x923_roundtrip() {
        roundtrip(PaddingScheme::AnsiX923, 7);
    }

    #[test]
    fn iso7816_roundtrip() {
        roundtrip(PaddingScheme::Iso7816, 3);
        roundtrip(PaddingScheme::Iso7816, 16);
    }

    #[test]
    fn iso10126_roundtrip() {
        roundtrip(PaddingScheme::Iso10126, 9);
    }

    #[test]
    fn tbc_roundtrip() {
        roundtrip(PaddingScheme::Tbc, 4);
    }

    #[test]
    fn pkcs7_rejects_bad_padding() {
        let mut buf = vec![0u8; 16];
        buf[15] = 0;
        assert!(unpad(PaddingScheme::Pkcs7, 16, &mut buf).is_err());
        buf[15] = 17;
        assert!(unpad(PaddingScheme::Pkcs7, 16, &mut buf).is_err());
    }
}
