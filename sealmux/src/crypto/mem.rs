//! Protected memory helpers.
//!
//! Every key buffer, every intermediate plaintext buffer, and every
//! derived manifest key is wrapped in [`Protected`] so that it is
//! overwritten on drop (spec.md Section 9, "Zeroization").

use zeroize::Zeroizing;

/// A byte buffer that is zeroized when it goes out of scope.
///
/// This is used for manifest keys, per-item keys, KDF outputs, and UM1
/// shared secrets. It derefs to `[u8]` for convenience but deliberately
/// does not implement `Debug` with its contents visible.
#[derive(Clone)]
pub struct Protected(Zeroizing<Vec<u8>>);

impl Protected {
    /// Wraps `v`, taking ownership so it is zeroized on drop.
    pub fn new(v: Vec<u8>) -> Self {
        Protected(Zeroizing::new(v))
    }
}

impl From<Vec<u8>> for Protected {
    fn from(v: Vec<u8>) -> Self {
        Protected::new(v)
    }
}

impl From<&[u8]> for Protected {
    fn from(v: &[u8]) -> Self {
        Protected::new(v.to_vec())
    }
}

impl std::ops::Deref for Protected {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Protected {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Protected({} bytes, redacted)", self.0.len())
    }
}

/// Compares two byte slices in constant time.
///
/// Used for MAC tag verification and key-confirmation token comparison;
/// spec.md Section 9 mandates that error *timing* not depend on which
/// byte differs, even though it does not mandate constant-time
/// primitives.
pub fn secure_cmp(a: &[u8], b: &[u8]) -> bool {
    use subtle::ConstantTimeEq;
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_cmp_basics() {
        assert!(secure_cmp(b"abc", b"abc"));
        assert!(!secure_cmp(b"abc", b"abd"));
        assert!(!secure_cmp(b"abc", b"ab"));
    }
}
