// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of decimal places floats are normalized to before hashing.
pub const FINGERPRINT_DECIMALS: i32 = 9;

/// Normalizes a float to the bit pattern of its value rounded to
/// `FINGERPRINT_DECIMALS` places.
///
/// Values that differ by less than `10^-FINGERPRINT_DECIMALS` encode to the
/// same bits and `-0.0` folds onto `0.0`, which encodes as `0`. The rounded
/// value stays a float, so magnitudes of any size keep distinct encodings.
#[inline]
pub fn normalize_f64(value: f64) -> u64 {
    let scaled = (value * 10f64.powi(FINGERPRINT_DECIMALS)).round();
    if scaled == 0.0 { 0 } else { scaled.to_bits() }
}

/// A 256-bit content hash identifying a derived artifact.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    #[inline]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// First eight hex digits, for log lines.
    pub fn short(&self) -> String {
        self.0[..4].iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Streams a canonical, type-tagged byte encoding into a blake3 hasher.
///
/// Callers are responsible for feeding content in canonical order (ids
/// ascending); the encoder takes care of numeric normalization and of
/// framing, so that `("ab", "c")` and `("a", "bc")` never collide.
#[derive(Debug, Clone)]
pub struct CanonicalEncoder {
    hasher: blake3::Hasher,
}

impl CanonicalEncoder {
    const TAG_DOMAIN: u8 = 0x01;
    const TAG_U64: u8 = 0x02;
    const TAG_F64: u8 = 0x03;
    const TAG_STR: u8 = 0x04;
    const TAG_SEQ: u8 = 0x05;
    const TAG_FP: u8 = 0x06;

    #[inline]
    pub fn new(domain: &str) -> Self {
        let mut enc = Self {
            hasher: blake3::Hasher::new(),
        };
        enc.hasher.update(&[Self::TAG_DOMAIN]);
        enc.write_len(domain.len());
        enc.hasher.update(domain.as_bytes());
        enc
    }

    #[inline]
    fn write_len(&mut self, len: usize) {
        self.hasher.update(&(len as u64).to_le_bytes());
    }

    #[inline]
    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.hasher.update(&[Self::TAG_U64]);
        self.hasher.update(&value.to_le_bytes());
        self
    }

    #[inline]
    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.u64(value as u64)
    }

    #[inline]
    pub fn f64(&mut self, value: f64) -> &mut Self {
        self.hasher.update(&[Self::TAG_F64]);
        self.hasher.update(&normalize_f64(value).to_le_bytes());
        self
    }

    #[inline]
    pub fn str(&mut self, value: &str) -> &mut Self {
        self.hasher.update(&[Self::TAG_STR]);
        self.write_len(value.len());
        self.hasher.update(value.as_bytes());
        self
    }

    /// Marks the start of a sequence of `len` items.
    #[inline]
    pub fn seq(&mut self, len: usize) -> &mut Self {
        self.hasher.update(&[Self::TAG_SEQ]);
        self.write_len(len);
        self
    }

    /// Chains an upstream fingerprint into this one.
    #[inline]
    pub fn fingerprint(&mut self, fp: &Fingerprint) -> &mut Self {
        self.hasher.update(&[Self::TAG_FP]);
        self.hasher.update(fp.as_bytes());
        self
    }

    #[inline]
    pub fn finish(&self) -> Fingerprint {
        Fingerprint(*self.hasher.finalize().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_negative_zero_and_tiny_noise() {
        assert_eq!(normalize_f64(-0.0), 0);
        assert_eq!(normalize_f64(0.1 + 0.2), normalize_f64(0.3));
        assert_ne!(normalize_f64(0.3), normalize_f64(0.300001));
    }

    #[test]
    fn large_values_keep_distinct_encodings() {
        assert_ne!(normalize_f64(1e10), normalize_f64(5e10));
        assert_ne!(normalize_f64(9e12), normalize_f64(9e12 + 1.0));
        assert_ne!(normalize_f64(-1e15), normalize_f64(1e15));
        assert_eq!(normalize_f64(2.5e11), normalize_f64(2.5e11));

        let mut a = CanonicalEncoder::new("cost");
        a.f64(1e10);
        let mut b = CanonicalEncoder::new("cost");
        b.f64(9e12);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn same_content_same_fingerprint() {
        let mut a = CanonicalEncoder::new("test");
        a.u32(1).f64(2.5).str("x");
        let mut b = CanonicalEncoder::new("test");
        b.u32(1).f64(2.5).str("x");
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn domain_separates_fingerprints() {
        let mut a = CanonicalEncoder::new("boundary");
        a.u32(1);
        let mut b = CanonicalEncoder::new("incidence");
        b.u32(1);
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn string_framing_prevents_collisions() {
        let mut a = CanonicalEncoder::new("t");
        a.str("ab").str("c");
        let mut b = CanonicalEncoder::new("t");
        b.str("a").str("bc");
        assert_ne!(a.finish(), b.finish());
    }

    #[test]
    fn hex_rendering() {
        let fp = Fingerprint::from_bytes([0xab; 32]);
        assert_eq!(fp.to_hex().len(), 64);
        assert_eq!(fp.short(), "abababab");
        assert_eq!(format!("{:?}", fp), "Fingerprint(abababab)");
    }
}
