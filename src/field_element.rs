//! POLYVAL field element arithmetic.
//!
//! This module implements constant-time multiplication in the binary field
//! GF(2^128) defined by the irreducible polynomial
//! `x^128 + x^127 + x^126 + x^121 + 1` described in [RFC 8452 §3].
//!
//! The portable carry-less multiplier uses the masked integer multiplication
//! technique described at <https://www.bearssl.org/constanttime.html>, with
//! the 64-bit "holes" layout from
//! <https://timtaubert.de/blog/2017/06/verified-binary-multiplication-for-ghash/>.
//!
//! The 256-bit Karatsuba product is folded with the shift-XOR reflected
//! reduction from Shay Gueron's GCM-SIV slides
//! (<https://crypto.stanford.edu/RealWorldCrypto/slides/gueron.pdf>, pages
//! 17-19). It is straight-line scalar code, which makes it the right choice
//! when no carry-less multiply instruction is available.
//!
//! [RFC 8452 §3]: https://tools.ietf.org/html/rfc8452#section-3

use core::{
    fmt::{self, Debug},
    ops::{Add, Mul},
};

use crate::BLOCK_SIZE;

#[cfg(feature = "zeroize")]
use zeroize::Zeroize;

/// An element in POLYVAL's field, stored as two little-endian 64-bit limbs.
///
/// This type represents an element of the binary field GF(2^128) modulo the
/// irreducible polynomial `x^128 + x^127 + x^126 + x^121 + 1` as described
/// in [RFC 8452 §3]:
///
/// - All arithmetic operations are performed modulo the polynomial above.
/// - Addition is equivalent to the XOR operation applied to the two field
///   elements.
/// - Multiplication is carryless.
///
/// The bit at byte offset `i`, bit `j` (least significant first) of the
/// little-endian encoding is the coefficient of `x^(8i+j)`.
///
/// [RFC 8452 §3]: https://tools.ietf.org/html/rfc8452#section-3
#[derive(Clone, Copy, Default, Eq, PartialEq)]
pub struct FieldElement {
    pub(crate) lo: u64,
    pub(crate) hi: u64,
}

impl FieldElement {
    /// Decode a field element from its little-endian bytestring
    /// representation.
    #[inline]
    pub fn from_le_bytes(bytes: &[u8; BLOCK_SIZE]) -> Self {
        Self {
            lo: u64::from_le_bytes(bytes[..8].try_into().unwrap()),
            hi: u64::from_le_bytes(bytes[8..].try_into().unwrap()),
        }
    }

    /// Encode this field element as its little-endian bytestring
    /// representation.
    #[inline]
    pub fn to_le_bytes(self) -> [u8; BLOCK_SIZE] {
        let mut bytes = [0u8; BLOCK_SIZE];
        bytes[..8].copy_from_slice(&self.lo.to_le_bytes());
        bytes[8..].copy_from_slice(&self.hi.to_le_bytes());
        bytes
    }

    /// Multiply this field element by `x`, i.e. the `mulX_POLYVAL`
    /// operation from RFC 8452 Appendix A.
    pub(crate) fn mulx(self) -> Self {
        let h = self.hi >> 63;

        let hi = (self.hi << 1) | (self.lo >> 63);
        let lo = self.lo << 1;

        // x^128 = x^127 + x^126 + x^121 + 1 (mod p)
        Self {
            lo: lo ^ h,
            hi: hi ^ (h << 63) ^ (h << 62) ^ (h << 57),
        }
    }
}

impl Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement(")?;
        for byte in self.to_le_bytes() {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

impl From<[u8; BLOCK_SIZE]> for FieldElement {
    #[inline]
    fn from(bytes: [u8; BLOCK_SIZE]) -> Self {
        Self::from_le_bytes(&bytes)
    }
}

impl From<FieldElement> for [u8; BLOCK_SIZE] {
    #[inline]
    fn from(fe: FieldElement) -> [u8; BLOCK_SIZE] {
        fe.to_le_bytes()
    }
}

impl From<u128> for FieldElement {
    #[inline]
    fn from(x: u128) -> Self {
        Self {
            lo: x as u64,
            hi: (x >> 64) as u64,
        }
    }
}

impl From<FieldElement> for u128 {
    #[inline]
    fn from(fe: FieldElement) -> u128 {
        (fe.lo as u128) | ((fe.hi as u128) << 64)
    }
}

#[allow(clippy::suspicious_arithmetic_impl)]
impl Add for FieldElement {
    type Output = Self;

    /// Adds two POLYVAL field elements.
    ///
    /// In POLYVAL's field, addition is the equivalent operation to XOR.
    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self {
            lo: self.lo ^ rhs.lo,
            hi: self.hi ^ rhs.hi,
        }
    }
}

#[allow(clippy::suspicious_arithmetic_impl)]
impl Mul for FieldElement {
    type Output = Self;

    /// Computes carryless POLYVAL multiplication over GF(2^128) in constant
    /// time.
    ///
    /// We perform schoolbook multiplication of `x` and `y`:
    ///
    /// ```text
    /// (x1,x0)*(y1,y0) = (x1*y1) + (x1*y0 + x0*y1) + (x0*y0)
    ///                      H         M       M         L
    /// ```
    ///
    /// The middle result (M) can be simplified with Karatsuba
    /// multiplication:
    ///
    /// ```text
    /// (x1*y0 + x0*y1) = (x1+x0) * (y1+y0) + (x1*y1) + (x0*y0)
    ///        M                                 H         L
    /// ```
    ///
    /// This requires one less 64-bit multiplication and reuses the existing
    /// results H and L.
    fn mul(self, rhs: Self) -> Self {
        let h = ctmul(self.hi, rhs.hi);
        let l = ctmul(self.lo, rhs.lo);
        let m = ctmul(self.hi ^ self.lo, rhs.hi ^ rhs.lo);
        reduce(h, l, m)
    }
}

#[cfg(feature = "zeroize")]
impl Zeroize for FieldElement {
    fn zeroize(&mut self) {
        self.lo.zeroize();
        self.hi.zeroize();
    }
}

/// Constant-time carry-less multiplication of two 64-bit polynomials over
/// GF(2), returning the full 128-bit product.
///
/// Each operand is split into five interleaved lanes so that every lane has
/// four-bit "holes" between coefficients. Integer multiplication of two
/// lanes then sums at most thirteen terms per coefficient, which fits in a
/// hole without carrying into the next coefficient. The carries that do
/// accumulate land in the holes and are masked back out of each partial
/// product.
pub(crate) fn ctmul(x: u64, y: u64) -> u128 {
    const MASK0: u128 = 0x2108_4210_8421_0842_1084_2108_4210_8421;
    const MASK1: u128 = 0x4210_8421_0842_1084_2108_4210_8421_0842;
    const MASK2: u128 = 0x8421_0842_1084_2108_4210_8421_0842_1084;
    const MASK3: u128 = 0x0842_1084_2108_4210_8421_0842_1084_2108;
    const MASK4: u128 = 0x1084_2108_4210_8421_0842_1084_2108_4210;

    let x0 = (x as u128) & MASK0;
    let x1 = (x as u128) & MASK1;
    let x2 = (x as u128) & MASK2;
    let x3 = (x as u128) & MASK3;
    let x4 = (x as u128) & MASK4;

    let y0 = (y as u128) & MASK0;
    let y1 = (y as u128) & MASK1;
    let y2 = (y as u128) & MASK2;
    let y3 = (y as u128) & MASK3;
    let y4 = (y as u128) & MASK4;

    let t0 = (x0 * y0) ^ (x1 * y4) ^ (x2 * y3) ^ (x3 * y2) ^ (x4 * y1);
    let t1 = (x0 * y1) ^ (x1 * y0) ^ (x2 * y4) ^ (x3 * y3) ^ (x4 * y2);
    let t2 = (x0 * y2) ^ (x1 * y1) ^ (x2 * y0) ^ (x3 * y4) ^ (x4 * y3);
    let t3 = (x0 * y3) ^ (x1 * y2) ^ (x2 * y1) ^ (x3 * y0) ^ (x4 * y4);
    let t4 = (x0 * y4) ^ (x1 * y3) ^ (x2 * y2) ^ (x3 * y1) ^ (x4 * y0);

    (t0 & MASK0) | (t1 & MASK1) | (t2 & MASK2) | (t3 & MASK3) | (t4 & MASK4)
}

/// Combine the three Karatsuba partial products into the 256-bit product
/// `X = (X3, X2, X1, X0)` and reduce it modulo the field polynomial using
/// the shift-XOR reflected reduction.
///
/// The reduction is linear over XOR, so callers may XOR together the
/// partial products of several multiplications and reduce the sums once.
pub(crate) fn reduce(h: u128, l: u128, m: u128) -> FieldElement {
    let (mut h0, mut h1) = (h as u64, (h >> 64) as u64);
    let (l0, mut l1) = (l as u64, (l >> 64) as u64);
    let (mut m0, mut m1) = (m as u64, (m >> 64) as u64);

    m0 ^= l0 ^ h0;
    m1 ^= l1 ^ h1;

    l1 ^= m0 ^ (l0 << 63) ^ (l0 << 62) ^ (l0 << 57);
    h0 ^= l0 ^ (l0 >> 1) ^ (l0 >> 2) ^ (l0 >> 7);
    h0 ^= m1 ^ (l1 << 63) ^ (l1 << 62) ^ (l1 << 57);
    h1 ^= l1 ^ (l1 >> 1) ^ (l1 >> 2) ^ (l1 >> 7);

    FieldElement { lo: h0, hi: h1 }
}
