//! Intel `CLMUL`-accelerated backend for modern x86/x86_64 CPUs
//! (i.e. Intel Sandy Bridge-compatible or newer).
//!
//! Field multiplication is three `PCLMULQDQ`s (Karatsuba) followed by
//! Gueron's Montgomery-style reduction, which trades the scalar shift
//! cascade for two more `PCLMULQDQ`s against the fixed polynomial constant.

#![allow(unsafe_op_in_unsafe_fn)]

#[cfg(target_arch = "x86")]
use core::arch::x86::*;
#[cfg(target_arch = "x86_64")]
use core::arch::x86_64::*;

use core::ptr;

use crate::{BLOCK_SIZE, field_element::FieldElement};

/// Montgomery reduction polynomial, replicated into both 64-bit lanes.
static POLY: u128 = 1 << 127 | 1 << 126 | 1 << 121 | 1 << 63 | 1 << 62 | 1 << 57;

/// Multiply `x` by `y` in POLYVAL's field.
///
/// # Safety
///
/// The `sse2` and `pclmulqdq` CPU features must be available.
#[target_feature(enable = "sse2,pclmulqdq")]
pub(crate) unsafe fn polymul(x: FieldElement, y: FieldElement) -> FieldElement {
    store(polymul_xmm(load(&x), load(&y)))
}

/// Fold whole blocks into `acc`, returning the new accumulator.
///
/// `blocks.len()` must be a multiple of [`BLOCK_SIZE`]; the caller has
/// already validated this.
///
/// # Safety
///
/// The `sse2` and `pclmulqdq` CPU features must be available.
#[target_feature(enable = "sse2,pclmulqdq")]
pub(crate) unsafe fn polymul_blocks(
    acc: FieldElement,
    pow: &[FieldElement; 8],
    mut blocks: &[u8],
) -> FieldElement {
    let h = load(&pow[7]);
    let mut y = load(&acc);

    // Leading blocks one at a time until the remainder is a whole number of
    // eight-block strides.
    while (blocks.len() / BLOCK_SIZE) % 8 != 0 {
        let Some((block, rest)) = blocks.split_first_chunk::<BLOCK_SIZE>() else {
            break;
        };
        let x = _mm_loadu_si128(block.as_ptr().cast());
        y = polymul_xmm(_mm_xor_si128(y, x), h);
        blocks = rest;
    }

    if !blocks.is_empty() {
        // The key powers stay resident in registers across strides.
        let mut hp = [_mm_setzero_si128(); 8];
        for (reg, fe) in hp.iter_mut().zip(pow) {
            *reg = load(fe);
        }

        while let Some((stride, rest)) = blocks.split_first_chunk::<{ BLOCK_SIZE * 8 }>() {
            let mut h_acc = _mm_setzero_si128();
            let mut m_acc = _mm_setzero_si128();
            let mut l_acc = _mm_setzero_si128();

            for (i, reg) in hp.iter().enumerate() {
                let mut x = _mm_loadu_si128(stride.as_ptr().add(i * BLOCK_SIZE).cast());
                if i == 0 {
                    x = _mm_xor_si128(x, y);
                }

                let (hh, mm, ll) = karatsuba1(x, *reg);
                h_acc = _mm_xor_si128(h_acc, hh);
                m_acc = _mm_xor_si128(m_acc, mm);
                l_acc = _mm_xor_si128(l_acc, ll);
            }

            let (x23, x01) = karatsuba2(h_acc, m_acc, l_acc);
            y = mont_reduce(x23, x01);
            blocks = rest;
        }
    }

    store(y)
}

#[inline]
#[target_feature(enable = "sse2")]
unsafe fn load(fe: &FieldElement) -> __m128i {
    let bytes = fe.to_le_bytes();
    _mm_loadu_si128(bytes.as_ptr().cast())
}

#[inline]
#[target_feature(enable = "sse2")]
unsafe fn store(x: __m128i) -> FieldElement {
    let mut bytes = [0u8; BLOCK_SIZE];
    _mm_storeu_si128(bytes.as_mut_ptr().cast(), x);
    FieldElement::from_le_bytes(&bytes)
}

#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn polymul_xmm(x: __m128i, y: __m128i) -> __m128i {
    let (h, m, l) = karatsuba1(x, y);
    let (x23, x01) = karatsuba2(h, m, l);
    mont_reduce(x23, x01)
}

/// Karatsuba decomposition for `x*y`.
#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn karatsuba1(x: __m128i, y: __m128i) -> (__m128i, __m128i, __m128i) {
    // First Karatsuba step: decompose x and y.
    //
    // (x1*y0 + x0*y1) = (x1+x0) * (y1+y0) + (x1*y1) + (x0*y0)
    //        M                                 H         L
    //
    // m = x.hi^x.lo * y.hi^y.lo
    let m = pmull(
        _mm_xor_si128(x, _mm_shuffle_epi32(x, 0xee)),
        _mm_xor_si128(y, _mm_shuffle_epi32(y, 0xee)),
    );
    let h = pmull2(y, x); // h = x.hi * y.hi
    let l = pmull(y, x); // l = x.lo * y.lo
    (h, m, l)
}

/// Karatsuba combine.
#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn karatsuba2(h: __m128i, m: __m128i, l: __m128i) -> (__m128i, __m128i) {
    // Second Karatsuba step: combine into a 2n-bit product.
    //
    // m0 ^= l0 ^ h0 // = m0^(l0^h0)
    // m1 ^= l1 ^ h1 // = m1^(l1^h1)
    // l1 ^= m0      // = l1^(m0^l0^h0)
    // h0 ^= l0 ^ m1 // = h0^(l0^m1^l1^h1)
    // h1 ^= l1      // = h1^(l1^m0^l0^h0)
    let t = {
        //   {m0, m1} ^ {l1, h0}
        // = {m0^l1, m1^h0}
        let t0 = _mm_xor_si128(
            m,
            _mm_castps_si128(_mm_shuffle_ps(
                _mm_castsi128_ps(l),
                _mm_castsi128_ps(h),
                0x4e,
            )),
        );

        //   {h0, h1} ^ {l0, l1}
        // = {h0^l0, h1^l1}
        let t1 = _mm_xor_si128(h, l);

        //   {m0^l1, m1^h0} ^ {h0^l0, h1^l1}
        // = {m0^l1^h0^l0, m1^h0^h1^l1}
        _mm_xor_si128(t0, t1)
    };

    // {m0^l1^h0^l0, l0}
    let x01 = _mm_unpacklo_epi64(l, t);

    // {h1, m1^h0^h1^l1}
    let x23 = _mm_castps_si128(_mm_movehl_ps(_mm_castsi128_ps(h), _mm_castsi128_ps(t)));

    (x23, x01)
}

#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn mont_reduce(x23: __m128i, x01: __m128i) -> __m128i {
    // Perform the Montgomery reduction over the 256-bit X.
    //    [A1:A0] = X0 • poly
    //    [B1:B0] = [X0 ⊕ A1 : X1 ⊕ A0]
    //    [C1:C0] = B0 • poly
    //    [D1:D0] = [B0 ⊕ C1 : B1 ⊕ C0]
    // Output: [D1 ⊕ X3 : D0 ⊕ X2]
    let poly = _mm_loadu_si128(ptr::addr_of!(POLY).cast());
    let a = pmull(x01, poly);
    let b = _mm_xor_si128(x01, _mm_shuffle_epi32(a, 0x4e));
    let c = pmull2(b, poly);
    _mm_xor_si128(x23, _mm_xor_si128(c, b))
}

/// Multiplies the low bits in `a` and `b`.
#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn pmull(a: __m128i, b: __m128i) -> __m128i {
    _mm_clmulepi64_si128(a, b, 0x00)
}

/// Multiplies the high bits in `a` and `b`.
#[inline]
#[target_feature(enable = "sse2,pclmulqdq")]
unsafe fn pmull2(a: __m128i, b: __m128i) -> __m128i {
    _mm_clmulepi64_si128(a, b, 0x11)
}
