//! ARMv8 `PMULL`-accelerated backend.
//!
//! Field multiplication is three `PMULL`s (Karatsuba) followed by Gueron's
//! Montgomery-style reduction against the fixed polynomial constant.
//!
//! On CPUs with the SHA-3 extensions, the block engine additionally uses
//! `EOR3` (three-way XOR) to shave instructions from the Karatsuba combine
//! and the reduction.
//!
//! For more information about PMULL, see:
//! - <https://developer.arm.com/documentation/100069/0608/A64-SIMD-Vector-Instructions/PMULL--PMULL2--vector->
//! - <https://eprint.iacr.org/2015/688.pdf>

#![allow(unsafe_op_in_unsafe_fn)]

use core::{arch::aarch64::*, mem};

use crate::{BLOCK_SIZE, field_element::FieldElement};

/// Montgomery reduction polynomial, replicated into both 64-bit lanes.
const POLY: u128 = 1 << 127 | 1 << 126 | 1 << 121 | 1 << 63 | 1 << 62 | 1 << 57;

/// Multiply `x` by `y` in POLYVAL's field.
///
/// # Safety
///
/// The `neon` and `aes` (PMULL) CPU features must be available.
#[target_feature(enable = "neon", enable = "aes")]
pub(crate) unsafe fn polymul(x: FieldElement, y: FieldElement) -> FieldElement {
    store(polymul_q(load(&x), load(&y)))
}

/// Fold whole blocks into `acc`, returning the new accumulator.
///
/// `blocks.len()` must be a multiple of [`BLOCK_SIZE`]; the caller has
/// already validated this.
///
/// # Safety
///
/// The `neon` and `aes` (PMULL) CPU features must be available.
#[target_feature(enable = "neon", enable = "aes")]
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
        y = polymul_q(veorq_u8(y, vld1q_u8(block.as_ptr())), h);
        blocks = rest;
    }

    if !blocks.is_empty() {
        // The key powers stay resident in registers across strides.
        let mut hp = [vdupq_n_u8(0); 8];
        for (reg, fe) in hp.iter_mut().zip(pow) {
            *reg = load(fe);
        }

        while let Some((stride, rest)) = blocks.split_first_chunk::<{ BLOCK_SIZE * 8 }>() {
            let mut h_acc = vdupq_n_u8(0);
            let mut m_acc = vdupq_n_u8(0);
            let mut l_acc = vdupq_n_u8(0);

            for (i, reg) in hp.iter().enumerate() {
                let mut x = vld1q_u8(stride.as_ptr().add(i * BLOCK_SIZE));
                if i == 0 {
                    x = veorq_u8(x, y);
                }

                let (hh, mm, ll) = karatsuba1(x, *reg);
                h_acc = veorq_u8(h_acc, hh);
                m_acc = veorq_u8(m_acc, mm);
                l_acc = veorq_u8(l_acc, ll);
            }

            let (x23, x01) = karatsuba2(h_acc, m_acc, l_acc);
            y = mont_reduce(x23, x01);
            blocks = rest;
        }
    }

    store(y)
}

/// [`polymul_blocks`] variant for CPUs with the SHA-3 extensions.
///
/// # Safety
///
/// The `neon`, `aes` (PMULL), and `sha3` CPU features must be available.
#[target_feature(enable = "neon", enable = "aes", enable = "sha3")]
pub(crate) unsafe fn polymul_blocks_eor3(
    acc: FieldElement,
    pow: &[FieldElement; 8],
    mut blocks: &[u8],
) -> FieldElement {
    let h = load(&pow[7]);
    let mut y = load(&acc);

    while (blocks.len() / BLOCK_SIZE) % 8 != 0 {
        let Some((block, rest)) = blocks.split_first_chunk::<BLOCK_SIZE>() else {
            break;
        };
        y = polymul_q(veorq_u8(y, vld1q_u8(block.as_ptr())), h);
        blocks = rest;
    }

    if !blocks.is_empty() {
        let mut hp = [vdupq_n_u8(0); 8];
        for (reg, fe) in hp.iter_mut().zip(pow) {
            *reg = load(fe);
        }

        while let Some((stride, rest)) = blocks.split_first_chunk::<{ BLOCK_SIZE * 8 }>() {
            let mut h_acc = vdupq_n_u8(0);
            let mut m_acc = vdupq_n_u8(0);
            let mut l_acc = vdupq_n_u8(0);

            for (i, reg) in hp.iter().enumerate() {
                let mut x = vld1q_u8(stride.as_ptr().add(i * BLOCK_SIZE));
                if i == 0 {
                    x = veorq_u8(x, y);
                }

                let (hh, mm, ll) = karatsuba1(x, *reg);
                h_acc = veorq_u8(h_acc, hh);
                m_acc = veorq_u8(m_acc, mm);
                l_acc = veorq_u8(l_acc, ll);
            }

            let (x23, x01) = karatsuba2_eor3(h_acc, m_acc, l_acc);
            y = mont_reduce_eor3(x23, x01);
            blocks = rest;
        }
    }

    store(y)
}

#[inline]
#[target_feature(enable = "neon")]
unsafe fn load(fe: &FieldElement) -> uint8x16_t {
    let bytes = fe.to_le_bytes();
    vld1q_u8(bytes.as_ptr())
}

#[inline]
#[target_feature(enable = "neon")]
unsafe fn store(x: uint8x16_t) -> FieldElement {
    let mut bytes = [0u8; BLOCK_SIZE];
    vst1q_u8(bytes.as_mut_ptr(), x);
    FieldElement::from_le_bytes(&bytes)
}

#[inline]
#[target_feature(enable = "neon", enable = "aes")]
unsafe fn polymul_q(x: uint8x16_t, y: uint8x16_t) -> uint8x16_t {
    let (h, m, l) = karatsuba1(x, y);
    let (x23, x01) = karatsuba2(h, m, l);
    mont_reduce(x23, x01)
}

/// Karatsuba decomposition for `x*y`.
#[inline]
#[target_feature(enable = "neon", enable = "aes")]
unsafe fn karatsuba1(x: uint8x16_t, y: uint8x16_t) -> (uint8x16_t, uint8x16_t, uint8x16_t) {
    // First Karatsuba step: decompose x and y.
    //
    // (x1*y0 + x0*y1) = (x1+x0) * (y1+y0) + (x1*y1) + (x0*y0)
    //        M                                 H         L
    //
    // m = x.hi^x.lo * y.hi^y.lo
    let m = pmull(
        veorq_u8(x, vextq_u8(x, x, 8)), // x.hi^x.lo
        veorq_u8(y, vextq_u8(y, y, 8)), // y.hi^y.lo
    );
    let h = pmull2(x, y); // h = x.hi * y.hi
    let l = pmull(x, y); // l = x.lo * y.lo
    (h, m, l)
}

/// Karatsuba combine.
#[inline]
#[target_feature(enable = "neon", enable = "aes")]
unsafe fn karatsuba2(h: uint8x16_t, m: uint8x16_t, l: uint8x16_t) -> (uint8x16_t, uint8x16_t) {
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
        let t0 = veorq_u8(m, vextq_u8(l, h, 8));

        //   {h0, h1} ^ {l0, l1}
        // = {h0^l0, h1^l1}
        let t1 = veorq_u8(h, l);

        //   {m0^l1, m1^h0} ^ {h0^l0, h1^l1}
        // = {m0^l1^h0^l0, m1^h0^h1^l1}
        veorq_u8(t0, t1)
    };

    // {m0^l1^h0^l0, l0}
    let x01 = vextq_u8(
        vextq_u8(l, l, 8), // {l1, l0}
        t,
        8,
    );

    // {h1, m1^h0^h1^l1}
    let x23 = vextq_u8(
        t,
        vextq_u8(h, h, 8), // {h1, h0}
        8,
    );

    (x23, x01)
}

/// [`karatsuba2`] using `EOR3` for the three-way XOR.
#[inline]
#[target_feature(enable = "neon", enable = "aes", enable = "sha3")]
unsafe fn karatsuba2_eor3(h: uint8x16_t, m: uint8x16_t, l: uint8x16_t) -> (uint8x16_t, uint8x16_t) {
    // {m0^l1^h0^l0, m1^h0^h1^l1}
    let t = veor3q_u8(m, vextq_u8(l, h, 8), veorq_u8(h, l));

    let x01 = vextq_u8(vextq_u8(l, l, 8), t, 8);
    let x23 = vextq_u8(t, vextq_u8(h, h, 8), 8);

    (x23, x01)
}

#[inline]
#[target_feature(enable = "neon", enable = "aes")]
unsafe fn mont_reduce(x23: uint8x16_t, x01: uint8x16_t) -> uint8x16_t {
    // Perform the Montgomery reduction over the 256-bit X.
    //    [A1:A0] = X0 • poly
    //    [B1:B0] = [X0 ⊕ A1 : X1 ⊕ A0]
    //    [C1:C0] = B0 • poly
    //    [D1:D0] = [B0 ⊕ C1 : B1 ⊕ C0]
    // Output: [D1 ⊕ X3 : D0 ⊕ X2]
    let poly = vreinterpretq_u8_p128(POLY);
    let a = pmull(x01, poly);
    let b = veorq_u8(x01, vextq_u8(a, a, 8));
    let c = pmull2(b, poly);
    veorq_u8(x23, veorq_u8(c, b))
}

/// [`mont_reduce`] using `EOR3` for the final three-way XOR.
#[inline]
#[target_feature(enable = "neon", enable = "aes", enable = "sha3")]
unsafe fn mont_reduce_eor3(x23: uint8x16_t, x01: uint8x16_t) -> uint8x16_t {
    let poly = vreinterpretq_u8_p128(POLY);
    let a = pmull(x01, poly);
    let b = veorq_u8(x01, vextq_u8(a, a, 8));
    let c = pmull2(b, poly);
    veor3q_u8(x23, c, b)
}

/// Multiplies the low bits in `a` and `b`.
#[inline]
#[target_feature(enable = "neon", enable = "aes")]
unsafe fn pmull(a: uint8x16_t, b: uint8x16_t) -> uint8x16_t {
    mem::transmute(vmull_p64(
        vgetq_lane_u64(vreinterpretq_u64_u8(a), 0),
        vgetq_lane_u64(vreinterpretq_u64_u8(b), 0),
    ))
}

/// Multiplies the high bits in `a` and `b`.
#[inline]
#[target_feature(enable = "neon", enable = "aes")]
unsafe fn pmull2(a: uint8x16_t, b: uint8x16_t) -> uint8x16_t {
    mem::transmute(vmull_p64(
        vgetq_lane_u64(vreinterpretq_u64_u8(a), 1),
        vgetq_lane_u64(vreinterpretq_u64_u8(b), 1),
    ))
}
