//! Portable block engine built on the constant-time scalar field arithmetic
//! in [`field_element`](crate::field_element).
//!
//! The hot loop folds eight blocks per field reduction: the three Karatsuba
//! partial products of each `(key power, block)` pair are accumulated with
//! XOR, and the sums are reduced once per stride. Reduction is linear over
//! XOR, so this equals the XOR of the eight individually reduced products,
//! which is one full Horner sweep with the accumulator folded into the
//! first block.

use crate::{
    BLOCK_SIZE,
    field_element::{FieldElement, ctmul, reduce},
};

/// Fold whole blocks into `acc`, returning the new accumulator.
///
/// `blocks.len()` must be a multiple of [`BLOCK_SIZE`]; the caller has
/// already validated this.
pub(crate) fn polymul_blocks(
    mut acc: FieldElement,
    pow: &[FieldElement; 8],
    mut blocks: &[u8],
) -> FieldElement {
    debug_assert_eq!(blocks.len() % BLOCK_SIZE, 0);

    // Leading blocks one at a time until the remainder is a whole number of
    // eight-block strides.
    while (blocks.len() / BLOCK_SIZE) % 8 != 0 {
        let Some((block, rest)) = blocks.split_first_chunk::<BLOCK_SIZE>() else {
            break;
        };
        acc = (acc + FieldElement::from_le_bytes(block)) * pow[7];
        blocks = rest;
    }

    while let Some((stride, rest)) = blocks.split_first_chunk::<{ BLOCK_SIZE * 8 }>() {
        let mut h = 0u128;
        let mut l = 0u128;
        let mut m = 0u128;

        for (i, (x, block)) in pow.iter().zip(stride.chunks_exact(BLOCK_SIZE)).enumerate() {
            let mut y =
                FieldElement::from_le_bytes(block.try_into().expect("stride is whole blocks"));
            if i == 0 {
                y = y + acc;
            }

            h ^= ctmul(x.hi, y.hi);
            l ^= ctmul(x.lo, y.lo);
            m ^= ctmul(x.hi ^ x.lo, y.hi ^ y.lo);
        }

        acc = reduce(h, l, m);
        blocks = rest;
    }

    acc
}
