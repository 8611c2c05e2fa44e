//! The `mulX_POLYVAL` doubling operation from RFC 8452.

use crate::{Block, field_element::FieldElement};

/// Double a POLYVAL field element, i.e. multiply it by `x`.
///
/// This is the `mulX_POLYVAL` operation from [RFC 8452 Appendix A]. Its
/// primary use is deriving a POLYVAL key from a GHASH key: the two hashes
/// agree up to byte reversal once the key has been doubled.
///
/// From RFC 8452 Appendix A:
///
/// > GHASH(H, X_1, ..., X_n) =
/// >     ByteReverse(POLYVAL(mulX_POLYVAL(ByteReverse(H)),
/// >     ByteReverse(X_1), ..., ByteReverse(X_n)))
///
/// [RFC 8452 Appendix A]: https://tools.ietf.org/html/rfc8452#appendix-A
pub fn mulx(block: &Block) -> Block {
    FieldElement::from_le_bytes(block).mulx().to_le_bytes()
}
