//! POLYVAL backends.
//!
//! Every backend implements the same two operations: a single field
//! multiplication (used for the power table and the single-block tail) and
//! the multi-block engine. All backends produce bit-identical results; the
//! accelerated ones are selected at runtime, once, by [`Engine::detect`].

mod soft;

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(all(target_arch = "aarch64", not(polyval_backend = "soft")))] {
        mod autodetect;
        mod pmull;

        pub(crate) use autodetect::Engine;
    } else if #[cfg(all(
        any(target_arch = "x86", target_arch = "x86_64"),
        not(polyval_backend = "soft")
    ))] {
        mod autodetect;
        mod clmul;

        pub(crate) use autodetect::Engine;
    } else {
        use crate::field_element::FieldElement;

        /// Engine for targets without a carry-less multiply unit: always the
        /// portable implementation, no capability probe.
        #[derive(Clone, Copy, Debug, Eq, PartialEq)]
        pub(crate) struct Engine;

        impl Engine {
            pub(crate) fn detect() -> Self {
                Self
            }

            pub(crate) fn polymul(self, x: FieldElement, y: FieldElement) -> FieldElement {
                x * y
            }

            pub(crate) fn polymul_blocks(
                self,
                acc: FieldElement,
                pow: &[FieldElement; 8],
                blocks: &[u8],
            ) -> FieldElement {
                soft::polymul_blocks(acc, pow, blocks)
            }
        }
    }
}
