//! CPU feature autodetection with a portable pure Rust fallback.
//!
//! Detection runs when a hash context is constructed (the capability bits
//! themselves are probed once and cached process-wide by `cpufeatures`).
//! The chosen engine never changes for the lifetime of a context, and every
//! engine produces bit-identical results.

use cfg_if::cfg_if;

use super::soft;
use crate::field_element::FieldElement;

cfg_if! {
    if #[cfg(target_arch = "aarch64")] {
        use super::pmull as intrinsics;

        cpufeatures::new!(clmul_cpuid, "aes"); // `aes` implies PMULL
        cpufeatures::new!(eor3_cpuid, "sha3");
    } else {
        use super::clmul as intrinsics;

        cpufeatures::new!(clmul_cpuid, "pclmulqdq", "sse2");
    }
}

/// Multiplication engine, bound once at context construction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Engine {
    /// Bit-sliced portable implementation.
    Soft,
    /// Hardware 64x64 carry-less multiply on 128-bit vector registers.
    Clmul,
    /// [`Engine::Clmul`] plus the SHA-3 extensions' three-way XOR.
    #[cfg(target_arch = "aarch64")]
    ClmulEor3,
}

impl Engine {
    pub(crate) fn detect() -> Self {
        if clmul_cpuid::get() {
            #[cfg(target_arch = "aarch64")]
            if eor3_cpuid::get() {
                return Self::ClmulEor3;
            }
            Self::Clmul
        } else {
            Self::Soft
        }
    }

    pub(crate) fn polymul(self, x: FieldElement, y: FieldElement) -> FieldElement {
        match self {
            Self::Soft => x * y,
            // SAFETY: `detect` observed the required CPU features.
            _ => unsafe { intrinsics::polymul(x, y) },
        }
    }

    pub(crate) fn polymul_blocks(
        self,
        acc: FieldElement,
        pow: &[FieldElement; 8],
        blocks: &[u8],
    ) -> FieldElement {
        match self {
            Self::Soft => soft::polymul_blocks(acc, pow, blocks),
            // SAFETY: `detect` observed the required CPU features.
            Self::Clmul => unsafe { intrinsics::polymul_blocks(acc, pow, blocks) },
            #[cfg(target_arch = "aarch64")]
            // SAFETY: `detect` observed the required CPU features.
            Self::ClmulEor3 => unsafe { intrinsics::polymul_blocks_eor3(acc, pow, blocks) },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BLOCK_SIZE;

    fn xorshift(state: &mut u64) -> u64 {
        let mut x = *state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        *state = x;
        x
    }

    fn random_fe(state: &mut u64) -> FieldElement {
        FieldElement {
            lo: xorshift(state),
            hi: xorshift(state),
        }
    }

    fn powers(h: FieldElement) -> [FieldElement; 8] {
        let mut pow = [h; 8];
        for i in (0..7).rev() {
            pow[i] = pow[i + 1] * h;
        }
        pow
    }

    /// Whatever engine detection picks must agree with the portable
    /// implementation, multiply for multiply and block run for block run.
    #[test]
    fn detected_engine_matches_soft() {
        let engine = Engine::detect();
        let mut state = 0x2545_f491_4f6c_dd1d;

        for _ in 0..500 {
            let a = random_fe(&mut state);
            let b = random_fe(&mut state);
            assert_eq!(engine.polymul(a, b), a * b);
        }

        let h = random_fe(&mut state);
        let pow = powers(h);

        let mut buf = [0u8; BLOCK_SIZE * 24];
        for byte in buf.iter_mut() {
            *byte = xorshift(&mut state) as u8;
        }

        for nblocks in 0..=24 {
            let acc = random_fe(&mut state);
            let blocks = &buf[..nblocks * BLOCK_SIZE];
            assert_eq!(
                engine.polymul_blocks(acc, &pow, blocks),
                soft::polymul_blocks(acc, &pow, blocks),
                "{nblocks} blocks"
            );
        }
    }

    /// The EOR3 variant must agree with the plain PMULL engine.
    #[cfg(target_arch = "aarch64")]
    #[test]
    fn eor3_matches_pmull() {
        if Engine::detect() != Engine::ClmulEor3 {
            return;
        }

        let mut state = 0x9e37_79b9_7f4a_7c15;
        let h = random_fe(&mut state);
        let pow = powers(h);

        let mut buf = [0u8; BLOCK_SIZE * 24];
        for byte in buf.iter_mut() {
            *byte = xorshift(&mut state) as u8;
        }

        for nblocks in 0..=24 {
            let acc = random_fe(&mut state);
            let blocks = &buf[..nblocks * BLOCK_SIZE];
            assert_eq!(
                Engine::ClmulEor3.polymul_blocks(acc, &pow, blocks),
                Engine::Clmul.polymul_blocks(acc, &pow, blocks),
                "{nblocks} blocks"
            );
        }
    }
}
