#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs, rust_2018_idioms)]

mod backend;
mod field_element;
mod mulx;

#[cfg(feature = "hazmat")]
pub mod hazmat;

pub use crate::mulx::mulx;

use core::fmt;

use crate::{backend::Engine, field_element::FieldElement};

#[cfg(feature = "zeroize")]
use zeroize::Zeroize;

/// Size of a POLYVAL block in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Size of a POLYVAL key in bytes.
pub const KEY_SIZE: usize = 16;

/// Size of a POLYVAL tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Size of a serialized [`Polyval`] state in bytes: the key, the
/// accumulator, and the eight key powers, in that order.
pub const STATE_SIZE: usize = BLOCK_SIZE * (2 + 8);

/// POLYVAL keys (16 bytes).
pub type Key = [u8; KEY_SIZE];

/// POLYVAL blocks (16 bytes).
pub type Block = [u8; BLOCK_SIZE];

/// POLYVAL tags (16 bytes).
pub type Tag = [u8; TAG_SIZE];

/// POLYVAL errors.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Error {
    /// The key is not exactly [`KEY_SIZE`] bytes long.
    InvalidKeyLength,

    /// The key is all zero.
    ///
    /// The zero key would hash every message to the same tag, so it is
    /// rejected before any state is constructed.
    InvalidKey,

    /// An input length constraint was violated, e.g. a serialized state
    /// that is not exactly [`STATE_SIZE`] bytes.
    InvalidLength,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidKeyLength => f.write_str("invalid key length"),
            Error::InvalidKey => f.write_str("the zero key is invalid"),
            Error::InvalidLength => f.write_str("invalid input length"),
        }
    }
}

impl core::error::Error for Error {}

/// **POLYVAL**: GHASH-like universal hash over GF(2^128).
///
/// It operates similarly to a streaming hash, but only accepts whole
/// 16-byte blocks.
///
/// From [RFC 8452 §3]:
///
/// > POLYVAL, like GHASH (the authenticator in AES-GCM; ...), operates in a
/// > binary field of size 2^128. The field is defined by the irreducible
/// > polynomial x^128 + x^127 + x^126 + x^121 + 1.
///
/// The context holds the key `H`, the running accumulator, and a table of
/// the first eight powers of `H` used to fold eight blocks per field
/// reduction. The multiplication engine is chosen once, at construction,
/// based on the CPU's capabilities; every engine produces identical tags.
///
/// This type deliberately implements neither `PartialEq` (comparing tags
/// must be done in constant time by the caller) nor a transparent `Debug`.
///
/// [RFC 8452 §3]: https://tools.ietf.org/html/rfc8452#section-3
#[derive(Clone)]
pub struct Polyval {
    /// Hash key.
    h: FieldElement,

    /// Running accumulator.
    y: FieldElement,

    /// Key powers for the eight-block stride: `pow[i]` holds `H^(8-i)`,
    /// so `pow[0] = H^8` and `pow[7] = H`.
    pow: [FieldElement; 8],

    /// Multiplication engine bound at construction.
    engine: Engine,
}

impl Polyval {
    /// Create a POLYVAL instance keyed with `key`.
    ///
    /// The key bytes are interpreted little-endian. The all-zero key is
    /// rejected with [`Error::InvalidKey`].
    pub fn new(key: &Key) -> Result<Self, Error> {
        let mut acc = 0u8;
        for &byte in key {
            acc |= byte;
        }
        if acc == 0 {
            return Err(Error::InvalidKey);
        }

        let engine = Engine::detect();
        let h = FieldElement::from_le_bytes(key);

        let mut pow = [h; 8];
        for i in (0..7).rev() {
            pow[i] = engine.polymul(pow[i + 1], h);
        }

        Ok(Self {
            h,
            y: FieldElement::default(),
            pow,
            engine,
        })
    }

    /// Create a POLYVAL instance from a variable-length key slice.
    ///
    /// Returns [`Error::InvalidKeyLength`] unless `key` is exactly
    /// [`KEY_SIZE`] bytes.
    pub fn new_from_slice(key: &[u8]) -> Result<Self, Error> {
        let key: &Key = key.try_into().map_err(|_| Error::InvalidKeyLength)?;
        Self::new(key)
    }

    /// One-shot POLYVAL of `data` under `key`.
    ///
    /// # Panics
    ///
    /// If `data.len()` is not a multiple of [`BLOCK_SIZE`] (see
    /// [`Polyval::update`]).
    pub fn digest(key: &Key, data: &[u8]) -> Result<Tag, Error> {
        let mut state = Self::new(key)?;
        state.update(data);
        Ok(state.sum())
    }

    /// Write one or more blocks to the running hash.
    ///
    /// An empty input is a no-op.
    ///
    /// # Panics
    ///
    /// If `blocks.len()` is not a multiple of [`BLOCK_SIZE`]. POLYVAL is
    /// only defined over whole blocks; a partial block is a caller bug, and
    /// silently padding or truncating it would produce a wrong tag.
    pub fn update(&mut self, blocks: &[u8]) {
        assert_eq!(
            blocks.len() % BLOCK_SIZE,
            0,
            "input length is not a multiple of the block size"
        );

        self.y = self.engine.polymul_blocks(self.y, &self.pow, blocks);
    }

    /// Reset the hash to its initial state.
    ///
    /// The key and its power table are retained.
    pub fn reset(&mut self) {
        self.y = FieldElement::default();
    }

    /// The current tag, marshalled little-endian.
    ///
    /// Does not change the hash state: more blocks can be written
    /// afterwards.
    pub fn sum(&self) -> Tag {
        self.y.to_le_bytes()
    }

    /// Serialize the hash state.
    ///
    /// The format is `h`, `y`, then the eight key powers, each as a pair of
    /// little-endian `u64`s. It carries no integrity check and must not be
    /// accepted across a trust boundary.
    pub fn to_bytes(&self) -> [u8; STATE_SIZE] {
        let mut out = [0u8; STATE_SIZE];
        out[..BLOCK_SIZE].copy_from_slice(&self.h.to_le_bytes());
        out[BLOCK_SIZE..2 * BLOCK_SIZE].copy_from_slice(&self.y.to_le_bytes());
        for (chunk, fe) in out[2 * BLOCK_SIZE..]
            .chunks_exact_mut(BLOCK_SIZE)
            .zip(&self.pow)
        {
            chunk.copy_from_slice(&fe.to_le_bytes());
        }
        out
    }

    /// Restore a hash state serialized with [`Polyval::to_bytes`].
    ///
    /// Returns [`Error::InvalidLength`] unless `bytes` is exactly
    /// [`STATE_SIZE`] bytes. The multiplication engine is re-detected, so a
    /// state may be moved between machines with different capabilities.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != STATE_SIZE {
            return Err(Error::InvalidLength);
        }

        let mut chunks = bytes.chunks_exact(BLOCK_SIZE);
        let mut next = || {
            let chunk = chunks.next().expect("length checked above");
            FieldElement::from_le_bytes(chunk.try_into().expect("chunk is a whole block"))
        };

        let h = next();
        let y = next();
        let pow: [FieldElement; 8] = core::array::from_fn(|_| next());

        Ok(Self {
            h,
            y,
            pow,
            engine: Engine::detect(),
        })
    }
}

impl fmt::Debug for Polyval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Polyval { ... }")
    }
}

#[cfg(feature = "zeroize")]
impl Zeroize for Polyval {
    fn zeroize(&mut self) {
        self.h.zeroize();
        self.y.zeroize();
        self.pow.zeroize();
    }
}
