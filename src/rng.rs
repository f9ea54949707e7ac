//! # RNG
//!
//! Entropy for RSA key generation, implemented over the `rand` crate's OS
//! source. [`GlobalRng`] is a facade around [`rand::rngs::OsRng`] so that
//! every consumer draws from the same source.

use rand::{CryptoRng, RngCore, rngs::OsRng};

/// [`GlobalRng`] is a facade around the `rand` crate's [`rand::rngs::OsRng`]
/// to provide the same interface everywhere in the crate.
pub(crate) struct GlobalRng;

impl RngCore for GlobalRng {
  fn next_u32(&mut self) -> u32 { OsRng.next_u32() }

  fn next_u64(&mut self) -> u64 { OsRng.next_u64() }

  fn fill_bytes(&mut self, dest: &mut [u8]) { OsRng.fill_bytes(dest) }

  fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
    OsRng.try_fill_bytes(dest)
  }
}

impl CryptoRng for GlobalRng {}
