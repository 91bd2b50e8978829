//! Per-pixel random number streams.
//!
//! Every (seed, sample, pixel) triple gets its own generator, so the image
//! does not depend on how tiles are spread over threads.

use rand::rngs::SmallRng;
use rand::SeedableRng;

/// SplitMix64 finalizer, a cheap bijective 64-bit hash.
#[inline]
pub fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Seed for one pixel of one sample pass.
#[inline]
pub fn pixel_seed(seed: u64, sample: u32, x: u32, y: u32) -> u64 {
    let h = splitmix64(seed ^ sample as u64);
    let h = splitmix64(h ^ (((y as u64) << 32) | x as u64));
    splitmix64(h)
}

/// Generator for one pixel of one sample pass.
pub fn pixel_rng(seed: u64, sample: u32, x: u32, y: u32) -> SmallRng {
    SmallRng::seed_from_u64(pixel_seed(seed, sample, x, y))
}
