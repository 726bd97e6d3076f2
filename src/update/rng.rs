//! Site-keyed random streams.
//!
//! Every (seed, pass, global site) triple gets its own `SmallRng`. The stream
//! a kernel sees at a site therefore does not depend on which rank owns the
//! site or in which order the sites of a pass are visited.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

#[inline]
fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Random stream of one site in one pass.
pub struct SiteRng {
    inner: SmallRng,
}

impl SiteRng {
    pub fn for_site(seed: u64, pass: u64, global: u64) -> Self {
        let key = splitmix64(splitmix64(splitmix64(seed) ^ pass) ^ global);
        Self {
            inner: SmallRng::seed_from_u64(key),
        }
    }

    /// Uniform in `[0, 1)`.
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        self.inner.r#gen::<f64>()
    }

    /// Uniform in `(0, 1]`, safe to take the logarithm of.
    #[inline]
    pub fn uniform_open0(&mut self) -> f64 {
        1.0 - self.uniform()
    }

    /// Uniform in `[-1, 1)`.
    #[inline]
    pub fn symmetric(&mut self) -> f64 {
        2.0 * self.uniform() - 1.0
    }

    /// Standard normal deviate (Box–Muller).
    pub fn gaussian(&mut self) -> f64 {
        let r = (-2.0 * self.uniform_open0().ln()).sqrt();
        let t = std::f64::consts::TAU * self.uniform();
        r * t.cos()
    }

    /// Metropolis test: accept with probability `min(1, exp(-delta))`.
    #[inline]
    pub fn accept(&mut self, delta: f64) -> bool {
        delta <= 0.0 || self.uniform() < (-delta).exp()
    }
}
