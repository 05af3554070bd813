//! Injectable source of uniform randomness for the quote generator.

use std::collections::VecDeque;

use rand::SeedableRng;
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;

/// Single-method randomness seam; implementations return values in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_uniform(&mut self) -> f64;
}

impl RandomSource for Box<dyn RandomSource> {
    fn next_uniform(&mut self) -> f64 {
        (**self).next_uniform()
    }
}

/// Production source backed by `StdRng`.
pub struct EntropyRandom {
    rng: StdRng,
    dist: Uniform<f64>,
}

impl EntropyRandom {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Reproducible stream for tests and replays.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            dist: Uniform::new(0.0, 1.0),
        }
    }
}

impl Default for EntropyRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for EntropyRandom {
    fn next_uniform(&mut self) -> f64 {
        self.dist.sample(&mut self.rng)
    }
}

/// Replays a fixed sequence, wrapping around at the end.
///
/// Values are clamped into `[0, 1)` so scripted tests cannot push the
/// generator outside its documented ranges.
#[derive(Debug, Clone)]
pub struct ScriptedRandom {
    values: VecDeque<f64>,
}

impl ScriptedRandom {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Self {
        let mut values: VecDeque<f64> = values
            .into_iter()
            .map(|v| v.clamp(0.0, 1.0 - f64::EPSILON))
            .collect();
        if values.is_empty() {
            values.push_back(0.5);
        }
        Self { values }
    }

    /// Always returns `v`.
    pub fn constant(v: f64) -> Self {
        Self::new([v])
    }
}

impl RandomSource for ScriptedRandom {
    fn next_uniform(&mut self) -> f64 {
        // never empty: `new` seeds a value
        let v = self.values.pop_front().unwrap_or(0.5);
        self.values.push_back(v);
        v
    }
}
