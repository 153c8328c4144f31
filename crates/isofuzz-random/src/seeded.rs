use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::RandomSource;

/// A PRNG-backed [`RandomSource`], deterministic for a given seed.
#[derive(Debug, Clone)]
pub struct SeededSource {
    rng: StdRng,
    seed: u64,
    identifier_counter: u64,
}

impl SeededSource {
    pub fn new(seed: u64) -> Self {
        SeededSource {
            rng: StdRng::seed_from_u64(seed),
            seed,
            identifier_counter: 0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl RandomSource for SeededSource {
    fn dx(&mut self, n: u32) -> u32 {
        assert!(n >= 1, "dx: n must be at least 1");
        self.rng.random_range(1..=n)
    }

    fn random_identifier(&mut self, prefix: &str) -> String {
        let salt = self.seed;
        let counter = self.identifier_counter;
        self.identifier_counter += 1;
        format!("{prefix}_{salt:x}_{counter}")
    }
}
