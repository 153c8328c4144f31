//! Deterministic-from-seed integer draws, plus a byte-file-backed source
//! that lets coverage-guided front ends (AFL-style) drive generation by
//! supplying a byte stream instead of a PRNG seed.

mod file_backed;
mod seeded;

pub use file_backed::FileBackedSource;
pub use seeded::SeededSource;

/// A source of random draws consumed by the grammar. Every draw is
/// inclusive of both bounds (`dx(n)` returns a value in `1..=n`).
pub trait RandomSource {
    /// A value in `1..=n`. The hot-path primitive every other draw is
    /// expressed in terms of.
    fn dx(&mut self, n: u32) -> u32;

    fn d6(&mut self) -> u32 {
        self.dx(6)
    }

    fn d9(&mut self) -> u32 {
        self.dx(9)
    }

    fn d12(&mut self) -> u32 {
        self.dx(12)
    }

    fn d20(&mut self) -> u32 {
        self.dx(20)
    }

    fn d42(&mut self) -> u32 {
        self.dx(42)
    }

    fn d100(&mut self) -> u32 {
        self.dx(100)
    }

    /// Pick one of `items` with probability proportional to its paired
    /// weight. Panics if `items` is empty or every weight is zero.
    fn weighted_pick<'a, T>(&mut self, items: &'a [(T, u32)]) -> &'a T {
        let total: u32 = items.iter().map(|(_, w)| *w).sum();
        assert!(total > 0, "weighted_pick: no items with positive weight");
        let mut roll = self.dx(total);
        for (item, weight) in items {
            if *weight == 0 {
                continue;
            }
            if roll <= *weight {
                return item;
            }
            roll -= *weight;
        }
        unreachable!("weighted_pick: roll exceeded total weight")
    }

    /// A statement-unique identifier, deterministic in a per-process counter
    /// salted by the seed, so two runs of the same seed mint the same names
    /// and two concurrent runs on different seeds never collide.
    fn random_identifier(&mut self, prefix: &str) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dx_is_in_range() {
        let mut src = SeededSource::new(42);
        for _ in 0..1000 {
            let v = src.dx(7);
            assert!((1..=7).contains(&v));
        }
    }

    #[test]
    fn weighted_pick_respects_zero_weight() {
        let mut src = SeededSource::new(1);
        let items = [("a", 0u32), ("b", 1)];
        for _ in 0..100 {
            assert_eq!(*src.weighted_pick(&items), "b");
        }
    }

    #[test]
    fn random_identifier_is_unique_within_a_run() {
        let mut src = SeededSource::new(7);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..50 {
            let id = src.random_identifier("ref");
            assert!(seen.insert(id), "identifier collided within one run");
        }
    }

    #[test]
    fn same_seed_reproduces_same_draws() {
        let mut a = SeededSource::new(99);
        let mut b = SeededSource::new(99);
        let seq_a: Vec<u32> = (0..20).map(|_| a.d20()).collect();
        let seq_b: Vec<u32> = (0..20).map(|_| b.d20()).collect();
        assert_eq!(seq_a, seq_b);
    }
}
