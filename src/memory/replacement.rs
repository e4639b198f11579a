//! Replacement policies.
//!
//! Each `CacheSet` owns its own policy instance; nothing is shared between
//! sets. `victim` is only consulted once every way of the set is valid.

use std::collections::VecDeque;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

pub use fifo::Fifo;
pub use lfu::Lfu;
pub use lru::Lru;
pub use random::Random;

/// How a way was touched
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineAccess {
    Hit,
    Fill,
}

pub trait ReplacementPolicy: Debug {
    /// Update bookkeeping after a hit or a fill of `way`
    fn on_access(&mut self, way: usize, access: LineAccess);

    /// Forget `way`, which no longer holds a block
    fn on_invalidate(&mut self, way: usize);

    /// Pick the way to evict from a full set
    fn victim(&mut self) -> usize;

    /// Return to the freshly-constructed state
    fn reset(&mut self);
}

/// Replacement policy selector, as found in a cache configuration
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacementPolicyKind {
    Random,
    #[default]
    Lru,
    Lfu,
    Fifo,
}

impl ReplacementPolicyKind {
    /// Make the bookkeeping for one set of `ways` ways.
    /// `seed` only matters for `Random`.
    pub fn build(self, ways: usize, seed: u64) -> Box<dyn ReplacementPolicy> {
        match self {
            ReplacementPolicyKind::Random => Box::new(Random::new(ways, seed)),
            ReplacementPolicyKind::Lru => Box::new(Lru::new(ways)),
            ReplacementPolicyKind::Lfu => Box::new(Lfu::new(ways)),
            ReplacementPolicyKind::Fifo => Box::new(Fifo::new(ways)),
        }
    }
}

mod lru {

    use super::{LineAccess, ReplacementPolicy};

    /// Least recently used way goes first
    #[derive(Debug)]
    pub struct Lru {
        // Least-recently used first
        order: Vec<usize>,
    }

    impl Lru {
        pub fn new(ways: usize) -> Self {
            Self { order: (0..ways).collect() }
        }
    }

    impl ReplacementPolicy for Lru {
        fn on_access(&mut self, way: usize, _access: LineAccess) {
            self.order.retain(|&i| i != way);
            self.order.push(way);
        }

        fn on_invalidate(&mut self, way: usize) {
            self.order.retain(|&i| i != way);
            self.order.insert(0, way);
        }

        fn victim(&mut self) -> usize {
            self.order[0]
        }

        fn reset(&mut self) {
            let ways = self.order.len();
            self.order = (0..ways).collect();
        }
    }
}

mod fifo {

    use super::{LineAccess, ReplacementPolicy, VecDeque};

    /// Oldest fill goes first, hits don't matter
    #[derive(Debug)]
    pub struct Fifo {
        filled: VecDeque<usize>,
    }

    impl Fifo {
        pub fn new(ways: usize) -> Self {
            Self { filled: VecDeque::with_capacity(ways) }
        }
    }

    impl ReplacementPolicy for Fifo {
        fn on_access(&mut self, way: usize, access: LineAccess) {
            if access == LineAccess::Fill {
                self.filled.retain(|&i| i != way);
                self.filled.push_back(way);
            }
        }

        fn on_invalidate(&mut self, way: usize) {
            self.filled.retain(|&i| i != way);
        }

        fn victim(&mut self) -> usize {
            self.filled.front().copied().unwrap_or(0)
        }

        fn reset(&mut self) {
            self.filled.clear();
        }
    }
}

mod lfu {

    use super::{LineAccess, ReplacementPolicy};

    /// Fewest accesses since fill goes first, lowest way on ties
    #[derive(Debug)]
    pub struct Lfu {
        uses: Vec<u64>,
    }

    impl Lfu {
        pub fn new(ways: usize) -> Self {
            Self { uses: vec![0; ways] }
        }
    }

    impl ReplacementPolicy for Lfu {
        fn on_access(&mut self, way: usize, access: LineAccess) {
            match access {
                LineAccess::Fill => self.uses[way] = 1,
                LineAccess::Hit => self.uses[way] += 1,
            }
        }

        fn on_invalidate(&mut self, way: usize) {
            self.uses[way] = 0;
        }

        fn victim(&mut self) -> usize {
            let mut result = 0;
            for (way, &count) in self.uses.iter().enumerate() {
                if count < self.uses[result] {
                    result = way;
                }
            }
            result
        }

        fn reset(&mut self) {
            self.uses.iter_mut().for_each(|count| *count = 0);
        }
    }
}

mod random {

    use super::{LineAccess, ReplacementPolicy};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    /// Uniform choice among all ways, replayable from its seed
    #[derive(Debug)]
    pub struct Random {
        ways: usize,
        seed: u64,
        rng: ChaCha8Rng,
    }

    impl Random {
        pub fn new(ways: usize, seed: u64) -> Self {
            Self { ways, seed, rng: ChaCha8Rng::seed_from_u64(seed) }
        }
    }

    impl ReplacementPolicy for Random {
        fn on_access(&mut self, _way: usize, _access: LineAccess) {}

        fn on_invalidate(&mut self, _way: usize) {}

        fn victim(&mut self) -> usize {
            self.rng.gen_range(0..self.ways)
        }

        fn reset(&mut self) {
            self.rng = ChaCha8Rng::seed_from_u64(self.seed);
        }
    }
}
