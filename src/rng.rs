//! Injectable randomness.
//!
//! Everything that needs randomness (coercion repair, particle resampling,
//! rollout policy, UCB tie-break noise, random-move selection) takes a
//! `&mut BeliefRng` rather than reaching for a thread-local generator, so a
//! whole game — belief updates and planning alike — can be replayed
//! deterministically from one seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub struct BeliefRng(ChaCha8Rng);

impl BeliefRng {
    pub fn from_seed(seed: u64) -> Self {
        BeliefRng(ChaCha8Rng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        BeliefRng(ChaCha8Rng::from_entropy())
    }

    pub fn gen_range(&mut self, low: usize, high_exclusive: usize) -> usize {
        self.0.gen_range(low..high_exclusive)
    }

    pub fn gen_f64(&mut self) -> f64 {
        self.0.gen::<f64>()
    }

    pub fn gen_range_f64(&mut self, low: f64, high: f64) -> f64 {
        self.0.gen_range(low..high)
    }

    /// Uniformly pick one element's index from a nonempty slice.
    pub fn choose_index<T>(&mut self, items: &[T]) -> Option<usize> {
        if items.is_empty() {
            None
        } else {
            Some(self.gen_range(0, items.len()))
        }
    }

    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        self.choose_index(items).map(|i| &items[i])
    }
}
