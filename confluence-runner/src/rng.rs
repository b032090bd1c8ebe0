//! Deterministic trial seeding.
//!
//! A master seed generates deterministic sub-seeds for each
//! `(scope, window, trial)` tuple via BLAKE3, independently of thread
//! scheduling order, so a search returns identical results for any thread count.

use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrialSeeds {
    master_seed: u64,
}

impl TrialSeeds {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive the sub-seed for one trial. Independent of derivation order.
    pub fn sub_seed(&self, scope: &str, window: u64, trial: u64) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(scope.as_bytes());
        hasher.update(&window.to_le_bytes());
        hasher.update(&trial.to_le_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, scope: &str, window: u64, trial: u64) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(scope, window, trial))
    }
}
