//! Uniform roulette sampler.

use super::{MAX_RAND, MIN_RAND, Sampler};
use crate::error::SamplerError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};

/// Draws uniformly from `[MIN_RAND, MAX_RAND)` and fails when the draw is
/// below the chance.
///
/// The initial chance is itself drawn from the same range. With a seed the
/// whole sequence (initial chance included) is reproducible.
///
/// # Examples
///
/// ```
/// use kernel_roulette::sampler::{RouletteSampler, Sampler};
///
/// let sampler = RouletteSampler::new(Some(42)).unwrap();
/// sampler.set_chance(0);
/// let value = sampler.sample().unwrap();
/// assert!(value < 100);
/// ```
#[derive(Debug)]
pub struct RouletteSampler {
    rng: Mutex<StdRng>,
    chance: AtomicU8,
}

impl RouletteSampler {
    /// Creates a sampler, seeded from `seed` or from OS entropy.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::Entropy`] if the OS random source fails.
    pub fn new(seed: Option<u64>) -> Result<Self, SamplerError> {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::try_from_os_rng().map_err(|e| SamplerError::Entropy(e.to_string()))?,
        };
        let chance = rng.random_range(MIN_RAND..MAX_RAND);

        Ok(Self {
            rng: Mutex::new(rng),
            chance: AtomicU8::new(chance),
        })
    }

    fn draw(&self) -> Result<u8, SamplerError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| SamplerError::Entropy("rng lock poisoned".to_string()))?;
        Ok(rng.random_range(MIN_RAND..MAX_RAND))
    }
}

impl Sampler for RouletteSampler {
    fn sample(&self) -> Result<u8, SamplerError> {
        let sampled = self.draw()?;
        let chance = self.chance();
        if sampled < chance {
            Err(SamplerError::Boom { sampled, chance })
        } else {
            Ok(sampled)
        }
    }

    fn chance(&self) -> u8 {
        self.chance.load(Ordering::Acquire)
    }

    fn set_chance(&self, chance: u8) -> bool {
        if chance > MAX_RAND {
            return false;
        }
        self.chance.store(chance, Ordering::Release);
        true
    }
}
