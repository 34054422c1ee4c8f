//! Random sampling and the chance threshold.
//!
//! A [`Sampler`] draws one byte per open and holds the process-wide chance
//! the draw must meet. Draws below the chance are fatal.
//!
//! Two implementations are provided:
//!
//! - [`RouletteSampler`]: draws uniformly from `[MIN_RAND, MAX_RAND)` using a
//!   seedable RNG
//! - [`ScriptedSampler`]: replays a fixed sequence, for tests and demos

mod roulette;
mod scripted;

pub use roulette::RouletteSampler;
pub use scripted::ScriptedSampler;

use crate::config::DeviceConfig;
use crate::error::{Result, SamplerError};

/// Lowest value the roulette sampler can draw.
pub const MIN_RAND: u8 = 0;

/// Exclusive upper bound of roulette draws, and the largest accepted chance.
pub const MAX_RAND: u8 = 100;

/// Source of one random byte per open, plus the chance it is compared to.
///
/// Implementations must be thread-safe: opens on different handles sample
/// concurrently.
///
/// # Examples
///
/// ```
/// use kernel_roulette::sampler::{Sampler, ScriptedSampler};
///
/// let sampler = ScriptedSampler::new(vec![250], 200);
/// assert_eq!(sampler.sample().unwrap(), 250);
/// assert_eq!(sampler.chance(), 200);
/// ```
pub trait Sampler: Send + Sync {
    /// Draws one value.
    ///
    /// # Errors
    ///
    /// Returns [`SamplerError::Boom`] if the value is below the chance, or
    /// another [`SamplerError`] if no value could be drawn. All of these are
    /// fatal to the open that asked.
    fn sample(&self) -> std::result::Result<u8, SamplerError>;

    /// Returns the current chance.
    fn chance(&self) -> u8;

    /// Sets the chance, returning `false` if the value was rejected.
    fn set_chance(&self, chance: u8) -> bool;
}

/// Creates the sampler described by `config`.
///
/// # Errors
///
/// Returns an error if the random source cannot be seeded.
pub fn create_sampler(config: &DeviceConfig) -> Result<Box<dyn Sampler>> {
    let sampler = RouletteSampler::new(config.seed)?;
    if let Some(chance) = config.chance {
        sampler.set_chance(chance);
    }
    Ok(Box::new(sampler))
}

/// Probability that a single open is fatal at the given chance.
#[must_use]
pub fn boom_probability(chance: u8) -> f64 {
    f64::from(chance.min(MAX_RAND)) / f64::from(MAX_RAND)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sampler_with_chance() {
        let config = DeviceConfig {
            chance: Some(42),
            seed: Some(7),
            ..DeviceConfig::default()
        };
        let sampler = create_sampler(&config).unwrap();
        assert_eq!(sampler.chance(), 42);
    }

    #[test]
    fn test_create_sampler_random_chance_in_range() {
        let config = DeviceConfig {
            seed: Some(1),
            ..DeviceConfig::default()
        };
        let sampler = create_sampler(&config).unwrap();
        assert!(sampler.chance() < MAX_RAND);
    }

    #[test]
    fn test_boom_probability() {
        assert!((boom_probability(0) - 0.0).abs() < f64::EPSILON);
        assert!((boom_probability(50) - 0.5).abs() < f64::EPSILON);
        assert!((boom_probability(100) - 1.0).abs() < f64::EPSILON);
        assert!((boom_probability(255) - 1.0).abs() < f64::EPSILON);
    }
}
