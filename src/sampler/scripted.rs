//! Scripted sampler replaying a fixed sequence.

use super::Sampler;
use crate::error::SamplerError;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

/// Replays a fixed list of values, in order.
///
/// Unlike [`RouletteSampler`](super::RouletteSampler) the chance is not
/// limited to `MAX_RAND`; any byte is accepted. Values below the chance still
/// fail with [`SamplerError::Boom`].
///
/// # Examples
///
/// ```
/// use kernel_roulette::sampler::{Sampler, ScriptedSampler};
///
/// let sampler = ScriptedSampler::new(vec![10, 90], 50);
/// assert!(sampler.sample().is_err());
/// assert_eq!(sampler.sample().unwrap(), 90);
/// assert!(sampler.sample().is_err());
/// ```
#[derive(Debug)]
pub struct ScriptedSampler {
    values: Vec<u8>,
    cursor: AtomicUsize,
    repeat: bool,
    chance: AtomicU8,
}

impl ScriptedSampler {
    /// Creates a sampler that yields `values` once each, then is exhausted.
    #[must_use]
    pub const fn new(values: Vec<u8>, chance: u8) -> Self {
        Self {
            values,
            cursor: AtomicUsize::new(0),
            repeat: false,
            chance: AtomicU8::new(chance),
        }
    }

    /// Creates a sampler that always yields `value`.
    #[must_use]
    pub fn constant(value: u8, chance: u8) -> Self {
        Self::new(vec![value], chance).repeating()
    }

    /// Cycles through the values instead of running out.
    #[must_use]
    pub fn repeating(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Number of draws taken so far.
    #[must_use]
    pub fn draws(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }
}

impl Sampler for ScriptedSampler {
    fn sample(&self) -> Result<u8, SamplerError> {
        if self.values.is_empty() {
            return Err(SamplerError::Exhausted);
        }

        let index = self.cursor.fetch_add(1, Ordering::AcqRel);
        let sampled = if self.repeat {
            self.values[index % self.values.len()]
        } else {
            *self.values.get(index).ok_or(SamplerError::Exhausted)?
        };

        let chance = self.chance();
        if sampled < chance {
            return Err(SamplerError::Boom { sampled, chance });
        }
        Ok(sampled)
    }

    fn chance(&self) -> u8 {
        self.chance.load(Ordering::Acquire)
    }

    fn set_chance(&self, chance: u8) -> bool {
        self.chance.store(chance, Ordering::Release);
        true
    }
}
