//! The roulette device session state machine.
//!
//! Each handle moves `Closed -> Open -> Closed`:
//!
//! 1. [`RouletteDevice::open`] takes a usage reference, samples, allocates a
//!    session buffer and formats the status line into it. The result is an
//!    [`OpenFile`] owned by the caller.
//! 2. [`OpenFile::read_into`] copies bytes out and advances the handle's
//!    cursor. Reads never change state.
//! 3. [`RouletteDevice::release`] drops the usage reference, then frees the
//!    buffer and the session.
//!
//! Releasing consumes the [`OpenFile`], so a handle cannot be read or
//! released again afterwards.

mod file;

pub use file::OpenFile;

use crate::config::{DeviceConfig, FailurePolicy};
use crate::core::{Session, UsageCount};
use crate::error::{DeviceError, Error, Result};
use crate::sampler::{Sampler, create_sampler};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error, warn};

/// A roulette pseudo-device.
///
/// # Examples
///
/// ```
/// use kernel_roulette::device::RouletteDevice;
/// use kernel_roulette::sampler::ScriptedSampler;
/// use std::io::Read;
/// use std::sync::Arc;
///
/// let device = RouletteDevice::new("roulette", Arc::new(ScriptedSampler::constant(250, 200)));
/// let mut file = device.open().unwrap();
/// let mut text = String::new();
/// file.read_to_string(&mut text).unwrap();
/// assert_eq!(text, "Survived... sampled value is 250, which is >= 200\n");
/// device.release(file);
/// assert_eq!(device.users(), 0);
/// ```
pub struct RouletteDevice {
    name: String,
    sampler: Arc<dyn Sampler>,
    users: Arc<UsageCount>,
    policy: FailurePolicy,
    // Opens hold the read side; unload takes the write side.
    unloaded: RwLock<bool>,
}

impl RouletteDevice {
    /// Creates a device backed by `sampler`, propagating fatal failures.
    #[must_use]
    pub fn new(name: impl Into<String>, sampler: Arc<dyn Sampler>) -> Self {
        Self {
            name: name.into(),
            sampler,
            users: Arc::new(UsageCount::new()),
            policy: FailurePolicy::Propagate,
            unloaded: RwLock::new(false),
        }
    }

    /// Builds a device with a roulette sampler from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the sampler cannot
    /// be seeded.
    pub fn from_config(config: &DeviceConfig) -> Result<Self> {
        config.validate()?;
        let sampler: Arc<dyn Sampler> = create_sampler(config)?.into();
        Ok(Self::new(config.name.clone(), sampler).with_policy(config.failure_policy))
    }

    /// Sets the failure policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the device name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the failure policy.
    #[must_use]
    pub const fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Returns the number of open sessions.
    #[must_use]
    pub fn users(&self) -> usize {
        self.users.users()
    }

    /// Returns the current chance.
    #[must_use]
    pub fn chance(&self) -> u8 {
        self.sampler.chance()
    }

    /// Sets the chance, returning `false` if the sampler rejected it.
    pub fn set_chance(&self, chance: u8) -> bool {
        let accepted = self.sampler.set_chance(chance);
        if accepted {
            debug!(device = %self.name, chance, "chance updated");
        } else {
            warn!(device = %self.name, chance, "chance rejected");
        }
        accepted
    }

    /// Opens a new session.
    ///
    /// # Errors
    ///
    /// Sampling and allocation failures are fatal. Under
    /// [`FailurePolicy::Abort`] they abort the process; otherwise they are
    /// returned and the usage reference taken at the start is given back.
    ///
    /// Returns [`DeviceError::Unloaded`] once [`RouletteDevice::unload`] has
    /// succeeded.
    pub fn open(&self) -> Result<OpenFile> {
        let unloaded = self.unloaded.read().unwrap_or_else(PoisonError::into_inner);
        if *unloaded {
            return Err(DeviceError::Unloaded {
                name: self.name.clone(),
            }
            .into());
        }
        let usage = self.users.acquire();

        let sampled = self.enforce(self.sampler.sample().map_err(Error::from))?;
        let chance = self.sampler.chance();
        let session = self.enforce(Session::new(sampled, chance).map_err(Error::from))?;

        debug!(
            device = %self.name,
            sampled,
            chance,
            users = self.users.users(),
            "device opened"
        );
        Ok(OpenFile::new(usage, session))
    }

    /// Marks the device unloaded so no further opens succeed.
    ///
    /// The check and the state change happen under one lock that every open
    /// holds for its whole duration, so an open cannot slip in between.
    /// Unloading twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Busy`] while sessions are alive.
    pub fn unload(&self) -> Result<()> {
        let mut unloaded = self
            .unloaded
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let users = self.users.users();
        if users > 0 {
            return Err(DeviceError::Busy {
                name: self.name.clone(),
                users,
            }
            .into());
        }
        *unloaded = true;
        Ok(())
    }

    /// Returns `true` once the device has been unloaded.
    #[must_use]
    pub fn is_unloaded(&self) -> bool {
        *self.unloaded.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Releases a session.
    pub fn release(&self, file: OpenFile) {
        file.release();
        debug!(device = %self.name, users = self.users.users(), "device released");
    }

    /// Applies the failure policy to `result`.
    ///
    /// Non-fatal errors and successes pass through unchanged.
    ///
    /// # Errors
    ///
    /// Returns the original error unless it is fatal and the policy aborts.
    pub fn enforce<T>(&self, result: Result<T>) -> Result<T> {
        match result {
            Err(err) if err.is_fatal() => {
                if self.policy == FailurePolicy::Abort {
                    error!(device = %self.name, error = %err, "fatal device failure, aborting");
                    std::process::abort();
                }
                warn!(device = %self.name, error = %err, "fatal device failure");
                Err(err)
            }
            other => other,
        }
    }
}

impl std::fmt::Debug for RouletteDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouletteDevice")
            .field("name", &self.name)
            .field("chance", &self.chance())
            .field("users", &self.users())
            .field("policy", &self.policy)
            .field("unloaded", &self.is_unloaded())
            .finish_non_exhaustive()
    }
}
