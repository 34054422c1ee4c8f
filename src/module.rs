//! Module setup and teardown.
//!
//! [`RouletteModule::init`] builds the sampler and device from configuration,
//! registers the device and logs the panic probability. [`RouletteModule::exit`]
//! unregisters it again.

use crate::config::DeviceConfig;
use crate::device::RouletteDevice;
use crate::error::Result;
use crate::registry::{DeviceNode, DeviceRegistry};
use crate::sampler::MAX_RAND;
use std::sync::Arc;
use tracing::info;

/// A loaded roulette module.
#[derive(Debug)]
pub struct RouletteModule {
    registry: Arc<DeviceRegistry>,
    major: u32,
    name: String,
}

impl RouletteModule {
    /// Loads the module into `registry`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the sampler cannot
    /// be created, or registration fails.
    pub fn init(config: &DeviceConfig, registry: Arc<DeviceRegistry>) -> Result<Self> {
        let device = RouletteDevice::from_config(config)?;
        Self::init_with(device, registry)
    }

    /// Loads the module with a prepared device.
    ///
    /// # Errors
    ///
    /// Returns an error if registration fails.
    pub fn init_with(device: RouletteDevice, registry: Arc<DeviceRegistry>) -> Result<Self> {
        let name = device.name().to_string();
        let chance = device.chance();
        let major = registry.register(device)?;

        info!("Panic probability: {chance}/{MAX_RAND}");
        Ok(Self {
            registry,
            major,
            name,
        })
    }

    /// Returns the assigned major number.
    #[must_use]
    pub const fn major(&self) -> u32 {
        self.major
    }

    /// Returns the device name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the registered device node.
    ///
    /// # Errors
    ///
    /// Returns an error if the device has been unregistered.
    pub fn node(&self) -> Result<Arc<DeviceNode>> {
        self.registry.node(self.major)
    }

    /// Unloads the module.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Busy`](crate::error::DeviceError::Busy) while
    /// sessions are open.
    pub fn exit(&self) -> Result<()> {
        self.registry.unregister(self.major)
    }
}
