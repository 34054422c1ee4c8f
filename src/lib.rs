//! # kernel-roulette
//!
//! A Russian-roulette pseudo-device.
//!
//! Opening the device draws a random value and compares it with a
//! configurable chance. Below the chance the open is fatal; otherwise the
//! handle reads back a status line such as
//! `Survived... sampled value is 42, which is >= 17`.
//!
//! ## Features
//!
//! - **Session state machine**: open / read / release with per-handle buffers
//! - **Offset-bounded reads**: partial reads, idempotent end-of-stream
//! - **Usage counting**: unload is refused while sessions are alive
//! - **Failure policy**: fatal failures either abort or propagate

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![warn(unsafe_code)]

pub mod cli;
pub mod config;
pub mod core;
pub mod device;
pub mod error;
pub mod logging;
pub mod module;
pub mod registry;
pub mod sampler;

// Re-export commonly used types at crate root
pub use error::{DeviceError, Error, Result, SamplerError};

// Re-export core session types
pub use core::{CopyOut, MAX_BUFFER_SIZE, Session, SessionBuffer, UsageCount};

// Re-export device and registration types
pub use device::{OpenFile, RouletteDevice};
pub use module::RouletteModule;
pub use registry::{DeviceNode, DeviceRegistry};

// Re-export sampler types
pub use sampler::{MAX_RAND, MIN_RAND, RouletteSampler, Sampler, ScriptedSampler};

// Re-export configuration and CLI types
pub use cli::{Cli, Commands, OutputFormat};
pub use config::{DeviceConfig, FailurePolicy};
