//! Core device-session models for kernel-roulette.
//!
//! This module contains the session buffer, the per-open session with its
//! read protocol, and the usage count that keeps a device loaded while
//! sessions are alive. These are pure models with no host dependencies.

pub mod buffer;
pub mod session;
pub mod usage;

pub use buffer::{MAX_BUFFER_SIZE, SessionBuffer, format_status, strnlen};
pub use session::{CopyOut, Session};
pub use usage::{UsageCount, UsageRef};
