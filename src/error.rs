//! Error types for kernel-roulette operations.
//!
//! This module provides the error hierarchy using `thiserror` for the
//! device state machine, the sampler, the registration shim and the CLI.
//!
//! Errors fall into three classes:
//!
//! - **Fatal**: allocation failure, sampling failure and contract violations.
//!   The device decides whether to abort or propagate these based on its
//!   [`FailurePolicy`](crate::config::FailurePolicy).
//! - **Recoverable**: registration failures, refused unloads and faults while
//!   copying to the caller.
//! - End-of-stream is not an error at all; reads simply return zero bytes.

use thiserror::Error;

/// Result type alias for kernel-roulette operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Device state machine and registration errors.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// Sampler errors (random draw failed or was fatal).
    #[error("sampler error: {0}")]
    Sampler(#[from] SamplerError),

    /// I/O errors (config files, output).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },
}

impl Error {
    /// Returns `true` for failures that have no recovery path.
    ///
    /// Sampling failures, allocation failures and contract violations such as
    /// releasing a handle that was never opened are fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Sampler(_) => true,
            Self::Device(err) => err.is_fatal(),
            Self::Io(_) | Self::Command(_) | Self::Config { .. } => false,
        }
    }

    /// Returns the negative status code a host would see for this error.
    #[must_use]
    pub const fn errno(&self) -> i32 {
        match self {
            Self::Device(err) => err.errno(),
            Self::Sampler(_) | Self::Io(_) => -libc::EIO,
            Self::Command(_) | Self::Config { .. } => -libc::EINVAL,
        }
    }
}

/// Errors raised by the device session state machine and registration shim.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// Copying session data to the caller's destination failed.
    #[error("bad address: destination rejected {requested} bytes")]
    Fault {
        /// Number of bytes that could not be copied.
        requested: usize,
    },

    /// A handle was used without a matching open, or after release.
    #[error("bad file handle: {handle}")]
    BadHandle {
        /// The offending handle.
        handle: u64,
    },

    /// The session buffer could not be allocated.
    #[error("failed to allocate {size} byte session buffer")]
    AllocationFailed {
        /// Requested allocation size.
        size: usize,
    },

    /// The device could not be registered with the host.
    #[error("failed to register device {name}: {reason}")]
    Registration {
        /// Device name.
        name: String,
        /// Reason for failure.
        reason: String,
    },

    /// Unload refused while sessions are alive.
    #[error("device {name} is busy: {users} active users")]
    Busy {
        /// Device name.
        name: String,
        /// Number of active users.
        users: usize,
    },

    /// The device has been unloaded and accepts no new opens.
    #[error("device {name} is unloaded")]
    Unloaded {
        /// Device name.
        name: String,
    },

    /// No device is registered under the given major number.
    #[error("no device registered with major number {major}")]
    NotRegistered {
        /// Major number that was looked up.
        major: u32,
    },
}

impl DeviceError {
    /// Returns `true` for errors the device must treat as fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::BadHandle { .. } | Self::AllocationFailed { .. })
    }

    /// Returns the negative errno for this error.
    #[must_use]
    pub const fn errno(&self) -> i32 {
        match self {
            Self::Fault { .. } => -libc::EFAULT,
            Self::BadHandle { .. } => -libc::EBADF,
            Self::AllocationFailed { .. } => -libc::ENOMEM,
            Self::Registration { .. } => -libc::EINVAL,
            Self::Busy { .. } => -libc::EBUSY,
            Self::Unloaded { .. } | Self::NotRegistered { .. } => -libc::ENODEV,
        }
    }
}

/// Errors raised by a [`Sampler`](crate::sampler::Sampler).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplerError {
    /// The drawn value fell below the chance.
    #[error("Boom! sampled value {sampled} is below chance {chance}")]
    Boom {
        /// The sampled value.
        sampled: u8,
        /// The chance at the time of sampling.
        chance: u8,
    },

    /// A scripted sampler has no values left.
    #[error("sampler exhausted")]
    Exhausted,

    /// The random source could not be seeded or read.
    #[error("entropy source failed: {0}")]
    Entropy(String),
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// File not found.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path to the file that was not found.
        path: String,
    },

    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Generic I/O error wrapper.
    #[error("I/O error: {0}")]
    Generic(String),
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    /// Output format error.
    #[error("output format error: {0}")]
    OutputFormat(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(IoError::Generic(err.to_string()))
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(err: serde_json::Error) -> Self {
        Self::OutputFormat(err.to_string())
    }
}

impl From<DeviceError> for std::io::Error {
    fn from(err: DeviceError) -> Self {
        Self::from_raw_os_error(-err.errno())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Config {
            message: "bad chance".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: bad chance");
    }

    #[test]
    fn test_device_error_display() {
        let err = DeviceError::BadHandle { handle: 7 };
        assert_eq!(err.to_string(), "bad file handle: 7");

        let err = DeviceError::Busy {
            name: "kernel-roulette".to_string(),
            users: 2,
        };
        assert_eq!(
            err.to_string(),
            "device kernel-roulette is busy: 2 active users"
        );
    }

    #[test]
    fn test_sampler_error_display() {
        let err = SamplerError::Boom {
            sampled: 3,
            chance: 10,
        };
        assert_eq!(
            err.to_string(),
            "Boom! sampled value 3 is below chance 10"
        );
    }

    #[test]
    fn test_fatal_classification() {
        let boom: Error = SamplerError::Boom {
            sampled: 0,
            chance: 1,
        }
        .into();
        assert!(boom.is_fatal());

        let alloc: Error = DeviceError::AllocationFailed { size: 256 }.into();
        assert!(alloc.is_fatal());

        let bad: Error = DeviceError::BadHandle { handle: 1 }.into();
        assert!(bad.is_fatal());

        let fault: Error = DeviceError::Fault { requested: 10 }.into();
        assert!(!fault.is_fatal());

        let reg: Error = DeviceError::Registration {
            name: String::new(),
            reason: "empty name".to_string(),
        }
        .into();
        assert!(!reg.is_fatal());
    }

    #[test]
    fn test_errno_mapping() {
        assert_eq!(DeviceError::Fault { requested: 1 }.errno(), -libc::EFAULT);
        assert_eq!(
            DeviceError::Busy {
                name: "x".to_string(),
                users: 1
            }
            .errno(),
            -libc::EBUSY
        );
        assert_eq!(
            DeviceError::NotRegistered { major: 240 }.errno(),
            -libc::ENODEV
        );
        let err: Error = DeviceError::Fault { requested: 1 }.into();
        assert_eq!(err.errno(), -libc::EFAULT);
    }

    #[test]
    fn test_device_error_into_io_error() {
        let io: std::io::Error = DeviceError::Fault { requested: 4 }.into();
        assert_eq!(io.raw_os_error(), Some(libc::EFAULT));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_command_error_variants() {
        let err = CommandError::InvalidArgument("--bad".to_string());
        assert!(err.to_string().contains("invalid argument"));

        let err = CommandError::ExecutionFailed("timeout".to_string());
        assert!(err.to_string().contains("execution failed"));
    }

    #[test]
    fn test_from_serde_json_error_to_command_error() {
        let json_err: serde_json::Error = serde_json::from_str::<i32>("invalid").unwrap_err();
        let err: CommandError = json_err.into();
        assert!(matches!(err, CommandError::OutputFormat(_)));
    }
}
