//! Unified error type for the tdusb-lib crate.
//!
//! [`TdError`] wraps transport errors (`DeviceError`) and the caller-side
//! kinds (`InvalidOption`, `Config`). `From` impls allow `?` to propagate
//! across module boundaries, and [`TdError::exit_code`] gives the process
//! exit status the CLI reports.

use std::fmt;

use crate::transport::DeviceError;

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    NoError = 0,
    RuntimeError = 1,
    /// Shared with clap's usage-error status.
    InvalidOption = 2,
    DeviceOpenError = 3,
    DeviceIoError = 4,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Unified error type for tdusb-lib operations.
#[derive(Debug)]
pub enum TdError {
    /// Bad or missing argument, unknown field or model name.
    InvalidOption(String),
    /// Device communication error (open, report I/O, exhausted retries).
    Device(DeviceError),
    /// Standard I/O error (terminal, config persistence).
    Io(std::io::Error),
    /// Configuration validation error.
    Config(String),
}

impl TdError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            TdError::InvalidOption(_) => ExitCode::InvalidOption,
            TdError::Device(DeviceError::NotFound(_) | DeviceError::OpenFailed(_)) => {
                ExitCode::DeviceOpenError
            }
            TdError::Device(DeviceError::Io(_)) => ExitCode::DeviceIoError,
            TdError::Io(_) | TdError::Config(_) => ExitCode::RuntimeError,
        }
    }
}

impl fmt::Display for TdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TdError::InvalidOption(e) => write!(f, "Invalid option: {e}"),
            TdError::Device(e) => write!(f, "{e}"),
            TdError::Io(e) => write!(f, "I/O error: {e}"),
            TdError::Config(e) => write!(f, "Config error: {e}"),
        }
    }
}

impl std::error::Error for TdError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TdError::Device(e) => Some(e),
            TdError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DeviceError> for TdError {
    fn from(e: DeviceError) -> Self {
        TdError::Device(e)
    }
}

impl From<std::io::Error> for TdError {
    fn from(e: std::io::Error) -> Self {
        TdError::Io(e)
    }
}

/// Crate-level Result alias using [`TdError`].
pub type Result<T> = std::result::Result<T, TdError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_device_error() {
        let e: TdError = DeviceError::Io("timeout".into()).into();
        assert!(matches!(e, TdError::Device(DeviceError::Io(_))));
    }

    #[test]
    fn from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let e: TdError = io_err.into();
        assert!(matches!(e, TdError::Io(_)));
    }

    #[test]
    fn display_invalid_option() {
        let e = TdError::InvalidOption("Only one value can be set.".into());
        assert_eq!(e.to_string(), "Invalid option: Only one value can be set.");
    }

    #[test]
    fn display_device_error_passes_through() {
        let e = TdError::Device(DeviceError::NotFound("IWT120".into()));
        assert_eq!(e.to_string(), "Device not found: IWT120");
    }

    #[test]
    fn exit_codes_distinguish_option_and_io() {
        let invalid = TdError::InvalidOption("x".into()).exit_code();
        let io = TdError::Device(DeviceError::Io("x".into())).exit_code();
        assert_ne!(invalid, io);
        assert_ne!(invalid, ExitCode::NoError);
        assert_ne!(io, ExitCode::NoError);
        assert_eq!(io.code(), 4);
        assert_eq!(invalid.code(), 2);
    }

    #[test]
    fn exit_code_for_open_failures() {
        assert_eq!(
            TdError::Device(DeviceError::NotFound("x".into())).exit_code(),
            ExitCode::DeviceOpenError
        );
        assert_eq!(
            TdError::Device(DeviceError::OpenFailed("x".into())).exit_code(),
            ExitCode::DeviceOpenError
        );
        assert_eq!(
            TdError::Config("x".into()).exit_code(),
            ExitCode::RuntimeError
        );
    }

    #[test]
    fn source_chains_device_error() {
        let e = TdError::Device(DeviceError::Io("pipe broken".into()));
        let source = std::error::Error::source(&e).unwrap();
        assert!(source.to_string().contains("pipe broken"));
    }

    #[test]
    fn source_none_for_string_variants() {
        let e = TdError::InvalidOption("test".into());
        assert!(std::error::Error::source(&e).is_none());
    }

    #[test]
    fn question_mark_propagation_device_to_td() {
        fn inner() -> crate::transport::Result<()> {
            Err(DeviceError::Io("boom".into()))
        }
        fn outer() -> Result<()> {
            inner()?;
            Ok(())
        }
        let err = outer().unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::DeviceIoError);
    }
}
