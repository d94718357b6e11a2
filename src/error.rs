use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Errors that end a single flashing attempt
#[derive(Debug, Error)]
pub enum Error {
    #[error("Firmware image not found: {}", _0.display())]
    ImageNotFound(PathBuf),
    #[error("Could not locate bootloader volume: {}", _0)]
    LocateError(#[from] LocateError),
    #[error("Failed to deploy firmware image: {}", _0)]
    DeployError(#[from] DeployError),
    #[error("UF2 conversion failed: {}", _0)]
    ToolError(#[from] ToolError),
}

impl Error {
    /// Returns a one-line suggestion for the user on how to recover, if there is one
    pub fn hint(&self) -> Option<&str> {
        match self {
            Error::ImageNotFound(_) => Some("Run `pio run` to generate the firmware image."),
            Error::LocateError(LocateError::CapabilityUnavailable { hint, .. }) => Some(hint.as_str()),
            Error::ToolError(_) => Some("Check that the UF2 conversion tool works when run manually."),
            _ => None,
        }
    }
}

/// Errors that can occur while scanning for the bootloader volume
///
/// Not finding a volume is not an error, see [`crate::VolumeLocator::locate`].
#[derive(Debug, Error)]
pub enum LocateError {
    #[error("{capability} is not available on this host")]
    CapabilityUnavailable {
        capability: &'static str,
        hint: String,
    },
    #[error("Could not read mount root {}: {}", _0.display(), _1)]
    ReadMountRoot(PathBuf, io::Error),
}

/// Errors that can occur while writing the firmware image to the bootloader volume
#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Failed to copy firmware image to {}: {}", .destination.display(), .source)]
    Copy {
        destination: PathBuf,
        source: io::Error,
    },
    #[error("Wrote {written} bytes to {}, expected {expected}", .destination.display())]
    SizeMismatch {
        destination: PathBuf,
        expected: u64,
        written: u64,
    },
}

/// Errors from running the external UF2 conversion tool
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Could not run {}: {}", _0, _1)]
    Spawn(String, io::Error),
    #[error("{} exited with {}", _0, _1)]
    Failed(String, ExitStatus),
    #[error("Conversion finished but {} was not created", _0.display())]
    MissingOutput(PathBuf),
}
