//! Flashing of UF2 firmware images onto boards exposing a UF2 bootloader volume.
//!
//! The board shows up as a USB mass-storage device when put into bootloader mode (usually by
//! double-tapping reset). Copying a UF2 image onto that volume flashes it and reboots the board.

pub mod config;
pub mod convert;
pub mod deploy;
mod error;
pub mod volume;

use log::debug;

pub use config::{Config, ConverterConfig, Scheme};
pub use deploy::{deploy, DeployOptions, FirmwareImage};
pub use error::{DeployError, Error, LocateError, ToolError};
pub use volume::{BootloaderVolume, Discovery, VolumeLocator};

/// The hint given when no bootloader volume could be found
pub const VOLUME_NOT_FOUND_HINT: &str = "Double-tap reset and try again.";

/// The result of a flashing attempt that ran to completion
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Outcome {
    /// The image was written to the volume and the board should reboot into it
    Deployed {
        volume: BootloaderVolume,
        bytes: u64,
    },
    /// No bootloader volume is mounted
    VolumeNotFound {
        /// Set when the host lacks a capability needed to look for the volume
        hint: Option<String>,
    },
}

/// Scans the host for the bootloader volume using the scheme selected in `config`
pub fn find_bootloader_volume(config: &Config) -> Result<Option<BootloaderVolume>, LocateError> {
    volume::host_locator(config).locate()
}

/// Uploads the image named by `config` to the volume found by `locator`
pub fn upload<L: VolumeLocator + ?Sized>(config: &Config, locator: &L) -> Result<Outcome, Error> {
    let image = FirmwareImage::open(config.image_path())?;

    debug!("Using firmware image {}", image.path().display());

    let volume = match locator.locate() {
        Ok(Some(volume)) => volume,
        Ok(None) => return Ok(Outcome::VolumeNotFound { hint: None }),
        Err(LocateError::CapabilityUnavailable { capability, hint }) => {
            debug!("{} is unavailable", capability);

            return Ok(Outcome::VolumeNotFound { hint: Some(hint) });
        }
        Err(err) => return Err(err.into()),
    };

    let bytes = deploy(&image, &volume, &config.deploy)?;

    Ok(Outcome::Deployed { volume, bytes })
}

/// Converts the built binary to UF2 and uploads the result
pub fn convert_and_upload<L: VolumeLocator + ?Sized>(
    config: &Config,
    locator: &L,
) -> Result<Outcome, Error> {
    let image = convert::create_uf2(
        &config.converter,
        &config.binary_path(),
        &config.uf2_output_path(),
    )?;
    let config = Config {
        image: Some(image),
        ..config.clone()
    };

    upload(&config, locator)
}
