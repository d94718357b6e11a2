//! Discovery of the mass-storage volume exposed by a UF2 bootloader

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, trace};

use crate::config::{Config, Scheme};
use crate::LocateError;

/// How a bootloader volume was identified
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Discovery {
    /// The volume name contains the marker substring
    NameMatch,
    /// The volume root contains the marker file
    MarkerFile,
}

/// A mounted bootloader volume, only valid at the time it was found
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct BootloaderVolume {
    root: PathBuf,
    discovery: Discovery,
}

impl BootloaderVolume {
    pub fn new<P: Into<PathBuf>>(root: P, discovery: Discovery) -> BootloaderVolume {
        BootloaderVolume {
            root: root.into(),
            discovery,
        }
    }

    /// The root directory of the volume
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn discovery(&self) -> Discovery {
        self.discovery
    }
}

/// An interface for finding the bootloader volume among the volumes mounted on the host.
pub trait VolumeLocator {
    /// Performs a single scan and returns the first matching volume.
    ///
    /// A board that isn't in bootloader mode is the expected case and yields `Ok(None)`.
    fn locate(&self) -> Result<Option<BootloaderVolume>, LocateError>;
}

impl<L: VolumeLocator + ?Sized> VolumeLocator for Box<L> {
    fn locate(&self) -> Result<Option<BootloaderVolume>, LocateError> {
        (**self).locate()
    }
}

/// Returns the first path whose file name contains `marker`, ignoring case
pub fn select_by_name<I>(entries: I, marker: &str) -> Option<PathBuf>
where
    I: IntoIterator<Item = PathBuf>,
{
    let marker = marker.to_uppercase();

    entries.into_iter().find(|path| {
        path.file_name()
            .map(|name| name.to_string_lossy().to_uppercase().contains(&marker))
            .unwrap_or(false)
    })
}

/// Finds the bootloader by name among the directories under a mount root, e.g. `/Volumes`
#[derive(Debug, Clone)]
pub struct MountRootLocator {
    root: PathBuf,
    marker: String,
}

impl MountRootLocator {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(root: P, marker: S) -> MountRootLocator {
        MountRootLocator {
            root: root.into(),
            marker: marker.into(),
        }
    }

    /// Lists the entries under the mount root in lexical order
    fn entries(&self) -> io::Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.root)?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<io::Result<Vec<_>>>()?;

        entries.sort();

        Ok(entries)
    }
}

impl VolumeLocator for MountRootLocator {
    fn locate(&self) -> Result<Option<BootloaderVolume>, LocateError> {
        debug!("Scanning {} for {:?}", self.root.display(), self.marker);

        let entries = match self.entries() {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("Mount root {} does not exist", self.root.display());

                return Ok(None);
            }
            Err(err) => return Err(LocateError::ReadMountRoot(self.root.clone(), err)),
        };

        for entry in &entries {
            trace!("Found volume: {}", entry.display());
        }

        Ok(select_by_name(entries, &self.marker)
            .map(|root| BootloaderVolume::new(root, Discovery::NameMatch)))
    }
}

/// The capability of listing the logical drive roots on the host
pub trait DriveEnumerator {
    /// Returns the root of every logical drive, e.g. `C:\`
    fn drives(&self) -> Result<Vec<PathBuf>, LocateError>;
}

/// Enumerates the drive letters of the running system
///
/// Only available on Windows. Elsewhere `drives` reports the capability as unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemDrives;

impl DriveEnumerator for SystemDrives {
    #[cfg(windows)]
    fn drives(&self) -> Result<Vec<PathBuf>, LocateError> {
        Ok((b'A'..=b'Z')
            .map(|letter| PathBuf::from(format!("{}:\\", letter as char)))
            .filter(|root| root.exists())
            .collect())
    }

    #[cfg(not(windows))]
    fn drives(&self) -> Result<Vec<PathBuf>, LocateError> {
        Err(LocateError::CapabilityUnavailable {
            capability: "Drive letter enumeration",
            hint: "Use `--scheme mount-root` and point `--mount-root` at the directory volumes are mounted under.".to_owned(),
        })
    }
}

/// Finds the bootloader by looking for a marker file at the root of every logical drive
#[derive(Debug, Clone)]
pub struct DriveLetterLocator<E> {
    enumerator: E,
    marker_file: String,
}

impl<E: DriveEnumerator> DriveLetterLocator<E> {
    pub fn new<S: Into<String>>(enumerator: E, marker_file: S) -> DriveLetterLocator<E> {
        DriveLetterLocator {
            enumerator,
            marker_file: marker_file.into(),
        }
    }
}

impl<E: DriveEnumerator> VolumeLocator for DriveLetterLocator<E> {
    fn locate(&self) -> Result<Option<BootloaderVolume>, LocateError> {
        let drives = self.enumerator.drives()?;

        debug!(
            "Checking {} drive(s) for {}",
            drives.len(),
            self.marker_file
        );

        Ok(drives
            .into_iter()
            .find(|root| root.join(&self.marker_file).is_file())
            .map(|root| BootloaderVolume::new(root, Discovery::MarkerFile)))
    }
}

/// Creates the locator for the scheme selected in `config`
pub fn host_locator(config: &Config) -> Box<dyn VolumeLocator> {
    match config.scheme.resolve() {
        Scheme::DriveLetters => Box::new(DriveLetterLocator::new(
            SystemDrives,
            config.marker_file.clone(),
        )),
        _ => Box::new(MountRootLocator::new(
            config.mount_root.clone(),
            config.volume_marker.clone(),
        )),
    }
}
