//! Delivery of a UF2 image onto a bootloader volume

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use log::{debug, warn};

use crate::config::{DEFAULT_SETTLE_DELAY, DEFAULT_TARGET_NAME};
use crate::{BootloaderVolume, DeployError, Error};

/// A prebuilt firmware image on disk
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FirmwareImage {
    path: PathBuf,
}

impl FirmwareImage {
    /// Returns the image at `path`, or `Error::ImageNotFound` if there is no file there
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<FirmwareImage, Error> {
        let path = path.into();

        if !path.is_file() {
            return Err(Error::ImageNotFound(path));
        }

        Ok(FirmwareImage { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parameters for writing an image to the bootloader volume
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DeployOptions {
    /// The name of the file created at the root of the volume
    pub target_name: String,
    /// Time given to the host to finish mounting the volume before writing to it
    pub settle_delay: Duration,
    /// Compare the number of bytes written with the size of the image
    pub verify_size: bool,
}

impl Default for DeployOptions {
    fn default() -> DeployOptions {
        DeployOptions {
            target_name: DEFAULT_TARGET_NAME.to_owned(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            verify_size: false,
        }
    }
}

/// Copies `image` to the root of `volume` and returns the number of bytes written.
///
/// The volume can show up in a directory listing before the host has made it writable, so this
/// sleeps for `options.settle_delay` first. The bootloader flashes and reboots the board on its
/// own once the file is written, which is not observed here.
///
/// Nothing on the volume is touched unless the image can be opened. If writing fails after the
/// target was created, the partially written target is removed before returning the error.
pub fn deploy(
    image: &FirmwareImage,
    volume: &BootloaderVolume,
    options: &DeployOptions,
) -> Result<u64, DeployError> {
    let destination = volume.root().join(&options.target_name);

    if !options.settle_delay.is_zero() {
        debug!("Waiting {:?} for the volume to settle", options.settle_delay);
        thread::sleep(options.settle_delay);
    }

    debug!(
        "Copying {} to {}",
        image.path().display(),
        destination.display()
    );

    let copy_error = |source| DeployError::Copy {
        destination: destination.clone(),
        source,
    };

    let mut source = File::open(image.path()).map_err(copy_error)?;
    let expected = source.metadata().map_err(copy_error)?.len();
    let written = write_target(&mut source, &destination)?;

    if options.verify_size && written != expected {
        return Err(DeployError::SizeMismatch {
            destination,
            expected,
            written,
        });
    }

    debug!("Wrote {} bytes", written);

    Ok(written)
}

/// Creates `destination` and fills it from `reader`
///
/// Once `destination` has been created its previous contents are gone, so on a failed write the
/// truncated file is removed rather than left looking like a complete image.
fn write_target<R: Read>(reader: &mut R, destination: &Path) -> Result<u64, DeployError> {
    let mut target = File::create(destination).map_err(|source| DeployError::Copy {
        destination: destination.to_path_buf(),
        source,
    })?;

    match io::copy(reader, &mut target) {
        Ok(written) => Ok(written),
        Err(source) => {
            drop(target);
            remove_partial(destination);

            Err(DeployError::Copy {
                destination: destination.to_path_buf(),
                source,
            })
        }
    }
}

/// Removes the regular file a failed write left behind at `destination`
fn remove_partial(destination: &Path) {
    let is_file = fs::symlink_metadata(destination)
        .map(|metadata| metadata.is_file())
        .unwrap_or(false);

    if is_file {
        if let Err(err) = fs::remove_file(destination) {
            warn!(
                "Could not remove partial file {}: {}",
                destination.display(),
                err
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::Discovery;

    fn options() -> DeployOptions {
        DeployOptions {
            settle_delay: Duration::from_millis(0),
            ..DeployOptions::default()
        }
    }

    /// Writes `contents` to a firmware image inside `dir`
    fn image_with(dir: &TempDir, contents: &[u8]) -> FirmwareImage {
        let path = dir.path().join("firmware.uf2");

        fs::write(&path, contents).unwrap();

        FirmwareImage::open(path).unwrap()
    }

    #[test]
    fn it_should_reject_missing_image() {
        let dir = TempDir::new().unwrap();

        match FirmwareImage::open(dir.path().join("firmware.uf2")) {
            Err(Error::ImageNotFound(path)) => assert_eq!(path, dir.path().join("firmware.uf2")),
            other => panic!("expected ImageNotFound, got {:?}", other),
        }
    }

    #[test]
    fn it_should_reject_directory_as_image() {
        let dir = TempDir::new().unwrap();

        assert!(matches!(
            FirmwareImage::open(dir.path()),
            Err(Error::ImageNotFound(_))
        ));
    }

    #[test]
    fn it_should_copy_image_byte_for_byte() {
        let build = TempDir::new().unwrap();
        let volume_dir = TempDir::new().unwrap();
        let contents: Vec<u8> = (0..5000u32).map(|i| (i * 7 % 251) as u8).collect();
        let image = image_with(&build, &contents);
        let volume = BootloaderVolume::new(volume_dir.path(), Discovery::NameMatch);

        let written = deploy(&image, &volume, &options()).unwrap();

        assert_eq!(written, contents.len() as u64);
        assert_eq!(fs::read(volume_dir.path().join("NEW.UF2")).unwrap(), contents);
    }

    #[test]
    fn it_should_use_target_name_not_source_name() {
        let build = TempDir::new().unwrap();
        let volume_dir = TempDir::new().unwrap();
        let image = image_with(&build, b"UF2\n");
        let volume = BootloaderVolume::new(volume_dir.path(), Discovery::MarkerFile);
        let options = DeployOptions {
            target_name: "FLASH.UF2".to_owned(),
            ..options()
        };

        deploy(&image, &volume, &options).unwrap();

        assert!(volume_dir.path().join("FLASH.UF2").is_file());
        assert!(!volume_dir.path().join("firmware.uf2").exists());
    }

    #[test]
    fn it_should_overwrite_existing_target() {
        let build = TempDir::new().unwrap();
        let volume_dir = TempDir::new().unwrap();
        let image = image_with(&build, b"new image");
        let volume = BootloaderVolume::new(volume_dir.path(), Discovery::NameMatch);

        fs::write(volume_dir.path().join("NEW.UF2"), b"an older and longer image").unwrap();

        deploy(&image, &volume, &options()).unwrap();

        assert_eq!(
            fs::read(volume_dir.path().join("NEW.UF2")).unwrap(),
            b"new image"
        );
    }

    #[test]
    fn it_should_fail_when_target_cannot_be_written() {
        let build = TempDir::new().unwrap();
        let volume_dir = TempDir::new().unwrap();
        let image = image_with(&build, b"firmware");
        let volume = BootloaderVolume::new(volume_dir.path(), Discovery::NameMatch);

        // A directory in the way of the target makes the write fail regardless of privileges
        fs::create_dir(volume_dir.path().join("NEW.UF2")).unwrap();

        match deploy(&image, &volume, &options()) {
            Err(DeployError::Copy { destination, .. }) => {
                assert_eq!(destination, volume_dir.path().join("NEW.UF2"))
            }
            other => panic!("expected copy error, got {:?}", other),
        }

        assert!(volume_dir.path().join("NEW.UF2").is_dir());
    }

    #[test]
    fn it_should_fail_when_volume_disappeared() {
        let build = TempDir::new().unwrap();
        let volume_dir = TempDir::new().unwrap();
        let image = image_with(&build, b"firmware");
        let root = volume_dir.path().join("FEATHERBOOT");
        let volume = BootloaderVolume::new(&root, Discovery::NameMatch);

        assert!(matches!(
            deploy(&image, &volume, &options()),
            Err(DeployError::Copy { .. })
        ));
        assert!(!root.join("NEW.UF2").exists());
    }

    #[test]
    fn it_should_pass_size_verification() {
        let build = TempDir::new().unwrap();
        let volume_dir = TempDir::new().unwrap();
        let image = image_with(&build, &[0xAA; 1024]);
        let volume = BootloaderVolume::new(volume_dir.path(), Discovery::NameMatch);
        let options = DeployOptions {
            verify_size: true,
            ..options()
        };

        assert_eq!(deploy(&image, &volume, &options).unwrap(), 1024);
    }

    /// Yields `remaining` bytes of data, then fails like a device that went away mid-transfer
    struct DisconnectingReader {
        remaining: usize,
    }

    impl Read for DisconnectingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"));
            }

            let len = buf.len().min(self.remaining);

            buf[..len].iter_mut().for_each(|byte| *byte = 0x55);
            self.remaining -= len;

            Ok(len)
        }
    }

    #[test]
    fn it_should_keep_existing_target_when_image_vanished() {
        let build = TempDir::new().unwrap();
        let volume_dir = TempDir::new().unwrap();
        let image = image_with(&build, b"firmware");
        let volume = BootloaderVolume::new(volume_dir.path(), Discovery::NameMatch);
        let target = volume_dir.path().join("NEW.UF2");

        fs::write(&target, b"previous").unwrap();
        fs::remove_file(image.path()).unwrap();

        assert!(matches!(
            deploy(&image, &volume, &options()),
            Err(DeployError::Copy { .. })
        ));
        assert_eq!(fs::read(&target).unwrap(), b"previous");
    }

    #[test]
    fn it_should_remove_target_after_failed_write() {
        let volume_dir = TempDir::new().unwrap();
        let unrelated = volume_dir.path().join("INFO_UF2.TXT");
        let target = volume_dir.path().join("NEW.UF2");

        fs::write(&unrelated, b"UF2 Bootloader v3.14.0").unwrap();

        let mut reader = DisconnectingReader { remaining: 4096 };

        match write_target(&mut reader, &target) {
            Err(DeployError::Copy {
                destination,
                source,
            }) => {
                assert_eq!(destination, target);
                assert_eq!(source.kind(), io::ErrorKind::BrokenPipe);
            }
            other => panic!("expected copy error, got {:?}", other),
        }

        assert!(!target.exists());
        assert_eq!(fs::read(&unrelated).unwrap(), b"UF2 Bootloader v3.14.0");
    }

    #[test]
    fn it_should_remove_partial_file_but_not_directories() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("NEW.UF2");
        let subdir = dir.path().join("SUBDIR");

        fs::write(&file, b"half").unwrap();
        fs::create_dir(&subdir).unwrap();

        remove_partial(&file);
        remove_partial(&subdir);
        remove_partial(&dir.path().join("MISSING"));

        assert!(!file.exists());
        assert!(subdir.is_dir());
    }
}
