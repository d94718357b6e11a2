//! Runtime configuration for locating, converting and deploying firmware

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::DeployOptions;

/// The default PlatformIO build directory for the Feather M0
pub const DEFAULT_BUILD_DIR: &str = ".pio/build/adafruit_feather_m0";
/// The substring that identifies the bootloader volume by name
pub const DEFAULT_VOLUME_MARKER: &str = "FEATHERBOOT";
/// The file every UF2 bootloader exposes at the root of its volume
pub const DEFAULT_MARKER_FILE: &str = "INFO_UF2.TXT";
/// The file name the bootloader picks up a new image from
pub const DEFAULT_TARGET_NAME: &str = "NEW.UF2";
/// How long to wait before writing to a freshly mounted volume
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);
/// Flash offset of the application, right after the 8 KiB bootloader
pub const DEFAULT_BASE_ADDRESS: u32 = 0x2000;

/// How to enumerate volumes on the host
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Scheme {
    /// Pick based on the host operating system
    Auto,
    /// Scan a directory that volumes get mounted under
    MountRoot,
    /// Check every logical drive letter for the marker file
    DriveLetters,
}

impl Scheme {
    /// Resolves `Auto` to the scheme used by the host operating system
    pub fn resolve(self) -> Scheme {
        match self {
            Scheme::Auto if cfg!(windows) => Scheme::DriveLetters,
            Scheme::Auto => Scheme::MountRoot,
            scheme => scheme,
        }
    }
}

impl Default for Scheme {
    fn default() -> Scheme {
        Scheme::Auto
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Scheme::Auto),
            "mount-root" => Ok(Scheme::MountRoot),
            "drive-letters" => Ok(Scheme::DriveLetters),
            other => Err(format!(
                "unknown scheme '{}', expected auto, mount-root or drive-letters",
                other
            )),
        }
    }
}

/// Settings for invoking the external UF2 conversion tool
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ConverterConfig {
    /// The program used to run the conversion script
    pub interpreter: String,
    /// Path to `uf2conv.py`
    pub script: PathBuf,
    /// The flash address the image is linked for
    pub base_address: u32,
}

impl Default for ConverterConfig {
    fn default() -> ConverterConfig {
        ConverterConfig {
            interpreter: "python3".to_owned(),
            script: PathBuf::from("uf2conv.py"),
            base_address: DEFAULT_BASE_ADDRESS,
        }
    }
}

/// Everything a flashing run needs to know about the host and the board
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing `firmware.bin` and `firmware.uf2`
    pub build_dir: PathBuf,
    /// Explicit image to upload instead of `firmware.uf2` in the build dir
    pub image: Option<PathBuf>,
    pub scheme: Scheme,
    /// Directory scanned by the mount root scheme
    pub mount_root: PathBuf,
    /// Case-insensitive substring of the bootloader volume name
    pub volume_marker: String,
    /// File that marks a drive as a UF2 bootloader volume
    pub marker_file: String,
    pub converter: ConverterConfig,
    pub deploy: DeployOptions,
}

impl Config {
    /// The path of the UF2 image that gets uploaded
    pub fn image_path(&self) -> PathBuf {
        self.image
            .clone()
            .unwrap_or_else(|| self.build_dir.join("firmware.uf2"))
    }

    /// The path of the raw binary produced by the build
    pub fn binary_path(&self) -> PathBuf {
        self.build_dir.join("firmware.bin")
    }

    /// The path the converter writes the UF2 image to
    pub fn uf2_output_path(&self) -> PathBuf {
        self.build_dir.join("firmware.uf2")
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            build_dir: PathBuf::from(DEFAULT_BUILD_DIR),
            image: None,
            scheme: Scheme::default(),
            mount_root: default_mount_root(),
            volume_marker: DEFAULT_VOLUME_MARKER.to_owned(),
            marker_file: DEFAULT_MARKER_FILE.to_owned(),
            converter: ConverterConfig::default(),
            deploy: DeployOptions::default(),
        }
    }
}

/// Returns the directory removable volumes are mounted under on this host
pub fn default_mount_root() -> PathBuf {
    if cfg!(target_os = "macos") {
        PathBuf::from("/Volumes")
    } else if cfg!(target_os = "linux") {
        match env::var("USER") {
            Ok(user) if !user.is_empty() => PathBuf::from("/media").join(user),
            _ => PathBuf::from("/media"),
        }
    } else {
        PathBuf::from("/mnt")
    }
}

/// Parses a number as hex when prefixed with `0x`, decimal otherwise
pub fn parse_address(s: &str) -> Result<u32, String> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|err| format!("invalid address '{}': {}", s, err))
}
