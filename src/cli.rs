use std::path::PathBuf;
use std::time::Duration;

use structopt::StructOpt;

use featherboot::config::{self, parse_address};
use featherboot::{Config, ConverterConfig, DeployOptions, Scheme};

#[derive(StructOpt, Debug)]
pub enum Command {
    /// Copy a UF2 image to the board in bootloader mode
    Upload(UploadOpts),
    /// Convert the built binary to UF2 with uf2conv.py, then upload it
    Convert(ConvertOpts),
    /// Print the path of the bootloader volume
    Find,
}

#[derive(StructOpt, Debug)]
pub struct UploadOpts {
    /// The UF2 image to upload, defaults to firmware.uf2 in the build directory
    pub image: Option<PathBuf>,
}

#[derive(StructOpt, Debug)]
pub struct ConvertOpts {
    /// Path to the uf2conv.py script
    #[structopt(env = "UF2_TOOL", long = "tool", default_value = "uf2conv.py")]
    pub tool: PathBuf,
    /// The program used to run the conversion script
    #[structopt(env = "UF2_INTERPRETER", long = "interpreter", default_value = "python3")]
    pub interpreter: String,
    /// The flash address the firmware is linked for
    #[structopt(
        short = "b",
        long = "base-address",
        default_value = "0x2000",
        parse(try_from_str = parse_address)
    )]
    pub base_address: u32,
    /// Only create the UF2 image
    #[structopt(long = "no-upload")]
    pub no_upload: bool,
}

#[derive(StructOpt, Debug)]
#[structopt(about = "Flashes UF2 firmware images onto boards in bootloader mode")]
pub struct Opts {
    #[structopt(subcommand)]
    pub command: Command,

    /// The directory the build writes firmware.bin to
    #[structopt(
        env = "BUILD_DIR",
        short = "d",
        long = "build-dir",
        default_value = config::DEFAULT_BUILD_DIR
    )]
    pub build_dir: PathBuf,
    /// How to enumerate volumes: auto, mount-root or drive-letters
    #[structopt(long = "scheme", default_value = "auto")]
    pub scheme: Scheme,
    /// The directory volumes are mounted under, defaults to the host's convention
    #[structopt(env = "MOUNT_ROOT", short = "m", long = "mount-root")]
    pub mount_root: Option<PathBuf>,
    /// Case-insensitive part of the bootloader volume name
    #[structopt(
        env = "VOLUME_MARKER",
        long = "volume-marker",
        default_value = config::DEFAULT_VOLUME_MARKER
    )]
    pub volume_marker: String,
    /// File identifying a drive as the bootloader volume
    #[structopt(long = "marker-file", default_value = config::DEFAULT_MARKER_FILE)]
    pub marker_file: String,
    /// The name of the file written to the bootloader volume
    #[structopt(long = "target-name", default_value = config::DEFAULT_TARGET_NAME)]
    pub target_name: String,
    /// Milliseconds to wait for the volume to finish mounting before writing
    #[structopt(long = "settle-ms", default_value = "2000")]
    pub settle_ms: u64,
    /// Fail if the number of bytes written differs from the image size
    #[structopt(long = "verify-size")]
    pub verify_size: bool,
}

impl Opts {
    /// Builds the runtime configuration from the command-line arguments
    pub fn to_config(&self) -> Config {
        let mut config = Config {
            build_dir: self.build_dir.clone(),
            scheme: self.scheme,
            volume_marker: self.volume_marker.clone(),
            marker_file: self.marker_file.clone(),
            deploy: DeployOptions {
                target_name: self.target_name.clone(),
                settle_delay: Duration::from_millis(self.settle_ms),
                verify_size: self.verify_size,
            },
            ..Config::default()
        };

        if let Some(mount_root) = &self.mount_root {
            config.mount_root = mount_root.clone();
        }

        match &self.command {
            Command::Upload(UploadOpts { image }) => config.image = image.clone(),
            Command::Convert(opts) => {
                config.converter = ConverterConfig {
                    interpreter: opts.interpreter.clone(),
                    script: opts.tool.clone(),
                    base_address: opts.base_address,
                }
            }
            Command::Find => {}
        }

        config
    }
}
