//! Conversion of a raw binary into a UF2 image with the external `uf2conv.py` tool

use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use crate::config::ConverterConfig;
use crate::{Error, ToolError};

/// Builds the command line for converting `binary` into `output`
fn command(converter: &ConverterConfig, binary: &Path, output: &Path) -> Command {
    let mut command = Command::new(&converter.interpreter);

    command
        .arg(&converter.script)
        .arg("-c")
        .arg("-b")
        .arg(format!("{:#x}", converter.base_address))
        .arg("-o")
        .arg(output)
        .arg(binary);

    command
}

/// Converts `binary` to a UF2 image at `output` and returns the path of the image
///
/// Success is judged by the exit status of the tool and by whether `output` exists afterwards.
pub fn create_uf2(
    converter: &ConverterConfig,
    binary: &Path,
    output: &Path,
) -> Result<PathBuf, Error> {
    if !binary.is_file() {
        return Err(Error::ImageNotFound(binary.to_path_buf()));
    }

    let mut command = command(converter, binary, output);

    debug!("Running UF2 conversion: {:?}", command);

    let status = command
        .status()
        .map_err(|err| ToolError::Spawn(converter.interpreter.clone(), err))?;

    if !status.success() {
        return Err(ToolError::Failed(converter.script.display().to_string(), status).into());
    }

    if !output.is_file() {
        return Err(ToolError::MissingOutput(output.to_path_buf()).into());
    }

    Ok(output.to_path_buf())
}
