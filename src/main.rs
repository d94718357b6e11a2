use std::io::{self, Write};

use structopt::StructOpt;

use featherboot::{volume, Config, LocateError, Outcome, VOLUME_NOT_FOUND_HINT};

mod cli;

use cli::{Command, ConvertOpts};

/// Prints the result of a flashing attempt
fn report<W: Write>(out: &mut W, outcome: &Outcome) -> io::Result<()> {
    match outcome {
        Outcome::Deployed { volume, bytes } => writeln!(
            out,
            "[SUCCESS] UF2 file uploaded to {} ({} bytes). Board should reboot.",
            volume.root().display(),
            bytes
        ),
        Outcome::VolumeNotFound { hint } => {
            if let Some(hint) = hint {
                writeln!(out, "[HINT] {}", hint)?;
            }

            writeln!(
                out,
                "[WARNING] Bootloader volume not found. {}",
                VOLUME_NOT_FOUND_HINT
            )
        }
    }
}

/// Prints an error that ended the run, followed by a hint on how to recover if there is one
fn report_error<W: Write>(out: &mut W, err: &anyhow::Error) -> io::Result<()> {
    writeln!(out, "[ERROR] {}", err)?;

    if let Some(hint) = err
        .downcast_ref::<featherboot::Error>()
        .and_then(featherboot::Error::hint)
    {
        writeln!(out, "[HINT] {}", hint)?;
    }

    Ok(())
}

fn find<W: Write>(out: &mut W, config: &Config) -> Result<(), anyhow::Error> {
    match featherboot::find_bootloader_volume(config) {
        Ok(Some(volume)) => writeln!(out, "{}", volume.root().display())?,
        Ok(None) => report(out, &Outcome::VolumeNotFound { hint: None })?,
        Err(LocateError::CapabilityUnavailable { hint, .. }) => {
            report(out, &Outcome::VolumeNotFound { hint: Some(hint) })?
        }
        Err(err) => return Err(featherboot::Error::from(err).into()),
    }

    Ok(())
}

fn run<W: Write>(out: &mut W, opts: &cli::Opts) -> Result<(), anyhow::Error> {
    let config = opts.to_config();
    let locator = volume::host_locator(&config);

    match &opts.command {
        Command::Upload(_) => {
            writeln!(out, "Looking for {}", config.image_path().display())?;

            report(out, &featherboot::upload(&config, &locator)?)?;
        }
        Command::Convert(ConvertOpts { no_upload: true, .. }) => {
            let output = featherboot::convert::create_uf2(
                &config.converter,
                &config.binary_path(),
                &config.uf2_output_path(),
            )?;

            writeln!(out, "[SUCCESS] UF2 file created: {}", output.display())?;
        }
        Command::Convert(_) => {
            writeln!(out, "Converting {} to UF2", config.binary_path().display())?;

            report(out, &featherboot::convert_and_upload(&config, &locator)?)?;
        }
        Command::Find => find(out, &config)?,
    }

    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    // Create a logger with a timestamp, filtered by RUST_LOG
    pretty_env_logger::init_timed();

    // Parse the command-line arguments
    let opts = cli::Opts::from_args();

    // Every outcome is reported on the console; the exit status stays 0 so the user can simply
    // put the board in bootloader mode and run again
    if let Err(err) = run(&mut io::stdout(), &opts) {
        report_error(&mut io::stderr(), &err)?;
    }

    Ok(())
}
