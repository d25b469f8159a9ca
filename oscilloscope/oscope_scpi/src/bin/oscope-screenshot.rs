//! Capture a screenshot from an oscilloscope via SCPI commands.

use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use log::debug;

use oscope_scpi::{ConnectionConfig, Oscilloscope, ScopeError, UsbScanner};

const EXAMPLES: &str = "\
Examples:
  oscope-screenshot \"USB0::0x0957::0x17BC::MY56310625::INSTR\"
  oscope-screenshot \"TCPIP0::192.168.1.100::INSTR\" screenshots/
  oscope-screenshot \"USB0::0x0957::0x17BC::MY56310625::INSTR\" /tmp/my_screenshot.png";

/// Capture a screenshot from an oscilloscope via SCPI commands.
///
/// The screenshot is saved as {MODEL}_screenshot_{YYYYMMDD}_{HHMM}.png unless a file path with
/// an extension is given.
#[derive(Debug, Parser)]
#[command(version, about, after_help = EXAMPLES)]
struct Args {
    /// Resource address of the oscilloscope, e.g., "USB0::0x0957::0x17BC::MY56310625::INSTR".
    /// An empty address falls back to OSCOPE_IP and USB auto-detection.
    device_address: String,

    /// Output directory or file path for the screenshot (default: current directory)
    #[arg(default_value = "")]
    output_path: String,

    /// Timeout in seconds for connecting and for every transfer
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(path) => {
            println!("Screenshot saved successfully: {}", path.display());
            ExitCode::SUCCESS
        }
        Err(err) => {
            debug!("{err:?}");
            eprintln!("{}", describe_failure(&err, &args.device_address));
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> anyhow::Result<PathBuf> {
    println!("Connecting to oscilloscope at: {}", args.device_address);
    let config = ConnectionConfig::from_env(Some(args.device_address.clone()));
    let mut scope = Oscilloscope::connect(
        &config,
        &mut UsbScanner,
        Duration::from_secs(args.timeout),
    )?;
    println!("Connected to: {}", scope.identification());
    println!("Device model: {}", scope.model_token()?);

    let timestamp = Local::now().naive_local();
    let path = scope
        .save_screenshot(&args.output_path, &timestamp)
        .context("Could not capture the screenshot")?;
    scope.close();
    Ok(path)
}

/// Turn an error into a message that tells the user what to check.
fn describe_failure(err: &anyhow::Error, address: &str) -> String {
    let instrument_err = err
        .chain()
        .find_map(|cause| match cause.downcast_ref::<ScopeError>() {
            Some(ScopeError::Instrument(inst_err)) => Some(inst_err),
            _ => None,
        });

    match instrument_err {
        Some(e) if e.is_not_found() => format!(
            "Error: Could not find oscilloscope at address '{address}'\n\
             Please check the device address and ensure the device is connected and powered on."
        ),
        Some(e) if e.is_permission_denied() => format!(
            "Error: Permission denied accessing device '{address}'\n\
             You may need to run with elevated privileges or add your user to the appropriate group."
        ),
        Some(e) if e.is_timeout() => format!(
            "Error: Timeout communicating with device '{address}'\n\
             The device may be busy or not responding. Try again or increase --timeout."
        ),
        _ => format!("Error capturing screenshot: {err:#}"),
    }
}
