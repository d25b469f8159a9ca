//! List USBTMC devices and show which oscilloscope would be connected to.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use oscope_scpi::{
    ConnectionConfig, Oscilloscope, ResourceScanner, UsbScanner, find_oscilloscope,
    resolve_resource,
};

/// Detect oscilloscopes and show their identification.
///
/// The resource address is taken from the argument, the OSCOPE_IP environment variable, or found
/// by scanning the USB bus, in this order.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Resource address to use instead of the environment or auto-detection
    resource: Option<String>,

    /// Do not scan the USB bus for oscilloscopes
    #[arg(long)]
    no_auto: bool,

    /// Timeout in seconds for connecting and for every transfer
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut resources = if args.no_auto {
        Vec::new()
    } else {
        UsbScanner
            .usb_resources()
            .context("Could not enumerate USB devices")?
    };

    println!("USBTMC devices found: {}", resources.len());
    let detected = find_oscilloscope(&resources).map(|(res, _)| res.address.clone());
    for res in &resources {
        let marker = if Some(&res.address) == detected.as_ref() {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {} ({}, {})",
            res.address,
            res.manufacturer.as_deref().unwrap_or("unknown manufacturer"),
            res.product.as_deref().unwrap_or("unknown product")
        );
    }

    let config = ConnectionConfig::from_env(args.resource).auto_detect(!args.no_auto);
    let resource = resolve_resource(&config, &mut resources)?;
    println!("Using resource: {resource}");

    let mut scope = Oscilloscope::open(&resource, Duration::from_secs(args.timeout))?;
    println!("Identification: {}", scope.get_name()?);
    println!("Series: {}", scope.series());
    println!("Model token: {}", scope.model_token()?);
    scope.close();
    Ok(())
}
