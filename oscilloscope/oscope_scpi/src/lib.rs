//! oscope-scpi: Screenshots from SCPI oscilloscopes
//!
//! This crate connects to Keysight, Agilent, and Rigol oscilloscopes via [`scpirs`] and saves
//! screenshots of their displays as PNG files.
//!
//! The resource address to connect to is picked by [`resolve_resource`] from an explicit address,
//! the `OSCOPE_IP` environment variable, or by scanning the USB bus for a known oscilloscope.
//! Screenshot files are named `{MODEL}_screenshot_{YYYYMMDD}_{HHMM}.png`.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use oscope_scpi::{ConnectionConfig, Oscilloscope, UsbScanner};
//!
//! let config = ConnectionConfig::new(Some("USB0::0x0957::0x17BC::MY56310625::INSTR".into()));
//! let mut scope = Oscilloscope::connect(&config, &mut UsbScanner, Duration::from_secs(10)).unwrap();
//! println!("Connected to {}", scope.identification());
//!
//! let now = chrono::Local::now().naive_local();
//! scope.save_screenshot("screenshots/", &now).unwrap();
//! ```
//!
//! Two command line tools are included: `oscope-screenshot` captures a screenshot, and
//! `oscope-detect` shows which oscilloscope would be used.

#![warn(missing_docs)]

mod error;
mod identification;
pub mod resolver;
pub mod screenshot;
mod scope;

pub use error::ScopeError;
pub use identification::{Identification, Series};
pub use resolver::{
    ConnectionConfig, KNOWN_SCOPES, RESOURCE_ENV_VAR, ResourceScanner, UsbScanner,
    find_oscilloscope, match_known_scope, resolve_resource,
};
pub use scope::{DynInterface, Oscilloscope};
pub use screenshot::{
    model_token, resolve_output_path, screenshot_filename, screenshot_path, write_screenshot,
};
