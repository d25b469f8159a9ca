//! Errors of the oscilloscope driver.

use scpirs::InstrumentError;
use thiserror::Error;

/// The error enum for connecting to oscilloscopes and capturing screenshots.
///
/// Resolution errors are reported directly. Transport errors are wrapped from
/// [`InstrumentError`], and filesystem errors from [`std::io::Error`], such that all of them can
/// be propagated with the `?` operator.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ScopeError {
    /// Auto-detection did not find any USB resource that looks like a supported oscilloscope.
    #[error(
        "No USB oscilloscope found. Connect one via USB or specify a resource address, e.g., with the OSCOPE_IP environment variable."
    )]
    NoUsbOscilloscope,
    /// Neither an explicit nor an environment resource was given, and auto-detection is disabled.
    #[error(
        "No resource specified. Give a resource address, set OSCOPE_IP, or enable auto-detection."
    )]
    NoResourceSpecified,
    /// The identification string of the instrument misses an expected field.
    #[error("Identification string is missing the {field} field. Response was: '{idn}'")]
    IdnParse {
        /// Name of the field that could not be extracted.
        field: &'static str,
        /// The identification string as received.
        idn: String,
    },
    /// Errors from talking to the instrument. See [`InstrumentError`] for more details.
    #[error(transparent)]
    Instrument(#[from] InstrumentError),
    /// Errors when writing files. See [`std::io::Error`] for more details.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
