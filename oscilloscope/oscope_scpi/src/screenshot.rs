//! Naming and writing of screenshot files.
//!
//! Screenshots are named `{MODEL}_screenshot_{YYYYMMDD}_{HHMM}.png`, where the model is taken
//! from the `*IDN?` response of the oscilloscope. The timestamp is passed in by the caller, so
//! names are reproducible.

use std::{
    fs,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use log::{debug, info};

use crate::{Identification, ScopeError};

/// Format of the timestamp in screenshot filenames.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";

/// Make a model name safe for use in a filename.
///
/// Spaces and slashes become underscores. Of the rest, only ASCII letters, digits, `-` and `_`
/// are kept.
pub fn sanitize_model(model: &str) -> String {
    model
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '_',
            c => c,
        })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
        .collect()
}

/// Extract the sanitized model from an `*IDN?` response.
///
/// ```
/// use oscope_scpi::model_token;
///
/// let idn = "AGILENT TECHNOLOGIES,DSO-X 3034A,MY12345678,02.50";
/// assert_eq!(model_token(idn).unwrap(), "DSO-X_3034A");
/// ```
pub fn model_token(idn: &str) -> Result<String, ScopeError> {
    Identification::parse(idn)?.model_token()
}

/// Build the screenshot filename from a model token and a timestamp.
pub fn screenshot_filename(model: &str, timestamp: &NaiveDateTime) -> String {
    format!(
        "{model}_screenshot_{}.png",
        timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Decide where a screenshot goes, given the user's output argument.
///
/// - An empty output puts the generated filename into the current directory.
/// - An existing directory, or an output ending in a path separator, gets the generated
///   filename joined to it.
/// - An output whose last component contains a `.`, but does not end in one, is taken verbatim
///   as file path.
/// - An output whose parent directory exists is taken verbatim as file path.
/// - Anything else is taken as a directory to create, and gets the generated filename joined.
pub fn resolve_output_path(output: &str, filename: &str) -> PathBuf {
    if output.is_empty() {
        return PathBuf::from(filename);
    }

    let path = Path::new(output);
    if path.is_dir() || output.ends_with(['/', '\\']) {
        return path.join(filename);
    }

    let has_extension = path
        .file_name()
        .and_then(|leaf| leaf.to_str())
        .is_some_and(|leaf| leaf.contains('.') && !leaf.ends_with('.'));
    let parent_exists = match path.parent() {
        Some(parent) if parent.as_os_str().is_empty() => true,
        Some(parent) => parent.is_dir(),
        None => false,
    };
    if has_extension || parent_exists {
        path.to_path_buf()
    } else {
        path.join(filename)
    }
}

/// The full path of a screenshot for an `*IDN?` response, output argument, and timestamp.
pub fn screenshot_path(
    idn: &str,
    output: &str,
    timestamp: &NaiveDateTime,
) -> Result<PathBuf, ScopeError> {
    let filename = screenshot_filename(&model_token(idn)?, timestamp);
    Ok(resolve_output_path(output, &filename))
}

/// Write screenshot data to a file, creating missing parent directories.
pub fn write_screenshot(path: &Path, data: &[u8]) -> Result<(), ScopeError> {
    if let Some(parent) = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty() && !p.is_dir())
    {
        debug!("Creating directory {}", parent.display());
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)?;
    info!("Wrote {} bytes to {}", data.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_model() {
        assert_eq!(sanitize_model(" DSO-X 3034A "), "DSO-X_3034A");
        assert_eq!(sanitize_model("MSO/X 4*54"), "MSO_X_454");
        assert_eq!(sanitize_model("..."), "");
    }

    #[test]
    fn test_resolve_output_path_empty() {
        assert_eq!(
            resolve_output_path("", "X_screenshot_20240101_0000.png"),
            PathBuf::from("X_screenshot_20240101_0000.png")
        );
    }

    #[test]
    fn test_resolve_output_path_trailing_separator() {
        assert_eq!(
            resolve_output_path("not/there/", "a.png"),
            PathBuf::from("not/there/a.png")
        );
    }
}
