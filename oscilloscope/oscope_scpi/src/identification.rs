//! Parsing of `*IDN?` responses and detection of the oscilloscope series.

use std::fmt;

use crate::{ScopeError, screenshot::sanitize_model};

/// The fields of an `*IDN?` response, e.g.,
/// `KEYSIGHT TECHNOLOGIES,MSOX4254A,MY56310625,06.50.0001`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    /// Manufacturer, first field.
    pub manufacturer: String,
    /// Model, second field.
    pub model: String,
    /// Serial number, third field. Empty if not sent.
    pub serial: String,
    /// Firmware version, fourth field. Empty if not sent.
    pub firmware: String,
}

impl Identification {
    /// Parse an identification string.
    ///
    /// Fields are split at commas and trimmed. Only the model field is required: it must be
    /// present and not blank, otherwise a [`ScopeError::IdnParse`] is returned.
    pub fn parse(idn: &str) -> Result<Self, ScopeError> {
        let mut fields = idn.split(',').map(str::trim);
        let manufacturer = fields.next().unwrap_or_default().to_string();
        let model = fields
            .next()
            .filter(|model| !model.is_empty())
            .ok_or_else(|| ScopeError::IdnParse {
                field: "model",
                idn: idn.to_string(),
            })?
            .to_string();
        let serial = fields.next().unwrap_or_default().to_string();
        let firmware = fields.next().unwrap_or_default().to_string();

        Ok(Identification {
            manufacturer,
            model,
            serial,
            firmware,
        })
    }

    /// The model, sanitized for use in a filename.
    ///
    /// Returns a [`ScopeError::IdnParse`] if nothing remains after sanitizing.
    pub fn model_token(&self) -> Result<String, ScopeError> {
        let token = sanitize_model(&self.model);
        if token.is_empty() {
            return Err(ScopeError::IdnParse {
                field: "model",
                idn: self.to_string(),
            });
        }
        Ok(token)
    }

    /// The oscilloscope series this identification belongs to.
    pub fn series(&self) -> Series {
        Series::detect(&self.manufacturer, &self.model)
    }
}

impl fmt::Display for Identification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.manufacturer, self.model, self.serial, self.firmware
        )
    }
}

/// Oscilloscope families that differ in how a screenshot is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Series {
    /// Keysight / Agilent InfiniiVision, e.g., DSO-X 3034A or MSOX4254A.
    InfiniiVision,
    /// Keysight Infiniium, e.g., MXR, UXR, or EXR models.
    Infiniium,
    /// Rigol DHO models.
    RigolDho,
    /// Any other Rigol oscilloscope.
    Rigol,
    /// Unknown oscilloscope that hopefully understands the common screenshot query.
    Generic,
}

impl Series {
    /// Detect the series from manufacturer and model.
    pub fn detect(manufacturer: &str, model: &str) -> Self {
        let model: String = model
            .chars()
            .filter(|c| !matches!(c, '-' | ' '))
            .collect::<String>()
            .to_uppercase();
        let manufacturer = manufacturer.to_uppercase();

        if model.starts_with("DSOX") || model.starts_with("MSOX") {
            Series::InfiniiVision
        } else if ["MXR", "UXR", "EXR"].iter().any(|p| model.starts_with(p)) {
            Series::Infiniium
        } else if model.starts_with("DHO") {
            Series::RigolDho
        } else if manufacturer.contains("RIGOL") {
            Series::Rigol
        } else {
            Series::Generic
        }
    }

    /// Commands to send before the screenshot query.
    pub fn hardcopy_setup(&self) -> &'static [&'static str] {
        match self {
            Series::InfiniiVision => &[":HARDcopy:INKSaver OFF"],
            _ => &[],
        }
    }

    /// Query that makes the oscilloscope answer with a PNG in a binary block.
    pub fn hardcopy_query(&self) -> &'static str {
        match self {
            Series::InfiniiVision => ":DISPlay:DATA? PNG,COLor",
            Series::Infiniium => ":DISPlay:DATA? PNG,SCReen,ON,NORMal",
            Series::RigolDho | Series::Rigol | Series::Generic => ":DISPlay:DATA? PNG",
        }
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Series::InfiniiVision => "InfiniiVision",
            Series::Infiniium => "Infiniium",
            Series::RigolDho => "Rigol DHO",
            Series::Rigol => "Rigol",
            Series::Generic => "generic",
        };
        write!(f, "{name}")
    }
}
