//! Resolution of the resource address to connect to.
//!
//! An address is picked from, in this order of priority:
//!
//! 1. An explicitly given resource.
//! 2. The `OSCOPE_IP` environment variable. The name is historical, it can hold any resource
//!    address.
//! 3. A scan of the USB bus for a known oscilloscope, if auto-detection is enabled.
//!
//! If several known oscilloscopes are connected via USB, the first one in enumeration order is
//! taken. This order depends on the operating system and is not guaranteed to be stable.

use log::{debug, info};
use scpirs::{InstrumentError, UsbResource};

use crate::ScopeError;

/// Environment variable that holds a resource address to use.
pub const RESOURCE_ENV_VAR: &str = "OSCOPE_IP";

/// Identity prefixes of known oscilloscopes and the vendor they belong to.
///
/// Prefixes are matched case-sensitively against the serial number, product, and manufacturer
/// strings of USB devices.
pub const KNOWN_SCOPES: &[(&str, &str)] = &[
    ("MY5", "Keysight"),
    ("DSO", "Keysight"),
    ("MSO", "Keysight"),
    ("MXR", "Keysight"),
    ("UXR", "Keysight"),
    ("EXR", "Keysight"),
    ("RIGOL", "Rigol"),
    ("DHO", "Rigol"),
    ("AGILENT", "Agilent"),
    ("KEYSIGHT", "Keysight"),
];

/// Configuration of how to find the oscilloscope to connect to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Explicitly given resource address. Has the highest priority.
    pub resource: Option<String>,
    /// Resource address from the environment.
    pub env_resource: Option<String>,
    /// Scan the USB bus if no resource address is given.
    pub auto_detect: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            resource: None,
            env_resource: None,
            auto_detect: true,
        }
    }
}

impl ConnectionConfig {
    /// Create a configuration with an optional explicit resource and auto-detection enabled.
    pub fn new(resource: Option<String>) -> Self {
        ConnectionConfig {
            resource,
            ..Default::default()
        }
    }

    /// Create a configuration with an optional explicit resource, and the environment resource
    /// read from [`RESOURCE_ENV_VAR`].
    pub fn from_env(resource: Option<String>) -> Self {
        ConnectionConfig {
            resource,
            env_resource: std::env::var(RESOURCE_ENV_VAR).ok(),
            auto_detect: true,
        }
    }

    /// Enable or disable auto-detection.
    pub fn auto_detect(mut self, enabled: bool) -> Self {
        self.auto_detect = enabled;
        self
    }
}

/// Source of USB resources to auto-detect oscilloscopes from.
pub trait ResourceScanner {
    /// List the USB resources that are currently available.
    fn usb_resources(&mut self) -> Result<Vec<UsbResource>, InstrumentError>;
}

/// Scanner that enumerates the USBTMC devices on the USB bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct UsbScanner;

impl ResourceScanner for UsbScanner {
    fn usb_resources(&mut self) -> Result<Vec<UsbResource>, InstrumentError> {
        scpirs::list_usb_resources()
    }
}

impl ResourceScanner for Vec<UsbResource> {
    fn usb_resources(&mut self) -> Result<Vec<UsbResource>, InstrumentError> {
        Ok(self.clone())
    }
}

impl ResourceScanner for [UsbResource] {
    fn usb_resources(&mut self) -> Result<Vec<UsbResource>, InstrumentError> {
        Ok(self.to_vec())
    }
}

/// Check an identity string against the known oscilloscope prefixes.
///
/// Returns the vendor of the first matching prefix, or `None` if no prefix matches.
pub fn match_known_scope(identity: &str) -> Option<&'static str> {
    KNOWN_SCOPES
        .iter()
        .find(|(prefix, _)| identity.starts_with(prefix))
        .map(|(_, vendor)| *vendor)
}

/// Find the first resource that is a known oscilloscope, together with its vendor.
pub fn find_oscilloscope(resources: &[UsbResource]) -> Option<(&UsbResource, &'static str)> {
    resources.iter().find_map(|res| {
        res.identities()
            .into_iter()
            .find_map(match_known_scope)
            .map(|vendor| (res, vendor))
    })
}

/// Resolve the resource address to connect to.
///
/// The explicit resource wins over the environment resource, which wins over auto-detection.
/// Empty strings count as not given, any other value is returned unchanged. The USB bus is only
/// scanned if neither resource is given and auto-detection is enabled. Nothing is cached between
/// calls.
///
/// # Arguments
/// * `config` - Where to look for the resource.
/// * `scanner` - Source of USB resources for auto-detection.
pub fn resolve_resource<S: ResourceScanner + ?Sized>(
    config: &ConnectionConfig,
    scanner: &mut S,
) -> Result<String, ScopeError> {
    if let Some(resource) = non_empty(&config.resource) {
        info!("Using resource {resource}");
        return Ok(resource.to_string());
    }
    if let Some(resource) = non_empty(&config.env_resource) {
        info!("Using resource {resource} from {RESOURCE_ENV_VAR}");
        return Ok(resource.to_string());
    }
    if !config.auto_detect {
        return Err(ScopeError::NoResourceSpecified);
    }

    let resources = scanner.usb_resources()?;
    debug!("Found {} USB resources", resources.len());
    match find_oscilloscope(&resources) {
        Some((res, vendor)) => {
            info!("Auto-detected {vendor} oscilloscope at {}", res.address);
            Ok(res.address.clone())
        }
        None => Err(ScopeError::NoUsbOscilloscope),
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
