//! The oscilloscope driver.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::NaiveDateTime;
use log::{debug, info};
use scpirs::{InstrumentInterface, open_resource};

use crate::{
    ConnectionConfig, Identification, ResourceScanner, ScopeError, Series, resolve_resource,
    screenshot::{resolve_output_path, screenshot_filename, write_screenshot},
};

/// Boxed interface as returned by [`open_resource`].
pub type DynInterface = Box<dyn InstrumentInterface + Send>;

/// A driver for SCPI oscilloscopes that can take screenshots.
///
/// The oscilloscope is identified with `*IDN?` when the driver is created. The series detected
/// from the identification decides which commands are used to request a screenshot.
///
/// Clones share the same session. The session is released when the last clone is dropped, or
/// explicitly with [`Oscilloscope::close`].
///
/// # Example
/// ```no_run
/// use std::time::Duration;
///
/// use oscope_scpi::{ConnectionConfig, Oscilloscope, UsbScanner};
///
/// let config = ConnectionConfig::from_env(None);
/// let mut scope = Oscilloscope::connect(&config, &mut UsbScanner, Duration::from_secs(10)).unwrap();
/// let now = chrono::Local::now().naive_local();
/// let path = scope.save_screenshot("", &now).unwrap();
/// println!("Saved {}", path.display());
/// ```
pub struct Oscilloscope<T: InstrumentInterface> {
    /// The [`InstrumentInterface`] to communicate with the instrument.
    interface: Arc<Mutex<T>>,
    /// Identification as read when connecting.
    idn: Identification,
    series: Series,
}

impl<T: InstrumentInterface> Clone for Oscilloscope<T> {
    fn clone(&self) -> Self {
        Oscilloscope {
            interface: Arc::clone(&self.interface),
            idn: self.idn.clone(),
            series: self.series,
        }
    }
}

impl Oscilloscope<DynInterface> {
    /// Open the oscilloscope at the given resource address.
    ///
    /// # Arguments
    /// * `resource` - A resource address, e.g., `TCPIP0::192.168.1.100::INSTR`.
    /// * `timeout` - Timeout for connecting and every transfer afterwards.
    pub fn open(resource: &str, timeout: Duration) -> Result<Self, ScopeError> {
        info!("Opening oscilloscope at {resource}");
        let interface = open_resource(resource, timeout)?;
        Self::try_new(interface)
    }

    /// Resolve the resource address from the configuration and open the oscilloscope there.
    ///
    /// See [`resolve_resource`] for how the address is picked.
    pub fn connect<S: ResourceScanner + ?Sized>(
        config: &ConnectionConfig,
        scanner: &mut S,
        timeout: Duration,
    ) -> Result<Self, ScopeError> {
        let resource = resolve_resource(config, scanner)?;
        Self::open(&resource, timeout)
    }
}

impl<T: InstrumentInterface> Oscilloscope<T> {
    /// Create a new oscilloscope driver on the given interface.
    ///
    /// Sets the terminator to `"\n"` and identifies the instrument.
    ///
    /// # Arguments
    /// * `interface` - An instrument interface that implements the [`InstrumentInterface`] trait.
    pub fn try_new(mut interface: T) -> Result<Self, ScopeError> {
        interface.set_terminator("\n");
        let response = interface.query("*IDN?")?;
        let idn = Identification::parse(&response)?;
        let series = idn.series();
        info!("Connected to: {response}");
        debug!("Detected {series} series");

        Ok(Oscilloscope {
            interface: Arc::new(Mutex::new(interface)),
            idn,
            series,
        })
    }

    /// Query the name of the instrument, i.e., the raw `*IDN?` response.
    pub fn get_name(&mut self) -> Result<String, ScopeError> {
        Ok(self.lock().query("*IDN?")?)
    }

    /// Identification that was read when connecting.
    pub fn identification(&self) -> &Identification {
        &self.idn
    }

    /// Detected oscilloscope series.
    pub fn series(&self) -> Series {
        self.series
    }

    /// Model of the instrument, sanitized for use in filenames.
    pub fn model_token(&self) -> Result<String, ScopeError> {
        self.idn.model_token()
    }

    /// Request a screenshot and return the PNG data.
    pub fn hardcopy(&mut self) -> Result<Vec<u8>, ScopeError> {
        let mut intf = self.lock();
        for cmd in self.series.hardcopy_setup() {
            intf.sendcmd(cmd)?;
        }
        intf.sendcmd(self.series.hardcopy_query())?;
        let data = intf.read_block()?;
        debug!("Received screenshot of {} bytes", data.len());
        Ok(data)
    }

    /// Capture a screenshot and save it.
    ///
    /// The file is named after the model and the given timestamp, unless `output` names a file.
    /// See [`resolve_output_path`] for how `output` is interpreted. Missing directories are
    /// created. Returns the path the screenshot was saved to.
    ///
    /// # Arguments
    /// * `output` - Directory or file path, or an empty string for the current directory.
    /// * `timestamp` - Timestamp for the filename.
    pub fn save_screenshot(
        &mut self,
        output: &str,
        timestamp: &NaiveDateTime,
    ) -> Result<PathBuf, ScopeError> {
        let filename = screenshot_filename(&self.model_token()?, timestamp);
        let path = resolve_output_path(output, &filename);
        let data = self.hardcopy()?;
        write_screenshot(&path, &data)?;
        Ok(path)
    }

    /// Close the session to the oscilloscope.
    pub fn close(self) {
        debug!("Closing connection to {}", self.idn.model);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, T> {
        self.interface.lock().expect("Mutex should not be poisoned")
    }
}
