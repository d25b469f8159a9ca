//! Loopback interface implemented for testing instruments that communicate by sending strings.
//!
//! End-of-command is in these cases always determined by a terminator string, usually `"\n"` for
//! SCPI instruments.

use crate::{InstrumentError, InstrumentInterface, loopback::Conversation};

/// An interface that allows you to simply write tests for your instrument driver.
///
/// # Example
///
/// Let us build a simple instrument that sends a `"*IDN?"` command and gets back a string, and
/// then write a test for it using the [`LoopbackInterfaceString`]. The instrument itself takes
/// any interface that implements the [`InstrumentInterface`] trait.
///
/// ```
/// use scpirs::{InstrumentError, InstrumentInterface, LoopbackInterfaceString};
///
/// struct MyScope<T: InstrumentInterface> {
///     interface: T,
/// }
///
/// impl<T: InstrumentInterface> MyScope<T> {
///     fn get_name(&mut self) -> Result<String, InstrumentError> {
///         self.interface.query("*IDN?")
///     }
/// }
///
/// let host2inst = vec!["*IDN?".to_string()];
/// let inst2host = vec!["KEYSIGHT TECHNOLOGIES,MSOX4254A,MY56310625,06.50.0001".to_string()];
///
/// // Create the loopback interface with the expected commands and the expected terminator.
/// let loopback = LoopbackInterfaceString::new(host2inst, inst2host, "\n");
///
/// let mut scope = MyScope { interface: loopback };
/// assert_eq!(
///     "KEYSIGHT TECHNOLOGIES,MSOX4254A,MY56310625,06.50.0001",
///     scope.get_name().unwrap()
/// );
///
/// // All commands were used, so dropping the loopback interface does not panic.
/// ```
///
/// If the driver sends a command that is not the next expected one, or if commands or responses
/// are left over when the interface is dropped, the test panics.
pub struct LoopbackInterfaceString {
    conversation: Conversation<String>,
    terminator_exp: String,
    terminator: String,
}

impl LoopbackInterfaceString {
    /// Create a new loopback instrument with given commands to and from instrument.
    ///
    /// Commands are given without the terminator. Commands from the host are checked to end
    /// with `terminator_exp`, and responses from the instrument have it appended.
    ///
    /// # Arguments:
    /// * `from_host` - Commands from host to instrument.
    /// * `from_inst` - Responses from instrument to host.
    /// * `terminator_exp` - The terminator that the driver is expected to set.
    pub fn new(from_host: Vec<String>, from_inst: Vec<String>, terminator_exp: &str) -> Self {
        LoopbackInterfaceString {
            conversation: Conversation::new(from_host, from_inst),
            terminator_exp: terminator_exp.to_string(),
            terminator: "\n".to_string(), // default terminator, as all interfaces
        }
    }

    /// This command panics if not all commands in the [`LoopbackInterfaceString`] have been used.
    ///
    /// It is automatically called when the [`LoopbackInterfaceString`] is dropped, but you can
    /// also call it manually.
    pub fn finalize(&mut self) {
        self.conversation.finalize();
    }

    /// Assert that the terminator currently set on the interface is the expected one.
    pub fn test_terminator(&self, expected_terminator: &str) {
        assert_eq!(
            expected_terminator, self.terminator,
            "Expected terminator '{expected_terminator:?}', got '{:?}'",
            self.terminator
        );
    }
}

impl InstrumentInterface for LoopbackInterfaceString {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        let terminator = self.terminator_exp.as_str();
        for byte in buf.iter_mut() {
            *byte = self
                .conversation
                .read_one_byte(|resp| format!("{resp}{terminator}").into_bytes());
        }
        Ok(())
    }

    fn get_terminator(&self) -> &str {
        self.terminator.as_str()
    }

    fn set_terminator(&mut self, terminator: &str) {
        self.terminator = terminator.to_string();
    }

    fn write_raw(&mut self, cmd: &[u8]) -> Result<(), InstrumentError> {
        let exp = format!("{}{}", self.conversation.next_from_host(), self.terminator_exp);
        assert_eq!(
            exp.as_bytes(),
            cmd,
            "Expected sendcmd '{exp:?}', got '{:?}'",
            String::from_utf8_lossy(cmd)
        );
        Ok(())
    }
}

impl Drop for LoopbackInterfaceString {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.finalize();
        }
    }
}
