//! Loopback interface for instrument drivers that receive binary data from the instrument.
//!
//! Oscilloscopes answer screenshot and waveform queries with IEEE 488.2 binary blocks, which can
//! contain any byte including the terminator. This interface replays such responses byte by
//! byte.

use crate::{InstrumentError, InstrumentInterface, loopback::Conversation};

/// A loopback interface that checks raw bytes from the host and replays raw bytes from the
/// instrument.
///
/// The main purpose of this interface is to test drivers that read binary data. You provide the
/// bytes that are expected to go from the host to the instrument, including terminators, and the
/// bytes that the instrument sends back. Both are consumed in order. Whenever something is sent
/// to the instrument that is not expected, the [`LoopbackInterfaceBytes`] panics. It panics as
/// well if any bytes are left over when it is dropped.
///
/// The terminator is fixed to the default `"\n"`.
///
/// ```
/// use scpirs::{InstrumentInterface, LoopbackInterfaceBytes};
///
/// let mut lbk = LoopbackInterfaceBytes::new(
///     vec![b":DISPlay:DATA? PNG\n".to_vec()],
///     vec![b"#14\x89PNG\n".to_vec()],
/// );
/// lbk.sendcmd(":DISPlay:DATA? PNG").unwrap();
/// assert_eq!(lbk.read_block().unwrap(), b"\x89PNG");
/// ```
pub struct LoopbackInterfaceBytes {
    conversation: Conversation<Vec<u8>>,
}

impl LoopbackInterfaceBytes {
    /// Create a new loopback instrument with given bytes to and from instrument.
    ///
    /// # Arguments:
    /// * `from_host` - Vector of vectors for command bytes from host to instrument.
    /// * `from_inst` - Vector of vectors for response bytes from instrument to host.
    pub fn new(from_host: Vec<Vec<u8>>, from_inst: Vec<Vec<u8>>) -> Self {
        LoopbackInterfaceBytes {
            conversation: Conversation::new(from_host, from_inst),
        }
    }

    /// This command panics if not all bytes in the [`LoopbackInterfaceBytes`] have been used.
    ///
    /// It is automatically called when the [`LoopbackInterfaceBytes`] is dropped, but you can
    /// also call it manually.
    pub fn finalize(&mut self) {
        self.conversation.finalize();
    }
}

impl InstrumentInterface for LoopbackInterfaceBytes {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), InstrumentError> {
        for byte in buf.iter_mut() {
            *byte = self.conversation.read_one_byte(|resp| resp);
        }
        Ok(())
    }

    fn write_raw(&mut self, cmd: &[u8]) -> Result<(), InstrumentError> {
        let exp = self.conversation.next_from_host();
        assert_eq!(
            exp.as_slice(),
            cmd,
            "Expected bytes '{:?}', got '{:?}'",
            String::from_utf8_lossy(&exp),
            String::from_utf8_lossy(cmd)
        );
        Ok(())
    }
}

impl Drop for LoopbackInterfaceBytes {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            self.finalize();
        }
    }
}
