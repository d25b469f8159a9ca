//! The loopback module provides instrument simulators for testing purposes.
//!
//! The [`LoopbackInterfaceString`] allows to test drivers that talk plain SCPI, i.e., strings
//! with a fixed terminator at the end of each line. The [`LoopbackInterfaceBytes`] replays raw
//! bytes and is meant for responses that contain binary blocks, such as screenshots.
//!
//! Both interfaces panic as soon as the driver sends something that was not expected, and when
//! they are dropped with parts of the scripted conversation left unused.

mod loopback_interface_bytes;
mod loopback_interface_string;

pub use loopback_interface_bytes::LoopbackInterfaceBytes;
pub use loopback_interface_string::LoopbackInterfaceString;

use std::{collections::VecDeque, fmt::Debug};

/// A scripted conversation between host and instrument.
///
/// Messages in both directions are consumed in order. Bytes of messages from the instrument are
/// handed out one by one, as a real stream would.
#[derive(Debug)]
struct Conversation<T: Debug> {
    from_host: VecDeque<T>,
    from_inst: VecDeque<T>,
    curr_bytes: VecDeque<u8>,
}

impl<T: Debug> Conversation<T> {
    fn new(from_host: Vec<T>, from_inst: Vec<T>) -> Self {
        Conversation {
            from_host: from_host.into(),
            from_inst: from_inst.into(),
            curr_bytes: VecDeque::new(),
        }
    }

    /// Get the next message from host to instrument, or panic.
    fn next_from_host(&mut self) -> T {
        self.from_host
            .pop_front()
            .expect("No more commands were expected from host to instrument.")
    }

    /// Read one byte of the instrument's messages, or panic if there are none left.
    ///
    /// The `to_bytes` closure turns the next message into the bytes the instrument sends.
    fn read_one_byte(&mut self, to_bytes: impl Fn(T) -> Vec<u8>) -> u8 {
        if self.curr_bytes.is_empty() {
            let next = self
                .from_inst
                .pop_front()
                .expect("No more responses were expected from instrument to host.");
            self.curr_bytes = to_bytes(next).into();
        }
        self.curr_bytes
            .pop_front()
            .expect("Scripted responses must not be empty.")
    }

    /// Panic if any part of the conversation was not used.
    fn finalize(&mut self) {
        if let Some(leftover) = self.from_host.front() {
            panic!("Leftover expected commands found from host to instrument: {leftover:?}");
        }
        if let Some(leftover) = self.from_inst.front() {
            panic!("Leftover expected responses found from instrument to host: {leftover:?}");
        }
        if !self.curr_bytes.is_empty() {
            panic!(
                "Response from instrument to host was only partially read: {:?}",
                self.curr_bytes
            );
        }
    }
}

// Tests of internal functionality
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_reads_in_order() {
        let mut conv = Conversation::new(vec!["*IDN?"], vec!["ab", "c"]);
        assert_eq!(conv.next_from_host(), "*IDN?");
        let bytes: Vec<u8> = (0..3)
            .map(|_| conv.read_one_byte(|msg: &str| msg.as_bytes().to_vec()))
            .collect();
        assert_eq!(bytes, b"abc");
        conv.finalize();
    }

    #[test]
    #[should_panic]
    fn test_conversation_partial_read() {
        let mut conv = Conversation::new(vec![], vec!["ab"]);
        conv.read_one_byte(|msg: &str| msg.as_bytes().to_vec());
        conv.finalize();
    }
}
