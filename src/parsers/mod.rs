pub mod block_reader;
pub mod info_parser;

use crate::base::{ProtocolFault, Result, Transport};
use crate::internals::{LF, MAX_DRAIN_LEN};
use log::trace;

/// Reads one line and returns it without its LF.
///
/// Fails with `MalformedField` once more than `max_len` bytes arrive without a terminator.
pub(crate) fn read_line<T: Transport + ?Sized>(
    transport: &mut T,
    max_len: usize,
    field: &'static str,
) -> Result<Vec<u8>> {
    let mut line = Vec::new();
    loop {
        let byte = transport.read_byte()?;
        if byte == LF {
            trace!("Read {} line {:?}", field, String::from_utf8_lossy(&line));
            return Ok(line);
        }
        if line.len() == max_len {
            return Err(ProtocolFault::malformed(
                field,
                format!("no line feed within {} bytes", max_len),
            )
            .into());
        }
        line.push(byte);
    }
}

/// Consumes the blank line that ends a message.
pub(crate) fn expect_blank_line<T: Transport + ?Sized>(
    transport: &mut T,
    field: &'static str,
) -> Result<()> {
    let byte = transport.read_byte()?;
    if byte != LF {
        return Err(ProtocolFault::malformed(
            field,
            format!("expected terminating line feed, got {:#04x}", byte),
        )
        .into());
    }
    Ok(())
}

/// Discards bytes up to and including the next blank line.
///
/// Must be called at the start of a line. Gives up with `MalformedField` after `MAX_DRAIN_LEN` bytes.
pub(crate) fn drain_to_blank_line<T: Transport + ?Sized>(transport: &mut T) -> Result<()> {
    let mut drained = 0;
    let mut at_line_start = true;
    while drained < MAX_DRAIN_LEN {
        let byte = transport.read_byte()?;
        drained += 1;
        if byte == LF {
            if at_line_start {
                trace!("Drained {} bytes", drained);
                return Ok(());
            }
            at_line_start = true;
        } else {
            at_line_start = false;
        }
    }
    Err(ProtocolFault::malformed(
        "message",
        format!("no blank line within {} bytes", MAX_DRAIN_LEN),
    )
    .into())
}

/// Checks that `line` ends with LF and returns the bytes before it.
pub(crate) fn strip_lf<'a>(line: &'a [u8], field: &'static str) -> Result<&'a [u8]> {
    match line.split_last() {
        Some((&LF, body)) => Ok(body),
        _ => Err(ProtocolFault::malformed(field, "missing line feed").into()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::base::{IoError, Transport};
    use std::collections::VecDeque;

    /// In-memory transport replaying a fixed byte script.
    #[derive(Debug, Default)]
    pub struct Script {
        pub rx: VecDeque<u8>,
        pub tx: Vec<u8>,
    }

    impl Script {
        pub fn new(bytes: &[u8]) -> Script {
            Script {
                rx: bytes.iter().copied().collect(),
                tx: Vec::new(),
            }
        }

        pub fn remaining(&self) -> usize {
            self.rx.len()
        }
    }

    impl Transport for Script {
        fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, IoError> {
            if self.rx.len() < len {
                let got = self.rx.len();
                self.rx.clear();
                return Err(IoError::ShortRead { expected: len, got });
            }
            Ok(self.rx.drain(..len).collect())
        }

        fn write_all(&mut self, bytes: &[u8]) -> Result<(), IoError> {
            self.tx.extend_from_slice(bytes);
            Ok(())
        }

        fn close(&mut self) -> Result<(), IoError> {
            Ok(())
        }
    }
}
