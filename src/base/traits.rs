use crate::base::error::IoError;

/// The byte-stream capability the protocol core consumes.
///
/// Implementations block until the request is satisfied or fail with an
/// [`IoError`]; a read deadline, if any, is the implementation's concern.
pub trait Transport {
    /// Reads exactly `len` bytes into a freshly owned buffer.
    ///
    /// # Arguments
    ///
    /// * `len` - The number of bytes to read.
    fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, IoError>;

    /// Writes all of `bytes` and flushes them to the device.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), IoError>;

    /// Closes the transport. Later reads and writes fail with [`IoError::Closed`].
    fn close(&mut self) -> Result<(), IoError>;

    /// Reads a single byte.
    fn read_byte(&mut self) -> Result<u8, IoError> {
        let bytes = self.read_exact(1)?;
        bytes
            .first()
            .copied()
            .ok_or(IoError::ShortRead { expected: 1, got: 0 })
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, IoError> {
        (**self).read_exact(len)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        (**self).write_all(bytes)
    }

    fn close(&mut self) -> Result<(), IoError> {
        (**self).close()
    }

    fn read_byte(&mut self) -> Result<u8, IoError> {
        (**self).read_byte()
    }
}
