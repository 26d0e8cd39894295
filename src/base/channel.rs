use crate::base::error::IoError;
use crate::base::traits::Transport;
use crate::internals::{CHANNEL_READ_CHUNK, HOKUYO_DEFAULT_TIMEOUT};
use log::{error, trace, warn};
use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

/// Channel sends and receives raw protocol bytes via a stream
///
/// # Examples
/// ```ignore
/// let mut channel = Channel::new(serial_port);
///
/// channel.write_all(b"BM\n").unwrap();
/// let echo = channel.read_exact(3).unwrap();
/// ```
#[derive(Debug)]
pub struct Channel<T: ?Sized> {
    stream: Box<T>,
    timeout: Duration,
    closed: bool,
    read_buffer: VecDeque<u8>,
}

impl<T: ?Sized> Channel<T>
where
    T: io::Read + io::Write,
{
    /// Create a new `Channel` with the default read timeout
    pub fn new(stream: Box<T>) -> Channel<T> {
        trace!(
            "Creating new Channel with default timeout {:?}",
            HOKUYO_DEFAULT_TIMEOUT
        );
        Channel::with_timeout(stream, HOKUYO_DEFAULT_TIMEOUT)
    }

    /// Create a new `Channel` with a non-default read timeout
    ///
    /// The stream itself should have a short timeout configured (e.g., 10ms)
    /// so that a single read does not block for the whole deadline.
    ///
    /// # Example
    /// ```ignore
    /// let channel = Channel::with_timeout(serial_port, Duration::from_millis(200));
    /// ```
    pub fn with_timeout(stream: Box<T>, timeout: Duration) -> Channel<T> {
        trace!("Creating new Channel with timeout {:?}", timeout);
        Channel {
            stream,
            timeout,
            closed: false,
            read_buffer: VecDeque::with_capacity(CHANNEL_READ_CHUNK),
        }
    }

    /// The deadline applied to each `read_exact` call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        trace!("Channel timeout set to {:?}", timeout);
        self.timeout = timeout;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Reads from the stream until at least `len` bytes are buffered.
    ///
    /// Each stream read asks for up to `CHANNEL_READ_CHUNK` bytes; the deadline
    /// covers the whole call.
    fn fill_to(&mut self, len: usize) -> Result<(), IoError> {
        if self.closed {
            error!("read on closed channel");
            return Err(IoError::Closed);
        }

        let deadline = Instant::now() + self.timeout;
        let mut chunk = [0u8; CHANNEL_READ_CHUNK];

        while self.read_buffer.len() < len {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    let got = self.read_buffer.len();
                    warn!("Stream ended after {} of {} bytes", got, len);
                    self.read_buffer.clear();
                    return Err(IoError::ShortRead { expected: len, got });
                }
                Ok(read) => {
                    self.read_buffer.extend(&chunk[..read]);
                    trace!(
                        "Read {} bytes from stream ({} buffered, {} wanted)",
                        read,
                        self.read_buffer.len(),
                        len
                    );
                }
                Err(e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    if Instant::now() >= deadline {
                        warn!(
                            "Read deadline of {:?} reached with {}/{} bytes",
                            self.timeout,
                            self.read_buffer.len(),
                            len
                        );
                        return Err(IoError::Timeout);
                    }
                    trace!("Stream read timed out, polling again");
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    trace!("Stream read interrupted, retrying");
                }
                Err(e) => {
                    error!("IO error reading from stream: {}", e);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}

#[cfg(feature = "serial")]
impl Channel<dyn serialport::SerialPort> {
    /// Opens the named serial device (e.g. `/dev/ttyACM0` or `COM3`).
    ///
    /// # Example
    /// ```ignore
    /// let channel = Channel::open("/dev/ttyACM0", HOKUYO_DEFAULT_BAUD_RATE)?;
    /// ```
    pub fn open(name: &str, baud_rate: u32) -> Result<Self, IoError> {
        trace!("Opening serial port {} at {} bps", name, baud_rate);
        let port = serialport::new(name, baud_rate)
            .timeout(crate::internals::HOKUYO_SERIAL_POLL_TIMEOUT)
            .open()
            .map_err(|e| {
                error!("Failed to open serial port {}: {}", name, e);
                IoError::from(io::Error::from(e))
            })?;
        Ok(Channel::new(port))
    }
}

impl<T: ?Sized> Transport for Channel<T>
where
    T: io::Read + io::Write,
{
    fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, IoError> {
        trace!("Channel read_exact called for {} bytes", len);
        self.fill_to(len)?;
        Ok(self.read_buffer.drain(..len).collect())
    }

    fn read_byte(&mut self) -> Result<u8, IoError> {
        self.fill_to(1)?;
        self.read_buffer
            .pop_front()
            .ok_or(IoError::ShortRead { expected: 1, got: 0 })
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), IoError> {
        trace!("Channel write_all called with {} bytes", bytes.len());
        if self.closed {
            error!("write_all on closed channel");
            return Err(IoError::Closed);
        }
        self.stream.write_all(bytes).map_err(|e| {
            error!("IO error during write_all: {}", e);
            IoError::from(e)
        })?;
        trace!("Flushing stream...");
        self.stream.flush()?;
        trace!("Stream flushed");
        Ok(())
    }

    fn close(&mut self) -> Result<(), IoError> {
        if self.closed {
            return Err(IoError::Closed);
        }
        trace!("Closing channel");
        let flushed = self.stream.flush();
        self.closed = true;
        self.read_buffer.clear();
        flushed.map_err(IoError::from)
    }
}
