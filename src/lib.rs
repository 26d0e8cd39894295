//! # Hokuyo Driver
//!
//! `hokuyo` is a driver for Hokuyo URG series laser rangefinders speaking the SCIP2.0 protocol.
//! It provides the protocol codec (6-bit character fields, checksums, command classification
//! and block framed scan data) and a device session exposing one method per command.
//!
//! # Example
//! ```ignore
//! use hokuyo::{Channel, FieldWidth, HokuyoDevice, ScanRequestParams};
//!
//! let channel = Channel::open("/dev/ttyACM0", hokuyo::HOKUYO_DEFAULT_BAUD_RATE)?;
//! let mut device = HokuyoDevice::new(channel);
//! device.laser_on()?;
//! let reply = device.get_latest_scan(FieldWidth::Three, &ScanRequestParams::default())?;
//! println!("{} samples at {} ms", reply.scan.len(), reply.timestamp);
//! ```

extern crate log;

mod answers;
pub mod base;
pub mod checksum;
pub mod cmds;
pub mod codec;
mod internals;
pub mod parsers;
mod protocol;
pub mod types;

pub use crate::answers::{
    interpret_status, DeviceCondition, DeviceError, StatusCode, StatusVerdict,
    HOKUYO_STATUS_DATA, HOKUYO_STATUS_OK,
};
pub use crate::base::{Channel, Error, FaultLocation, IoError, ProtocolFault, Result, Transport};
pub use crate::cmds::{classify, Command, CommandKind, TimeAdjust};
pub use crate::codec::{EncodedField, FieldWidth};
pub use crate::internals::{HOKUYO_DEFAULT_BAUD_RATE, HOKUYO_DEFAULT_TIMEOUT};
pub use crate::protocol::ReplyDispatcher;
pub use crate::types::{
    DeviceInfo, DistanceScan, ReplyOutcome, ReplyPayload, ScanReply, ScanRequestParams,
    Sensitivity,
};

use crate::internals::MAX_STALE_SCAN_BYTES;
use log::{trace, warn};
use std::io::{Read, Write};

/// A multi scan (MD/MS) the sensor is still streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RunningScan {
    kind: CommandKind,
    continuous: bool,
}

/// A session with one rangefinder.
///
/// Every method performs one complete command/reply exchange; `&mut self`
/// keeps a single exchange in flight per connection.
#[derive(Debug)]
pub struct HokuyoDevice<C: Transport> {
    transport: C,
    dispatcher: ReplyDispatcher,
    running_scan: Option<RunningScan>,
}

impl<T: ?Sized> HokuyoDevice<Channel<T>>
where
    T: Read + Write,
{
    /// Constructs a new `HokuyoDevice` over a raw stream with the default read timeout.
    ///
    /// # Example
    /// ```ignore
    /// let port = serialport::new("/dev/ttyACM0", 115_200)
    ///     .timeout(Duration::from_millis(10))
    ///     .open()?;
    /// let mut device = HokuyoDevice::with_stream(port);
    /// ```
    pub fn with_stream(stream: Box<T>) -> HokuyoDevice<Channel<T>> {
        HokuyoDevice::new(Channel::new(stream))
    }
}

#[cfg(feature = "serial")]
impl HokuyoDevice<Channel<dyn serialport::SerialPort>> {
    /// Opens the named serial device and starts a session on it.
    pub fn open(name: &str, baud_rate: u32) -> Result<Self> {
        Ok(HokuyoDevice::new(Channel::open(name, baud_rate)?))
    }
}

impl<C: Transport> HokuyoDevice<C> {
    /// Constructs a new `HokuyoDevice` using an existing transport.
    pub fn new(transport: C) -> HokuyoDevice<C> {
        trace!("Creating new HokuyoDevice");
        HokuyoDevice {
            transport,
            dispatcher: ReplyDispatcher::new(),
            running_scan: None,
        }
    }

    /// Gives the transport back, e.g. to reopen it at another bit rate.
    pub fn into_inner(self) -> C {
        self.transport
    }

    /// `true` while an MD/MS scan is still delivering data messages.
    pub fn is_scanning(&self) -> bool {
        self.running_scan.is_some()
    }

    /// Sends `command` and reads its reply.
    ///
    /// Data messages of a scan that is still running are skipped while
    /// waiting for the echo of `command`.
    pub fn execute(&mut self, command: &Command) -> Result<ReplyOutcome> {
        self.execute_tagged(command, None)
    }

    /// Like [`execute`](Self::execute), appending `;tag` to the command line.
    pub fn execute_tagged(&mut self, command: &Command, tag: Option<&str>) -> Result<ReplyOutcome> {
        let line = command.encode(tag)?;
        let kind = command.kind();
        trace!("Sending {:?}: {:?}", kind, String::from_utf8_lossy(&line));
        self.transport.write_all(&line)?;

        let mut stale_bytes = 0;
        let mut skipped = 0;
        let outcome = loop {
            let mut counted = CountingTransport::new(&mut self.transport);
            let outcome = self.dispatcher.read_reply(&mut counted, Some(kind))?;
            let read = counted.read;
            if !self.is_stale_scan_reply(&outcome) {
                break outcome;
            }
            skipped += 1;
            stale_bytes += read;
            trace!(
                "Skipped data message {} of the running scan ({} bytes so far)",
                skipped,
                stale_bytes
            );
            if stale_bytes >= MAX_STALE_SCAN_BYTES {
                warn!(
                    "Gave up waiting for {:?} after {} bytes of scan data",
                    kind, stale_bytes
                );
                break outcome;
            }
        };

        self.track_scan(command, &outcome);
        Ok(outcome)
    }

    /// Reads the next data message of the running MD/MS scan without sending anything.
    pub fn read_reply(&mut self) -> Result<ReplyOutcome> {
        let expected = self.running_scan.map(|scan| scan.kind);
        let outcome = self.dispatcher.read_reply(&mut self.transport, expected)?;
        if let Some(running) = self.running_scan {
            match &outcome {
                ReplyOutcome::Ok(ReplyPayload::Scan(reply)) => {
                    if !running.continuous && reply.remaining_scans == Some(0) {
                        trace!("Last data message of {:?} received", running.kind);
                        self.running_scan = None;
                    }
                }
                ReplyOutcome::DeviceError(_) => self.running_scan = None,
                _ => {}
            }
        }
        Ok(outcome)
    }

    /// Switches the laser on (BM).
    pub fn laser_on(&mut self) -> Result<()> {
        self.invoke_status(Command::LaserOn)
    }

    /// Switches the laser off and stops any running scan (QT).
    ///
    /// Data messages the running scan already put on the wire are skipped, up
    /// to `MAX_STALE_SCAN_BYTES` (256 KiB). Past that the stale message is
    /// returned as `Error::Protocol(UnexpectedSymbol)` and the scan still
    /// counts as running.
    pub fn laser_off(&mut self) -> Result<()> {
        self.invoke_status(Command::LaserOff)
    }

    /// Restores the power-on settings (RS).
    pub fn reset(&mut self) -> Result<()> {
        self.invoke_status(Command::Reset)
    }

    /// Enters time adjust mode (TM0).
    pub fn enter_time_adjust(&mut self) -> Result<()> {
        self.invoke_status(Command::TimeAdjust(TimeAdjust::ModeOn))
    }

    /// Reads the sensor clock in milliseconds (TM1). Time adjust mode must be on.
    pub fn request_time(&mut self) -> Result<u32> {
        match self.invoke(Command::TimeAdjust(TimeAdjust::RequestTime))? {
            ReplyPayload::Time(time) => Ok(time),
            other => Err(unexpected_reply("time", &other)),
        }
    }

    /// Leaves time adjust mode (TM2).
    pub fn leave_time_adjust(&mut self) -> Result<()> {
        self.invoke_status(Command::TimeAdjust(TimeAdjust::ModeOff))
    }

    /// Changes the RS232 bit rate (SS). The transport has to be reopened at the new rate.
    pub fn set_bit_rate(&mut self, bit_rate: u32) -> Result<()> {
        self.invoke_status(Command::SetBitRate(bit_rate))
    }

    /// Changes the motor speed (CR): 0 default, 1..=10 speed levels, 99 initial speed.
    pub fn set_motor_speed(&mut self, speed: u8) -> Result<()> {
        self.invoke_status(Command::SetMotorSpeed(speed))
    }

    pub fn set_sensitivity(&mut self, sensitivity: Sensitivity) -> Result<()> {
        self.invoke_status(Command::SetSensitivity(sensitivity))
    }

    /// Makes the sensor simulate a malfunction (DB), for testing error handling.
    pub fn simulate_malfunction(&mut self, code: u8) -> Result<()> {
        self.invoke_status(Command::SimulateMalfunction(code))
    }

    /// Vendor, product, firmware, protocol and serial number (VV).
    pub fn get_version(&mut self) -> Result<DeviceInfo> {
        self.invoke_info(Command::GetVersion)
    }

    /// Model, range limits, step layout and scan speed (PP).
    pub fn get_specs(&mut self) -> Result<DeviceInfo> {
        self.invoke_info(Command::GetSpecs)
    }

    /// Laser, motor, bit rate and sensor status (II).
    pub fn get_state(&mut self) -> Result<DeviceInfo> {
        self.invoke_info(Command::GetState)
    }

    /// Starts an MD/MS scan and returns its first data message.
    ///
    /// Further messages are read with [`grab_scan`](Self::grab_scan) until the
    /// requested count is reached or, for a continuous scan, until `laser_off`
    /// or `reset`.
    pub fn start_scan(&mut self, width: FieldWidth, params: &ScanRequestParams) -> Result<ScanReply> {
        trace!("Starting {:?} scan with {:?}", width, params);
        let command = Command::MultiScan {
            width,
            params: params.clone(),
        };
        match self.invoke(command)? {
            ReplyPayload::Scan(reply) => Ok(reply),
            other => Err(unexpected_reply("scan", &other)),
        }
    }

    /// Reads the next data message of the scan begun by [`start_scan`](Self::start_scan).
    pub fn grab_scan(&mut self) -> Result<ScanReply> {
        if self.running_scan.is_none() {
            return Err(Error::invalid_argument("no multi scan is running"));
        }
        match self.read_reply()?.into_result()? {
            ReplyPayload::Scan(reply) => Ok(reply),
            other => Err(unexpected_reply("scan", &other)),
        }
    }

    /// Requests the most recent scan (GD/GS). The laser must be on.
    pub fn get_latest_scan(
        &mut self,
        width: FieldWidth,
        params: &ScanRequestParams,
    ) -> Result<ScanReply> {
        let command = Command::LatestScan {
            width,
            params: params.clone(),
        };
        match self.invoke(command)? {
            ReplyPayload::Scan(reply) => Ok(reply),
            other => Err(unexpected_reply("scan", &other)),
        }
    }

    /// Closes the transport. The session cannot be used afterwards.
    pub fn close(&mut self) -> Result<()> {
        trace!("Closing HokuyoDevice");
        if self.running_scan.take().is_some() {
            warn!("Closing while a scan is still running");
        }
        self.transport.close()?;
        Ok(())
    }

    fn invoke(&mut self, command: Command) -> Result<ReplyPayload> {
        self.execute(&command)?.into_result()
    }

    fn invoke_status(&mut self, command: Command) -> Result<()> {
        match self.invoke(command)? {
            ReplyPayload::Status(_) => Ok(()),
            other => Err(unexpected_reply("status", &other)),
        }
    }

    fn invoke_info(&mut self, command: Command) -> Result<DeviceInfo> {
        match self.invoke(command)? {
            ReplyPayload::Info(info) => Ok(info),
            other => Err(unexpected_reply("info", &other)),
        }
    }

    fn is_stale_scan_reply(&self, outcome: &ReplyOutcome) -> bool {
        let running = match self.running_scan {
            Some(running) => running,
            None => return false,
        };
        match outcome {
            ReplyOutcome::ProtocolError {
                fault: ProtocolFault::UnexpectedSymbol { symbol },
                ..
            } => classify(symbol.as_bytes()) == running.kind,
            _ => false,
        }
    }

    fn track_scan(&mut self, command: &Command, outcome: &ReplyOutcome) {
        match command {
            Command::LaserOff | Command::Reset if outcome.is_ok() => {
                if self.running_scan.take().is_some() {
                    trace!("Running scan stopped by {:?}", command.kind());
                }
            }
            Command::MultiScan { params, .. } => {
                self.running_scan = match outcome {
                    ReplyOutcome::Ok(ReplyPayload::Scan(reply))
                        if params.is_continuous() || reply.remaining_scans != Some(0) =>
                    {
                        Some(RunningScan {
                            kind: command.kind(),
                            continuous: params.is_continuous(),
                        })
                    }
                    _ => None,
                };
                trace!("Running scan: {:?}", self.running_scan);
            }
            _ => {}
        }
    }
}

fn unexpected_reply(wanted: &str, got: &ReplyPayload) -> Error {
    let got = match got {
        ReplyPayload::Status(_) => "status",
        ReplyPayload::Time(_) => "time",
        ReplyPayload::Info(_) => "info",
        ReplyPayload::Scan(_) => "scan",
    };
    Error::UnexpectedReply {
        description: format!("expected {} reply, got {} reply", wanted, got),
    }
}

/// Counts the bytes read through the wrapped transport.
struct CountingTransport<'a, C: Transport + ?Sized> {
    inner: &'a mut C,
    read: usize,
}

impl<'a, C: Transport + ?Sized> CountingTransport<'a, C> {
    fn new(inner: &'a mut C) -> Self {
        CountingTransport { inner, read: 0 }
    }
}

impl<'a, C: Transport + ?Sized> Transport for CountingTransport<'a, C> {
    fn read_exact(&mut self, len: usize) -> std::result::Result<Vec<u8>, IoError> {
        let bytes = self.inner.read_exact(len)?;
        self.read += bytes.len();
        Ok(bytes)
    }

    fn read_byte(&mut self) -> std::result::Result<u8, IoError> {
        let byte = self.inner.read_byte()?;
        self.read += 1;
        Ok(byte)
    }

    fn write_all(&mut self, bytes: &[u8]) -> std::result::Result<(), IoError> {
        self.inner.write_all(bytes)
    }

    fn close(&mut self) -> std::result::Result<(), IoError> {
        self.inner.close()
    }
}
