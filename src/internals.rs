use std::time::Duration;

/// Default deadline for a single `read_exact` on a `Channel`.
pub const HOKUYO_DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Default serial bit rate of URG series sensors.
pub const HOKUYO_DEFAULT_BAUD_RATE: u32 = 115_200;

/// Per-read timeout configured on an opened serial port.
#[cfg(feature = "serial")]
pub const HOKUYO_SERIAL_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Default scan window used when no parameters are given.
pub const HOKUYO_DEFAULT_START_STEP: u16 = 10;
pub const HOKUYO_DEFAULT_END_STEP: u16 = 750;
pub const HOKUYO_DEFAULT_CLUSTER_COUNT: u8 = 1;
pub const HOKUYO_DEFAULT_SCAN_INTERVAL: u8 = 1;
pub const HOKUYO_DEFAULT_SCAN_COUNT: u8 = 1;

/// Line feed, the only terminator the sensor sends.
pub const LF: u8 = b'\n';

/// Payload bytes in a full data block.
pub const DATA_BLOCK_SIZE: usize = 64;

/// Longest echo line accepted: symbol, 13 parameter digits, `;` and a 16 character tag.
pub const MAX_ECHO_LEN: usize = 2 + 13 + 1 + 16;

/// Longest `KEY:value;sum` line accepted in a VV/PP/II reply.
pub const MAX_INFO_LINE_LEN: usize = 128;

/// Upper bound on bytes discarded while resynchronizing to the end of a message.
pub const MAX_DRAIN_LEN: usize = 64 * 1024;

/// Longest tag accepted after `;` in a command line.
pub const MAX_TAG_LEN: usize = 16;

/// Most `KEY:value;sum` lines accepted in one VV/PP/II reply.
pub const MAX_INFO_LINES: usize = 64;

/// Bytes of a stopped scan's data messages skipped while waiting for another echo.
pub const MAX_STALE_SCAN_BYTES: usize = 256 * 1024;

/// Blank lines tolerated in front of an echo.
pub const MAX_LEADING_BLANK_LINES: usize = 4;

/// Bytes requested from the stream per read; surplus is kept for the next read.
pub const CHANNEL_READ_CHUNK: usize = 256;
