use crate::answers::{interpret_status, DeviceError, StatusCode, StatusVerdict};
use crate::base::{Error, FaultLocation, ProtocolFault, Result, Transport};
use crate::checksum::checksum;
use crate::cmds::CommandKind;
use crate::codec::decode;
use crate::internals::{MAX_ECHO_LEN, MAX_LEADING_BLANK_LINES};
use crate::parsers::block_reader::{BlockLayout, ReplyBlockReader};
use crate::parsers::info_parser::read_info_lines;
use crate::parsers::{drain_to_blank_line, expect_blank_line, read_line, strip_lf};
use crate::types::{ReplyOutcome, ReplyPayload, ScanReply};
use log::{error, trace, warn};

/// Characters in the time field of a TM1 reply.
const TIME_CHARS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplyState {
    AwaitingEcho,
    Classified(CommandKind),
    ParsingStatus(CommandKind),
    ParsingTime,
    ParsingInfo,
    ParsingScanHeader(CommandKind),
    ParsingBlocks(BlockLayout),
    Draining,
    Terminal,
}

/// Scan parameters echoed back in the first line of a scan reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct EchoedScan {
    start_step: u16,
    end_step: u16,
    cluster_count: u8,
    /// Scans still to come, MD/MS only.
    remaining_scans: Option<u8>,
}

/// Reads one reply message and decodes it with the grammar of its command.
///
/// The echoed command symbol selects the grammar: status only, status and
/// time, status and `KEY:value;sum` lines, or status and scan data. Every
/// exchange uses its own buffers and no retries are attempted.
#[derive(Debug, Clone)]
pub struct ReplyDispatcher {
    state: ReplyState,
    status: Option<StatusCode>,
}

impl ReplyDispatcher {
    pub fn new() -> ReplyDispatcher {
        trace!("Creating new ReplyDispatcher");
        ReplyDispatcher {
            state: ReplyState::AwaitingEcho,
            status: None,
        }
    }

    fn enter(&mut self, next: ReplyState) {
        trace!("Reply state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Reads the next reply from `transport`.
    ///
    /// # Arguments
    ///
    /// * `expected` - The command the reply must answer; `None` accepts any known command.
    ///
    /// Protocol and device failures come back as a `ReplyOutcome`; only
    /// transport failures are returned as `Err`.
    pub fn read_reply<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        expected: Option<CommandKind>,
    ) -> Result<ReplyOutcome> {
        self.status = None;
        self.enter(ReplyState::AwaitingEcho);

        let outcome = match self.dispatch(transport, expected, false) {
            Ok(outcome) => outcome,
            Err(Error::Protocol(fault)) => {
                warn!("Reply rejected: {} (status {:?})", fault, self.status);
                ReplyOutcome::ProtocolError {
                    fault,
                    status: self.status,
                }
            }
            Err(err) => {
                error!("Reply aborted in state {:?}: {}", self.state, err);
                self.enter(ReplyState::Terminal);
                return Err(err);
            }
        };
        self.enter(ReplyState::Terminal);
        Ok(outcome)
    }

    /// Reads one message. `after_ack` is set for the data message following an MD/MS acknowledgement.
    fn dispatch<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        expected: Option<CommandKind>,
        after_ack: bool,
    ) -> Result<ReplyOutcome> {
        let echo = self.read_echo(transport)?;
        let kind = CommandKind::classify(&echo);
        self.enter(ReplyState::Classified(kind));

        let unexpected = match expected {
            Some(expected) => kind != expected,
            None => kind == CommandKind::Unknown,
        };
        if unexpected {
            warn!(
                "Unexpected echo {:?}, expected {:?}",
                String::from_utf8_lossy(&echo),
                expected
            );
            self.drain_message(transport)?;
            let symbol = echo.get(..2).unwrap_or(&echo[..]);
            return Err(ProtocolFault::unexpected_symbol(symbol).into());
        }

        self.enter(ReplyState::ParsingStatus(kind));
        let status = self.read_status(transport)?;

        let verdict = interpret_status(kind, status);
        trace!("{:?} status {} -> {:?}", kind, status, verdict);
        match verdict {
            StatusVerdict::Rejected(condition) => {
                expect_blank_line(transport, "status terminator")?;
                warn!("{:?} rejected with status {}: {}", kind, status, condition);
                Ok(ReplyOutcome::DeviceError(DeviceError {
                    kind,
                    status,
                    condition,
                }))
            }
            StatusVerdict::Accepted if kind.is_multi_scan() => {
                expect_blank_line(transport, "status terminator")?;
                if after_ack {
                    return Err(ProtocolFault::malformed(
                        "status",
                        format!("second {:?} acknowledgement instead of data", kind),
                    )
                    .into());
                }
                // Acknowledgement; exactly one data message follows.
                trace!("{:?} acknowledged, reading first data message", kind);
                self.enter(ReplyState::AwaitingEcho);
                self.status = None;
                self.dispatch(transport, Some(kind), true)
            }
            StatusVerdict::Accepted | StatusVerdict::DataFollows if kind.is_scan() => {
                self.read_scan(transport, kind, &echo)
            }
            StatusVerdict::DataFollows => Err(ProtocolFault::malformed(
                "status",
                format!("data status {} for {:?}", status, kind),
            )
            .into()),
            StatusVerdict::Accepted => match kind {
                CommandKind::TimeAdjust if echo.get(2) == Some(&b'1') => {
                    self.read_time(transport)
                }
                k if k.is_info() => {
                    self.enter(ReplyState::ParsingInfo);
                    let info = read_info_lines(transport)?;
                    Ok(ReplyOutcome::Ok(ReplyPayload::Info(info)))
                }
                _ => {
                    expect_blank_line(transport, "status terminator")?;
                    Ok(ReplyOutcome::Ok(ReplyPayload::Status(status)))
                }
            },
        }
    }

    /// Reads the echo line, skipping a few stray blank lines in front of it.
    fn read_echo<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<Vec<u8>> {
        let mut skipped = 0;
        loop {
            let echo = read_line(transport, MAX_ECHO_LEN, "echo")?;
            if !echo.is_empty() || skipped == MAX_LEADING_BLANK_LINES {
                return Ok(echo);
            }
            skipped += 1;
            trace!("Skipped blank line {} before echo", skipped);
        }
    }

    /// Reads `status:2 sum:1 LF`.
    ///
    /// On a sum mismatch the rest of the message is drained before the fault is returned.
    fn read_status<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<StatusCode> {
        let line = transport.read_exact(4)?;
        let line = strip_lf(&line, "status")?;
        let status = StatusCode([line[0], line[1]]);
        self.status = Some(status);

        let expected = checksum(&line[..2]);
        if expected != line[2] {
            warn!(
                "Status line {:?} has sum {:#04x}, expected {:#04x}",
                status, line[2], expected
            );
            self.drain_message(transport)?;
            return Err(ProtocolFault::ChecksumMismatch {
                at: FaultLocation::StatusLine,
                expected,
                received: line[2],
            }
            .into());
        }
        Ok(status)
    }

    fn read_time<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<ReplyOutcome> {
        self.enter(ReplyState::ParsingTime);
        let line = transport.read_exact(TIME_CHARS + 2)?;
        let line = strip_lf(&line, "time")?;
        let (time, sum) = line.split_at(TIME_CHARS);
        expect_blank_line(transport, "time terminator")?;

        let expected = checksum(time);
        if expected != sum[0] {
            return Err(ProtocolFault::ChecksumMismatch {
                at: FaultLocation::TimeLine,
                expected,
                received: sum[0],
            }
            .into());
        }
        let time = decode(time);
        trace!("Sensor time {}", time);
        Ok(ReplyOutcome::Ok(ReplyPayload::Time(time)))
    }

    fn read_scan<T: Transport + ?Sized>(
        &mut self,
        transport: &mut T,
        kind: CommandKind,
        echo: &[u8],
    ) -> Result<ReplyOutcome> {
        self.enter(ReplyState::ParsingScanHeader(kind));
        let echoed = parse_scan_echo(kind, echo)?;
        let width = kind.char_width().ok_or_else(|| {
            ProtocolFault::malformed("echo", format!("{:?} carries no scan data", kind))
        })?;

        let layout = BlockLayout::new(
            echoed.start_step,
            echoed.end_step,
            echoed.cluster_count,
            width,
        );
        self.enter(ReplyState::ParsingBlocks(layout));
        let body = ReplyBlockReader::new(layout).read(transport)?;

        Ok(ReplyOutcome::Ok(ReplyPayload::Scan(ScanReply {
            scan: body.scan,
            timestamp: body.timestamp,
            remaining_scans: echoed.remaining_scans,
            faults: body.faults,
        })))
    }

    /// Discards lines up to and including the blank line that ends the message.
    fn drain_message<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<()> {
        self.enter(ReplyState::Draining);
        drain_to_blank_line(transport)
    }
}

impl Default for ReplyDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses `start:4 end:4 cluster:2 [interval:1 count:2]` after the symbol, ignoring any `;tag`.
fn parse_scan_echo(kind: CommandKind, echo: &[u8]) -> Result<EchoedScan> {
    let params = echo.split(|b| *b == b';').next().unwrap_or(echo);
    let params = params.get(2..).unwrap_or(&[]);
    let needed = if kind.is_multi_scan() { 13 } else { 10 };
    if params.len() < needed {
        return Err(ProtocolFault::malformed(
            "echo",
            format!("{} parameter digits, expected {}", params.len(), needed),
        )
        .into());
    }

    let start_step = parse_decimal(&params[0..4])? as u16;
    let end_step = parse_decimal(&params[4..8])? as u16;
    let cluster_count = parse_decimal(&params[8..10])? as u8;
    let remaining_scans = if kind.is_multi_scan() {
        Some(parse_decimal(&params[11..13])? as u8)
    } else {
        None
    };
    trace!(
        "Echoed scan {}..={} / {}, remaining {:?}",
        start_step,
        end_step,
        cluster_count,
        remaining_scans
    );
    Ok(EchoedScan {
        start_step,
        end_step,
        cluster_count,
        remaining_scans,
    })
}

fn parse_decimal(digits: &[u8]) -> Result<u32> {
    digits.iter().try_fold(0u32, |acc, d| {
        if d.is_ascii_digit() {
            Ok(acc * 10 + u32::from(d - b'0'))
        } else {
            Err(Error::Protocol(ProtocolFault::malformed(
                "echo",
                format!("non-digit {:?} in scan parameters", *d as char),
            )))
        }
    })
}
