use crate::base::{Error, FaultLocation, ProtocolFault, Result, Transport};
use crate::checksum::checksum;
use crate::internals::{MAX_INFO_LINES, MAX_INFO_LINE_LEN};
use crate::parsers::{drain_to_blank_line, read_line};
use crate::types::DeviceInfo;
use log::{trace, warn};

/// Reads `KEY:value;sum` lines up to the blank line ending a VV/PP/II reply.
///
/// The whole message is always consumed. The first faulty line is reported
/// once the blank line has been read.
pub fn read_info_lines<T: Transport + ?Sized>(transport: &mut T) -> Result<DeviceInfo> {
    let mut info = DeviceInfo::default();
    let mut first_fault = None;

    for index in 0.. {
        let line = read_line(transport, MAX_INFO_LINE_LEN, "info line")?;
        if line.is_empty() {
            trace!("Info reply ended after {} lines", index);
            break;
        }
        if index == MAX_INFO_LINES {
            warn!("Info reply exceeds {} lines, draining", MAX_INFO_LINES);
            drain_to_blank_line(transport)?;
            return Err(ProtocolFault::malformed(
                "info reply",
                format!("more than {} lines", MAX_INFO_LINES),
            )
            .into());
        }

        match parse_info_line(index, &line) {
            Ok((key, value)) => {
                trace!("Info {} = {:?}", key, value);
                info.push(key, value);
            }
            Err(fault) => {
                warn!("Dropping info line {}: {}", index, fault);
                first_fault.get_or_insert(fault);
            }
        }
    }

    match first_fault {
        Some(fault) => Err(Error::Protocol(fault)),
        None => Ok(info),
    }
}

/// Splits one line into key and value after checking its sum.
///
/// The sum covers everything before the `;`.
pub fn parse_info_line(index: usize, line: &[u8]) -> std::result::Result<(String, String), ProtocolFault> {
    let (body, sum) = match line {
        [body @ .., b';', sum] => (body, *sum),
        _ => {
            return Err(ProtocolFault::malformed(
                "info line",
                format!("line {} has no ;sum suffix", index),
            ))
        }
    };

    let expected = checksum(body);
    if expected != sum {
        return Err(ProtocolFault::ChecksumMismatch {
            at: FaultLocation::InfoLine(index),
            expected,
            received: sum,
        });
    }

    let colon = body.iter().position(|b| *b == b':').ok_or_else(|| {
        ProtocolFault::malformed("info line", format!("line {} has no key separator", index))
    })?;
    let key = String::from_utf8_lossy(&body[..colon]).into_owned();
    let value = String::from_utf8_lossy(&body[colon + 1..]).into_owned();
    Ok((key, value))
}

#[cfg(test)]
pub(crate) fn encode_info_line(key: &str, value: &str) -> Vec<u8> {
    let mut line = format!("{}:{}", key, value).into_bytes();
    let sum = checksum(&line);
    line.push(b';');
    line.push(sum);
    line.push(b'\n');
    line
}
