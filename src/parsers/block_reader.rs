use crate::base::{FaultLocation, ProtocolFault, Result, Transport};
use crate::checksum::checksum;
use crate::codec::{decode, decode_all, FieldWidth};
use crate::internals::DATA_BLOCK_SIZE;
use crate::parsers::{expect_blank_line, strip_lf};
use crate::types::{sample_count, DistanceScan};
use log::{trace, warn};

/// Timestamp characters at the head of a scan body.
const TIMESTAMP_CHARS: usize = 4;

/// How the encoded samples of one scan are split into blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    pub start_step: u16,
    pub cluster_count: u8,
    pub char_width: FieldWidth,
    pub sample_count: usize,
    pub byte_count: usize,
    pub full_blocks: usize,
    /// Payload bytes of the trailing partial block, `0..64`.
    pub remainder: usize,
}

impl BlockLayout {
    pub fn new(start_step: u16, end_step: u16, cluster_count: u8, char_width: FieldWidth) -> BlockLayout {
        let sample_count = sample_count(start_step, end_step, cluster_count);
        let byte_count = sample_count * char_width.chars();
        let layout = BlockLayout {
            start_step,
            cluster_count,
            char_width,
            sample_count,
            byte_count,
            full_blocks: byte_count / DATA_BLOCK_SIZE,
            remainder: byte_count % DATA_BLOCK_SIZE,
        };
        trace!(
            "Block layout for steps {}..={} / {}: {} samples, {} bytes, {} full blocks + {} bytes",
            start_step,
            end_step,
            cluster_count,
            layout.sample_count,
            layout.byte_count,
            layout.full_blocks,
            layout.remainder
        );
        layout
    }

    /// Number of blocks on the wire, counting the partial block.
    pub fn block_count(&self) -> usize {
        self.full_blocks + usize::from(self.remainder > 0)
    }
}

/// The decoded body of a scan data message.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanBody {
    pub timestamp: u32,
    pub scan: DistanceScan,
    pub faults: Vec<ProtocolFault>,
}

/// Reads the timestamp line and the data blocks of one scan.
///
/// Checksum mismatches are recorded and reading continues; a framing error
/// aborts with `MalformedField`.
#[derive(Debug, Clone)]
pub struct ReplyBlockReader {
    layout: BlockLayout,
    faults: Vec<ProtocolFault>,
}

impl ReplyBlockReader {
    pub fn new(layout: BlockLayout) -> ReplyBlockReader {
        ReplyBlockReader {
            layout,
            faults: Vec::new(),
        }
    }

    pub fn layout(&self) -> &BlockLayout {
        &self.layout
    }

    pub fn read<T: Transport + ?Sized>(mut self, transport: &mut T) -> Result<ScanBody> {
        let timestamp = self.read_timestamp(transport)?;

        let mut payload = Vec::with_capacity(self.layout.byte_count);
        for index in 0..self.layout.full_blocks {
            let block = transport.read_exact(DATA_BLOCK_SIZE + 2)?;
            let data = strip_lf(&block, "data block")?;
            self.check_block(index, data, &mut payload);
        }

        if self.layout.remainder > 0 {
            let block = transport.read_exact(self.layout.remainder + 2)?;
            let data = strip_lf(&block, "partial data block")?;
            self.check_block(self.layout.full_blocks, data, &mut payload);
        }
        expect_blank_line(transport, "scan terminator")?;

        trace!(
            "Read {} payload bytes in {} blocks, {} faults",
            payload.len(),
            self.layout.block_count(),
            self.faults.len()
        );
        let samples = decode_all(&payload, self.layout.char_width);
        Ok(ScanBody {
            timestamp,
            scan: DistanceScan::new(
                samples,
                self.layout.start_step,
                self.layout.cluster_count,
                self.layout.char_width,
            ),
            faults: self.faults,
        })
    }

    fn read_timestamp<T: Transport + ?Sized>(&mut self, transport: &mut T) -> Result<u32> {
        let line = transport.read_exact(TIMESTAMP_CHARS + 2)?;
        let line = strip_lf(&line, "timestamp")?;
        let (time, sum) = line.split_at(TIMESTAMP_CHARS);
        self.verify(FaultLocation::TimestampLine, time, sum[0]);
        let timestamp = decode(time);
        trace!("Scan timestamp {}", timestamp);
        Ok(timestamp)
    }

    /// Verifies `block` (payload + sum) and appends its payload.
    fn check_block(&mut self, index: usize, block: &[u8], payload: &mut Vec<u8>) {
        if let Some((&sum, data)) = block.split_last() {
            self.verify(FaultLocation::Block(index), data, sum);
            payload.extend_from_slice(data);
        }
    }

    fn verify(&mut self, at: FaultLocation, data: &[u8], received: u8) {
        let expected = checksum(data);
        if expected != received {
            warn!(
                "Checksum mismatch at {}: expected {:#04x}, received {:#04x}",
                at, expected, received
            );
            self.faults.push(ProtocolFault::ChecksumMismatch {
                at,
                expected,
                received,
            });
        }
    }
}

/// Builds the wire form of a scan body: timestamp line, blocks and terminator.
#[cfg(test)]
pub(crate) fn encode_body(timestamp: u32, samples: &[u32], width: FieldWidth) -> Vec<u8> {
    use crate::codec::encode;
    use crate::internals::LF;

    let mut out = Vec::new();
    let time = encode(timestamp, FieldWidth::Four).unwrap();
    out.extend_from_slice(time.as_bytes());
    out.push(checksum(time.as_bytes()));
    out.push(LF);

    let mut payload = Vec::new();
    for v in samples {
        payload.extend_from_slice(encode(*v, width).unwrap().as_bytes());
    }
    for chunk in payload.chunks(DATA_BLOCK_SIZE) {
        out.extend_from_slice(chunk);
        out.push(checksum(chunk));
        out.push(LF);
    }
    out.push(LF);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::Error;
    use crate::parsers::testing::Script;

    fn samples(n: usize) -> Vec<u32> {
        (0..n).map(|i| (i as u32 * 37) % 4000 + 20).collect()
    }

    #[test]
    fn sample_count_and_partition() {
        let layout = BlockLayout::new(10, 19, 2, FieldWidth::Three);
        assert_eq!(layout.sample_count, 5);
        assert_eq!(layout.byte_count, 15);
        assert_eq!(layout.full_blocks, 0);
        assert_eq!(layout.remainder, 15);

        for (start, end, cluster, width) in [
            (0u16, 768u16, 1u8, FieldWidth::Three),
            (10, 750, 1, FieldWidth::Three),
            (44, 725, 3, FieldWidth::Two),
            (0, 63, 1, FieldWidth::Two),
        ] {
            let layout = BlockLayout::new(start, end, cluster, width);
            assert_eq!(layout.byte_count, layout.full_blocks * 64 + layout.remainder);
            assert!(layout.remainder < 64);
        }
    }

    #[test]
    fn default_window_needs_a_47_byte_partial_block() {
        // 741 samples * 3 = 2223 = 34 * 64 + 47
        let layout = BlockLayout::new(10, 750, 1, FieldWidth::Three);
        assert_eq!(layout.full_blocks, 34);
        assert_eq!(layout.remainder, 47);
        assert_eq!(layout.block_count(), 35);
    }

    #[test]
    fn reads_full_and_partial_blocks() {
        let layout = BlockLayout::new(10, 750, 1, FieldWidth::Three);
        let expected = samples(layout.sample_count);
        let mut script = Script::new(&encode_body(123_456, &expected, FieldWidth::Three));

        let body = ReplyBlockReader::new(layout).read(&mut script).unwrap();
        assert_eq!(body.timestamp, 123_456);
        assert_eq!(body.scan.samples(), &expected[..]);
        assert_eq!(body.scan.start_step(), 10);
        assert!(body.faults.is_empty());
        assert_eq!(script.remaining(), 0);
    }

    #[test]
    fn exact_multiple_of_block_size_has_no_partial_block() {
        // 32 samples * 2 = 64 bytes
        let layout = BlockLayout::new(0, 31, 1, FieldWidth::Two);
        assert_eq!(layout.remainder, 0);
        let expected = samples(32);
        let wire = encode_body(7, &expected, FieldWidth::Two);
        // timestamp(6) + block(66) + blank line
        assert_eq!(wire.len(), 6 + 66 + 1);

        let mut script = Script::new(&wire);
        let body = ReplyBlockReader::new(layout).read(&mut script).unwrap();
        assert_eq!(body.scan.samples(), &expected[..]);
        assert_eq!(script.remaining(), 0);
    }

    #[test]
    fn block_checksum_fault_is_recorded_and_reading_continues() {
        let layout = BlockLayout::new(0, 99, 1, FieldWidth::Three);
        let expected = samples(100);
        let mut wire = encode_body(1, &expected, FieldWidth::Three);
        // sum byte of block 1: timestamp(6) + block 0 (66) + 64 payload bytes
        let at = 6 + 66 + 64;
        wire[at] = if wire[at] == b'0' { b'1' } else { b'0' };

        let mut script = Script::new(&wire);
        let body = ReplyBlockReader::new(layout).read(&mut script).unwrap();
        assert_eq!(body.faults.len(), 1);
        assert!(matches!(
            body.faults[0],
            ProtocolFault::ChecksumMismatch {
                at: FaultLocation::Block(1),
                ..
            }
        ));
        assert_eq!(body.scan.samples(), &expected[..]);
        assert_eq!(script.remaining(), 0);
    }

    #[test]
    fn partial_block_checksum_is_verified() {
        // 300 bytes = 4 full blocks + 44
        let layout = BlockLayout::new(0, 99, 1, FieldWidth::Three);
        assert_eq!((layout.full_blocks, layout.remainder), (4, 44));
        let expected = samples(100);
        let mut wire = encode_body(1, &expected, FieldWidth::Three);
        let at = 6 + 4 * 66 + 44;
        wire[at] = if wire[at] == b'0' { b'1' } else { b'0' };

        let mut script = Script::new(&wire);
        let body = ReplyBlockReader::new(layout).read(&mut script).unwrap();
        assert!(matches!(
            body.faults[..],
            [ProtocolFault::ChecksumMismatch {
                at: FaultLocation::Block(4),
                ..
            }]
        ));
        assert_eq!(body.scan.samples(), &expected[..]);
        assert_eq!(script.remaining(), 0);
    }

    #[test]
    fn timestamp_fault_is_not_fatal() {
        let layout = BlockLayout::new(0, 9, 1, FieldWidth::Two);
        let mut wire = encode_body(99, &samples(10), FieldWidth::Two);
        wire[4] = wire[4].wrapping_add(1);
        let mut script = Script::new(&wire);
        let body = ReplyBlockReader::new(layout).read(&mut script).unwrap();
        assert!(matches!(
            body.faults[..],
            [ProtocolFault::ChecksumMismatch {
                at: FaultLocation::TimestampLine,
                ..
            }]
        ));
    }

    #[test]
    fn missing_line_feed_aborts() {
        let layout = BlockLayout::new(0, 99, 1, FieldWidth::Three);
        let mut wire = encode_body(1, &samples(100), FieldWidth::Three);
        wire[6 + 65] = b'X';
        let mut script = Script::new(&wire);
        assert!(matches!(
            ReplyBlockReader::new(layout).read(&mut script),
            Err(Error::Protocol(ProtocolFault::MalformedField { .. }))
        ));
    }

    #[test]
    fn truncated_stream_is_an_io_error() {
        let layout = BlockLayout::new(0, 99, 1, FieldWidth::Three);
        let wire = encode_body(1, &samples(100), FieldWidth::Three);
        let mut script = Script::new(&wire[..100]);
        assert!(matches!(
            ReplyBlockReader::new(layout).read(&mut script),
            Err(Error::Io(_))
        ));
    }
}
