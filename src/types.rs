use crate::answers::{DeviceError, StatusCode};
use crate::base::{Error, ProtocolFault, Result};
use crate::codec::FieldWidth;
use crate::internals::*;

/// Largest step number that fits in the 4 digit step fields.
pub const HOKUYO_MAX_STEP: u16 = 9999;

/// Largest cluster count that fits in the 2 digit cluster field.
pub const HOKUYO_MAX_CLUSTER_COUNT: u8 = 99;

/// Parameters of a scan request (MD, MS, GD, GS).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanRequestParams {
    /// First step of the measured window.
    pub start_step: u16,
    /// Last step of the measured window; must be greater than `start_step`.
    pub end_step: u16,
    /// Number of adjacent steps merged into one sample (1-99).
    pub cluster_count: u8,
    /// Number of scans skipped between two transmitted scans (0-9). MD/MS only.
    pub scan_interval: u8,
    /// Number of scans to transmit (0-99), 0 = until QT or RS. MD/MS only.
    pub scan_count: u8,
}

impl ScanRequestParams {
    /// Creates parameters for a single scan of the window `start_step..=end_step`.
    pub fn new(start_step: u16, end_step: u16, cluster_count: u8) -> ScanRequestParams {
        ScanRequestParams {
            start_step,
            end_step,
            cluster_count,
            scan_interval: 0,
            scan_count: 1,
        }
    }

    /// Creates parameters for an endless scan, stopped only by QT or RS.
    pub fn continuous(start_step: u16, end_step: u16, cluster_count: u8) -> ScanRequestParams {
        ScanRequestParams {
            scan_count: 0,
            ..ScanRequestParams::new(start_step, end_step, cluster_count)
        }
    }

    pub fn with_scan_interval(mut self, scan_interval: u8) -> ScanRequestParams {
        self.scan_interval = scan_interval;
        self
    }

    pub fn with_scan_count(mut self, scan_count: u8) -> ScanRequestParams {
        self.scan_count = scan_count;
        self
    }

    /// `true` if the sensor keeps scanning until told to stop.
    pub fn is_continuous(&self) -> bool {
        self.scan_count == 0
    }

    /// Number of samples one scan delivers, `(end - start + 1) / cluster` rounded down.
    pub fn sample_count(&self) -> usize {
        sample_count(self.start_step, self.end_step, self.cluster_count)
    }

    /// Checks that every field fits its wire format.
    pub fn validate(&self) -> Result<()> {
        if self.start_step > HOKUYO_MAX_STEP || self.end_step > HOKUYO_MAX_STEP {
            return Err(Error::invalid_argument(format!(
                "steps {}..{} exceed {}",
                self.start_step, self.end_step, HOKUYO_MAX_STEP
            )));
        }
        if self.end_step <= self.start_step {
            return Err(Error::invalid_argument(format!(
                "end step {} is not greater than start step {}",
                self.end_step, self.start_step
            )));
        }
        if self.cluster_count == 0 || self.cluster_count > HOKUYO_MAX_CLUSTER_COUNT {
            return Err(Error::invalid_argument(format!(
                "cluster count {} is not 1..={}",
                self.cluster_count, HOKUYO_MAX_CLUSTER_COUNT
            )));
        }
        if self.scan_interval > 9 {
            return Err(Error::invalid_argument(format!(
                "scan interval {} is not 0..=9",
                self.scan_interval
            )));
        }
        if self.scan_count > 99 {
            return Err(Error::invalid_argument(format!(
                "scan count {} is not 0..=99",
                self.scan_count
            )));
        }
        Ok(())
    }
}

impl Default for ScanRequestParams {
    /// The window 10..=750, no clustering, one scan.
    fn default() -> ScanRequestParams {
        ScanRequestParams {
            start_step: HOKUYO_DEFAULT_START_STEP,
            end_step: HOKUYO_DEFAULT_END_STEP,
            cluster_count: HOKUYO_DEFAULT_CLUSTER_COUNT,
            scan_interval: HOKUYO_DEFAULT_SCAN_INTERVAL,
            scan_count: HOKUYO_DEFAULT_SCAN_COUNT,
        }
    }
}

/// `(end - start + 1) / cluster`, 0 for an empty window or a zero cluster count.
pub(crate) fn sample_count(start_step: u16, end_step: u16, cluster_count: u8) -> usize {
    if end_step < start_step || cluster_count == 0 {
        return 0;
    }
    (usize::from(end_step) - usize::from(start_step) + 1) / usize::from(cluster_count)
}

/// HS parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sensitivity {
    Normal,
    High,
}

/// One scan worth of range samples, in step order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistanceScan {
    samples: Vec<u32>,
    start_step: u16,
    cluster_count: u8,
    char_width: FieldWidth,
}

impl DistanceScan {
    pub(crate) fn new(
        samples: Vec<u32>,
        start_step: u16,
        cluster_count: u8,
        char_width: FieldWidth,
    ) -> DistanceScan {
        DistanceScan {
            samples,
            start_step,
            cluster_count,
            char_width,
        }
    }

    /// Distances in millimeters as reported by the sensor.
    pub fn samples(&self) -> &[u32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn start_step(&self) -> u16 {
        self.start_step
    }

    pub fn cluster_count(&self) -> u8 {
        self.cluster_count
    }

    /// 2 for MS/GS scans, 3 for MD/GD scans.
    pub fn char_width(&self) -> FieldWidth {
        self.char_width
    }

    /// First step covered by sample `index`.
    pub fn step_of(&self, index: usize) -> usize {
        usize::from(self.start_step) + index * usize::from(self.cluster_count)
    }

    /// `(step, distance)` pairs in step order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.samples
            .iter()
            .enumerate()
            .map(move |(i, d)| (self.step_of(i), *d))
    }

    pub fn into_samples(self) -> Vec<u32> {
        self.samples
    }
}

/// A decoded scan data message.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanReply {
    pub scan: DistanceScan,
    /// Sensor time in milliseconds when the scan was taken (24 bits, wraps).
    pub timestamp: u32,
    /// Scans still to come for MD/MS, `Some(0)` for the last or a continuous scan.
    pub remaining_scans: Option<u8>,
    /// Non-fatal checksum faults; the affected samples may be corrupt.
    pub faults: Vec<ProtocolFault>,
}

impl ScanReply {
    /// `true` if every block passed its checksum.
    pub fn is_intact(&self) -> bool {
        self.faults.is_empty()
    }
}

/// `KEY:value` pairs returned by VV, PP and II, in the order received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInfo {
    entries: Vec<(String, String)>,
}

impl DeviceInfo {
    pub(crate) fn push(&mut self, key: String, value: String) {
        self.entries.push((key, value));
    }

    /// Value of the first entry named `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Value of `key` parsed as a number, e.g. `DMAX` or `SCAN` in a PP reply.
    pub fn get_number(&self, key: &str) -> Option<u32> {
        self.get(key)
            .and_then(|v| v.split_whitespace().next())
            .and_then(|v| v.parse().ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The decoded content of a successful reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyPayload {
    /// Status-only reply.
    Status(StatusCode),
    /// TM1 reply: sensor time in milliseconds.
    Time(u32),
    /// VV/PP/II reply.
    Info(DeviceInfo),
    /// MD/MS/GD/GS data message.
    Scan(ScanReply),
}

/// The result of one command/reply exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    Ok(ReplyPayload),
    /// The reply broke the protocol; `status` is set when the status line was read.
    ProtocolError {
        fault: ProtocolFault,
        status: Option<StatusCode>,
    },
    /// The sensor rejected the command.
    DeviceError(DeviceError),
}

impl ReplyOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ReplyOutcome::Ok(_))
    }

    /// Converts the outcome into a `Result`, dropping the status of a protocol error.
    pub fn into_result(self) -> Result<ReplyPayload> {
        match self {
            ReplyOutcome::Ok(payload) => Ok(payload),
            ReplyOutcome::ProtocolError { fault, .. } => Err(Error::Protocol(fault)),
            ReplyOutcome::DeviceError(err) => Err(Error::Device(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::DeviceCondition;
    use crate::cmds::CommandKind;

    #[test]
    fn sample_count_rounds_down() {
        assert_eq!(ScanRequestParams::new(10, 19, 2).sample_count(), 5);
        assert_eq!(ScanRequestParams::new(10, 20, 2).sample_count(), 5);
        assert_eq!(ScanRequestParams::new(10, 750, 1).sample_count(), 741);
        assert_eq!(ScanRequestParams::new(0, 768, 3).sample_count(), 256);
        assert_eq!(sample_count(5, 4, 1), 0);
        assert_eq!(sample_count(0, 10, 0), 0);
    }

    #[test]
    fn default_window() {
        let params = ScanRequestParams::default();
        assert_eq!(params.start_step, 10);
        assert_eq!(params.end_step, 750);
        assert!(!params.is_continuous());
        assert!(params.validate().is_ok());
    }

    #[test]
    fn validation_bounds() {
        assert!(ScanRequestParams::new(10, 10, 1).validate().is_err());
        assert!(ScanRequestParams::new(20, 10, 1).validate().is_err());
        assert!(ScanRequestParams::new(0, 10_000, 1).validate().is_err());
        assert!(ScanRequestParams::new(0, 9999, 99).validate().is_ok());
        assert!(ScanRequestParams::new(0, 10, 0).validate().is_err());
        assert!(ScanRequestParams::new(0, 10, 100).validate().is_err());
        assert!(ScanRequestParams::new(0, 10, 1)
            .with_scan_interval(10)
            .validate()
            .is_err());
        assert!(ScanRequestParams::new(0, 10, 1)
            .with_scan_count(100)
            .validate()
            .is_err());
        assert!(ScanRequestParams::continuous(0, 10, 1).is_continuous());
    }

    #[test]
    fn scan_steps_follow_cluster_count() {
        let scan = DistanceScan::new(vec![100, 200, 300], 44, 3, FieldWidth::Three);
        let steps: Vec<_> = scan.iter().collect();
        assert_eq!(steps, vec![(44, 100), (47, 200), (50, 300)]);
        assert_eq!(scan.len(), 3);
        assert_eq!(scan.into_samples(), vec![100, 200, 300]);
    }

    #[test]
    fn device_info_lookup() {
        let mut info = DeviceInfo::default();
        info.push("MODL".into(), "URG-04LX".into());
        info.push("DMAX".into(), "5600".into());
        info.push("SCAN".into(), "600 [rpm]".into());
        assert_eq!(info.get("MODL"), Some("URG-04LX"));
        assert_eq!(info.get_number("DMAX"), Some(5600));
        assert_eq!(info.get_number("SCAN"), Some(600));
        assert_eq!(info.get("VEND"), None);
        assert_eq!(info.len(), 3);
    }

    #[test]
    fn outcome_into_result() {
        let ok = ReplyOutcome::Ok(ReplyPayload::Time(42));
        assert!(ok.is_ok());
        assert_eq!(ok.into_result().unwrap(), ReplyPayload::Time(42));

        let device = ReplyOutcome::DeviceError(DeviceError {
            kind: CommandKind::LaserOn,
            status: StatusCode(*b"01"),
            condition: DeviceCondition::LaserMalfunction,
        });
        match device.into_result() {
            Err(err) => assert_eq!(err.status(), Some(StatusCode(*b"01"))),
            Ok(_) => panic!("device error converted to success"),
        }
    }
}
