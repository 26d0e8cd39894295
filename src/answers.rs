use crate::cmds::CommandKind;
use std::fmt;

/// Status code for a command that was accepted without error.
pub const HOKUYO_STATUS_OK: StatusCode = StatusCode(*b"00");

/// Status code heading every data message of a running MD/MS scan.
pub const HOKUYO_STATUS_DATA: StatusCode = StatusCode(*b"99");

/// The two status characters following the echo of every reply.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub [u8; 2]);

impl StatusCode {
    pub fn as_bytes(&self) -> &[u8; 2] {
        &self.0
    }

    /// The decimal value of the status, or `None` if it is not two digits.
    pub fn as_number(&self) -> Option<u8> {
        let [hi, lo] = self.0;
        if hi.is_ascii_digit() && lo.is_ascii_digit() {
            Some((hi - b'0') * 10 + (lo - b'0'))
        } else {
            None
        }
    }
}

impl fmt::Debug for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StatusCode({})", self)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// What a non-success status means for the command it answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCondition {
    NonNumericStartStep,
    NonNumericEndStep,
    NonNumericClusterCount,
    EndStepOutOfRange,
    EndStepBeforeStartStep,
    NonNumericScanInterval,
    NonNumericScanCount,
    /// GD/GS was requested while the laser is off.
    LaserOff,
    /// Processing stopped to verify an error (21-49).
    ProcessingStopped(u8),
    /// Laser, motor or other hardware malfunction (50-97).
    HardwareFault(u8),
    /// The sensor is resuming after a malfunction.
    Recovering,
    LaserMalfunction,
    LaserAlreadyOn,
    InvalidControlCode,
    AdjustModeAlreadyOn,
    AdjustModeAlreadyOff,
    AdjustModeOff,
    NonNumericBitRate,
    InvalidBitRate,
    AlreadyAtBitRate,
    InvalidSpeed,
    SpeedOutOfRange,
    AlreadyAtSpeed,
    InvalidParameter,
    AlreadyInMode,
    /// The sensor model does not support the command.
    NotSupported,
    /// A status with no documented meaning for this command.
    Undocumented,
}

impl fmt::Display for DeviceCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceCondition::NonNumericStartStep => write!(f, "starting step has non-numeric value"),
            DeviceCondition::NonNumericEndStep => write!(f, "end step has non-numeric value"),
            DeviceCondition::NonNumericClusterCount => write!(f, "cluster count has non-numeric value"),
            DeviceCondition::EndStepOutOfRange => write!(f, "end step is out of range"),
            DeviceCondition::EndStepBeforeStartStep => write!(f, "end step is smaller than starting step"),
            DeviceCondition::NonNumericScanInterval => write!(f, "scan interval has non-numeric value"),
            DeviceCondition::NonNumericScanCount => write!(f, "number of scans has non-numeric value"),
            DeviceCondition::LaserOff => write!(f, "laser is off"),
            DeviceCondition::ProcessingStopped(code) => write!(f, "processing stopped to verify error {}", code),
            DeviceCondition::HardwareFault(code) => write!(f, "hardware trouble {}", code),
            DeviceCondition::Recovering => write!(f, "resuming after malfunction"),
            DeviceCondition::LaserMalfunction => write!(f, "unable to control laser due to malfunction"),
            DeviceCondition::LaserAlreadyOn => write!(f, "laser is already on"),
            DeviceCondition::InvalidControlCode => write!(f, "invalid control code"),
            DeviceCondition::AdjustModeAlreadyOn => write!(f, "adjust mode is already on"),
            DeviceCondition::AdjustModeAlreadyOff => write!(f, "adjust mode is already off"),
            DeviceCondition::AdjustModeOff => write!(f, "adjust mode is off when time was requested"),
            DeviceCondition::NonNumericBitRate => write!(f, "bit rate has non-numeric value"),
            DeviceCondition::InvalidBitRate => write!(f, "invalid bit rate"),
            DeviceCondition::AlreadyAtBitRate => write!(f, "sensor is already running at the bit rate"),
            DeviceCondition::InvalidSpeed => write!(f, "invalid speed ratio"),
            DeviceCondition::SpeedOutOfRange => write!(f, "speed ratio is out of range"),
            DeviceCondition::AlreadyAtSpeed => write!(f, "motor is already running at the speed"),
            DeviceCondition::InvalidParameter => write!(f, "invalid parameter"),
            DeviceCondition::AlreadyInMode => write!(f, "sensor is already in the requested mode"),
            DeviceCondition::NotSupported => write!(f, "not supported by this sensor model"),
            DeviceCondition::Undocumented => write!(f, "undocumented status"),
        }
    }
}

/// The sensor rejected a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{kind:?} answered status {status}: {condition}")]
pub struct DeviceError {
    pub kind: CommandKind,
    pub status: StatusCode,
    pub condition: DeviceCondition,
}

impl DeviceError {
    /// The numeric status code, if the status is two digits.
    pub fn code(&self) -> Option<u8> {
        self.status.as_number()
    }
}

/// How a status code is to be treated for a given command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusVerdict {
    /// `00`: command accepted.
    Accepted,
    /// `99`: a data message of a running MD/MS scan follows.
    DataFollows,
    Rejected(DeviceCondition),
}

/// Maps `status` to its meaning for `kind`.
pub fn interpret_status(kind: CommandKind, status: StatusCode) -> StatusVerdict {
    if status == HOKUYO_STATUS_OK {
        return StatusVerdict::Accepted;
    }
    if status == HOKUYO_STATUS_DATA && kind.is_multi_scan() {
        return StatusVerdict::DataFollows;
    }

    let code = match status.as_number() {
        Some(code) => code,
        None => return StatusVerdict::Rejected(DeviceCondition::Undocumented),
    };

    let condition = match kind {
        k if k.is_scan() => scan_condition(k, code),
        CommandKind::LaserOn => match code {
            1 => DeviceCondition::LaserMalfunction,
            2 => DeviceCondition::LaserAlreadyOn,
            _ => DeviceCondition::Undocumented,
        },
        CommandKind::TimeAdjust => match code {
            1 => DeviceCondition::InvalidControlCode,
            2 => DeviceCondition::AdjustModeAlreadyOn,
            3 => DeviceCondition::AdjustModeAlreadyOff,
            4 => DeviceCondition::AdjustModeOff,
            _ => DeviceCondition::Undocumented,
        },
        CommandKind::SetBitRate => match code {
            1 => DeviceCondition::NonNumericBitRate,
            2 => DeviceCondition::InvalidBitRate,
            3 => DeviceCondition::AlreadyAtBitRate,
            4 => DeviceCondition::NotSupported,
            _ => DeviceCondition::Undocumented,
        },
        CommandKind::SetMotorSpeed => match code {
            1 => DeviceCondition::InvalidSpeed,
            2 => DeviceCondition::SpeedOutOfRange,
            3 => DeviceCondition::AlreadyAtSpeed,
            4 => DeviceCondition::NotSupported,
            _ => DeviceCondition::Undocumented,
        },
        CommandKind::SetSensitivity => match code {
            1 => DeviceCondition::InvalidParameter,
            2 => DeviceCondition::AlreadyInMode,
            3 => DeviceCondition::NotSupported,
            _ => DeviceCondition::Undocumented,
        },
        _ => DeviceCondition::Undocumented,
    };
    StatusVerdict::Rejected(condition)
}

fn scan_condition(kind: CommandKind, code: u8) -> DeviceCondition {
    match code {
        1 => DeviceCondition::NonNumericStartStep,
        2 => DeviceCondition::NonNumericEndStep,
        3 => DeviceCondition::NonNumericClusterCount,
        4 => DeviceCondition::EndStepOutOfRange,
        5 => DeviceCondition::EndStepBeforeStartStep,
        6 if kind.is_multi_scan() => DeviceCondition::NonNumericScanInterval,
        7 if kind.is_multi_scan() => DeviceCondition::NonNumericScanCount,
        10 if !kind.is_multi_scan() => DeviceCondition::LaserOff,
        21..=49 => DeviceCondition::ProcessingStopped(code),
        50..=97 => DeviceCondition::HardwareFault(code),
        98 => DeviceCondition::Recovering,
        _ => DeviceCondition::Undocumented,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(s: &[u8; 2]) -> StatusCode {
        StatusCode(*s)
    }

    #[test]
    fn status_numbers() {
        assert_eq!(status(b"05").as_number(), Some(5));
        assert_eq!(status(b"98").as_number(), Some(98));
        assert_eq!(status(b"0L").as_number(), None);
        assert_eq!(status(b"0L").to_string(), "0L");
    }

    #[test]
    fn ok_is_accepted_for_every_kind() {
        for kind in [
            CommandKind::AcquireMultiScan3Char,
            CommandKind::AcquireLatest2Char,
            CommandKind::LaserOn,
            CommandKind::GetState,
        ] {
            assert_eq!(interpret_status(kind, HOKUYO_STATUS_OK), StatusVerdict::Accepted);
        }
    }

    #[test]
    fn data_status_only_for_multi_scans() {
        assert_eq!(
            interpret_status(CommandKind::AcquireMultiScan2Char, HOKUYO_STATUS_DATA),
            StatusVerdict::DataFollows
        );
        assert_eq!(
            interpret_status(CommandKind::AcquireLatest3Char, HOKUYO_STATUS_DATA),
            StatusVerdict::Rejected(DeviceCondition::Undocumented)
        );
    }

    #[test]
    fn scan_status_table() {
        let md = CommandKind::AcquireMultiScan3Char;
        let gd = CommandKind::AcquireLatest3Char;
        assert_eq!(
            interpret_status(md, status(b"05")),
            StatusVerdict::Rejected(DeviceCondition::EndStepBeforeStartStep)
        );
        assert_eq!(
            interpret_status(md, status(b"07")),
            StatusVerdict::Rejected(DeviceCondition::NonNumericScanCount)
        );
        assert_eq!(
            interpret_status(gd, status(b"07")),
            StatusVerdict::Rejected(DeviceCondition::Undocumented)
        );
        assert_eq!(
            interpret_status(gd, status(b"10")),
            StatusVerdict::Rejected(DeviceCondition::LaserOff)
        );
        assert_eq!(
            interpret_status(md, status(b"30")),
            StatusVerdict::Rejected(DeviceCondition::ProcessingStopped(30))
        );
        assert_eq!(
            interpret_status(md, status(b"50")),
            StatusVerdict::Rejected(DeviceCondition::HardwareFault(50))
        );
        assert_eq!(
            interpret_status(md, status(b"97")),
            StatusVerdict::Rejected(DeviceCondition::HardwareFault(97))
        );
        assert_eq!(
            interpret_status(md, status(b"98")),
            StatusVerdict::Rejected(DeviceCondition::Recovering)
        );
    }

    #[test]
    fn command_specific_tables() {
        assert_eq!(
            interpret_status(CommandKind::LaserOn, status(b"02")),
            StatusVerdict::Rejected(DeviceCondition::LaserAlreadyOn)
        );
        assert_eq!(
            interpret_status(CommandKind::TimeAdjust, status(b"04")),
            StatusVerdict::Rejected(DeviceCondition::AdjustModeOff)
        );
        assert_eq!(
            interpret_status(CommandKind::SetBitRate, status(b"02")),
            StatusVerdict::Rejected(DeviceCondition::InvalidBitRate)
        );
        assert_eq!(
            interpret_status(CommandKind::SetMotorSpeed, status(b"03")),
            StatusVerdict::Rejected(DeviceCondition::AlreadyAtSpeed)
        );
        assert_eq!(
            interpret_status(CommandKind::LaserOff, status(b"01")),
            StatusVerdict::Rejected(DeviceCondition::Undocumented)
        );
    }

    #[test]
    fn device_error_reports_code() {
        let err = DeviceError {
            kind: CommandKind::AcquireMultiScan3Char,
            status: status(b"05"),
            condition: DeviceCondition::EndStepBeforeStartStep,
        };
        assert_eq!(err.code(), Some(5));
        assert_eq!(
            err.to_string(),
            "AcquireMultiScan3Char answered status 05: end step is smaller than starting step"
        );
    }
}
