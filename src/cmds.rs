use crate::base::{Error, Result};
use crate::codec::FieldWidth;
use crate::internals::{LF, MAX_TAG_LEN};
use crate::types::{ScanRequestParams, Sensitivity};
use log::trace;

// Sensor data acquisition

/// Continuous/multi scan, 3-character encoded distances.
pub const HOKUYO_CMD_MD: [u8; 2] = *b"MD";
/// Continuous/multi scan, 2-character encoded distances.
pub const HOKUYO_CMD_MS: [u8; 2] = *b"MS";
/// Latest scan, 3-character encoded distances.
pub const HOKUYO_CMD_GD: [u8; 2] = *b"GD";
/// Latest scan, 2-character encoded distances.
pub const HOKUYO_CMD_GS: [u8; 2] = *b"GS";

// Sensor control

/// Switches the laser on and enables measurement.
pub const HOKUYO_CMD_BM: [u8; 2] = *b"BM";
/// Switches the laser off and stops any running scan.
pub const HOKUYO_CMD_QT: [u8; 2] = *b"QT";
/// Resets motor speed, bit rate and timer to their defaults and switches the laser off.
pub const HOKUYO_CMD_RS: [u8; 2] = *b"RS";
/// Time adjust mode; followed by a control code digit.
pub const HOKUYO_CMD_TM: [u8; 2] = *b"TM";
/// RS232 bit rate.
pub const HOKUYO_CMD_SS: [u8; 2] = *b"SS";
/// Motor speed.
pub const HOKUYO_CMD_CR: [u8; 2] = *b"CR";
/// Normal/high sensitivity.
pub const HOKUYO_CMD_HS: [u8; 2] = *b"HS";
/// Malfunction simulation.
pub const HOKUYO_CMD_DB: [u8; 2] = *b"DB";

// Sensor information

pub const HOKUYO_CMD_VV: [u8; 2] = *b"VV";
pub const HOKUYO_CMD_PP: [u8; 2] = *b"PP";
pub const HOKUYO_CMD_II: [u8; 2] = *b"II";

/// Bit rates accepted by the SS command.
pub const HOKUYO_BIT_RATES: [u32; 7] = [19_200, 38_400, 57_600, 115_200, 250_000, 500_000, 750_000];

/// CR speed parameter that restores the initial motor speed.
pub const HOKUYO_MOTOR_SPEED_RESET: u8 = 99;

/// The logical command a reply answers, taken from its echoed symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    AcquireMultiScan3Char,
    AcquireMultiScan2Char,
    AcquireLatest3Char,
    AcquireLatest2Char,
    LaserOn,
    LaserOff,
    Reset,
    TimeAdjust,
    SetBitRate,
    SetMotorSpeed,
    SetSensitivity,
    SimulateMalfunction,
    GetVersion,
    GetSpecs,
    GetState,
    Unknown,
}

/// Symbols in classification order.
static KNOWN_COMMANDS: [([u8; 2], CommandKind); 15] = [
    (HOKUYO_CMD_MD, CommandKind::AcquireMultiScan3Char),
    (HOKUYO_CMD_MS, CommandKind::AcquireMultiScan2Char),
    (HOKUYO_CMD_GD, CommandKind::AcquireLatest3Char),
    (HOKUYO_CMD_GS, CommandKind::AcquireLatest2Char),
    (HOKUYO_CMD_BM, CommandKind::LaserOn),
    (HOKUYO_CMD_QT, CommandKind::LaserOff),
    (HOKUYO_CMD_RS, CommandKind::Reset),
    (HOKUYO_CMD_TM, CommandKind::TimeAdjust),
    (HOKUYO_CMD_SS, CommandKind::SetBitRate),
    (HOKUYO_CMD_CR, CommandKind::SetMotorSpeed),
    (HOKUYO_CMD_HS, CommandKind::SetSensitivity),
    (HOKUYO_CMD_DB, CommandKind::SimulateMalfunction),
    (HOKUYO_CMD_VV, CommandKind::GetVersion),
    (HOKUYO_CMD_PP, CommandKind::GetSpecs),
    (HOKUYO_CMD_II, CommandKind::GetState),
];

impl CommandKind {
    /// Classifies the first two bytes of `symbol`.
    ///
    /// Anything shorter than two bytes or not matching a known symbol is `Unknown`.
    pub fn classify(symbol: &[u8]) -> CommandKind {
        let prefix = match symbol.get(..2) {
            Some(prefix) => prefix,
            None => return CommandKind::Unknown,
        };
        KNOWN_COMMANDS
            .iter()
            .find(|(known, _)| known[..] == *prefix)
            .map(|(_, kind)| *kind)
            .unwrap_or(CommandKind::Unknown)
    }

    /// The two-letter symbol of the command; `None` for `Unknown`.
    pub fn symbol(self) -> Option<&'static [u8; 2]> {
        KNOWN_COMMANDS
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(symbol, _)| symbol)
    }

    /// Width of one encoded distance for the scan kinds.
    pub fn char_width(self) -> Option<FieldWidth> {
        match self {
            CommandKind::AcquireMultiScan3Char | CommandKind::AcquireLatest3Char => {
                Some(FieldWidth::Three)
            }
            CommandKind::AcquireMultiScan2Char | CommandKind::AcquireLatest2Char => {
                Some(FieldWidth::Two)
            }
            _ => None,
        }
    }

    /// `true` for MD, MS, GD and GS.
    pub fn is_scan(self) -> bool {
        self.char_width().is_some()
    }

    /// `true` for MD and MS.
    pub fn is_multi_scan(self) -> bool {
        matches!(
            self,
            CommandKind::AcquireMultiScan3Char | CommandKind::AcquireMultiScan2Char
        )
    }

    /// `true` for VV, PP and II, whose replies carry `KEY:value;sum` lines.
    pub fn is_info(self) -> bool {
        matches!(
            self,
            CommandKind::GetVersion | CommandKind::GetSpecs | CommandKind::GetState
        )
    }
}

/// Convenience wrapper for [`CommandKind::classify`].
pub fn classify(symbol: &[u8]) -> CommandKind {
    CommandKind::classify(symbol)
}

/// Control code of the TM command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAdjust {
    ModeOn,
    RequestTime,
    ModeOff,
}

impl TimeAdjust {
    pub fn control_code(self) -> u8 {
        match self {
            TimeAdjust::ModeOn => b'0',
            TimeAdjust::RequestTime => b'1',
            TimeAdjust::ModeOff => b'2',
        }
    }
}

/// A host to sensor command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// MD (3 characters) or MS (2 characters).
    MultiScan {
        width: FieldWidth,
        params: ScanRequestParams,
    },
    /// GD (3 characters) or GS (2 characters). Interval and scan count are not sent.
    LatestScan {
        width: FieldWidth,
        params: ScanRequestParams,
    },
    LaserOn,
    LaserOff,
    Reset,
    TimeAdjust(TimeAdjust),
    SetBitRate(u32),
    /// 0 = default, 1..=10 = speed levels, 99 = back to initial speed.
    SetMotorSpeed(u8),
    SetSensitivity(Sensitivity),
    /// 1..=5 or 10.
    SimulateMalfunction(u8),
    GetVersion,
    GetSpecs,
    GetState,
}

impl Command {
    /// The symbol family of this command. Scans with 4-char samples have no symbol.
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::MultiScan { width, .. } => match width {
                FieldWidth::Two => CommandKind::AcquireMultiScan2Char,
                FieldWidth::Three => CommandKind::AcquireMultiScan3Char,
                FieldWidth::Four => CommandKind::Unknown,
            },
            Command::LatestScan { width, .. } => match width {
                FieldWidth::Two => CommandKind::AcquireLatest2Char,
                FieldWidth::Three => CommandKind::AcquireLatest3Char,
                FieldWidth::Four => CommandKind::Unknown,
            },
            Command::LaserOn => CommandKind::LaserOn,
            Command::LaserOff => CommandKind::LaserOff,
            Command::Reset => CommandKind::Reset,
            Command::TimeAdjust(_) => CommandKind::TimeAdjust,
            Command::SetBitRate(_) => CommandKind::SetBitRate,
            Command::SetMotorSpeed(_) => CommandKind::SetMotorSpeed,
            Command::SetSensitivity(_) => CommandKind::SetSensitivity,
            Command::SimulateMalfunction(_) => CommandKind::SimulateMalfunction,
            Command::GetVersion => CommandKind::GetVersion,
            Command::GetSpecs => CommandKind::GetSpecs,
            Command::GetState => CommandKind::GetState,
        }
    }

    /// Formats the command line, `symbol + parameters [+ ;tag] + LF`.
    ///
    /// # Arguments
    ///
    /// * `tag` - Optional string echoed back by the sensor to correlate replies.
    ///
    /// # Example
    /// ```
    /// use hokuyo::cmds::Command;
    /// assert_eq!(Command::SetMotorSpeed(5).encode(None).unwrap(), b"CR05\n");
    /// assert_eq!(Command::LaserOn.encode(Some("go")).unwrap(), b"BM;go\n");
    /// ```
    pub fn encode(&self, tag: Option<&str>) -> Result<Vec<u8>> {
        let mut line = Vec::with_capacity(2 + 13 + 1 + MAX_TAG_LEN + 1);
        if let Some(symbol) = self.kind().symbol() {
            line.extend_from_slice(symbol);
        }

        let params = match self {
            Command::MultiScan { width, params } => {
                check_scan_width(*width)?;
                params.validate()?;
                format!(
                    "{:04}{:04}{:02}{:01}{:02}",
                    params.start_step,
                    params.end_step,
                    params.cluster_count,
                    params.scan_interval,
                    params.scan_count
                )
            }
            Command::LatestScan { width, params } => {
                check_scan_width(*width)?;
                params.validate()?;
                format!(
                    "{:04}{:04}{:02}",
                    params.start_step, params.end_step, params.cluster_count
                )
            }
            Command::TimeAdjust(control) => (control.control_code() as char).to_string(),
            Command::SetBitRate(rate) => {
                if !HOKUYO_BIT_RATES.contains(rate) {
                    return Err(Error::invalid_argument(format!(
                        "unsupported bit rate {}",
                        rate
                    )));
                }
                format!("{:06}", rate)
            }
            Command::SetMotorSpeed(speed) => {
                if *speed > 10 && *speed != HOKUYO_MOTOR_SPEED_RESET {
                    return Err(Error::invalid_argument(format!(
                        "motor speed {} is not 0..=10 or 99",
                        speed
                    )));
                }
                format!("{:02}", speed)
            }
            Command::SetSensitivity(sensitivity) => match sensitivity {
                Sensitivity::Normal => "0".to_owned(),
                Sensitivity::High => "1".to_owned(),
            },
            Command::SimulateMalfunction(code) => {
                if !((1..=5).contains(code) || *code == 10) {
                    return Err(Error::invalid_argument(format!(
                        "malfunction code {} is not 1..=5 or 10",
                        code
                    )));
                }
                format!("{:02}", code)
            }
            _ => String::new(),
        };
        line.extend_from_slice(params.as_bytes());

        if let Some(tag) = tag {
            check_tag(tag)?;
            line.push(b';');
            line.extend_from_slice(tag.as_bytes());
        }
        line.push(LF);

        trace!(
            "Encoded {:?} as {:?}",
            self.kind(),
            String::from_utf8_lossy(&line)
        );
        Ok(line)
    }
}

fn check_scan_width(width: FieldWidth) -> Result<()> {
    match width {
        FieldWidth::Two | FieldWidth::Three => Ok(()),
        FieldWidth::Four => Err(Error::invalid_argument(
            "scan distances are encoded with 2 or 3 characters",
        )),
    }
}

fn check_tag(tag: &str) -> Result<()> {
    if tag.len() > MAX_TAG_LEN {
        return Err(Error::invalid_argument(format!(
            "tag {:?} is longer than {} characters",
            tag, MAX_TAG_LEN
        )));
    }
    let valid = |c: char| c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | '_' | '+' | '@');
    if let Some(c) = tag.chars().find(|c| !valid(*c)) {
        return Err(Error::invalid_argument(format!(
            "character {:?} is not allowed in a tag",
            c
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_symbol_classifies_to_its_kind() {
        for (symbol, kind) in KNOWN_COMMANDS.iter() {
            assert_eq!(classify(symbol), *kind);
            assert_eq!(kind.symbol(), Some(symbol));
        }
        // all kinds are distinct
        for (i, (_, a)) in KNOWN_COMMANDS.iter().enumerate() {
            for (_, b) in KNOWN_COMMANDS.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn anything_else_is_unknown() {
        assert_eq!(classify(b"XX"), CommandKind::Unknown);
        assert_eq!(classify(b"md"), CommandKind::Unknown);
        assert_eq!(classify(b"$$"), CommandKind::Unknown);
        assert_eq!(classify(b"M"), CommandKind::Unknown);
        assert_eq!(classify(b""), CommandKind::Unknown);
        assert_eq!(CommandKind::Unknown.symbol(), None);
    }

    #[test]
    fn only_the_prefix_matters() {
        assert_eq!(classify(b"MD0010075001101"), CommandKind::AcquireMultiScan3Char);
        assert_eq!(classify(b"TM1"), CommandKind::TimeAdjust);
    }

    #[test]
    fn scan_kind_widths() {
        assert_eq!(CommandKind::AcquireMultiScan3Char.char_width(), Some(FieldWidth::Three));
        assert_eq!(CommandKind::AcquireLatest2Char.char_width(), Some(FieldWidth::Two));
        assert_eq!(CommandKind::LaserOn.char_width(), None);
        assert!(CommandKind::AcquireMultiScan2Char.is_multi_scan());
        assert!(!CommandKind::AcquireLatest3Char.is_multi_scan());
        assert!(CommandKind::GetSpecs.is_info());
    }

    #[test]
    fn scan_commands_are_zero_padded() {
        let params = ScanRequestParams::default();
        let md = Command::MultiScan {
            width: FieldWidth::Three,
            params: params.clone(),
        };
        assert_eq!(md.encode(None).unwrap(), b"MD0010075001101\n");
        assert_eq!(md.kind(), CommandKind::AcquireMultiScan3Char);

        let gs = Command::LatestScan {
            width: FieldWidth::Two,
            params,
        };
        assert_eq!(gs.encode(None).unwrap(), b"GS0010075001\n");
        assert_eq!(gs.kind(), CommandKind::AcquireLatest2Char);
    }

    #[test]
    fn continuous_scan_sends_zero_count() {
        let ms = Command::MultiScan {
            width: FieldWidth::Two,
            params: ScanRequestParams::continuous(44, 725, 2),
        };
        assert_eq!(ms.encode(None).unwrap(), b"MS0044072502000\n");
    }

    #[test]
    fn control_commands() {
        assert_eq!(Command::LaserOff.encode(None).unwrap(), b"QT\n");
        assert_eq!(Command::Reset.encode(None).unwrap(), b"RS\n");
        assert_eq!(Command::TimeAdjust(TimeAdjust::RequestTime).encode(None).unwrap(), b"TM1\n");
        assert_eq!(Command::SetBitRate(19_200).encode(None).unwrap(), b"SS019200\n");
        assert_eq!(Command::SetBitRate(500_000).encode(None).unwrap(), b"SS500000\n");
        assert_eq!(Command::SetMotorSpeed(99).encode(None).unwrap(), b"CR99\n");
        assert_eq!(Command::SetSensitivity(Sensitivity::High).encode(None).unwrap(), b"HS1\n");
        assert_eq!(Command::SimulateMalfunction(10).encode(None).unwrap(), b"DB10\n");
        assert_eq!(Command::GetState.encode(Some("a.b")).unwrap(), b"II;a.b\n");
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(Command::SetBitRate(50_000).encode(None).is_err());
        assert!(Command::SetMotorSpeed(11).encode(None).is_err());
        assert!(Command::SimulateMalfunction(0).encode(None).is_err());
        assert!(Command::SimulateMalfunction(6).encode(None).is_err());
        assert!(Command::SimulateMalfunction(5).encode(None).is_ok());
        assert!(Command::MultiScan {
            width: FieldWidth::Four,
            params: ScanRequestParams::default(),
        }
        .encode(None)
        .is_err());
    }

    #[test]
    fn four_char_scans_have_no_symbol() {
        let scan = Command::LatestScan {
            width: FieldWidth::Four,
            params: ScanRequestParams::default(),
        };
        assert_eq!(scan.kind(), CommandKind::Unknown);
        assert!(matches!(scan.encode(None), Err(Error::InvalidArgument { .. })));
        let multi = Command::MultiScan {
            width: FieldWidth::Four,
            params: ScanRequestParams::default(),
        };
        assert_eq!(multi.kind(), CommandKind::Unknown);
    }

    #[test]
    fn tags_are_validated() {
        assert!(Command::LaserOn.encode(Some("0123456789abcdef")).is_ok());
        assert!(Command::LaserOn.encode(Some("0123456789abcdefg")).is_err());
        assert!(Command::LaserOn.encode(Some("semi;colon")).is_err());
        assert!(Command::LaserOn.encode(Some("a b+c@d_e")).is_ok());
    }
}
