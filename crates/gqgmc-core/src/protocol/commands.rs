//! Protocol commands
//!
//! Defines the commands of the GQ-RFC1201 protocol used by this monitor.

use serde::{Deserialize, Serialize};

use super::CONFIG_BLOCK_SIZE;

/// Protocol commands for GMC communication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Firmware model and version (`<GETVER>>`)
    GetVersion,

    /// Device serial number (`<GETSERIAL>>`)
    GetSerial,

    /// Real-time clock (`<GETDATETIME>>`)
    GetDateTime,

    /// Set the real-time clock (`<SETDATETIME[YYMMDDHHMMSS]>>`)
    SetDateTime,

    /// Counts per minute (`<GETCPM>>`)
    GetCpm,

    /// Battery voltage (`<GETVOLT>>`)
    GetVoltage,

    /// Temperature (`<GETTEMP>>`)
    GetTemperature,

    /// Gyroscope orientation (`<GETGYRO>>`)
    GetOrientation,

    /// Configuration block including calibration (`<GETCFG>>`)
    GetConfig,
}

/// How many bytes a complete response holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Exactly this many bytes; anything else is malformed
    Exact(usize),
    /// At least this many bytes; trailing bytes are ignored by decoders
    AtLeast(usize),
    /// No known length; the response ends when the line goes quiet
    Unframed,
}

impl Command {
    /// All commands, in protocol document order
    pub const ALL: [Command; 9] = [
        Command::GetVersion,
        Command::GetSerial,
        Command::GetDateTime,
        Command::SetDateTime,
        Command::GetCpm,
        Command::GetVoltage,
        Command::GetTemperature,
        Command::GetOrientation,
        Command::GetConfig,
    ];

    /// Keyword placed between `<` and `>>`
    pub fn keyword(&self) -> &'static str {
        match self {
            Command::GetVersion => "GETVER",
            Command::GetSerial => "GETSERIAL",
            Command::GetDateTime => "GETDATETIME",
            Command::SetDateTime => "SETDATETIME",
            Command::GetCpm => "GETCPM",
            Command::GetVoltage => "GETVOLT",
            Command::GetTemperature => "GETTEMP",
            Command::GetOrientation => "GETGYRO",
            Command::GetConfig => "GETCFG",
        }
    }

    /// Expected response shape
    pub fn response_shape(&self) -> ResponseShape {
        match self {
            Command::GetVersion | Command::GetSerial => ResponseShape::Unframed,
            Command::GetDateTime => ResponseShape::AtLeast(6),
            Command::SetDateTime => ResponseShape::AtLeast(1),
            Command::GetCpm => ResponseShape::AtLeast(2),
            Command::GetVoltage => ResponseShape::AtLeast(1),
            Command::GetTemperature => ResponseShape::AtLeast(3),
            Command::GetOrientation => ResponseShape::AtLeast(6),
            Command::GetConfig => ResponseShape::Exact(CONFIG_BLOCK_SIZE),
        }
    }

    /// Check if the device needs settling time before its response is read
    pub fn needs_settle_delay(&self) -> bool {
        matches!(self, Command::GetConfig)
    }

    /// Check if this command carries an inline payload
    pub fn has_payload(&self) -> bool {
        matches!(self, Command::SetDateTime)
    }
}

impl ResponseShape {
    /// Number of bytes after which reading can stop
    pub fn target_len(&self) -> Option<usize> {
        match self {
            ResponseShape::Exact(n) | ResponseShape::AtLeast(n) => Some(*n),
            ResponseShape::Unframed => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_keywords() {
        assert_eq!(Command::GetVersion.keyword(), "GETVER");
        assert_eq!(Command::GetVoltage.keyword(), "GETVOLT");
        assert_eq!(Command::GetOrientation.keyword(), "GETGYRO");
        assert_eq!(Command::GetConfig.keyword(), "GETCFG");
    }

    #[test]
    fn test_only_config_settles() {
        let settling: Vec<Command> = Command::ALL
            .into_iter()
            .filter(|c| c.needs_settle_delay())
            .collect();
        assert_eq!(settling, vec![Command::GetConfig]);
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(
            Command::GetConfig.response_shape(),
            ResponseShape::Exact(256)
        );
        assert_eq!(Command::GetCpm.response_shape().target_len(), Some(2));
        assert_eq!(Command::GetSerial.response_shape().target_len(), None);
    }
}
