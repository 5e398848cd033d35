//! Response decoders
//!
//! One pure function per command. Offsets are zero-based within the raw
//! response. Integer telemetry fields are big-endian; the IEEE-754 floats in
//! the configuration block are little-endian. Both orders come from the
//! device firmware and must not be unified.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::{Command, DeviceTime, ProtocolError, CONFIG_BLOCK_SIZE};
use crate::calibration::{CalibrationPoint, CalibrationTable};

/// Offsets of (reference CPM, reference dose rate) for each calibration point
const CALIBRATION_OFFSETS: [(usize, usize); 3] = [(0x08, 0x0A), (0x0E, 0x10), (0x14, 0x16)];

/// Tri-axis gyroscope reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orientation {
    /// X axis, raw sensor units
    pub x: u16,
    /// Y axis, raw sensor units
    pub y: u16,
    /// Z axis, raw sensor units
    pub z: u16,
}

fn require(cmd: Command, data: &[u8], expected: usize) -> Result<(), ProtocolError> {
    if data.len() < expected {
        return Err(ProtocolError::ShortResponse {
            command: cmd,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

/// GETVER: whole response as text
pub fn decode_version(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

/// GETSERIAL: whole response as lowercase hex
pub fn decode_serial(data: &[u8]) -> String {
    data.iter().map(|b| format!("{:02x}", b)).collect()
}

/// GETDATETIME: bytes 0..6 as device clock fields
pub fn decode_datetime(data: &[u8]) -> Result<DeviceTime, ProtocolError> {
    require(Command::GetDateTime, data, 6)?;
    let mut raw = [0u8; 6];
    raw.copy_from_slice(&data[..6]);
    Ok(DeviceTime::from_bytes(&raw))
}

/// GETCPM: big-endian u16 at offset 0
pub fn decode_cpm(data: &[u8]) -> Result<u16, ProtocolError> {
    require(Command::GetCpm, data, 2)?;
    Ok(BigEndian::read_u16(&data[0..2]))
}

/// GETVOLT: byte 0 in tenths of a volt
pub fn decode_voltage(data: &[u8]) -> Result<f32, ProtocolError> {
    require(Command::GetVoltage, data, 1)?;
    Ok(f32::from(data[0]) / 10.0)
}

/// GETTEMP: sign-magnitude degrees Celsius
///
/// Byte 0 is the integer part and byte 1 the decimal digit; a nonzero byte 2
/// negates the value. The decimal digit goes through integer division by ten
/// before it is added, so it only contributes when it is 10 or more.
pub fn decode_temperature(data: &[u8]) -> Result<f32, ProtocolError> {
    require(Command::GetTemperature, data, 3)?;
    let value = f32::from(data[0]) + f32::from(data[1] / 10);
    Ok(if data[2] != 0 { -value } else { value })
}

/// GETGYRO: three big-endian u16 axes
pub fn decode_orientation(data: &[u8]) -> Result<Orientation, ProtocolError> {
    require(Command::GetOrientation, data, 6)?;
    Ok(Orientation {
        x: BigEndian::read_u16(&data[0..2]),
        y: BigEndian::read_u16(&data[2..4]),
        z: BigEndian::read_u16(&data[4..6]),
    })
}

/// GETCFG: calibration table from the 256-byte configuration block
pub fn decode_config(data: &[u8]) -> Result<CalibrationTable, ProtocolError> {
    if data.len() != CONFIG_BLOCK_SIZE {
        return Err(ProtocolError::MalformedConfig { actual: data.len() });
    }

    let points = CALIBRATION_OFFSETS.map(|(cpm_at, dose_at)| CalibrationPoint {
        cpm: BigEndian::read_u16(&data[cpm_at..cpm_at + 2]),
        dose_rate: LittleEndian::read_f32(&data[dose_at..dose_at + 4]),
    });

    Ok(CalibrationTable::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpm_big_endian() {
        assert_eq!(decode_cpm(&[0x01, 0x2C]).unwrap(), 300);
        assert_eq!(decode_cpm(&[0xFF, 0xFF, 0xAA]).unwrap(), u16::MAX);
    }

    #[test]
    fn test_cpm_short() {
        assert!(matches!(
            decode_cpm(&[0x01]),
            Err(ProtocolError::ShortResponse {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_voltage_tenths() {
        assert_eq!(decode_voltage(&[42]).unwrap(), 4.2);
        assert_eq!(decode_voltage(&[0]).unwrap(), 0.0);
        assert!(decode_voltage(&[]).is_err());
    }

    #[test]
    fn test_temperature_truncates_decimal() {
        assert_eq!(decode_temperature(&[21, 5, 0]).unwrap(), 21.0);
        assert_eq!(decode_temperature(&[21, 5, 1]).unwrap(), -21.0);
        assert_eq!(decode_temperature(&[21, 15, 0, 0xAA]).unwrap(), 22.0);
    }

    #[test]
    fn test_serial_hex() {
        assert_eq!(
            decode_serial(&[0xF4, 0x88, 0x00, 0x0A, 0x23, 0x1B, 0x7C]),
            "f488000a231b7c"
        );
        assert_eq!(decode_serial(&[]), "");
    }

    #[test]
    fn test_version_text() {
        assert_eq!(decode_version(b"GMC-320Re 4.22"), "GMC-320Re 4.22");
    }

    #[test]
    fn test_orientation() {
        let o = decode_orientation(&[0x00, 0x01, 0x02, 0x00, 0xFF, 0xFE, 0xAA]).unwrap();
        assert_eq!(o, Orientation { x: 1, y: 512, z: 0xFFFE });
    }

    #[test]
    fn test_config_length() {
        assert!(matches!(
            decode_config(&[0u8; 255]),
            Err(ProtocolError::MalformedConfig { actual: 255 })
        ));
        assert!(matches!(
            decode_config(&[0u8; 257]),
            Err(ProtocolError::MalformedConfig { actual: 257 })
        ));
    }

    #[test]
    fn test_decoders_do_not_depend_on_history() {
        let serial = [0xF4, 0x88, 0x00, 0x0A, 0x23, 0x1B, 0x7C];
        assert_eq!(decode_serial(&serial), decode_serial(&serial));
        assert_eq!(decode_version(b"GMC-500+Re 1.18"), decode_version(b"GMC-500+Re 1.18"));

        let clock = [24, 5, 17, 12, 30, 0, 0xAA];
        assert_eq!(decode_datetime(&clock).unwrap(), decode_datetime(&clock).unwrap());

        let cpm = [0x01, 0x2C];
        assert_eq!(decode_cpm(&cpm).unwrap(), decode_cpm(&cpm).unwrap());

        let volt = [42];
        assert_eq!(decode_voltage(&volt).unwrap(), decode_voltage(&volt).unwrap());

        let temp = [21, 5, 1, 0xAA];
        assert_eq!(decode_temperature(&temp).unwrap(), decode_temperature(&temp).unwrap());

        let gyro = [0x00, 0x01, 0x02, 0x00, 0xFF, 0xFE, 0xAA];
        assert_eq!(decode_orientation(&gyro).unwrap(), decode_orientation(&gyro).unwrap());

        let mut block = [0u8; 256];
        block[0x08..0x0A].copy_from_slice(&100u16.to_be_bytes());
        block[0x0A..0x0E].copy_from_slice(&0.65f32.to_le_bytes());
        let first = decode_config(&block).unwrap();
        assert_eq!(first, decode_config(&block).unwrap());
        assert_eq!(first.points()[0].cpm, 100);
    }
}
