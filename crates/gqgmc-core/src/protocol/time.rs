//! Device clock encoding
//!
//! The device stores its clock as six bytes: year offset from 2000, month,
//! day, hour, minute, second. The clock is always treated as UTC.

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::ProtocolError;

/// Raw calendar fields of the device clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTime {
    /// Years since 2000
    pub year_offset: u8,
    /// Month, 1-based
    pub month: u8,
    /// Day of month, 1-based
    pub day: u8,
    /// Hour, 0-23
    pub hour: u8,
    /// Minute, 0-59
    pub minute: u8,
    /// Second, 0-59
    pub second: u8,
}

impl DeviceTime {
    /// First year the device clock can hold
    pub const BASE_YEAR: i32 = 2000;

    /// Encode a UTC time, failing outside 2000..=2255
    pub fn from_datetime(time: DateTime<Utc>) -> Result<Self, ProtocolError> {
        let year_offset = u8::try_from(time.year() - Self::BASE_YEAR)
            .map_err(|_| ProtocolError::TimeOutOfRange(time.to_rfc3339()))?;

        Ok(Self {
            year_offset,
            month: time.month() as u8,
            day: time.day() as u8,
            hour: time.hour() as u8,
            minute: time.minute() as u8,
            second: time.second() as u8,
        })
    }

    /// Decode the first six bytes of a response
    pub fn from_bytes(bytes: &[u8; 6]) -> Self {
        let [year_offset, month, day, hour, minute, second] = *bytes;
        Self {
            year_offset,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// Wire representation used inside the SETDATETIME frame
    pub fn to_bytes(&self) -> [u8; 6] {
        [
            self.year_offset,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        ]
    }

    /// Interpret the fields as a UTC calendar time
    pub fn to_datetime(&self) -> Result<DateTime<Utc>, ProtocolError> {
        NaiveDate::from_ymd_opt(
            Self::BASE_YEAR + i32::from(self.year_offset),
            u32::from(self.month),
            u32::from(self.day),
        )
        .and_then(|date| {
            date.and_hms_opt(
                u32::from(self.hour),
                u32::from(self.minute),
                u32::from(self.second),
            )
        })
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or(ProtocolError::InvalidDateTime {
            year_offset: self.year_offset,
            month: self.month,
            day: self.day,
            hour: self.hour,
            minute: self.minute,
            second: self.second,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::decode::decode_datetime;

    #[test]
    fn test_encode_datetime() {
        let time = Utc.with_ymd_and_hms(2024, 2, 29, 23, 59, 58).unwrap();
        let dt = DeviceTime::from_datetime(time).unwrap();
        assert_eq!(dt.to_bytes(), [24, 2, 29, 23, 59, 58]);
    }

    #[test]
    fn test_range_limits() {
        let low = Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap();
        let high = Utc.with_ymd_and_hms(2255, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(DeviceTime::from_datetime(low).unwrap().year_offset, 0);
        assert_eq!(DeviceTime::from_datetime(high).unwrap().year_offset, 255);

        let before = Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap();
        let after = Utc.with_ymd_and_hms(2256, 1, 1, 0, 0, 0).unwrap();
        assert!(matches!(
            DeviceTime::from_datetime(before),
            Err(ProtocolError::TimeOutOfRange(_))
        ));
        assert!(matches!(
            DeviceTime::from_datetime(after),
            Err(ProtocolError::TimeOutOfRange(_))
        ));
    }

    #[test]
    fn test_clock_survives_the_wire() {
        let times = [
            Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2255, 12, 31, 23, 59, 59).unwrap(),
            Utc.with_ymd_and_hms(2024, 2, 29, 12, 0, 30).unwrap(),
        ];
        for time in times {
            let mut response = DeviceTime::from_datetime(time).unwrap().to_bytes().to_vec();
            response.push(0xAA);
            let decoded = decode_datetime(&response).unwrap();
            assert_eq!(decoded.to_datetime().unwrap(), time);
        }
    }

    #[test]
    fn test_invalid_calendar_fields() {
        let dt = DeviceTime::from_bytes(&[24, 13, 1, 0, 0, 0]);
        assert!(matches!(
            dt.to_datetime(),
            Err(ProtocolError::InvalidDateTime { month: 13, .. })
        ));
    }
}
