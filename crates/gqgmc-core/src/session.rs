//! Polling session
//!
//! Owns everything the polling loop needs across ticks: the device client,
//! the identity and calibration read at start-up, and the running average.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::accumulator::RunningAverage;
use crate::calibration::CalibrationTable;
use crate::protocol::{Channel, DeviceClient, Orientation, ProtocolError};

/// Version and serial read once at session start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Model and firmware string, e.g. "GMC-320Re 4.22"
    pub version: String,
    /// Serial number as lowercase hex
    pub serial: String,
}

/// Raw measurements of one poll
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Host time of the poll
    pub timestamp: DateTime<Utc>,
    /// Counts per minute
    pub cpm: u16,
    /// Battery voltage
    pub voltage: f32,
    /// Temperature in °C
    pub temperature: f32,
}

/// A reading plus derived values, handed to the telemetry sinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Host time of the poll
    pub timestamp: DateTime<Utc>,
    /// Counts per minute
    pub cpm: u16,
    /// Estimated dose rate in µSv/h
    pub dose_rate: f32,
    /// Running average CPM since start-up
    pub acpm: f32,
    /// Battery voltage
    pub voltage: f32,
    /// Temperature in °C
    pub temperature: f32,
    /// Device the reading came from
    pub identity: DeviceIdentity,
}

/// What initialization learned about the device
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    /// Version and serial
    pub identity: DeviceIdentity,
    /// Device clock read back after it was set; `None` when the device
    /// returned fields that are not a calendar time
    pub device_time: Option<DateTime<Utc>>,
    /// Calibration read from the configuration block
    pub calibration: CalibrationTable,
}

/// Session state for one device
pub struct Session<C: Channel> {
    client: DeviceClient<C>,
    identity: DeviceIdentity,
    calibration: CalibrationTable,
    average: RunningAverage,
}

impl<C: Channel> Session<C> {
    /// Open a session on a channel with the default response deadline
    pub fn initialize(channel: C, now: DateTime<Utc>) -> Result<(Self, SessionInfo), ProtocolError> {
        Self::initialize_with(DeviceClient::new(channel), now)
    }

    /// Identify the device, sync its clock to `now` and read calibration
    pub fn initialize_with(
        mut client: DeviceClient<C>,
        now: DateTime<Utc>,
    ) -> Result<(Self, SessionInfo), ProtocolError> {
        let version = client.get_version()?;
        let serial = client.get_serial()?;
        info!(%version, %serial, "device identified");

        client.set_datetime(now)?;
        let raw_time = client.get_device_time()?;
        let device_time = match raw_time.to_datetime() {
            Ok(time) => {
                info!("Device time: {}", time);
                Some(time)
            }
            Err(e) => {
                warn!("device clock readback is not a valid time: {}", e);
                None
            }
        };

        let calibration = client.get_config()?;
        for point in calibration.degenerate_points() {
            warn!(
                point,
                "calibration point has zero reference CPM; dose rate will not be finite"
            );
        }

        let identity = DeviceIdentity { version, serial };
        let info = SessionInfo {
            identity: identity.clone(),
            device_time,
            calibration,
        };
        let session = Self {
            client,
            identity,
            calibration,
            average: RunningAverage::new(),
        };
        Ok((session, info))
    }

    /// One poll cycle: CPM, dose rate, running average, voltage, temperature
    pub fn poll(&mut self, now: DateTime<Utc>) -> Result<TelemetryRecord, ProtocolError> {
        let reading = self.read(now)?;

        self.average.fold(reading.cpm);
        let dose_rate = self.calibration.dose_rate(reading.cpm);
        let acpm = self
            .average
            .mean()
            .unwrap_or_else(|| f32::from(reading.cpm));
        info!("{:.2} µSv/h, {:.2} ACPM", dose_rate, acpm);

        Ok(TelemetryRecord {
            timestamp: reading.timestamp,
            cpm: reading.cpm,
            dose_rate,
            acpm,
            voltage: reading.voltage,
            temperature: reading.temperature,
            identity: self.identity.clone(),
        })
    }

    fn read(&mut self, now: DateTime<Utc>) -> Result<Reading, ProtocolError> {
        let cpm = self.client.get_cpm()?;
        let voltage = self.client.get_voltage()?;
        let temperature = self.client.get_temperature()?;
        Ok(Reading {
            timestamp: now,
            cpm,
            voltage,
            temperature,
        })
    }

    /// Read the gyroscope; not part of the regular poll
    pub fn orientation(&mut self) -> Result<Orientation, ProtocolError> {
        self.client.get_orientation()
    }

    /// Identity read at start-up
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Calibration read at start-up
    pub fn calibration(&self) -> &CalibrationTable {
        &self.calibration
    }

    /// CPM samples folded so far
    pub fn average(&self) -> &RunningAverage {
        &self.average
    }

    /// The underlying device client
    pub fn client(&self) -> &DeviceClient<C> {
        &self.client
    }
}
