//! Device client
//!
//! Issues one command at a time over a [`Channel`] and hands the raw
//! response to the matching decoder.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{
    decode, frame, Channel, Command, DeviceTime, Orientation, ProtocolError, ResponseShape,
    CONFIG_SETTLE_MS, DEFAULT_TIMEOUT_MS, MAX_RESPONSE_SIZE,
};
use crate::calibration::CalibrationTable;

/// Pause between empty reads while waiting for the first bytes
const EMPTY_READ_BACKOFF_MS: u64 = 1;

/// Request/response client for a single GMC device
///
/// The device cannot multiplex requests, so the client takes `&mut self` for
/// every command and never has more than one in flight.
pub struct DeviceClient<C: Channel> {
    channel: C,
    /// Deadline for a complete response
    timeout: Duration,
    tx_bytes: u64,
    rx_bytes: u64,
    commands_sent: u64,
}

impl<C: Channel> DeviceClient<C> {
    /// Create a client with the default response deadline
    pub fn new(channel: C) -> Self {
        Self::with_timeout(channel, Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    /// Create a client with a custom response deadline
    pub fn with_timeout(channel: C, timeout: Duration) -> Self {
        Self {
            channel,
            timeout,
            tx_bytes: 0,
            rx_bytes: 0,
            commands_sent: 0,
        }
    }

    /// Cumulative (tx bytes, rx bytes, commands) counters
    pub fn counters(&self) -> (u64, u64, u64) {
        (self.tx_bytes, self.rx_bytes, self.commands_sent)
    }

    /// Borrow the underlying channel
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Send a payload-free command and return the raw response
    pub fn send_command(&mut self, cmd: Command) -> Result<Vec<u8>, ProtocolError> {
        let bytes = frame::build_frame(cmd);
        self.transact(cmd, &bytes)
    }

    /// Flush, write, (settle), read until the response shape is met, flush
    fn transact(&mut self, cmd: Command, frame: &[u8]) -> Result<Vec<u8>, ProtocolError> {
        self.channel.flush()?;

        debug!(command = ?cmd, frame = %String::from_utf8_lossy(frame), "sending");
        self.channel.write_all(frame)?;
        self.tx_bytes = self.tx_bytes.saturating_add(frame.len() as u64);
        self.commands_sent = self.commands_sent.saturating_add(1);

        if cmd.needs_settle_delay() {
            std::thread::sleep(Duration::from_millis(CONFIG_SETTLE_MS));
        }

        let response = self.read_response(cmd)?;
        self.channel.flush()?;

        self.rx_bytes = self.rx_bytes.saturating_add(response.len() as u64);
        debug!(command = ?cmd, len = response.len(), "response {:02x?}", response);
        Ok(response)
    }

    fn read_response(&mut self, cmd: Command) -> Result<Vec<u8>, ProtocolError> {
        let shape = cmd.response_shape();
        let target = shape.target_len().unwrap_or(MAX_RESPONSE_SIZE);
        let mut response = Vec::with_capacity(target.min(MAX_RESPONSE_SIZE));
        let mut buffer = [0u8; 512];
        let start = Instant::now();

        while response.len() < target && response.len() < MAX_RESPONSE_SIZE {
            if start.elapsed() > self.timeout {
                debug!(
                    command = ?cmd,
                    "deadline reached after {} bytes",
                    response.len()
                );
                break;
            }

            let room = (MAX_RESPONSE_SIZE - response.len()).min(buffer.len());
            let n = self.channel.read(&mut buffer[..room])?;
            if n == 0 {
                if shape == ResponseShape::Unframed && !response.is_empty() {
                    // Line went quiet after data: unframed response is complete
                    break;
                }
                std::thread::sleep(Duration::from_millis(EMPTY_READ_BACKOFF_MS));
                continue;
            }
            response.extend_from_slice(&buffer[..n]);
        }

        if response.is_empty() {
            return Err(ProtocolError::Timeout {
                command: cmd,
                received: 0,
            });
        }

        // Exact shapes keep any surplus so the decoder can reject the length
        if let ResponseShape::Exact(_) = shape {
            let mut surplus = [0u8; 64];
            while response.len() < MAX_RESPONSE_SIZE {
                let n = self.channel.read(&mut surplus)?;
                if n == 0 {
                    break;
                }
                let take = n.min(MAX_RESPONSE_SIZE - response.len());
                response.extend_from_slice(&surplus[..take]);
            }
        }

        Ok(response)
    }

    /// Firmware model and version string
    pub fn get_version(&mut self) -> Result<String, ProtocolError> {
        let raw = self.send_command(Command::GetVersion)?;
        Ok(decode::decode_version(&raw))
    }

    /// Serial number as lowercase hex
    pub fn get_serial(&mut self) -> Result<String, ProtocolError> {
        let raw = self.send_command(Command::GetSerial)?;
        Ok(decode::decode_serial(&raw))
    }

    /// Read the raw device clock fields without calendar validation
    pub fn get_device_time(&mut self) -> Result<DeviceTime, ProtocolError> {
        let raw = self.send_command(Command::GetDateTime)?;
        decode::decode_datetime(&raw)
    }

    /// Read the device clock as a UTC time
    pub fn get_datetime(&mut self) -> Result<DateTime<Utc>, ProtocolError> {
        let time = self.get_device_time()?.to_datetime()?;
        info!("Device time: {}", time);
        Ok(time)
    }

    /// Set the device clock; the acknowledgement byte is not interpreted
    pub fn set_datetime(&mut self, now: DateTime<Utc>) -> Result<(), ProtocolError> {
        let time = DeviceTime::from_datetime(now)?;
        let bytes = frame::build_set_datetime_frame(&time);
        let ack = self.transact(Command::SetDateTime, &bytes)?;
        debug!("SETDATETIME acknowledged with {:02x?}", ack);
        Ok(())
    }

    /// Counts per minute
    pub fn get_cpm(&mut self) -> Result<u16, ProtocolError> {
        let raw = self.send_command(Command::GetCpm)?;
        let cpm = decode::decode_cpm(&raw)?;
        info!("{} CPM", cpm);
        Ok(cpm)
    }

    /// Battery voltage in volts
    pub fn get_voltage(&mut self) -> Result<f32, ProtocolError> {
        let raw = self.send_command(Command::GetVoltage)?;
        let volts = decode::decode_voltage(&raw)?;
        info!("{:.1} V", volts);
        Ok(volts)
    }

    /// Temperature in degrees Celsius
    pub fn get_temperature(&mut self) -> Result<f32, ProtocolError> {
        let raw = self.send_command(Command::GetTemperature)?;
        let celsius = decode::decode_temperature(&raw)?;
        info!("{:.1} °C", celsius);
        Ok(celsius)
    }

    /// Gyroscope axes
    pub fn get_orientation(&mut self) -> Result<Orientation, ProtocolError> {
        let raw = self.send_command(Command::GetOrientation)?;
        let o = decode::decode_orientation(&raw)?;
        info!("Orientation {} {} {}", o.x, o.y, o.z);
        Ok(o)
    }

    /// Calibration table from the configuration block
    pub fn get_config(&mut self) -> Result<CalibrationTable, ProtocolError> {
        let raw = self.send_command(Command::GetConfig)?;
        decode::decode_config(&raw)
    }
}
