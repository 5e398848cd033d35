//! # gqgmc Core Library
//!
//! Core functionality for polling GQ Electronics GMC Geiger counters.

#![warn(missing_docs)]

//!
//! This library provides:
//! - The GQ-RFC1201 serial command protocol (framing, bounded reads, decoders)
//! - The three-point calibration model for dose-rate estimates
//! - A running average of counts-per-minute samples
//! - A polling session that owns the device state
//! - Configuration loading and telemetry sinks (radmon.org, InfluxDB)
//!
//! ## Example
//!
//! ```rust,ignore
//! use gqgmc_core::{protocol::SerialChannel, session::Session};
//!
//! let channel = SerialChannel::open("/dev/ttyUSB0", 115200)?;
//! let (mut session, _device) = Session::initialize(channel, chrono::Utc::now())?;
//!
//! let record = session.poll(chrono::Utc::now())?;
//! println!("{} CPM, {:.2} uSv/h", record.cpm, record.dose_rate);
//! ```

pub mod accumulator;
pub mod calibration;
pub mod config;
pub mod protocol;
pub mod session;
pub mod telemetry;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::accumulator::RunningAverage;
    pub use crate::calibration::{CalibrationPoint, CalibrationTable};
    pub use crate::config::MonitorConfig;
    pub use crate::protocol::{Channel, Command, DeviceClient, ProtocolError, SerialChannel};
    pub use crate::session::{DeviceIdentity, Session, TelemetryRecord};
    pub use crate::telemetry::{InfluxSink, RadmonSink};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
