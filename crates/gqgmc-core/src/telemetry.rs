//! Telemetry sinks
//!
//! Forwards each [`TelemetryRecord`] to the configured endpoints:
//!
//! - radmon.org: a plain GET carrying the CPM value
//! - InfluxDB 1.x: one line-protocol point per poll via the HTTP write API

use std::fmt::Write as _;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::{InfluxConfig, RadmonConfig};
use crate::session::TelemetryRecord;

/// Timeout applied to every sink request
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default radmon.org submission endpoint
pub const RADMON_URL: &str = "https://radmon.org/radmon.php";

/// Influx measurement name
pub const MEASUREMENT: &str = "data";

/// Errors raised by telemetry sinks
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The request could not be sent or its response not read
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status
    #[error("Endpoint rejected submission with status {status}: {body}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Response body, for the log
        body: String,
    },
}

fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("gqgmc/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

async fn check_status(response: reqwest::Response) -> Result<(), TelemetryError> {
    let status = response.status();
    debug!("HTTP Status: {}", status);
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(TelemetryError::Rejected {
        status: status.as_u16(),
        body,
    })
}

/// Submits CPM values to radmon.org
pub struct RadmonSink {
    client: reqwest::Client,
    endpoint: String,
    config: RadmonConfig,
}

impl RadmonSink {
    /// Sink against the public radmon.org endpoint
    pub fn new(config: RadmonConfig) -> Self {
        Self::with_endpoint(config, RADMON_URL)
    }

    /// Sink against a custom endpoint
    pub fn with_endpoint(config: RadmonConfig, endpoint: impl Into<String>) -> Self {
        Self {
            client: build_client(),
            endpoint: endpoint.into(),
            config,
        }
    }

    /// Query parameters of a submission
    pub fn query(&self, record: &TelemetryRecord) -> Vec<(&'static str, String)> {
        vec![
            ("function", "submit".to_string()),
            ("user", self.config.user.clone()),
            ("password", self.config.password.clone()),
            ("value", record.cpm.to_string()),
            ("unit", "CPM".to_string()),
        ]
    }

    /// Submit the CPM of a record
    pub async fn submit(&self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        info!("Sending data to radmon.org");
        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query(record))
            .send()
            .await?;
        check_status(response).await
    }
}

/// Writes records to an InfluxDB 1.x database
pub struct InfluxSink {
    client: reqwest::Client,
    config: InfluxConfig,
}

impl InfluxSink {
    /// Sink for the configured database
    pub fn new(config: InfluxConfig) -> Self {
        Self {
            client: build_client(),
            config,
        }
    }

    /// URL of the `/write` endpoint
    pub fn write_url(&self) -> String {
        format!("{}/write", self.config.url.trim_end_matches('/'))
    }

    /// Write one point for a record
    pub async fn submit(&self, record: &TelemetryRecord) -> Result<(), TelemetryError> {
        info!("Sending data to influxdb");
        let body = line_protocol(record);
        debug!("{}", body);

        let mut request = self
            .client
            .post(self.write_url())
            .query(&[("db", self.config.database.as_str()), ("precision", "s")])
            .body(body);
        if !self.config.username.is_empty() {
            request = request.basic_auth(&self.config.username, Some(&self.config.password));
        }

        check_status(request.send().await?).await
    }
}

/// Render a record as one InfluxDB line-protocol point, second precision
///
/// Tags `serial` and `version`; fields `ACPM`, `CPM` (integer), `Temperature`,
/// `USV` and `Voltage`. Non-finite floats are skipped since line protocol
/// cannot carry them.
pub fn line_protocol(record: &TelemetryRecord) -> String {
    let mut line = String::from(MEASUREMENT);
    for (tag, value) in [
        ("serial", record.identity.serial.as_str()),
        ("version", record.identity.version.as_str()),
    ] {
        let value = escape_tag(value);
        if !value.is_empty() {
            let _ = write!(line, ",{}={}", tag, value);
        }
    }

    let mut fields = vec![format!("CPM={}i", record.cpm)];
    for (name, value) in [
        ("ACPM", record.acpm),
        ("Temperature", record.temperature),
        ("USV", record.dose_rate),
        ("Voltage", record.voltage),
    ] {
        if value.is_finite() {
            fields.push(format!("{}={}", name, value));
        }
    }
    fields.sort();

    let _ = write!(
        line,
        " {} {}",
        fields.join(","),
        record.timestamp.timestamp()
    );
    line
}

/// Escape commas, equals signs and spaces; drop control characters
fn escape_tag(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ',' | '=' | ' ' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    out
}
