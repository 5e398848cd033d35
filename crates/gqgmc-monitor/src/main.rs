//! gqgmc-monitor
//!
//! Polls a GQ GMC Geiger counter on a fixed interval and forwards each
//! reading to radmon.org and InfluxDB.
//!
//! Usage: `gqgmc-monitor <config.ini>`

mod watchdog;

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use gqgmc_core::config::MonitorConfig;
use gqgmc_core::protocol::{list_ports, DeviceClient, ProtocolError, SerialChannel};
use gqgmc_core::session::{Session, TelemetryRecord};
use gqgmc_core::telemetry::{InfluxSink, RadmonSink};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::watchdog::Watchdog;

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gqgmc_core=info,gqgmc_monitor=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = exit_code(&e);
            if code == 0 {
                info!("{:#}", e);
            } else {
                error!("{:#}", e);
            }
            ExitCode::from(code)
        }
    }
}

/// A configuration block of the wrong size means the firmware speaks a
/// different layout; that ends the process cleanly. Everything else is a
/// failure.
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ProtocolError>() {
        Some(e) if e.is_config_mismatch() => 0,
        _ => 1,
    }
}

async fn run() -> anyhow::Result<()> {
    let Some(path) = std::env::args().nth(1) else {
        bail!("usage: gqgmc-monitor <config.ini>");
    };
    let config =
        MonitorConfig::load(&path).with_context(|| format!("Fail to read file: {}", path))?;

    info!("gqgmc version: {}", gqgmc_core::VERSION);

    let channel = match SerialChannel::open(&config.device.port, config.device.baud_rate) {
        Ok(channel) => channel,
        Err(e) => {
            for port in list_ports() {
                info!(
                    "available port: {} {}",
                    port.name,
                    port.product.as_deref().unwrap_or("")
                );
            }
            return Err(e.into());
        }
    };
    let client = DeviceClient::with_timeout(channel, config.device.timeout);
    let (mut session, device) = Session::initialize_with(client, Utc::now())?;
    match device.device_time {
        Some(time) => info!(
            "Connected to {} ({}), device time {}",
            device.identity.version.trim(),
            device.identity.serial,
            time
        ),
        None => info!(
            "Connected to {} ({}), device time unreadable",
            device.identity.version.trim(),
            device.identity.serial
        ),
    }

    info!("Polltime is {} seconds.", config.poll_interval.as_secs());

    if let Some(interval) = config.watchdog_interval {
        let wd = Arc::new(Watchdog::new(interval));
        spawn_watchdog(Arc::clone(&wd));
        poll_loop(&config, &mut session, Some(&wd)).await
    } else {
        poll_loop(&config, &mut session, None).await
    }
}

fn spawn_watchdog(wd: Arc<Watchdog>) {
    tokio::spawn(async move {
        wd.expired().await;
        error!(
            "watchdog: no poll completed within {} seconds",
            wd.interval().as_secs()
        );
        std::process::exit(1);
    });
}

async fn poll_loop(
    config: &MonitorConfig,
    session: &mut Session<SerialChannel>,
    watchdog: Option<&Watchdog>,
) -> anyhow::Result<()> {
    let radmon = config.radmon.clone().map(RadmonSink::new);
    let influx = config.influx.clone().map(InfluxSink::new);

    let mut ticker = poll_ticker(config.poll_interval);
    loop {
        ticker.tick().await;
        info!("Tick");
        if let Some(wd) = watchdog {
            wd.poke();
        }

        // Serial I/O blocks; keep it off the async workers' run queue
        let record = tokio::task::block_in_place(|| session.poll(Utc::now()))?;

        submit(&record, radmon.as_ref(), influx.as_ref()).await?;
    }
}

/// Ticks once per poll interval; a late tick shifts the schedule instead of bursting
fn poll_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// radmon.org failures are logged and skipped; an InfluxDB failure is fatal
async fn submit(
    record: &TelemetryRecord,
    radmon: Option<&RadmonSink>,
    influx: Option<&InfluxSink>,
) -> anyhow::Result<()> {
    if let Some(sink) = radmon {
        if let Err(e) = sink.submit(record).await {
            warn!("radmon.org submission failed: {}", e);
        }
    }
    if let Some(sink) = influx {
        sink.submit(record).await.context("InfluxDB write failed")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let mismatch = anyhow::Error::from(ProtocolError::MalformedConfig { actual: 12 });
        assert_eq!(exit_code(&mismatch), 0);

        let transport = anyhow::Error::from(ProtocolError::SerialError("gone".into()));
        assert_eq!(exit_code(&transport), 1);

        let wrapped = anyhow::Error::from(ProtocolError::MalformedConfig { actual: 12 })
            .context("session start");
        assert_eq!(exit_code(&wrapped), 0);

        assert_eq!(exit_code(&anyhow::anyhow!("config")), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_poll_delays_next_tick() {
        let period = Duration::from_secs(30);
        let mut ticker = poll_ticker(period);
        assert_eq!(ticker.missed_tick_behavior(), MissedTickBehavior::Delay);

        ticker.tick().await;
        // A poll that overran three and a half periods
        tokio::time::advance(period * 3 + period / 2).await;
        ticker.tick().await;

        let resumed = tokio::time::Instant::now();
        ticker.tick().await;
        assert_eq!(resumed.elapsed(), period);
    }
}
