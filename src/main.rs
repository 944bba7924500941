//! PowerTrack - record a ride from a BLE power meter and heart rate strap.
//!
//! Connects to the first matching power meter (and heart rate strap when
//! enabled), records until Ctrl-C, then writes the session as TCX.

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use powertrack::metrics::units::format_elapsed;
use powertrack::recording::types::SessionStats;
use powertrack::recording::{export_json_to_file, export_tcx_to_file, generate_tcx_filename};
use powertrack::sensors::types::SensorType;
use powertrack::storage::config::load_config;
use powertrack::{RideRecorder, SensorManager, SessionCommand, SessionRunner};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How often the live summary is logged.
const SUMMARY_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting PowerTrack v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config().context("Failed to load configuration")?;

    let mut manager = SensorManager::new(config.sensors.sensor_config());
    manager
        .initialize()
        .await
        .context("Failed to initialize Bluetooth")?;
    let events = manager.event_receiver();

    manager.start_discovery().await?;
    let bike = manager
        .wait_for_sensor(
            SensorType::PowerMeter,
            config.sensors.bike_name_filter.as_deref(),
        )
        .await
        .context("No power meter found")?;
    let strap = if config.sensors.heart_rate_enabled {
        match manager.wait_for_sensor(SensorType::HeartRate, None).await {
            Ok(strap) => Some(strap),
            Err(e) => {
                tracing::warn!("Continuing without heart rate: {}", e);
                None
            }
        }
    } else {
        None
    };
    manager.stop_discovery().await?;

    manager
        .connect(&bike)
        .await
        .with_context(|| format!("Failed to connect to {}", bike.name))?;
    if let Some(strap) = &strap {
        if let Err(e) = manager.connect(strap).await {
            tracing::warn!("Heart rate strap {} unavailable: {}", strap.name, e);
        }
    }

    let (command_tx, command_rx) = crossbeam::channel::unbounded();
    let runner = SessionRunner::spawn(
        RideRecorder::new(config.recording.display_mode),
        events,
        command_rx,
        config.recording.sample_period(),
    );

    let send = |command: SessionCommand| {
        command_tx
            .send(command)
            .map_err(|_| anyhow!("Session loop stopped unexpectedly"))
    };

    send(SessionCommand::Start)?;
    tracing::info!("Recording. Press Ctrl-C to finish.");

    let mut summary = tokio::time::interval(SUMMARY_INTERVAL);
    summary.tick().await;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            _ = summary.tick() => {
                let (reply_tx, reply_rx) = crossbeam::channel::bounded(1);
                send(SessionCommand::Stats(reply_tx))?;
                if let Ok(stats) = reply_rx.recv_timeout(Duration::from_secs(1)) {
                    log_summary(&stats);
                }
            }
        }
    }

    send(SessionCommand::Stop)?;
    send(SessionCommand::Shutdown)?;
    let recorder = tokio::task::spawn_blocking(move || runner.join())
        .await?
        .map_err(|_| anyhow!("Session thread panicked"))?;

    manager.shutdown().await;

    let stats = recorder.stats();
    log_summary(&stats);

    let session = recorder.session();
    let start = session
        .start_time()
        .ok_or_else(|| anyhow!("Session was never started"))?;

    let output_dir = config.output_dir();
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let tcx_path = output_dir.join(generate_tcx_filename(&start.with_timezone(&Local)));
    export_tcx_to_file(session, &tcx_path).context("TCX export failed")?;
    tracing::info!("Saved {}", tcx_path.display());

    if config.export.write_json {
        let json_path = tcx_path.with_extension("json");
        export_json_to_file(session, &json_path).context("JSON export failed")?;
    }

    Ok(())
}

fn log_summary(stats: &SessionStats) {
    let elapsed = match (stats.start, stats.end) {
        (Some(start), Some(end)) => (end - start).num_milliseconds(),
        (Some(start), None) => (chrono::Utc::now() - start).num_milliseconds(),
        _ => 0,
    };
    let total = &stats.total;

    tracing::info!(
        "{} | {:.0} W avg / {:.0} W max | {:.1} km/h avg | {:.0} rpm avg | {:.0} bpm avg | {:.2} km | {:.0} kJ",
        format_elapsed(elapsed, false),
        total.power.avg,
        total.power.max,
        total.speed.avg,
        total.cadence.avg,
        total.heart_rate.avg,
        total.distance.accumulated / 1000.0,
        total.energy.accumulated,
    );
}
