//! Clearance verification - rail clearance envelope measurement
//!
//! Checks measured scan points of a track location against the clearance
//! envelope of the selected division, corrected for curvature and cant.
//!
//! Module structure:
//! - `domain/` - Core measurement types (readings, mutations, records)
//! - `io/` - External interfaces (device MQTT, file egress)
//! - `services/` - Geometry, clearance, profile and session
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::Context;
use clap::{Parser, Subcommand};
use clearance_verify::domain::types::{CurveSide, DivisionId, Orientation, ProfileKind};
use clearance_verify::domain::{DeviceCommand, ProfileIdentity};
use clearance_verify::infra::{Config, Metrics};
use clearance_verify::io::{read_records, start_device_client, Egress};
use clearance_verify::services::{EnvelopeStore, Profile, Session};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Rail clearance envelope verification
#[derive(Parser, Debug)]
#[command(name = "clearance-verify", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, env = "CONFIG_FILE", default_value = "config/dev.toml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Re-evaluate saved profile records and write their reports
    Evaluate {
        /// JSONL records file (defaults to the configured records file)
        records: Option<PathBuf>,
    },
    /// Measure a new profile from live device readings
    Listen {
        #[arg(long)]
        line: String,
        #[arg(long)]
        track: String,
        #[arg(long)]
        stationing: String,
        /// A or B
        #[arg(long)]
        division: DivisionId,
        /// inside or outside
        #[arg(long)]
        side: CurveSide,
        #[arg(long, default_value = "verification")]
        kind: ProfileKind,
        #[arg(long)]
        operator: Option<String>,
        #[arg(long)]
        equipment: Option<String>,
        /// Device faces north (default south)
        #[arg(long)]
        north: bool,
        /// Run the full capture sequence: encoders, super elevation, scan
        #[arg(long)]
        measure: bool,
        /// Extra device command to send at start (repeatable), e.g. capture-images
        #[arg(long = "send", value_name = "COMMAND")]
        send: Vec<DeviceCommand>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for every reading
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), git = env!("GIT_HASH"), "clearance-verify starting");

    // Parse command line arguments using clap
    let args = Args::parse();

    let config = Config::load_from_path(&args.config);
    info!(
        config_file = %config.config_file(),
        envelope_file = %config.envelope_file(),
        device_host = %config.device_host(),
        device_port = %config.device_port(),
        datum_y_in = %config.datum_y_in(),
        gauge_in = %config.gauge_in(),
        "config_loaded"
    );

    let store = Arc::new(EnvelopeStore::from_file(config.envelope_file())?);
    let egress = Egress::new(config.records_file(), config.reports_dir());

    match args.command {
        Command::Evaluate { records } => {
            let path = records.unwrap_or_else(|| PathBuf::from(config.records_file()));
            evaluate(&config, store, &egress, path)
        }
        Command::Listen {
            line,
            track,
            stationing,
            division,
            side,
            kind,
            operator,
            equipment,
            north,
            measure,
            send,
        } => {
            let mut identity = ProfileIdentity::new(&line, &track, &stationing, kind)
                .with_orientation(if north { Orientation::North } else { Orientation::South });
            if let Some(operator) = operator {
                identity = identity.with_operator(&operator);
            }
            if let Some(equipment) = equipment {
                identity = identity.with_equipment(&equipment);
            }

            info!(
                line = %identity.line,
                stationing = %identity.stationing,
                division = division.label(),
                side = side.as_str(),
                kind = kind.as_str(),
                "profile_created"
            );

            let mut profile = Profile::new(identity, store).with_datum_y(config.datum_y_in());
            profile.set_curve_side(side);
            profile.set_division(division);

            let mut commands = if measure { DeviceCommand::MEASUREMENT.to_vec() } else { Vec::new() };
            commands.extend(send);
            listen(config, profile, egress, commands).await
        }
    }
}

/// Rebuild every saved profile and write a fresh report for it
fn evaluate(
    config: &Config,
    store: Arc<EnvelopeStore>,
    egress: &Egress,
    path: PathBuf,
) -> anyhow::Result<()> {
    let records = read_records(&path)?;
    let mut violations = 0;

    for record in records {
        let id = record.id.clone();
        let mut profile = Profile::from_record(record, store.clone())
            .with_context(|| format!("Failed to load profile {}", id))?
            .with_datum_y(config.datum_y_in());

        let report = profile.report(config.gauge_in());
        if report.has_violation() {
            violations += 1;
        }
        info!(
            profile_id = %report.id,
            line = %report.identity.line,
            stationing = %report.identity.stationing,
            evaluated = %report.summary.evaluated,
            violations = %report.summary.violations,
            min_horizontal = ?report.summary.min_horizontal,
            min_vertical = ?report.summary.min_vertical,
            "profile_evaluated"
        );
        egress.write_report(&report);
    }

    info!(file = %path.display(), profiles_with_violations = %violations, "evaluation_complete");
    Ok(())
}

/// Run a live session until Ctrl+C, saving unsaved changes on exit
async fn listen(
    config: Config,
    profile: Profile,
    egress: Egress,
    commands: Vec<DeviceCommand>,
) -> anyhow::Result<()> {
    let shared = profile.into_shared();
    let metrics = Arc::new(Metrics::new());

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create reading channel (bounded for backpressure)
    let (reading_tx, reading_rx) = mpsc::channel(config.channel_capacity());
    let (command_tx, command_rx) = mpsc::channel(16);

    // Start device client
    let device_config = config.clone();
    let device_metrics = metrics.clone();
    let device_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) =
            start_device_client(&device_config, reading_tx, command_rx, device_metrics, device_shutdown)
                .await
        {
            tracing::error!(error = %e, "device client error");
        }
    });

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let gauge_in = config.gauge_in();
    let mut session = Session::new(shared.clone(), config, metrics).with_egress(egress.clone());
    info!(profile_id = %shared.lock().id(), "session_started");

    // Published once the client is connected; the eventloop holds them until then
    for command in commands {
        if command_tx.send(command).await.is_err() {
            warn!(command = command.as_str(), "device_client_stopped");
            break;
        }
    }

    // Run session - consumes readings until shutdown
    session.run(reading_rx, shutdown_rx).await;
    drop(command_tx);

    let mut profile = shared.lock();
    if profile.changes_made() && !egress.save(&mut profile, gauge_in) {
        warn!(profile_id = %profile.id(), "unsaved_changes_lost");
    }

    info!("clearance-verify shutdown complete");
    Ok(())
}
