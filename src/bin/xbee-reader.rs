//! # XBee Reader
//!
//! Print the latest sample of one node from the writer's snapshot file.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use clap::Parser;
use serde::Serialize;

use xbee_telemetry::config::{Config, LoggingConfig};
use xbee_telemetry::logging;
use xbee_telemetry::sensors::{AttoPilot, NodeReading, SensorLayout};
use xbee_telemetry::telemetry::{ChannelData, Sample, TelemetryQuery};

#[derive(Parser, Debug)]
#[command(name = "xbee-reader")]
#[command(version)]
#[command(about = "Show the latest sample of an XBee sensor node")]
struct Args {
    /// Node name or 16-digit address
    target: String,

    /// Snapshot file written by xbee-writer
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Writer configuration file (TOML); its snapshot path is used
    /// unless --file is given
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Warn when the sample is older than this many seconds
    #[arg(short, long, default_value = "60", value_parser = clap::value_parser!(i64).range(0..=31_536_000))]
    stale_after: i64,

    /// AttoPilot model fitted to the node (a45, a90, a180)
    #[arg(short, long, default_value = "a180")]
    attopilot: AttoPilot,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

impl Args {
    fn snapshot_path(&self) -> Result<PathBuf> {
        if let Some(file) = &self.file {
            return Ok(file.clone());
        }
        let config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => Config::default(),
        };
        Ok(config.snapshot.path)
    }
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    address: String,
    node_name: &'a str,
    captured_at: DateTime<Utc>,
    age_seconds: i64,
    stale: bool,
    reading: NodeReading,
    channels: &'a ChannelData,
}

impl<'a> Report<'a> {
    fn new(sample: &'a Sample, layout: &SensorLayout, now: DateTime<Utc>, stale_after: Duration) -> Self {
        let age = now.signed_duration_since(sample.captured_at());
        Self {
            address: sample.address().canonical_string(),
            node_name: sample.node_name(),
            captured_at: sample.captured_at(),
            age_seconds: age.num_seconds(),
            stale: age > stale_after,
            reading: layout.read(sample),
            channels: sample.channels(),
        }
    }

    fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Address: {}", self.address);
        let _ = writeln!(out, "Name: {}", self.node_name);
        let _ = writeln!(out, "Timestamp: {} ({}s ago)", self.captured_at.to_rfc3339(), self.age_seconds);

        let lines = [
            ("Temperature", self.reading.temperature_c, "°C"),
            ("Temperature", self.reading.temperature_f, "°F"),
            ("Array voltage", self.reading.array_voltage, "V"),
            ("Array current", self.reading.array_current, "A"),
            ("Battery voltage", self.reading.battery_voltage, "V"),
            ("Battery current", self.reading.battery_current, "A"),
        ];
        for (label, value, unit) in lines {
            if let Some(value) = value {
                let _ = writeln!(out, "{}: {:.2} {}", label, value, unit);
            }
        }
        out
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = logging::init(&LoggingConfig {
        level: "warn".to_string(),
        ..LoggingConfig::default()
    })?;

    let path = args.snapshot_path()?;

    let mut query = TelemetryQuery::new();
    query
        .load(&path)
        .with_context(|| format!("No snapshot at {}. Is xbee-writer running?", path.display()))?;

    let sample = query.by_address_or_name(&args.target)?;
    let layout = SensorLayout::default().with_attopilot(args.attopilot);
    let report = Report::new(sample, &layout, Utc::now(), Duration::seconds(args.stale_after));

    if report.stale {
        eprintln!(
            "No samples received in the last {} seconds. Is xbee-writer running?",
            args.stale_after
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.to_text());
    }

    Ok(())
}
