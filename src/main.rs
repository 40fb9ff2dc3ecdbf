//! # XBee Writer
//!
//! Collect IO samples from the sensor mesh and keep a snapshot file with the
//! latest sample of every node.
//!
//! Reads from the locally attached radio, queries each new node for its name
//! once, and rewrites the snapshot after every change.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use xbee_telemetry::config::Config;
use xbee_telemetry::ingest;
use xbee_telemetry::logging;
use xbee_telemetry::serial::XBeeSerial;
use xbee_telemetry::telemetry::{
    ChangeNotifier, IdentityResolver, PendingQueries, SnapshotQueue, SnapshotStore,
    SnapshotWriter,
};

#[derive(Parser, Debug)]
#[command(name = "xbee-writer")]
#[command(version)]
#[command(about = "Log XBee sensor samples to a snapshot file")]
struct Args {
    /// Serial port of the local radio ("auto" to probe)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate of the local radio
    #[arg(short, long)]
    baud: Option<u32>,

    /// Snapshot file to write
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Configuration file values with command line overrides applied
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    if let Some(port) = &args.port {
        config.serial.port = port.clone();
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(file) = &args.file {
        config.snapshot.path = file.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Main entry point for the writer daemon
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration, set up logging
///    - Start the snapshot writer task
///    - Subscribe its queue to cache changes
///
/// 2. **Main Loop**
///    - Open the radio and process packets until the link fails
///    - Wait `reconnect_interval_ms` and reopen; the cache is kept, so known
///      nodes are not queried again
///    - Handle Ctrl+C for graceful shutdown
///
/// 3. **Graceful Shutdown**
///    - Close the snapshot queue and wait for pending writes
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let _log_guard = logging::init(&config.logging)?;

    info!("XBee writer v{} starting...", env!("CARGO_PKG_VERSION"));
    info!("Snapshot file: {}", config.snapshot.path.display());

    let store = Arc::new(SnapshotStore::new(&config.snapshot.path));
    let queue = Arc::new(SnapshotQueue::new(config.snapshot.queue_capacity));
    let writer = SnapshotWriter::new(store, queue.clone());
    let stats = writer.stats();
    let writer_task = writer.spawn();

    let mut notifier = ChangeNotifier::new();
    notifier.subscribe(queue.clone());
    let mut resolver = IdentityResolver::new(PendingQueries::new(), notifier);

    info!("Press Ctrl+C to exit");

    tokio::select! {
        _ = ingest_forever(&config, &mut resolver) => {}

        // Handle Ctrl+C for graceful shutdown
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
        }
    }

    queue.close();
    writer_task.await?;

    info!(
        "Tracked {} devices, issued {} name queries, wrote {} snapshots",
        resolver.cache().len(),
        resolver.queries_issued(),
        stats.written()
    );
    Ok(())
}

/// Keep a session with the radio open, reconnecting after failures
async fn ingest_forever(config: &Config, resolver: &mut IdentityResolver<PendingQueries>) {
    loop {
        match XBeeSerial::open(&config.serial.port, config.serial.baud_rate, config.serial.api_mode) {
            Ok(mut serial) => {
                serial.set_command_timeout(config.serial.command_timeout());
                info!("Listening on {}", serial.device_path());

                if let Err(e) = ingest::run_session(&mut serial, resolver).await {
                    warn!("Session on {} ended: {}", serial.device_path(), e);
                }
            }
            Err(e) => warn!("Cannot open radio: {}", e),
        }

        tokio::time::sleep(config.serial.reconnect_interval()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_without_arguments() {
        let args = Args::try_parse_from(["xbee-writer"]).unwrap();
        let config = load_config(&args).unwrap();

        assert_eq!(config.serial.port, "auto");
        assert_eq!(config.serial.baud_rate, 9600);
        assert_eq!(config.snapshot.path, PathBuf::from("/tmp/xbee-telemetry.json"));
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[serial]\nport = \"/dev/ttyUSB1\"\nbaud_rate = 57600\n")
            .unwrap();
        file.flush().unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let args = Args::try_parse_from([
            "xbee-writer",
            "--config",
            path.as_str(),
            "--baud",
            "115200",
            "--file",
            "/var/lib/xbee/latest.json",
        ])
        .unwrap();
        let config = load_config(&args).unwrap();

        assert_eq!(config.serial.port, "/dev/ttyUSB1");
        assert_eq!(config.serial.baud_rate, 115200);
        assert_eq!(config.snapshot.path, PathBuf::from("/var/lib/xbee/latest.json"));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = Args::try_parse_from(["xbee-writer", "-b", "420000"]).unwrap();
        assert!(load_config(&args).is_err());
    }
}
