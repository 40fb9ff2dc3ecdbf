//! # XBee Programmer
//!
//! Configure a sensor node radio attached to a local serial port.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use xbee_telemetry::config::{LoggingConfig, SUPPORTED_BAUD_RATES};
use xbee_telemetry::logging;
use xbee_telemetry::programmer::{NodeSettings, XBeeProgrammer};
use xbee_telemetry::serial::{XBeeSerial, XBEE_DEFAULT_BAUD_RATE};
use xbee_telemetry::xbee::protocol::ApiMode;

#[derive(Parser, Debug)]
#[command(name = "xbee-programmer")]
#[command(version)]
#[command(about = "Program XBee radios for use in sensor nodes")]
struct Args {
    /// Serial port of the radio
    #[arg(short, long)]
    port: String,

    /// Baud rate
    #[arg(short, long, default_value_t = XBEE_DEFAULT_BAUD_RATE)]
    baud: u32,

    /// Network/PAN id (hex, 0-7FFF)
    #[arg(short, long)]
    id: String,

    /// Node name
    #[arg(short, long)]
    name: String,

    /// Sample rate in ms (hex, 0-FFFF)
    #[arg(short, long, default_value = "3E8")]
    rate: String,

    /// Write (finalize) settings in firmware
    #[arg(short, long)]
    write: bool,

    /// Radio is currently in API mode 1 (no escaping)
    #[arg(long)]
    unescaped: bool,
}

impl Args {
    fn settings(&self) -> Result<NodeSettings> {
        if !SUPPORTED_BAUD_RATES.contains(&self.baud) {
            anyhow::bail!("unsupported baud rate {}", self.baud);
        }
        Ok(NodeSettings::new(&self.id, &self.name, &self.rate, self.write)?)
    }

    fn api_mode(&self) -> ApiMode {
        if self.unescaped {
            ApiMode::Unescaped
        } else {
            ApiMode::Escaped
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = logging::init(&LoggingConfig::default())?;

    let settings = args.settings()?;
    let serial = XBeeSerial::open(&args.port, args.baud, args.api_mode())?;
    info!("Programming radio on {}", serial.device_path());

    let mut programmer = XBeeProgrammer::new(serial);
    let radio = programmer.program(&settings).await?;

    println!("hardware: {}", radio.hardware_hex());
    println!("firmware: {}", radio.firmware_hex());
    Ok(())
}
