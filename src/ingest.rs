//! # Ingestion Loop
//!
//! Connects the radio link to the identity resolver. One task owns both the
//! port and the resolver, so inbound packets and outbound name queries are
//! handled strictly in order.

use tracing::{debug, warn};

use crate::error::Result;
use crate::serial::port_trait::SerialPortIO;
use crate::serial::XBeeSerial;
use crate::telemetry::{IdentityResolver, NameQuery, PendingQueries};
use crate::xbee::protocol::AT_NODE_IDENTIFIER;

/// Transmit every queued node identifier query
///
/// On a write failure the unsent addresses are queued again and the error
/// is returned, so the next session sends them first.
///
/// # Returns
///
/// * `Result<usize>` - Number of queries sent
pub async fn flush_name_queries<P: SerialPortIO>(
    serial: &mut XBeeSerial<P>,
    resolver: &mut IdentityResolver<PendingQueries>,
) -> Result<usize> {
    let pending = resolver.query_mut().take();

    for (index, address) in pending.iter().enumerate() {
        if let Err(e) = serial
            .send_remote_request(address, AT_NODE_IDENTIFIER, &[])
            .await
        {
            warn!("Failed to send node identifier query to {}: {}", address, e);
            for unsent in &pending[index..] {
                resolver.query_mut().request_name(unsent);
            }
            return Err(e);
        }
    }

    Ok(pending.len())
}

/// Read one packet, apply it, then send any name queries it caused
pub async fn process_next<P: SerialPortIO>(
    serial: &mut XBeeSerial<P>,
    resolver: &mut IdentityResolver<PendingQueries>,
) -> Result<()> {
    let packet = serial.read_packet().await?;
    resolver.dispatch(packet);

    let sent = flush_name_queries(serial, resolver).await?;
    if sent > 0 {
        debug!("Sent {} node identifier queries", sent);
    }
    Ok(())
}

/// Process packets until the link fails
///
/// Only returns on error; the cache inside `resolver` survives so the
/// caller can reconnect and call this again.
pub async fn run_session<P: SerialPortIO>(
    serial: &mut XBeeSerial<P>,
    resolver: &mut IdentityResolver<PendingQueries>,
) -> Result<()> {
    flush_name_queries(serial, resolver).await?;

    loop {
        process_next(serial, resolver).await?;
    }
}
