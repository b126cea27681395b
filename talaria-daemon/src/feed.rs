//! Inbound message feed.
//!
//! The radio and ADS-B decoder processes deliver their output as JSON
//! datagrams, one message per packet: either a GNSS/own-ship snapshot or a
//! decoded traffic report. Anything that does not parse is dropped
//! silently (the sender is trusted but lossy).

use serde::Deserialize;
use talaria_core::types::{HostState, TargetReport};

/// One datagram from the decoders.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FeedMessage {
    /// Own-ship state refresh from GNSS (plus wind/projection fields).
    Host(HostState),
    /// Decoded position report about another aircraft.
    Traffic(TargetReport),
}

pub fn parse_datagram(data: &[u8]) -> Result<FeedMessage, serde_json::Error> {
    serde_json::from_slice(data)
}
