//! Runtime settings for the traffic core.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::types::{AddressKind, Protocol};

/// Which collision-prediction algorithm drives the per-target alarm level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmAlgorithm {
    /// No alarms; an external flight computer is expected to warn.
    None,
    /// Distance bands only.
    Distance,
    /// Straight-line closing-vector prediction.
    Vector,
    /// Short-horizon second-by-second simulation.
    Latest,
}

impl Default for AlarmAlgorithm {
    fn default() -> Self {
        AlarmAlgorithm::Latest
    }
}

/// Relay policy for packets received from other aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayMode {
    Off,
    /// Only landed-out aircraft.
    Landed,
    /// Landed-out plus ADS-B traffic.
    All,
    /// Relay-only ground station mode (relays even while not airborne).
    Only,
}

impl Default for RelayMode {
    fn default() -> Self {
        RelayMode::Landed
    }
}

/// Radio band / regulatory region. Identity derivation from ICAO addresses
/// only applies in North America.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Us,
    Eu,
    Uk,
    Au,
    Nz,
    In,
}

impl Default for Band {
    fn default() -> Self {
        Band::Us
    }
}

/// When the flight log runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlightLogMode {
    None,
    Always,
    Airborne,
    /// Airborne, plus close-traffic snapshot records.
    Traffic,
}

impl Default for FlightLogMode {
    fn default() -> Self {
        FlightLogMode::None
    }
}

bitflags! {
    /// Diagnostic output selectors.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DebugFlags: u32 {
        const WIND = 0x01;
        const PROJECTION = 0x02;
        const ALARM = 0x04;
        const LEGACY = 0x08;
        const DEEPER = 0x10;
        const SIMULATE = 0x0080_0000;
    }
}

// stored in the settings file as the raw bitmask
impl Serialize for DebugFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for DebugFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(DebugFlags::from_bits_truncate(u32::deserialize(
            deserializer,
        )?))
    }
}

/// Everything the core consults at runtime. Loaded by the daemon from its
/// JSON settings file; every field has a sensible default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrafficSettings {
    pub alarm: AlarmAlgorithm,
    /// Protocol of our own transmissions; relaying needs a direct-link one.
    pub rf_protocol: Protocol,
    pub relay: RelayMode,
    pub band: Band,
    /// Address never evicted from the table (0 = none).
    pub follow_id: u32,
    /// Address-space policy for [`crate::identity::random_host_id`].
    pub id_method: AddressKind,
    pub log_alarms: bool,
    pub log_flight: FlightLogMode,
    /// Emit diagnostic `$PS*` sentences.
    pub nmea_debug: bool,
    pub debug_flags: DebugFlags,
    /// Rotate the alarm log when it grows beyond this size.
    pub alarmlog_max_kb: u64,
}

impl Default for TrafficSettings {
    fn default() -> Self {
        TrafficSettings {
            alarm: AlarmAlgorithm::default(),
            rf_protocol: Protocol::Latest,
            relay: RelayMode::default(),
            band: Band::default(),
            follow_id: 0,
            id_method: AddressKind::Anonymous,
            log_alarms: true,
            log_flight: FlightLogMode::None,
            nmea_debug: false,
            debug_flags: DebugFlags::empty(),
            alarmlog_max_kb: 256,
        }
    }
}
