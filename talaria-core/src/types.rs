//! Core data types for traffic tracking.
//!
//! The three central structs mirror the stages a position report goes
//! through: [`TargetReport`] is what the (external) radio decoders hand us,
//! [`TargetSlot`] is a tracked entry in the table with per-tick derived
//! fields, and [`HostState`] is the own-aircraft snapshot refreshed from GNSS
//! before each evaluation pass.

use enum_primitive_derive::Primitive;
use serde::{Deserialize, Serialize};

use crate::alarm::AlarmLevel;

/// Conversion from knots to meters per second.
pub const MPS_PER_KNOT: f64 = 0.51444;

/// Aircraft category, FLARM numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AircraftType {
    Unknown = 0,
    Glider = 1,
    Towplane = 2,
    Helicopter = 3,
    Parachute = 4,
    Dropplane = 5,
    Hangglider = 6,
    Paraglider = 7,
    Powered = 8,
    Jet = 9,
    Balloon = 11,
    Airship = 12,
    Uav = 13,
    Static = 15,
}

impl Default for AircraftType {
    fn default() -> Self {
        AircraftType::Unknown
    }
}

/// How the 24-bit address was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Random = 0,
    Icao = 1,
    SelfAssigned = 2,
    Anonymous = 3,
}

impl Default for AddressKind {
    fn default() -> Self {
        AddressKind::Random
    }
}

/// Transmission kind of the last packet received for a target.
///
/// The ordering is meaningful: everything at or below [`TxKind::ModeS`] is
/// non-directional (bearing-less), everything below [`TxKind::Flarm`] came
/// from an external (ADS-B family) source rather than the direct link.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Primitive, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TxKind {
    None = 0,
    /// Non-directional Mode-S (signal strength only).
    ModeS = 1,
    /// Rebroadcast surveillance data; stale by one uplink hop.
    TisB = 2,
    /// ADS-R rebroadcast.
    AdsR = 3,
    /// Direct ADS-B.
    Adsb = 4,
    /// Direct short-range link (FLARM-compatible family).
    Flarm = 5,
}

impl TxKind {
    /// Bearing-less target: only distance (from signal strength) is known.
    pub fn is_nondirectional(self) -> bool {
        self <= TxKind::ModeS
    }

    /// Received via an external surveillance source rather than the direct link.
    pub fn is_external(self) -> bool {
        self < TxKind::Flarm
    }
}

impl Default for TxKind {
    fn default() -> Self {
        TxKind::None
    }
}

/// Radio protocol the packet was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Primitive, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Legacy = 0,
    OgnTp = 1,
    P3i = 2,
    AdsbUat = 3,
    Fanet = 4,
    Adsb1090 = 5,
    Latest = 6,
    Gdl90 = 7,
}

impl Protocol {
    /// One of the two short-range link generations we can re-encode and relay.
    pub fn is_direct_link(self) -> bool {
        matches!(self, Protocol::Legacy | Protocol::Latest)
    }

    /// Data that reached us through an external ADS-B feed.
    pub fn is_adsb_feed(self) -> bool {
        matches!(self, Protocol::Adsb1090 | Protocol::Gdl90)
    }
}

impl Default for Protocol {
    fn default() -> Self {
        Protocol::Legacy
    }
}

/// Own-aircraft state, refreshed externally on every GNSS fix.
///
/// `air_ns`/`air_ew` hold the six projected 3-second airspeed samples
/// (quarter-meters per second) computed by the wind/projection stage for
/// +3 s through +18 s; `projtime_ms` says when they were computed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostState {
    pub addr: u32,
    pub latitude: f64,
    pub longitude: f64,
    /// GNSS altitude in meters.
    pub altitude: f64,
    pub pressure_altitude: f64,
    /// Ground speed in knots.
    pub speed: f64,
    /// Course over ground in degrees.
    pub course: f64,
    /// Heading (track through the air mass) in degrees.
    pub heading: f64,
    /// Vertical speed in feet per minute.
    pub vs: f64,
    /// Turn rate in degrees per second, positive clockwise.
    pub turnrate: f64,
    pub airborne: bool,
    /// -1 circling left, 0 straight, +1 circling right.
    pub circling: i8,
    pub aircraft_type: AircraftType,
    pub stealth: bool,
    /// Projected N-S airspeed at +3,+6,..,+18 s, quarter-m/s.
    pub air_ns: [i32; 6],
    /// Projected E-W airspeed at +3,+6,..,+18 s, quarter-m/s.
    pub air_ew: [i32; 6],
    /// When the projections above were computed (GNSS ms).
    pub projtime_ms: u64,
    /// Wall-clock seconds of the current fix.
    pub timestamp: u64,
    /// GNSS time of the current fix in milliseconds.
    pub gnsstime_ms: u64,
    /// Wind vector (m/s, blowing-toward components) from the external estimator.
    pub wind_ns: f64,
    pub wind_ew: f64,
}

/// A decoded position report about one aircraft, as handed over by the
/// radio/ADS-B decoders. Input to [`crate::table::TrafficTable`] admission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetReport {
    pub addr: u32,
    pub addr_type: AddressKind,
    pub tx_type: TxKind,
    pub protocol: Protocol,
    pub aircraft_type: AircraftType,
    pub airborne: bool,
    pub circling: i8,
    pub stealth: bool,
    pub no_track: bool,
    /// Already re-transmitted once by another aircraft.
    pub relayed: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub pressure_altitude: f64,
    pub vs: f64,
    pub speed: f64,
    pub course: f64,
    pub heading: f64,
    pub turnrate: f64,
    pub hdop: u16,
    /// Wall-clock seconds when the packet was decoded.
    pub timestamp: u64,
    /// GNSS time embedded in / attached to the packet, milliseconds.
    pub gnsstime_ms: u64,
    pub last_crc: u32,
    /// Signal strength; negative dBm for the direct link, non-negative
    /// scale for ADS-B receivers.
    pub rssi: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callsign: Option<String>,
}

/// One entry of the tracking table: the latest report for an address plus
/// everything derived from it on the most recent evaluation pass.
///
/// A slot with `addr == 0` is empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetSlot {
    pub addr: u32,
    pub addr_type: AddressKind,
    pub tx_type: TxKind,
    pub protocol: Protocol,
    pub aircraft_type: AircraftType,
    pub airborne: bool,
    pub circling: i8,
    pub stealth: bool,
    pub no_track: bool,
    pub relayed: bool,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub pressure_altitude: f64,
    pub vs: f64,
    pub speed: f64,
    pub course: f64,
    pub heading: f64,
    pub turnrate: f64,
    pub hdop: u16,
    pub timestamp: u64,
    pub gnsstime_ms: u64,
    pub last_crc: u32,
    pub rssi: i16,
    /// Received callsign, or one computed from the ICAO address (then it
    /// carries a trailing `?`).
    pub callsign: String,

    // --- derived on every update, host-relative ---
    /// East offset from host, meters.
    pub dx: i32,
    /// North offset from host, meters.
    pub dy: i32,
    /// Horizontal distance, meters.
    pub distance: f64,
    /// Bearing from host, degrees in [0, 360).
    pub bearing: f64,
    /// Altitude difference (target minus host), meters.
    pub alt_diff: f64,
    /// `alt_diff` biased by relative vertical speed and dead-banded.
    pub adj_alt_diff: f64,
    /// `distance` plus the altitude-difference penalty.
    pub adj_distance: f64,
    /// Bearing relative to host heading, degrees in [-180, 180].
    pub rel_heading: f64,

    // --- previous-packet history for turn-rate estimation ---
    pub prevtime_ms: u64,
    pub prevcourse: f64,
    pub prevheading: f64,
    pub prevaltitude: f64,

    // --- short-horizon projections (quarter-m/s at +3..+18 s) ---
    pub air_ns: [i32; 6],
    pub air_ew: [i32; 6],
    pub projtime_ms: u64,

    // --- alarm state ---
    pub alarm_level: AlarmLevel,
    /// Latched notification threshold; see the hysteresis rules in
    /// [`crate::engine::TrafficEngine`].
    pub alert_level: AlarmLevel,

    // --- relay state ---
    /// Wall-clock seconds of the last relay of this target (1 = tried once).
    pub timerelayed: u64,

    // --- per-aircraft link statistics (ADS-B sources) ---
    pub mindist: f64,
    pub mindistrssi: i16,
    pub maxrssi: i16,
    pub maxrssirelalt: f64,
}

impl TargetSlot {
    pub fn is_empty(&self) -> bool {
        self.addr == 0
    }

    pub fn clear(&mut self) {
        *self = TargetSlot::default();
    }

    /// Copy the fields of a fresh report into this slot, preserving history
    /// and derived state. A callsign already present is kept.
    pub fn absorb(&mut self, r: &TargetReport) {
        self.addr = r.addr;
        self.addr_type = r.addr_type;
        self.tx_type = r.tx_type;
        self.protocol = r.protocol;
        self.aircraft_type = r.aircraft_type;
        self.airborne = r.airborne;
        self.circling = r.circling;
        self.stealth = r.stealth;
        self.no_track = r.no_track;
        self.relayed = r.relayed;
        self.latitude = r.latitude;
        self.longitude = r.longitude;
        self.altitude = r.altitude;
        self.pressure_altitude = r.pressure_altitude;
        self.vs = r.vs;
        self.speed = r.speed;
        self.course = r.course;
        self.heading = r.heading;
        self.turnrate = r.turnrate;
        self.hdop = r.hdop;
        self.timestamp = r.timestamp;
        self.gnsstime_ms = r.gnsstime_ms;
        self.last_crc = r.last_crc;
        self.rssi = r.rssi;
        if self.callsign.is_empty() {
            if let Some(cs) = &r.callsign {
                if !cs.trim().is_empty() {
                    self.callsign = cs.trim_end().to_string();
                }
            }
        }
    }

    /// Rotate the two-snapshot packet history so the current packet becomes
    /// the previous one.
    pub fn rotate_history(&mut self) {
        self.prevtime_ms = self.gnsstime_ms;
        self.prevcourse = self.course;
        self.prevheading = self.heading;
        self.prevaltitude = self.altitude;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::FromPrimitive;

    #[test]
    fn tx_kind_classes() {
        assert!(TxKind::ModeS.is_nondirectional());
        assert!(TxKind::None.is_nondirectional());
        assert!(!TxKind::TisB.is_nondirectional());
        assert!(TxKind::TisB.is_external());
        assert!(TxKind::Adsb.is_external());
        assert!(!TxKind::Flarm.is_external());
    }

    #[test]
    fn enums_from_wire_numbers() {
        assert_eq!(AircraftType::from_u8(1), Some(AircraftType::Glider));
        assert_eq!(AircraftType::from_u8(9), Some(AircraftType::Jet));
        assert_eq!(AircraftType::from_u8(10), None);
        assert_eq!(TxKind::from_u8(2), Some(TxKind::TisB));
        assert_eq!(AddressKind::from_u8(1), Some(AddressKind::Icao));
    }

    #[test]
    fn absorb_keeps_existing_callsign() {
        let mut slot = TargetSlot {
            callsign: "N123AB".to_string(),
            ..Default::default()
        };
        let r = TargetReport {
            addr: 0xABCDEF,
            callsign: Some("OTHER".to_string()),
            ..Default::default()
        };
        slot.absorb(&r);
        assert_eq!(slot.callsign, "N123AB");
    }

    #[test]
    fn empty_slot_is_addr_zero() {
        let mut slot = TargetSlot::default();
        assert!(slot.is_empty());
        slot.addr = 1;
        assert!(!slot.is_empty());
        slot.clear();
        assert!(slot.is_empty());
    }
}
