//! Log record formatting.
//!
//! Pure string builders for the two append-only logs: the alarm log (one
//! CSV row per sounded notification) and the flight-log traffic records
//! (close traffic snapshots and alarm transitions). Timestamps and GNSS
//! position text come from the caller; the core knows nothing about
//! calendars or file systems.

use serde::Serialize;

use crate::alarm::AlarmLevel;
use crate::types::{HostState, TargetSlot, TxKind, MPS_PER_KNOT};

/// Header row written to a fresh alarm log.
pub const ALARM_LOG_HEADER: &str = "date,time,lat,lon,level,count,ID,relbrg,hdist,vdist\r\n";

/// The data behind one alarm-log row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmRecord {
    pub addr: u32,
    pub level: AlarmLevel,
    /// How many targets were above their notification threshold.
    pub count: u32,
    pub rel_heading: i32,
    pub distance: i32,
    pub alt_diff: i32,
}

/// One alarm-log CSV row. `date` is `yymmdd`, `time_pos` is the
/// `hhmmss.ss,lat,N,lon,W` fragment from the current GNSS sentence.
pub fn alarm_log_row(date: &str, time_pos: &str, rec: &AlarmRecord) -> String {
    format!(
        "{},{},{},{},{:06x},{},{},{}\r\n",
        date,
        time_pos,
        rec.level.dataport(),
        rec.count,
        rec.addr,
        rec.rel_heading,
        rec.distance,
        rec.alt_diff,
    )
}

/// One flight-log traffic record. `label` distinguishes periodic close
/// traffic (`LPLTT`) from alarm transitions (`LPLTA`).
pub fn traffic_row(label: &str, slot: &TargetSlot, host: &HostState) -> String {
    // no-track FLARM targets are anonymized in the logs
    let addr = if slot.no_track && slot.tx_type == TxKind::Flarm {
        0xAAAAAA
    } else {
        slot.addr
    };
    let wind_speed_kn = host.wind_ns.hypot(host.wind_ew) / MPS_PER_KNOT;
    let mut wind_dir = host.wind_ew.atan2(host.wind_ns).to_degrees();
    if wind_dir < 0.0 {
        wind_dir += 360.0;
    }
    format!(
        "{},{},{},{},{},{:06x},{},{},{},{},{},{},{},{},{},{},{},{},{}\r\n",
        label,
        slot.alarm_level.dataport(),
        slot.tx_type as u8,
        slot.protocol as u8,
        slot.aircraft_type as u8,
        addr,
        slot.distance as i32,
        slot.bearing as i32,
        slot.speed as i32,
        slot.course as i32,
        slot.turnrate as i32,
        slot.rel_heading as i32,
        slot.alt_diff as i32,
        (slot.vs - host.vs) as i32,
        host.speed as i32,
        host.course as i32,
        host.turnrate as i32,
        wind_speed_kn as i32,
        wind_dir as i32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AircraftType, Protocol};

    #[test]
    fn alarm_row_shape() {
        let rec = AlarmRecord {
            addr: 0xABCDEF,
            level: AlarmLevel::Urgent,
            count: 2,
            rel_heading: -30,
            distance: 450,
            alt_diff: -20,
        };
        let row = alarm_log_row("260113", "142530.00,4500.00000,N,00800.00000,E", &rec);
        assert_eq!(
            row,
            "260113,142530.00,4500.00000,N,00800.00000,E,3,2,abcdef,-30,450,-20\r\n"
        );
    }

    #[test]
    fn header_matches_row_columns() {
        // date + the 4-field time_pos fragment + 6 data fields
        let rec = AlarmRecord {
            addr: 1,
            level: AlarmLevel::Low,
            count: 1,
            rel_heading: 0,
            distance: 100,
            alt_diff: 0,
        };
        let row = alarm_log_row("260113", "120000.00,0.0,N,0.0,E", &rec);
        assert_eq!(
            row.trim_end().split(',').count(),
            ALARM_LOG_HEADER.trim_end().split(',').count() + 2 // lat/lon carry N/S, E/W markers
        );
    }

    #[test]
    fn no_track_flarm_is_anonymized() {
        let host = HostState::default();
        let mut slot = TargetSlot {
            addr: 0x123456,
            tx_type: TxKind::Flarm,
            no_track: true,
            protocol: Protocol::Latest,
            aircraft_type: AircraftType::Glider,
            ..Default::default()
        };
        let row = traffic_row("LPLTT", &slot, &host);
        assert!(row.contains(",aaaaaa,"), "row {}", row);

        slot.no_track = false;
        let row = traffic_row("LPLTT", &slot, &host);
        assert!(row.contains(",123456,"));
    }

    #[test]
    fn traffic_row_reports_relative_vs() {
        let host = HostState {
            vs: 200.0,
            ..Default::default()
        };
        let slot = TargetSlot {
            addr: 1,
            vs: 500.0,
            ..Default::default()
        };
        let row = traffic_row("LPLTA", &slot, &host);
        let fields: Vec<&str> = row.trim_end().split(',').collect();
        assert_eq!(fields[0], "LPLTA");
        assert_eq!(fields[13], "300");
    }
}
