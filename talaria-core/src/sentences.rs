//! Diagnostic telemetry sentences.
//!
//! Comma-separated ASCII lines in the legacy `$PS*` family, CR/LF
//! terminated. They exist for bench debugging and log scraping only and
//! carry no control; user-facing ones get an NMEA checksum, the
//! high-rate internal dumps go out bare.

use crate::alarm::AlarmLevel;
use crate::types::{HostState, TargetSlot};

/// XOR checksum over everything between `$` and `*`.
pub fn nmea_checksum(body: &str) -> u8 {
    body.bytes().skip(1).fold(0, |acc, b| acc ^ b)
}

/// Append `*HH` and the line terminator to a bare sentence body.
pub fn with_checksum(body: String) -> String {
    let cs = nmea_checksum(&body);
    format!("{}*{:02X}\r\n", body, cs)
}

/// Vector-alarm internals: relative velocity, bearing, time to impact and
/// both aircraft states.
pub fn psalv(
    host: &HostState,
    slot: &TargetSlot,
    level: AlarmLevel,
    v_rel_magnitude: f64,
    v_rel_direction: f64,
    t: f64,
) -> String {
    format!(
        "$PSALV,{:06X},{},{},{:.1},{:.1},{:.1},{:.1},{:.5},{:.5},{:.1},{:.1},{:.1},{:.5},{:.5},{:.1},{:.1},{:.1}\r\n",
        slot.addr,
        slot.gnsstime_ms,
        level as i8,
        v_rel_magnitude,
        v_rel_direction,
        slot.bearing,
        t,
        host.latitude,
        host.longitude,
        host.altitude,
        host.speed,
        host.course,
        slot.latitude,
        slot.longitude,
        slot.altitude,
        slot.speed,
        slot.course,
    )
}

/// Simulation-alarm internals: projection ages, minimum squared distance
/// and the relative speed there.
pub fn psall(
    host: &HostState,
    slot: &TargetSlot,
    level: AlarmLevel,
    mintime: i32,
    minsqdist: i32,
    sqspeed: i32,
) -> String {
    format!(
        "$PSALL,{:06X},{},{},{},{},{},{},{:.1},{:.1},{:.1},{},{},{:.1},{:.1},{:.1},{:.1}\r\n",
        slot.addr,
        slot.projtime_ms,
        host.projtime_ms,
        level as i8,
        mintime,
        minsqdist,
        sqspeed,
        host.speed,
        host.heading,
        host.turnrate,
        slot.dy,
        slot.dx,
        slot.alt_diff,
        slot.speed,
        slot.heading,
        slot.turnrate,
    )
}

/// Sound-notification record: level, multiple-threat flag, target address.
pub fn psraa(level: AlarmLevel, multi: bool, addr: u32) -> String {
    with_checksum(format!(
        "$PSRAA,{},{},{:06X}",
        level.dataport(),
        multi as u8,
        addr
    ))
}

/// A packet of ours relayed this target.
pub fn psrly(hour: u32, minute: u32, addr: u32, callsign: &str) -> String {
    with_checksum(format!(
        "$PSRLY,{:02}:{:02},{:06x},{}",
        hour, minute, addr, callsign
    ))
}

/// Landed-out transition with last known position.
pub fn psrlo(hour: u32, minute: u32, addr: u32, latitude: f64, longitude: f64) -> String {
    with_checksum(format!(
        "$PSRLO,{:02}:{:02},{:06x},{:.5},{:.5}",
        hour, minute, addr, latitude, longitude
    ))
}

/// Relay bookkeeping dump.
pub fn psarl(addr: u32, timerelayed: u64) -> String {
    format!("$PSARL,1,{:06X},{}\r\n", addr, timerelayed)
}

/// Per-aircraft ADS-B link statistics, emitted when the slot expires.
pub fn psadx(slot: &TargetSlot) -> String {
    format!(
        "$PSADX,{:06X},{},{},{},{},{}\r\n",
        slot.addr,
        slot.tx_type as u8,
        slot.maxrssirelalt as i32,
        slot.mindist as i32,
        slot.mindistrssi,
        slot.maxrssi,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_matches_reference() {
        // classic NMEA example: $GPGGA..*47 style xor
        assert_eq!(nmea_checksum("$PSRAA,2,0,ABCDEF"), {
            let mut x = 0u8;
            for b in "PSRAA,2,0,ABCDEF".bytes() {
                x ^= b;
            }
            x
        });
    }

    #[test]
    fn psraa_shape() {
        let s = psraa(AlarmLevel::Important, true, 0xABCDEF);
        assert!(s.starts_with("$PSRAA,2,1,ABCDEF*"));
        assert!(s.ends_with("\r\n"));
        // two hex digits between '*' and CRLF
        let star = s.find('*').unwrap();
        assert_eq!(s.len() - star, 5);
    }

    #[test]
    fn psrlo_uses_lowercase_addr_and_5_decimals() {
        let s = psrlo(14, 5, 0xABCDEF, 45.12345678, -72.5);
        assert!(s.starts_with("$PSRLO,14:05,abcdef,45.12346,-72.50000*"));
    }

    #[test]
    fn infinite_time_prints_inf() {
        let host = HostState::default();
        let slot = TargetSlot::default();
        let s = psalv(&host, &slot, AlarmLevel::None, 0.0, 0.0, f64::INFINITY);
        assert!(s.contains(",inf,"));
    }
}
