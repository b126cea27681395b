//! Straight-line collision prediction from course and ground speed.
//!
//! Subtracts the two 2-D velocity vectors and checks whether the target's
//! incoming direction lines up with its bearing; three widening angle bands
//! map time-to-impact onto progressively weaker levels. Only meaningful
//! while neither aircraft is turning; falls back to the distance bands
//! otherwise.

use super::distance::alarm_distance;
use super::{
    AlarmLevel, ALARM_TIME_CLOSE, ALARM_TIME_EXTREME, ALARM_TIME_IMPORTANT, ALARM_TIME_LOW,
    ALARM_TIME_URGENT, ALARM_VECTOR_ANGLE, ALARM_VECTOR_SPEED, ALARM_ZONE_CLOSE,
    VERTICAL_SEPARATION,
};
use crate::config::{DebugFlags, TrafficSettings};
use crate::sentences;
use crate::types::{HostState, TargetSlot, MPS_PER_KNOT};

pub(crate) fn alarm_vector(
    host: &HostState,
    slot: &mut TargetSlot,
    settings: &TrafficSettings,
    sentences_out: &mut Vec<String>,
) -> AlarmLevel {
    if slot.tx_type.is_nondirectional() {
        return alarm_distance(slot);
    }
    if slot.speed == 0.0 {
        // ADS-B target with no velocity message yet
        return alarm_distance(slot);
    }
    if slot.prevtime_ms == 0 || slot.gnsstime_ms.saturating_sub(slot.prevtime_ms) > 3000 {
        return alarm_distance(slot);
    }

    let distance = slot.distance;
    if distance > 2.0 * ALARM_ZONE_CLOSE {
        return AlarmLevel::None;
    }

    let abs_alt_diff = slot.adj_alt_diff.abs();
    if abs_alt_diff >= VERTICAL_SEPARATION {
        return AlarmLevel::None;
    }

    if distance > (slot.speed + host.speed) * (ALARM_TIME_LOW as f64 * MPS_PER_KNOT) {
        return AlarmLevel::None;
    }

    // if either aircraft is turning the vector method is not usable
    if host.turnrate.abs() > 3.0 || slot.turnrate.abs() > 3.0 {
        return alarm_distance(slot);
    }

    let mut rval = AlarmLevel::None;
    let mut t = f64::INFINITY;

    let adj_distance = slot.adj_distance.max(distance);

    // subtract the 2D velocity vectors (still in knots)
    let this_course = host.course.to_radians();
    let that_course = slot.course.to_radians();
    let v_rel_y = host.speed * this_course.cos() - slot.speed * that_course.cos();
    let v_rel_x = host.speed * this_course.sin() - slot.speed * that_course.sin();

    let v_rel_magnitude = v_rel_x.hypot(v_rel_y) * MPS_PER_KNOT;
    let mut v_rel_direction = v_rel_x.atan2(v_rel_y).to_degrees();
    if v_rel_direction < 0.0 {
        v_rel_direction += 360.0;
    }

    if v_rel_magnitude > ALARM_VECTOR_SPEED {
        t = adj_distance / v_rel_magnitude;

        let mut rel_angle = (v_rel_direction - slot.bearing).abs();
        if rel_angle > 180.0 {
            rel_angle = 360.0 - rel_angle;
        }

        if rel_angle < ALARM_VECTOR_ANGLE && v_rel_magnitude > 3.0 * ALARM_VECTOR_SPEED {
            // time limits compliant with the legacy data-port bands
            if t < ALARM_TIME_CLOSE as f64 {
                rval = AlarmLevel::Close;
                if t < ALARM_TIME_LOW as f64 {
                    rval = AlarmLevel::Low;
                    if t < ALARM_TIME_IMPORTANT as f64 {
                        rval = AlarmLevel::Important;
                        if t < ALARM_TIME_URGENT as f64 {
                            rval = AlarmLevel::Urgent;
                        }
                    }
                }
            }
        } else if rel_angle < 2.0 * ALARM_VECTOR_ANGLE {
            // less direct course, one band weaker
            if t < ALARM_TIME_LOW as f64 {
                rval = AlarmLevel::Close;
                if t < ALARM_TIME_IMPORTANT as f64 {
                    rval = AlarmLevel::Low;
                    if t < ALARM_TIME_URGENT as f64 {
                        rval = AlarmLevel::Important;
                        if t < ALARM_TIME_EXTREME as f64 {
                            rval = AlarmLevel::Urgent;
                        }
                    }
                }
            }
        } else if rel_angle < 3.0 * ALARM_VECTOR_ANGLE {
            if t < ALARM_TIME_IMPORTANT as f64 {
                rval = AlarmLevel::Close;
                if t < ALARM_TIME_URGENT as f64 {
                    rval = AlarmLevel::Low;
                    if t < ALARM_TIME_EXTREME as f64 {
                        rval = AlarmLevel::Important;
                    }
                }
            }
        }
    }

    if rval >= AlarmLevel::Low && t < ALARM_TIME_EXTREME as f64 && slot.alert_level > AlarmLevel::None
    {
        // may sound a new alarm for the same Urgent level
        slot.alert_level = slot.alert_level.lower();
    }

    if settings.nmea_debug && settings.debug_flags.contains(DebugFlags::ALARM) {
        sentences_out.push(sentences::psalv(
            host,
            slot,
            rval,
            v_rel_magnitude,
            v_rel_direction,
            t,
        ));
    }

    rval
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::adjusted_alt_diff;
    use crate::alarm::VERTICAL_SLOPE;
    use crate::geo::{self, CosLatCache};
    use crate::types::TxKind;

    fn host() -> HostState {
        HostState {
            latitude: 45.0,
            longitude: 8.0,
            altitude: 1000.0,
            course: 90.0,
            heading: 90.0,
            speed: 80.0,
            ..Default::default()
        }
    }

    fn slot(lat: f64, lon: f64, alt: f64, course: f64, speed: f64) -> TargetSlot {
        TargetSlot {
            addr: 0xABCDEF,
            tx_type: TxKind::Flarm,
            latitude: lat,
            longitude: lon,
            altitude: alt,
            course,
            speed,
            gnsstime_ms: 10_000,
            prevtime_ms: 9_000,
            ..Default::default()
        }
    }

    fn prepare(host: &HostState, slot: &mut TargetSlot) {
        let mut cache = CosLatCache::default();
        geo::update_slot(slot, host, &mut cache);
        slot.adj_alt_diff = adjusted_alt_diff(host, slot);
        slot.adj_distance = slot.distance + VERTICAL_SLOPE * slot.adj_alt_diff.abs();
    }

    fn eval(host: &HostState, slot: &mut TargetSlot) -> AlarmLevel {
        let settings = TrafficSettings::default();
        let mut out = Vec::new();
        alarm_vector(host, slot, &settings, &mut out)
    }

    #[test]
    fn head_on_is_urgent() {
        // ~787 m apart, closing at ~82 m/s: impact in under 10 s
        let host = host();
        let mut slot = slot(45.0, 8.010, 1000.0, 270.0, 80.0);
        prepare(&host, &mut slot);
        assert_eq!(eval(&host, &mut slot), AlarmLevel::Urgent);
    }

    #[test]
    fn parallel_cruise_is_none() {
        // 500 m north, same course and speed: no relative motion
        let host = host();
        let mut slot = slot(45.0045, 8.0, 1000.0, 90.0, 80.0);
        prepare(&host, &mut slot);
        assert_eq!(eval(&host, &mut slot), AlarmLevel::None);
    }

    #[test]
    fn altitude_separation_suppresses() {
        // same head-on geometry but 400 m higher
        let host = host();
        let mut slot = slot(45.0, 8.010, 1400.0, 270.0, 80.0);
        prepare(&host, &mut slot);
        assert_eq!(eval(&host, &mut slot), AlarmLevel::None);
    }

    #[test]
    fn turning_host_falls_back_to_distance() {
        let mut host = host();
        host.turnrate = 12.0;
        let mut slot = slot(45.0, 8.010, 1000.0, 270.0, 80.0);
        prepare(&host, &mut slot);
        // 787 m co-altitude -> distance band Low
        assert_eq!(eval(&host, &mut slot), AlarmLevel::Low);
    }

    #[test]
    fn crossing_at_angle_gets_weaker_band() {
        // target west of us heading north-east-ish: incoming direction well
        // off the bearing, outside all bands
        let host = host();
        let mut slot = slot(45.0, 8.010, 1000.0, 0.0, 80.0);
        prepare(&host, &mut slot);
        let level = eval(&host, &mut slot);
        assert!(level <= AlarmLevel::Close, "level {:?}", level);
    }

    #[test]
    fn stale_history_falls_back() {
        let host = host();
        let mut slot = slot(45.0, 8.010, 1000.0, 270.0, 80.0);
        slot.prevtime_ms = 0;
        prepare(&host, &mut slot);
        assert_eq!(eval(&host, &mut slot), AlarmLevel::Low);
    }

    #[test]
    fn debug_sentence_emitted_when_enabled() {
        let host = host();
        let mut slot = slot(45.0, 8.010, 1000.0, 270.0, 80.0);
        prepare(&host, &mut slot);
        let mut settings = TrafficSettings::default();
        settings.nmea_debug = true;
        settings.debug_flags = DebugFlags::ALARM;
        let mut out = Vec::new();
        alarm_vector(&host, &mut slot, &settings, &mut out);
        assert_eq!(out.len(), 1);
        assert!(out[0].starts_with("$PSALV,ABCDEF,"));
    }
}
