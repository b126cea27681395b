//! Short-horizon course projection for tracked targets.
//!
//! The "latest" alarm algorithm wants each aircraft's velocity through the
//! air mass at +3, +6 .. +18 seconds, as integer quarter-m/s components.
//! For the host these come with the GNSS/wind state; for targets we assume
//! the current turn rate holds (a circling aircraft keeps circling) and
//! rotate the ground-speed vector forward, removing the wind the host
//! estimated.

use crate::types::{HostState, TargetSlot, MPS_PER_KNOT};

/// Turn rates below this are treated as flying straight, deg/s.
pub const CIRCLING_TURNRATE: f64 = 2.0;

/// Difference between two courses in degrees, wrapped to [-180, 180].
pub fn course_difference(a: f64, b: f64) -> f64 {
    let mut d = (a - b) % 360.0;
    if d > 180.0 {
        d -= 360.0;
    } else if d < -180.0 {
        d += 360.0;
    }
    d
}

/// Fill a slot's projected airspeed samples from its current motion.
///
/// Estimates the turn rate from the packet history when the protocol did
/// not carry one, then projects the course at a constant turn rate and
/// subtracts the host-estimated wind. Also settles the circling flag from
/// the turn rate.
pub fn project_target(slot: &mut TargetSlot, host: &HostState) {
    if slot.turnrate == 0.0 && slot.prevtime_ms != 0 && slot.gnsstime_ms > slot.prevtime_ms {
        let dt = (slot.gnsstime_ms - slot.prevtime_ms) as f64 * 0.001;
        if dt <= 2.6 {
            slot.turnrate = course_difference(slot.course, slot.prevcourse) / dt;
        }
    }

    if slot.turnrate > CIRCLING_TURNRATE {
        slot.circling = 1;
    } else if slot.turnrate < -CIRCLING_TURNRATE {
        slot.circling = -1;
    }

    let gs = slot.speed * MPS_PER_KNOT;
    for i in 0..6 {
        let dt = 3.0 * (i + 1) as f64;
        let course = (slot.course + slot.turnrate * dt).to_radians();
        let vn = gs * course.cos() - host.wind_ns;
        let ve = gs * course.sin() - host.wind_ew;
        slot.air_ns[i] = (4.0 * vn).round() as i32;
        slot.air_ew[i] = (4.0 * ve).round() as i32;
    }

    // track through the air mass right now
    let course0 = slot.course.to_radians();
    let vn0 = gs * course0.cos() - host.wind_ns;
    let ve0 = gs * course0.sin() - host.wind_ew;
    let mut heading = ve0.atan2(vn0).to_degrees();
    if heading < 0.0 {
        heading += 360.0;
    }
    slot.heading = heading;

    slot.projtime_ms = slot.gnsstime_ms;
}
