//! Short-horizon collision simulation.
//!
//! Projects both aircraft second by second over the next 18 s using the
//! 3-second-cadence airspeed samples, tracking the minimum 3-D separation
//! (vertical weighted double). Built for traffic that is turning: thermal
//! gaggles and aerotows get wider tolerances, a lower aircraft that is
//! rising fast is assumed to be trading speed for altitude (zoom climb).
//!
//! All projection math is 32-bit integer in quarter-meter units: 18 s at
//! 80 m/s is 5760 quarter-meters, squared ~3.3e7, comfortably in range.

use super::distance::alarm_distance;
use super::vector::alarm_vector;
use super::{
    AlarmLevel, ALARM_TIME_CLOSE, ALARM_TIME_EXTREME, ALARM_TIME_IMPORTANT, ALARM_TIME_LOW,
    ALARM_TIME_URGENT, ALARM_ZONE_CLOSE, VERTICAL_SEPARATION, VERTICAL_SLACK,
};
use crate::config::{DebugFlags, TrafficSettings};
use crate::projection;
use crate::sentences;
use crate::types::{AircraftType, HostState, Protocol, TargetSlot, TxKind, MPS_PER_KNOT};

/// Fill the 1-second velocity table from six 3-second samples by
/// replication, optionally scaled for an expected zoom climb, with one
/// extra second extrapolated.
fn expand_samples(
    vx_out: &mut [i32; 19],
    vy_out: &mut [i32; 19],
    ew: &[i32; 6],
    ns: &[i32; 6],
    factor: Option<i32>,
) {
    for i in 0..6 {
        let (vx, vy) = match factor {
            // factor carries a 64x scale
            Some(f) => ((ew[i] * f) >> 6, (ns[i] * f) >> 6),
            None => (ew[i], ns[i]),
        };
        for j in 0..3 {
            vx_out[3 * i + j] = vx;
            vy_out[3 * i + j] = vy;
        }
    }
    // extrapolate one more second
    vx_out[18] = vx_out[17];
    vy_out[18] = vy_out[17];
}

pub(crate) fn alarm_latest(
    host: &HostState,
    slot: &mut TargetSlot,
    settings: &TrafficSettings,
    sentences_out: &mut Vec<String>,
) -> AlarmLevel {
    if slot.distance > 2.0 * ALARM_ZONE_CLOSE {
        return AlarmLevel::None;
    }
    if slot.tx_type.is_nondirectional() {
        return alarm_distance(slot);
    }
    if slot.speed == 0.0 {
        return alarm_distance(slot);
    }
    if slot.tx_type == TxKind::TisB || slot.relayed {
        // data not timely enough for this algorithm
        return alarm_vector(host, slot, settings, sentences_out);
    }

    let v2 = slot.speed + host.speed;
    if slot.distance > v2 * (ALARM_TIME_LOW as f64 * MPS_PER_KNOT) {
        return AlarmLevel::None;
    }

    // coarse vertical early-out with a kinetic zoom-up allowance
    let vv = v2 as i32;
    let zoom_budget = (vv * vv) >> 8;
    if slot.adj_alt_diff.abs() as i32 - zoom_budget > VERTICAL_SEPARATION as i32 {
        return AlarmLevel::None;
    }

    // when the packet carried a turn rate we can tell straight flight
    // before paying for the projection
    if slot.protocol == Protocol::Latest
        && host.turnrate.abs() < 2.0
        && slot.turnrate.abs() < 2.0
    {
        return alarm_vector(host, slot, settings, sentences_out);
    }

    projection::project_target(slot, host);

    if slot.protocol != Protocol::Latest
        && host.turnrate.abs() < 2.0
        && slot.turnrate.abs() < 2.0
    {
        return alarm_vector(host, slot, settings, sentences_out);
    }

    let gaggling = (host.circling + slot.circling).abs() == 2;

    let mut towing = (host.aircraft_type == AircraftType::Towplane
        && slot.aircraft_type == AircraftType::Glider)
        || (host.aircraft_type == AircraftType::Glider
            && slot.aircraft_type == AircraftType::Towplane);
    if towing {
        let course_diff = (host.course - slot.course).abs();
        if course_diff > 20.0 && course_diff < 340.0 {
            towing = false;
        }
        if (host.turnrate - slot.turnrate).abs() > 6.0 {
            towing = false;
        }
        if (host.speed - slot.speed).abs() > 15.0 {
            towing = false;
        }
    }

    // integer math from here on

    let dz = slot.alt_diff as i32; // raw, the zoom-up is re-derived below
    let vsr = slot.vs - host.vs;
    let absdz = dz.abs();
    let mut adjdz = absdz;

    // the lower aircraft may zoom up: potential altitude gain ~ V^2/20
    let airspeed_sq = if dz < 0 && slot.circling == 0 && vsr > 400.0 {
        let vx = slot.air_ew[0];
        let vy = slot.air_ns[0];
        vx * vx + vy * vy
    } else if dz > 0 && host.circling == 0 && vsr < -400.0 {
        let vx = host.air_ew[0];
        let vy = host.air_ns[0];
        vx * vx + vy * vy
    } else {
        0
    };

    let mut zoom = false;
    let mut factor: i32 = 64;
    if airspeed_sq > 20 * 20 * 4 * 4 {
        // can zoom until airspeed decays to 20 m/s
        let excess = airspeed_sq - 20 * 20 * 4 * 4;
        adjdz -= excess >> 9; // about 2/3 of the possible zoom
        if excess > 8000 {
            zoom = true;
            // zooming to the other's level costs speed; roughly (1 - 5 dz/V^2)
            factor = 64 - (5 * 16 * 64 * absdz) / airspeed_sq;
            if factor < 48 {
                factor = 48;
            }
        }
    }
    adjdz -= VERTICAL_SLACK as i32;
    if adjdz < 0 {
        adjdz = 0;
    }
    if adjdz > 60 {
        // cannot reach the 120 m 3-D threshold below
        return AlarmLevel::None;
    }

    // second-by-second velocity tables, quarter-m/s
    let mut thisvx = [0i32; 19];
    let mut thisvy = [0i32; 19];
    let mut thatvx = [0i32; 19];
    let mut thatvy = [0i32; 19];
    let this_factor = (zoom && dz > 15).then_some(factor);
    let that_factor = (zoom && dz < -15).then_some(factor);
    expand_samples(&mut thisvx, &mut thisvy, &host.air_ew, &host.air_ns, this_factor);
    expand_samples(&mut thatvx, &mut thatvy, &slot.air_ew, &slot.air_ns, that_factor);

    // relative start position in quarter-meters
    let mut dx = slot.dx << 2;
    let mut dy = slot.dy << 2;

    let mut minsqdist = 200 * 200 * 4 * 4;
    let mut mintime = ALARM_TIME_CLOSE;
    let mut vxmin = 0;
    let mut vymin = 0;

    // if the projections are from different times, offset by one second
    let (mut i, mut j) = if slot.projtime_ms > host.projtime_ms + 500 {
        dx -= thisvx[0];
        dy -= thisvy[0];
        (0usize, 1usize)
    } else if host.projtime_ms > slot.projtime_ms + 500 {
        dx += thatvx[0];
        dy += thatvy[0];
        (1usize, 0usize)
    } else {
        (0usize, 0usize)
    };

    // quarter-meters, with vertical separation weighted 2x horizontal
    let adjdz = adjdz << 3;
    let sqdz = adjdz * adjdz;
    let cursqdist = dx * dx + dy * dy + sqdz;

    for t in 0..18 {
        let vx = thatvx[i] - thisvx[j];
        let vy = thatvy[i] - thisvy[j];
        dx += vx;
        dy += vy;
        let sqdist = dx * dx + dy * dy + sqdz;
        if sqdist < minsqdist {
            minsqdist = sqdist;
            vxmin = vx;
            vymin = vy;
            mintime = t;
        }
        i += 1;
        j += 1;
    }

    if cursqdist <= minsqdist || mintime == 0 {
        // not getting any closer than the current situation
        return AlarmLevel::None;
    }

    // thresholds squeezed between thermal size, tow-rope length, and
    // prediction accuracy
    let mut level: i8 = if minsqdist < 40 * 40 * 4 * 4 {
        if mintime < ALARM_TIME_URGENT {
            AlarmLevel::Urgent as i8
        } else if mintime < ALARM_TIME_IMPORTANT {
            AlarmLevel::Important as i8
        } else {
            AlarmLevel::Low as i8
        }
    } else if minsqdist < 70 * 70 * 4 * 4 && !gaggling && !towing {
        if mintime < ALARM_TIME_EXTREME {
            AlarmLevel::Urgent as i8
        } else if mintime < ALARM_TIME_URGENT {
            AlarmLevel::Important as i8
        } else if mintime < ALARM_TIME_IMPORTANT {
            AlarmLevel::Low as i8
        } else {
            AlarmLevel::Close as i8
        }
    } else if minsqdist < 120 * 120 * 4 * 4 && !gaggling && !towing {
        if mintime < ALARM_TIME_EXTREME {
            AlarmLevel::Important as i8
        } else if mintime < ALARM_TIME_URGENT {
            AlarmLevel::Low as i8
        } else if mintime < ALARM_TIME_IMPORTANT {
            AlarmLevel::Close as i8
        } else {
            AlarmLevel::None as i8
        }
    } else {
        AlarmLevel::None as i8
    };

    // reduce the level when the convergence at closest approach is slow
    let mut sqspeed = 0;
    if level > AlarmLevel::None as i8 {
        sqspeed = vxmin * vxmin + vymin * vymin;
        if sqspeed < 6 * 6 * 4 * 4 {
            level -= 1;
            if sqspeed < 4 * 4 * 4 * 4 {
                level -= 1;
                if sqspeed < 2 * 2 * 4 * 4 {
                    level -= 1;
                }
            }
        }
    }
    let rval = match level.max(0) {
        4 => AlarmLevel::Urgent,
        3 => AlarmLevel::Important,
        2 => AlarmLevel::Low,
        1 => AlarmLevel::Close,
        _ => AlarmLevel::None,
    };

    if rval >= AlarmLevel::Low
        && mintime < ALARM_TIME_EXTREME
        && slot.alert_level > AlarmLevel::None
    {
        // may sound a new alarm even for the same Urgent level
        slot.alert_level = slot.alert_level.lower();
    }

    if rval > AlarmLevel::Close || slot.distance < 300.0 || minsqdist < 120 * 120 * 4 * 4 {
        if settings.nmea_debug && settings.debug_flags.contains(DebugFlags::ALARM) {
            sentences_out.push(sentences::psall(host, slot, rval, mintime, minsqdist, sqspeed));
        }
    }

    rval
}
