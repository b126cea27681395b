//! Per-target alarm level computation.
//!
//! Three interchangeable algorithms produce a level in
//! None < Close < Low < Important < Urgent:
//!
//! - [`distance`]: static range bands, used directly for non-directional
//!   targets and as the fallback of the smarter predictors;
//! - [`vector`]: straight-line closing-vector prediction for non-turning
//!   traffic;
//! - [`latest`]: second-by-second integer simulation over the next 18 s,
//!   built for circling traffic (thermal gaggles, aerotows).
//!
//! The algorithms also participate in notification hysteresis: when a target
//! gets extremely close or the predicted impact is imminent they lower the
//! latched `alert_level` so a fresh notification may fire at an unchanged
//! alarm level.

pub mod distance;
pub mod latest;
pub mod vector;

use serde::{Deserialize, Serialize};

use crate::config::{AlarmAlgorithm, TrafficSettings};
use crate::types::{HostState, TargetSlot};

/// Alarm severity. The discriminants match the legacy data-port levels
/// shifted by one (`Close` is not reported externally).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(i8)]
pub enum AlarmLevel {
    #[default]
    None = 0,
    Close = 1,
    Low = 2,
    Important = 3,
    Urgent = 4,
}

impl AlarmLevel {
    /// One step down, saturating at `None`.
    pub fn lower(self) -> AlarmLevel {
        match self {
            AlarmLevel::Urgent => AlarmLevel::Important,
            AlarmLevel::Important => AlarmLevel::Low,
            AlarmLevel::Low => AlarmLevel::Close,
            _ => AlarmLevel::None,
        }
    }

    /// One step up, saturating at `Urgent`.
    pub fn raise(self) -> AlarmLevel {
        match self {
            AlarmLevel::None => AlarmLevel::Close,
            AlarmLevel::Close => AlarmLevel::Low,
            AlarmLevel::Low => AlarmLevel::Important,
            _ => AlarmLevel::Urgent,
        }
    }

    /// Level as reported on the legacy data port (0..3).
    pub fn dataport(self) -> u8 {
        (self as i8 - 1).max(0) as u8
    }
}

// Horizontal alarm zone radii, meters.
pub const ALARM_ZONE_EXTREME: f64 = 250.0;
pub const ALARM_ZONE_URGENT: f64 = 400.0;
pub const ALARM_ZONE_IMPORTANT: f64 = 600.0;
pub const ALARM_ZONE_LOW: f64 = 1000.0;
pub const ALARM_ZONE_CLOSE: f64 = 1500.0;
/// Beyond this nothing is tracked as a threat at all.
pub const ALARM_ZONE_NONE: f64 = 15000.0;

// Time-to-impact thresholds, seconds.
pub const ALARM_TIME_EXTREME: i32 = 5;
pub const ALARM_TIME_URGENT: i32 = 10;
pub const ALARM_TIME_IMPORTANT: i32 = 15;
pub const ALARM_TIME_LOW: i32 = 19;
pub const ALARM_TIME_CLOSE: i32 = 30;

/// No alarms above this much vertical separation, meters.
pub const VERTICAL_SEPARATION: f64 = 300.0;
/// GPS-altitude dead-band, meters.
pub const VERTICAL_SLACK: f64 = 30.0;
/// Weight of residual altitude difference in the adjusted distance.
pub const VERTICAL_SLOPE: f64 = 5.0;

/// Collision-course angular tolerance, degrees.
pub const ALARM_VECTOR_ANGLE: f64 = 10.0;
/// Minimum relative speed for the vector method, m/s.
pub const ALARM_VECTOR_SPEED: f64 = 2.0;

/// Relative altitude adjusted for relative vertical speed.
///
/// Clamps the relative vertical rate to ±2000 fpm, projects it 10 s ahead,
/// and applies the change only when it shrinks the separation (never lets
/// it cross zero), then subtracts the [`VERTICAL_SLACK`] dead-band.
pub fn adjusted_alt_diff(host: &HostState, slot: &TargetSlot) -> f64 {
    let mut alt_diff = slot.alt_diff;
    let vsr = (slot.vs - host.vs).clamp(-2000.0, 2000.0);
    let alt_change = vsr * 0.05; // fpm over 10 s, in meters

    if alt_diff > 0.0 && alt_change < 0.0 {
        alt_diff += alt_change;
        if alt_diff < 0.0 {
            return 0.0;
        }
    } else if alt_diff < 0.0 && alt_change > 0.0 {
        alt_diff += alt_change;
        if alt_diff > 0.0 {
            return 0.0;
        }
    }

    if alt_diff > VERTICAL_SLACK {
        alt_diff - VERTICAL_SLACK
    } else if alt_diff < -VERTICAL_SLACK {
        alt_diff + VERTICAL_SLACK
    } else {
        0.0
    }
}

/// Run the configured algorithm for one target.
///
/// Diagnostic sentences produced along the way (when enabled in `settings`)
/// are appended to `sentences`.
pub fn evaluate(
    host: &HostState,
    slot: &mut TargetSlot,
    settings: &TrafficSettings,
    sentences: &mut Vec<String>,
) -> AlarmLevel {
    match settings.alarm {
        AlarmAlgorithm::None => AlarmLevel::None,
        AlarmAlgorithm::Distance => distance::alarm_distance(slot),
        AlarmAlgorithm::Vector => vector::alarm_vector(host, slot, settings, sentences),
        AlarmAlgorithm::Latest => latest::alarm_latest(host, slot, settings, sentences),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_and_steps() {
        assert!(AlarmLevel::Urgent > AlarmLevel::Important);
        assert!(AlarmLevel::Close > AlarmLevel::None);
        assert_eq!(AlarmLevel::Low.lower(), AlarmLevel::Close);
        assert_eq!(AlarmLevel::None.lower(), AlarmLevel::None);
        assert_eq!(AlarmLevel::Urgent.raise(), AlarmLevel::Urgent);
        assert_eq!(AlarmLevel::Urgent.dataport(), 3);
        assert_eq!(AlarmLevel::None.dataport(), 0);
        assert_eq!(AlarmLevel::Close.dataport(), 0);
    }

    fn host_with_vs(vs: f64) -> HostState {
        HostState {
            vs,
            ..Default::default()
        }
    }

    #[test]
    fn slack_swallows_small_differences() {
        let host = host_with_vs(0.0);
        let slot = TargetSlot {
            alt_diff: 25.0,
            ..Default::default()
        };
        assert_eq!(adjusted_alt_diff(&host, &slot), 0.0);
        let slot = TargetSlot {
            alt_diff: -29.0,
            ..Default::default()
        };
        assert_eq!(adjusted_alt_diff(&host, &slot), 0.0);
    }

    #[test]
    fn converging_vertical_speed_shrinks_separation() {
        // target 150 m above, descending 1000 fpm relative: 50 m closer in 10 s
        let host = host_with_vs(0.0);
        let slot = TargetSlot {
            alt_diff: 150.0,
            vs: -1000.0,
            ..Default::default()
        };
        let adj = adjusted_alt_diff(&host, &slot);
        assert!((adj - 70.0).abs() < 1e-9, "adj {}", adj);
    }

    #[test]
    fn diverging_vertical_speed_is_ignored() {
        // target above and climbing away: no credit toward a higher alarm
        let host = host_with_vs(0.0);
        let slot = TargetSlot {
            alt_diff: 150.0,
            vs: 1500.0,
            ..Default::default()
        };
        assert_eq!(adjusted_alt_diff(&host, &slot), 120.0);
    }

    #[test]
    fn projection_clamped_at_crossing() {
        // 40 m above but descending hard: projected past co-altitude, clamp to 0
        let host = host_with_vs(0.0);
        let slot = TargetSlot {
            alt_diff: 40.0,
            vs: -1800.0,
            ..Default::default()
        };
        assert_eq!(adjusted_alt_diff(&host, &slot), 0.0);
    }

    #[test]
    fn implausible_rates_are_clamped() {
        let host = host_with_vs(0.0);
        let slot = TargetSlot {
            alt_diff: 250.0,
            vs: -9000.0, // clamped to -2000 fpm -> -100 m over 10 s
            ..Default::default()
        };
        assert_eq!(adjusted_alt_diff(&host, &slot), 120.0);
    }
}
