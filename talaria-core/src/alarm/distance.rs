//! Distance-band alarm levels.
//!
//! The simplest strategy, and the one non-directional targets always get:
//! the alarm level is a function of the altitude-adjusted distance alone.

use super::{
    AlarmLevel, ALARM_ZONE_CLOSE, ALARM_ZONE_EXTREME, ALARM_ZONE_IMPORTANT, ALARM_ZONE_LOW,
    ALARM_ZONE_URGENT, VERTICAL_SEPARATION,
};
use crate::types::TargetSlot;

pub(crate) fn alarm_distance(slot: &mut TargetSlot) -> AlarmLevel {
    let distance = slot.distance;
    if distance > ALARM_ZONE_CLOSE || slot.adj_alt_diff.abs() > VERTICAL_SEPARATION {
        return AlarmLevel::None;
    }

    let adj_distance = slot.adj_distance.max(distance);

    if adj_distance < ALARM_ZONE_EXTREME && slot.alert_level > AlarmLevel::None {
        // may sound a new alarm for the same Urgent level
        slot.alert_level = slot.alert_level.lower();
    }

    if adj_distance < ALARM_ZONE_URGENT {
        AlarmLevel::Urgent
    } else if adj_distance < ALARM_ZONE_IMPORTANT {
        AlarmLevel::Important
    } else if adj_distance < ALARM_ZONE_LOW {
        AlarmLevel::Low
    } else if adj_distance < ALARM_ZONE_CLOSE {
        AlarmLevel::Close
    } else {
        AlarmLevel::None
    }
}
