//! Fixed-capacity tracking table.
//!
//! A flat array of [`TargetSlot`]s, one per distinct 24-bit address, with
//! `addr == 0` marking an empty slot. The table itself only knows how to
//! find, prefer, evict and expire; the admission flow that strings those
//! together (and triggers geometry/alarm/relay work) lives in
//! [`crate::engine::TrafficEngine`].

use crate::types::{TargetReport, TargetSlot};

/// Capacity of the tracking table.
pub const MAX_TRACKING_OBJECTS: usize = 50;

/// Seconds without an update before a directional entry is stale.
pub const ENTRY_EXPIRATION_TIME: u64 = 10;

/// Non-directional targets expire earlier.
pub const NONDIR_EXPIRATION: u64 = 5;

/// Expiration window applicable to a slot.
pub fn expiration_secs(slot: &TargetSlot) -> u64 {
    if slot.tx_type.is_nondirectional() {
        NONDIR_EXPIRATION
    } else {
        ENTRY_EXPIRATION_TIME
    }
}

/// Whether a slot has outlived its expiration window at time `now`.
pub fn is_expired(slot: &TargetSlot, now: u64) -> bool {
    now > slot.timestamp + expiration_secs(slot)
}

/// Source preference: should an incoming report be ignored in favor of
/// what the slot already holds?
///
/// Direct reception beats external (ADS-B family) surveillance, a
/// non-relayed external report beats a relayed direct one, and between two
/// external sources direct ADS-B beats TIS-B. Preference only holds while
/// the existing entry is still current.
pub fn keep_existing(slot: &TargetSlot, report: &TargetReport, now: u64) -> bool {
    let current = now <= slot.timestamp + ENTRY_EXPIRATION_TIME;
    if !current {
        return false;
    }
    let report_adsb = report.protocol.is_adsb_feed();
    let slot_adsb = slot.protocol.is_adsb_feed();

    if report_adsb && !slot_adsb {
        // external data about an aircraft we hear directly, unless the
        // "direct" entry itself arrived via relay
        !slot.relayed
    } else if slot_adsb && !report_adsb {
        // a relayed "direct" packet may have originated as ADS-B
        report.relayed
    } else if slot_adsb && report_adsb {
        report.tx_type == crate::types::TxKind::TisB
            && slot.tx_type > crate::types::TxKind::TisB
    } else {
        false
    }
}

/// Aggregate table state for displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficSummary {
    pub count: usize,
    /// Targets from external ADS-B sources (non-negative RSSI scale).
    pub adsb_count: usize,
    /// Strongest direct-link RSSI seen, 0 if none.
    pub max_rssi: i16,
}

#[derive(Debug)]
pub struct TrafficTable {
    slots: Vec<TargetSlot>,
}

impl Default for TrafficTable {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficTable {
    pub fn new() -> Self {
        TrafficTable {
            slots: vec![TargetSlot::default(); MAX_TRACKING_OBJECTS],
        }
    }

    pub fn slots(&self) -> &[TargetSlot] {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut [TargetSlot] {
        &mut self.slots
    }

    pub fn get_mut(&mut self, index: usize) -> &mut TargetSlot {
        &mut self.slots[index]
    }

    /// Index of the slot tracking `addr`, if any.
    pub fn find(&self, addr: u32) -> Option<usize> {
        self.slots.iter().position(|s| s.addr == addr)
    }

    pub fn find_empty(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_empty())
    }

    /// First slot past the directional expiration window.
    pub fn find_expired(&self, now: u64) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| !s.is_empty() && now > s.timestamp + ENTRY_EXPIRATION_TIME)
    }

    /// The farthest currently-tracked target that may be evicted: alarm
    /// level None, not the followed address, not a relayed entry. Lowest
    /// index wins ties. Returns the index and its effective distance.
    pub fn farthest_evictable(&self, follow_id: u32) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.is_empty() {
                continue;
            }
            if slot.alarm_level != crate::alarm::AlarmLevel::None {
                continue;
            }
            if slot.addr == follow_id || slot.relayed {
                continue;
            }
            let d = slot.adj_distance.max(slot.distance);
            if best.map_or(true, |(_, bd)| d > bd) {
                best = Some((i, d));
            }
        }
        best
    }

    /// Live-entry statistics for displays and the data port.
    pub fn summary(&self) -> TrafficSummary {
        let mut summary = TrafficSummary::default();
        let mut rssi_max = i16::MIN;
        for slot in &self.slots {
            if slot.is_empty() {
                continue;
            }
            summary.count += 1;
            if slot.rssi < 0 {
                rssi_max = rssi_max.max(slot.rssi);
            } else {
                summary.adsb_count += 1;
            }
        }
        if rssi_max > i16::MIN {
            summary.max_rssi = rssi_max;
        }
        summary
    }

    /// Indices of live slots ordered nearest first, for the traffic page.
    /// Plain distance, unadjusted for altitude.
    pub fn sorted_by_distance(&self) -> Vec<usize> {
        let mut order: Vec<usize> = self
            .slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.is_empty())
            .map(|(i, _)| i)
            .collect();
        order.sort_by(|&a, &b| {
            self.slots[a]
                .distance
                .partial_cmp(&self.slots[b].distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::AlarmLevel;
    use crate::types::{Protocol, TxKind};

    fn slot(addr: u32, distance: f64) -> TargetSlot {
        TargetSlot {
            addr,
            tx_type: TxKind::Flarm,
            protocol: Protocol::Latest,
            distance,
            adj_distance: distance,
            timestamp: 100,
            ..Default::default()
        }
    }

    #[test]
    fn find_and_empty() {
        let mut table = TrafficTable::new();
        assert_eq!(table.find_empty(), Some(0));
        *table.get_mut(0) = slot(0x111111, 500.0);
        assert_eq!(table.find(0x111111), Some(0));
        assert_eq!(table.find(0x222222), None);
        assert_eq!(table.find_empty(), Some(1));
    }

    #[test]
    fn expiration_windows() {
        let directional = slot(1, 100.0);
        assert!(!is_expired(&directional, 110));
        assert!(is_expired(&directional, 111));

        let mut nondir = slot(2, 100.0);
        nondir.tx_type = TxKind::ModeS;
        assert!(!is_expired(&nondir, 105));
        assert!(is_expired(&nondir, 106));
    }

    #[test]
    fn direct_beats_external() {
        let now = 105;
        let direct = slot(1, 500.0);
        let adsb_report = TargetReport {
            addr: 1,
            protocol: Protocol::Adsb1090,
            tx_type: TxKind::Adsb,
            ..Default::default()
        };
        assert!(keep_existing(&direct, &adsb_report, now));

        // once the direct entry expires the external source takes over
        assert!(!keep_existing(&direct, &adsb_report, 200));

        // a relayed "direct" entry yields to external data
        let mut relayed = slot(1, 500.0);
        relayed.relayed = true;
        assert!(!keep_existing(&relayed, &adsb_report, now));
    }

    #[test]
    fn relayed_direct_does_not_displace_external() {
        let now = 105;
        let mut adsb_slot = slot(1, 500.0);
        adsb_slot.protocol = Protocol::Adsb1090;
        adsb_slot.tx_type = TxKind::Adsb;

        let mut flarm_report = TargetReport {
            addr: 1,
            protocol: Protocol::Latest,
            tx_type: TxKind::Flarm,
            relayed: true,
            ..Default::default()
        };
        assert!(keep_existing(&adsb_slot, &flarm_report, now));

        flarm_report.relayed = false;
        assert!(!keep_existing(&adsb_slot, &flarm_report, now));
    }

    #[test]
    fn direct_adsb_beats_tisb() {
        let now = 105;
        let mut adsb_slot = slot(1, 500.0);
        adsb_slot.protocol = Protocol::Adsb1090;
        adsb_slot.tx_type = TxKind::Adsb;

        let tisb_report = TargetReport {
            addr: 1,
            protocol: Protocol::Adsb1090,
            tx_type: TxKind::TisB,
            ..Default::default()
        };
        assert!(keep_existing(&adsb_slot, &tisb_report, now));

        // but TIS-B updates a TIS-B entry
        adsb_slot.tx_type = TxKind::TisB;
        assert!(!keep_existing(&adsb_slot, &tisb_report, now));
    }

    #[test]
    fn farthest_evictable_skips_protected() {
        let mut table = TrafficTable::new();
        *table.get_mut(0) = slot(0xA, 800.0);
        *table.get_mut(1) = slot(0xB, 9000.0);
        *table.get_mut(2) = slot(0xC, 3000.0);

        // farthest wins
        assert_eq!(table.farthest_evictable(0), Some((1, 9000.0)));

        // unless followed
        assert_eq!(table.farthest_evictable(0xB), Some((2, 3000.0)));

        // alarmed entries are immune
        table.get_mut(2).alarm_level = AlarmLevel::Low;
        assert_eq!(table.farthest_evictable(0xB), Some((0, 800.0)));

        // relayed entries are immune
        table.get_mut(0).relayed = true;
        assert_eq!(table.farthest_evictable(0xB), None);
    }

    #[test]
    fn summary_counts_sources() {
        let mut table = TrafficTable::new();
        let mut a = slot(0xA, 800.0);
        a.rssi = -70;
        let mut b = slot(0xB, 900.0);
        b.rssi = -85;
        let mut c = slot(0xC, 1000.0);
        c.protocol = Protocol::Adsb1090;
        c.rssi = 40;
        *table.get_mut(0) = a;
        *table.get_mut(1) = b;
        *table.get_mut(2) = c;

        let s = table.summary();
        assert_eq!(s.count, 3);
        assert_eq!(s.adsb_count, 1);
        assert_eq!(s.max_rssi, -70);
    }

    #[test]
    fn sorted_by_distance_is_ascending() {
        let mut table = TrafficTable::new();
        *table.get_mut(0) = slot(0xA, 3000.0);
        *table.get_mut(3) = slot(0xB, 500.0);
        *table.get_mut(7) = slot(0xC, 1500.0);
        assert_eq!(table.sorted_by_distance(), vec![3, 7, 0]);
    }
}
