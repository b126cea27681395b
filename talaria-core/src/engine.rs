//! The traffic engine: one single-threaded owner of all tracking state.
//!
//! The dispatcher feeds it decoded reports ([`TrafficEngine::add_traffic`],
//! which runs admit → geometry → alarm → relay → range-sample in one call,
//! because relay timing is tied to the radio slot of the packet that just
//! arrived) and calls [`TrafficEngine::tick`] periodically to expire stale
//! entries and drive notifications. Everything the outside world needs to
//! act on comes back as [`TrafficEvent`]s.

use serde::Serialize;

use crate::alarm::{self, AlarmLevel, VERTICAL_SLOPE};
use crate::config::{DebugFlags, FlightLogMode, TrafficSettings};
use crate::geo::{self, CosLatCache};
use crate::identity;
use crate::io::{Notifier, RadioPort};
use crate::range_stats::RangeStats;
use crate::records::{self, AlarmRecord};
use crate::relay::{self, RelayState};
use crate::sentences;
use crate::table::{self, TrafficTable, TrafficSummary};
use crate::types::{AircraftType, HostState, Protocol, TargetReport};

/// Minimum ms between traffic loop passes.
pub const TRAFFIC_UPDATE_INTERVAL_MS: u64 = 1000;

/// Slots not updated within this many seconds are skipped by the loop.
pub const TRAFFIC_VECTOR_UPDATE_INTERVAL: u64 = 2;

/// A sounded notification holds further same-target alerts this long.
pub const ALARM_REARM_MS: u64 = 9000;

/// Things that happened inside the engine that the host side must surface:
/// sounds already went out through the [`Notifier`], these cover logs,
/// telemetry and state the radio bridge consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrafficEvent {
    /// A notification was issued for the worst current threat.
    Notification {
        addr: u32,
        level: AlarmLevel,
        multiple: bool,
    },
    /// Row for the alarm log.
    AlarmLogged(AlarmRecord),
    /// Line for the flight log (close traffic / alarm transitions).
    FlightLog(String),
    /// A tracked aircraft transitioned to landed-out.
    LandedOut {
        addr: u32,
        latitude: f64,
        longitude: f64,
    },
    /// First relay of a target since it entered the table.
    RelayedFirst { addr: u32, callsign: String },
    /// Diagnostic `$PS*` sentence.
    Sentence(String),
    /// A slot expired and was cleared.
    Expired { addr: u32 },
    /// Host transitioned to airborne.
    Takeoff,
    /// Host transitioned to on-ground; a good moment to persist statistics.
    Landing,
}

#[derive(Debug)]
pub struct TrafficEngine {
    settings: TrafficSettings,
    host: HostState,
    table: TrafficTable,
    cos_lat: CosLatCache,
    range_stats: RangeStats,
    relay_state: RelayState,
    /// Wall-clock ms when the notification re-arm window closes; 0 = idle.
    alarm_timer_ms: u64,
    last_tick_ms: u64,
    max_alarm_level: AlarmLevel,
    alarm_ahead: bool,
    events: Vec<TrafficEvent>,
}

impl TrafficEngine {
    pub fn new(settings: TrafficSettings) -> Self {
        TrafficEngine {
            settings,
            host: HostState::default(),
            table: TrafficTable::new(),
            cos_lat: CosLatCache::default(),
            range_stats: RangeStats::default(),
            relay_state: RelayState::default(),
            alarm_timer_ms: 0,
            last_tick_ms: 0,
            max_alarm_level: AlarmLevel::None,
            alarm_ahead: false,
            events: Vec::new(),
        }
    }

    pub fn settings(&self) -> &TrafficSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: TrafficSettings) {
        self.settings = settings;
    }

    pub fn host(&self) -> &HostState {
        &self.host
    }

    /// Refresh the own-aircraft snapshot. Airborne transitions are
    /// surfaced as [`TrafficEvent::Takeoff`] / [`TrafficEvent::Landing`].
    pub fn update_host(&mut self, host: HostState) {
        let was_airborne = self.host.airborne;
        self.host = host;
        if !was_airborne && self.host.airborne {
            self.events.push(TrafficEvent::Takeoff);
        } else if was_airborne && !self.host.airborne {
            self.events.push(TrafficEvent::Landing);
        }
    }

    pub fn table(&self) -> &TrafficTable {
        &self.table
    }

    /// Worst alarm level seen on the last loop pass.
    pub fn max_alarm_level(&self) -> AlarmLevel {
        self.max_alarm_level
    }

    /// Whether alarmed traffic is within 45 degrees of the nose.
    pub fn alarm_ahead(&self) -> bool {
        self.alarm_ahead
    }

    /// Consume the relay-waiting flag; the radio bridge checks this before
    /// our own slot-0 broadcast.
    pub fn take_relay_waiting(&mut self) -> bool {
        std::mem::take(&mut self.relay_state.relay_waiting)
    }

    pub fn drain_events(&mut self) -> Vec<TrafficEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn summary(&self) -> TrafficSummary {
        self.table.summary()
    }

    /// Install statistics loaded from `range.txt`.
    pub fn install_range_stats(&mut self, stats: RangeStats) {
        self.range_stats = stats;
    }

    pub fn range_stats(&self) -> &RangeStats {
        &self.range_stats
    }

    /// Merge this flight's samples with the prior and hand back the new
    /// file content, or `None` when nothing new was sampled (saving again
    /// would be a no-op). The merged state becomes the prior for a
    /// possible next flight.
    pub fn save_range_stats(&mut self) -> Option<String> {
        if !self.range_stats.has_new_samples() {
            return None;
        }
        let text = self.range_stats.merged_file();
        match RangeStats::decode(&text) {
            Ok(stats) => self.range_stats = stats,
            Err(err) => {
                log::warn!("re-reading merged range stats failed: {}", err);
                self.range_stats = RangeStats::default();
            }
        }
        Some(text)
    }

    fn report_landed_out(&mut self, addr: u32, latitude: f64, longitude: f64, now: u64) {
        self.events.push(TrafficEvent::LandedOut {
            addr,
            latitude,
            longitude,
        });
        if self.settings.nmea_debug {
            let hour = ((now / 3600) % 24) as u32;
            let minute = ((now / 60) % 60) as u32;
            self.events.push(TrafficEvent::Sentence(sentences::psrlo(
                hour, minute, addr, latitude, longitude,
            )));
        }
    }

    /// Admit one decoded report: find or allocate a slot, refresh derived
    /// geometry, recompute the alarm level and consider relaying, all
    /// within the radio slot of the packet that carried it.
    pub fn add_traffic(
        &mut self,
        report: &TargetReport,
        now: u64,
        now_ms: u64,
        radio: &mut dyn RadioPort,
    ) {
        if report.addr == 0 {
            return;
        }

        // bearing-less targets far outside every alarm zone carry nothing
        // worth a table slot
        if report.tx_type.is_nondirectional() {
            let d = geo::distances(
                &self.host,
                &mut self.cos_lat,
                report.latitude,
                report.longitude,
                report.altitude,
            );
            if d.distance > alarm::ALARM_ZONE_NONE {
                return;
            }
        }

        let do_relay = relay::relay_candidate(report, &self.host, &self.settings);

        // already tracking this address?
        if let Some(index) = self.table.find(report.addr) {
            if table::keep_existing(&self.table.slots()[index], report, now) {
                return;
            }

            let Self {
                ref host,
                ref settings,
                ref mut table,
                ref mut cos_lat,
                ref mut alarm_timer_ms,
                ref mut relay_state,
                ref mut events,
                ..
            } = *self;
            let slot = table.get_mut(index);

            // a byte-identical position only refreshes liveness, so the
            // second-time-slot copy of the same fix is ignored
            if report.latitude == slot.latitude
                && report.longitude == slot.longitude
                && report.altitude == slot.altitude
            {
                slot.last_crc = report.last_crc;
                slot.timestamp = report.timestamp;
                if do_relay {
                    relay::air_relay(slot, host, settings, now_ms, relay_state, radio, events);
                }
                return;
            }

            // keep history suitable for turn-rate estimation: rotate when
            // packets are spaced out, or when what we kept got too old
            if report.gnsstime_ms.saturating_sub(slot.gnsstime_ms) > 1200
                || report.gnsstime_ms.saturating_sub(slot.prevtime_ms) > 2600
            {
                slot.rotate_history();
            }

            let was_landed_out = slot.aircraft_type == AircraftType::Unknown;
            slot.absorb(report);
            identity::assign_callsign(slot, settings);
            geo::update_slot(slot, host, cos_lat);
            update_alarm(host, slot, settings, alarm_timer_ms, now, now_ms, events);
            if do_relay {
                relay::air_relay(slot, host, settings, now_ms, relay_state, radio, events);
            }
            if !was_landed_out
                && report.aircraft_type == AircraftType::Unknown
                && !report.airborne
            {
                self.report_landed_out(report.addr, report.latitude, report.longitude, now);
            }
            return;
        }

        // a new target that is already landed-out is reported right away
        if report.aircraft_type == AircraftType::Unknown && !report.airborne {
            self.report_landed_out(report.addr, report.latitude, report.longitude, now);
        }

        // an empty slot, or one whose occupant expired
        let index = self
            .table
            .find_empty()
            .or_else(|| self.table.find_expired(now));
        if let Some(index) = index {
            let Self {
                ref host,
                ref settings,
                ref mut table,
                ref mut cos_lat,
                ref mut alarm_timer_ms,
                ref mut relay_state,
                ref mut range_stats,
                ref mut events,
                ..
            } = *self;
            let slot = table.get_mut(index);
            slot.clear();
            slot.absorb(report);
            identity::assign_callsign(slot, settings);
            geo::update_slot(slot, host, cos_lat);
            update_alarm(host, slot, settings, alarm_timer_ms, now, now_ms, events);
            range_stats.sample(host, slot);
            if do_relay {
                relay::air_relay(slot, host, settings, now_ms, relay_state, radio, events);
            }
            return;
        }

        // table is full: bump the farthest uninteresting slot, but only if
        // the newcomer is closer (or followed, or relayed to us)
        let d = geo::distances(
            &self.host,
            &mut self.cos_lat,
            report.latitude,
            report.longitude,
            report.altitude,
        );
        let adj_distance = d.distance + VERTICAL_SLOPE * d.alt_diff.abs();
        if let Some((index, max_dist)) = self.table.farthest_evictable(self.settings.follow_id) {
            if adj_distance < max_dist
                || report.addr == self.settings.follow_id
                || report.relayed
            {
                let Self {
                    ref host,
                    ref settings,
                    ref mut table,
                    ref mut alarm_timer_ms,
                    ref mut relay_state,
                    ref mut events,
                    ..
                } = *self;
                let slot = table.get_mut(index);
                slot.clear();
                slot.absorb(report);
                identity::assign_callsign(slot, settings);
                geo::apply_to_slot(slot, &d);
                update_alarm(host, slot, settings, alarm_timer_ms, now, now_ms, events);
                // no range sample: the newcomer may be closer than max range
                if do_relay {
                    relay::air_relay(slot, host, settings, now_ms, relay_state, radio, events);
                }
            }
        }
        // otherwise the report is dropped
    }

    /// Whether enough time has passed for another loop pass.
    pub fn is_time_to_update(&self, now_ms: u64) -> bool {
        now_ms >= self.last_tick_ms + TRAFFIC_UPDATE_INTERVAL_MS
    }

    /// Periodic traffic loop: expire stale slots, pick the worst threat
    /// and notify with hysteresis.
    pub fn tick(&mut self, now: u64, now_ms: u64, notifier: &mut dyn Notifier) {
        if !self.is_time_to_update(now_ms) {
            return;
        }

        self.max_alarm_level = AlarmLevel::None;
        self.alarm_ahead = false;
        let mut sound_level = AlarmLevel::None;
        let mut sound_index: Option<usize> = None;
        let mut alarmcount: u32 = 0;

        for index in 0..self.table.slots().len() {
            let slot = &self.table.slots()[index];
            if slot.is_empty() {
                continue;
            }

            if now <= slot.timestamp + table::expiration_secs(slot) {
                if now.saturating_sub(slot.timestamp) >= TRAFFIC_VECTOR_UPDATE_INTERVAL {
                    continue;
                }

                if slot.alarm_level > self.max_alarm_level {
                    self.max_alarm_level = slot.alarm_level;
                }
                if slot.alarm_level >= AlarmLevel::Low && slot.rel_heading.abs() < 45.0 {
                    self.alarm_ahead = true;
                }
                if slot.alarm_level > slot.alert_level && slot.alarm_level > AlarmLevel::Close {
                    alarmcount += 1;
                    if slot.alarm_level > sound_level {
                        sound_level = slot.alarm_level;
                        sound_index = Some(index);
                    }
                }
            } else {
                // expired: a last range-stats contribution, then clear
                if slot.protocol == Protocol::Adsb1090
                    && self.settings.nmea_debug
                    && self.settings.debug_flags.contains(DebugFlags::DEEPER)
                {
                    self.events
                        .push(TrafficEvent::Sentence(sentences::psadx(slot)));
                }
                self.range_stats.sample(&self.host, slot);
                let addr = slot.addr;
                self.table.get_mut(index).clear();
                self.events.push(TrafficEvent::Expired { addr });
            }
        }

        if let (true, Some(index)) = (sound_level > AlarmLevel::Close, sound_index) {
            let multiple = alarmcount > 1;
            {
                let slot = &self.table.slots()[index];
                let _ = notifier.buzzer(sound_level, multiple);
                let _ = notifier.voice(slot, multiple);
                self.events.push(TrafficEvent::Sentence(sentences::psraa(
                    sound_level,
                    multiple,
                    slot.addr,
                )));
                self.events.push(TrafficEvent::Notification {
                    addr: slot.addr,
                    level: sound_level,
                    multiple,
                });
                if self.settings.log_alarms {
                    self.events.push(TrafficEvent::AlarmLogged(AlarmRecord {
                        addr: slot.addr,
                        level: slot.alarm_level,
                        count: alarmcount,
                        rel_heading: slot.rel_heading as i32,
                        distance: slot.distance as i32,
                        alt_diff: slot.alt_diff as i32,
                    }));
                }
            }
            let slot = self.table.get_mut(index);
            slot.alert_level = slot.alarm_level;
            // warn again about this aircraft after the re-arm window, or
            // earlier if it gets closer still
            if self.alarm_timer_ms == 0 {
                self.alarm_timer_ms = now_ms + ALARM_REARM_MS;
            }
        }

        self.last_tick_ms = now_ms;
    }
}

/// Recompute a slot's derived fields and alarm level against the current
/// host snapshot (the original `Traffic_Update`).
fn update_alarm(
    host: &HostState,
    slot: &mut crate::types::TargetSlot,
    settings: &TrafficSettings,
    alarm_timer_ms: &mut u64,
    now: u64,
    now_ms: u64,
    events: &mut Vec<TrafficEvent>,
) {
    if slot.tx_type.is_nondirectional() {
        slot.adj_alt_diff = slot.alt_diff;
        slot.adj_distance = slot.distance + VERTICAL_SLOPE * slot.alt_diff.abs();
        slot.rel_heading = 0.0;
        if slot.protocol == Protocol::Adsb1090 {
            if slot.maxrssi == 0 || slot.rssi > slot.maxrssi {
                slot.maxrssi = slot.rssi;
                slot.maxrssirelalt = slot.alt_diff;
            }
        }
        if !host.airborne {
            slot.alarm_level = AlarmLevel::None;
            return;
        }
        // fall through to the alarm computation
    } else {
        let mut rel_heading = slot.bearing - host.heading;
        if rel_heading < -180.0 {
            rel_heading += 360.0;
        } else if rel_heading > 180.0 {
            rel_heading -= 360.0;
        }
        slot.rel_heading = rel_heading;

        if slot.protocol == Protocol::Adsb1090 {
            if slot.mindist == 0.0 || slot.distance < slot.mindist {
                slot.mindist = slot.distance;
                slot.mindistrssi = slot.rssi;
            }
            if slot.maxrssi == 0 || slot.rssi > slot.maxrssi {
                slot.maxrssi = slot.rssi;
                slot.maxrssirelalt = slot.alt_diff;
            }
        }

        slot.adj_alt_diff = alarm::adjusted_alt_diff(host, slot);
        slot.adj_distance = slot.distance + VERTICAL_SLOPE * slot.adj_alt_diff.abs();

        // no alarms about (or while) non-airborne traffic
        if !slot.airborne || !host.airborne {
            slot.alarm_level = AlarmLevel::None;
            return;
        }

        // only compute alarms from current data
        if now > host.timestamp + 2 || now > slot.timestamp + 2 {
            return;
        }
    }

    let old_alarm_level = slot.alarm_level;
    let mut debug_sentences = Vec::new();
    slot.alarm_level = alarm::evaluate(host, slot, settings, &mut debug_sentences);
    events.extend(debug_sentences.into_iter().map(TrafficEvent::Sentence));

    // a drop of more than one level trails the alarm down one step at a
    // time, so a later return upward re-arms exactly one level higher
    if slot.alarm_level < slot.alert_level {
        slot.alert_level = slot.alarm_level.raise();
    }

    if *alarm_timer_ms != 0 && now_ms > *alarm_timer_ms {
        if slot.alert_level > AlarmLevel::None {
            slot.alert_level = slot.alert_level.lower();
        }
        *alarm_timer_ms = 0;
    }

    if slot.alarm_level > old_alarm_level
        && (settings.log_alarms || settings.log_flight == FlightLogMode::Traffic)
    {
        events.push(TrafficEvent::FlightLog(records::traffic_row(
            "LPLTA", slot, host,
        )));
    }
}

/// Close-traffic snapshot records for the flight log, one per live slot
/// within 1 km adjusted distance or with an active alarm.
pub fn close_traffic_records(engine: &TrafficEngine, now: u64) -> Vec<String> {
    let mut rows = Vec::new();
    for slot in engine.table().slots() {
        if slot.is_empty() || !slot.airborne {
            continue;
        }
        if slot.adj_distance > 1000.0 && slot.alarm_level == AlarmLevel::None {
            continue;
        }
        if now > slot.timestamp + 3 {
            continue;
        }
        rows.push(records::traffic_row("LPLTT", slot, engine.host()));
    }
    rows
}
