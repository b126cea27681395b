//! Opportunistic packet relay.
//!
//! While airborne we re-transmit selected traffic once to extend the
//! network's reach: landed-out aircraft (so retrieve crews hear about them)
//! and ADS-B targets that FLARM-only receivers would never see. Relays are
//! rate-limited, restricted to slot 0 of the radio schedule (ground
//! stations listen there), and never relay a relay.

use crate::config::{DebugFlags, RelayMode, TrafficSettings};
use crate::engine::TrafficEvent;
use crate::io::RadioPort;
use crate::sentences;
use crate::types::{AircraftType, HostState, TargetReport, TargetSlot, TxKind};

/// Minimum seconds between any two relays.
pub const ANY_RELAY_TIME: u64 = 5;
/// Seconds before the same target is relayed again (normal cadence).
pub const ENTRY_RELAY_TIME: u64 = 15;

/// Cross-target relay bookkeeping, owned by the engine.
#[derive(Debug, Default)]
pub struct RelayState {
    /// Wall-clock ms of the last successful relay.
    pub lastrelay_ms: u64,
    /// Set when a landed-out relay found the slot occupied; the radio
    /// bridge skips our own next slot-0 broadcast to make room.
    pub relay_waiting: bool,
}

/// Admission-time gate: is this report even a relay candidate?
pub fn relay_candidate(report: &TargetReport, host: &HostState, settings: &TrafficSettings) -> bool {
    settings.rf_protocol.is_direct_link()
        && settings.relay != RelayMode::Off
        && (host.airborne || settings.relay == RelayMode::Only)
        && !report.relayed
        && !report.tx_type.is_nondirectional()
        && !settings.debug_flags.contains(DebugFlags::SIMULATE)
}

/// Try to relay one tracked target within the current radio slot.
pub fn air_relay(
    slot: &mut TargetSlot,
    host: &HostState,
    settings: &TrafficSettings,
    now_ms: u64,
    state: &mut RelayState,
    radio: &mut dyn RadioPort,
    events: &mut Vec<TrafficEvent>,
) {
    let landed_out =
        slot.protocol.is_direct_link() && slot.aircraft_type == AircraftType::Unknown;

    let often;
    if landed_out {
        often = true;
    } else {
        // ADS-B, or FLARM traffic in relay-only ground-station mode
        if settings.relay < RelayMode::All {
            return;
        }
        if settings.relay == RelayMode::Only && slot.tx_type.is_external() {
            return;
        }
        if slot.aircraft_type != AircraftType::Jet
            && slot.aircraft_type != AircraftType::Helicopter
        {
            // gliders and light planes only when close; if they also carry
            // FLARM the direct signal wins nearby and the relay is safe
            if slot.distance > 10_000.0 {
                return;
            }
        }
        often = true;
    }

    // only relay once in a while
    if now_ms < state.lastrelay_ms + 1000 * ANY_RELAY_TIME {
        return;
    }
    let per_target = if often {
        ANY_RELAY_TIME + 2
    } else {
        ENTRY_RELAY_TIME
    };
    if slot.timerelayed + per_target > slot.timestamp {
        return;
    }

    // slot 0 only, to maximize the chance ground stations receive it
    let tryrelay = radio.current_slot() == 0;

    let mut relayed = false;
    if tryrelay && !radio.transmit_happened() && radio.slot_time_left_ms() > 15 {
        let size = radio.encode_relay(slot);
        if size != 0 {
            relayed = radio.transmit(size);
        }
    }

    if slot.timerelayed == 0 {
        // first relay since the slot was (re)populated
        slot.timerelayed = 1;
        if relayed && !landed_out && settings.log_flight == crate::config::FlightLogMode::Traffic {
            events.push(TrafficEvent::RelayedFirst {
                addr: slot.addr,
                callsign: slot.callsign.clone(),
            });
        }
    }

    if relayed {
        slot.timerelayed = host.timestamp;
        state.lastrelay_ms = now_ms;
        if landed_out {
            log::info!("relayed packet from landed-out aircraft {:06X}", slot.addr);
        } else if slot.tx_type.is_external() {
            log::info!("relayed ADS-B packet from {}", slot.callsign);
        } else {
            log::info!("relayed packet from {:06X}", slot.addr);
        }
        if settings.nmea_debug && !settings.debug_flags.is_empty() {
            events.push(TrafficEvent::Sentence(sentences::psarl(
                slot.addr,
                slot.timerelayed,
            )));
        }
    } else if landed_out {
        // reserve a future slot: suppress our own next slot-0 broadcast in
        // the hope another packet arrives from the landed-out aircraft
        state.relay_waiting = true;
        log::debug!("try relay of landed-out {:06X} next slot 0", slot.addr);
    }
    // ADS-B packets arrive at random times, no point reserving a slot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrafficSettings;
    use crate::types::Protocol;

    /// Scripted radio: answers as configured and records transmissions.
    #[derive(Debug)]
    struct ScriptedRadio {
        slot: u8,
        busy: bool,
        time_left_ms: u32,
        transmits: Vec<u32>,
        current_addr: u32,
    }

    impl ScriptedRadio {
        fn idle() -> Self {
            ScriptedRadio {
                slot: 0,
                busy: false,
                time_left_ms: 200,
                transmits: Vec::new(),
                current_addr: 0,
            }
        }
    }

    impl RadioPort for ScriptedRadio {
        fn encode_relay(&mut self, slot: &TargetSlot) -> usize {
            self.current_addr = slot.addr;
            26
        }
        fn transmit(&mut self, _size: usize) -> bool {
            self.transmits.push(self.current_addr);
            true
        }
        fn transmit_happened(&self) -> bool {
            self.busy
        }
        fn current_slot(&self) -> u8 {
            self.slot
        }
        fn slot_time_left_ms(&self) -> u32 {
            self.time_left_ms
        }
    }

    fn airborne_host(timestamp: u64) -> HostState {
        HostState {
            airborne: true,
            timestamp,
            ..Default::default()
        }
    }

    fn landed_out_slot() -> TargetSlot {
        TargetSlot {
            addr: 0x111111,
            protocol: Protocol::Latest,
            tx_type: TxKind::Flarm,
            aircraft_type: AircraftType::Unknown,
            airborne: false,
            timestamp: 100,
            distance: 2_000.0,
            ..Default::default()
        }
    }

    fn adsb_slot() -> TargetSlot {
        TargetSlot {
            addr: 0x222222,
            protocol: Protocol::Adsb1090,
            tx_type: TxKind::Adsb,
            aircraft_type: AircraftType::Powered,
            airborne: true,
            timestamp: 100,
            distance: 5_000.0,
            ..Default::default()
        }
    }

    fn settings(relay: RelayMode) -> TrafficSettings {
        TrafficSettings {
            relay,
            ..Default::default()
        }
    }

    #[test]
    fn candidate_gating() {
        let host = airborne_host(100);
        let mut report = TargetReport {
            tx_type: TxKind::Flarm,
            ..Default::default()
        };
        let s = settings(RelayMode::Landed);
        assert!(relay_candidate(&report, &host, &s));

        report.relayed = true;
        assert!(!relay_candidate(&report, &host, &s));
        report.relayed = false;

        report.tx_type = TxKind::ModeS;
        assert!(!relay_candidate(&report, &host, &s));
        report.tx_type = TxKind::Flarm;

        let grounded = HostState::default();
        assert!(!relay_candidate(&report, &grounded, &s));
        // relay-only mode works on the ground
        assert!(relay_candidate(&report, &grounded, &settings(RelayMode::Only)));

        assert!(!relay_candidate(&report, &host, &settings(RelayMode::Off)));
    }

    #[test]
    fn landed_out_is_relayed_in_slot_0() {
        let host = airborne_host(100);
        let mut slot = landed_out_slot();
        let mut state = RelayState::default();
        let mut radio = ScriptedRadio::idle();
        let mut events = Vec::new();
        air_relay(
            &mut slot,
            &host,
            &settings(RelayMode::Landed),
            60_000,
            &mut state,
            &mut radio,
            &mut events,
        );
        assert_eq!(radio.transmits, vec![0x111111]);
        assert_eq!(slot.timerelayed, 100);
        assert_eq!(state.lastrelay_ms, 60_000);
        assert!(!state.relay_waiting);
    }

    #[test]
    fn busy_slot_sets_relay_waiting_for_landed_out() {
        let host = airborne_host(100);
        let mut slot = landed_out_slot();
        let mut state = RelayState::default();
        let mut radio = ScriptedRadio::idle();
        radio.busy = true;
        let mut events = Vec::new();
        air_relay(
            &mut slot,
            &host,
            &settings(RelayMode::Landed),
            60_000,
            &mut state,
            &mut radio,
            &mut events,
        );
        assert!(radio.transmits.is_empty());
        assert!(state.relay_waiting);
        assert_eq!(slot.timerelayed, 1);
    }

    #[test]
    fn adsb_needs_relay_all() {
        let host = airborne_host(100);
        let mut state = RelayState::default();
        let mut radio = ScriptedRadio::idle();
        let mut events = Vec::new();

        let mut slot = adsb_slot();
        air_relay(
            &mut slot,
            &host,
            &settings(RelayMode::Landed),
            60_000,
            &mut state,
            &mut radio,
            &mut events,
        );
        assert!(radio.transmits.is_empty());

        air_relay(
            &mut slot,
            &host,
            &settings(RelayMode::All),
            60_000,
            &mut state,
            &mut radio,
            &mut events,
        );
        assert_eq!(radio.transmits, vec![0x222222]);
    }

    #[test]
    fn distant_light_traffic_not_relayed() {
        let host = airborne_host(100);
        let mut slot = adsb_slot();
        slot.distance = 12_000.0;
        let mut state = RelayState::default();
        let mut radio = ScriptedRadio::idle();
        let mut events = Vec::new();
        air_relay(
            &mut slot,
            &host,
            &settings(RelayMode::All),
            60_000,
            &mut state,
            &mut radio,
            &mut events,
        );
        assert!(radio.transmits.is_empty());

        // a jet at the same distance is relayed
        slot.aircraft_type = AircraftType::Jet;
        air_relay(
            &mut slot,
            &host,
            &settings(RelayMode::All),
            60_000,
            &mut state,
            &mut radio,
            &mut events,
        );
        assert_eq!(radio.transmits, vec![0x222222]);
    }

    #[test]
    fn global_rate_limit_holds() {
        let host = airborne_host(100);
        let mut slot = landed_out_slot();
        let mut state = RelayState {
            lastrelay_ms: 58_000,
            relay_waiting: false,
        };
        let mut radio = ScriptedRadio::idle();
        let mut events = Vec::new();
        // 60s is within 5s of the last relay
        air_relay(
            &mut slot,
            &host,
            &settings(RelayMode::Landed),
            60_000,
            &mut state,
            &mut radio,
            &mut events,
        );
        assert!(radio.transmits.is_empty());
    }

    #[test]
    fn per_target_interval_holds() {
        let host = airborne_host(100);
        let mut slot = landed_out_slot();
        slot.timerelayed = 95; // relayed 5 s before this packet
        let mut state = RelayState::default();
        let mut radio = ScriptedRadio::idle();
        let mut events = Vec::new();
        air_relay(
            &mut slot,
            &host,
            &settings(RelayMode::Landed),
            60_000,
            &mut state,
            &mut radio,
            &mut events,
        );
        // 95 + 7 > 100: still inside the per-target window
        assert!(radio.transmits.is_empty());

        slot.timerelayed = 90;
        air_relay(
            &mut slot,
            &host,
            &settings(RelayMode::Landed),
            60_000,
            &mut state,
            &mut radio,
            &mut events,
        );
        assert_eq!(radio.transmits, vec![0x111111]);
    }

    #[test]
    fn only_slot_zero_transmits() {
        let host = airborne_host(100);
        let mut slot = landed_out_slot();
        let mut state = RelayState::default();
        let mut radio = ScriptedRadio::idle();
        radio.slot = 1;
        let mut events = Vec::new();
        air_relay(
            &mut slot,
            &host,
            &settings(RelayMode::Landed),
            60_000,
            &mut state,
            &mut radio,
            &mut events,
        );
        assert!(radio.transmits.is_empty());
        // landed-out and not sent: hold the next slot open
        assert!(state.relay_waiting);
    }
}
