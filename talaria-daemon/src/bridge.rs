//! Radio and annunciator bridges.
//!
//! The actual modem runs in another process; relaying hands it a JSON
//! transmit request over UDP. The bridge keeps the slot clock locally: two
//! 500 ms slots per second, slot 0 being the one ground stations listen
//! to. Sounds are surfaced through the log (a real installation wires the
//! buzzer/voice processes in here).

use std::net::{SocketAddr, UdpSocket};
use std::thread::sleep;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;
use talaria_core::alarm::AlarmLevel;
use talaria_core::io::{Notifier, RadioPort};
use talaria_core::types::TargetSlot;

/// Length of one transmit slot in ms.
pub const SLOT_MS: u64 = 500;

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ModemRequest<'a> {
    /// Re-transmit this target's position once.
    Relay { target: &'a TargetSlot },
    /// Skip our own next slot-0 position broadcast.
    HoldSlot0,
}

pub struct RadioBridge {
    socket: Option<UdpSocket>,
    pending: Vec<u8>,
    now_ms: u64,
    /// Slot index (now_ms / SLOT_MS) of the last transmission.
    transmitted_in: Option<u64>,
}

impl RadioBridge {
    pub fn new(modem: Option<SocketAddr>) -> std::io::Result<Self> {
        let socket = match modem {
            Some(addr) => {
                let socket = UdpSocket::bind(("0.0.0.0", 0))?;
                socket.connect(addr)?;
                Some(socket)
            }
            None => None,
        };
        Ok(RadioBridge {
            socket,
            pending: Vec::new(),
            now_ms: 0,
            transmitted_in: None,
        })
    }

    /// Advance the slot clock; called by the dispatcher every pass.
    pub fn set_now(&mut self, now_ms: u64) {
        self.now_ms = now_ms;
    }

    fn slot_index(&self) -> u64 {
        self.now_ms / SLOT_MS
    }

    /// Forward the engine's relay-waiting flag to the modem.
    pub fn set_suppress_slot0(&mut self, suppress: bool) {
        if !suppress {
            return;
        }
        if let Some(socket) = &self.socket {
            match serde_json::to_vec(&ModemRequest::HoldSlot0) {
                Ok(msg) => {
                    if let Err(e) = socket.send(&msg) {
                        debug!("modem hold request failed: {}", e);
                    }
                }
                Err(e) => debug!("modem hold request failed: {}", e),
            }
        }
    }
}

impl RadioPort for RadioBridge {
    fn encode_relay(&mut self, slot: &TargetSlot) -> usize {
        if self.socket.is_none() {
            return 0;
        }
        match serde_json::to_vec(&ModemRequest::Relay { target: slot }) {
            Ok(frame) => {
                self.pending = frame;
                self.pending.len()
            }
            Err(e) => {
                warn!("cannot encode relay frame: {}", e);
                0
            }
        }
    }

    fn transmit(&mut self, size: usize) -> bool {
        let Some(socket) = &self.socket else {
            return false;
        };
        if size == 0 || self.pending.len() != size {
            return false;
        }
        // give receivers in other aircraft time to digest the original
        sleep(Duration::from_millis(10));
        match socket.send(&self.pending) {
            Ok(_) => {
                self.transmitted_in = Some(self.slot_index());
                true
            }
            Err(e) => {
                debug!("relay transmit failed: {}", e);
                false
            }
        }
    }

    fn transmit_happened(&self) -> bool {
        self.transmitted_in == Some(self.slot_index())
    }

    fn current_slot(&self) -> u8 {
        ((self.now_ms / SLOT_MS) % 2) as u8
    }

    fn slot_time_left_ms(&self) -> u32 {
        (SLOT_MS - (self.now_ms % SLOT_MS)) as u32
    }
}

/// Surfaces alarm sounds through the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn buzzer(&mut self, level: AlarmLevel, multiple: bool) -> bool {
        warn!(
            "BUZZER {:?}{}",
            level,
            if multiple { " multiple" } else { "" }
        );
        true
    }

    fn voice(&mut self, target: &TargetSlot, multiple: bool) -> bool {
        let who = if target.callsign.is_empty() {
            format!("{:06X}", target.addr)
        } else {
            target.callsign.clone()
        };
        info!(
            "VOICE traffic {} bearing {:.0} distance {:.0} m{}",
            who,
            target.bearing,
            target.distance,
            if multiple { ", multiple" } else { "" }
        );
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_clock() {
        let mut bridge = RadioBridge::new(None).unwrap();
        bridge.set_now(0);
        assert_eq!(bridge.current_slot(), 0);
        assert_eq!(bridge.slot_time_left_ms(), 500);

        bridge.set_now(499);
        assert_eq!(bridge.current_slot(), 0);
        assert_eq!(bridge.slot_time_left_ms(), 1);

        bridge.set_now(500);
        assert_eq!(bridge.current_slot(), 1);

        bridge.set_now(1000);
        assert_eq!(bridge.current_slot(), 0);
    }

    #[test]
    fn no_modem_means_no_relay() {
        let mut bridge = RadioBridge::new(None).unwrap();
        let slot = TargetSlot::default();
        assert_eq!(bridge.encode_relay(&slot), 0);
        assert!(!bridge.transmit(26));
        assert!(!bridge.transmit_happened());
    }

    #[test]
    fn transmit_flag_clears_on_next_slot() {
        // a modem address nobody listens on; UDP send still succeeds
        let addr: SocketAddr = "127.0.0.1:45999".parse().unwrap();
        let mut bridge = RadioBridge::new(Some(addr)).unwrap();
        bridge.set_now(100);
        let size = bridge.encode_relay(&TargetSlot::default());
        assert!(size > 0);
        assert!(bridge.transmit(size));
        assert!(bridge.transmit_happened());

        bridge.set_now(600); // next slot
        assert!(!bridge.transmit_happened());
    }
}
