//! Capability seams toward the host platform.
//!
//! The core never touches hardware; the daemon (or a test double) hands in
//! implementations of these traits. Everything is synchronous and
//! poll-shaped so the single-threaded dispatcher stays in control.

use crate::alarm::AlarmLevel;
use crate::types::TargetSlot;

/// The transmit side of the short-range radio, scoped to what the relay
/// path needs: one opportunistic re-transmission inside the current slot.
pub trait RadioPort {
    /// Re-encode a tracked target for relay. Returns the frame size, or 0
    /// when the target cannot be encoded in the active protocol.
    fn encode_relay(&mut self, slot: &TargetSlot) -> usize;

    /// Transmit the previously encoded frame. Implementations should hold
    /// off ~10 ms first so receivers in other aircraft finish processing
    /// the original packet.
    fn transmit(&mut self, size: usize) -> bool;

    /// Whether something already went out in the current time slot.
    fn transmit_happened(&self) -> bool;

    /// Index of the current slot in the radio schedule.
    fn current_slot(&self) -> u8;

    /// Milliseconds remaining before the current slot closes.
    fn slot_time_left_ms(&self) -> u32;
}

/// Audio annunciators.
pub trait Notifier {
    /// Tone pattern for an alarm level. Returns whether a sound was made.
    fn buzzer(&mut self, level: AlarmLevel, multiple: bool) -> bool;

    /// Spoken callout for a specific target.
    fn voice(&mut self, target: &TargetSlot, multiple: bool) -> bool;
}

/// A radio that never transmits; useful for tests and receive-only setups.
#[derive(Debug, Default)]
pub struct MutedRadio;

impl RadioPort for MutedRadio {
    fn encode_relay(&mut self, _slot: &TargetSlot) -> usize {
        0
    }
    fn transmit(&mut self, _size: usize) -> bool {
        false
    }
    fn transmit_happened(&self) -> bool {
        true
    }
    fn current_slot(&self) -> u8 {
        0
    }
    fn slot_time_left_ms(&self) -> u32 {
        0
    }
}

/// A notifier that swallows everything.
#[derive(Debug, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn buzzer(&mut self, _level: AlarmLevel, _multiple: bool) -> bool {
        false
    }
    fn voice(&mut self, _target: &TargetSlot, _multiple: bool) -> bool {
        false
    }
}
