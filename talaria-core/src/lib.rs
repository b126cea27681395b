//! Talaria Core - airborne traffic tracking and collision-alarm logic
//!
//! This crate contains the platform-independent core of a small flight
//! instrument: it consumes decoded position reports about nearby aircraft
//! plus the own-ship GNSS state, tracks targets in a fixed-capacity table,
//! computes per-target alarm levels, decides when to opportunistically
//! relay packets, and accumulates radio range statistics across flights.
//! It has no I/O dependencies; radio, audio and filesystem are reached
//! through small capability traits.
//!
//! # Example
//!
//! ```rust,no_run
//! use talaria_core::config::TrafficSettings;
//! use talaria_core::engine::TrafficEngine;
//! use talaria_core::io::{MutedRadio, SilentNotifier};
//! use talaria_core::types::TargetReport;
//!
//! let mut engine = TrafficEngine::new(TrafficSettings::default());
//! let mut radio = MutedRadio;
//! let mut notifier = SilentNotifier;
//!
//! let report = TargetReport::default(); // real reports come from the decoders
//! engine.add_traffic(&report, 0, 0, &mut radio);
//! engine.tick(0, 1000, &mut notifier);
//! for event in engine.drain_events() {
//!     println!("{:?}", event);
//! }
//! ```

pub mod alarm;
pub mod config;
pub mod engine;
pub mod error;
pub mod geo;
pub mod identity;
pub mod io;
pub mod projection;
pub mod range_stats;
pub mod records;
pub mod relay;
pub mod sentences;
pub mod table;
pub mod types;

// Re-export commonly used types
pub use alarm::AlarmLevel;
pub use config::TrafficSettings;
pub use engine::{TrafficEngine, TrafficEvent};
pub use error::StatsError;
pub use types::{HostState, TargetReport, TargetSlot};
