//! # Talaria Daemon
//!
//! Host-side dispatcher around [`talaria_core`]: single-threaded ownership
//! of the traffic engine with UDP plumbing at the edges.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    talaria-daemon                        │
//! │  ┌──────────────┐   ┌─────────────┐   ┌───────────────┐  │
//! │  │ report feed  │   │ periodic    │   │ telemetry out │  │
//! │  │ (UDP, JSON)  │   │ tick (1 Hz) │   │ (UDP, $PS*)   │  │
//! │  └──────┬───────┘   └──────┬──────┘   └───────▲───────┘  │
//! │         ▼                  ▼                  │          │
//! │  ┌────────────────────────────────────────────┴───────┐  │
//! │  │       TrafficEngine (talaria-core, exclusive)      │  │
//! │  └──────┬───────────────────────────────┬─────────────┘  │
//! │         ▼                               ▼                │
//! │  ┌──────────────┐                ┌──────────────┐        │
//! │  │ radio bridge │                │ storage      │        │
//! │  │ (relay tx)   │                │ range.txt /  │        │
//! │  └──────────────┘                │ alarmlog.txt │        │
//! │                                  └──────────────┘        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The decoders (radio, ADS-B) run as separate processes and send decoded
//! reports as JSON datagrams; GNSS fixes arrive on the same socket. The
//! engine stays the only owner of tracking state, exactly one event source
//! is polled at a time.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use clap::Parser;
use log::{debug, info, warn};
use talaria_core::config::{FlightLogMode, TrafficSettings};
use talaria_core::engine::{close_traffic_records, TrafficEngine, TrafficEvent};
use talaria_core::identity;
use talaria_core::sentences;
use tokio::net::UdpSocket;
use tokio_graceful_shutdown::SubsystemHandle;

pub mod bridge;
pub mod feed;
pub mod storage;

use bridge::{LogNotifier, RadioBridge};
use feed::FeedMessage;
use storage::Storage;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Clone, Debug)]
#[command(name = "talaria-daemon", version)]
pub struct Cli {
    #[clap(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<clap_verbosity_flag::InfoLevel>,

    /// UDP port for decoded reports and GNSS fixes
    #[arg(short, long, default_value_t = 29731)]
    pub port: u16,

    /// Destination for telemetry sentences, e.g. 127.0.0.1:10110
    #[arg(short, long)]
    pub telemetry: Option<SocketAddr>,

    /// Destination for relay transmit requests (the radio modem process)
    #[arg(short, long)]
    pub modem: Option<SocketAddr>,

    /// Directory for range.txt and alarmlog.txt
    #[arg(short, long, default_value = ".")]
    pub data_dir: PathBuf,

    /// Settings file (JSON); defaults apply when absent
    #[arg(short, long)]
    pub settings: Option<PathBuf>,
}

/// Load settings from the given file, or defaults.
pub fn load_settings(path: Option<&PathBuf>) -> TrafficSettings {
    let Some(path) = path else {
        return TrafficSettings::default();
    };
    match std::fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str(&text) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("settings file {} is invalid: {}", path.display(), e);
                TrafficSettings::default()
            }
        },
        Err(e) => {
            warn!("cannot read settings {}: {}", path.display(), e);
            TrafficSettings::default()
        }
    }
}

fn wall_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The dispatcher subsystem: one run-to-completion loop owning all state.
pub async fn run(subsys: SubsystemHandle, args: Cli) -> Result<(), BoxError> {
    let settings = load_settings(args.settings.as_ref());
    info!(
        "talaria-daemon {} starting, alarm algorithm {:?}, relay {:?}",
        VERSION, settings.alarm, settings.relay
    );

    let mut storage = Storage::new(args.data_dir.clone(), settings.alarmlog_max_kb);
    let mut engine = TrafficEngine::new(settings);
    engine.install_range_stats(storage.load_range_stats());

    let socket = UdpSocket::bind(("0.0.0.0", args.port)).await?;
    info!("listening for decoded reports on UDP {}", args.port);
    let telemetry = match args.telemetry {
        Some(addr) => {
            let tx = UdpSocket::bind(("0.0.0.0", 0)).await?;
            tx.connect(addr).await?;
            Some(tx)
        }
        None => None,
    };

    let mut radio = RadioBridge::new(args.modem)?;
    let mut notifier = LogNotifier;

    let started = Instant::now();
    let mut buf = [0u8; 2048];
    let mut tick = tokio::time::interval(Duration::from_millis(250));

    loop {
        let now_ms = started.elapsed().as_millis() as u64;
        radio.set_now(now_ms);

        tokio::select! {
            _ = subsys.on_shutdown_requested() => break,
            recv = socket.recv_from(&mut buf) => {
                let (len, _peer) = recv?;
                match feed::parse_datagram(&buf[..len]) {
                    Ok(FeedMessage::Host(mut host)) => {
                        // a GNSS source with no configured address gets a
                        // pseudo-random one in the reserved space
                        if host.addr == 0 {
                            host.addr =
                                identity::random_host_id(now_ms, engine.settings().id_method);
                        }
                        engine.update_host(host);
                    }
                    Ok(FeedMessage::Traffic(report)) => {
                        engine.add_traffic(&report, wall_secs(), now_ms, &mut radio);
                    }
                    Err(e) => debug!("dropping undecodable datagram: {}", e),
                }
            }
            _ = tick.tick() => {
                let now = wall_secs();
                let loop_pass = engine.is_time_to_update(now_ms);
                engine.tick(now, now_ms, &mut notifier);
                if loop_pass {
                    let summary = engine.summary();
                    if summary.count > 0 {
                        debug!(
                            "tracking {} targets ({} ADS-B), worst alarm {:?}{}",
                            summary.count,
                            summary.adsb_count,
                            engine.max_alarm_level(),
                            if engine.alarm_ahead() { ", ahead" } else { "" }
                        );
                    }
                    if engine.settings().log_flight == FlightLogMode::Traffic
                        && engine.host().airborne
                    {
                        for row in close_traffic_records(&engine, now) {
                            storage.append_flight_log(&row);
                        }
                    }
                }
            }
        }

        radio.set_suppress_slot0(engine.take_relay_waiting());
        handle_events(&mut engine, &mut storage, telemetry.as_ref()).await;
    }

    // landing may never have been seen; persist what we have
    if let Some(text) = engine.save_range_stats() {
        storage.save_range_stats(&text);
    }
    storage.close_alarm_log();
    info!("dispatcher stopped");
    Ok(())
}

/// Apply engine events to the host side: files, telemetry, log.
async fn handle_events(
    engine: &mut TrafficEngine,
    storage: &mut Storage,
    telemetry: Option<&UdpSocket>,
) {
    for event in engine.drain_events() {
        match event {
            TrafficEvent::Takeoff => {
                info!("takeoff detected");
                if engine.settings().log_alarms {
                    storage.open_alarm_log();
                }
            }
            TrafficEvent::Landing => {
                info!("landing detected");
                if let Some(text) = engine.save_range_stats() {
                    storage.save_range_stats(&text);
                }
                storage.close_alarm_log();
            }
            TrafficEvent::AlarmLogged(record) => {
                let host = engine.host();
                storage.append_alarm(
                    &record,
                    host.timestamp,
                    host.latitude,
                    host.longitude,
                );
            }
            TrafficEvent::FlightLog(line) => storage.append_flight_log(&line),
            TrafficEvent::Notification {
                addr,
                level,
                multiple,
            } => {
                warn!(
                    "traffic alarm {:?} for {:06X}{}",
                    level,
                    addr,
                    if multiple { " (multiple threats)" } else { "" }
                );
            }
            TrafficEvent::LandedOut {
                addr,
                latitude,
                longitude,
            } => {
                warn!(
                    "landed-out aircraft {:06X} at {:.5},{:.5}",
                    addr, latitude, longitude
                );
            }
            TrafficEvent::RelayedFirst { addr, callsign } => {
                let now = wall_secs();
                let line = sentences::psrly(
                    ((now / 3600) % 24) as u32,
                    ((now / 60) % 60) as u32,
                    addr,
                    &callsign,
                );
                storage.append_flight_log(&line);
                send_telemetry(telemetry, &line).await;
            }
            TrafficEvent::Sentence(line) => send_telemetry(telemetry, &line).await,
            TrafficEvent::Expired { addr } => debug!("target {:06X} expired", addr),
        }
    }
}

async fn send_telemetry(telemetry: Option<&UdpSocket>, line: &str) {
    if let Some(socket) = telemetry {
        if let Err(e) = socket.send(line.as_bytes()).await {
            debug!("telemetry send failed: {}", e);
        }
    }
}
