//! Persistence: range statistics and the append-only logs.
//!
//! `range.txt` is rewritten on landing with the previous file preserved as
//! `oldrange.txt`. The alarm log opens on takeoff, appends one CSV row per
//! sounded notification, and is truncated (fresh header) once it outgrows
//! the configured bound. Persistence failures are logged and absorbed,
//! never fatal.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use log::{debug, info, warn};
use talaria_core::range_stats::RangeStats;
use talaria_core::records::{self, AlarmRecord};

pub struct Storage {
    data_dir: PathBuf,
    alarmlog_max_kb: u64,
    alarm_log: Option<File>,
}

/// Degrees to the NMEA `ddmm.mmmmm,H` form.
fn nmea_coord(value: f64, pos: char, neg: char, deg_width: usize) -> String {
    let hemi = if value < 0.0 { neg } else { pos };
    let value = value.abs();
    let degrees = value.trunc();
    let minutes = (value - degrees) * 60.0;
    format!(
        "{:0width$.0}{:08.5},{}",
        degrees,
        minutes,
        hemi,
        width = deg_width
    )
}

/// `hhmmss.00,lat,N,lon,E` fragment for an alarm-log row.
fn time_pos_fragment(timestamp: u64, latitude: f64, longitude: f64) -> (String, String) {
    let date;
    let time;
    match DateTime::from_timestamp(timestamp as i64, 0) {
        Some(utc) => {
            date = utc.format("%y%m%d").to_string();
            time = utc.format("%H%M%S.00").to_string();
        }
        None => {
            date = "000000".to_string();
            time = "000000.00".to_string();
        }
    }
    let pos = format!(
        "{},{},{}",
        time,
        nmea_coord(latitude, 'N', 'S', 2),
        nmea_coord(longitude, 'E', 'W', 3)
    );
    (date, pos)
}

impl Storage {
    pub fn new(data_dir: PathBuf, alarmlog_max_kb: u64) -> Self {
        Storage {
            data_dir,
            alarmlog_max_kb,
            alarm_log: None,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    /// Read `range.txt`; a missing or unreadable file starts fresh.
    pub fn load_range_stats(&self) -> RangeStats {
        let path = self.path("range.txt");
        if !path.exists() {
            debug!("{} does not exist, starting fresh", path.display());
            return RangeStats::default();
        }
        match fs::read_to_string(&path) {
            Ok(text) => match RangeStats::decode(&text) {
                Ok(stats) => {
                    info!("loaded range statistics from {}", path.display());
                    stats
                }
                Err(e) => {
                    warn!("cannot decode {}: {}", path.display(), e);
                    RangeStats::default()
                }
            },
            Err(e) => {
                warn!("cannot read {}: {}", path.display(), e);
                RangeStats::default()
            }
        }
    }

    /// Write a new `range.txt`, keeping the previous one as `oldrange.txt`.
    pub fn save_range_stats(&self, text: &str) {
        if let Err(e) = fs::create_dir_all(&self.data_dir) {
            warn!("cannot create {}: {}", self.data_dir.display(), e);
            return;
        }
        let path = self.path("range.txt");
        let old = self.path("oldrange.txt");
        let _ = fs::remove_file(&old);
        if path.exists() {
            if let Err(e) = fs::rename(&path, &old) {
                warn!("cannot rotate {}: {}", path.display(), e);
            }
        }
        match fs::write(&path, text) {
            Ok(()) => info!("saved range statistics to {}", path.display()),
            Err(e) => warn!("cannot write {}: {}", path.display(), e),
        }
    }

    /// Open the alarm log for this flight. Appends while the file is under
    /// the configured bound, otherwise starts over; a fresh file gets the
    /// header row.
    pub fn open_alarm_log(&mut self) {
        if self.alarm_log.is_some() {
            return;
        }
        if let Err(e) = fs::create_dir_all(&self.data_dir) {
            warn!("cannot create {}: {}", self.data_dir.display(), e);
            return;
        }
        let path = self.path("alarmlog.txt");
        let append = match fs::metadata(&path) {
            Ok(meta) => meta.len() < self.alarmlog_max_kb * 1024,
            Err(_) => false,
        };
        let file = OpenOptions::new()
            .create(true)
            .append(append)
            .write(true)
            .truncate(!append)
            .open(&path);
        match file {
            Ok(mut file) => {
                if !append {
                    if let Err(e) = file.write_all(records::ALARM_LOG_HEADER.as_bytes()) {
                        warn!("cannot write alarm log header: {}", e);
                        return;
                    }
                }
                info!(
                    "alarm log {} {}",
                    path.display(),
                    if append { "appending" } else { "started" }
                );
                self.alarm_log = Some(file);
            }
            Err(e) => warn!("failed to open {}: {}", path.display(), e),
        }
    }

    pub fn close_alarm_log(&mut self) {
        self.alarm_log = None;
    }

    /// Append one alarm row; on a write failure the log is closed for the
    /// rest of the flight (the filesystem is probably full).
    pub fn append_alarm(
        &mut self,
        record: &AlarmRecord,
        timestamp: u64,
        latitude: f64,
        longitude: f64,
    ) {
        let Some(file) = self.alarm_log.as_mut() else {
            return;
        };
        let (date, time_pos) = time_pos_fragment(timestamp, latitude, longitude);
        let row = records::alarm_log_row(&date, &time_pos, record);
        let ok = file
            .write_all(row.as_bytes())
            .and_then(|_| file.flush())
            .is_ok();
        if !ok {
            warn!("alarm log write failed, closing it");
            self.alarm_log = None;
        }
    }

    /// Append a comment line to the flight log sidecar.
    pub fn append_flight_log(&self, line: &str) {
        let path = self.path("flightlog.txt");
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| f.write_all(line.as_bytes()));
        if let Err(e) = result {
            debug!("flight log append failed: {}", e);
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
