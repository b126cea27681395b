//! Radio range and RSSI statistics.
//!
//! Every qualifying reception contributes log2 of its distance to one of
//! twelve 30-degree "clock" sectors of relative heading, plus a running
//! RSSI mean and mean-square-deviation. On landing the flight's samples are
//! merged with the statistics persisted from earlier flights; the sums are
//! kept against the *old* mean and corrected at merge time, which combines
//! exactly (Welford-style) without a second pass.

use crate::error::StatsError;
use crate::types::{HostState, TargetSlot, TxKind};

/// File format version of `range.txt`.
pub const RANGESTATS_VERSION: u32 = 1;

/// Number of relative-heading sectors.
pub const SECTORS: usize = 12;

/// Accumulated range/RSSI statistics: the persisted prior plus this
/// flight's new samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeStats {
    oldrange: [f64; SECTORS],
    oldrange_n: [u32; SECTORS],
    newrange: [f64; SECTORS],
    newrange_n: [u32; SECTORS],
    oldrssi_mean: f64,
    oldrssi_ssd: f64,
    oldrssi_n: u32,
    newrssi_sum: f64,
    newrssi_dev: f64,
    newrssi_ssd: f64,
    newrssi_n: u32,
}

/// Sector index for a relative heading; sector 0 straddles dead ahead.
pub fn clock_sector(rel_heading: f64) -> usize {
    let oclock = (rel_heading as i32 + 15).rem_euclid(360);
    (oclock / 30) as usize
}

impl RangeStats {
    /// Fold one reception into the statistics, if it qualifies: both
    /// aircraft airborne, direct-link source, at least 1 km out, and not
    /// mostly above/below us.
    pub fn sample(&mut self, host: &HostState, slot: &TargetSlot) {
        if !host.airborne || !slot.airborne {
            return;
        }
        if slot.tx_type < TxKind::Flarm {
            return;
        }
        if slot.distance < 1000.0 {
            return;
        }
        if 4.0 * slot.alt_diff.abs() > slot.distance {
            return;
        }
        let sector = clock_sector(slot.rel_heading);
        self.newrange[sector] += (0.001 * slot.distance).log2();
        self.newrange_n[sector] += 1;

        let rssi = slot.rssi as f64;
        self.newrssi_sum += rssi;
        let dev = rssi - self.oldrssi_mean;
        self.newrssi_dev += dev;
        self.newrssi_ssd += dev * dev;
        self.newrssi_n += 1;
    }

    /// Whether this flight produced anything worth saving.
    pub fn has_new_samples(&self) -> bool {
        self.newrssi_n > 0
    }

    /// Mean log2 range (km) and sample count for one sector, prior included.
    pub fn sector_summary(&self, sector: usize) -> (f64, u32) {
        let n = self.newrange_n[sector] + self.oldrange_n[sector];
        if n == 0 {
            return (0.0, 0);
        }
        let sum = self.newrange[sector] + self.oldrange[sector] * self.oldrange_n[sector] as f64;
        (sum / n as f64, n)
    }

    /// Render the merged statistics in the `range.txt` format:
    /// one version line, twelve `linrange,logrange,n` lines, one
    /// `rssi_mean,rssi_mean_square_deviation` line.
    pub fn merged_file(&self) -> String {
        let mut out = String::with_capacity(400);
        out.push_str(&format!("{}\n", RANGESTATS_VERSION));
        for sector in 0..SECTORS {
            let (log_mean, n) = self.sector_summary(sector);
            let lin = if n > 0 { log_mean.exp2() } else { 0.0 };
            out.push_str(&format!("{:.1},{:.6},{}\n", lin, log_mean, n));
        }
        let (mean, msd) = self.merged_rssi();
        out.push_str(&format!("{:.6},{:.6}\n", mean, msd));
        out
    }

    /// Combined RSSI mean and mean square deviation over old and new data.
    fn merged_rssi(&self) -> (f64, f64) {
        let n = self.newrssi_n + self.oldrssi_n;
        if n == 0 {
            return (0.0, 0.0);
        }
        let n = n as f64;
        let mean = (self.newrssi_sum + self.oldrssi_mean * self.oldrssi_n as f64) / n;
        // total squared deviations from the old mean, then shift to the new mean
        let mut ssd = self.newrssi_ssd + self.oldrssi_ssd * self.oldrssi_n as f64;
        ssd -= (self.newrssi_dev * self.newrssi_dev) / n;
        (mean, ssd / n)
    }

    /// Parse a `range.txt` into a fresh prior (no new samples).
    pub fn decode(text: &str) -> Result<RangeStats, StatsError> {
        let mut stats = RangeStats::default();
        let mut lines = text.lines();

        let version = lines.next().ok_or(StatsError::Truncated(1))?;
        if version.trim().parse::<u32>() != Ok(RANGESTATS_VERSION) {
            return Err(StatsError::BadVersion(version.trim().to_string()));
        }

        for sector in 0..SECTORS {
            let lineno = sector + 2;
            let line = lines.next().ok_or(StatsError::Truncated(lineno))?;
            let mut fields = line.split(',');
            let malformed = || StatsError::Malformed {
                line: lineno,
                content: line.to_string(),
            };
            // linear range is informational only
            fields.next().ok_or_else(malformed)?;
            stats.oldrange[sector] = fields
                .next()
                .and_then(|f| f.trim().parse().ok())
                .ok_or_else(malformed)?;
            stats.oldrange_n[sector] = fields
                .next()
                .and_then(|f| f.trim().parse().ok())
                .ok_or_else(malformed)?;
            stats.oldrssi_n += stats.oldrange_n[sector];
        }

        let lineno = SECTORS + 2;
        let line = lines.next().ok_or(StatsError::Truncated(lineno))?;
        let mut fields = line.split(',');
        let malformed = || StatsError::Malformed {
            line: lineno,
            content: line.to_string(),
        };
        stats.oldrssi_mean = fields
            .next()
            .and_then(|f| f.trim().parse().ok())
            .ok_or_else(malformed)?;
        stats.oldrssi_ssd = fields
            .next()
            .and_then(|f| f.trim().parse().ok())
            .ok_or_else(malformed)?;

        Ok(stats)
    }
}
