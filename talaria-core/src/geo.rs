//! Flat-Earth geometry between the host aircraft and nearby targets.
//!
//! At the ranges that matter here (a few km) an equirectangular
//! approximation is ample: one degree of latitude is ~111.3 km and a degree
//! of longitude shrinks with cos(latitude). The cosine is cached and only
//! refreshed once the host has moved more than [`COS_LAT_REFRESH_DEG`].

use crate::types::{HostState, TargetSlot};

/// Meters per degree of latitude.
pub const METERS_PER_DEGREE: f64 = 111300.0;

/// Latitude movement that invalidates the cached cosine.
pub const COS_LAT_REFRESH_DEG: f64 = 0.3;

/// Cached cos(latitude) with its clamped inverse.
#[derive(Debug, Clone)]
pub struct CosLatCache {
    cos_lat: f64,
    inv_cos_lat: f64,
    ref_lat: f64,
}

impl Default for CosLatCache {
    fn default() -> Self {
        CosLatCache {
            cos_lat: 0.7071,
            inv_cos_lat: 1.4142,
            ref_lat: 45.0,
        }
    }
}

impl CosLatCache {
    /// Current cos(latitude), refreshing from `latitude` if it has drifted.
    ///
    /// The inverse is only recomputed while cos φ > 0.01 so it stays finite
    /// near the poles.
    pub fn cos_lat(&mut self, latitude: f64) -> f64 {
        if (latitude - self.ref_lat).abs() > COS_LAT_REFRESH_DEG {
            self.cos_lat = latitude.to_radians().cos();
            if self.cos_lat > 0.01 {
                self.inv_cos_lat = 1.0 / self.cos_lat;
            }
            self.ref_lat = latitude;
        }
        self.cos_lat
    }

    pub fn inv_cos_lat(&self) -> f64 {
        self.inv_cos_lat
    }
}

/// Host-relative position of a point: east/north offsets, range and bearing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Distances {
    pub dx: i32,
    pub dy: i32,
    pub distance: f64,
    pub bearing: f64,
    pub alt_diff: f64,
}

/// Compute offsets, distance and bearing from the host to a position.
pub fn distances(
    host: &HostState,
    cache: &mut CosLatCache,
    latitude: f64,
    longitude: f64,
    altitude: f64,
) -> Distances {
    let y = METERS_PER_DEGREE * (latitude - host.latitude);
    let x = METERS_PER_DEGREE * (longitude - host.longitude) * cache.cos_lat(host.latitude);
    let mut bearing = x.atan2(y).to_degrees();
    if bearing < 0.0 {
        bearing += 360.0;
    }
    Distances {
        dx: x as i32,
        dy: y as i32,
        distance: x.hypot(y),
        bearing,
        alt_diff: altitude - host.altitude,
    }
}

/// Recompute a slot's host-relative geometry in place.
pub fn update_slot(slot: &mut TargetSlot, host: &HostState, cache: &mut CosLatCache) {
    let d = distances(host, cache, slot.latitude, slot.longitude, slot.altitude);
    apply_to_slot(slot, &d);
}

/// Copy precomputed distances into a slot (used when the geometry was
/// stashed before the slot was chosen).
pub fn apply_to_slot(slot: &mut TargetSlot, d: &Distances) {
    slot.dx = d.dx;
    slot.dy = d.dy;
    slot.distance = d.distance;
    slot.bearing = d.bearing;
    slot.alt_diff = d.alt_diff;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_at(lat: f64, lon: f64) -> HostState {
        HostState {
            latitude: lat,
            longitude: lon,
            altitude: 1000.0,
            ..Default::default()
        }
    }

    #[test]
    fn distance_east_at_45_degrees() {
        let host = host_at(45.0, 8.0);
        let mut cache = CosLatCache::default();
        let d = distances(&host, &mut cache, 45.0, 8.010, 1000.0);
        // 0.010 deg of longitude at 45N is ~787 m due east
        assert!((d.distance - 787.0).abs() < 2.0, "distance {}", d.distance);
        assert!((d.bearing - 90.0).abs() < 0.1, "bearing {}", d.bearing);
        assert!(d.dx > 780 && d.dx < 795);
        assert_eq!(d.dy, 0);
    }

    #[test]
    fn bearing_normalized_to_0_360() {
        let host = host_at(45.0, 8.0);
        let mut cache = CosLatCache::default();
        let d = distances(&host, &mut cache, 45.0, 7.990, 1000.0);
        assert!((d.bearing - 270.0).abs() < 0.1);
    }

    #[test]
    fn cache_refreshes_only_past_threshold() {
        let mut cache = CosLatCache::default();
        let c45 = cache.cos_lat(45.0);
        // small moves keep the cached value
        assert_eq!(cache.cos_lat(45.25), c45);
        assert_eq!(cache.cos_lat(44.75), c45);
        // a move past 0.3 deg refreshes
        let c46 = cache.cos_lat(46.0);
        assert!(c46 < c45);
        assert!((c46 - 46.0_f64.to_radians().cos()).abs() < 1e-12);
    }

    #[test]
    fn inverse_clamped_near_poles() {
        let mut cache = CosLatCache::default();
        cache.cos_lat(89.9);
        let inv = cache.inv_cos_lat();
        assert!(inv.is_finite());
        // moving back re-derives a sane inverse
        cache.cos_lat(45.0);
        assert!((cache.inv_cos_lat() - 1.0 / 45.0_f64.to_radians().cos()).abs() < 1e-9);
    }
}
