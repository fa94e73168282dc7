// src/acp/bands.rs  -  Distance-banded speed tables (ACP control time rules)
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One stretch of the route ridden at a fixed average speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedBand {
    pub width_km:  f64,
    pub speed_kmh: f64,
}

impl SpeedBand {
    pub const fn new(width_km: f64, speed_kmh: f64) -> Self {
        Self { width_km, speed_kmh }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum BandTableError {
    #[error("speed band table is empty")]
    Empty,
    #[error("band {index}: width {width_km} km / speed {speed_kmh} km/h must both be finite and > 0")]
    InvalidBand { index: usize, width_km: f64, speed_kmh: f64 },
}

/// Ordered, non-empty list of bands.  The last band absorbs whatever
/// distance the earlier bands did not cover.
#[derive(Debug, Clone, PartialEq)]
pub struct BandTable {
    bands: Vec<SpeedBand>,
}

// ── ACP published tables ──────────────────────────────────────────────────────
// 0-200 / 200-400 / 400-600 / 600-800 / 800-1000 / 1000-1200 km
pub const ACP_MAX_SPEEDS: [SpeedBand; 6] = [
    SpeedBand::new(200.0, 34.0),
    SpeedBand::new(200.0, 32.0),
    SpeedBand::new(200.0, 30.0),
    SpeedBand::new(200.0, 28.0),
    SpeedBand::new(200.0, 28.0),
    SpeedBand::new(200.0, 26.0),
];

pub const ACP_MIN_SPEEDS: [SpeedBand; 6] = [
    SpeedBand::new(200.0, 15.0),
    SpeedBand::new(200.0, 15.0),
    SpeedBand::new(200.0, 15.0),
    SpeedBand::new(200.0, 11.428),
    SpeedBand::new(200.0, 11.428),
    SpeedBand::new(200.0, 13.333),
];

impl BandTable {
    pub fn new(bands: Vec<SpeedBand>) -> Result<Self, BandTableError> {
        if bands.is_empty() {
            return Err(BandTableError::Empty);
        }
        for (index, b) in bands.iter().enumerate() {
            let ok = |x: f64| x.is_finite() && x > 0.0;
            if !ok(b.width_km) || !ok(b.speed_kmh) {
                return Err(BandTableError::InvalidBand {
                    index,
                    width_km:  b.width_km,
                    speed_kmh: b.speed_kmh,
                });
            }
        }
        Ok(Self { bands })
    }

    pub fn acp_max() -> Self {
        Self { bands: ACP_MAX_SPEEDS.to_vec() }
    }

    pub fn acp_min() -> Self {
        Self { bands: ACP_MIN_SPEEDS.to_vec() }
    }

    pub fn bands(&self) -> &[SpeedBand] {
        &self.bands
    }

    /// True when both tables split the route at the same distances.
    pub fn same_widths(&self, other: &BandTable) -> bool {
        self.bands.len() == other.bands.len()
            && self.bands.iter().zip(&other.bands).all(|(a, b)| a.width_km == b.width_km)
    }

    /// Distance covered explicitly before the last band starts absorbing.
    pub fn covered_km(&self) -> f64 {
        self.bands.iter().map(|b| b.width_km).sum()
    }

    /// Walk the bands for `distance_km` and return whole minutes elapsed.
    ///
    /// Every full band is rounded on its own before summation, matching the
    /// published ACP tables.  `terminal` computes the (unrounded) minutes for
    /// the band the walk stops in, given the leftover distance and its band.
    /// `None` when the total does not fit in whole minutes.
    pub fn walk<F>(&self, distance_km: f64, terminal: F) -> Option<i64>
    where
        F: Fn(f64, &SpeedBand) -> f64,
    {
        let mut remaining = distance_km;
        let mut minutes = 0i64;
        let last = self.bands.len() - 1;
        for (i, band) in self.bands.iter().enumerate() {
            if i < last && remaining > band.width_km {
                minutes = minutes.checked_add(minutes_at(band.width_km, band.speed_kmh)?)?;
                remaining -= band.width_km;
            } else {
                minutes = minutes.checked_add(whole_minutes(terminal(remaining, band))?)?;
                break;
            }
        }
        Some(minutes)
    }
}

/// Largest minute count accepted from a band; keeps the f64 → i64 cast exact.
const MAX_BAND_MINUTES: f64 = 9.0e15;

/// Round half away from zero; `None` for NaN / infinite / oversized values.
fn whole_minutes(m: f64) -> Option<i64> {
    let m = m.round();
    if m.is_finite() && m.abs() <= MAX_BAND_MINUTES {
        Some(m as i64)
    } else {
        None
    }
}

/// Minutes to ride `km` at `kmh`, rounded half away from zero.
pub fn minutes_at(km: f64, kmh: f64) -> Option<i64> {
    whole_minutes(km / kmh * 60.0)
}
