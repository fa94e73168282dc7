// src/acp/calculator.rs  -  Control open/close instants from the band tables
use chrono::{DateTime, TimeDelta, TimeZone};
use thiserror::Error;

use super::bands::{BandTable, SpeedBand};

/// Below this leftover distance the close time uses the flat
/// one-hour-plus-20-km/h allowance instead of the minimum speed.
pub const SHORT_CONTROL_KM: f64 = 60.0;
const SHORT_CONTROL_KMH: f64 = 20.0;

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum CalcError {
    /// Negative or non-finite distance; no instant is produced.
    #[error("invalid distance: {km} km")]
    InvalidDistance { km: f64 },
    /// Finite distance whose elapsed time does not fit a date.
    #[error("control time out of range for {km} km")]
    OutOfRange { km: f64 },
}

/// Both instants for one control.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlTimes<Tz: TimeZone> {
    pub open:  DateTime<Tz>,
    pub close: DateTime<Tz>,
}

/// Holds the maximum-speed (open) and minimum-speed (close) tables.
/// Immutable after construction; share freely between threads.
#[derive(Debug, Clone)]
pub struct TimeCalculator {
    max_speeds: BandTable,
    min_speeds: BandTable,
}

impl Default for TimeCalculator {
    fn default() -> Self {
        Self::new(BandTable::acp_max(), BandTable::acp_min())
    }
}

impl TimeCalculator {
    pub fn new(max_speeds: BandTable, min_speeds: BandTable) -> Self {
        Self { max_speeds, min_speeds }
    }

    /// Minutes after the start at which the control opens.
    pub fn open_minutes(&self, control_km: f64, brevet_km: f64) -> Result<i64, CalcError> {
        let km = effective_distance(control_km, brevet_km)?;
        self.max_speeds
            .walk(km, |rem, band| rem / band.speed_kmh * 60.0)
            .ok_or(CalcError::OutOfRange { km: control_km })
    }

    /// Minutes after the start at which the control closes.
    pub fn close_minutes(&self, control_km: f64, brevet_km: f64) -> Result<i64, CalcError> {
        let km = effective_distance(control_km, brevet_km)?;
        self.min_speeds
            .walk(km, close_terminal)
            .ok_or(CalcError::OutOfRange { km: control_km })
    }

    pub fn open_time<Tz: TimeZone>(
        &self,
        control_km: f64,
        brevet_km:  f64,
        start:      &DateTime<Tz>,
    ) -> Result<DateTime<Tz>, CalcError> {
        let m = self.open_minutes(control_km, brevet_km)?;
        shift(start, m).ok_or(CalcError::OutOfRange { km: control_km })
    }

    pub fn close_time<Tz: TimeZone>(
        &self,
        control_km: f64,
        brevet_km:  f64,
        start:      &DateTime<Tz>,
    ) -> Result<DateTime<Tz>, CalcError> {
        let m = self.close_minutes(control_km, brevet_km)?;
        shift(start, m).ok_or(CalcError::OutOfRange { km: control_km })
    }

    pub fn control_times<Tz: TimeZone>(
        &self,
        control_km: f64,
        brevet_km:  f64,
        start:      &DateTime<Tz>,
    ) -> Result<ControlTimes<Tz>, CalcError> {
        Ok(ControlTimes {
            open:  self.open_time(control_km, brevet_km, start)?,
            close: self.close_time(control_km, brevet_km, start)?,
        })
    }
}

/// Reject negative / non-finite input, then clamp to the route's end.
fn effective_distance(control_km: f64, brevet_km: f64) -> Result<f64, CalcError> {
    if !control_km.is_finite() || control_km < 0.0 {
        return Err(CalcError::InvalidDistance { km: control_km });
    }
    if !brevet_km.is_finite() || brevet_km < 0.0 {
        return Err(CalcError::InvalidDistance { km: brevet_km });
    }
    Ok(control_km.min(brevet_km))
}

fn shift<Tz: TimeZone>(start: &DateTime<Tz>, minutes: i64) -> Option<DateTime<Tz>> {
    start.clone().checked_add_signed(TimeDelta::try_minutes(minutes)?)
}

fn close_terminal(rem: f64, band: &SpeedBand) -> f64 {
    if rem < SHORT_CONTROL_KM {
        (rem / SHORT_CONTROL_KMH + 1.0) * 60.0
    } else {
        rem / band.speed_kmh * 60.0
    }
}
