// src/acp/mod.rs  -  ACP brevet control time rules (band tables + calculator)
pub mod bands;
pub mod calculator;

pub use bands::{BandTable, SpeedBand};
pub use calculator::TimeCalculator;

/// The only official ACP brevet distances (km).
pub const ACP_BREVET_DISTANCES: [f64; 5] = [200.0, 300.0, 400.0, 600.0, 1000.0];

pub fn is_canonical_brevet(brevet_km: f64) -> bool {
    ACP_BREVET_DISTANCES.contains(&brevet_km)
}
