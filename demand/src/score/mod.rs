pub mod city;
pub mod composite;
pub mod heat;
pub mod sellout;

/// Clamp used by every scorer; NaN collapses to the lower bound.
pub(crate) fn clamp_score(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) }
}

/// Rounds to two decimals for presentation and deterministic tie-breaking.
pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
