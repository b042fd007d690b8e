//! Heating degree day calculation.

/// Degree days for one day: `max(0, tbase - tmean)`, rounded to 2 decimals.
/// Days warmer than the base temperature contribute zero, never a credit.
pub fn heating_degree_days(tbase: f64, tmean: f64) -> f64 {
    let hdd = (tbase - tmean).max(0.0);
    (hdd * 100.0).round() / 100.0
}

// -- Tests -------------------------------------------------------------------
