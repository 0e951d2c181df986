//! Named apparatus parameter vectors.
//!
//! Layout: 7 magnet half-lengths (cm), then 8 shape values per magnet:
//! `dx_in, dx_out, dy_in, dy_out, gap_in, gap_out, yoke_ratio, coil_current`.

use ms_core::{Error, Result};

/// Number of magnets described by a parameter vector.
pub const N_MAGNETS: usize = 7;
/// Shape values per magnet.
pub const PARAMS_PER_MAGNET: usize = 8;
/// Total parameter-vector length.
pub const N_PARAMS: usize = N_MAGNETS + N_MAGNETS * PARAMS_PER_MAGNET;

/// Hybrid baseline design.
#[rustfmt::skip]
pub const BASELINE: [f64; N_PARAMS] = [
    231.0, 145.88714376, 144.97327917, 233.53443056, 185.12337627, 289.12393279, 178.27166603,
    50.0, 50.0, 119.0, 119.0, 2.0, 2.0, 1.0, 0.0,
    55.68631679, 39.18737101, 39.0519151, 64.94001798, 2.18559108, 2.24933776, 1.81442009, 0.0,
    41.48397928, 29.13140211, 26.76256635, 115.0, 2.04579784, 2.23057252, 1.83378473, 0.0,
    8.53668902, 24.10068397, 20.92353585, 18.79892067, 100.0, 2.1116541, 1.85945483, 0.0,
    5.0, 24.87859129, 30.70114222, 15.07063979, 2.25817831, 2.24777563, 1.86769417, 0.0,
    41.48397928, 29.13140211, 26.76256635, 115.0, 2.04579784, 2.23057252, 1.83378473, 0.0,
    41.48397928, 29.13140211, 26.76256635, 115.0, 2.04579784, 2.23057252, 1.83378473, 0.0,
];

/// Warm-magnet optimized design.
#[rustfmt::skip]
pub const WARM: [f64; N_PARAMS] = [
    231.0, 166.443436, 256.261292, 291.919128, 199.210968, 214.869919, 113.462059,
    50.0, 50.0, 119.0, 119.0, 2.0, 2.0, 1.0, 0.0,
    71.7344208, 72.3064270, 30.1792870, 55.0608139, 45.0294533, 6.05307674, 1.55043912,
    0.0295457952,
    72.2414017, 32.8486481, 64.0336609, 98.6102371, 37.2791176, 37.5814209, 1.39339948, 0.0,
    5.0, 36.8521347, 23.6333714, 62.5332870, 49.0338936, 40.2122650, 1.60776615, 1.52162361,
    5.47383785, 43.6184082, 47.5524864, 164.372299, 38.2776070, 2.0, 1.26237798, 0.406472445,
    21.4549942, 48.7760811, 58.7977676, 113.127258, 6.34082699, 47.5470161, 1.53402686, 0.0,
    76.0394669, 27.9700508, 91.0693283, 29.4182072, 22.8603382, 19.9502850, 0.939842820, 0.0,
];

/// Preset by name.
pub fn preset(name: &str) -> Option<&'static [f64]> {
    match name {
        "baseline" => Some(&BASELINE),
        "warm" => Some(&WARM),
        _ => None,
    }
}

/// Names accepted by [`preset`].
pub fn preset_names() -> &'static [&'static str] {
    &["baseline", "warm"]
}

/// Check length and finiteness of a parameter vector.
pub fn validate_params(params: &[f64]) -> Result<()> {
    if params.len() != N_PARAMS {
        return Err(Error::Validation(format!(
            "parameter vector must have {N_PARAMS} entries, got {}",
            params.len()
        )));
    }
    if let Some(i) = params.iter().position(|p| !p.is_finite()) {
        return Err(Error::Validation(format!("parameter {i} is not finite: {}", params[i])));
    }
    Ok(())
}
