use crate::constants::SPEED_OF_LIGHT_M_PER_S;

/// Free-space path loss in dB for a separation in centimeters at a
/// frequency in GHz.
///
/// Uses the standard FSPL form `20*log10(4*pi*d*f/c)`. A zero or negative
/// distance means the segment is not yet configured and contributes no
/// loss. Separations inside roughly one wavelength fall out of the
/// far-field form entirely, so anything below the 0 dB crossover is
/// clamped to zero loss rather than reported as gain.
pub fn free_space_path_loss_db(frequency_ghz: f64, distance_cm: f64) -> f64 {
    if distance_cm <= 0.0 {
        return 0.0;
    }
    let frequency_hz = frequency_ghz * 1.0e9;
    let distance_m = distance_cm / 100.0;

    let linear = (4.0 * std::f64::consts::PI * distance_m * frequency_hz) / SPEED_OF_LIGHT_M_PER_S;
    if linear < 1.0 {
        return 0.0;
    }
    20.0 * f64::log10(linear)
}
