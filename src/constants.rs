/// Reference noise temperature T0 in Kelvin.
pub const REFERENCE_TEMPERATURE_K: f64 = 290.0;

/// Speed of light in m/s (SI units).
pub const SPEED_OF_LIGHT_M_PER_S: f64 = 299_792_458.0;

/// Input power (dBm) used while deriving a merged component's specs,
/// low enough that no realistic sub-chain compresses during derivation.
pub const REFERENCE_INPUT_DBM: f64 = -100.0;
