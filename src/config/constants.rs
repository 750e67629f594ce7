// Time Constants
pub const HOURS_PER_YEAR: usize = 8760;
pub const HOURS_PER_DAY: usize = 24;
pub const MONTHS_PER_YEAR: u32 = 12;

// Cumulative days at the start of each month (non-leap year)
pub const MONTH_START_DAY: [u32; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];

// Geodesy Constants
pub const EARTH_RADIUS_KM: f64 = 6367.0;
pub const COORDINATE_DECIMALS: i32 = 6;
pub const LENGTH_DECIMALS: i32 = 2;

// Balance Engine Constants
pub const MAX_SHORTFALL_ITERATIONS: usize = 3;

// Grid Defaults
pub const DEFAULT_LINE_LOSS: f64 = 0.0;

// Storage Defaults
pub const DEFAULT_RECHARGE_EFFICIENCY: f64 = 0.95;
pub const DEFAULT_DISCHARGE_EFFICIENCY: f64 = 0.95;

/// Round to `decimals` decimal places. Emitted lengths use 2, stored
/// coordinates use 6.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

pub fn round2(value: f64) -> f64 {
    round_to(value, LENGTH_DECIMALS)
}

pub fn round6(value: f64) -> f64 {
    round_to(value, COORDINATE_DECIMALS)
}
