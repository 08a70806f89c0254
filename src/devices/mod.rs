//! Physical models of the solar array, battery and household load.

/// Stationary battery storage model.
pub mod battery;
/// Household consumption profile.
pub mod load;
/// Solar photovoltaic generation model.
pub mod solar;

// Re-export the main types for convenience
pub use battery::{Battery, BatteryParams};
pub use load::{HouseholdLoad, LoadParams};
pub use solar::{SolarArray, SolarParams, SolarReading};
