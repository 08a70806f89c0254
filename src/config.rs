//! TOML-based simulator configuration and preset definitions.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

pub use crate::error::ConfigError;

/// Top-level simulator configuration parsed from TOML.
///
/// All fields have defaults matching the baseline site. Load from
/// TOML with [`SimulatorConfig::from_toml_file`] or use
/// [`SimulatorConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulatorConfig {
    /// Site identity and location.
    #[serde(default)]
    pub site: SiteConfig,
    /// Solar array parameters.
    #[serde(default)]
    pub solar: SolarConfig,
    /// Battery storage parameters.
    #[serde(default)]
    pub battery: BatteryConfig,
    /// Household load profile parameters.
    #[serde(default)]
    pub load: LoadConfig,
    /// Tick period.
    #[serde(default)]
    pub publishing: PublishingConfig,
    /// Synthetic weather generator parameters.
    #[serde(default)]
    pub weather: WeatherConfig,
}

/// Site identity and location.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Identifier stamped on every telemetry snapshot.
    pub site_id: String,
    /// IANA time zone name used for time-of-day shaping.
    pub timezone: String,
    /// Latitude in degrees (informational).
    pub latitude: f64,
    /// Longitude in degrees (informational).
    pub longitude: f64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_id: "home-001".to_string(),
            timezone: "UTC".to_string(),
            latitude: 0.0,
            longitude: 0.0,
        }
    }
}

/// Solar array parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolarConfig {
    /// Nameplate capacity (kW).
    pub capacity_kw: f64,
    /// Panel efficiency factor applied to nameplate output (0.0–1.0].
    pub panel_efficiency: f64,
    /// Inverter efficiency (0.0–1.0].
    pub inverter_efficiency: f64,
    /// Power temperature coefficient per °C (normally negative).
    pub temperature_coefficient: f64,
}

impl Default for SolarConfig {
    fn default() -> Self {
        Self {
            capacity_kw: 8.0,
            panel_efficiency: 0.85,
            inverter_efficiency: 0.96,
            temperature_coefficient: -0.004,
        }
    }
}

/// Battery storage parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Total energy capacity (kWh).
    pub capacity_kwh: f64,
    /// Maximum charging power (kW).
    pub max_charge_rate_kw: f64,
    /// Maximum discharging power (kW).
    pub max_discharge_rate_kw: f64,
    /// State of charge at startup (%).
    pub initial_soc_percent: f64,
    /// Lower state-of-charge bound (%).
    pub min_soc_percent: f64,
    /// Upper state-of-charge bound (%).
    pub max_soc_percent: f64,
    /// Round-trip efficiency (0.0–1.0], charged once on the way in.
    pub round_trip_efficiency: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: 13.5,
            max_charge_rate_kw: 5.0,
            max_discharge_rate_kw: 5.0,
            initial_soc_percent: 50.0,
            min_soc_percent: 10.0,
            max_soc_percent: 95.0,
            round_trip_efficiency: 0.90,
        }
    }
}

/// Household load profile parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    /// Always-on consumption (kW).
    pub baseline_kw: f64,
    /// Consumption at the morning peak (kW).
    pub peak_morning_kw: f64,
    /// Consumption at the evening peak (kW).
    pub peak_evening_kw: f64,
    /// Hour of the morning peak (0–23).
    pub morning_peak_hour: u32,
    /// Hour of the evening peak (0–23).
    pub evening_peak_hour: u32,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            baseline_kw: 0.5,
            peak_morning_kw: 2.5,
            peak_evening_kw: 4.0,
            morning_peak_hour: 7,
            evening_peak_hour: 19,
        }
    }
}

/// Tick period.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishingConfig {
    /// Milliseconds between ticks (must be > 0).
    pub rate_ms: u64,
}

impl Default for PublishingConfig {
    fn default() -> Self {
        Self { rate_ms: 1000 }
    }
}

/// Synthetic weather generator parameters.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeatherConfig {
    /// Seconds between weather refreshes.
    pub update_interval_secs: u64,
    /// Mean ambient temperature (°C); a ±5 °C daily swing is added.
    pub base_temperature_c: f64,
    /// Mean cloud cover (%).
    pub cloud_cover_percent: f64,
    /// Relative humidity (%).
    pub humidity_percent: f64,
    /// Wind speed (m/s).
    pub wind_speed_ms: f64,
    /// AR(1) persistence of cloud cover (0.0–1.0).
    pub cloud_alpha: f64,
    /// Standard deviation of cloud cover innovations (percentage points).
    pub cloud_noise_std: f64,
    /// Seed for cloud cover noise.
    pub seed: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 900,
            base_temperature_c: 20.0,
            cloud_cover_percent: 25.0,
            humidity_percent: 60.0,
            wind_speed_ms: 3.5,
            cloud_alpha: 0.8,
            cloud_noise_std: 0.0,
            seed: 42,
        }
    }
}

impl WeatherConfig {
    /// Wall-clock period between weather refreshes.
    pub fn update_period(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }
}

impl SimulatorConfig {
    /// Returns the baseline site: 8 kW array, 13.5 kWh battery, UTC.
    pub fn baseline() -> Self {
        Self {
            site: SiteConfig::default(),
            solar: SolarConfig::default(),
            battery: BatteryConfig::default(),
            load: LoadConfig::default(),
            publishing: PublishingConfig::default(),
            weather: WeatherConfig::default(),
        }
    }

    /// Returns the large-battery preset: two stacked packs with higher rate limits.
    pub fn large_battery() -> Self {
        Self {
            battery: BatteryConfig {
                capacity_kwh: 27.0,
                max_charge_rate_kw: 10.0,
                max_discharge_rate_kw: 10.0,
                initial_soc_percent: 30.0,
                ..BatteryConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Returns the cloudy-winter preset: cold, overcast, variable cloud, heavier evening load.
    pub fn cloudy_winter() -> Self {
        Self {
            load: LoadConfig {
                baseline_kw: 0.8,
                peak_evening_kw: 5.5,
                evening_peak_hour: 18,
                ..LoadConfig::default()
            },
            weather: WeatherConfig {
                base_temperature_c: 2.0,
                cloud_cover_percent: 80.0,
                humidity_percent: 85.0,
                wind_speed_ms: 6.0,
                cloud_noise_std: 8.0,
                ..WeatherConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "large_battery", "cloudy_winter"];

    /// Loads a configuration from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "large_battery" => Ok(Self::large_battery()),
            "cloudy_winter" => Ok(Self::cloudy_winter()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("config", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Resolves the configured site time zone.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the name is not a known IANA zone.
    pub fn time_zone(&self) -> Result<Tz, ConfigError> {
        Tz::from_str(&self.site.timezone).map_err(|_| {
            ConfigError::new(
                "site.timezone",
                format!("unknown time zone \"{}\"", self.site.timezone),
            )
        })
    }

    /// Wall-clock period between ticks.
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.publishing.rate_ms)
    }

    /// Simulated seconds covered by one tick.
    pub fn delta_seconds(&self) -> f64 {
        self.publishing.rate_ms as f64 / 1000.0
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.site.site_id.trim().is_empty() {
            errors.push(ConfigError::new("site.site_id", "must not be empty"));
        }
        if let Err(e) = self.time_zone() {
            errors.push(e);
        }

        let sol = &self.solar;
        if !(sol.capacity_kw >= 0.0) {
            errors.push(ConfigError::new("solar.capacity_kw", "must be >= 0"));
        }
        check_efficiency(&mut errors, "solar.panel_efficiency", sol.panel_efficiency);
        check_efficiency(&mut errors, "solar.inverter_efficiency", sol.inverter_efficiency);
        if !sol.temperature_coefficient.is_finite() {
            errors.push(ConfigError::new("solar.temperature_coefficient", "must be finite"));
        }

        let bat = &self.battery;
        if !(bat.capacity_kwh > 0.0) {
            errors.push(ConfigError::new("battery.capacity_kwh", "must be > 0"));
        }
        if !(bat.max_charge_rate_kw >= 0.0) {
            errors.push(ConfigError::new("battery.max_charge_rate_kw", "must be >= 0"));
        }
        if !(bat.max_discharge_rate_kw >= 0.0) {
            errors.push(ConfigError::new("battery.max_discharge_rate_kw", "must be >= 0"));
        }
        if !(0.0..=100.0).contains(&bat.min_soc_percent) {
            errors.push(ConfigError::new("battery.min_soc_percent", "must be in [0, 100]"));
        }
        if !(0.0..=100.0).contains(&bat.max_soc_percent) {
            errors.push(ConfigError::new("battery.max_soc_percent", "must be in [0, 100]"));
        }
        if bat.min_soc_percent > bat.max_soc_percent {
            errors.push(ConfigError::new(
                "battery.min_soc_percent",
                "must be <= battery.max_soc_percent",
            ));
        }
        if !(bat.min_soc_percent..=bat.max_soc_percent).contains(&bat.initial_soc_percent) {
            errors.push(ConfigError::new(
                "battery.initial_soc_percent",
                "must be within [battery.min_soc_percent, battery.max_soc_percent]",
            ));
        }
        check_efficiency(&mut errors, "battery.round_trip_efficiency", bat.round_trip_efficiency);

        let load = &self.load;
        if !(load.baseline_kw >= 0.0) {
            errors.push(ConfigError::new("load.baseline_kw", "must be >= 0"));
        }
        if load.morning_peak_hour > 23 {
            errors.push(ConfigError::new("load.morning_peak_hour", "must be in 0..=23"));
        }
        if load.evening_peak_hour > 23 {
            errors.push(ConfigError::new("load.evening_peak_hour", "must be in 0..=23"));
        }

        if self.publishing.rate_ms == 0 {
            errors.push(ConfigError::new("publishing.rate_ms", "must be > 0"));
        }

        let w = &self.weather;
        if w.update_interval_secs == 0 {
            errors.push(ConfigError::new("weather.update_interval_secs", "must be > 0"));
        }
        if !(0.0..=100.0).contains(&w.cloud_cover_percent) {
            errors.push(ConfigError::new("weather.cloud_cover_percent", "must be in [0, 100]"));
        }
        if !(0.0..=1.0).contains(&w.cloud_alpha) {
            errors.push(ConfigError::new("weather.cloud_alpha", "must be in [0.0, 1.0]"));
        }
        if !(w.cloud_noise_std >= 0.0) {
            errors.push(ConfigError::new("weather.cloud_noise_std", "must be >= 0"));
        }

        errors
    }
}

fn check_efficiency(errors: &mut Vec<ConfigError>, field: &str, value: f64) {
    if !(value > 0.0 && value <= 1.0) {
        errors.push(ConfigError::new(field, "must be in (0.0, 1.0]"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_preset_valid() {
        let cfg = SimulatorConfig::baseline();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "baseline should be valid: {errors:?}");
    }

    #[test]
    fn from_preset_unknown() {
        let err = SimulatorConfig::from_preset("nonexistent");
        let e = err.expect_err("unknown preset should fail");
        assert_eq!(e.field, "preset");
        assert!(e.message.contains("unknown preset"));
    }

    #[test]
    fn all_presets_are_valid() {
        for name in SimulatorConfig::PRESETS {
            let cfg = SimulatorConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[site]
site_id = "cabin-7"
timezone = "Europe/Amsterdam"
latitude = 52.37
longitude = 4.90

[solar]
capacity_kw = 6.0
panel_efficiency = 0.9
inverter_efficiency = 0.97
temperature_coefficient = -0.0035

[battery]
capacity_kwh = 10.0
max_charge_rate_kw = 5.0
max_discharge_rate_kw = 4.0
initial_soc_percent = 40.0
min_soc_percent = 5.0
max_soc_percent = 100.0
round_trip_efficiency = 0.92

[load]
baseline_kw = 0.4
peak_morning_kw = 2.0
peak_evening_kw = 3.5
morning_peak_hour = 8
evening_peak_hour = 20

[publishing]
rate_ms = 5000

[weather]
update_interval_secs = 600
cloud_cover_percent = 40.0
"#;
        let cfg = SimulatorConfig::from_toml_str(toml).expect("valid TOML should parse");
        assert_eq!(cfg.site.site_id, "cabin-7");
        assert_eq!(cfg.battery.max_discharge_rate_kw, 4.0);
        assert_eq!(cfg.load.evening_peak_hour, 20);
        assert_eq!(cfg.publishing.rate_ms, 5000);
        assert_eq!(cfg.time_zone(), Ok(chrono_tz::Europe::Amsterdam));
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[battery]
capacity_kwh = 10.0
bogus_field = true
"#;
        assert!(SimulatorConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[publishing]
rate_ms = 250
"#;
        let cfg = SimulatorConfig::from_toml_str(toml).expect("partial TOML should parse");
        assert_eq!(cfg.publishing.rate_ms, 250);
        assert_eq!(cfg.battery.capacity_kwh, 13.5);
        assert_eq!(cfg.site.site_id, "home-001");
        assert_eq!(cfg.delta_seconds(), 0.25);
        assert_eq!(cfg.tick_period(), Duration::from_millis(250));
    }

    #[test]
    fn validation_catches_inverted_soc_bounds() {
        let mut cfg = SimulatorConfig::baseline();
        cfg.battery.min_soc_percent = 80.0;
        cfg.battery.max_soc_percent = 20.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "battery.min_soc_percent"));
    }

    #[test]
    fn validation_catches_initial_soc_outside_bounds() {
        let mut cfg = SimulatorConfig::baseline();
        cfg.battery.initial_soc_percent = 99.0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "battery.initial_soc_percent"));
    }

    #[test]
    fn validation_catches_zero_efficiency() {
        let mut cfg = SimulatorConfig::baseline();
        cfg.battery.round_trip_efficiency = 0.0;
        cfg.solar.inverter_efficiency = 1.5;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "battery.round_trip_efficiency"));
        assert!(errors.iter().any(|e| e.field == "solar.inverter_efficiency"));
    }

    #[test]
    fn validation_catches_bad_peak_hour() {
        let mut cfg = SimulatorConfig::baseline();
        cfg.load.morning_peak_hour = 24;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "load.morning_peak_hour"));
    }

    #[test]
    fn validation_catches_zero_rate() {
        let mut cfg = SimulatorConfig::baseline();
        cfg.publishing.rate_ms = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "publishing.rate_ms"));
    }

    #[test]
    fn validation_catches_unknown_time_zone() {
        let mut cfg = SimulatorConfig::baseline();
        cfg.site.timezone = "Mars/Olympus_Mons".to_string();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "site.timezone"));
    }

    #[test]
    fn validation_reports_every_violation() {
        let mut cfg = SimulatorConfig::baseline();
        cfg.battery.capacity_kwh = 0.0;
        cfg.publishing.rate_ms = 0;
        cfg.weather.cloud_alpha = 2.0;
        assert_eq!(cfg.validate().len(), 3);
    }

    #[test]
    fn cloudy_winter_is_darker_than_baseline() {
        let base = SimulatorConfig::baseline();
        let winter = SimulatorConfig::cloudy_winter();
        assert!(winter.weather.cloud_cover_percent > base.weather.cloud_cover_percent);
        assert!(winter.load.peak_evening_kw > base.load.peak_evening_kw);
    }
}
