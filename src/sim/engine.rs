//! One tick of the physical simulation: time and weather in, telemetry out.

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use tracing::debug;

use crate::config::SimulatorConfig;
use crate::devices::{Battery, HouseholdLoad, SolarArray};
use crate::error::TickError;
use crate::telemetry::{
    BatteryTelemetry, GridTelemetry, LoadTelemetry, SolarTelemetry, TelemetrySnapshot,
};
use crate::weather::WeatherSnapshot;

use super::power_balance::dispatch;

/// Owns the site's devices and advances them one tick at a time.
///
/// The battery is the only device with memory across ticks; the array and the
/// load are recomputed from the tick inputs and only cache their last reading.
#[derive(Debug, Clone)]
pub struct Engine {
    site_id: String,
    battery: Battery,
    solar: SolarArray,
    load: HouseholdLoad,
}

impl Engine {
    pub fn new(
        site_id: impl Into<String>,
        battery: Battery,
        solar: SolarArray,
        load: HouseholdLoad,
    ) -> Self {
        Self {
            site_id: site_id.into(),
            battery,
            solar,
            load,
        }
    }

    /// Builds all devices from a configuration that has passed `validate()`.
    pub fn from_config(cfg: &SimulatorConfig) -> Self {
        Self::new(
            cfg.site.site_id.clone(),
            Battery::from_config(&cfg.battery),
            SolarArray::from_config(&cfg.solar),
            HouseholdLoad::from_config(&cfg.load),
        )
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    pub fn battery(&self) -> &Battery {
        &self.battery
    }

    pub fn solar(&self) -> &SolarArray {
        &self.solar
    }

    pub fn load(&self) -> &HouseholdLoad {
        &self.load
    }

    /// Simulates `delta_seconds` ending at `now`.
    ///
    /// The battery is mutated before the snapshot is checked; a rejected
    /// snapshot does not undo that.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::NonFinite`] if any reported value is NaN or infinite.
    pub fn step(
        &mut self,
        now: &DateTime<Tz>,
        weather: Option<&WeatherSnapshot>,
        delta_seconds: f64,
    ) -> Result<TelemetrySnapshot, TickError> {
        let solar_kw = self.solar.simulate(now, weather);
        let load_kw = self.load.consume(now.hour(), now.minute());
        let flow = dispatch(&mut self.battery, solar_kw, load_kw, delta_seconds);

        let reading = self.solar.reading();
        let snapshot = TelemetrySnapshot {
            timestamp: now.with_timezone(&Utc),
            site_id: self.site_id.clone(),
            solar: SolarTelemetry {
                production_kw: reading.production_kw,
                irradiance_w_m2: reading.irradiance_w_m2,
                panel_temp_c: reading.panel_temp_c,
            },
            battery: BatteryTelemetry {
                soc_percent: self.battery.soc_percent(),
                power_kw: self.battery.current_power_kw(),
                voltage_v: self.battery.voltage(),
                current_a: self.battery.current_a(),
            },
            load: LoadTelemetry {
                consumption_kw: self.load.consumption_kw(),
            },
            grid: GridTelemetry {
                power_kw: flow.grid_power_kw,
            },
            energy_flow: flow,
        };
        snapshot.ensure_finite()?;

        debug!(
            solar_kw = format!("{solar_kw:.2}"),
            load_kw = format!("{load_kw:.2}"),
            battery_kw = format!("{:.2}", flow.battery_power_kw),
            soc_percent = format!("{:.1}", self.battery.soc_percent()),
            grid_kw = format!("{:.2}", flow.grid_power_kw),
            "tick"
        );
        Ok(snapshot)
    }
}
