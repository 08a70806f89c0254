use chrono::{DateTime, Timelike};
use chrono_tz::Tz;

use crate::config::SolarConfig;
use crate::weather::{DEFAULT_AMBIENT_C, WeatherSnapshot};

/// Standard test condition irradiance (W/m²).
pub const STC_IRRADIANCE_W_M2: f64 = 1000.0;
/// Standard test condition cell temperature (°C).
pub const STC_TEMPERATURE_C: f64 = 25.0;
/// Panel heating above ambient at full sun (°C).
const FULL_SUN_HEATING_C: f64 = 25.0;
/// Clear-sky irradiance at solar noon (W/m²).
pub const MAX_IRRADIANCE_W_M2: f64 = 1000.0;
/// Fraction of irradiance removed by complete cloud cover.
const MAX_CLOUD_ATTENUATION: f64 = 0.75;

pub const DEFAULT_SUNRISE_HOUR: u32 = 6;
pub const DEFAULT_SUNSET_HOUR: u32 = 18;

/// Immutable array parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolarParams {
    /// Nameplate capacity in kilowatts at standard test conditions.
    pub capacity_kw: f64,
    /// Panel efficiency factor.
    pub panel_efficiency: f64,
    /// Inverter efficiency.
    pub inverter_efficiency: f64,
    /// Output change per °C of panel temperature above 25 °C.
    pub temperature_coefficient: f64,
}

impl From<&SolarConfig> for SolarParams {
    fn from(cfg: &SolarConfig) -> Self {
        Self {
            capacity_kw: cfg.capacity_kw,
            panel_efficiency: cfg.panel_efficiency,
            inverter_efficiency: cfg.inverter_efficiency,
            temperature_coefficient: cfg.temperature_coefficient,
        }
    }
}

/// Last computed array output.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SolarReading {
    pub production_kw: f64,
    pub irradiance_w_m2: f64,
    pub panel_temp_c: f64,
}

/// A solar PV array whose output follows irradiance and panel temperature.
///
/// `SolarArray` is a pure function of its inputs; it only remembers the last
/// [`SolarReading`] so telemetry can report it.
#[derive(Debug, Clone)]
pub struct SolarArray {
    params: SolarParams,
    reading: SolarReading,
}

impl SolarArray {
    pub fn new(params: SolarParams) -> Self {
        Self {
            params,
            reading: SolarReading::default(),
        }
    }

    pub fn from_config(cfg: &SolarConfig) -> Self {
        Self::new(SolarParams::from(cfg))
    }

    pub fn params(&self) -> &SolarParams {
        &self.params
    }

    pub fn reading(&self) -> SolarReading {
        self.reading
    }

    /// Computes AC output (kW) for the given plane irradiance and ambient temperature.
    ///
    /// Panel temperature rises 25 °C above ambient at 1000 W/m². Output is
    /// derated linearly around 25 °C and floored at zero.
    pub fn produce(&mut self, irradiance_w_m2: f64, ambient_temp_c: f64) -> f64 {
        let p = &self.params;
        let panel_temp_c =
            ambient_temp_c + (irradiance_w_m2 / STC_IRRADIANCE_W_M2) * FULL_SUN_HEATING_C;
        let deration = 1.0 + p.temperature_coefficient * (panel_temp_c - STC_TEMPERATURE_C);
        let production_kw = p.capacity_kw
            * (irradiance_w_m2 / STC_IRRADIANCE_W_M2)
            * p.panel_efficiency
            * p.inverter_efficiency
            * deration;

        self.reading = SolarReading {
            production_kw: production_kw.max(0.0),
            irradiance_w_m2,
            panel_temp_c,
        };
        self.reading.production_kw
    }

    /// Produces for the local time `now` under `weather`.
    ///
    /// Without weather the array sees clear sky at 25 °C between 06:00 and 18:00.
    pub fn simulate(&mut self, now: &DateTime<Tz>, weather: Option<&WeatherSnapshot>) -> f64 {
        let tz = now.timezone();
        let (sunrise_hour, sunset_hour) = weather
            .and_then(|w| Some((w.sunrise?, w.sunset?)))
            .map_or((DEFAULT_SUNRISE_HOUR, DEFAULT_SUNSET_HOUR), |(rise, set)| {
                (
                    rise.with_timezone(&tz).hour(),
                    set.with_timezone(&tz).hour(),
                )
            });

        let hour_decimal = f64::from(now.hour()) + f64::from(now.minute()) / 60.0;
        let clear_sky = theoretical_irradiance(hour_decimal, sunrise_hour, sunset_hour);
        let cloud_cover = weather.map_or(0.0, |w| w.cloud_cover_percent);
        let ambient_c = weather.map_or(DEFAULT_AMBIENT_C, |w| w.temperature_c);

        self.produce(cloud_adjusted_irradiance(clear_sky, cloud_cover), ambient_c)
    }
}

/// Clear-sky irradiance for a decimal hour of day.
///
/// Zero outside `[sunrise_hour, sunset_hour]`, a half sine peaking at
/// [`MAX_IRRADIANCE_W_M2`] midway between them. A window that is empty or
/// inverted yields zero.
pub fn theoretical_irradiance(hour_decimal: f64, sunrise_hour: u32, sunset_hour: u32) -> f64 {
    let sunrise = f64::from(sunrise_hour);
    let sunset = f64::from(sunset_hour);
    if sunset <= sunrise || hour_decimal < sunrise || hour_decimal > sunset {
        return 0.0;
    }

    let day_position = (hour_decimal - sunrise) / (sunset - sunrise);
    (MAX_IRRADIANCE_W_M2 * (std::f64::consts::PI * day_position).sin()).max(0.0)
}

/// Scales irradiance down by up to 75% at full cloud cover.
///
/// Cloud cover is clamped to 0–100%.
pub fn cloud_adjusted_irradiance(theoretical_w_m2: f64, cloud_cover_percent: f64) -> f64 {
    let cover = cloud_cover_percent.clamp(0.0, 100.0);
    theoretical_w_m2 * (1.0 - cover / 100.0 * MAX_CLOUD_ATTENUATION)
}
