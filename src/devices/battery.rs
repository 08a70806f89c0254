use tracing::info;

use crate::config::BatteryConfig;

/// Terminal voltage at 0% state of charge (V).
const VOLTAGE_EMPTY_V: f64 = 48.0;
/// Voltage gained between 0% and 100% state of charge (V).
const VOLTAGE_SPAN_V: f64 = 6.0;
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Immutable battery parameters, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryParams {
    /// Rated capacity in kilowatt-hours.
    pub capacity_kwh: f64,
    /// Maximum charging power in kilowatts (positive value).
    pub max_charge_rate_kw: f64,
    /// Maximum discharging power in kilowatts (positive value).
    pub max_discharge_rate_kw: f64,
    /// Lowest permitted state of charge (%).
    pub min_soc_percent: f64,
    /// Highest permitted state of charge (%).
    pub max_soc_percent: f64,
    /// Fraction of charging energy that ends up stored (0..1.0].
    pub round_trip_efficiency: f64,
}

impl From<&BatteryConfig> for BatteryParams {
    fn from(cfg: &BatteryConfig) -> Self {
        Self {
            capacity_kwh: cfg.capacity_kwh,
            max_charge_rate_kw: cfg.max_charge_rate_kw,
            max_discharge_rate_kw: cfg.max_discharge_rate_kw,
            min_soc_percent: cfg.min_soc_percent,
            max_soc_percent: cfg.max_soc_percent,
            round_trip_efficiency: cfg.round_trip_efficiency,
        }
    }
}

/// A battery energy storage system that can charge and discharge electricity.
///
/// `Battery` keeps its state of charge (SOC) within
/// `[min_soc_percent, max_soc_percent]` after every operation. Requests are
/// clamped rather than rejected: a request that would overshoot a bound is cut
/// back to exactly reach it and the accepted power is back-solved.
///
/// # Power Convention
/// - Negative `current_power_kw`: charging
/// - Positive `current_power_kw`: discharging
///
/// The round-trip efficiency loss is applied once, on the charge path.
/// Discharge converts stored energy to output power one-to-one.
#[derive(Debug, Clone)]
pub struct Battery {
    params: BatteryParams,
    soc_percent: f64,
    current_power_kw: f64,
}

impl Battery {
    /// Creates a new battery at the given state of charge.
    ///
    /// # Panics
    ///
    /// Panics if capacity is not positive, rates are negative, the SOC bounds
    /// are inverted or outside 0–100, the efficiency is outside (0, 1], or
    /// `initial_soc_percent` lies outside the bounds.
    pub fn new(params: BatteryParams, initial_soc_percent: f64) -> Self {
        assert!(params.capacity_kwh > 0.0);
        assert!(params.max_charge_rate_kw >= 0.0 && params.max_discharge_rate_kw >= 0.0);
        assert!(
            0.0 <= params.min_soc_percent
                && params.min_soc_percent <= params.max_soc_percent
                && params.max_soc_percent <= 100.0
        );
        assert!(params.round_trip_efficiency > 0.0 && params.round_trip_efficiency <= 1.0);
        assert!((params.min_soc_percent..=params.max_soc_percent).contains(&initial_soc_percent));

        Self {
            params,
            soc_percent: initial_soc_percent,
            current_power_kw: 0.0,
        }
    }

    /// Builds the battery from validated configuration.
    pub fn from_config(cfg: &BatteryConfig) -> Self {
        let battery = Self::new(BatteryParams::from(cfg), cfg.initial_soc_percent);
        info!(
            soc_percent = cfg.initial_soc_percent,
            capacity_kwh = cfg.capacity_kwh,
            "battery initialised"
        );
        battery
    }

    pub fn params(&self) -> &BatteryParams {
        &self.params
    }

    /// Current state of charge (%).
    pub fn soc_percent(&self) -> f64 {
        self.soc_percent
    }

    /// Power flow of the last operation (kW; negative = charging).
    pub fn current_power_kw(&self) -> f64 {
        self.current_power_kw
    }

    /// Offers `requested_kw` of charging power for `delta_seconds`.
    ///
    /// Returns the power actually accepted, `0 <= accepted <= requested`.
    /// Negative, NaN or zero requests and non-positive or non-finite
    /// intervals leave the battery idle.
    pub fn charge(&mut self, requested_kw: f64, delta_seconds: f64) -> f64 {
        if self.soc_percent >= self.params.max_soc_percent
            || requested_kw.is_nan()
            || requested_kw <= 0.0
            || !delta_seconds.is_finite()
            || delta_seconds <= 0.0
        {
            return self.idle();
        }

        let hours = delta_seconds / SECONDS_PER_HOUR;
        let efficiency = self.params.round_trip_efficiency;
        let mut power_kw = requested_kw.min(self.params.max_charge_rate_kw);
        let soc_increase = power_kw * hours * efficiency / self.params.capacity_kwh * 100.0;

        if self.soc_percent + soc_increase > self.params.max_soc_percent {
            let headroom = self.params.max_soc_percent - self.soc_percent;
            power_kw = headroom / 100.0 * self.params.capacity_kwh / hours / efficiency;
            self.soc_percent = self.params.max_soc_percent;
        } else {
            self.soc_percent += soc_increase;
        }

        self.current_power_kw = -power_kw;
        power_kw
    }

    /// Requests `requested_kw` of discharge power for `delta_seconds`.
    ///
    /// Returns the power actually delivered, `0 <= delivered <= requested`.
    pub fn discharge(&mut self, requested_kw: f64, delta_seconds: f64) -> f64 {
        if self.soc_percent <= self.params.min_soc_percent
            || requested_kw.is_nan()
            || requested_kw <= 0.0
            || !delta_seconds.is_finite()
            || delta_seconds <= 0.0
        {
            return self.idle();
        }

        let hours = delta_seconds / SECONDS_PER_HOUR;
        let mut power_kw = requested_kw.min(self.params.max_discharge_rate_kw);
        let soc_decrease = power_kw * hours / self.params.capacity_kwh * 100.0;

        if self.soc_percent - soc_decrease < self.params.min_soc_percent {
            let available = self.soc_percent - self.params.min_soc_percent;
            power_kw = available / 100.0 * self.params.capacity_kwh / hours;
            self.soc_percent = self.params.min_soc_percent;
        } else {
            self.soc_percent -= soc_decrease;
        }

        self.current_power_kw = power_kw;
        power_kw
    }

    /// Terminal voltage, linear in SOC between 48 V and 54 V.
    pub fn voltage(&self) -> f64 {
        VOLTAGE_EMPTY_V + (self.soc_percent / 100.0) * VOLTAGE_SPAN_V
    }

    /// Terminal current in amperes, same sign as `current_power_kw`.
    pub fn current_a(&self) -> f64 {
        let voltage = self.voltage();
        if voltage > 0.0 {
            self.current_power_kw * 1000.0 / voltage
        } else {
            0.0
        }
    }

    fn idle(&mut self) -> f64 {
        self.current_power_kw = 0.0;
        0.0
    }
}
