//! Post-hoc energy totals from a run's telemetry.

use std::fmt;

use serde::Serialize;

use crate::telemetry::TelemetrySnapshot;

/// Energy totals and battery range over a sequence of ticks.
///
/// Computed from the published snapshots so the report always agrees with
/// the exported telemetry.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnergyReport {
    pub ticks: usize,
    /// Solar energy produced (kWh).
    pub solar_kwh: f64,
    /// Household energy consumed (kWh).
    pub load_kwh: f64,
    /// Energy drawn from the grid (kWh).
    pub import_kwh: f64,
    /// Energy fed into the grid (kWh).
    pub export_kwh: f64,
    /// Energy accepted by the battery (kWh).
    pub battery_charge_kwh: f64,
    /// Energy delivered by the battery (kWh).
    pub battery_discharge_kwh: f64,
    /// Peak grid import (kW).
    pub peak_import_kw: f64,
    pub min_soc_percent: f64,
    pub max_soc_percent: f64,
    pub final_soc_percent: f64,
}

impl EnergyReport {
    /// Integrates the snapshots, each held for `dt_hours`.
    ///
    /// Grid totals use the reported `grid.power_kw`, so exchanges under the
    /// noise floor are not counted.
    pub fn from_snapshots(snapshots: &[TelemetrySnapshot], dt_hours: f64) -> Self {
        let Some(last) = snapshots.last() else {
            return Self::default();
        };

        let mut report = Self {
            ticks: snapshots.len(),
            min_soc_percent: f64::INFINITY,
            max_soc_percent: f64::NEG_INFINITY,
            final_soc_percent: last.battery.soc_percent,
            ..Self::default()
        };

        for s in snapshots {
            let f = &s.energy_flow;
            report.solar_kwh += s.solar.production_kw * dt_hours;
            report.load_kwh += s.load.consumption_kw * dt_hours;
            report.import_kwh += s.grid.power_kw.max(0.0) * dt_hours;
            report.export_kwh += (-s.grid.power_kw).max(0.0) * dt_hours;
            report.battery_charge_kwh += f.solar_to_battery_kw * dt_hours;
            report.battery_discharge_kwh += f.battery_to_load_kw * dt_hours;
            report.peak_import_kw = report.peak_import_kw.max(s.grid.power_kw);
            report.min_soc_percent = report.min_soc_percent.min(s.battery.soc_percent);
            report.max_soc_percent = report.max_soc_percent.max(s.battery.soc_percent);
        }

        report
    }

    /// Share of consumption not met from the grid (%).
    pub fn self_sufficiency_percent(&self) -> f64 {
        if self.load_kwh > 0.0 {
            (100.0 * (1.0 - self.import_kwh / self.load_kwh)).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

impl fmt::Display for EnergyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- Energy Report ({} ticks) ---", self.ticks)?;
        writeln!(f, "Solar produced:     {:.2} kWh", self.solar_kwh)?;
        writeln!(f, "Load consumed:      {:.2} kWh", self.load_kwh)?;
        writeln!(
            f,
            "Grid import:        {:.2} kWh (peak {:.2} kW)",
            self.import_kwh, self.peak_import_kw
        )?;
        writeln!(f, "Grid export:        {:.2} kWh", self.export_kwh)?;
        writeln!(
            f,
            "Battery in/out:     {:.2} / {:.2} kWh",
            self.battery_charge_kwh, self.battery_discharge_kwh
        )?;
        writeln!(f, "Self-sufficiency:   {:.1}%", self.self_sufficiency_percent())?;
        write!(
            f,
            "SOC range:          {:.1}% .. {:.1}% (final {:.1}%)",
            self.min_soc_percent, self.max_soc_percent, self.final_soc_percent
        )
    }
}
