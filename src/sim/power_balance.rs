//! Per-tick allocation of power between solar, battery, grid and load.

use serde::Serialize;

use crate::devices::Battery;

/// Grid exchange at or below this magnitude is not reported as import/export (kW).
pub const GRID_NOISE_FLOOR_KW: f64 = 0.01;

/// Power balance of one tick.
///
/// Sign conventions:
/// - `battery_power_kw`: negative = charging, positive = discharging
/// - `grid_power_kw`: negative = exporting, positive = importing
///
/// The directional flows conserve both sides exactly:
/// `solar_to_load + solar_to_battery + solar_to_grid == solar_production` and
/// `solar_to_load + battery_to_load + grid_to_load == load_consumption`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnergyFlow {
    pub solar_production_kw: f64,
    pub load_consumption_kw: f64,
    pub battery_power_kw: f64,
    pub grid_power_kw: f64,
    pub solar_to_load_kw: f64,
    pub solar_to_battery_kw: f64,
    pub solar_to_grid_kw: f64,
    pub battery_to_load_kw: f64,
    pub grid_to_load_kw: f64,
}

/// Allocates solar production against load demand with a fixed priority.
///
/// 1. Solar serves the load directly.
/// 2. Surplus is offered to [`Battery::charge`]; what it refuses goes to the grid.
/// 3. A deficit is requested from [`Battery::discharge`]; what it cannot cover
///    comes from the grid.
///
/// Exactly one battery operation runs per call, so a tick is either a charging
/// or a discharging tick. When solar exactly matches load the battery is asked
/// to charge nothing, which leaves it idle.
///
/// Grid remainders at or below [`GRID_NOISE_FLOOR_KW`] still appear in the
/// directional flows but are not reported in `grid_power_kw`.
///
/// Negative inputs are not validated here.
pub fn dispatch(
    battery: &mut Battery,
    solar_production_kw: f64,
    load_consumption_kw: f64,
    delta_seconds: f64,
) -> EnergyFlow {
    let mut flow = EnergyFlow {
        solar_production_kw,
        load_consumption_kw,
        ..EnergyFlow::default()
    };

    if solar_production_kw >= load_consumption_kw {
        let excess_kw = solar_production_kw - load_consumption_kw;
        let accepted_kw = battery.charge(excess_kw, delta_seconds);
        let export_kw = (excess_kw - accepted_kw).max(0.0);

        flow.solar_to_load_kw = load_consumption_kw;
        flow.solar_to_battery_kw = accepted_kw;
        flow.solar_to_grid_kw = export_kw;
        flow.battery_power_kw = -accepted_kw;
        if export_kw > GRID_NOISE_FLOOR_KW {
            flow.grid_power_kw = -export_kw;
        }
    } else {
        let deficit_kw = load_consumption_kw - solar_production_kw;
        let delivered_kw = battery.discharge(deficit_kw, delta_seconds);
        let import_kw = (deficit_kw - delivered_kw).max(0.0);

        flow.solar_to_load_kw = solar_production_kw;
        flow.battery_to_load_kw = delivered_kw;
        flow.grid_to_load_kw = import_kw;
        flow.battery_power_kw = delivered_kw;
        if import_kw > GRID_NOISE_FLOOR_KW {
            flow.grid_power_kw = import_kw;
        }
    }

    flow
}
