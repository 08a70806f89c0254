//! Shared test fixtures for integration tests.

use chrono::{DateTime, TimeDelta, TimeZone};
use chrono_tz::Tz;

use helios_sim::config::SimulatorConfig;
use helios_sim::runner::{Orchestrator, TickStats};
use helios_sim::sim::clock::SteppedClock;
use helios_sim::sim::engine::Engine;
use helios_sim::telemetry::TelemetrySnapshot;
use helios_sim::weather::{SyntheticWeather, WeatherCell, WeatherUpdater};

/// Local midnight on a summer day in the configured zone.
pub fn summer_midnight(cfg: &SimulatorConfig) -> DateTime<Tz> {
    let tz = cfg.time_zone().expect("fixture zone should parse");
    tz.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap()
}

/// Stepped-clock orchestrator over `cfg`, starting at local summer midnight.
pub fn orchestrator(cfg: &SimulatorConfig, step: TimeDelta) -> Orchestrator<SteppedClock> {
    Orchestrator::new(
        Engine::from_config(cfg),
        SteppedClock::new(summer_midnight(cfg), step),
        WeatherCell::new(),
        step.to_std().unwrap(),
    )
}

/// Replays one day in `step`-sized ticks with synthetic weather.
pub fn replay_day(cfg: &SimulatorConfig, step: TimeDelta) -> (Vec<TelemetrySnapshot>, TickStats) {
    let mut orch = orchestrator(cfg, step);
    let mut updater = WeatherUpdater::new(
        SyntheticWeather::new(&cfg.weather),
        SyntheticWeather::new(&cfg.weather),
        orch.weather_handle(),
    );
    let ticks = (TimeDelta::days(1).num_seconds() / step.num_seconds()) as usize;
    let snapshots = orch.replay(
        ticks,
        &mut updater,
        TimeDelta::seconds(cfg.weather.update_interval_secs as i64),
    );
    (snapshots, orch.stats())
}

/// Asserts the directional flows balance both the solar and the load side.
pub fn assert_conserves(s: &TelemetrySnapshot) {
    let f = &s.energy_flow;
    let solar_side = f.solar_to_load_kw + f.solar_to_battery_kw + f.solar_to_grid_kw;
    let load_side = f.solar_to_load_kw + f.battery_to_load_kw + f.grid_to_load_kw;
    assert!(
        (solar_side - s.solar.production_kw).abs() < 1e-6,
        "solar side unbalanced at {}: {solar_side} vs {}",
        s.timestamp,
        s.solar.production_kw
    );
    assert!(
        (load_side - s.load.consumption_kw).abs() < 1e-6,
        "load side unbalanced at {}: {load_side} vs {}",
        s.timestamp,
        s.load.consumption_kw
    );
}
