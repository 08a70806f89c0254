//! Residential solar-plus-storage energy balance simulator.
//!
//! A solar array, a battery and a household load share one grid tie. Each
//! tick the [`sim::engine::Engine`] turns the local time and the latest
//! weather into production and consumption, allocates power with
//! [`sim::power_balance::dispatch`], and emits a
//! [`telemetry::TelemetrySnapshot`]. The [`runner::Orchestrator`] drives ticks
//! in real time or replays simulated time.

#[cfg(feature = "api")]
pub mod api;
pub mod cli;
pub mod config;
pub mod devices;
pub mod error;
pub mod io;
pub mod runner;
/// Simulation engine, dispatch, clocks and reporting.
pub mod sim;
pub mod telemetry;
pub mod weather;
