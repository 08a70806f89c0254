/// Tick time sources.
pub mod clock;
pub mod engine;
/// Energy totals over a run.
pub mod kpi;
pub mod power_balance;
