/// CSV export of telemetry snapshots.
pub mod export;
