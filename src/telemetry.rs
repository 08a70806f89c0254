//! Per-tick telemetry value and the sinks it is published to.

use std::io::Write;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{SinkError, TickError};
use crate::sim::power_balance::EnergyFlow;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SolarTelemetry {
    pub production_kw: f64,
    pub irradiance_w_m2: f64,
    pub panel_temp_c: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatteryTelemetry {
    pub soc_percent: f64,
    /// Negative while charging.
    pub power_kw: f64,
    pub voltage_v: f64,
    pub current_a: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LoadTelemetry {
    pub consumption_kw: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridTelemetry {
    /// Positive = importing, negative = exporting.
    pub power_kw: f64,
}

/// Everything the site reports for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub timestamp: DateTime<Utc>,
    pub site_id: String,
    pub solar: SolarTelemetry,
    pub battery: BatteryTelemetry,
    pub load: LoadTelemetry,
    pub grid: GridTelemetry,
    pub energy_flow: EnergyFlow,
}

impl TelemetrySnapshot {
    /// Rejects snapshots carrying NaN or infinite values.
    ///
    /// # Errors
    ///
    /// Returns [`TickError::NonFinite`] naming the first offending field.
    pub fn ensure_finite(&self) -> Result<(), TickError> {
        let f = &self.energy_flow;
        let fields = [
            ("solar.production_kw", self.solar.production_kw),
            ("solar.irradiance_w_m2", self.solar.irradiance_w_m2),
            ("solar.panel_temp_c", self.solar.panel_temp_c),
            ("battery.soc_percent", self.battery.soc_percent),
            ("battery.power_kw", self.battery.power_kw),
            ("battery.voltage_v", self.battery.voltage_v),
            ("battery.current_a", self.battery.current_a),
            ("load.consumption_kw", self.load.consumption_kw),
            ("grid.power_kw", self.grid.power_kw),
            ("energy_flow.solar_to_load_kw", f.solar_to_load_kw),
            ("energy_flow.solar_to_battery_kw", f.solar_to_battery_kw),
            ("energy_flow.solar_to_grid_kw", f.solar_to_grid_kw),
            ("energy_flow.battery_to_load_kw", f.battery_to_load_kw),
            ("energy_flow.grid_to_load_kw", f.grid_to_load_kw),
        ];

        match fields.into_iter().find(|(_, v)| !v.is_finite()) {
            Some((field, value)) => Err(TickError::NonFinite { field, value }),
            None => Ok(()),
        }
    }
}

/// Destination for telemetry snapshots.
pub trait TelemetrySink {
    /// Hands one snapshot to the sink.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if the snapshot could not be written.
    fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), SinkError>;

    /// Pushes buffered output to its destination.
    ///
    /// # Errors
    ///
    /// Returns a [`SinkError`] if buffered data could not be written.
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl TelemetrySink for Vec<TelemetrySnapshot> {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), SinkError> {
        self.push(snapshot.clone());
        Ok(())
    }
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for Box<S> {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), SinkError> {
        (**self).publish(snapshot)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        (**self).flush()
    }
}

/// Publishes to several sinks.
///
/// Every sink sees every snapshot; a failure is logged and the remaining
/// sinks still run. The first error is returned.
#[derive(Default)]
pub struct FanOut {
    sinks: Vec<Box<dyn TelemetrySink + Send>>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: impl TelemetrySink + Send + 'static) {
        self.sinks.push(Box::new(sink));
    }
}

impl TelemetrySink for FanOut {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), SinkError> {
        let mut first_error = None;
        for (index, sink) in self.sinks.iter_mut().enumerate() {
            if let Err(err) = sink.publish(snapshot) {
                warn!(sink = index, error = %err, "telemetry sink rejected snapshot");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        let mut first_error = None;
        for (index, sink) in self.sinks.iter_mut().enumerate() {
            if let Err(err) = sink.flush() {
                warn!(sink = index, error = %err, "telemetry sink failed to flush");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Logs a one-line summary, at most once per `interval` of snapshot time.
#[derive(Debug, Clone)]
pub struct LogSink {
    interval: TimeDelta,
    last_logged: Option<DateTime<Utc>>,
}

impl LogSink {
    pub fn new(interval: TimeDelta) -> Self {
        Self {
            interval,
            last_logged: None,
        }
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(TimeDelta::seconds(10))
    }
}

impl TelemetrySink for LogSink {
    fn publish(&mut self, s: &TelemetrySnapshot) -> Result<(), SinkError> {
        let due = self
            .last_logged
            .is_none_or(|last| s.timestamp - last >= self.interval);
        if due {
            info!(
                site_id = %s.site_id,
                solar_kw = format!("{:.2}", s.solar.production_kw),
                load_kw = format!("{:.2}", s.load.consumption_kw),
                battery_kw = format!("{:.2}", s.battery.power_kw),
                soc_percent = format!("{:.1}", s.battery.soc_percent),
                grid_kw = format!("{:.2}", s.grid.power_kw),
                "telemetry"
            );
            self.last_logged = Some(s.timestamp);
        }
        Ok(())
    }
}

/// Writes one JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TelemetrySink for JsonLinesSink<W> {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), SinkError> {
        serde_json::to_writer(&mut self.writer, snapshot)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Hands snapshots to a sink running on a blocking thread.
///
/// Publishing only enqueues, so file writes stay off the tick path. The writer
/// drains the queue until every `ChannelSink` is dropped, flushes, and
/// returns the inner sink.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TelemetrySnapshot>,
}

impl ChannelSink {
    /// Moves `sink` onto a blocking thread. Must be called inside a tokio runtime.
    pub fn spawn<S>(mut sink: S) -> (Self, JoinHandle<S>)
    where
        S: TelemetrySink + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<TelemetrySnapshot>();
        let writer = tokio::task::spawn_blocking(move || {
            while let Some(snapshot) = rx.blocking_recv() {
                if let Err(err) = sink.publish(&snapshot) {
                    warn!(error = %err, timestamp = %snapshot.timestamp, "telemetry writer dropped snapshot");
                }
            }
            if let Err(err) = sink.flush() {
                warn!(error = %err, "telemetry writer failed to flush");
            }
            sink
        });
        (Self { tx }, writer)
    }
}

impl TelemetrySink for ChannelSink {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), SinkError> {
        self.tx
            .send(snapshot.clone())
            .map_err(|_| SinkError::Closed)
    }
}

/// Keeps the most recent snapshot for readers such as the HTTP API.
///
/// Clones share the same slot.
#[derive(Debug, Clone)]
pub struct LatestSnapshot {
    slot: Arc<watch::Sender<Option<Arc<TelemetrySnapshot>>>>,
}

impl Default for LatestSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl LatestSnapshot {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { slot: Arc::new(tx) }
    }

    /// The last published snapshot, if any tick has completed.
    pub fn latest(&self) -> Option<Arc<TelemetrySnapshot>> {
        self.slot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<TelemetrySnapshot>>> {
        self.slot.subscribe()
    }
}

impl TelemetrySink for LatestSnapshot {
    fn publish(&mut self, snapshot: &TelemetrySnapshot) -> Result<(), SinkError> {
        self.slot.send_replace(Some(Arc::new(snapshot.clone())));
        Ok(())
    }
}
