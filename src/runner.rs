//! Tick driver: serialises ticks, feeds them weather, and publishes their telemetry.

use std::time::Duration;

use chrono::TimeDelta;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::TickError;
use crate::sim::clock::{Clock, SteppedClock};
use crate::sim::engine::Engine;
use crate::telemetry::{FanOut, TelemetrySink, TelemetrySnapshot};
use crate::weather::{WeatherCell, WeatherSnapshot, WeatherSource, WeatherUpdater};

/// Where the driver is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TickState {
    Idle,
    Ticking,
}

/// Tick outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickStats {
    pub completed: u64,
    pub failed: u64,
}

/// Drives the engine on a fixed period.
///
/// Ticks never overlap: the orchestrator owns the engine and `tick` takes
/// `&mut self`. Weather arrives through a [`WeatherCell`] shared with the
/// weather task; each tick reads whichever snapshot is current.
///
/// A failed tick is logged and counted, publishes nothing, and leaves the
/// driver `Idle` for the next one. Battery changes made before the failure
/// are kept.
pub struct Orchestrator<C> {
    engine: Engine,
    clock: C,
    weather: WeatherCell,
    sinks: FanOut,
    period: Duration,
    state: TickState,
    stats: TickStats,
}

impl<C: Clock> Orchestrator<C> {
    pub fn new(engine: Engine, clock: C, weather: WeatherCell, period: Duration) -> Self {
        Self {
            engine,
            clock,
            weather,
            sinks: FanOut::new(),
            period,
            state: TickState::Idle,
            stats: TickStats::default(),
        }
    }

    /// Adds a telemetry destination.
    pub fn with_sink(mut self, sink: impl TelemetrySink + Send + 'static) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn state(&self) -> TickState {
        self.state
    }

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    /// Another handle to the weather slot the ticks read from.
    pub fn weather_handle(&self) -> WeatherCell {
        self.weather.clone()
    }

    /// Replaces the current weather. Last writer wins.
    pub fn update_weather(&self, snapshot: WeatherSnapshot) {
        self.weather.update(snapshot);
    }

    /// Runs one tick.
    ///
    /// # Errors
    ///
    /// Returns the [`TickError`] that abandoned the tick. It has already been
    /// logged and counted.
    pub fn tick(&mut self) -> Result<TelemetrySnapshot, TickError> {
        self.state = TickState::Ticking;
        let outcome = self.try_tick();
        self.state = TickState::Idle;

        match &outcome {
            Ok(_) => self.stats.completed += 1,
            Err(err) => {
                self.stats.failed += 1;
                error!(error = %err, "tick failed");
            }
        }
        outcome
    }

    fn try_tick(&mut self) -> Result<TelemetrySnapshot, TickError> {
        let now = self.clock.now();
        let weather = self.weather.latest();
        let snapshot = self
            .engine
            .step(&now, weather.as_deref(), self.period.as_secs_f64())?;
        self.sinks.publish(&snapshot)?;
        Ok(snapshot)
    }

    /// Ticks every period until `cancel` fires, flushes the sinks, then hands
    /// the orchestrator back.
    ///
    /// The first tick is immediate. A slow tick pushes the following ones
    /// back rather than bunching them up.
    pub async fn run(mut self, cancel: CancellationToken) -> Self {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(period_ms = self.period.as_millis() as u64, "simulation started");

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {
                    // Failures are already logged and counted.
                    let _ = self.tick();
                }
            }
        }
        // Logged per sink by the fan-out.
        let _ = self.sinks.flush();

        info!(
            completed = self.stats.completed,
            failed = self.stats.failed,
            "simulation stopped"
        );
        self
    }
}

impl Orchestrator<SteppedClock> {
    /// Runs `ticks` ticks back to back on simulated time.
    ///
    /// Weather is refreshed from `weather` before the first tick and then
    /// every `weather_period` of simulated time. Returns the snapshots of the
    /// ticks that succeeded.
    pub fn replay<S: WeatherSource>(
        &mut self,
        ticks: usize,
        weather: &mut WeatherUpdater<S>,
        weather_period: TimeDelta,
    ) -> Vec<TelemetrySnapshot> {
        let mut snapshots = Vec::with_capacity(ticks);
        let mut next_refresh = self.clock.peek();

        for _ in 0..ticks {
            let now = self.clock.peek();
            if now >= next_refresh {
                weather.refresh(now);
                next_refresh = now + weather_period;
            }
            if let Ok(snapshot) = self.tick() {
                snapshots.push(snapshot);
            }
        }
        snapshots
    }
}
