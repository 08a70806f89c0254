//! Weather input: the shared snapshot slot, a synthetic source and the refresh task.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::WeatherConfig;
use crate::error::WeatherError;

/// Ambient temperature assumed when no weather has arrived yet (°C).
pub const DEFAULT_AMBIENT_C: f64 = 25.0;

/// One weather observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub timestamp: DateTime<Utc>,
    pub temperature_c: f64,
    pub cloud_cover_percent: f64,
    pub humidity_percent: f64,
    pub wind_speed_ms: f64,
    pub description: String,
    pub sunrise: Option<DateTime<Utc>>,
    pub sunset: Option<DateTime<Utc>>,
}

/// Single-slot holder of the most recent weather snapshot.
///
/// Writers replace the whole snapshot atomically (last writer wins); readers
/// get a shared handle to whichever complete snapshot is current. Cloning the
/// cell yields another handle to the same slot.
#[derive(Debug, Clone)]
pub struct WeatherCell {
    slot: Arc<watch::Sender<Option<Arc<WeatherSnapshot>>>>,
}

impl Default for WeatherCell {
    fn default() -> Self {
        Self::new()
    }
}

impl WeatherCell {
    /// Creates an empty cell; readers see `None` until the first update.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { slot: Arc::new(tx) }
    }

    /// Replaces the current snapshot.
    pub fn update(&self, snapshot: WeatherSnapshot) {
        info!(
            temperature_c = format!("{:.1}", snapshot.temperature_c),
            cloud_cover_percent = format!("{:.0}", snapshot.cloud_cover_percent),
            "weather updated"
        );
        self.slot.send_replace(Some(Arc::new(snapshot)));
    }

    /// The most recent snapshot, if any has arrived.
    pub fn latest(&self) -> Option<Arc<WeatherSnapshot>> {
        self.slot.borrow().clone()
    }

    /// Receiver that is notified on every update.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<WeatherSnapshot>>> {
        self.slot.subscribe()
    }
}

/// Something that can produce a weather observation for a given local time.
pub trait WeatherSource {
    /// Fetches the current weather.
    ///
    /// # Errors
    ///
    /// Returns a `WeatherError` when no observation is available.
    fn fetch(&mut self, now: DateTime<Tz>) -> Result<WeatherSnapshot, WeatherError>;
}

/// Synthetic weather that needs no network access.
///
/// Temperature follows a daily sine around the configured mean (coolest at
/// 00:00, warmest at 12:00), the sun rises at 06:00 and sets at 18:00 local
/// time, and cloud cover evolves as an AR(1) process around its mean:
///
/// ```text
/// c(t) = alpha * c(t-1) + (1 - alpha) * mean + epsilon(t)
/// ```
///
/// clamped to \[0, 100\]. With zero noise the cover stays at the mean.
#[derive(Debug, Clone)]
pub struct SyntheticWeather {
    base_temperature_c: f64,
    mean_cloud_cover: f64,
    humidity_percent: f64,
    wind_speed_ms: f64,
    alpha: f64,
    noise_std: f64,
    cloud_cover: f64,
    rng: StdRng,
}

/// Daily temperature swing around the mean (°C).
const TEMPERATURE_SWING_C: f64 = 5.0;

impl SyntheticWeather {
    pub fn new(cfg: &WeatherConfig) -> Self {
        Self {
            base_temperature_c: cfg.base_temperature_c,
            mean_cloud_cover: cfg.cloud_cover_percent,
            humidity_percent: cfg.humidity_percent,
            wind_speed_ms: cfg.wind_speed_ms,
            alpha: cfg.cloud_alpha,
            noise_std: cfg.cloud_noise_std.max(0.0),
            cloud_cover: cfg.cloud_cover_percent,
            rng: StdRng::seed_from_u64(cfg.seed),
        }
    }

    /// Generates the observation for `now`, advancing the cloud process one step.
    pub fn snapshot_at(&mut self, now: DateTime<Tz>) -> WeatherSnapshot {
        let hour = f64::from(now.hour()) + f64::from(now.minute()) / 60.0;
        let temperature_c = self.base_temperature_c
            + TEMPERATURE_SWING_C * ((hour - 6.0) * std::f64::consts::PI / 12.0).sin();

        self.cloud_cover = (self.alpha * self.cloud_cover
            + (1.0 - self.alpha) * self.mean_cloud_cover
            + gaussian_noise(&mut self.rng, self.noise_std))
        .clamp(0.0, 100.0);

        WeatherSnapshot {
            timestamp: now.with_timezone(&Utc),
            temperature_c,
            cloud_cover_percent: self.cloud_cover,
            humidity_percent: self.humidity_percent,
            wind_speed_ms: self.wind_speed_ms,
            description: "synthetic weather".to_string(),
            sunrise: local_instant(now, 6),
            sunset: local_instant(now, 18),
        }
    }
}

impl WeatherSource for SyntheticWeather {
    fn fetch(&mut self, now: DateTime<Tz>) -> Result<WeatherSnapshot, WeatherError> {
        Ok(self.snapshot_at(now))
    }
}

/// `hour:00` on the local date of `now`, or `None` inside a DST gap.
fn local_instant(now: DateTime<Tz>, hour: u32) -> Option<DateTime<Utc>> {
    let naive = now.date_naive().and_time(NaiveTime::from_hms_opt(hour, 0, 0)?);
    now.timezone()
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
}

/// Gaussian noise via the Box-Muller transform.
fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

/// Periodically refreshes a [`WeatherCell`] from a source.
///
/// A failing source is logged and replaced by the synthetic fallback for that
/// refresh, so the cell always receives a value.
pub struct WeatherUpdater<S> {
    source: S,
    fallback: SyntheticWeather,
    cell: WeatherCell,
}

impl<S: WeatherSource> WeatherUpdater<S> {
    pub fn new(source: S, fallback: SyntheticWeather, cell: WeatherCell) -> Self {
        Self {
            source,
            fallback,
            cell,
        }
    }

    /// Fetches once and publishes the result (or the fallback) to the cell.
    pub fn refresh(&mut self, now: DateTime<Tz>) {
        let snapshot = match self.source.fetch(now) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "weather fetch failed, using synthetic weather");
                self.fallback.snapshot_at(now)
            }
        };
        self.cell.update(snapshot);
    }

    /// Refreshes every `period` until `cancel` fires. The first refresh is immediate.
    pub async fn run(mut self, tz: Tz, period: Duration, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(period);
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = interval.tick() => self.refresh(Utc::now().with_timezone(&tz)),
            }
        }
        info!("weather updates stopped");
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    struct Offline;

    impl WeatherSource for Offline {
        fn fetch(&mut self, _now: DateTime<Tz>) -> Result<WeatherSnapshot, WeatherError> {
            Err(WeatherError::Unavailable("no route to host".to_string()))
        }
    }

    fn noon() -> DateTime<Tz> {
        chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2024, 6, 15, 12, 0, 0)
            .unwrap()
    }

    #[test]
    fn cell_starts_empty_and_keeps_last_write() {
        let cell = WeatherCell::new();
        assert!(cell.latest().is_none());

        let mut synthetic = SyntheticWeather::new(&WeatherConfig::default());
        let first = synthetic.snapshot_at(noon());
        let mut second = first.clone();
        second.temperature_c = -3.0;

        cell.update(first);
        let reader = cell.clone();
        cell.update(second);
        assert_eq!(reader.latest().map(|w| w.temperature_c), Some(-3.0));
    }

    #[test]
    fn synthetic_weather_follows_daily_shape() {
        let mut synthetic = SyntheticWeather::new(&WeatherConfig::default());
        let at_noon = synthetic.snapshot_at(noon());
        assert_abs_diff_eq!(at_noon.temperature_c, 25.0, epsilon = 1e-9);
        assert_abs_diff_eq!(at_noon.cloud_cover_percent, 25.0, epsilon = 1e-9);

        let tz = chrono_tz::Europe::Berlin;
        let sunrise = at_noon.sunrise.map(|t| t.with_timezone(&tz).hour());
        let sunset = at_noon.sunset.map(|t| t.with_timezone(&tz).hour());
        assert_eq!(sunrise, Some(6));
        assert_eq!(sunset, Some(18));
    }

    #[test]
    fn noisy_cloud_cover_stays_in_range_and_is_reproducible() {
        let cfg = WeatherConfig {
            cloud_noise_std: 40.0,
            ..WeatherConfig::default()
        };
        let mut a = SyntheticWeather::new(&cfg);
        let mut b = SyntheticWeather::new(&cfg);
        for _ in 0..200 {
            let wa = a.snapshot_at(noon());
            let wb = b.snapshot_at(noon());
            assert!((0.0..=100.0).contains(&wa.cloud_cover_percent));
            assert_eq!(wa.cloud_cover_percent, wb.cloud_cover_percent);
        }
    }

    #[test]
    fn failing_source_falls_back_to_synthetic() {
        let cell = WeatherCell::new();
        let fallback = SyntheticWeather::new(&WeatherConfig::default());
        let mut updater = WeatherUpdater::new(Offline, fallback, cell.clone());

        updater.refresh(noon());

        let latest = cell.latest().expect("fallback should be published");
        assert_eq!(latest.description, "synthetic weather");
    }

    #[tokio::test(start_paused = true)]
    async fn updater_refreshes_until_cancelled() {
        let cell = WeatherCell::new();
        let mut rx = cell.subscribe();
        let updater = WeatherUpdater::new(
            SyntheticWeather::new(&WeatherConfig::default()),
            SyntheticWeather::new(&WeatherConfig::default()),
            cell.clone(),
        );
        let cancel = CancellationToken::new();
        let task = tokio::spawn(updater.run(
            chrono_tz::UTC,
            Duration::from_secs(900),
            cancel.clone(),
        ));

        rx.changed().await.expect("first refresh is immediate");
        assert!(cell.latest().is_some());

        cancel.cancel();
        task.await.expect("weather task should stop cleanly");
    }
}
