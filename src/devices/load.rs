use crate::config::LoadConfig;

/// Width of the morning Gaussian bump (hours).
const MORNING_PEAK_WIDTH_H: f64 = 1.5;
/// Width of the evening Gaussian bump (hours).
const EVENING_PEAK_WIDTH_H: f64 = 2.0;

/// Immutable load profile parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadParams {
    pub baseline_kw: f64,
    pub peak_morning_kw: f64,
    pub peak_evening_kw: f64,
    pub morning_peak_hour: u32,
    pub evening_peak_hour: u32,
}

impl From<&LoadConfig> for LoadParams {
    fn from(cfg: &LoadConfig) -> Self {
        Self {
            baseline_kw: cfg.baseline_kw,
            peak_morning_kw: cfg.peak_morning_kw,
            peak_evening_kw: cfg.peak_evening_kw,
            morning_peak_hour: cfg.morning_peak_hour,
            evening_peak_hour: cfg.evening_peak_hour,
        }
    }
}

/// A household load that models daily consumption with morning and evening peaks.
///
/// Consumption is the baseline plus two independent Gaussian bumps centred on
/// the configured peak hours, measured the short way around the clock so a
/// peak at 23:00 also lifts 01:00.
///
/// # Examples
///
/// ```
/// use helios_sim::devices::load::{HouseholdLoad, LoadParams};
///
/// let mut load = HouseholdLoad::new(LoadParams {
///     baseline_kw: 0.5,
///     peak_morning_kw: 2.5,
///     peak_evening_kw: 4.0,
///     morning_peak_hour: 7,
///     evening_peak_hour: 19,
/// });
///
/// let evening = load.consume(19, 0);
/// assert!(evening > 3.9);
/// ```
#[derive(Debug, Clone)]
pub struct HouseholdLoad {
    params: LoadParams,
    consumption_kw: f64,
}

impl HouseholdLoad {
    pub fn new(params: LoadParams) -> Self {
        Self {
            params,
            consumption_kw: 0.0,
        }
    }

    pub fn from_config(cfg: &LoadConfig) -> Self {
        Self::new(LoadParams::from(cfg))
    }

    pub fn params(&self) -> &LoadParams {
        &self.params
    }

    /// Last computed consumption (kW).
    pub fn consumption_kw(&self) -> f64 {
        self.consumption_kw
    }

    /// Calculates consumption at `hour:minute` local time.
    ///
    /// The profile is sampled on whole hours, so it is flat within an hour.
    pub fn consume(&mut self, hour: u32, _minute: u32) -> f64 {
        let p = &self.params;
        let hour = f64::from(hour);

        let morning = peak_factor(hour, p.morning_peak_hour, MORNING_PEAK_WIDTH_H);
        let evening = peak_factor(hour, p.evening_peak_hour, EVENING_PEAK_WIDTH_H);

        self.consumption_kw = p.baseline_kw
            + morning * (p.peak_morning_kw - p.baseline_kw)
            + evening * (p.peak_evening_kw - p.baseline_kw);
        self.consumption_kw
    }
}

/// Distance in hours between two times of day, taking the shorter way round.
///
/// Always within `[0, 12]`.
pub fn circular_hour_distance(a: f64, b: f64) -> f64 {
    let delta = (a - b).abs() % 24.0;
    if delta > 12.0 { 24.0 - delta } else { delta }
}

fn peak_factor(hour: f64, peak_hour: u32, width_h: f64) -> f64 {
    let distance = circular_hour_distance(hour, f64::from(peak_hour));
    (-(distance / width_h).powi(2)).exp()
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn profile(morning: u32, evening: u32) -> HouseholdLoad {
        HouseholdLoad::new(LoadParams {
            baseline_kw: 0.5,
            peak_morning_kw: 2.5,
            peak_evening_kw: 4.0,
            morning_peak_hour: morning,
            evening_peak_hour: evening,
        })
    }

    #[test]
    fn test_circular_distance() {
        assert_eq!(circular_hour_distance(7.0, 7.0), 0.0);
        assert_eq!(circular_hour_distance(1.0, 23.0), 2.0);
        assert_eq!(circular_hour_distance(23.0, 1.0), 2.0);
        assert_eq!(circular_hour_distance(0.0, 12.0), 12.0);
        assert_eq!(circular_hour_distance(3.0, 16.0), 11.0);
    }

    #[test]
    fn test_baseline_far_from_peaks() {
        let mut load = profile(8, 18);
        // 01:00 is 7 h from both peaks
        let kw = load.consume(1, 0);
        assert_abs_diff_eq!(kw, 0.5, epsilon = 1e-4);
        assert_eq!(load.consumption_kw(), kw);
    }

    #[test]
    fn test_peaks_reach_configured_values() {
        let mut load = profile(7, 19);
        // Evening bump is ~0 at 07:00 (12 h away) and vice versa.
        assert_abs_diff_eq!(load.consume(7, 0), 2.5, epsilon = 1e-3);
        assert_abs_diff_eq!(load.consume(19, 0), 4.0, epsilon = 1e-3);
    }

    #[test]
    fn test_wraps_around_midnight() {
        let mut load = profile(7, 23);
        let after_midnight = load.consume(1, 0);
        let before_midnight = load.consume(21, 0);
        assert_abs_diff_eq!(after_midnight, before_midnight, epsilon = 1e-6);
        assert!(after_midnight > 0.5 + 1.0);
    }

    #[test]
    fn test_flat_within_an_hour() {
        let mut load = profile(7, 19);
        let at_six = load.consume(6, 0);
        assert_eq!(load.consume(6, 45), at_six);
        assert!(load.consume(7, 0) > at_six);
    }
}
