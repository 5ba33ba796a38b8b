//! Time-current characteristic sampling.
//!
//! Produces the `(current, trip time)` points a log-log chart needs. Every
//! emitted point lies strictly above pickup and has a finite, positive trip
//! time below the policy cap.

use serde::Serialize;

use crate::config::SamplingPolicy;
use crate::relay::{CurveParameters, RelaySettings};

/// One point of the characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurveSample {
    /// Current (A).
    pub current: f64,
    /// Relay operating time (s).
    pub trip_time: f64,
}

/// Candidate currents visited by the sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CurrentGrid {
    /// `start_psm + n * step` multiples of pickup, `count` points.
    PsmSteps {
        start_psm: f64,
        step: f64,
        count: usize,
    },
    /// `count` evenly spaced currents from `start` to `end` amperes.
    Linear { start: f64, end: f64, count: usize },
}

impl CurrentGrid {
    pub fn from_policy(policy: &SamplingPolicy) -> Self {
        CurrentGrid::PsmSteps {
            start_psm: policy.start_psm,
            step: policy.psm_step,
            count: policy.sample_count(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CurrentGrid::PsmSteps { count, .. } | CurrentGrid::Linear { count, .. } => *count,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn current_at(&self, index: usize, pickup: f64) -> f64 {
        match *self {
            CurrentGrid::PsmSteps {
                start_psm, step, ..
            } => (start_psm + index as f64 * step) * pickup,
            CurrentGrid::Linear { start, end, count } => {
                if count <= 1 {
                    start
                } else {
                    start + (end - start) * index as f64 / (count - 1) as f64
                }
            }
        }
    }
}

/// Lazy, finite sequence of curve samples.
///
/// Clone before iterating, or call [`TccSamples::restart`], to walk the
/// curve again.
#[derive(Debug, Clone)]
pub struct TccSamples {
    settings: RelaySettings,
    params: CurveParameters,
    grid: CurrentGrid,
    max_trip_time: f64,
    index: usize,
}

impl TccSamples {
    pub fn new(
        settings: RelaySettings,
        params: CurveParameters,
        grid: CurrentGrid,
        max_trip_time: f64,
    ) -> Self {
        // Without a positive pickup there is no characteristic to walk.
        let grid = if settings.pickup_current > 0.0 && settings.pickup_current.is_finite() {
            grid
        } else {
            CurrentGrid::PsmSteps {
                start_psm: 0.0,
                step: 0.0,
                count: 0,
            }
        };

        Self {
            settings,
            params,
            grid,
            max_trip_time,
            index: 0,
        }
    }

    /// Rewind to the first sample.
    pub fn restart(&mut self) {
        self.index = 0;
    }
}

impl Iterator for TccSamples {
    type Item = CurveSample;

    fn next(&mut self) -> Option<Self::Item> {
        while self.index < self.grid.len() {
            let current = self.grid.current_at(self.index, self.settings.pickup_current);
            self.index += 1;

            if let Some(sample) =
                sample_at(&self.settings, &self.params, current, self.max_trip_time)
            {
                return Some(sample);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.grid.len().saturating_sub(self.index)))
    }
}

/// Trip time at `current`, if the characteristic is defined there.
pub fn trip_time(settings: &RelaySettings, params: &CurveParameters, current: f64) -> Option<f64> {
    if settings.pickup_current <= 0.0 {
        return None;
    }
    params.operating_time(current / settings.pickup_current, settings.time_multiplier)
}

/// A sample at `current` that passes the display filter, or `None`.
pub fn sample_at(
    settings: &RelaySettings,
    params: &CurveParameters,
    current: f64,
    max_trip_time: f64,
) -> Option<CurveSample> {
    if !current.is_finite() || current <= settings.pickup_current {
        return None;
    }
    trip_time(settings, params, current)
        .filter(|&t| t < max_trip_time)
        .map(|trip_time| CurveSample { current, trip_time })
}

/// The operating point at `fault_current`.
///
/// Emitted only when the fault current exceeds pickup by the policy margin;
/// closer than that the point is indistinguishable from pickup on the chart.
pub fn operating_point(
    settings: &RelaySettings,
    params: &CurveParameters,
    fault_current: f64,
    policy: &SamplingPolicy,
) -> Option<CurveSample> {
    if settings.pickup_current <= 0.0 {
        return None;
    }
    let psm = fault_current / settings.pickup_current;
    if psm.is_nan() || psm <= policy.operating_point_margin {
        return None;
    }
    sample_at(settings, params, fault_current, policy.max_trip_time)
}

/// Sample the characteristic and the operating point.
pub fn sample_curve(
    settings: &RelaySettings,
    params: &CurveParameters,
    fault_current: f64,
    policy: &SamplingPolicy,
) -> (TccSamples, Option<CurveSample>) {
    let samples = TccSamples::new(
        *settings,
        *params,
        CurrentGrid::from_policy(policy),
        policy.max_trip_time,
    );
    (samples, operating_point(settings, params, fault_current, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{STANDARD_INVERSE, VERY_INVERSE};

    fn settings(pickup: f64, tms: f64) -> RelaySettings {
        RelaySettings {
            pickup_current: pickup,
            time_multiplier: tms,
        }
    }

    #[test]
    fn test_default_sampling() {
        let s = settings(1000.0, 0.1);
        let policy = SamplingPolicy::default();
        let (samples, point) = sample_curve(&s, &VERY_INVERSE, 5000.0, &policy);
        let samples: Vec<_> = samples.collect();

        assert_eq!(samples.len(), 38);
        assert!((samples[0].current - 1100.0).abs() < 1e-9);
        assert!(samples.iter().all(|p| p.current > 1000.0));
        assert!(samples.iter().all(|p| p.trip_time > 0.0 && p.trip_time < 100.0));

        // VI at PSM 5, TMS 0.1: 0.1 * 13.5 / 4
        let point = point.unwrap();
        assert_eq!(point.current, 5000.0);
        assert!((point.trip_time - 0.3375).abs() < 1e-12);
    }

    #[test]
    fn test_trip_time_decreasing() {
        let (samples, _) = sample_curve(
            &settings(1000.0, 0.5),
            &STANDARD_INVERSE,
            5000.0,
            &SamplingPolicy::default(),
        );
        let times: Vec<f64> = samples.map(|p| p.trip_time).collect();
        assert!(times.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn test_time_cap_filters_slow_samples() {
        // SI at PSM 1.1 with TMS 1.1 is about 81 s
        let policy = SamplingPolicy {
            max_trip_time: 10.0,
            ..Default::default()
        };
        let (samples, _) = sample_curve(&settings(1000.0, 1.1), &STANDARD_INVERSE, 5000.0, &policy);
        let samples: Vec<_> = samples.collect();
        assert!(!samples.is_empty());
        assert!(samples.len() < policy.sample_count());
        assert!(samples.iter().all(|p| p.trip_time < 10.0));
    }

    #[test]
    fn test_restartable() {
        let (mut samples, _) = sample_curve(
            &settings(1000.0, 0.2),
            &VERY_INVERSE,
            5000.0,
            &SamplingPolicy::default(),
        );
        let first: Vec<_> = samples.clone().collect();
        let drained = samples.by_ref().count();
        assert_eq!(drained, first.len());
        assert_eq!(samples.next(), None);

        samples.restart();
        let second: Vec<_> = samples.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_operating_point_near_pickup() {
        let policy = SamplingPolicy::default();
        let s = settings(1000.0, 0.1);
        assert!(operating_point(&s, &VERY_INVERSE, 1040.0, &policy).is_none());
        assert!(operating_point(&s, &VERY_INVERSE, 1050.0, &policy).is_none());
        assert!(operating_point(&s, &VERY_INVERSE, 900.0, &policy).is_none());
        assert!(operating_point(&s, &VERY_INVERSE, 1060.0, &policy).is_some());
    }

    #[test]
    fn test_zero_pickup_yields_nothing() {
        let (samples, point) = sample_curve(
            &settings(0.0, 0.1),
            &VERY_INVERSE,
            5000.0,
            &SamplingPolicy::default(),
        );
        assert_eq!(samples.count(), 0);
        assert!(point.is_none());
    }

    #[test]
    fn test_linear_grid() {
        let grid = CurrentGrid::Linear {
            start: 1100.0,
            end: 6000.0,
            count: 200,
        };
        let samples: Vec<_> =
            TccSamples::new(settings(1000.0, 0.1), VERY_INVERSE, grid, 100.0).collect();
        assert_eq!(samples.len(), 200);
        assert!((samples[0].current - 1100.0).abs() < 1e-9);
        assert!((samples[199].current - 6000.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_grid_skips_below_pickup() {
        let grid = CurrentGrid::Linear {
            start: 500.0,
            end: 1500.0,
            count: 11,
        };
        let samples: Vec<_> =
            TccSamples::new(settings(1000.0, 0.1), VERY_INVERSE, grid, 100.0).collect();
        // 1100..=1500 remain
        assert_eq!(samples.len(), 5);
    }
}
