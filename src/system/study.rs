//! Fixed versus adaptive protection studies.
//!
//! Compares the settings a relay gets when it is set for grid-only faults
//! with the settings it gets when it is retuned for IBR infeed, and replays
//! a set of stressed network conditions through the settings engine.

use serde::Serialize;

use super::model::SystemModel;
use super::surrogate::{SurrogateFeatures, SurrogateModel};
use crate::config::{SamplingPolicy, SettingsPolicy};
use crate::error::Result;
use crate::relay::{CurveFamily, RelayInputs, SettingsReport, evaluate_settings};
use crate::tcc::{CurrentGrid, CurveSample, TccSamples, trip_time};

/// Target operating time when set for grid-only faults (s).
pub const FIXED_TARGET_TIME: f64 = 0.3;
/// Target operating time when retuned for IBR infeed (s).
pub const ADAPTIVE_TARGET_TIME: f64 = 0.25;

/// Upper end of the comparison chart current axis (A).
pub const STUDY_CURRENT_LIMIT: f64 = 6000.0;
/// Points per curve in the comparison chart.
pub const STUDY_POINTS: usize = 200;

/// Target time used for a scenario.
pub fn target_time_for(ibr_active: bool) -> f64 {
    if ibr_active {
        ADAPTIVE_TARGET_TIME
    } else {
        FIXED_TARGET_TIME
    }
}

/// Settings for one network condition, with the target time picked from
/// the IBR state.
pub fn evaluate_scenario(
    load_current: f64,
    fault_current: f64,
    ibr_active: bool,
    curve: CurveFamily,
    policy: &SettingsPolicy,
) -> Result<SettingsReport> {
    let inputs = RelayInputs::new(fault_current, load_current, ibr_active, curve)?;
    let policy = policy.clone().with_target_time(target_time_for(ibr_active));
    Ok(evaluate_settings(&inputs, &policy))
}

// =============================================================================
// Comparison Study
// =============================================================================

/// Result of one protection scheme in the comparison.
#[derive(Debug, Clone, Serialize)]
pub struct SchemeResult {
    pub label: &'static str,
    pub ibr_active: bool,
    pub fault_current: f64,
    pub target_time: f64,
    pub pickup_current: f64,
    pub time_multiplier: f64,
    pub psm: f64,
    pub trip_time: Option<f64>,
    pub curve: Vec<CurveSample>,
}

/// Fixed and adaptive schemes side by side.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonStudy {
    pub curve_family: CurveFamily,
    pub grid_fault_current: f64,
    pub total_fault_current: f64,
    pub fixed: SchemeResult,
    pub adaptive: SchemeResult,
}

/// Run the fixed versus adaptive comparison for `model`.
///
/// Both curves are sampled on one linear current axis from just above the
/// lower pickup to [`STUDY_CURRENT_LIMIT`], so they can share a chart.
pub fn run_comparison(
    model: &SystemModel,
    curve: CurveFamily,
    policy: &SettingsPolicy,
    sampling: &SamplingPolicy,
) -> Result<ComparisonStudy> {
    let grid_fault = model.fault_current(false);
    let total_fault = model.fault_current(true);

    let fixed = evaluate_scenario(model.max_load_current, grid_fault, false, curve, policy)?;
    let adaptive = evaluate_scenario(model.max_load_current, total_fault, true, curve, policy)?;

    let start = 1.1
        * fixed
            .settings
            .pickup_current
            .min(adaptive.settings.pickup_current);
    let grid = CurrentGrid::Linear {
        start,
        end: STUDY_CURRENT_LIMIT.max(start),
        count: STUDY_POINTS,
    };

    let scheme = |label, ibr_active, fault_current, report: &SettingsReport| {
        let params = curve.parameters();
        SchemeResult {
            label,
            ibr_active,
            fault_current,
            target_time: target_time_for(ibr_active),
            pickup_current: report.settings.pickup_current,
            time_multiplier: report.settings.time_multiplier,
            psm: report.psm,
            trip_time: trip_time(&report.settings, &params, fault_current),
            curve: TccSamples::new(report.settings, params, grid, sampling.max_trip_time)
                .collect(),
        }
    };

    Ok(ComparisonStudy {
        curve_family: curve,
        grid_fault_current: grid_fault,
        total_fault_current: total_fault,
        fixed: scheme("Fixed (IBR OFF)", false, grid_fault, &fixed),
        adaptive: scheme("Adaptive (IBR ON)", true, total_fault, &adaptive),
    })
}

// =============================================================================
// Corner-Case Bench
// =============================================================================

/// A stressed network condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerCase {
    pub name: &'static str,
    pub load_current: f64,
    pub grid_fault_current: f64,
    pub ibr_fault_current: f64,
    pub ibr_active: bool,
}

impl CornerCase {
    pub fn fault_current(&self) -> f64 {
        if self.ibr_active {
            self.grid_fault_current + self.ibr_fault_current
        } else {
            self.grid_fault_current
        }
    }

    pub fn features(&self) -> SurrogateFeatures {
        SurrogateFeatures {
            i_load: self.load_current,
            i_grid: self.grid_fault_current,
            i_ibr_potential: self.ibr_fault_current,
            ibr_active: self.ibr_active,
        }
    }
}

/// Conditions that push the pickup and TMS safeguards.
pub const CORNER_CASES: [CornerCase; 5] = [
    CornerCase {
        name: "Extreme Load + Weak Grid",
        load_current: 1100.0,
        grid_fault_current: 2500.0,
        ibr_fault_current: 500.0,
        ibr_active: true,
    },
    CornerCase {
        name: "Islanding (Low Grid Fault)",
        load_current: 400.0,
        grid_fault_current: 1500.0,
        ibr_fault_current: 1200.0,
        ibr_active: true,
    },
    CornerCase {
        name: "No Load + Strong Grid",
        load_current: 100.0,
        grid_fault_current: 7000.0,
        ibr_fault_current: 100.0,
        ibr_active: false,
    },
    CornerCase {
        name: "High IBR Contribution",
        load_current: 200.0,
        grid_fault_current: 3000.0,
        ibr_fault_current: 1500.0,
        ibr_active: true,
    },
    CornerCase {
        name: "Overload (No IBR)",
        load_current: 1200.0,
        grid_fault_current: 2000.0,
        ibr_fault_current: 200.0,
        ibr_active: false,
    },
];

/// Surrogate prediction next to the analytical settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurrogateComparison {
    pub pickup_current: f64,
    pub time_multiplier: f64,
    /// Absolute pickup difference from the analytical value (A).
    pub pickup_error: f64,
    pub tms_error: f64,
}

/// Analytical settings for one corner case.
#[derive(Debug, Clone, Serialize)]
pub struct BenchResult {
    pub scenario: &'static str,
    pub ibr_active: bool,
    pub fault_current: f64,
    pub pickup_current: f64,
    pub time_multiplier: f64,
    pub psm: f64,
    pub trip_time: Option<f64>,
    pub sensitivity_clamped: bool,
    pub tms_clamped: bool,
    /// Present when a surrogate was supplied.
    pub surrogate: Option<SurrogateComparison>,
}

/// Evaluate every case in `cases`, and compare with `surrogate` if given.
pub fn run_bench(
    cases: &[CornerCase],
    curve: CurveFamily,
    policy: &SettingsPolicy,
    surrogate: Option<&SurrogateModel>,
) -> Result<Vec<BenchResult>> {
    let params = curve.parameters();
    cases
        .iter()
        .map(|case| {
            let fault = case.fault_current();
            let report =
                evaluate_scenario(case.load_current, fault, case.ibr_active, curve, policy)?;
            let surrogate = surrogate.map(|model| {
                let predicted = model.predict(&case.features());
                SurrogateComparison {
                    pickup_current: predicted.pickup_current,
                    time_multiplier: predicted.time_multiplier,
                    pickup_error: (predicted.pickup_current - report.settings.pickup_current).abs(),
                    tms_error: (predicted.time_multiplier - report.settings.time_multiplier).abs(),
                }
            });
            Ok(BenchResult {
                scenario: case.name,
                ibr_active: case.ibr_active,
                fault_current: fault,
                pickup_current: report.settings.pickup_current,
                time_multiplier: report.settings.time_multiplier,
                psm: report.psm,
                trip_time: trip_time(&report.settings, &params, fault),
                sensitivity_clamped: report.sensitivity_clamped,
                tms_clamped: report.tms_clamped,
                surrogate,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_defaults() {
        let study = run_comparison(
            &SystemModel::default(),
            CurveFamily::Standard,
            &SettingsPolicy::default(),
            &SamplingPolicy::default(),
        )
        .unwrap();

        assert_eq!(study.fixed.pickup_current, 1000.0);
        assert!((study.adaptive.pickup_current - 1040.0).abs() < 1e-9);
        assert_eq!(study.fixed.fault_current, 5000.0);
        assert_eq!(study.adaptive.fault_current, 5500.0);
        assert_eq!(study.fixed.target_time, 0.3);
        assert_eq!(study.adaptive.target_time, 0.25);

        // Neither scheme is clamped, so each hits its own target
        assert!((study.fixed.trip_time.unwrap() - 0.3).abs() < 1e-9);
        assert!((study.adaptive.trip_time.unwrap() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_comparison_shares_current_axis() {
        let study = run_comparison(
            &SystemModel::default(),
            CurveFamily::Very,
            &SettingsPolicy::default(),
            &SamplingPolicy::default(),
        )
        .unwrap();

        // Axis starts at 1.1 * min(Is) = 1100 A
        let fixed_first = study.fixed.curve.first().unwrap();
        assert!((fixed_first.current - 1100.0).abs() < 1e-9);
        assert_eq!(study.fixed.curve.len(), STUDY_POINTS);
        assert!(study.adaptive.curve.iter().all(|p| p.current > 1040.0));
        assert!(study.adaptive.curve.last().unwrap().current <= STUDY_CURRENT_LIMIT + 1e-9);
    }

    #[test]
    fn test_bench_cases() {
        let results = run_bench(
            &CORNER_CASES,
            CurveFamily::Standard,
            &SettingsPolicy::default(),
            None,
        )
        .unwrap();
        assert_eq!(results.len(), 5);
        assert!(results.iter().all(|r| r.surrogate.is_none()));

        // Extreme load: 1.3 * 1100 = 1430 <= 0.8 * 3000, so no clamp
        let extreme = &results[0];
        assert_eq!(extreme.fault_current, 3000.0);
        assert!(!extreme.sensitivity_clamped);

        // Overload: 1.25 * 1200 = 1500 < 1600, PSM 1.33
        let overload = &results[4];
        assert_eq!(overload.fault_current, 2000.0);
        assert_eq!(overload.pickup_current, 1500.0);

        for r in &results {
            assert!(r.time_multiplier >= 0.05 && r.time_multiplier <= 1.1, "{}", r.scenario);
        }
    }

    #[test]
    fn test_bench_clamps_weak_islanded_grid() {
        let case = CornerCase {
            name: "Weak",
            load_current: 1000.0,
            grid_fault_current: 1200.0,
            ibr_fault_current: 0.0,
            ibr_active: false,
        };
        let results =
            run_bench(&[case], CurveFamily::Very, &SettingsPolicy::default(), None).unwrap();
        assert!(results[0].sensitivity_clamped);
        assert_eq!(results[0].pickup_current, 600.0);
    }

    #[test]
    fn test_bench_compares_surrogate() {
        use crate::system::{ScenarioRanges, TrainingConfig, generate_scenarios};

        let policy = SettingsPolicy::default();
        let records = generate_scenarios(
            200,
            11,
            &ScenarioRanges::default(),
            CurveFamily::Standard,
            &policy,
        )
        .unwrap();
        let config = TrainingConfig {
            epochs: 200,
            ..Default::default()
        };
        let (model, _) = SurrogateModel::train(&records, &config).unwrap();

        let results = run_bench(&CORNER_CASES, CurveFamily::Standard, &policy, Some(&model)).unwrap();
        for (r, case) in results.iter().zip(CORNER_CASES.iter()) {
            let ml = r.surrogate.unwrap();
            let predicted = model.predict(&case.features());
            assert_eq!(ml.pickup_current, predicted.pickup_current);
            assert_eq!(ml.pickup_error, (ml.pickup_current - r.pickup_current).abs());
            assert_eq!(ml.tms_error, (ml.time_multiplier - r.time_multiplier).abs());
            assert!(ml.pickup_error.is_finite() && ml.tms_error.is_finite());
        }
    }

    #[test]
    fn test_target_time_for() {
        assert_eq!(target_time_for(true), 0.25);
        assert_eq!(target_time_for(false), 0.3);
    }
}
