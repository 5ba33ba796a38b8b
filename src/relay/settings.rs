//! Pickup current and time multiplier calculation.
//!
//! Settings are recomputed from scratch from [`RelayInputs`]; nothing is
//! carried over from a previous evaluation.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::curves::CurveFamily;
use crate::config::{ProtectionMode, SettingsPolicy};
use crate::error::{RelayError, Result};

// =============================================================================
// Inputs
// =============================================================================

/// Default minimum fault current at the protected bus (A).
pub const DEFAULT_FAULT_CURRENT: f64 = 5000.0;
/// Default maximum load current through the relay (A).
pub const DEFAULT_LOAD_CURRENT: f64 = 800.0;

/// Operating conditions the relay is set for.
///
/// Currents are validated on every write, so a `RelayInputs` value always
/// holds finite, strictly positive currents.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayInputs {
    fault_current: f64,
    load_current: f64,
    adaptive_mode: bool,
    curve_family: CurveFamily,
}

impl Default for RelayInputs {
    fn default() -> Self {
        Self {
            fault_current: DEFAULT_FAULT_CURRENT,
            load_current: DEFAULT_LOAD_CURRENT,
            adaptive_mode: false,
            curve_family: CurveFamily::Standard,
        }
    }
}

/// Check that a current is usable in the settings formulae.
pub fn validate_current(field: &'static str, amps: f64) -> Result<f64> {
    if !amps.is_finite() || amps <= 0.0 {
        return Err(RelayError::non_positive_current(field, amps));
    }
    Ok(amps)
}

impl RelayInputs {
    pub fn new(
        fault_current: f64,
        load_current: f64,
        adaptive_mode: bool,
        curve_family: CurveFamily,
    ) -> Result<Self> {
        Ok(Self {
            fault_current: validate_current("fault current", fault_current)?,
            load_current: validate_current("load current", load_current)?,
            adaptive_mode,
            curve_family,
        })
    }

    pub fn fault_current(&self) -> f64 {
        self.fault_current
    }

    pub fn load_current(&self) -> f64 {
        self.load_current
    }

    pub fn adaptive_mode(&self) -> bool {
        self.adaptive_mode
    }

    pub fn curve_family(&self) -> CurveFamily {
        self.curve_family
    }

    pub fn mode(&self) -> ProtectionMode {
        ProtectionMode::from_adaptive(self.adaptive_mode)
    }

    /// Set the fault current. Leaves the value unchanged on error.
    pub fn set_fault_current(&mut self, amps: f64) -> Result<()> {
        self.fault_current = validate_current("fault current", amps)?;
        Ok(())
    }

    /// Set the load current. Leaves the value unchanged on error.
    pub fn set_load_current(&mut self, amps: f64) -> Result<()> {
        self.load_current = validate_current("load current", amps)?;
        Ok(())
    }

    pub fn set_adaptive_mode(&mut self, adaptive: bool) {
        self.adaptive_mode = adaptive;
    }

    pub fn set_curve_family(&mut self, family: CurveFamily) {
        self.curve_family = family;
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Derived relay settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelaySettings {
    /// Pickup current `Is` (A).
    pub pickup_current: f64,
    /// Time multiplier setting, within the policy's TMS range.
    pub time_multiplier: f64,
}

/// Where the pre-clamp TMS came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TmsSource {
    /// Characteristic solved for the target time.
    Formula,
    /// Fault current at or below pickup; fallback TMS used.
    Fallback,
}

/// Settings together with how they were reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingsReport {
    pub settings: RelaySettings,
    /// Plug-setting multiple at the fault current.
    pub psm: f64,
    /// The load-based pickup was replaced to keep sensitivity.
    pub sensitivity_clamped: bool,
    pub tms_source: TmsSource,
    /// TMS before the stability clamp.
    pub unclamped_tms: f64,
    /// The TMS was pulled into the relay's setting range.
    pub tms_clamped: bool,
}

impl SettingsReport {
    /// True when neither clamp nor fallback changed the formula result.
    pub fn is_unconstrained(&self) -> bool {
        !self.sensitivity_clamped && !self.tms_clamped && self.tms_source == TmsSource::Formula
    }
}

/// Compute settings with the default policy.
pub fn compute_settings(inputs: &RelayInputs) -> RelaySettings {
    evaluate_settings(inputs, &SettingsPolicy::default()).settings
}

/// Run the full calculation and report which safeguards fired.
pub fn evaluate_settings(inputs: &RelayInputs, policy: &SettingsPolicy) -> SettingsReport {
    let fault = inputs.fault_current();
    let params = inputs.curve_family().parameters();

    // 1. Pickup from load current
    let mut pickup = policy.pickup_factor(inputs.mode()) * inputs.load_current();

    // 2. Sensitivity: hard override, the load-based value is discarded
    let sensitivity_clamped = pickup > policy.sensitivity_ratio * fault;
    if sensitivity_clamped {
        debug!(
            pickup,
            fault, "pickup too close to fault level, using sensitivity fallback"
        );
        pickup = policy.sensitivity_fallback_factor * fault;
    }

    // 3. Plug-setting multiple
    let psm = fault / pickup;

    // 4. TMS for the target operating time
    let (unclamped_tms, tms_source) = match params.required_tms(psm, policy.target_time) {
        Some(tms) => (tms, TmsSource::Formula),
        None => {
            debug!(psm, "fault current does not exceed pickup, using fallback TMS");
            (policy.fallback_tms, TmsSource::Fallback)
        }
    };

    // 5. Stability clamp to the rated setting range. Upper bound wins on an
    // inverted range; `validate` rejects those.
    let tms = unclamped_tms.max(policy.tms_min).min(policy.tms_max);
    let tms_clamped = tms != unclamped_tms;
    if tms_clamped {
        debug!(unclamped_tms, tms, "TMS clamped to setting range");
    }

    SettingsReport {
        settings: RelaySettings {
            pickup_current: pickup,
            time_multiplier: tms,
        },
        psm,
        sensitivity_clamped,
        tms_source,
        unclamped_tms,
        tms_clamped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(fault: f64, load: f64, adaptive: bool, curve: CurveFamily) -> RelayInputs {
        RelayInputs::new(fault, load, adaptive, curve).unwrap()
    }

    #[test]
    fn test_defaults() {
        let i = RelayInputs::default();
        assert_eq!(i.fault_current(), 5000.0);
        assert_eq!(i.load_current(), 800.0);
        assert!(!i.adaptive_mode());
        assert_eq!(i.curve_family(), CurveFamily::Standard);
    }

    #[test]
    fn test_default_scenario() {
        let report = evaluate_settings(&RelayInputs::default(), &SettingsPolicy::default());
        assert_eq!(report.settings.pickup_current, 1000.0);
        assert_eq!(report.psm, 5.0);
        assert!(!report.sensitivity_clamped);

        // SI at PSM 5 needs 0.25 * (5^0.02 - 1) / 0.14, inside the range
        let expected = 0.25 * (5f64.powf(0.02) - 1.0) / 0.14;
        assert!((report.settings.time_multiplier - expected).abs() < 1e-12);
        assert!(!report.tms_clamped);
        assert!(report.is_unconstrained());
    }

    #[test]
    fn test_adaptive_pickup() {
        let s = compute_settings(&inputs(5000.0, 800.0, true, CurveFamily::Standard));
        assert!((s.pickup_current - 1040.0).abs() < 1e-9);
    }

    #[test]
    fn test_sensitivity_clamp() {
        let report = evaluate_settings(
            &inputs(5000.0, 5000.0, false, CurveFamily::Standard),
            &SettingsPolicy::default(),
        );
        assert!(report.sensitivity_clamped);
        assert_eq!(report.settings.pickup_current, 2500.0);
        assert_eq!(report.psm, 2.0);
    }

    #[test]
    fn test_pickup_exactly_at_sensitivity_ratio_not_clamped() {
        // 1.25 * 3200 = 4000 = 0.8 * 5000, the override needs strictly greater
        let report = evaluate_settings(
            &inputs(5000.0, 3200.0, false, CurveFamily::Standard),
            &SettingsPolicy::default(),
        );
        assert!(!report.sensitivity_clamped);
        assert_eq!(report.settings.pickup_current, 4000.0);
        assert_eq!(report.psm, 1.25);
    }

    #[test]
    fn test_inverted_tms_range_does_not_panic() {
        let policy = SettingsPolicy {
            tms_min: 2.0,
            tms_max: 1.0,
            ..Default::default()
        };
        let report = evaluate_settings(&RelayInputs::default(), &policy);
        assert_eq!(report.settings.time_multiplier, 1.0);

        let policy = SettingsPolicy {
            tms_min: f64::NAN,
            ..Default::default()
        };
        let report = evaluate_settings(&RelayInputs::default(), &policy);
        assert!(report.settings.time_multiplier.is_finite());
    }

    #[test]
    fn test_no_clamp_below_ratio() {
        // 1.25 * 3000 = 3750 < 0.8 * 5000
        let report = evaluate_settings(
            &inputs(5000.0, 3000.0, false, CurveFamily::Very),
            &SettingsPolicy::default(),
        );
        assert!(!report.sensitivity_clamped);
        assert_eq!(report.settings.pickup_current, 3750.0);
    }

    #[test]
    fn test_load_above_fault_hits_sensitivity_clamp() {
        // Is = 1000 > 0.8 * 900, so the override fires before PSM is taken
        let report = evaluate_settings(
            &inputs(900.0, 800.0, false, CurveFamily::Standard),
            &SettingsPolicy::default(),
        );
        assert!(report.sensitivity_clamped);
        assert_eq!(report.settings.pickup_current, 450.0);
        assert_eq!(report.psm, 2.0);
    }

    #[test]
    fn test_fallback_tms_when_psm_not_above_one() {
        // Without the sensitivity override the pickup stays above the fault current
        let policy = SettingsPolicy {
            sensitivity_ratio: 10.0,
            ..Default::default()
        };
        let report = evaluate_settings(&inputs(900.0, 800.0, false, CurveFamily::Standard), &policy);
        assert!(report.psm < 1.0);
        assert_eq!(report.tms_source, TmsSource::Fallback);
        assert_eq!(report.settings.time_multiplier, 0.1);
    }

    #[test]
    fn test_stability_clamp_upper() {
        // EI at PSM 20: 0.25 * 399 / 80 = 1.247 -> 1.1
        let policy = SettingsPolicy::default();
        let report = evaluate_settings(&inputs(20_000.0, 800.0, false, CurveFamily::Extreme), &policy);
        assert!(report.unclamped_tms > 1.1);
        assert_eq!(report.settings.time_multiplier, 1.1);
        assert!(report.tms_clamped);
    }

    #[test]
    fn test_stability_clamp_lower() {
        // SI near pickup gives a tiny TMS
        let report = evaluate_settings(
            &inputs(1100.0, 800.0, false, CurveFamily::Standard),
            &SettingsPolicy {
                sensitivity_ratio: 10.0,
                ..Default::default()
            },
        );
        assert!(report.unclamped_tms < 0.05);
        assert_eq!(report.settings.time_multiplier, 0.05);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(RelayInputs::new(0.0, 800.0, false, CurveFamily::Standard).is_err());
        assert!(RelayInputs::new(5000.0, -1.0, false, CurveFamily::Standard).is_err());
        assert!(RelayInputs::new(f64::NAN, 800.0, false, CurveFamily::Standard).is_err());
        assert!(RelayInputs::new(f64::INFINITY, 800.0, false, CurveFamily::Standard).is_err());
    }

    #[test]
    fn test_failed_setter_keeps_value() {
        let mut i = RelayInputs::default();
        assert!(i.set_load_current(0.0).is_err());
        assert_eq!(i.load_current(), 800.0);
        i.set_load_current(600.0).unwrap();
        assert_eq!(i.load_current(), 600.0);
    }

    #[test]
    fn test_target_time_round_trip() {
        let i = inputs(6000.0, 500.0, true, CurveFamily::Very);
        let report = evaluate_settings(&i, &SettingsPolicy::default());
        assert!(report.is_unconstrained());
        let t = CurveFamily::Very
            .parameters()
            .operating_time(report.psm, report.settings.time_multiplier)
            .unwrap();
        assert!((t - 0.25).abs() < 1e-9);
    }
}
