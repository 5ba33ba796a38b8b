//! View model emitted after every recomputation.

use serde::Serialize;

use super::sampler::{CurveSample, sample_curve, trip_time};
use crate::config::{ProtectionMode, SamplingPolicy};
use crate::relay::{CurveFamily, RelayInputs, SettingsReport};
use crate::utils::format::{format_pickup, format_tms, format_trip_time};

/// Formatted strings for the settings panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayValues {
    pub pickup_current: String,
    pub time_multiplier: String,
    pub trip_time: String,
}

/// Everything a renderer needs to redraw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TccView {
    pub fault_current: f64,
    pub load_current: f64,
    #[serde(serialize_with = "serialize_mode")]
    pub mode: ProtectionMode,
    pub curve_family: CurveFamily,
    pub pickup_current: f64,
    pub time_multiplier: f64,
    pub psm: f64,
    pub sensitivity_clamped: bool,
    pub tms_clamped: bool,
    /// Trip time at the fault current, where the characteristic is defined.
    pub trip_time: Option<f64>,
    /// Characteristic curve series.
    pub curve: Vec<CurveSample>,
    /// Zero or one element series.
    pub operating_point: Vec<CurveSample>,
    pub display: DisplayValues,
}

fn serialize_mode<S: serde::Serializer>(
    mode: &ProtectionMode,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(mode.name())
}

impl TccView {
    /// Build the view for computed settings.
    pub fn build(inputs: &RelayInputs, report: &SettingsReport, policy: &SamplingPolicy) -> Self {
        let settings = &report.settings;
        let params = inputs.curve_family().parameters();
        let (samples, point) = sample_curve(settings, &params, inputs.fault_current(), policy);
        let trip = trip_time(settings, &params, inputs.fault_current());

        Self {
            fault_current: inputs.fault_current(),
            load_current: inputs.load_current(),
            mode: inputs.mode(),
            curve_family: inputs.curve_family(),
            pickup_current: settings.pickup_current,
            time_multiplier: settings.time_multiplier,
            psm: report.psm,
            sensitivity_clamped: report.sensitivity_clamped,
            tms_clamped: report.tms_clamped,
            trip_time: trip,
            curve: samples.collect(),
            operating_point: point.into_iter().collect(),
            display: DisplayValues {
                pickup_current: format_pickup(settings.pickup_current),
                time_multiplier: format_tms(settings.time_multiplier),
                trip_time: format_trip_time(trip),
            },
        }
    }
}

impl std::fmt::Display for TccView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "+-----------------------------------------+")?;
        writeln!(f, "|         IDMT Relay Settings             |")?;
        writeln!(f, "+-----------------------------------------+")?;
        writeln!(f, "|  Fault Current:  {:>12.0} A          |", self.fault_current)?;
        writeln!(f, "|  Load Current:   {:>12.0} A          |", self.load_current)?;
        writeln!(f, "|  Mode:           {:>12}            |", self.mode.name())?;
        writeln!(f, "|  Curve:          {:>18}      |", self.curve_family.name())?;
        writeln!(f, "+-----------------------------------------+")?;
        writeln!(f, "|  Pickup (Is):    {:>16}        |", self.display.pickup_current)?;
        writeln!(f, "|  TMS:            {:>16}        |", self.display.time_multiplier)?;
        writeln!(f, "|  PSM:            {:>16.3}        |", self.psm)?;
        writeln!(f, "|  Trip Time:      {:>16}        |", self.display.trip_time)?;
        writeln!(f, "+-----------------------------------------+")?;
        if self.sensitivity_clamped {
            writeln!(f, "|  ! Sensitivity clamp active             |")?;
        }
        if self.tms_clamped {
            writeln!(f, "|  ! TMS limited to setting range         |")?;
        }
        writeln!(
            f,
            "|  Curve points: {:>3} | Operating point: {} |",
            self.curve.len(),
            if self.operating_point.is_empty() { "no " } else { "yes" }
        )?;
        writeln!(f, "+-----------------------------------------+")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingsPolicy;
    use crate::relay::evaluate_settings;

    #[test]
    fn test_default_view() {
        let inputs = RelayInputs::default();
        let report = evaluate_settings(&inputs, &SettingsPolicy::default());
        let view = TccView::build(&inputs, &report, &SamplingPolicy::default());

        assert_eq!(view.pickup_current, 1000.0);
        assert_eq!(view.display.pickup_current, "1000.00 A");
        assert_eq!(view.operating_point.len(), 1);
        // Unclamped TMS hits the target time exactly at the fault current
        assert_eq!(view.display.trip_time, "0.250 s");
        assert!(!view.curve.is_empty());
    }

    #[test]
    fn test_view_text_mentions_clamp() {
        let inputs = RelayInputs::new(5000.0, 5000.0, false, CurveFamily::Very).unwrap();
        let report = evaluate_settings(&inputs, &SettingsPolicy::default());
        let view = TccView::build(&inputs, &report, &SamplingPolicy::default());

        let text = view.to_string();
        assert!(text.contains("2500.00 A"));
        assert!(text.contains("Sensitivity clamp active"));
    }

    #[test]
    fn test_view_json_mode_name() {
        let inputs = RelayInputs::new(5000.0, 800.0, true, CurveFamily::Standard).unwrap();
        let report = evaluate_settings(&inputs, &SettingsPolicy::default());
        let view = TccView::build(&inputs, &report, &SamplingPolicy::default());

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["mode"], "ADAPTIVE");
        assert_eq!(json["curve_family"], "standard");
    }
}
