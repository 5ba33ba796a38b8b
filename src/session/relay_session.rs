//! The stateful relay session.

use tracing::{debug, warn};

use super::TccRenderer;
use crate::config::{SamplingPolicy, SettingsPolicy};
use crate::error::Result;
use crate::relay::{CurveFamily, RelayInputs, RelaySettings, SettingsReport, evaluate_settings};
use crate::tcc::TccView;

/// A single input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RelayInput {
    FaultCurrent(f64),
    LoadCurrent(f64),
    AdaptiveMode(bool),
    CurveFamily(CurveFamily),
}

impl std::fmt::Display for RelayInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayInput::FaultCurrent(a) => write!(f, "fault current = {} A", a),
            RelayInput::LoadCurrent(a) => write!(f, "load current = {} A", a),
            RelayInput::AdaptiveMode(on) => {
                write!(f, "adaptive mode = {}", if *on { "on" } else { "off" })
            }
            RelayInput::CurveFamily(c) => write!(f, "curve = {}", c),
        }
    }
}

/// Relay state container.
///
/// Holds the inputs, the settings derived from them and the policies used to
/// derive them. Settings are always consistent with the inputs: a rejected
/// input leaves both untouched.
///
/// # Example
///
/// ```
/// use idmt_relay_settings::session::{RelayInput, RelaySession};
/// use idmt_relay_settings::tcc::TccView;
///
/// let mut session = RelaySession::default();
/// let mut pickups = Vec::new();
/// let mut record = |view: &TccView| -> idmt_relay_settings::Result<()> {
///     pickups.push(view.pickup_current);
///     Ok(())
/// };
///
/// session.apply(RelayInput::LoadCurrent(900.0), &mut record)?;
/// assert!(session.apply(RelayInput::LoadCurrent(0.0), &mut record).is_err());
/// assert_eq!(pickups, vec![1125.0]);
/// # Ok::<(), idmt_relay_settings::RelayError>(())
/// ```
#[derive(Debug, Clone)]
pub struct RelaySession {
    inputs: RelayInputs,
    report: SettingsReport,
    settings_policy: SettingsPolicy,
    sampling_policy: SamplingPolicy,
}

impl Default for RelaySession {
    fn default() -> Self {
        let inputs = RelayInputs::default();
        let settings_policy = SettingsPolicy::default();
        Self {
            report: evaluate_settings(&inputs, &settings_policy),
            inputs,
            settings_policy,
            sampling_policy: SamplingPolicy::default(),
        }
    }
}

impl RelaySession {
    /// Create a session and compute its initial settings.
    ///
    /// # Errors
    /// Returns `InvalidConfig` when either policy fails validation.
    pub fn new(
        inputs: RelayInputs,
        settings_policy: SettingsPolicy,
        sampling_policy: SamplingPolicy,
    ) -> Result<Self> {
        settings_policy.validate()?;
        sampling_policy.validate()?;

        let report = evaluate_settings(&inputs, &settings_policy);
        Ok(Self {
            inputs,
            report,
            settings_policy,
            sampling_policy,
        })
    }

    pub fn inputs(&self) -> &RelayInputs {
        &self.inputs
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.report.settings
    }

    pub fn report(&self) -> &SettingsReport {
        &self.report
    }

    pub fn settings_policy(&self) -> &SettingsPolicy {
        &self.settings_policy
    }

    pub fn sampling_policy(&self) -> &SamplingPolicy {
        &self.sampling_policy
    }

    /// Current view model.
    pub fn view(&self) -> TccView {
        TccView::build(&self.inputs, &self.report, &self.sampling_policy)
    }

    /// Render the current state without changing it.
    pub fn refresh(&self, renderer: &mut dyn TccRenderer) -> Result<()> {
        renderer.render(&self.view())
    }

    /// Apply one input, recompute and render.
    ///
    /// # Errors
    /// Returns `InvalidInput` for a non-positive or non-finite current. The
    /// previous inputs and settings stay in place and nothing is rendered.
    pub fn apply(&mut self, input: RelayInput, renderer: &mut dyn TccRenderer) -> Result<()> {
        let result = match input {
            RelayInput::FaultCurrent(amps) => self.inputs.set_fault_current(amps),
            RelayInput::LoadCurrent(amps) => self.inputs.set_load_current(amps),
            RelayInput::AdaptiveMode(on) => {
                self.inputs.set_adaptive_mode(on);
                Ok(())
            }
            RelayInput::CurveFamily(family) => {
                self.inputs.set_curve_family(family);
                Ok(())
            }
        };

        if let Err(e) = result {
            warn!(%input, error = %e, "input rejected, keeping previous settings");
            return Err(e);
        }

        self.recompute();
        debug!(
            %input,
            pickup = self.report.settings.pickup_current,
            tms = self.report.settings.time_multiplier,
            "settings recomputed"
        );
        self.refresh(renderer)
    }

    pub fn set_fault_current(&mut self, amps: f64, renderer: &mut dyn TccRenderer) -> Result<()> {
        self.apply(RelayInput::FaultCurrent(amps), renderer)
    }

    pub fn set_load_current(&mut self, amps: f64, renderer: &mut dyn TccRenderer) -> Result<()> {
        self.apply(RelayInput::LoadCurrent(amps), renderer)
    }

    pub fn set_adaptive_mode(&mut self, on: bool, renderer: &mut dyn TccRenderer) -> Result<()> {
        self.apply(RelayInput::AdaptiveMode(on), renderer)
    }

    pub fn set_curve_family(
        &mut self,
        family: CurveFamily,
        renderer: &mut dyn TccRenderer,
    ) -> Result<()> {
        self.apply(RelayInput::CurveFamily(family), renderer)
    }

    fn recompute(&mut self) {
        self.report = evaluate_settings(&self.inputs, &self.settings_policy);
    }
}
