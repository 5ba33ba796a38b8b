//! Tuning policies for the settings engine and the curve sampler.
//!
//! Every constant the calculation depends on lives here with its default,
//! so deployments can retune without touching the algorithms.

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

// =============================================================================
// Protection Modes
// =============================================================================

/// Pickup regime of the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtectionMode {
    /// Conventional settings, grid infeed only.
    #[default]
    Fixed,
    /// Settings retuned for inverter-based resource (IBR) infeed.
    Adaptive,
}

impl ProtectionMode {
    pub fn from_adaptive(adaptive: bool) -> Self {
        if adaptive {
            ProtectionMode::Adaptive
        } else {
            ProtectionMode::Fixed
        }
    }

    /// Get mode name for display.
    pub fn name(&self) -> &'static str {
        match self {
            ProtectionMode::Fixed => "FIXED",
            ProtectionMode::Adaptive => "ADAPTIVE",
        }
    }
}

impl std::fmt::Display for ProtectionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// =============================================================================
// Settings Policy
// =============================================================================

/// Constants of the pickup/TMS calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsPolicy {
    /// Pickup as a multiple of maximum load current in fixed mode.
    pub fixed_pickup_factor: f64,
    /// Pickup as a multiple of maximum load current in adaptive mode.
    pub adaptive_pickup_factor: f64,
    /// Pickup above this fraction of fault current loses sensitivity.
    pub sensitivity_ratio: f64,
    /// Pickup used instead, as a fraction of fault current.
    pub sensitivity_fallback_factor: f64,
    /// Primary protection operating time at the fault current (s).
    pub target_time: f64,
    /// TMS used when the fault current does not exceed pickup.
    pub fallback_tms: f64,
    /// Lowest TMS the relay accepts.
    pub tms_min: f64,
    /// Highest TMS the relay accepts.
    pub tms_max: f64,
}

impl Default for SettingsPolicy {
    fn default() -> Self {
        Self {
            fixed_pickup_factor: 1.25,
            adaptive_pickup_factor: 1.3,
            sensitivity_ratio: 0.8,
            sensitivity_fallback_factor: 0.5,
            target_time: 0.25,
            fallback_tms: 0.1,
            tms_min: 0.05,
            tms_max: 1.1,
        }
    }
}

impl SettingsPolicy {
    /// Same policy with a different target operating time.
    pub fn with_target_time(mut self, target_time: f64) -> Self {
        self.target_time = target_time;
        self
    }

    /// Pickup factor applied to load current for the given mode.
    pub fn pickup_factor(&self, mode: ProtectionMode) -> f64 {
        match mode {
            ProtectionMode::Fixed => self.fixed_pickup_factor,
            ProtectionMode::Adaptive => self.adaptive_pickup_factor,
        }
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("fixed_pickup_factor", self.fixed_pickup_factor),
            ("adaptive_pickup_factor", self.adaptive_pickup_factor),
            ("sensitivity_ratio", self.sensitivity_ratio),
            ("sensitivity_fallback_factor", self.sensitivity_fallback_factor),
            ("target_time", self.target_time),
            ("fallback_tms", self.fallback_tms),
            ("tms_min", self.tms_min),
            ("tms_max", self.tms_max),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(RelayError::InvalidConfig(format!(
                    "settings.{} must be a positive number, got {}",
                    name, value
                )));
            }
        }

        if self.tms_min > self.tms_max {
            return Err(RelayError::InvalidConfig(format!(
                "settings.tms_min ({}) exceeds settings.tms_max ({})",
                self.tms_min, self.tms_max
            )));
        }

        Ok(())
    }
}

// =============================================================================
// Sampling Policy
// =============================================================================

/// Most grid points a sampling policy may produce.
pub const MAX_SAMPLE_COUNT: usize = 10_000;

/// Display tuning of the TCC sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingPolicy {
    /// First sample, as a multiple of pickup. Must be above 1.
    pub start_psm: f64,
    /// Last sample bound, as a multiple of pickup.
    pub end_psm: f64,
    /// Distance between samples, in multiples of pickup.
    pub psm_step: f64,
    /// Samples slower than this (s) are dropped.
    pub max_trip_time: f64,
    /// Operating point is shown only above this multiple of pickup.
    pub operating_point_margin: f64,
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            start_psm: 1.1,
            end_psm: 20.0,
            psm_step: 0.5,
            max_trip_time: 100.0,
            operating_point_margin: 1.05,
        }
    }
}

impl SamplingPolicy {
    /// Number of grid points between `start_psm` and `end_psm` inclusive,
    /// capped at [`MAX_SAMPLE_COUNT`].
    pub fn sample_count(&self) -> usize {
        if !(self.psm_step > 0.0 && self.psm_step.is_finite()) || self.end_psm < self.start_psm {
            return 0;
        }
        // Small epsilon so an end bound landing on the grid is kept.
        let steps = ((self.end_psm - self.start_psm) / self.psm_step + 1e-9).floor();
        if !steps.is_finite() || steps >= MAX_SAMPLE_COUNT as f64 {
            return MAX_SAMPLE_COUNT;
        }
        (steps as usize).saturating_add(1)
    }

    /// Reject values that would produce an unbounded or empty curve.
    pub fn validate(&self) -> Result<()> {
        if !self.start_psm.is_finite() || self.start_psm <= 1.0 {
            return Err(RelayError::InvalidConfig(format!(
                "sampling.start_psm must be above 1, got {}",
                self.start_psm
            )));
        }
        if !self.end_psm.is_finite() || self.end_psm < self.start_psm {
            return Err(RelayError::InvalidConfig(format!(
                "sampling.end_psm ({}) must be finite and not below start_psm ({})",
                self.end_psm, self.start_psm
            )));
        }
        if !self.psm_step.is_finite() || self.psm_step <= 0.0 {
            return Err(RelayError::InvalidConfig(format!(
                "sampling.psm_step must be positive, got {}",
                self.psm_step
            )));
        }
        let steps = (self.end_psm - self.start_psm) / self.psm_step;
        if steps >= MAX_SAMPLE_COUNT as f64 {
            return Err(RelayError::InvalidConfig(format!(
                "sampling grid {}..{} step {} exceeds {} samples",
                self.start_psm, self.end_psm, self.psm_step, MAX_SAMPLE_COUNT
            )));
        }
        if !self.max_trip_time.is_finite() || self.max_trip_time <= 0.0 {
            return Err(RelayError::InvalidConfig(format!(
                "sampling.max_trip_time must be positive, got {}",
                self.max_trip_time
            )));
        }
        if !self.operating_point_margin.is_finite() || self.operating_point_margin < 1.0 {
            return Err(RelayError::InvalidConfig(format!(
                "sampling.operating_point_margin must be at least 1, got {}",
                self.operating_point_margin
            )));
        }
        Ok(())
    }
}
