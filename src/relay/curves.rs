//! IEC 60255 inverse-time curve constants.
//!
//! The characteristic of every IDMT family has the same shape,
//! `t = TMS * k / (PSM^alpha - 1)`, and differs only in `k` and `alpha`.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{RelayError, Result};

// =============================================================================
// Curve Constants
// =============================================================================

/// IEC Standard Inverse (SI).
pub const STANDARD_INVERSE: CurveParameters = CurveParameters {
    k: 0.14,
    alpha: 0.02,
};

/// IEC Very Inverse (VI).
pub const VERY_INVERSE: CurveParameters = CurveParameters {
    k: 13.5,
    alpha: 1.0,
};

/// IEC Extremely Inverse (EI).
pub const EXTREMELY_INVERSE: CurveParameters = CurveParameters {
    k: 80.0,
    alpha: 2.0,
};

// =============================================================================
// Curve Parameters
// =============================================================================

/// Constants `(k, alpha)` of one IDMT curve family. Both are positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveParameters {
    pub k: f64,
    pub alpha: f64,
}

impl CurveParameters {
    /// Operating time in seconds at a given plug-setting multiple.
    ///
    /// Returns `None` where the characteristic is undefined (`psm <= 1`) or
    /// where the arithmetic does not produce a finite positive time.
    pub fn operating_time(&self, psm: f64, tms: f64) -> Option<f64> {
        if !psm.is_finite() || psm <= 1.0 {
            return None;
        }

        let denominator = psm.powf(self.alpha) - 1.0;
        let time = tms * self.k / denominator;

        (time.is_finite() && time > 0.0).then_some(time)
    }

    /// Time multiplier that makes the relay operate in `target_time` seconds
    /// at `psm`. This is the characteristic solved for TMS.
    pub fn required_tms(&self, psm: f64, target_time: f64) -> Option<f64> {
        if !psm.is_finite() || psm <= 1.0 {
            return None;
        }

        let tms = target_time * (psm.powf(self.alpha) - 1.0) / self.k;
        tms.is_finite().then_some(tms)
    }
}

// =============================================================================
// Curve Families
// =============================================================================

/// Supported IDMT curve families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveFamily {
    /// Standard inverse - gentle slope, long times near pickup.
    #[default]
    Standard,
    /// Very inverse - time roughly inversely proportional to current.
    Very,
    /// Extremely inverse - time falls with the square of current.
    Extreme,
}

impl CurveFamily {
    /// All families, in display order.
    pub const ALL: [CurveFamily; 3] = [CurveFamily::Standard, CurveFamily::Very, CurveFamily::Extreme];

    /// Curve constants for this family.
    pub const fn parameters(&self) -> CurveParameters {
        match self {
            CurveFamily::Standard => STANDARD_INVERSE,
            CurveFamily::Very => VERY_INVERSE,
            CurveFamily::Extreme => EXTREMELY_INVERSE,
        }
    }

    /// Short identifier used in config files and on the command line.
    pub const fn id(&self) -> &'static str {
        match self {
            CurveFamily::Standard => "standard",
            CurveFamily::Very => "very",
            CurveFamily::Extreme => "extreme",
        }
    }

    /// Full IEC name.
    pub const fn name(&self) -> &'static str {
        match self {
            CurveFamily::Standard => "Standard Inverse",
            CurveFamily::Very => "Very Inverse",
            CurveFamily::Extreme => "Extremely Inverse",
        }
    }
}

/// Look up the constants for a curve family.
pub fn lookup(family: CurveFamily) -> CurveParameters {
    family.parameters()
}

impl FromStr for CurveFamily {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "standard-inverse" | "si" => Ok(CurveFamily::Standard),
            "very" | "very-inverse" | "vi" => Ok(CurveFamily::Very),
            "extreme" | "extreme-inverse" | "extremely-inverse" | "ei" => {
                Ok(CurveFamily::Extreme)
            }
            _ => Err(RelayError::InvalidCurveFamily(s.to_string())),
        }
    }
}

impl std::fmt::Display for CurveFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_constants() {
        assert_eq!(lookup(CurveFamily::Standard), CurveParameters { k: 0.14, alpha: 0.02 });
        assert_eq!(lookup(CurveFamily::Very), CurveParameters { k: 13.5, alpha: 1.0 });
        assert_eq!(lookup(CurveFamily::Extreme), CurveParameters { k: 80.0, alpha: 2.0 });
    }

    #[test]
    fn test_all_constants_positive() {
        for family in CurveFamily::ALL {
            let p = family.parameters();
            assert!(p.k > 0.0 && p.alpha > 0.0, "{family}");
        }
    }

    #[test]
    fn test_parse_family() {
        assert_eq!("standard".parse::<CurveFamily>().unwrap(), CurveFamily::Standard);
        assert_eq!("VERY".parse::<CurveFamily>().unwrap(), CurveFamily::Very);
        assert_eq!("extreme-inverse".parse::<CurveFamily>().unwrap(), CurveFamily::Extreme);
        assert_eq!(" ei ".parse::<CurveFamily>().unwrap(), CurveFamily::Extreme);
        assert!(matches!(
            "moderate".parse::<CurveFamily>(),
            Err(RelayError::InvalidCurveFamily(_))
        ));
    }

    #[test]
    fn test_operating_time_undefined_at_pickup() {
        assert_eq!(STANDARD_INVERSE.operating_time(1.0, 0.1), None);
        assert_eq!(STANDARD_INVERSE.operating_time(0.5, 0.1), None);
        assert_eq!(VERY_INVERSE.operating_time(f64::NAN, 0.1), None);
    }

    #[test]
    fn test_very_inverse_operating_time() {
        // VI at PSM 10, TMS 1.0: 13.5 / 9 = 1.5 s
        let t = VERY_INVERSE.operating_time(10.0, 1.0).unwrap();
        assert!((t - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_required_tms_inverts_operating_time() {
        for family in CurveFamily::ALL {
            let p = family.parameters();
            let tms = p.required_tms(4.0, 0.25).unwrap();
            let t = p.operating_time(4.0, tms).unwrap();
            assert!((t - 0.25).abs() < 1e-9, "{family}: {t}");
        }
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&CurveFamily::Very).unwrap();
        assert_eq!(json, "\"very\"");
        let parsed: CurveFamily = serde_json::from_str("\"extreme\"").unwrap();
        assert_eq!(parsed, CurveFamily::Extreme);
    }
}
