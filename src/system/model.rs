//! Simplified 4-bus distribution feeder.
//!
//! Fault level at the protected bus is the grid contribution plus, when the
//! inverter-based resource is connected, its current-limited contribution.

use serde::{Deserialize, Serialize};

/// Feeder parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemModel {
    /// Nominal voltage (V).
    pub v_nom: f64,
    /// Fault current supplied by the grid (A).
    pub grid_fault_current: f64,
    /// Fault current supplied by the IBR (A).
    pub ibr_fault_current: f64,
    /// Maximum load current through the relay (A).
    pub max_load_current: f64,
}

impl Default for SystemModel {
    fn default() -> Self {
        Self {
            v_nom: 11_000.0,
            grid_fault_current: 5000.0,
            ibr_fault_current: 500.0,
            max_load_current: 800.0,
        }
    }
}

impl SystemModel {
    /// Total fault current at the protected bus.
    pub fn fault_current(&self, ibr_active: bool) -> f64 {
        if ibr_active {
            self.grid_fault_current + self.ibr_fault_current
        } else {
            self.grid_fault_current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_current() {
        let model = SystemModel::default();
        assert_eq!(model.fault_current(false), 5000.0);
        assert_eq!(model.fault_current(true), 5500.0);
    }
}
