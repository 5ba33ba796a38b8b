//! Random operating scenarios labelled with their analytical settings.
//!
//! Records feed [`SurrogateModel::train`](super::SurrogateModel::train) and
//! can be written as plain CSV with one header row.

use std::io::Write;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::study::evaluate_scenario;
use crate::config::SettingsPolicy;
use crate::error::{RelayError, Result};
use crate::relay::CurveFamily;

/// CSV header, in field order.
pub const CSV_HEADER: &str =
    "i_load,i_grid,i_ibr_potential,ibr_active,i_fault,is_pickup_target,tms_target";

/// Uniform sampling ranges, all in amperes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioRanges {
    pub load: (f64, f64),
    pub grid_fault: (f64, f64),
    pub ibr_fault: (f64, f64),
    /// Probability that the IBR is connected.
    pub ibr_probability: f64,
}

impl Default for ScenarioRanges {
    fn default() -> Self {
        Self {
            load: (200.0, 1200.0),
            grid_fault: (2000.0, 8000.0),
            ibr_fault: (300.0, 1500.0),
            ibr_probability: 0.5,
        }
    }
}

impl ScenarioRanges {
    pub fn validate(&self) -> Result<()> {
        for (name, (low, high)) in [
            ("load", self.load),
            ("grid_fault", self.grid_fault),
            ("ibr_fault", self.ibr_fault),
        ] {
            if !(low.is_finite() && high.is_finite() && low > 0.0 && low < high) {
                return Err(RelayError::InvalidConfig(format!(
                    "{} range must satisfy 0 < low < high, got {}..{}",
                    name, low, high
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.ibr_probability) {
            return Err(RelayError::InvalidConfig(format!(
                "ibr_probability must be within 0..=1, got {}",
                self.ibr_probability
            )));
        }
        Ok(())
    }
}

/// One labelled scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScenarioRecord {
    pub i_load: f64,
    pub i_grid: f64,
    pub i_ibr_potential: f64,
    pub ibr_active: bool,
    pub i_fault: f64,
    pub is_pickup_target: f64,
    pub tms_target: f64,
}

/// Draw `count` scenarios from `ranges` with a seeded generator.
///
/// The same seed always yields the same records.
pub fn generate_scenarios(
    count: usize,
    seed: u64,
    ranges: &ScenarioRanges,
    curve: CurveFamily,
    policy: &SettingsPolicy,
) -> Result<Vec<ScenarioRecord>> {
    ranges.validate()?;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        let i_load = rng.random_range(ranges.load.0..ranges.load.1);
        let i_grid = rng.random_range(ranges.grid_fault.0..ranges.grid_fault.1);
        let i_ibr_potential = rng.random_range(ranges.ibr_fault.0..ranges.ibr_fault.1);
        let ibr_active = rng.random_bool(ranges.ibr_probability);

        let i_fault = if ibr_active {
            i_grid + i_ibr_potential
        } else {
            i_grid
        };
        let report = evaluate_scenario(i_load, i_fault, ibr_active, curve, policy)?;

        records.push(ScenarioRecord {
            i_load,
            i_grid,
            i_ibr_potential,
            ibr_active,
            i_fault,
            is_pickup_target: report.settings.pickup_current,
            tms_target: report.settings.time_multiplier,
        });
    }

    debug!(count, seed, "generated scenarios");
    Ok(records)
}

/// Write `records` as CSV. The IBR flag is written as `0`/`1`.
pub fn write_csv<W: Write>(records: &[ScenarioRecord], mut writer: W) -> Result<()> {
    let io_err = |e: std::io::Error| RelayError::Storage(format!("Failed to write CSV: {}", e));

    writeln!(writer, "{}", CSV_HEADER).map_err(io_err)?;
    for r in records {
        writeln!(
            writer,
            "{},{},{},{},{},{},{}",
            r.i_load,
            r.i_grid,
            r.i_ibr_potential,
            u8::from(r.ibr_active),
            r.i_fault,
            r.is_pickup_target,
            r.tms_target
        )
        .map_err(io_err)?;
    }
    writer.flush().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(count: usize, seed: u64) -> Vec<ScenarioRecord> {
        generate_scenarios(
            count,
            seed,
            &ScenarioRanges::default(),
            CurveFamily::Standard,
            &SettingsPolicy::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_same_seed_same_records() {
        assert_eq!(generate(20, 42), generate(20, 42));
        assert_ne!(generate(20, 42), generate(20, 43));
    }

    #[test]
    fn test_records_within_ranges() {
        let ranges = ScenarioRanges::default();
        for r in generate(200, 7) {
            assert!(r.i_load >= ranges.load.0 && r.i_load < ranges.load.1);
            assert!(r.i_grid >= ranges.grid_fault.0 && r.i_grid < ranges.grid_fault.1);
            if r.ibr_active {
                assert_eq!(r.i_fault, r.i_grid + r.i_ibr_potential);
            } else {
                assert_eq!(r.i_fault, r.i_grid);
            }
            assert!(r.tms_target >= 0.05 && r.tms_target <= 1.1);
        }
    }

    #[test]
    fn test_write_csv() {
        let records = generate(3, 1);
        let mut out = Vec::new();
        write_csv(&records, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1].split(',').count(), 7);
        let flag = lines[1].split(',').nth(3).unwrap();
        assert!(flag == "0" || flag == "1");
    }

    #[test]
    fn test_invalid_ranges_rejected() {
        let ranges = ScenarioRanges {
            load: (500.0, 100.0),
            ..Default::default()
        };
        assert!(ranges.validate().is_err());

        let ranges = ScenarioRanges {
            ibr_probability: 1.5,
            ..Default::default()
        };
        assert!(ranges.validate().is_err());
    }
}
