//! Neural surrogate of the settings engine.
//!
//! A 4 -> 8 -> 2 ReLU network fitted to labelled scenarios. From the network
//! state it predicts pickup current and TMS, so the bench can show how far a
//! learned model drifts from the analytical settings on stressed cases.

use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::dataset::ScenarioRecord;
use crate::error::{RelayError, Result};

/// Load, grid fault, IBR fault potential, IBR connected.
pub const INPUT_DIM: usize = 4;
const HIDDEN: usize = 8;
/// Pickup current, TMS.
pub const OUTPUT_DIM: usize = 2;
const EPS_STD: f64 = 1e-8;

// =============================================================================
// Training Config
// =============================================================================

/// Full-batch gradient descent settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    /// Standard deviation of the initial weights.
    pub init_scale: f64,
    /// Seed for weight initialisation.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 2000,
            learning_rate: 0.01,
            init_scale: 0.1,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(RelayError::InvalidConfig(
                "training.epochs must be at least 1".into(),
            ));
        }
        for (name, value) in [
            ("learning_rate", self.learning_rate),
            ("init_scale", self.init_scale),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(RelayError::InvalidConfig(format!(
                    "training.{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Model
// =============================================================================

/// Network state the surrogate predicts from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurrogateFeatures {
    pub i_load: f64,
    pub i_grid: f64,
    pub i_ibr_potential: f64,
    pub ibr_active: bool,
}

impl SurrogateFeatures {
    fn row(&self) -> [f64; INPUT_DIM] {
        [
            self.i_load,
            self.i_grid,
            self.i_ibr_potential,
            if self.ibr_active { 1.0 } else { 0.0 },
        ]
    }
}

impl From<&ScenarioRecord> for SurrogateFeatures {
    fn from(record: &ScenarioRecord) -> Self {
        Self {
            i_load: record.i_load,
            i_grid: record.i_grid,
            i_ibr_potential: record.i_ibr_potential,
            ibr_active: record.ibr_active,
        }
    }
}

/// Predicted settings. Not clamped to any policy range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurrogatePrediction {
    pub pickup_current: f64,
    pub time_multiplier: f64,
}

/// Weights plus the normalisation fitted on the training set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurrogateWeights {
    pub w1: Array2<f64>,          // (4, 8)
    pub b1: Array1<f64>,          // (8,)
    pub w2: Array2<f64>,          // (8, 2)
    pub b2: Array1<f64>,          // (2,)
    pub input_mean: Array1<f64>,  // (4,)
    pub input_std: Array1<f64>,   // (4,)
    pub output_mean: Array1<f64>, // (2,)
    pub output_std: Array1<f64>,  // (2,)
}

/// Loss per epoch, in normalised units.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    pub loss_history: Vec<f64>,
}

impl TrainingReport {
    pub fn initial_loss(&self) -> Option<f64> {
        self.loss_history.first().copied()
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.loss_history.last().copied()
    }
}

#[derive(Debug, Clone)]
pub struct SurrogateModel {
    weights: SurrogateWeights,
}

impl SurrogateModel {
    /// Wrap existing weights after checking their shapes.
    pub fn from_weights(weights: SurrogateWeights) -> Result<Self> {
        validate_shapes(&weights)?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &SurrogateWeights {
        &self.weights
    }

    /// Fit a fresh network to `records` with mean squared error.
    ///
    /// Inputs and targets are standardised per column; the statistics are
    /// kept in the weights so predictions come back in amperes and TMS.
    pub fn train(
        records: &[ScenarioRecord],
        config: &TrainingConfig,
    ) -> Result<(Self, TrainingReport)> {
        config.validate()?;
        if records.is_empty() {
            return Err(RelayError::InvalidConfig(
                "no scenarios to train the surrogate on".into(),
            ));
        }
        let n = records.len();

        let raw_x = Array2::from_shape_fn((n, INPUT_DIM), |(i, j)| {
            SurrogateFeatures::from(&records[i]).row()[j]
        });
        let raw_y = Array2::from_shape_fn((n, OUTPUT_DIM), |(i, j)| {
            let r = &records[i];
            [r.is_pickup_target, r.tms_target][j]
        });
        let (input_mean, input_std) = column_stats(&raw_x)?;
        let (output_mean, output_std) = column_stats(&raw_y)?;
        let xs = (&raw_x - &input_mean) / &input_std;
        let ys = (&raw_y - &output_mean) / &output_std;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut init = |rows: usize, cols: usize| {
            Array2::from_shape_fn((rows, cols), |_| {
                rng.sample::<f64, _>(StandardNormal) * config.init_scale
            })
        };
        let mut w1 = init(INPUT_DIM, HIDDEN);
        let mut w2 = init(HIDDEN, OUTPUT_DIM);
        let mut b1 = Array1::<f64>::zeros(HIDDEN);
        let mut b2 = Array1::<f64>::zeros(OUTPUT_DIM);

        let lr = config.learning_rate;
        let mut loss_history = Vec::with_capacity(config.epochs);
        for epoch in 0..config.epochs {
            // Forward
            let z1 = xs.dot(&w1) + &b1;
            let a1 = z1.mapv(relu);
            let z2 = a1.dot(&w2) + &b2;

            let err = &z2 - &ys;
            let loss = err.mapv(|e| e * e).mean().unwrap_or(0.0);
            if !loss.is_finite() {
                return Err(RelayError::InvalidConfig(format!(
                    "surrogate training diverged at epoch {}, lower training.learning_rate",
                    epoch
                )));
            }
            loss_history.push(loss);
            if epoch % 200 == 0 {
                debug!(epoch, loss, "surrogate training");
            }

            // Backward
            let dz2 = err * (2.0 / n as f64);
            let dw2 = a1.t().dot(&dz2);
            let db2 = dz2.sum_axis(Axis(0));
            let dz1 = dz2.dot(&w2.t()) * &z1.mapv(relu_grad);
            let dw1 = xs.t().dot(&dz1);
            let db1 = dz1.sum_axis(Axis(0));

            w1.scaled_add(-lr, &dw1);
            b1.scaled_add(-lr, &db1);
            w2.scaled_add(-lr, &dw2);
            b2.scaled_add(-lr, &db2);
        }

        let report = TrainingReport { loss_history };
        info!(
            samples = n,
            epochs = config.epochs,
            final_loss = report.final_loss(),
            "surrogate trained"
        );

        let model = Self {
            weights: SurrogateWeights {
                w1,
                b1,
                w2,
                b2,
                input_mean,
                input_std,
                output_mean,
                output_std,
            },
        };
        Ok((model, report))
    }

    pub fn predict(&self, features: &SurrogateFeatures) -> SurrogatePrediction {
        let w = &self.weights;
        let std_safe = w.input_std.mapv(|v| v.abs().max(EPS_STD));
        let x = (Array1::from(features.row().to_vec()) - &w.input_mean) / &std_safe;

        let h = (x.dot(&w.w1) + &w.b1).mapv(relu);
        let out = (h.dot(&w.w2) + &w.b2) * &w.output_std + &w.output_mean;
        SurrogatePrediction {
            pickup_current: out[0],
            time_multiplier: out[1],
        }
    }

    /// Load weights written by [`SurrogateModel::save_to`].
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RelayError::Storage(format!("Failed to read surrogate: {}", e)))?;
        let weights: SurrogateWeights = serde_json::from_str(&content)
            .map_err(|e| RelayError::Storage(format!("Failed to parse surrogate: {}", e)))?;
        Self::from_weights(weights)
    }

    /// Save weights as JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| RelayError::Storage(format!("Failed to create model dir: {}", e)))?;
        }
        let content = serde_json::to_string_pretty(&self.weights)
            .map_err(|e| RelayError::Storage(format!("Failed to serialize surrogate: {}", e)))?;
        std::fs::write(path, content)
            .map_err(|e| RelayError::Storage(format!("Failed to write surrogate: {}", e)))
    }
}

fn column_stats(data: &Array2<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
    let mean = data
        .mean_axis(Axis(0))
        .ok_or_else(|| RelayError::InvalidConfig("empty training set".into()))?;
    let std = data.std_axis(Axis(0), 0.0).mapv(|v| v.max(EPS_STD));
    Ok((mean, std))
}

fn validate_shapes(w: &SurrogateWeights) -> Result<()> {
    let matrices = [
        ("w1", w.w1.dim(), (INPUT_DIM, HIDDEN)),
        ("w2", w.w2.dim(), (HIDDEN, OUTPUT_DIM)),
    ];
    for (name, actual, expected) in matrices {
        if actual != expected {
            return Err(RelayError::InvalidConfig(format!(
                "Invalid {} shape {:?}, expected {:?}",
                name, actual, expected
            )));
        }
    }

    let vectors = [
        ("b1", w.b1.len(), HIDDEN),
        ("b2", w.b2.len(), OUTPUT_DIM),
        ("input_mean", w.input_mean.len(), INPUT_DIM),
        ("input_std", w.input_std.len(), INPUT_DIM),
        ("output_mean", w.output_mean.len(), OUTPUT_DIM),
        ("output_std", w.output_std.len(), OUTPUT_DIM),
    ];
    for (name, actual, expected) in vectors {
        if actual != expected {
            return Err(RelayError::InvalidConfig(format!(
                "Invalid {} length {}, expected {}",
                name, actual, expected
            )));
        }
    }
    Ok(())
}

fn relu(x: f64) -> f64 {
    x.max(0.0)
}

fn relu_grad(x: f64) -> f64 {
    if x > 0.0 { 1.0 } else { 0.0 }
}
