//! Feeder model, the studies run against it and the learned surrogate.

pub mod dataset;
pub mod model;
pub mod study;
pub mod surrogate;

pub use dataset::{ScenarioRanges, ScenarioRecord, generate_scenarios, write_csv};
pub use model::SystemModel;
pub use study::{
    BenchResult, CORNER_CASES, ComparisonStudy, CornerCase, SchemeResult, SurrogateComparison,
    evaluate_scenario, run_bench, run_comparison, target_time_for,
};
pub use surrogate::{
    SurrogateFeatures, SurrogateModel, SurrogatePrediction, TrainingConfig, TrainingReport,
};
