//! Time-current characteristic (TCC) generation.
//!
//! Provides curve sampling and the view model handed to renderers.

mod sampler;
mod view;

pub use sampler::{
    CurrentGrid, CurveSample, TccSamples, operating_point, sample_at, sample_curve, trip_time,
};
pub use view::{DisplayValues, TccView};
