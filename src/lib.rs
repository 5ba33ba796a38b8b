//! IDMT Relay Settings Library
//!
//! Adaptive settings for IEC inverse definite minimum time (IDMT)
//! overcurrent relays on feeders with inverter-based resources.
//!
//! # Features
//!
//! - IEC standard, very and extremely inverse curve table
//! - Pickup current and time multiplier (TMS) calculation with sensitivity
//!   and TMS range safeguards
//! - Time-current characteristic (TCC) sampling for log-log charts
//! - A stateful session that recomputes and re-renders on every input
//! - Fixed versus adaptive studies, a corner-case bench and a scenario
//!   dataset generator
//! - A small neural surrogate trained on generated scenarios
//!
//! # Example
//!
//! ```
//! use idmt_relay_settings::relay::{CurveFamily, RelayInputs, compute_settings};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let inputs = RelayInputs::new(5000.0, 800.0, false, CurveFamily::Standard)?;
//!     let settings = compute_settings(&inputs);
//!     assert_eq!(settings.pickup_current, 1000.0);
//!
//!     // Trip time at the fault current matches the 0.25 s target
//!     let params = inputs.curve_family().parameters();
//!     let t = params.operating_time(5.0, settings.time_multiplier).unwrap();
//!     assert!((t - 0.25).abs() < 1e-9);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod relay;
pub mod session;
pub mod storage;
pub mod system;
pub mod tcc;
pub mod utils;

// Re-exports for convenience
pub use config::{ProtectionMode, SamplingPolicy, SettingsPolicy};
pub use error::{RelayError, Result};
pub use relay::{CurveFamily, RelayInputs, RelaySettings, compute_settings};
pub use session::{RelayInput, RelaySession, TccRenderer};
pub use tcc::TccView;
