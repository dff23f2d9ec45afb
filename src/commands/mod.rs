//! Command implementations.
//!
//! - [`detect`] - Pull the lookback window from the Duo Admin API and flag impossible travel
//! - [`analyze`] - Run the same detection over saved authentication log exports

pub mod analyze;
pub mod detect;
