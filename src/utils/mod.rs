//! Utility functions and helpers.
//!
//! - [`time`] - Lookback window math and timestamp parsing
//! - [`format`] - Number and CSV cell formatting
//! - [`progress`] - Spinner shown while pages are fetched
//! - [`reader`] - File reader with automatic decompression
//!
//! # Examples
//!
//! ```no_run
//! use travel_audit_tools::utils::time::LookbackWindow;
//!
//! # fn main() -> anyhow::Result<()> {
//! let window = LookbackWindow::ending_now(1)?;
//! println!("{} .. {}", window.min_time_ms(), window.max_time_ms());
//! # Ok(())
//! # }
//! ```

pub mod format;
pub mod progress;
pub mod reader;
pub mod time;
