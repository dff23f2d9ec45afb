//! # Travel Audit Tools
//!
//! Detects "impossible travel" in Duo authentication logs: the same user
//! logging in from two different locations closer together in time than
//! anyone could travel between them.
//!
//! ## Overview
//!
//! One run covers one lookback window ending now. Authentication events are
//! pulled page by page from the Duo Admin API (or loaded from saved exports),
//! normalized, narrowed to users seen at more than one location, and then
//! each user's logins are compared in time order. Users whose location
//! changes faster than the configured number of hours are flagged.
//!
//! The run is a single straight-line batch: no stage runs concurrently with
//! another and the whole window is held in memory.
//!
//! ## Architecture
//!
//! - [`authlog`] - Record shapes, flattening and export parsing
//! - [`duo_api`] - Signed Duo Admin API client
//! - [`detection`] - Fetch, normalize, multi-location filter and detector stages
//! - [`report`] - Review CSV, flag log summary and JSON export
//! - [`config`] - Detection options
//! - [`error`] - Typed stage errors
//! - [`commands`] - `detect` and `analyze` command implementations
//! - [`utils`] - Time, formatting, progress and file helpers
//!
//! ## Example Usage
//!
//! ```bash
//! # Last day of logs, flag location changes under two hours
//! travel-audit detect --days-to-go-back 1 --hours-to-compare 2
//!
//! # Replay a saved export with a wider threshold
//! travel-audit analyze authlogs.json.gz --hours-to-compare 6 --output review.csv
//! ```
//!
//! ## Pairing
//!
//! Logins are compared in disjoint pairs, most recent first: the 1st with
//! the 2nd, the 3rd with the 4th, and so on. A fast change between the 2nd
//! and 3rd login is therefore not seen. Pass `--sliding-pairs` to compare
//! every neighbouring pair instead.

pub mod authlog;
pub mod commands;
pub mod config;
pub mod detection;
pub mod duo_api;
pub mod error;
pub mod report;
pub mod utils;
