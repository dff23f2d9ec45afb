//! Duo authentication log records and their parsing.
//!
//! - [`types`] - Flattened record shapes, pages and continuation tokens
//! - [`parser`] - Loader for saved exports used by offline replay
//!
//! ## Example
//!
//! ```no_run
//! use travel_audit_tools::authlog::parser::load_records;
//! use travel_audit_tools::authlog::types::FlatEvent;
//!
//! let loaded = load_records("authlogs.json.gz").unwrap();
//! for record in loaded.records {
//!     let event = FlatEvent::from_record(record).unwrap();
//!     println!("{:?} at {}", event.user_id, event.timestamp);
//! }
//! ```

pub mod parser;
pub mod types;
