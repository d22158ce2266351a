#![forbid(unsafe_code)]

//! Core domain model and session logic for cprtrack, a resuscitation
//! (code) tracker.
//!
//! This crate provides:
//! - Domain types (events, timers, alerts, algorithm path, patient details)
//! - The pure session state machine and the rules it is built from
//! - Persistence of the live snapshot and finished-code history
//! - The suggestion-service contract
//! - A tracker binding the machine to a clock and a store

pub mod types;
pub mod error;
pub mod event_log;
pub mod aggregate;
pub mod timers;
pub mod algorithm;
pub mod session;
pub mod machine;
pub mod history;
pub mod suggestions;
pub mod format;
pub mod config;
pub mod logging;
pub mod clock;
pub mod store;
pub mod tracker;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use event_log::EventLog;
pub use session::Session;
pub use machine::{apply, Action};
pub use algorithm::{next_shock_energy, recommend, Recommendation, RecommendedAction};
pub use history::{find_record, Outcome, RecordSelector, SavedRecord};
pub use suggestions::{SuggestionService, SuggestionState};
pub use config::Config;
pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{FileStore, MemoryStore, SessionStore};
pub use tracker::Tracker;
