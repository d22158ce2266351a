//! Records of finished codes.
//!
//! When a session ends it is frozen into a [`SavedRecord`] and appended to
//! the history store; past records can later be opened read-only.

use crate::{EventKind, EventRecord, PatientDetails, Session, SummaryCounts};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// How a code ended
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Rosc,
    Ceased,
    Unknown,
}

impl Outcome {
    /// ROSC when the newest event is a ROSC rhythm check, otherwise unknown
    pub fn derive(session: &Session) -> Self {
        match session.event_log.latest_kind() {
            Some(EventKind::RhythmCheckRosc) => Outcome::Rosc,
            _ => Outcome::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Rosc => "ROSC",
            Outcome::Ceased => "Ceased",
            Outcome::Unknown => "Unknown",
        }
    }
}

/// A finished code as stored in history
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SavedRecord {
    pub id: Uuid,
    pub saved_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub elapsed_seconds: u64,
    #[serde(default)]
    pub patient: PatientDetails,
    pub summary_counts: SummaryCounts,
    /// Newest first, as in the live log
    pub events: Vec<EventRecord>,
    pub outcome: Outcome,
}

impl SavedRecord {
    pub fn from_session(session: &Session, now: DateTime<Utc>) -> Self {
        SavedRecord {
            id: Uuid::new_v4(),
            saved_at: now,
            started_at: session.started_at.unwrap_or(now),
            elapsed_seconds: session.elapsed_seconds,
            patient: session.patient.clone(),
            summary_counts: session.summary_counts.clone(),
            events: session.event_log.to_vec(),
            outcome: Outcome::derive(session),
        }
    }
}

/// Selects a record from loaded history
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordSelector {
    Latest,
    Id(Uuid),
}

impl FromStr for RecordSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("last") || s.eq_ignore_ascii_case("latest") {
            return Ok(RecordSelector::Latest);
        }
        Uuid::parse_str(s)
            .map(RecordSelector::Id)
            .map_err(|e| format!("Invalid record id {}: {}", s, e))
    }
}

/// Find a record in history as returned by the store (oldest first)
pub fn find_record(history: &[SavedRecord], selector: RecordSelector) -> Option<&SavedRecord> {
    match selector {
        RecordSelector::Latest => history.last(),
        RecordSelector::Id(id) => history.iter().find(|r| r.id == id),
    }
}
