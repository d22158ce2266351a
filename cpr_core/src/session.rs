//! The session value: the single authoritative record of one code.

use crate::{
    AlgorithmState, Alerts, EventLog, EventRecord, PatientDetails, Prompt, ReversibleCauses,
    SavedRecord, SessionStatus, SuggestionState, SummaryCounts, TimerSettings, Timers,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One resuscitation event and everything derived from it.
///
/// Replaced whole on every transition; see [`crate::machine::apply`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Session {
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    pub timer_settings: TimerSettings,
    pub timers: Timers,
    /// `None` while compressions are in progress
    pub last_compression_stopped_at: Option<DateTime<Utc>>,
    pub algorithm: AlgorithmState,
    pub reversible_causes: ReversibleCauses,
    pub summary_counts: SummaryCounts,
    pub last_shock_energy: Option<String>,
    pub patient: PatientDetails,
    pub event_log: EventLog,
    pub alerts: Alerts,
    pub pending_prompt: Option<Prompt>,
    pub suggestions: SuggestionState,
    /// Record on display while in HistoryView
    pub viewing: Option<SavedRecord>,
    /// State before the last snapshot-taking action. Never nested.
    pub undo_snapshot: Option<Box<Session>>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn latest_event(&self) -> Option<&EventRecord> {
        self.event_log.latest()
    }

    pub fn can_undo(&self) -> bool {
        self.undo_snapshot.is_some()
    }

    /// Copy of this state suitable for the undo slot
    pub(crate) fn undo_copy(&self) -> Box<Session> {
        let mut copy = self.clone();
        copy.undo_snapshot = None;
        Box::new(copy)
    }

    /// Copy with transient fields stripped, for durable storage.
    ///
    /// Prompts, alert flags, the undo slot and suggestion results do not
    /// survive a reload; alerts re-derive on the next tick.
    pub fn to_snapshot(&self) -> Session {
        Session {
            alerts: Alerts::default(),
            pending_prompt: None,
            suggestions: SuggestionState::default(),
            viewing: None,
            undo_snapshot: None,
            ..self.clone()
        }
    }
}
