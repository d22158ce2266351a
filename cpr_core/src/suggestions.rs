//! Contract with the external suggestion service.
//!
//! The core builds a plain-text digest of the session, hands it to a
//! [`SuggestionService`], and keeps the dash-prefixed lines of the reply.
//! Requests are numbered so that only the most recent attempt's outcome is
//! ever shown.

use crate::format::{format_clock, format_countdown};
use crate::{Result, Session};
use serde::{Deserialize, Serialize};

/// Shown when the service answered but nothing usable came back
pub const EMPTY_REPLY_MESSAGE: &str = "Could not generate suggestions. Please try again.";

/// Suggestion sub-state carried on the session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct SuggestionState {
    pub loading: bool,
    pub error: Option<String>,
    pub items: Vec<String>,
    /// Number of the most recently issued request
    pub request: u64,
}

impl SuggestionState {
    pub(crate) fn begin(&mut self) -> u64 {
        self.request += 1;
        self.loading = true;
        self.error = None;
        self.items.clear();
        self.request
    }

    /// Accept a completion for `request`. Stale completions are dropped.
    pub(crate) fn complete(
        &mut self,
        request: u64,
        outcome: std::result::Result<Vec<String>, String>,
    ) -> bool {
        if request != self.request || !self.loading {
            tracing::debug!(
                "Ignoring suggestion result for request {} (latest {})",
                request,
                self.request
            );
            return false;
        }
        self.loading = false;
        match outcome {
            Ok(items) => {
                self.items = items;
                self.error = None;
            }
            Err(reason) => {
                self.items.clear();
                self.error = Some(reason);
            }
        }
        true
    }
}

/// External text-generation collaborator
pub trait SuggestionService {
    /// Send the digest, returning the raw reply text
    fn suggest(&mut self, digest: &str) -> Result<String>;
}

/// Plain-text summary of the session sent to the suggestion service
pub fn build_digest(session: &Session) -> String {
    let rhythm = match session.timers.rhythm_check_remaining {
        Some(r) if r > 0 => format!("{} remaining", format_countdown(r as i64)),
        _ => "Due now".to_string(),
    };
    let epinephrine = match session.timers.epinephrine_remaining {
        Some(e) if e > 0 => format!("{} remaining", format_countdown(e as i64)),
        _ => "Consider administering".to_string(),
    };
    let last_event = match session.latest_event() {
        Some(e) => format!(
            "{} at {}",
            e.kind.label(),
            format_clock(e.occurred_at_elapsed_seconds as i64)
        ),
        None => format!("None at {}", format_clock(0)),
    };
    let counts = &session.summary_counts;
    let mut medications = format!(
        "Epinephrine x{}, Amiodarone {}mg total, Lidocaine {}mg total",
        counts.epinephrine, counts.amiodarone_mg, counts.lidocaine_mg
    );
    for (name, n) in &counts.other_medications {
        medications.push_str(&format!(", {} x{}", name, n));
    }
    let causes: Vec<&str> = session
        .reversible_causes
        .considered()
        .iter()
        .map(|c| c.label())
        .collect();
    let causes = if causes.is_empty() {
        "None".to_string()
    } else {
        causes.join(", ")
    };

    format!(
        "Current Code State:\n\
         - Total Duration: {}\n\
         - Time until next rhythm check: {}\n\
         - Time until next epinephrine dose: {}\n\
         - Total shocks delivered: {}\n\
         - Last shock energy: {}\n\
         - Last event logged: {}\n\
         - Known medications given: {}\n\
         - H's and T's Considered: {}\n",
        format_clock(session.elapsed_seconds as i64),
        rhythm,
        epinephrine,
        counts.shocks,
        session.last_shock_energy.as_deref().unwrap_or("None"),
        last_event,
        medications,
        causes,
    )
}

/// Keep only lines beginning with a dash, with the dash stripped
pub fn parse_suggestions(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter_map(|line| line.strip_prefix('-'))
        .map(|line| line.trim().to_string())
        .collect()
}
