//! Guided cardiac-arrest algorithm.
//!
//! The session owns only a path and a step counter. This module holds the
//! rules that move them and the stateless policy table that turns them into
//! a recommendation:
//! - Classifying the rhythm picks a path and starts at step 1
//! - Qualifying interventions advance the step by one
//! - ROSC resets to no path, step 0
//! - Steps past the modeled table settle into "continuing cycles"

use crate::{AlgorithmPath, AlgorithmState, EventKind, SummaryCounts};
use serde::{Deserialize, Serialize};

/// Selectable defibrillator energies in joules, ascending
pub const SHOCK_ENERGY_LADDER: [u32; 5] = [120, 150, 200, 300, 360];

/// Energy offered for a first shock
pub const DEFAULT_SHOCK_ENERGY: u32 = 200;

/// Cumulative amiodarone ceiling per code, mg
pub const AMIODARONE_MAX_MG: u32 = 450;

/// Cumulative lidocaine ceiling per code, mg
pub const LIDOCAINE_MAX_MG: u32 = 300;

impl AlgorithmState {
    /// Whether logging `kind` moves the algorithm forward on this path.
    ///
    /// Epinephrine counts on either path; shocks and antiarrhythmics only on
    /// the shockable path.
    pub fn advances_on(&self, kind: EventKind) -> bool {
        match (self.path, kind) {
            (None, _) => false,
            (Some(_), EventKind::EpinephrineGiven) => true,
            (
                Some(AlgorithmPath::Shockable),
                EventKind::ShockDelivered | EventKind::AmiodaroneGiven | EventKind::LidocaineGiven,
            ) => true,
            _ => false,
        }
    }

    /// Apply a logged event to the path/step counter
    pub fn on_event(&mut self, kind: EventKind) {
        if kind == EventKind::RhythmCheckRosc {
            self.reset();
        } else if self.advances_on(kind) {
            self.step += 1;
            tracing::debug!("Algorithm advanced to step {} on {}", self.step, kind);
        }
    }

    /// Enter a path at step 1. Returns false if a path is already set.
    pub fn classify(&mut self, path: AlgorithmPath) -> bool {
        if self.path.is_some() {
            return false;
        }
        self.path = Some(path);
        self.step = 1;
        true
    }

    pub fn reset(&mut self) {
        self.path = None;
        self.step = 0;
    }
}

/// What the operator should do next
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    DeliverShock,
    ResumeCpr,
    GiveEpinephrine,
    GiveAntiarrhythmic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Recommendation {
    pub title: &'static str,
    pub description: &'static str,
    pub action: RecommendedAction,
}

const CONTINUING_CYCLES: Recommendation = Recommendation {
    title: "Continuing Cycles",
    description: "Continue CPR, administer Epinephrine every 3-5 mins.",
    action: RecommendedAction::GiveEpinephrine,
};

const SHOCKABLE_STEPS: [Recommendation; 7] = [
    Recommendation {
        title: "Shockable Rhythm: VF/pVT",
        description: "First action is to defibrillate.",
        action: RecommendedAction::DeliverShock,
    },
    Recommendation {
        title: "Post-Shock",
        description: "Immediately resume compressions. Epinephrine is next.",
        action: RecommendedAction::ResumeCpr,
    },
    Recommendation {
        title: "Epinephrine Cycle",
        description: "Administer Epinephrine, then prepare for next rhythm check.",
        action: RecommendedAction::GiveEpinephrine,
    },
    Recommendation {
        title: "Post-Epinephrine",
        description: "Continue CPR. Another shock is due if rhythm persists.",
        action: RecommendedAction::ResumeCpr,
    },
    Recommendation {
        title: "Refractory VF/pVT",
        description: "Deliver another shock.",
        action: RecommendedAction::DeliverShock,
    },
    Recommendation {
        title: "Antiarrhythmic Cycle",
        description: "Immediately resume CPR. Consider antiarrhythmic drugs.",
        action: RecommendedAction::ResumeCpr,
    },
    Recommendation {
        title: "Administer Antiarrhythmic",
        description: "Administer Amiodarone or Lidocaine.",
        action: RecommendedAction::GiveAntiarrhythmic,
    },
];

const NON_SHOCKABLE_STEPS: [Recommendation; 2] = [
    Recommendation {
        title: "Non-Shockable: Asystole/PEA",
        description: "Administer Epinephrine as soon as possible.",
        action: RecommendedAction::GiveEpinephrine,
    },
    Recommendation {
        title: "Post-Epinephrine",
        description: "Immediately resume high-quality CPR.",
        action: RecommendedAction::ResumeCpr,
    },
];

/// Look up the guided action for the current path and step.
///
/// `None` until a rhythm has been classified.
pub fn recommend(state: &AlgorithmState) -> Option<Recommendation> {
    let table: &[Recommendation] = match state.path? {
        AlgorithmPath::Shockable => &SHOCKABLE_STEPS,
        AlgorithmPath::NonShockable => &NON_SHOCKABLE_STEPS,
    };
    let index = (state.step as usize).checked_sub(1)?;
    Some(table.get(index).copied().unwrap_or(CONTINUING_CYCLES))
}

/// Energy to offer for the next shock, stepping up the ladder.
///
/// Reads the joules from the last shock's label; holds at the top rung and
/// falls back to [`DEFAULT_SHOCK_ENERGY`] when nothing usable was recorded.
pub fn next_shock_energy(last_shock_energy: Option<&str>) -> u32 {
    let Some(last) = last_shock_energy.map(crate::aggregate::parse_dose) else {
        return DEFAULT_SHOCK_ENERGY;
    };
    if last == 0 {
        return DEFAULT_SHOCK_ENERGY;
    }
    SHOCK_ENERGY_LADDER
        .iter()
        .copied()
        .find(|&level| level > last)
        .unwrap_or(last)
}

/// Whether the cumulative ceiling for antiarrhythmic `kind` has been reached.
///
/// Advisory only: logging is never blocked.
pub fn antiarrhythmic_limit_reached(counts: &SummaryCounts, kind: EventKind) -> bool {
    match kind {
        EventKind::AmiodaroneGiven => counts.amiodarone_mg >= AMIODARONE_MAX_MG,
        EventKind::LidocaineGiven => counts.lidocaine_mg >= LIDOCAINE_MAX_MG,
        _ => false,
    }
}
