//! Core domain types for the CPR tracker.
//!
//! This module defines the value types the session is built from:
//! - Clinical event kinds and immutable event records
//! - Session status, guided-algorithm path/step
//! - Timer settings, countdowns and alert flags
//! - Reversible-cause checklist (H's & T's) and patient details

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Events
// ============================================================================

/// Closed set of clinical events that can be logged during a code
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CompressionsStarted,
    ShockDelivered,
    EpinephrineGiven,
    AmiodaroneGiven,
    LidocaineGiven,
    OtherMedication,
    Note,
    RhythmCheckRosc,
    RhythmCheckPulseless,
    RhythmAnalyzed,
    ChecklistUpdate,
}

impl EventKind {
    pub const ALL: [EventKind; 11] = [
        EventKind::CompressionsStarted,
        EventKind::ShockDelivered,
        EventKind::EpinephrineGiven,
        EventKind::AmiodaroneGiven,
        EventKind::LidocaineGiven,
        EventKind::OtherMedication,
        EventKind::Note,
        EventKind::RhythmCheckRosc,
        EventKind::RhythmCheckPulseless,
        EventKind::RhythmAnalyzed,
        EventKind::ChecklistUpdate,
    ];

    /// Human-readable label used in logs and record displays
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::CompressionsStarted => "Compressions Started",
            EventKind::ShockDelivered => "Shock Delivered",
            EventKind::EpinephrineGiven => "Epinephrine",
            EventKind::AmiodaroneGiven => "Amiodarone",
            EventKind::LidocaineGiven => "Lidocaine",
            EventKind::OtherMedication => "Other Medication",
            EventKind::Note => "Nurse's Note",
            EventKind::RhythmCheckRosc => "Rhythm Check: ROSC",
            EventKind::RhythmCheckPulseless => "Rhythm Check: Pulseless",
            EventKind::RhythmAnalyzed => "Rhythm Analyzed",
            EventKind::ChecklistUpdate => "Checklist Update",
        }
    }

    /// Short machine name, the inverse of [`FromStr`]
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::CompressionsStarted => "compressions",
            EventKind::ShockDelivered => "shock",
            EventKind::EpinephrineGiven => "epinephrine",
            EventKind::AmiodaroneGiven => "amiodarone",
            EventKind::LidocaineGiven => "lidocaine",
            EventKind::OtherMedication => "medication",
            EventKind::Note => "note",
            EventKind::RhythmCheckRosc => "rosc",
            EventKind::RhythmCheckPulseless => "pulseless",
            EventKind::RhythmAnalyzed => "analyzed",
            EventKind::ChecklistUpdate => "checklist",
        }
    }

    /// Whether logging this event means hands came off the chest
    pub fn stops_compressions(&self) -> bool {
        matches!(
            self,
            EventKind::RhythmCheckRosc
                | EventKind::RhythmCheckPulseless
                | EventKind::RhythmAnalyzed
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        EventKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == wanted)
            .ok_or_else(|| format!("unknown event kind: {}", s))
    }
}

/// Event identifier.
///
/// Derived from the wall clock in milliseconds and bumped past the previous
/// id when two events land in the same millisecond, so ids sort by creation.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EventId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(EventId)
    }
}

/// A logged clinical event. Never mutated after creation.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRecord {
    pub id: EventId,
    pub kind: EventKind,
    /// Session-relative offset frozen at logging time
    pub occurred_at_elapsed_seconds: u64,
    #[serde(default)]
    pub details: Option<String>,
    pub actor: String,
    #[serde(default)]
    pub medication_name: Option<String>,
}

/// Payload of a log-event action
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEvent {
    pub kind: EventKind,
    pub details: Option<String>,
    pub actor: Option<String>,
    pub medication_name: Option<String>,
}

impl NewEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            details: None,
            actor: None,
            medication_name: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn with_medication(mut self, name: impl Into<String>) -> Self {
        self.medication_name = Some(name.into());
        self
    }

    /// Checklist entry recording that a reversible cause was toggled.
    ///
    /// `considered` is the flag's value after the toggle.
    pub fn checklist_update(cause: ReversibleCause, considered: bool) -> Self {
        let state = if considered {
            "Considered/Treated"
        } else {
            "Cleared"
        };
        Self::new(EventKind::ChecklistUpdate).with_details(format!("{}: {}", cause.label(), state))
    }
}

// ============================================================================
// Session status and algorithm
// ============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Inactive,
    Active,
    Review,
    HistoryView,
}

/// Guideline branch chosen after rhythm classification
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmPath {
    Shockable,
    NonShockable,
}

impl AlgorithmPath {
    /// Text recorded on the rhythm-analyzed event
    pub fn classification(&self) -> &'static str {
        match self {
            AlgorithmPath::Shockable => "Rhythm is VF/pVT (Shockable)",
            AlgorithmPath::NonShockable => "Rhythm is Asystole/PEA (Non-shockable)",
        }
    }
}

impl FromStr for AlgorithmPath {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shockable" | "vf" | "pvt" => Ok(AlgorithmPath::Shockable),
            "non-shockable" | "nonshockable" | "asystole" | "pea" => {
                Ok(AlgorithmPath::NonShockable)
            }
            other => Err(format!("unknown rhythm path: {}", other)),
        }
    }
}

/// Position in the guided algorithm. `step` is meaningless without a path.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AlgorithmState {
    pub path: Option<AlgorithmPath>,
    pub step: u32,
}

// ============================================================================
// Timers and alerts
// ============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimerSettings {
    pub rhythm_check_interval_seconds: u32,
    pub epinephrine_interval_seconds: u32,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            rhythm_check_interval_seconds: 120,
            epinephrine_interval_seconds: 180,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerKind {
    RhythmCheck,
    Epinephrine,
}

impl FromStr for TimerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rhythm" | "rhythm-check" => Ok(TimerKind::RhythmCheck),
            "epi" | "epinephrine" => Ok(TimerKind::Epinephrine),
            other => Err(format!("unknown timer: {}", other)),
        }
    }
}

/// Running countdowns in seconds; `None` means the timer is stopped
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Timers {
    pub rhythm_check_remaining: Option<u32>,
    pub epinephrine_remaining: Option<u32>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Alerts {
    pub rhythm_check_due: bool,
    pub prepare_epinephrine: bool,
    pub epinephrine_due: bool,
    pub no_flow: bool,
}

impl Alerts {
    pub fn any(&self) -> bool {
        self.rhythm_check_due || self.prepare_epinephrine || self.epinephrine_due || self.no_flow
    }
}

/// Operator-dismissable alerts. No-flow clears only by resuming compressions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlertKind {
    RhythmCheckDue,
    PrepareEpinephrine,
    EpinephrineDue,
}

impl FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rhythm" | "rhythm-check" => Ok(AlertKind::RhythmCheckDue),
            "prepare" | "prepare-epi" => Ok(AlertKind::PrepareEpinephrine),
            "epi" | "epi-due" | "epinephrine" => Ok(AlertKind::EpinephrineDue),
            other => Err(format!("unknown alert: {}", other)),
        }
    }
}

// ============================================================================
// Aggregates
// ============================================================================

/// Medication and shock totals. Always the fold of the current event log.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SummaryCounts {
    pub shocks: u32,
    pub epinephrine: u32,
    pub amiodarone_mg: u32,
    pub lidocaine_mg: u32,
    #[serde(default)]
    pub other_medications: BTreeMap<String, u32>,
}

// ============================================================================
// Reversible causes (H's & T's)
// ============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReversibleCause {
    Hypovolemia,
    Hypoxia,
    HydrogenIon,
    HypoHyperkalemia,
    Hypothermia,
    TensionPneumothorax,
    Tamponade,
    Toxins,
    ThrombosisPulmonary,
    ThrombosisCoronary,
}

impl ReversibleCause {
    pub const ALL: [ReversibleCause; 10] = [
        ReversibleCause::Hypovolemia,
        ReversibleCause::Hypoxia,
        ReversibleCause::HydrogenIon,
        ReversibleCause::HypoHyperkalemia,
        ReversibleCause::Hypothermia,
        ReversibleCause::TensionPneumothorax,
        ReversibleCause::Tamponade,
        ReversibleCause::Toxins,
        ReversibleCause::ThrombosisPulmonary,
        ReversibleCause::ThrombosisCoronary,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ReversibleCause::Hypovolemia => "Hypovolemia",
            ReversibleCause::Hypoxia => "Hypoxia",
            ReversibleCause::HydrogenIon => "Hydrogen Ion (Acidosis)",
            ReversibleCause::HypoHyperkalemia => "Hypo/Hyperkalemia",
            ReversibleCause::Hypothermia => "Hypothermia",
            ReversibleCause::TensionPneumothorax => "Tension Pneumothorax",
            ReversibleCause::Tamponade => "Tamponade (Cardiac)",
            ReversibleCause::Toxins => "Toxins",
            ReversibleCause::ThrombosisPulmonary => "Thrombosis (Pulmonary)",
            ReversibleCause::ThrombosisCoronary => "Thrombosis (Coronary)",
        }
    }

    fn key(&self) -> &'static str {
        match self {
            ReversibleCause::Hypovolemia => "hypovolemia",
            ReversibleCause::Hypoxia => "hypoxia",
            ReversibleCause::HydrogenIon => "hydrogen-ion",
            ReversibleCause::HypoHyperkalemia => "hypo-hyperkalemia",
            ReversibleCause::Hypothermia => "hypothermia",
            ReversibleCause::TensionPneumothorax => "tension-pneumothorax",
            ReversibleCause::Tamponade => "tamponade",
            ReversibleCause::Toxins => "toxins",
            ReversibleCause::ThrombosisPulmonary => "thrombosis-pulmonary",
            ReversibleCause::ThrombosisCoronary => "thrombosis-coronary",
        }
    }
}

impl FromStr for ReversibleCause {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('_', "-");
        ReversibleCause::ALL
            .iter()
            .copied()
            .find(|c| c.key() == wanted)
            .ok_or_else(|| format!("unknown reversible cause: {}", s))
    }
}

/// Differential-diagnosis checklist; each flag toggles independently
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ReversibleCauses {
    pub hypovolemia: bool,
    pub hypoxia: bool,
    pub hydrogen_ion: bool,
    pub hypo_hyperkalemia: bool,
    pub hypothermia: bool,
    pub tension_pneumothorax: bool,
    pub tamponade: bool,
    pub toxins: bool,
    pub thrombosis_pulmonary: bool,
    pub thrombosis_coronary: bool,
}

impl ReversibleCauses {
    fn flag_mut(&mut self, cause: ReversibleCause) -> &mut bool {
        match cause {
            ReversibleCause::Hypovolemia => &mut self.hypovolemia,
            ReversibleCause::Hypoxia => &mut self.hypoxia,
            ReversibleCause::HydrogenIon => &mut self.hydrogen_ion,
            ReversibleCause::HypoHyperkalemia => &mut self.hypo_hyperkalemia,
            ReversibleCause::Hypothermia => &mut self.hypothermia,
            ReversibleCause::TensionPneumothorax => &mut self.tension_pneumothorax,
            ReversibleCause::Tamponade => &mut self.tamponade,
            ReversibleCause::Toxins => &mut self.toxins,
            ReversibleCause::ThrombosisPulmonary => &mut self.thrombosis_pulmonary,
            ReversibleCause::ThrombosisCoronary => &mut self.thrombosis_coronary,
        }
    }

    pub fn is_considered(&self, cause: ReversibleCause) -> bool {
        let mut copy = *self;
        *copy.flag_mut(cause)
    }

    /// Flip one flag, returning its new value
    pub fn toggle(&mut self, cause: ReversibleCause) -> bool {
        let flag = self.flag_mut(cause);
        *flag = !*flag;
        *flag
    }

    /// Causes currently flagged, in checklist order
    pub fn considered(&self) -> Vec<ReversibleCause> {
        ReversibleCause::ALL
            .iter()
            .copied()
            .filter(|c| self.is_considered(*c))
            .collect()
    }
}

// ============================================================================
// Patient details
// ============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct PatientDetails {
    pub hn: String,
    pub name: String,
    pub age: String,
    pub sex: String,
    pub history: String,
    pub diagnosis: String,
}

/// Partial patient update; only `Some` fields are applied
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct PatientUpdate {
    pub hn: Option<String>,
    pub name: Option<String>,
    pub age: Option<String>,
    pub sex: Option<String>,
    pub history: Option<String>,
    pub diagnosis: Option<String>,
}

impl PatientDetails {
    pub fn merge(&mut self, update: PatientUpdate) {
        let PatientUpdate {
            hn,
            name,
            age,
            sex,
            history,
            diagnosis,
        } = update;
        if let Some(v) = hn {
            self.hn = v;
        }
        if let Some(v) = name {
            self.name = v;
        }
        if let Some(v) = age {
            self.age = v;
        }
        if let Some(v) = sex {
            self.sex = v;
        }
        if let Some(v) = history {
            self.history = v;
        }
        if let Some(v) = diagnosis {
            self.diagnosis = v;
        }
    }
}

/// Operator prompt awaiting attention
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Prompt {
    /// Classify the presenting rhythm
    InitialRhythm,
    /// Show the next guided action
    Recommendation,
}
