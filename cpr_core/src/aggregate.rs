//! Summary totals derived from the event log.
//!
//! Two entry points keep [`SummaryCounts`] equal to a fold of the log:
//! [`apply`] adds a single freshly logged event, and [`recompute`] rebuilds
//! everything from the remaining log after a deletion. Both share the same
//! per-event step so they cannot disagree.

use crate::{EventKind, EventLog, EventRecord, SummaryCounts};
use once_cell::sync::Lazy;
use regex::Regex;

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid dose regex"));

/// Milligram value of a free-text dose string.
///
/// Best effort and lossy: takes the first run of ASCII digits and ignores
/// units and decimals, so "1.5 g" reads as 1 and "300mg IV Push" as 300.
/// Text without digits contributes 0.
pub fn parse_dose(dose: &str) -> u32 {
    FIRST_NUMBER
        .find(dose)
        .map(|m| m.as_str().parse::<u32>().unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Bucket name for an other-medication event.
///
/// An explicit name wins; otherwise the first word of the details is used.
/// `None` means the event is not counted anywhere.
pub fn resolve_medication_name(explicit: Option<&str>, details: Option<&str>) -> Option<String> {
    explicit
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .or_else(|| details.and_then(|d| d.split_whitespace().next()))
        .map(str::to_string)
}

/// Apply one event's effect to running totals
pub fn apply(counts: &mut SummaryCounts, last_shock_energy: &mut Option<String>, event: &EventRecord) {
    match event.kind {
        EventKind::ShockDelivered => {
            counts.shocks += 1;
            *last_shock_energy = event
                .details
                .as_ref()
                .filter(|d| !d.trim().is_empty())
                .cloned();
        }
        EventKind::EpinephrineGiven => counts.epinephrine += 1,
        EventKind::AmiodaroneGiven => {
            counts.amiodarone_mg = counts
                .amiodarone_mg
                .saturating_add(parse_dose(event.details.as_deref().unwrap_or("")));
        }
        EventKind::LidocaineGiven => {
            counts.lidocaine_mg = counts
                .lidocaine_mg
                .saturating_add(parse_dose(event.details.as_deref().unwrap_or("")));
        }
        EventKind::OtherMedication => {
            if let Some(name) = &event.medication_name {
                *counts.other_medications.entry(name.clone()).or_insert(0) += 1;
            }
        }
        EventKind::CompressionsStarted
        | EventKind::Note
        | EventKind::RhythmCheckRosc
        | EventKind::RhythmCheckPulseless
        | EventKind::RhythmAnalyzed
        | EventKind::ChecklistUpdate => {}
    }
}

/// Rebuild totals and last shock energy from scratch, oldest event first
pub fn recompute(log: &EventLog) -> (SummaryCounts, Option<String>) {
    let mut counts = SummaryCounts::default();
    let mut last_shock_energy = None;
    for event in log.iter_chronological() {
        apply(&mut counts, &mut last_shock_energy, event);
    }
    (counts, last_shock_energy)
}
