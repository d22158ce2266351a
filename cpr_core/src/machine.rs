//! Session state machine.
//!
//! [`apply`] is the single transition function: it takes the current
//! session, an [`Action`] and the wall-clock instant the action happened at,
//! and returns the next session. It is total. Actions that make no sense in
//! the current status return an unchanged copy rather than an error.
//!
//! Status transitions:
//! - Inactive → Active on start
//! - Active → Review on end
//! - Active/Review → Inactive on reset
//! - Inactive → HistoryView on view-history, back on close
//! - any → snapshot's status on load

use crate::{
    aggregate, timers, AlertKind, AlgorithmPath, EventId, EventKind, EventRecord, NewEvent,
    PatientUpdate, Prompt, ReversibleCause, SavedRecord, Session, SessionStatus, TimerKind,
    TimerSettings,
};
use chrono::{DateTime, Duration, Utc};

/// Actor recorded when an action does not name one
pub const DEFAULT_ACTOR: &str = "System";

/// Everything an operator or clock can ask the session to do
#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Start { settings: TimerSettings },
    End,
    Reset,
    Tick,
    LogEvent(NewEvent),
    DeleteEvent(EventId),
    DismissAlert(AlertKind),
    SetPath(AlgorithmPath),
    UpdateTimerSetting { timer: TimerKind, seconds: u32 },
    ToggleCause(ReversibleCause),
    UpdatePatient(PatientUpdate),
    OpenPrompt(Prompt),
    ClosePrompt,
    Undo,
    Load(Box<Session>),
    ViewHistory(Box<SavedRecord>),
    CloseHistory,
    FetchSuggestionsStart,
    FetchSuggestionsSuccess { request: u64, items: Vec<String> },
    FetchSuggestionsFailure { request: u64, reason: String },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Start { .. } => "start",
            Action::End => "end",
            Action::Reset => "reset",
            Action::Tick => "tick",
            Action::LogEvent(_) => "log-event",
            Action::DeleteEvent(_) => "delete-event",
            Action::DismissAlert(_) => "dismiss-alert",
            Action::SetPath(_) => "set-path",
            Action::UpdateTimerSetting { .. } => "update-timer-setting",
            Action::ToggleCause(_) => "toggle-cause",
            Action::UpdatePatient(_) => "update-patient",
            Action::OpenPrompt(_) => "open-prompt",
            Action::ClosePrompt => "close-prompt",
            Action::Undo => "undo",
            Action::Load(_) => "load",
            Action::ViewHistory(_) => "view-history",
            Action::CloseHistory => "close-history",
            Action::FetchSuggestionsStart => "fetch-suggestions-start",
            Action::FetchSuggestionsSuccess { .. } => "fetch-suggestions-success",
            Action::FetchSuggestionsFailure { .. } => "fetch-suggestions-failure",
        }
    }
}

/// Compute the next session from `state` and `action` at instant `now`
pub fn apply(state: &Session, action: Action, now: DateTime<Utc>) -> Session {
    use SessionStatus::*;

    match (state.status, action) {
        (Inactive, Action::Start { settings }) => start(settings, now),
        (Active, Action::End) => end(state),
        (Active | Review, Action::Reset) => {
            tracing::info!("Session reset");
            Session::default()
        }
        (Active, Action::Tick) => {
            let mut next = state.clone();
            timers::tick(&mut next, now);
            next
        }
        (Active, Action::LogEvent(event)) => {
            let mut next = with_undo(state);
            append_event(&mut next, event, now);
            next
        }
        (Active, Action::DeleteEvent(id)) => delete_event(state, id),
        (Active, Action::DismissAlert(alert)) => {
            let mut next = state.clone();
            timers::dismiss(&mut next, alert, now);
            next
        }
        (Active, Action::SetPath(path)) => set_path(state, path, now),
        (Active, Action::UpdateTimerSetting { timer, seconds }) if seconds > 0 => {
            let mut next = with_undo(state);
            match timer {
                TimerKind::RhythmCheck => {
                    next.timer_settings.rhythm_check_interval_seconds = seconds
                }
                TimerKind::Epinephrine => next.timer_settings.epinephrine_interval_seconds = seconds,
            }
            next
        }
        (Active, Action::ToggleCause(cause)) => {
            let mut next = state.clone();
            next.reversible_causes.toggle(cause);
            next
        }
        (Active | Review, Action::UpdatePatient(update)) => {
            let mut next = state.clone();
            next.patient.merge(update);
            next
        }
        (Active, Action::OpenPrompt(prompt)) => Session {
            pending_prompt: Some(prompt),
            ..state.clone()
        },
        (Active, Action::ClosePrompt) => Session {
            pending_prompt: None,
            ..state.clone()
        },
        (Active, Action::Undo) => match &state.undo_snapshot {
            Some(snapshot) => {
                tracing::debug!("Restoring undo snapshot");
                (**snapshot).clone()
            }
            None => state.clone(),
        },
        (_, Action::Load(snapshot)) => load(*snapshot, now),
        (Inactive, Action::ViewHistory(record)) => Session {
            status: HistoryView,
            viewing: Some(*record),
            ..Default::default()
        },
        (HistoryView, Action::CloseHistory) => Session::default(),
        (Active, Action::FetchSuggestionsStart) => {
            let mut next = state.clone();
            let request = next.suggestions.begin();
            tracing::debug!("Suggestion request {} started", request);
            next
        }
        (Active, Action::FetchSuggestionsSuccess { request, items }) => {
            let outcome = if items.is_empty() {
                Err(crate::suggestions::EMPTY_REPLY_MESSAGE.to_string())
            } else {
                Ok(items)
            };
            let mut next = state.clone();
            next.suggestions.complete(request, outcome);
            next
        }
        (Active, Action::FetchSuggestionsFailure { request, reason }) => {
            let mut next = state.clone();
            next.suggestions.complete(request, Err(reason));
            next
        }
        (status, action) => {
            tracing::debug!("Ignoring {} while {:?}", action.name(), status);
            state.clone()
        }
    }
}

fn start(settings: TimerSettings, now: DateTime<Utc>) -> Session {
    tracing::info!("Code started at {}", now.to_rfc3339());
    Session {
        status: SessionStatus::Active,
        started_at: Some(now),
        timer_settings: settings,
        // Compressions have not begun yet
        last_compression_stopped_at: Some(now),
        pending_prompt: Some(Prompt::InitialRhythm),
        ..Default::default()
    }
}

fn end(state: &Session) -> Session {
    tracing::info!(
        "Code ended after {}s with {} events",
        state.elapsed_seconds,
        state.event_log.len()
    );
    let mut next = state.clone();
    next.status = SessionStatus::Review;
    next.pending_prompt = None;
    timers::clear_all(&mut next);
    next
}

/// Clone of `state` with its own pre-transition copy in the undo slot
fn with_undo(state: &Session) -> Session {
    let mut next = state.clone();
    next.undo_snapshot = Some(state.undo_copy());
    next
}

/// Record an event and apply its timer, aggregate and algorithm effects
fn append_event(next: &mut Session, event: NewEvent, now: DateTime<Utc>) {
    let NewEvent {
        kind,
        details,
        actor,
        medication_name,
    } = event;
    let details = details.filter(|d| !d.trim().is_empty());
    let medication_name = match kind {
        EventKind::OtherMedication => {
            aggregate::resolve_medication_name(medication_name.as_deref(), details.as_deref())
        }
        _ => medication_name.filter(|n| !n.trim().is_empty()),
    };

    let record = EventRecord {
        id: next.event_log.next_id(now.timestamp_millis()),
        kind,
        occurred_at_elapsed_seconds: next.elapsed_seconds,
        details,
        actor: actor
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ACTOR.to_string()),
        medication_name,
    };
    tracing::debug!(
        "Logged {} (id {}) at {}s",
        record.kind,
        record.id,
        record.occurred_at_elapsed_seconds
    );

    aggregate::apply(&mut next.summary_counts, &mut next.last_shock_energy, &record);
    next.event_log.push(record);

    match kind {
        EventKind::CompressionsStarted => timers::start_compressions(next),
        EventKind::EpinephrineGiven => timers::restart_epinephrine(next),
        k if k.stops_compressions() => timers::stop_compressions(next, now),
        _ => {}
    }
    next.algorithm.on_event(kind);
}

fn delete_event(state: &Session, id: EventId) -> Session {
    if !state.event_log.contains(id) {
        tracing::debug!("Delete of unknown event {} ignored", id);
        return state.clone();
    }
    let mut next = with_undo(state);
    next.event_log.remove(id);
    let (counts, last_shock_energy) = aggregate::recompute(&next.event_log);
    next.summary_counts = counts;
    next.last_shock_energy = last_shock_energy;
    tracing::debug!("Deleted event {}, totals recomputed", id);
    next
}

fn set_path(state: &Session, path: AlgorithmPath, now: DateTime<Utc>) -> Session {
    if state.algorithm.path.is_some() {
        tracing::debug!("Rhythm already classified, ignoring set-path");
        return state.clone();
    }
    let mut next = with_undo(state);
    next.algorithm.classify(path);
    append_event(
        &mut next,
        NewEvent::new(EventKind::RhythmAnalyzed).with_details(path.classification()),
        now,
    );
    next.pending_prompt = Some(Prompt::Recommendation);
    next
}

/// Adopt a stored snapshot.
///
/// The stored elapsed time of a running code is never trusted: it is
/// recomputed from the start instant. Totals are re-folded from the log.
fn load(snapshot: Session, now: DateTime<Utc>) -> Session {
    let mut next = snapshot.to_snapshot();
    match next.status {
        SessionStatus::HistoryView => return Session::default(),
        SessionStatus::Active => {
            let started_at = *next
                .started_at
                .get_or_insert_with(|| now - Duration::seconds(next.elapsed_seconds as i64));
            next.elapsed_seconds = timers::elapsed_between(started_at, now);
        }
        SessionStatus::Inactive | SessionStatus::Review => {}
    }
    let (counts, last_shock_energy) = aggregate::recompute(&next.event_log);
    next.summary_counts = counts;
    next.last_shock_energy = last_shock_energy;
    tracing::info!(
        "Loaded {:?} session with {} events",
        next.status,
        next.event_log.len()
    );
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlgorithmState;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + Duration::seconds(secs)
    }

    fn started() -> Session {
        apply(
            &Session::default(),
            Action::Start {
                settings: TimerSettings::default(),
            },
            t0(),
        )
    }

    fn log(state: &Session, event: NewEvent, secs: i64) -> Session {
        apply(state, Action::LogEvent(event), at(secs))
    }

    fn log_kind(state: &Session, kind: EventKind, secs: i64) -> Session {
        log(state, NewEvent::new(kind), secs)
    }

    fn tick_n(mut state: Session, n: usize, from: i64) -> Session {
        for i in 0..n {
            state = apply(&state, Action::Tick, at(from + i as i64 + 1));
        }
        state
    }

    #[test]
    fn test_start_from_inactive() {
        let s = started();
        assert_eq!(s.status, SessionStatus::Active);
        assert_eq!(s.started_at, Some(t0()));
        assert_eq!(s.last_compression_stopped_at, Some(t0()));
        assert_eq!(s.pending_prompt, Some(Prompt::InitialRhythm));
        assert_eq!(s.timers, Default::default());
        assert!(s.undo_snapshot.is_none());
    }

    #[test]
    fn test_inapplicable_actions_are_ignored() {
        let idle = Session::default();
        assert_eq!(apply(&idle, Action::Tick, t0()), idle);
        assert_eq!(
            apply(&idle, Action::LogEvent(NewEvent::new(EventKind::Note)), t0()),
            idle
        );
        assert_eq!(apply(&idle, Action::End, t0()), idle);

        let active = started();
        let again = apply(
            &active,
            Action::Start {
                settings: TimerSettings::default(),
            },
            at(5),
        );
        assert_eq!(again, active);
    }

    #[test]
    fn test_shock_then_delete_scenario() {
        let s = log(
            &started(),
            NewEvent::new(EventKind::ShockDelivered).with_details("200J"),
            3,
        );
        assert_eq!(s.summary_counts.shocks, 1);
        assert_eq!(s.last_shock_energy.as_deref(), Some("200J"));

        let id = s.latest_event().unwrap().id;
        let s = apply(&s, Action::DeleteEvent(id), at(4));
        assert_eq!(s.summary_counts.shocks, 0);
        assert_eq!(s.last_shock_energy, None);
        assert!(s.event_log.is_empty());
    }

    #[test]
    fn test_delete_unknown_id_is_noop_without_snapshot() {
        let s = log_kind(&started(), EventKind::Note, 1);
        let before_undo = s.undo_snapshot.clone();
        let after = apply(&s, Action::DeleteEvent(EventId(1)), at(2));
        assert_eq!(after, s);
        assert_eq!(after.undo_snapshot, before_undo);
    }

    #[test]
    fn test_delete_middle_shock_restores_earlier_energy() {
        let mut s = started();
        for (i, energy) in ["150J", "200J", "300J"].iter().enumerate() {
            s = log(
                &s,
                NewEvent::new(EventKind::ShockDelivered).with_details(*energy),
                i as i64,
            );
        }
        let newest = s.event_log.iter().next().unwrap().id;
        let s = apply(&s, Action::DeleteEvent(newest), at(10));
        assert_eq!(s.summary_counts.shocks, 2);
        assert_eq!(s.last_shock_energy.as_deref(), Some("200J"));
    }

    #[test]
    fn test_guided_path_scenario() {
        let s = apply(&started(), Action::SetPath(AlgorithmPath::Shockable), at(10));
        assert_eq!(
            s.algorithm,
            AlgorithmState {
                path: Some(AlgorithmPath::Shockable),
                step: 1
            }
        );
        assert_eq!(s.latest_event().unwrap().kind, EventKind::RhythmAnalyzed);
        assert_eq!(
            s.latest_event().unwrap().details.as_deref(),
            Some("Rhythm is VF/pVT (Shockable)")
        );
        assert_eq!(s.pending_prompt, Some(Prompt::Recommendation));

        let s = log_kind(&s, EventKind::ShockDelivered, 11);
        assert_eq!(s.algorithm.step, 2);
        let s = log_kind(&s, EventKind::EpinephrineGiven, 12);
        assert_eq!(s.algorithm.step, 3);
        let s = log_kind(&s, EventKind::RhythmCheckRosc, 13);
        assert_eq!(s.algorithm, AlgorithmState::default());
    }

    #[test]
    fn test_set_path_ignored_when_already_classified() {
        let s = apply(&started(), Action::SetPath(AlgorithmPath::NonShockable), at(1));
        let again = apply(&s, Action::SetPath(AlgorithmPath::Shockable), at(2));
        assert_eq!(again, s);
    }

    #[test]
    fn test_epinephrine_countdown_scenario() {
        let s = log_kind(&started(), EventKind::EpinephrineGiven, 0);
        assert_eq!(s.timers.epinephrine_remaining, Some(180));

        let s = tick_n(s, 120, 0);
        assert_eq!(s.timers.epinephrine_remaining, Some(60));
        assert!(s.alerts.prepare_epinephrine);
        assert!(!s.alerts.epinephrine_due);

        let s = tick_n(s, 60, 120);
        assert_eq!(s.timers.epinephrine_remaining, Some(0));
        assert!(s.alerts.epinephrine_due);
        assert!(!s.alerts.prepare_epinephrine);
    }

    #[test]
    fn test_epinephrine_clears_alerts_and_restarts() {
        let mut s = log_kind(&started(), EventKind::EpinephrineGiven, 0);
        s = tick_n(s, 180, 0);
        assert!(s.alerts.epinephrine_due);
        let s = log_kind(&s, EventKind::EpinephrineGiven, 181);
        assert!(!s.alerts.epinephrine_due);
        assert!(!s.alerts.prepare_epinephrine);
        assert_eq!(s.timers.epinephrine_remaining, Some(180));
        assert_eq!(s.summary_counts.epinephrine, 2);
    }

    #[test]
    fn test_rhythm_check_cycle() {
        let s = log_kind(&started(), EventKind::CompressionsStarted, 0);
        assert_eq!(s.timers.rhythm_check_remaining, Some(120));
        assert!(s.last_compression_stopped_at.is_none());

        let s = tick_n(s, 120, 0);
        assert!(s.alerts.rhythm_check_due);

        let s = log_kind(&s, EventKind::RhythmCheckPulseless, 121);
        assert!(!s.alerts.rhythm_check_due);
        assert_eq!(s.timers.rhythm_check_remaining, None);
        assert_eq!(s.last_compression_stopped_at, Some(at(121)));
    }

    #[test]
    fn test_no_flow_and_compressions_clear() {
        let s = tick_n(started(), 20, 0);
        assert!(s.alerts.no_flow);
        let s = tick_n(s, 5, 20);
        assert!(s.alerts.no_flow);

        let s = log_kind(&s, EventKind::CompressionsStarted, 26);
        assert!(!s.alerts.no_flow);
        let s = tick_n(s, 30, 26);
        assert!(!s.alerts.no_flow);
    }

    #[test]
    fn test_dismiss_rhythm_alert_marks_stop() {
        let s = log_kind(&started(), EventKind::CompressionsStarted, 0);
        let s = tick_n(s, 120, 0);
        let s = apply(&s, Action::DismissAlert(AlertKind::RhythmCheckDue), at(125));
        assert!(!s.alerts.rhythm_check_due);
        assert_eq!(s.timers.rhythm_check_remaining, None);
        assert_eq!(s.last_compression_stopped_at, Some(at(125)));
    }

    #[test]
    fn test_undo_is_depth_one() {
        let base = started();
        let a = log_kind(&base, EventKind::CompressionsStarted, 1);
        let b = log_kind(&a, EventKind::ShockDelivered, 2);

        let undone = apply(&b, Action::Undo, at(3));
        let mut expected = a.clone();
        expected.undo_snapshot = None;
        assert_eq!(undone, expected);
        assert_eq!(undone.event_log.len(), 1);

        let twice = apply(&undone, Action::Undo, at(4));
        assert_eq!(twice, undone);
    }

    #[test]
    fn test_undo_restores_deleted_event() {
        let s = log_kind(&started(), EventKind::EpinephrineGiven, 1);
        let id = s.latest_event().unwrap().id;
        let deleted = apply(&s, Action::DeleteEvent(id), at(2));
        assert_eq!(deleted.summary_counts.epinephrine, 0);

        let restored = apply(&deleted, Action::Undo, at(3));
        assert_eq!(restored.summary_counts.epinephrine, 1);
        assert!(restored.event_log.contains(id));
    }

    #[test]
    fn test_timer_setting_takes_snapshot_and_ignores_zero() {
        let s = started();
        let changed = apply(
            &s,
            Action::UpdateTimerSetting {
                timer: TimerKind::Epinephrine,
                seconds: 240,
            },
            at(1),
        );
        assert_eq!(changed.timer_settings.epinephrine_interval_seconds, 240);
        assert!(changed.can_undo());

        let zero = apply(
            &changed,
            Action::UpdateTimerSetting {
                timer: TimerKind::RhythmCheck,
                seconds: 0,
            },
            at(2),
        );
        assert_eq!(zero, changed);

        let undone = apply(&changed, Action::Undo, at(3));
        assert_eq!(undone.timer_settings.epinephrine_interval_seconds, 180);
    }

    #[test]
    fn test_other_medication_named_from_details() {
        let s = log(
            &started(),
            NewEvent::new(EventKind::OtherMedication).with_details("Atropine 1mg IV Push"),
            1,
        );
        assert_eq!(s.summary_counts.other_medications.get("Atropine"), Some(&1));
        assert_eq!(
            s.latest_event().unwrap().medication_name.as_deref(),
            Some("Atropine")
        );

        let s = log(&s, NewEvent::new(EventKind::OtherMedication), 2);
        assert_eq!(s.summary_counts.other_medications.len(), 1);
    }

    #[test]
    fn test_event_records_actor_and_elapsed() {
        let s = tick_n(started(), 30, 0);
        let s = log(
            &s,
            NewEvent::new(EventKind::Note)
                .with_details("IV access")
                .with_actor("Nurse Casey"),
            30,
        );
        let e = s.latest_event().unwrap();
        assert_eq!(e.occurred_at_elapsed_seconds, 30);
        assert_eq!(e.actor, "Nurse Casey");

        let s = log_kind(&s, EventKind::Note, 31);
        assert_eq!(s.latest_event().unwrap().actor, DEFAULT_ACTOR);
    }

    #[test]
    fn test_end_clears_timers_and_alerts() {
        let s = log_kind(&started(), EventKind::EpinephrineGiven, 0);
        let s = tick_n(s, 180, 0);
        let s = apply(&s, Action::End, at(200));
        assert_eq!(s.status, SessionStatus::Review);
        assert_eq!(s.timers, Default::default());
        assert!(!s.alerts.any());
        assert_eq!(s.event_log.len(), 1);

        let s = apply(&s, Action::Tick, at(300));
        assert_eq!(s.status, SessionStatus::Review);
        let s = apply(&s, Action::Reset, at(301));
        assert_eq!(s, Session::default());
    }

    #[test]
    fn test_load_recomputes_elapsed_for_active() {
        let mut stored = tick_n(started(), 10, 0);
        stored = log_kind(&stored, EventKind::ShockDelivered, 10);
        stored.summary_counts.shocks = 99;
        stored.alerts.no_flow = true;

        let loaded = apply(&Session::default(), Action::Load(Box::new(stored)), at(600));
        assert_eq!(loaded.status, SessionStatus::Active);
        assert_eq!(loaded.elapsed_seconds, 600);
        assert_eq!(loaded.summary_counts.shocks, 1);
        assert!(!loaded.alerts.any());
        assert!(loaded.undo_snapshot.is_none());
    }

    #[test]
    fn test_load_keeps_review_elapsed() {
        let stored = apply(&tick_n(started(), 45, 0), Action::End, at(45));
        let loaded = apply(&Session::default(), Action::Load(Box::new(stored)), at(9_000));
        assert_eq!(loaded.status, SessionStatus::Review);
        assert_eq!(loaded.elapsed_seconds, 45);
    }

    #[test]
    fn test_history_view_roundtrip() {
        let ended = apply(&log_kind(&started(), EventKind::RhythmCheckRosc, 5), Action::End, at(6));
        let record = SavedRecord::from_session(&ended, at(6));

        let viewing = apply(&Session::default(), Action::ViewHistory(Box::new(record.clone())), at(7));
        assert_eq!(viewing.status, SessionStatus::HistoryView);
        assert_eq!(viewing.viewing.as_ref(), Some(&record));

        // Read-only: mutations are ignored
        let same = apply(&viewing, Action::LogEvent(NewEvent::new(EventKind::Note)), at(8));
        assert_eq!(same, viewing);

        let closed = apply(&viewing, Action::CloseHistory, at(9));
        assert_eq!(closed, Session::default());
    }

    #[test]
    fn test_suggestion_flow() {
        let s = apply(&started(), Action::FetchSuggestionsStart, at(1));
        assert!(s.suggestions.loading);
        let request = s.suggestions.request;

        let s = apply(
            &s,
            Action::FetchSuggestionsSuccess {
                request,
                items: vec![],
            },
            at(2),
        );
        assert!(!s.suggestions.loading);
        assert_eq!(
            s.suggestions.error.as_deref(),
            Some(crate::suggestions::EMPTY_REPLY_MESSAGE)
        );

        let s = apply(&s, Action::FetchSuggestionsStart, at(3));
        let s = apply(
            &s,
            Action::FetchSuggestionsFailure {
                request,
                reason: "late".into(),
            },
            at(4),
        );
        assert!(s.suggestions.loading, "stale failure must not land");
    }

    #[test]
    fn test_toggle_cause_and_patient_update() {
        let s = apply(&started(), Action::ToggleCause(ReversibleCause::Toxins), at(1));
        assert!(s.reversible_causes.toxins);
        assert!(!s.can_undo());

        let s = apply(
            &s,
            Action::UpdatePatient(PatientUpdate {
                hn: Some("HN-314".into()),
                ..Default::default()
            }),
            at(2),
        );
        assert_eq!(s.patient.hn, "HN-314");
    }

    #[derive(Clone, Debug)]
    enum Step {
        Log(EventKind, Option<String>, Option<String>),
        Delete(prop::sample::Index),
    }

    fn arb_step() -> impl Strategy<Value = Step> {
        let kinds = prop::sample::select(vec![
            EventKind::ShockDelivered,
            EventKind::EpinephrineGiven,
            EventKind::AmiodaroneGiven,
            EventKind::LidocaineGiven,
            EventKind::OtherMedication,
            EventKind::Note,
            EventKind::CompressionsStarted,
        ]);
        let details = prop::option::of("[A-Za-z]{0,6}[0-9]{0,3}[a-zA-Z ]{0,5}");
        let med = prop::option::of(prop::sample::select(vec![
            "Atropine".to_string(),
            "Calcium".to_string(),
            " ".to_string(),
        ]));
        prop_oneof![
            3 => (kinds, details, med).prop_map(|(k, d, m)| Step::Log(k, d, m)),
            1 => any::<prop::sample::Index>().prop_map(Step::Delete),
        ]
    }

    fn assert_totals_match_log(s: &Session) -> std::result::Result<(), TestCaseError> {
        let (counts, energy) = aggregate::recompute(&s.event_log);
        prop_assert_eq!(&s.summary_counts, &counts);
        prop_assert_eq!(&s.last_shock_energy, &energy);
        Ok(())
    }

    proptest! {
        #[test]
        fn totals_always_equal_fold_of_log(
            steps in prop::collection::vec(arb_step(), 1..40),
        ) {
            let mut s = started();
            for (i, step) in steps.into_iter().enumerate() {
                let secs = i as i64 + 1;
                s = match step {
                    Step::Log(kind, details, med) => {
                        let mut event = NewEvent::new(kind);
                        event.details = details;
                        event.medication_name = med;
                        log(&s, event, secs)
                    }
                    Step::Delete(ix) => {
                        let ids: Vec<EventId> = s.event_log.iter().map(|e| e.id).collect();
                        if ids.is_empty() {
                            continue;
                        }
                        apply(&s, Action::DeleteEvent(ids[ix.index(ids.len())]), at(secs))
                    }
                };
                assert_totals_match_log(&s)?;
            }
        }

        #[test]
        fn deletion_order_through_apply_does_not_change_totals(
            logs in prop::collection::vec(arb_step(), 2..25),
            picks in prop::collection::vec(any::<prop::sample::Index>(), 1..8),
        ) {
            let mut s = started();
            for (i, step) in logs.into_iter().enumerate() {
                if let Step::Log(kind, details, med) = step {
                    let mut event = NewEvent::new(kind);
                    event.details = details;
                    event.medication_name = med;
                    s = log(&s, event, i as i64 + 1);
                }
            }
            prop_assume!(!s.event_log.is_empty());

            let ids: Vec<EventId> = s.event_log.iter().map(|e| e.id).collect();
            let mut doomed: Vec<EventId> = picks.iter().map(|ix| ids[ix.index(ids.len())]).collect();
            doomed.sort();
            doomed.dedup();

            let mut forward = s.clone();
            for id in &doomed {
                forward = apply(&forward, Action::DeleteEvent(*id), at(500));
            }
            let mut backward = s.clone();
            for id in doomed.iter().rev() {
                backward = apply(&backward, Action::DeleteEvent(*id), at(500));
            }

            prop_assert_eq!(&forward.summary_counts, &backward.summary_counts);
            prop_assert_eq!(&forward.last_shock_energy, &backward.last_shock_energy);
            prop_assert_eq!(forward.event_log.len(), s.event_log.len() - doomed.len());
            assert_totals_match_log(&forward)?;
        }

        #[test]
        fn elapsed_is_monotonic_across_ticks_and_loads(
            gaps in prop::collection::vec(0i64..5, 1..60),
            reload_at in any::<prop::sample::Index>(),
        ) {
            let mut s = started();
            let mut clock = 0i64;
            let mut previous = 0u64;
            let reload = reload_at.index(gaps.len());
            for (i, gap) in gaps.iter().enumerate() {
                clock += gap;
                if i == reload {
                    s = apply(&Session::default(), Action::Load(Box::new(s.to_snapshot())), at(clock));
                }
                s = apply(&s, Action::Tick, at(clock));
                prop_assert!(s.elapsed_seconds >= previous);
                prop_assert_eq!(s.elapsed_seconds, clock as u64);
                previous = s.elapsed_seconds;
            }
        }

        #[test]
        fn rosc_always_resets_algorithm(
            shockable in any::<bool>(),
            advances in prop::collection::vec(prop::sample::select(vec![
                EventKind::ShockDelivered,
                EventKind::EpinephrineGiven,
                EventKind::AmiodaroneGiven,
                EventKind::LidocaineGiven,
                EventKind::CompressionsStarted,
            ]), 0..20),
        ) {
            let path = if shockable { AlgorithmPath::Shockable } else { AlgorithmPath::NonShockable };
            let mut s = apply(&started(), Action::SetPath(path), at(1));
            for (i, kind) in advances.iter().enumerate() {
                s = log_kind(&s, *kind, 2 + i as i64);
            }
            let s = log_kind(&s, EventKind::RhythmCheckRosc, 100);
            prop_assert_eq!(s.algorithm, AlgorithmState::default());
        }
    }
}
