//! Countdown timers and time-critical alerts.
//!
//! All functions here mutate a session that the state machine has already
//! cloned for the transition in progress; nothing outside that transition can
//! observe an intermediate value.

use crate::{AlertKind, EventKind, Session};
use chrono::{DateTime, Duration, Utc};

/// Seconds removed from each running countdown per tick
pub const TICK_SECONDS: u32 = 1;

/// Hands-off time after which the no-flow alert fires
pub const NO_FLOW_THRESHOLD_SECONDS: i64 = 15;

/// Epinephrine countdown value at which the "prepare" warning fires.
///
/// Compared for equality on the post-decrement value, so a tick that jumps
/// over it (a suspended clock, a late wake-up) skips the warning entirely.
pub const PREPARE_EPINEPHRINE_AT: u32 = 60;

/// Whole seconds from `started_at` to `now`, never negative
pub fn elapsed_between(started_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - started_at).num_seconds().max(0) as u64
}

/// One clock pulse: refresh elapsed time, count down, derive alerts
pub fn tick(session: &mut Session, now: DateTime<Utc>) {
    if let Some(started_at) = session.started_at {
        session.elapsed_seconds = session
            .elapsed_seconds
            .max(elapsed_between(started_at, now));
    }

    let rhythm = session
        .timers
        .rhythm_check_remaining
        .map(|r| r.saturating_sub(TICK_SECONDS));
    let epinephrine = session
        .timers
        .epinephrine_remaining
        .map(|e| e.saturating_sub(TICK_SECONDS));

    if rhythm == Some(0) {
        session.alerts.rhythm_check_due = true;
    }
    if epinephrine == Some(0) {
        session.alerts.prepare_epinephrine = false;
        session.alerts.epinephrine_due = true;
    }
    if epinephrine == Some(PREPARE_EPINEPHRINE_AT) {
        session.alerts.prepare_epinephrine = true;
    }

    if rhythm.is_none() {
        if let Some(stopped_at) = session.last_compression_stopped_at {
            let hands_off = now - stopped_at;
            let after_rosc = session.event_log.latest_kind() == Some(EventKind::RhythmCheckRosc);
            if hands_off > Duration::seconds(NO_FLOW_THRESHOLD_SECONDS) && !after_rosc {
                if !session.alerts.no_flow {
                    tracing::warn!(
                        "No flow for {}s at elapsed {}s",
                        hands_off.num_seconds(),
                        session.elapsed_seconds
                    );
                }
                session.alerts.no_flow = true;
            }
        }
    } else {
        session.alerts.no_flow = false;
    }

    session.timers.rhythm_check_remaining = rhythm;
    session.timers.epinephrine_remaining = epinephrine;
}

/// Compressions resumed: clear no-flow and make sure a rhythm check is counting
pub fn start_compressions(session: &mut Session) {
    let running = matches!(session.timers.rhythm_check_remaining, Some(r) if r > 0);
    if !running {
        session.timers.rhythm_check_remaining =
            Some(session.timer_settings.rhythm_check_interval_seconds);
    }
    session.last_compression_stopped_at = None;
    session.alerts.no_flow = false;
}

/// Hands off the chest for a rhythm check or its outcome
pub fn stop_compressions(session: &mut Session, now: DateTime<Utc>) {
    session.timers.rhythm_check_remaining = None;
    session.alerts.rhythm_check_due = false;
    session.last_compression_stopped_at = Some(now);
}

/// Dose given (or deferred): full epinephrine interval from now
pub fn restart_epinephrine(session: &mut Session) {
    session.timers.epinephrine_remaining =
        Some(session.timer_settings.epinephrine_interval_seconds);
    session.alerts.prepare_epinephrine = false;
    session.alerts.epinephrine_due = false;
}

pub fn dismiss(session: &mut Session, alert: AlertKind, now: DateTime<Utc>) {
    match alert {
        AlertKind::RhythmCheckDue => stop_compressions(session, now),
        AlertKind::PrepareEpinephrine => session.alerts.prepare_epinephrine = false,
        AlertKind::EpinephrineDue => {
            session.alerts.epinephrine_due = false;
            session.timers.epinephrine_remaining =
                Some(session.timer_settings.epinephrine_interval_seconds);
        }
    }
}

/// Stop every countdown and lower every flag
pub fn clear_all(session: &mut Session) {
    session.timers = Default::default();
    session.alerts = Default::default();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventId, EventRecord, SessionStatus};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap()
    }

    fn active() -> Session {
        Session {
            status: SessionStatus::Active,
            started_at: Some(t0()),
            last_compression_stopped_at: Some(t0()),
            ..Default::default()
        }
    }

    #[test]
    fn test_tick_updates_elapsed_from_wall_clock() {
        let mut s = active();
        tick(&mut s, t0() + Duration::seconds(37));
        assert_eq!(s.elapsed_seconds, 37);
    }

    #[test]
    fn test_elapsed_never_decreases_on_clock_step_back() {
        let mut s = active();
        tick(&mut s, t0() + Duration::seconds(30));
        tick(&mut s, t0() + Duration::seconds(20));
        assert_eq!(s.elapsed_seconds, 30);
    }

    #[test]
    fn test_timer_clamps_at_zero() {
        let mut s = active();
        s.timers.rhythm_check_remaining = Some(0);
        tick(&mut s, t0());
        assert_eq!(s.timers.rhythm_check_remaining, Some(0));
        assert!(s.alerts.rhythm_check_due);
    }

    #[test]
    fn test_rhythm_check_alert_fires_at_zero() {
        let mut s = active();
        s.timers.rhythm_check_remaining = Some(2);
        tick(&mut s, t0());
        assert!(!s.alerts.rhythm_check_due);
        tick(&mut s, t0());
        assert!(s.alerts.rhythm_check_due);
    }

    #[test]
    fn test_prepare_epinephrine_is_exact_match() {
        let mut s = active();
        s.timers.epinephrine_remaining = Some(62);
        tick(&mut s, t0());
        assert!(!s.alerts.prepare_epinephrine);
        tick(&mut s, t0());
        assert!(s.alerts.prepare_epinephrine);

        // Jumping straight past 60 never raises it
        let mut skipped = active();
        skipped.timers.epinephrine_remaining = Some(60);
        tick(&mut skipped, t0());
        assert_eq!(skipped.timers.epinephrine_remaining, Some(59));
        assert!(!skipped.alerts.prepare_epinephrine);
    }

    #[test]
    fn test_no_flow_after_threshold() {
        let mut s = active();
        tick(&mut s, t0() + Duration::seconds(15));
        assert!(!s.alerts.no_flow);
        tick(&mut s, t0() + Duration::seconds(16));
        assert!(s.alerts.no_flow);
        tick(&mut s, t0() + Duration::seconds(17));
        assert!(s.alerts.no_flow);
    }

    #[test]
    fn test_no_flow_suppressed_after_rosc() {
        let mut s = active();
        s.event_log.push(EventRecord {
            id: EventId(1),
            kind: EventKind::RhythmCheckRosc,
            occurred_at_elapsed_seconds: 0,
            details: None,
            actor: "System".into(),
            medication_name: None,
        });
        tick(&mut s, t0() + Duration::seconds(60));
        assert!(!s.alerts.no_flow);
    }

    #[test]
    fn test_running_rhythm_timer_forces_no_flow_off() {
        let mut s = active();
        s.alerts.no_flow = true;
        s.timers.rhythm_check_remaining = Some(100);
        tick(&mut s, t0() + Duration::seconds(60));
        assert!(!s.alerts.no_flow);
    }

    #[test]
    fn test_start_compressions_keeps_running_timer() {
        let mut s = active();
        s.timers.rhythm_check_remaining = Some(40);
        start_compressions(&mut s);
        assert_eq!(s.timers.rhythm_check_remaining, Some(40));
        assert!(s.last_compression_stopped_at.is_none());

        s.timers.rhythm_check_remaining = Some(0);
        start_compressions(&mut s);
        assert_eq!(s.timers.rhythm_check_remaining, Some(120));
    }

    #[test]
    fn test_dismiss_epinephrine_due_defers() {
        let mut s = active();
        s.timers.epinephrine_remaining = Some(0);
        s.alerts.epinephrine_due = true;
        dismiss(&mut s, AlertKind::EpinephrineDue, t0());
        assert!(!s.alerts.epinephrine_due);
        assert_eq!(s.timers.epinephrine_remaining, Some(180));
    }

    #[test]
    fn test_dismiss_rhythm_alert_stops_timer() {
        let mut s = active();
        s.timers.rhythm_check_remaining = Some(0);
        s.alerts.rhythm_check_due = true;
        s.last_compression_stopped_at = None;
        let now = t0() + Duration::seconds(120);
        dismiss(&mut s, AlertKind::RhythmCheckDue, now);
        assert!(!s.alerts.rhythm_check_due);
        assert_eq!(s.timers.rhythm_check_remaining, None);
        assert_eq!(s.last_compression_stopped_at, Some(now));
    }
}
