//! Binds the pure state machine to a clock and a store.
//!
//! The tracker owns the current [`Session`]. Every action goes through
//! [`machine::apply`] with the clock's "now", and the result is persisted:
//! - saved whenever a running or in-review session changes durably
//! - cleared once the session is back to Inactive
//! - frozen into history when a code ends

use crate::machine::{self, Action};
use crate::suggestions::{build_digest, parse_suggestions, SuggestionService};
use crate::{
    Clock, Config, NewEvent, Result, SavedRecord, Session, SessionStatus, SessionStore,
    TimerSettings,
};
use chrono::{DateTime, Duration, Utc};

pub struct Tracker<S: SessionStore, C: Clock> {
    session: Session,
    store: S,
    clock: C,
    default_actor: String,
    default_settings: TimerSettings,
    /// Instant up to which ticks have been applied; `None` unless Active
    last_tick: Option<DateTime<Utc>>,
}

impl<S: SessionStore, C: Clock> Tracker<S, C> {
    /// Tracker with an Inactive session, ignoring anything stored
    pub fn new(store: S, clock: C, config: &Config) -> Self {
        Self {
            session: Session::default(),
            store,
            clock,
            default_actor: config.session.default_actor.clone(),
            default_settings: config.timer_settings(),
            last_tick: None,
        }
    }

    /// Tracker resuming the stored snapshot, if any
    pub fn open(store: S, clock: C, config: &Config) -> Result<Self> {
        let mut tracker = Self::new(store, clock, config);
        if let Some(snapshot) = tracker.store.load_snapshot()? {
            let now = tracker.clock.now();
            tracker.session = machine::apply(&tracker.session, Action::Load(Box::new(snapshot)), now);
            tracker.last_tick = tracker.session.is_active().then_some(now);
        }
        Ok(tracker)
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn history(&self) -> Result<Vec<SavedRecord>> {
        self.store.load_history()
    }

    /// Begin a code with the configured intervals
    pub fn start(&mut self) -> Result<&Session> {
        let settings = self.default_settings;
        self.dispatch(Action::Start { settings })
    }

    /// Apply one action now and persist the outcome
    pub fn dispatch(&mut self, action: Action) -> Result<&Session> {
        let now = self.clock.now();
        let action = self.fill_defaults(action);
        let previous = std::mem::take(&mut self.session);
        self.session = machine::apply(&previous, action, now);
        self.persist(&previous, now)?;
        Ok(&self.session)
    }

    /// Apply one tick per whole second of wall time since the last tick.
    ///
    /// Returns the number of ticks applied.
    pub fn catch_up_ticks(&mut self) -> Result<u32> {
        if !self.session.is_active() {
            self.last_tick = None;
            return Ok(0);
        }
        let now = self.clock.now();
        let last = *self.last_tick.get_or_insert(now);
        let due = (now - last).num_seconds().max(0);
        if due == 0 {
            return Ok(0);
        }

        let previous = self.session.clone();
        for i in 1..=due {
            let at = last + Duration::seconds(i);
            self.session = machine::apply(&self.session, Action::Tick, at);
        }
        self.last_tick = Some(last + Duration::seconds(due));
        self.persist(&previous, now)?;
        Ok(u32::try_from(due).unwrap_or(u32::MAX))
    }

    /// Apply `count` ticks at the current instant
    pub fn tick(&mut self, count: u32) -> Result<&Session> {
        let now = self.clock.now();
        let previous = self.session.clone();
        for _ in 0..count {
            self.session = machine::apply(&self.session, Action::Tick, now);
        }
        self.persist(&previous, now)?;
        Ok(&self.session)
    }

    /// Ask `service` for suggestions on the current session.
    ///
    /// Service failures end up in the session's suggestion error, not in the
    /// returned `Result`.
    pub fn fetch_suggestions(
        &mut self,
        service: &mut dyn SuggestionService,
    ) -> Result<&Session> {
        self.dispatch(Action::FetchSuggestionsStart)?;
        if !self.session.suggestions.loading {
            return Ok(&self.session);
        }
        let request = self.session.suggestions.request;
        let digest = build_digest(&self.session);

        let outcome = match service.suggest(&digest) {
            Ok(reply) => Action::FetchSuggestionsSuccess {
                request,
                items: parse_suggestions(&reply),
            },
            Err(e) => {
                tracing::warn!("Suggestion request {} failed: {}", request, e);
                Action::FetchSuggestionsFailure {
                    request,
                    reason: e.to_string(),
                }
            }
        };
        self.dispatch(outcome)
    }

    fn fill_defaults(&self, action: Action) -> Action {
        match action {
            Action::LogEvent(event) if event.actor.is_none() => Action::LogEvent(NewEvent {
                actor: Some(self.default_actor.clone()),
                ..event
            }),
            other => other,
        }
    }

    fn persist(&mut self, previous: &Session, now: DateTime<Utc>) -> Result<()> {
        let next = &self.session;

        if next.is_active() && previous.status != SessionStatus::Active {
            self.last_tick = Some(now);
        } else if !next.is_active() {
            self.last_tick = None;
        }

        if previous.status == SessionStatus::Active && next.status == SessionStatus::Review {
            let record = SavedRecord::from_session(next, now);
            tracing::info!("Saving code {} to history ({})", record.id, record.outcome.label());
            self.store.append_history(&record)?;
        }

        match next.status {
            SessionStatus::Active | SessionStatus::Review => {
                if next.to_snapshot() != previous.to_snapshot() {
                    self.store.save_snapshot(next)?;
                }
            }
            SessionStatus::Inactive => {
                if previous.status != SessionStatus::Inactive {
                    self.store.clear_snapshot()?;
                }
            }
            SessionStatus::HistoryView => {}
        }
        Ok(())
    }
}
