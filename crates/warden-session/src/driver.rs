//! Session lifecycle driver
//!
//! Transitions:
//! - `start_session` / `resume_session`: Initial -> InSession
//! - `end_session` / `abort_session`: InSession -> Ended
//! - Ended is terminal
//!
//! Listeners run synchronously after every transition with the new
//! snapshot, outside the state lock. A panicking listener is contained and
//! the remaining listeners still run.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, info, warn};

use warden_core::{
    contain, ActiveSession, Clock, EndedContext, GuestDescriptor, InSessionContext, LifecycleContext,
    LifecycleError, LifecyclePhase, Preferences, ProgressUpdate, ProgressionSnapshot, SessionEndReason,
    SessionId, SessionSummary,
};

/// Transition listener
pub type Listener = Arc<dyn Fn(&LifecycleContext) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

/// Handle returned by [`SessionDriver::subscribe`]
///
/// Dropping the handle leaves the listener registered.
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    /// Remove the listener; a no-op once the driver is gone
    pub fn unsubscribe(self) {
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.lock().entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Owner of one guest's lifecycle state
pub struct SessionDriver {
    clock: Arc<dyn Clock>,
    state: RwLock<LifecycleContext>,
    listeners: Arc<Mutex<Listeners>>,
}

impl SessionDriver {
    pub fn new(descriptor: GuestDescriptor, preferences: Preferences, clock: Arc<dyn Clock>) -> Self {
        SessionDriver {
            clock,
            state: RwLock::new(LifecycleContext::initial(descriptor, preferences)),
            listeners: Arc::new(Mutex::new(Listeners::default())),
        }
    }

    /// Fresh owned snapshot of the current state
    pub fn context(&self) -> LifecycleContext {
        self.state.read().clone()
    }

    /// Borrow the current state under the read lock
    ///
    /// `f` must not call back into this driver's transitions.
    pub fn inspect<R>(&self, f: impl FnOnce(&LifecycleContext) -> R) -> R {
        f(&self.state.read())
    }

    #[inline]
    pub fn phase(&self) -> LifecyclePhase {
        self.state.read().phase()
    }

    #[inline]
    pub fn is_session_active(&self) -> bool {
        self.state.read().is_in_session()
    }

    /// Initial -> InSession
    pub fn start_session(&self, session_id: SessionId) -> Result<(), LifecycleError> {
        self.begin("start session", session_id, ProgressionSnapshot::default(), None)
    }

    /// Initial -> InSession, seeded with progress and state from a previous run
    pub fn resume_session(
        &self,
        session_id: SessionId,
        progression: ProgressionSnapshot,
        saved_state: Option<Value>,
    ) -> Result<(), LifecycleError> {
        self.begin("resume session", session_id, progression, saved_state)
    }

    fn begin(
        &self,
        action: &'static str,
        session_id: SessionId,
        progression: ProgressionSnapshot,
        saved_state: Option<Value>,
    ) -> Result<(), LifecycleError> {
        let snapshot = {
            let mut state = self.state.write();
            if state.phase() != LifecyclePhase::Initial {
                return Err(LifecycleError::IllegalTransition {
                    action,
                    phase: state.phase(),
                });
            }
            *state = LifecycleContext::InSession(InSessionContext {
                session_id,
                started_at: self.clock.now(),
                progression,
                saved_state,
            });
            state.clone()
        };

        if let LifecycleContext::InSession(ctx) = &snapshot {
            info!(session = %ctx.session_id, at = ctx.started_at.as_millis(), "Session started");
        }
        self.notify(&snapshot);
        Ok(())
    }

    /// InSession -> Ended
    pub fn end_session(&self, reason: SessionEndReason) -> Result<(), LifecycleError> {
        self.finish("end session", reason.as_str())
    }

    /// InSession -> Ended on a host-side failure
    pub fn abort_session(&self, reason: &str) -> Result<(), LifecycleError> {
        self.finish("abort session", reason)
    }

    fn finish(&self, action: &'static str, reason: &str) -> Result<(), LifecycleError> {
        let snapshot = {
            let mut state = self.state.write();
            let LifecycleContext::InSession(current) = &*state else {
                return Err(LifecycleError::IllegalTransition {
                    action,
                    phase: state.phase(),
                });
            };
            let ended = EndedContext {
                session_id: current.session_id.clone(),
                total_duration: self.clock.now().elapsed_since(current.started_at),
                summary: Some(SessionSummary::from(&current.progression)),
            };
            *state = LifecycleContext::Ended(ended);
            state.clone()
        };

        if let LifecycleContext::Ended(ctx) = &snapshot {
            info!(
                session = %ctx.session_id,
                duration_ms = ctx.total_duration.as_millis(),
                reason,
                "Session ended"
            );
        }
        self.notify(&snapshot);
        Ok(())
    }

    /// Update the progression snapshot without a transition
    pub fn record_progress(&self, update: ProgressUpdate) -> Result<(), LifecycleError> {
        self.with_session("record progress", |ctx| ctx.progression.apply(update))
    }

    /// Replace the opaque saved-state blob without a transition
    pub fn save_state(&self, blob: Value) -> Result<(), LifecycleError> {
        self.with_session("save state", |ctx| ctx.saved_state = Some(blob))
    }

    fn with_session(
        &self,
        action: &'static str,
        f: impl FnOnce(&mut InSessionContext),
    ) -> Result<(), LifecycleError> {
        let mut state = self.state.write();
        match &mut *state {
            LifecycleContext::InSession(ctx) => {
                f(ctx);
                Ok(())
            }
            other => Err(LifecycleError::IllegalTransition {
                action,
                phase: other.phase(),
            }),
        }
    }

    /// Register a transition listener
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&LifecycleContext) + Send + Sync + 'static,
    {
        let mut listeners = self.listeners.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        Subscription {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().entries.len()
    }

    fn notify(&self, snapshot: &LifecycleContext) {
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        debug!(phase = %snapshot.phase(), listeners = listeners.len(), "Notifying lifecycle listeners");
        for listener in listeners {
            if let Err(panic) = contain(|| listener(snapshot)) {
                warn!(phase = %snapshot.phase(), panic = %panic, "Lifecycle listener panicked");
            }
        }
    }
}

impl ActiveSession for SessionDriver {
    fn active_session(&self) -> Option<SessionId> {
        self.state.read().active_session_id().cloned()
    }
}

impl fmt::Debug for SessionDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDriver")
            .field("phase", &self.phase())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use warden_core::{Difficulty, LevelId, ManualClock};

    fn driver_with_clock() -> (SessionDriver, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_at(1_000));
        let driver = SessionDriver::new(
            GuestDescriptor::new("g1", "Puzzle", "1.0.0"),
            Preferences::default(),
            clock.clone(),
        );
        (driver, clock)
    }

    fn sid(raw: &str) -> SessionId {
        SessionId::new(raw).unwrap()
    }

    #[test]
    fn test_full_lifecycle() {
        let (driver, clock) = driver_with_clock();
        assert_eq!(driver.phase(), LifecyclePhase::Initial);
        assert!(driver.active_session().is_none());

        driver.start_session(sid("s1")).unwrap();
        assert!(driver.is_session_active());
        assert_eq!(driver.active_session(), Some(sid("s1")));

        clock.advance_ms(2_500);
        driver.end_session(SessionEndReason::Completed).unwrap();

        match driver.context() {
            LifecycleContext::Ended(ctx) => {
                assert_eq!(ctx.session_id, sid("s1"));
                assert_eq!(ctx.total_duration.as_millis(), 2_500);
                assert_eq!(ctx.summary, Some(SessionSummary::default()));
            }
            other => panic!("expected ended, got {:?}", other),
        }
        assert!(driver.active_session().is_none());
    }

    #[test]
    fn test_illegal_transitions() {
        let (driver, _) = driver_with_clock();
        assert_eq!(
            driver.end_session(SessionEndReason::UserExit),
            Err(LifecycleError::IllegalTransition {
                action: "end session",
                phase: LifecyclePhase::Initial,
            })
        );

        driver.start_session(sid("s1")).unwrap();
        assert!(driver.start_session(sid("s2")).is_err());
        assert!(driver.resume_session(sid("s2"), ProgressionSnapshot::default(), None).is_err());

        driver.abort_session("renderer crashed").unwrap();
        assert!(driver.start_session(sid("s3")).is_err());
        assert!(driver.end_session(SessionEndReason::Completed).is_err());
        assert!(driver.save_state(json!({})).is_err());
    }

    #[test]
    fn test_snapshots_are_owned() {
        let (driver, _) = driver_with_clock();
        driver.start_session(sid("s1")).unwrap();

        let mut snapshot = driver.context();
        if let LifecycleContext::InSession(ctx) = &mut snapshot {
            ctx.progression.levels_completed = 99;
        }
        match driver.context() {
            LifecycleContext::InSession(ctx) => assert_eq!(ctx.progression.levels_completed, 0),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_progress_and_state_flow_into_summary() {
        let (driver, _) = driver_with_clock();
        let level = LevelId::new("intro").unwrap();
        driver
            .resume_session(
                sid("s1"),
                ProgressionSnapshot {
                    levels_completed: 2,
                    ..Default::default()
                },
                Some(json!({"board": [1, 2]})),
            )
            .unwrap();
        driver
            .record_progress(ProgressUpdate::LevelStarted {
                level: level.clone(),
                difficulty: Difficulty::new(3).unwrap(),
            })
            .unwrap();
        driver
            .record_progress(ProgressUpdate::LevelCompleted { level: level.clone() })
            .unwrap();
        driver.save_state(json!({"board": [3]})).unwrap();

        match driver.context() {
            LifecycleContext::InSession(ctx) => {
                assert_eq!(ctx.saved_state, Some(json!({"board": [3]})));
                assert_eq!(ctx.progression.levels_completed, 3);
            }
            other => panic!("unexpected {:?}", other),
        }

        driver.end_session(SessionEndReason::Completed).unwrap();
        let LifecycleContext::Ended(ended) = driver.context() else {
            panic!("expected ended");
        };
        let summary = ended.summary.unwrap();
        assert_eq!(summary.levels_completed, 3);
        assert_eq!(summary.final_level, Some(level));
    }

    #[test]
    fn test_listeners_notified_and_contained() {
        let (driver, _) = driver_with_clock();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let _bad = driver.subscribe(|_| panic!("listener bug"));
        let recorder = seen.clone();
        let _good = driver.subscribe(move |ctx| recorder.lock().push(ctx.phase()));

        driver.start_session(sid("s1")).unwrap();
        driver.save_state(json!(1)).unwrap();
        driver.end_session(SessionEndReason::Timeout).unwrap();

        assert_eq!(
            *seen.lock(),
            vec![LifecyclePhase::InSession, LifecyclePhase::Ended]
        );
    }

    #[test]
    fn test_unsubscribe() {
        let (driver, _) = driver_with_clock();
        let count = Arc::new(Mutex::new(0u32));
        let counter = count.clone();
        let sub = driver.subscribe(move |_| *counter.lock() += 1);
        assert_eq!(driver.listener_count(), 1);

        sub.unsubscribe();
        assert_eq!(driver.listener_count(), 0);
        driver.start_session(sid("s1")).unwrap();
        assert_eq!(*count.lock(), 0);
    }

    #[test]
    fn test_listener_may_read_driver() {
        let (driver, _) = driver_with_clock();
        let driver = Arc::new(driver);
        let observed = Arc::new(Mutex::new(None));

        let weak = Arc::downgrade(&driver);
        let slot = observed.clone();
        let _sub = driver.subscribe(move |_| {
            if let Some(driver) = weak.upgrade() {
                *slot.lock() = Some(driver.phase());
            }
        });
        driver.start_session(sid("s1")).unwrap();
        assert_eq!(*observed.lock(), Some(LifecyclePhase::InSession));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Start,
        End,
        Abort,
        Save,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![Just(Op::Start), Just(Op::End), Just(Op::Abort), Just(Op::Save)]
    }

    proptest! {
        #[test]
        fn prop_phases_are_monotonic(ops in proptest::collection::vec(op(), 0..20)) {
            let (driver, clock) = driver_with_clock();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let recorder = seen.clone();
            let _sub = driver.subscribe(move |ctx| recorder.lock().push(ctx.phase()));

            for op in ops {
                let before = driver.phase();
                clock.advance_ms(10);
                let result = match op {
                    Op::Start => driver.start_session(sid("s1")),
                    Op::End => driver.end_session(SessionEndReason::Completed),
                    Op::Abort => driver.abort_session("test"),
                    Op::Save => driver.save_state(json!({"t": 1})),
                };
                let legal = match op {
                    Op::Start => before == LifecyclePhase::Initial,
                    Op::End | Op::Abort | Op::Save => before == LifecyclePhase::InSession,
                };
                prop_assert_eq!(result.is_ok(), legal);
                prop_assert!(driver.phase() >= before);
            }

            let seen = seen.lock().clone();
            let expected = [LifecyclePhase::InSession, LifecyclePhase::Ended];
            prop_assert!(seen.len() <= expected.len());
            prop_assert_eq!(&seen[..], &expected[..seen.len()]);
        }
    }
}
