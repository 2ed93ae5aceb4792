//! Door actuation: drive an open/close request to a verified terminal state
//!
//! One attempt runs under the vehicle's actuation guard:
//! authenticate, query, issue the command if the door is in the opposite
//! resting state, then poll until the desired state is observed or the
//! deadline passes. When the occupancy assumption flipped, the guard is held
//! for the vehicle's cooldown so boundary hovering cannot flap the door.

use crate::domain::types::{Action, DoorState};
use crate::domain::vehicle::{ActuationGuard, VehicleState};
use crate::infra::config::{AtHomePolicy, Config, TransitionalPolicy};
use crate::infra::metrics::Metrics;
use crate::io::door::{AuthError, DeviceQueryError, DoorController, Session};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ActuationError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("device request failed: {0}")]
    Device(#[from] DeviceQueryError),

    #[error("door did not reach {desired} within {waited:?} (last observed: {last_observed})")]
    Timeout { desired: DoorState, last_observed: DoorState, waited: Duration },
}

/// How an attempt ended when no error occurred
#[derive(Debug, Clone, PartialEq)]
pub enum ActuationOutcome {
    /// Another attempt (or its cooldown) holds the vehicle's lock
    Busy,
    /// Vehicle has no fix yet
    NoFix,
    /// Test mode: nothing was sent to the backend
    TestMode,
    /// Door already in the requested terminal state
    AlreadyInState(DoorState),
    /// Door reported a transitional state and was left alone
    Indeterminate(DoorState),
    /// Command issued and the desired state observed
    Completed { waited: Duration },
}

#[derive(Debug, Clone)]
pub struct ActuationSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub at_home_policy: AtHomePolicy,
    pub transitional_policy: TransitionalPolicy,
    pub testing: bool,
}

impl Default for ActuationSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(60),
            at_home_policy: AtHomePolicy::OnIssue,
            transitional_policy: TransitionalPolicy::Skip,
            testing: false,
        }
    }
}

impl ActuationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms()),
            timeout: Duration::from_millis(config.actuation_timeout_ms()),
            at_home_policy: config.at_home_policy(),
            transitional_policy: config.transitional_policy(),
            testing: config.testing(),
        }
    }
}

pub struct DoorActuator {
    controller: Arc<dyn DoorController>,
    settings: ActuationSettings,
    metrics: Arc<Metrics>,
    shutdown: watch::Receiver<bool>,
}

impl DoorActuator {
    pub fn new(
        controller: Arc<dyn DoorController>,
        settings: ActuationSettings,
        metrics: Arc<Metrics>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { controller, settings, metrics, shutdown }
    }

    /// Actuate a vehicle's door, taking its lock first
    ///
    /// Returns `ActuationOutcome::Busy` without side effects when another
    /// attempt already holds the lock.
    pub async fn actuate(
        &self,
        vehicle: &VehicleState,
        action: Action,
    ) -> Result<ActuationOutcome, ActuationError> {
        let Some(guard) = vehicle.try_begin_actuation() else {
            debug!(vehicle_id = %vehicle.id(), action = %action, "actuation_busy");
            return Ok(ActuationOutcome::Busy);
        };
        self.actuate_with_guard(guard, action).await
    }

    /// Actuate under an already-held guard; the guard is released on return
    pub async fn actuate_with_guard(
        &self,
        guard: ActuationGuard<'_>,
        action: Action,
    ) -> Result<ActuationOutcome, ActuationError> {
        let vehicle = guard.vehicle();
        let attempt_id = Uuid::now_v7();
        let was_home = vehicle.at_home();

        let result = self.execute(&guard, action, attempt_id).await;
        self.report(vehicle, action, attempt_id, &result);

        if vehicle.at_home() != was_home {
            self.cooldown(vehicle, attempt_id).await;
        }

        result
    }

    async fn execute(
        &self,
        guard: &ActuationGuard<'_>,
        action: Action,
        attempt_id: Uuid,
    ) -> Result<ActuationOutcome, ActuationError> {
        let vehicle = guard.vehicle();
        if vehicle.fix().is_none() {
            return Ok(ActuationOutcome::NoFix);
        }

        if self.settings.testing {
            info!(
                vehicle_id = %vehicle.id(),
                attempt_id = %attempt_id,
                action = %action,
                "test_mode_skipping_actuation"
            );
            return Ok(ActuationOutcome::TestMode);
        }

        let serial = vehicle.device_serial();
        let desired = action.desired_state();

        debug!(vehicle_id = %vehicle.id(), attempt_id = %attempt_id, "door_session_requested");
        let session = self.controller.authenticate().await?;

        let mut state = self.controller.query_state(&session, serial).await?;
        info!(
            vehicle_id = %vehicle.id(),
            attempt_id = %attempt_id,
            action = %action,
            door_state = %state,
            "door_state_before_actuation"
        );

        if state.is_transitional() {
            match self.settings.transitional_policy {
                TransitionalPolicy::Skip => return Ok(ActuationOutcome::Indeterminate(state)),
                TransitionalPolicy::Wait => {
                    let (settled, _) = self
                        .poll_until(&session, serial, &desired, attempt_id, |s| !s.is_transitional())
                        .await?;
                    state = settled;
                }
            }
        }

        if state == desired {
            return Ok(ActuationOutcome::AlreadyInState(state));
        }
        if !action.actionable_from(&state) {
            return Ok(ActuationOutcome::Indeterminate(state));
        }

        self.controller.set_state(&session, serial, action).await?;
        self.metrics.record_command_issued();
        info!(vehicle_id = %vehicle.id(), attempt_id = %attempt_id, action = %action, "door_command_issued");

        if self.settings.at_home_policy == AtHomePolicy::OnIssue {
            let at_home = guard.toggle_at_home();
            info!(vehicle_id = %vehicle.id(), at_home = %at_home, "vehicle_at_home_changed");
        }

        let (_, waited) =
            self.poll_until(&session, serial, &desired, attempt_id, |s| *s == desired).await?;

        if self.settings.at_home_policy == AtHomePolicy::OnConfirm {
            let at_home = guard.toggle_at_home();
            info!(vehicle_id = %vehicle.id(), at_home = %at_home, "vehicle_at_home_changed");
        }

        Ok(ActuationOutcome::Completed { waited })
    }

    /// Poll the door every `poll_interval` until `done` holds or `timeout` elapses
    async fn poll_until<F>(
        &self,
        session: &Session,
        serial: &str,
        desired: &DoorState,
        attempt_id: Uuid,
        done: F,
    ) -> Result<(DoorState, Duration), ActuationError>
    where
        F: Fn(&DoorState) -> bool,
    {
        let started = Instant::now();
        let deadline = started + self.settings.timeout;
        let mut last: Option<DoorState> = None;

        loop {
            let state = self.controller.query_state(session, serial).await?;
            if last.as_ref() != Some(&state) {
                if last.is_some() {
                    info!(attempt_id = %attempt_id, door_state = %state, "door_state_changed");
                }
                last = Some(state.clone());
            }

            if done(&state) {
                return Ok((state, started.elapsed()));
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(ActuationError::Timeout {
                    desired: desired.clone(),
                    last_observed: state,
                    waited: started.elapsed(),
                });
            }
            sleep_until((now + self.settings.poll_interval).min(deadline)).await;
        }
    }

    /// Hold the guard for the vehicle's cooldown; ends early on shutdown
    async fn cooldown(&self, vehicle: &VehicleState, attempt_id: Uuid) {
        let cooldown = vehicle.cooldown();
        if cooldown.is_zero() {
            return;
        }

        info!(
            vehicle_id = %vehicle.id(),
            attempt_id = %attempt_id,
            cooldown_secs = %cooldown.as_secs(),
            "actuation_cooldown_started"
        );

        let mut shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(cooldown) => {
                info!(vehicle_id = %vehicle.id(), "actuation_cooldown_finished");
            }
            _ = shutdown_requested(&mut shutdown) => {
                info!(vehicle_id = %vehicle.id(), "actuation_cooldown_interrupted");
            }
        }
    }

    fn report(
        &self,
        vehicle: &VehicleState,
        action: Action,
        attempt_id: Uuid,
        result: &Result<ActuationOutcome, ActuationError>,
    ) {
        match result {
            Ok(ActuationOutcome::Completed { waited }) => {
                self.metrics.record_confirmation(waited.as_millis() as u64);
                info!(
                    vehicle_id = %vehicle.id(),
                    attempt_id = %attempt_id,
                    action = %action,
                    waited_ms = %waited.as_millis(),
                    "door_actuation_completed"
                );
            }
            Ok(ActuationOutcome::AlreadyInState(state)) => {
                self.metrics.record_noop_ack();
                info!(
                    vehicle_id = %vehicle.id(),
                    attempt_id = %attempt_id,
                    action = %action,
                    door_state = %state,
                    "door_already_in_state"
                );
            }
            Ok(ActuationOutcome::Indeterminate(state)) => {
                self.metrics.record_indeterminate();
                warn!(
                    vehicle_id = %vehicle.id(),
                    attempt_id = %attempt_id,
                    action = %action,
                    door_state = %state,
                    "door_state_not_actionable"
                );
            }
            Ok(outcome) => {
                debug!(vehicle_id = %vehicle.id(), attempt_id = %attempt_id, outcome = ?outcome, "actuation_skipped");
            }
            Err(e @ ActuationError::Timeout { .. }) => {
                self.metrics.record_timeout();
                error!(
                    vehicle_id = %vehicle.id(),
                    attempt_id = %attempt_id,
                    action = %action,
                    at_home = %vehicle.at_home(),
                    error = %e,
                    "door_actuation_timeout"
                );
            }
            Err(e) => {
                self.metrics.record_failure();
                error!(
                    vehicle_id = %vehicle.id(),
                    attempt_id = %attempt_id,
                    action = %action,
                    error = %e,
                    "door_actuation_failed"
                );
            }
        }
    }
}

/// Resolves once shutdown has been signalled; never resolves if the sender is gone
pub async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geo::{Fence, Point};
    use crate::domain::types::VehicleId;
    use crate::io::door::DeviceInfo;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory door that moves to the commanded state unless stuck
    struct FakeDoor {
        state: Mutex<DoorState>,
        script: Mutex<VecDeque<DoorState>>,
        reject_auth: bool,
        stuck: bool,
        /// queries beyond this many fail as unavailable
        fail_query_after: Option<usize>,
        fail_set: bool,
        set_delay: Duration,
        auth_calls: AtomicUsize,
        query_calls: AtomicUsize,
        set_calls: AtomicUsize,
    }

    impl FakeDoor {
        fn new(state: DoorState) -> Self {
            Self {
                state: Mutex::new(state),
                script: Mutex::new(VecDeque::new()),
                reject_auth: false,
                stuck: false,
                fail_query_after: None,
                fail_set: false,
                set_delay: Duration::ZERO,
                auth_calls: AtomicUsize::new(0),
                query_calls: AtomicUsize::new(0),
                set_calls: AtomicUsize::new(0),
            }
        }

        fn stuck(mut self) -> Self {
            self.stuck = true;
            self
        }

        fn rejecting(mut self) -> Self {
            self.reject_auth = true;
            self
        }

        fn failing_query_after(mut self, ok_queries: usize) -> Self {
            self.fail_query_after = Some(ok_queries);
            self
        }

        fn failing_set(mut self) -> Self {
            self.fail_set = true;
            self
        }

        fn with_set_delay(mut self, delay: Duration) -> Self {
            self.set_delay = delay;
            self
        }

        fn with_script(self, states: &[DoorState]) -> Self {
            self.script.lock().extend(states.iter().cloned());
            self
        }
    }

    #[async_trait]
    impl DoorController for FakeDoor {
        async fn authenticate(&self) -> Result<Session, AuthError> {
            self.auth_calls.fetch_add(1, Ordering::SeqCst);
            if self.reject_auth {
                return Err(AuthError::Rejected("status 401".to_string()));
            }
            Ok(Session::new("fake"))
        }

        async fn query_state(&self, _: &Session, _: &str) -> Result<DoorState, DeviceQueryError> {
            let n = self.query_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_query_after.is_some_and(|ok| n >= ok) {
                return Err(DeviceQueryError::Unavailable("devices/CG01".to_string()));
            }
            if let Some(next) = self.script.lock().pop_front() {
                return Ok(next);
            }
            Ok(self.state.lock().clone())
        }

        async fn set_state(&self, _: &Session, _: &str, action: Action) -> Result<(), DeviceQueryError> {
            self.set_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.set_delay).await;
            if self.fail_set {
                return Err(DeviceQueryError::Status { status: 500, path: "devices/CG01/door_state".to_string() });
            }
            if !self.stuck {
                *self.state.lock() = action.desired_state();
            }
            Ok(())
        }

        async fn list_devices(&self, _: &Session) -> Result<Vec<DeviceInfo>, DeviceQueryError> {
            Ok(Vec::new())
        }
    }

    fn fast_settings() -> ActuationSettings {
        ActuationSettings {
            poll_interval: Duration::from_millis(5),
            timeout: Duration::from_millis(60),
            ..ActuationSettings::default()
        }
    }

    fn outside_vehicle(cooldown: Duration) -> Arc<VehicleState> {
        let fence = Fence::new(Point::new(37.0, -122.0), 0.5);
        let v = VehicleState::new(VehicleId(1), "CG01", fence, cooldown);
        v.set_latitude(37.01);
        v.set_longitude(-122.0);
        Arc::new(v)
    }

    fn actuator(door: Arc<FakeDoor>, settings: ActuationSettings) -> (DoorActuator, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (DoorActuator::new(door, settings, Arc::new(Metrics::new()), rx), tx)
    }

    #[tokio::test]
    async fn test_close_issues_command_and_flips_at_home() {
        let door = Arc::new(FakeDoor::new(DoorState::Open));
        let (actuator, _tx) = actuator(door.clone(), fast_settings());
        let v = outside_vehicle(Duration::ZERO);

        let outcome = actuator.actuate(&v, Action::Close).await.unwrap();

        assert!(matches!(outcome, ActuationOutcome::Completed { .. }));
        assert_eq!(door.set_calls.load(Ordering::SeqCst), 1);
        assert_eq!(*door.state.lock(), DoorState::Closed);
        assert!(!v.at_home());
        assert!(!v.actuation_in_flight());
    }

    #[tokio::test]
    async fn test_already_closed_is_noop() {
        let door = Arc::new(FakeDoor::new(DoorState::Closed));
        let (actuator, _tx) = actuator(door.clone(), fast_settings());
        let v = outside_vehicle(Duration::ZERO);

        let outcome = actuator.actuate(&v, Action::Close).await.unwrap();

        assert_eq!(outcome, ActuationOutcome::AlreadyInState(DoorState::Closed));
        assert_eq!(door.set_calls.load(Ordering::SeqCst), 0);
        assert!(v.at_home());
    }

    #[tokio::test]
    async fn test_test_mode_never_contacts_backend() {
        let door = Arc::new(FakeDoor::new(DoorState::Open));
        let settings = ActuationSettings { testing: true, ..fast_settings() };
        let (actuator, _tx) = actuator(door.clone(), settings);
        let v = outside_vehicle(Duration::ZERO);

        let outcome = actuator.actuate(&v, Action::Close).await.unwrap();

        assert_eq!(outcome, ActuationOutcome::TestMode);
        assert_eq!(door.auth_calls.load(Ordering::SeqCst), 0);
        assert_eq!(door.query_calls.load(Ordering::SeqCst), 0);
        assert_eq!(door.set_calls.load(Ordering::SeqCst), 0);
        assert!(v.at_home());
    }

    #[tokio::test]
    async fn test_no_fix_releases_lock_without_side_effects() {
        let door = Arc::new(FakeDoor::new(DoorState::Open));
        let (actuator, _tx) = actuator(door.clone(), fast_settings());
        let fence = Fence::new(Point::new(37.0, -122.0), 0.5);
        let v = VehicleState::new(VehicleId(1), "CG01", fence, Duration::ZERO);

        let outcome = actuator.actuate(&v, Action::Close).await.unwrap();

        assert_eq!(outcome, ActuationOutcome::NoFix);
        assert_eq!(door.auth_calls.load(Ordering::SeqCst), 0);
        assert!(!v.actuation_in_flight());
    }

    #[tokio::test]
    async fn test_auth_rejected_releases_lock() {
        let door = Arc::new(FakeDoor::new(DoorState::Open).rejecting());
        let (actuator, _tx) = actuator(door.clone(), fast_settings());
        let v = outside_vehicle(Duration::ZERO);

        let err = actuator.actuate(&v, Action::Close).await.unwrap_err();

        assert!(matches!(err, ActuationError::Auth(AuthError::Rejected(_))));
        assert_eq!(door.query_calls.load(Ordering::SeqCst), 0);
        assert!(v.at_home());
        assert!(!v.actuation_in_flight());
    }

    #[tokio::test]
    async fn test_query_error_releases_lock() {
        let door = Arc::new(FakeDoor::new(DoorState::Open).failing_query_after(0));
        let (actuator, _tx) = actuator(door.clone(), fast_settings());
        let v = outside_vehicle(Duration::from_secs(600));

        let err = actuator.actuate(&v, Action::Close).await.unwrap_err();

        assert!(matches!(err, ActuationError::Device(DeviceQueryError::Unavailable(_))));
        assert_eq!(door.set_calls.load(Ordering::SeqCst), 0);
        assert!(v.at_home());
        assert!(!v.actuation_in_flight());
    }

    #[tokio::test]
    async fn test_set_error_leaves_at_home_and_releases_lock() {
        let door = Arc::new(FakeDoor::new(DoorState::Open).failing_set());
        let (actuator, _tx) = actuator(door.clone(), fast_settings());
        let v = outside_vehicle(Duration::from_secs(600));

        let err = actuator.actuate(&v, Action::Close).await.unwrap_err();

        assert!(matches!(err, ActuationError::Device(DeviceQueryError::Status { status: 500, .. })));
        assert_eq!(door.set_calls.load(Ordering::SeqCst), 1);
        assert!(v.at_home());
        assert!(!v.actuation_in_flight());
    }

    #[tokio::test]
    async fn test_poll_error_after_issue_keeps_flip_and_releases_lock() {
        // first query succeeds, every poll after the command fails
        let door = Arc::new(FakeDoor::new(DoorState::Open).failing_query_after(1));
        let (actuator, _tx) = actuator(door.clone(), fast_settings());
        let v = outside_vehicle(Duration::ZERO);

        let err = actuator.actuate(&v, Action::Close).await.unwrap_err();

        assert!(matches!(err, ActuationError::Device(DeviceQueryError::Unavailable(_))));
        assert_eq!(door.set_calls.load(Ordering::SeqCst), 1);
        assert!(!v.at_home(), "flipped when the command was issued");
        assert!(!v.actuation_in_flight());
    }

    #[tokio::test]
    async fn test_stuck_door_times_out_and_releases_lock() {
        let door = Arc::new(FakeDoor::new(DoorState::Open).stuck());
        let (actuator, _tx) = actuator(door.clone(), fast_settings());
        let v = outside_vehicle(Duration::ZERO);

        let started = std::time::Instant::now();
        let err = actuator.actuate(&v, Action::Close).await.unwrap_err();

        match err {
            ActuationError::Timeout { desired, last_observed, waited } => {
                assert_eq!(desired, DoorState::Closed);
                assert_eq!(last_observed, DoorState::Open);
                assert!(waited >= Duration::from_millis(60));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(started.elapsed() >= Duration::from_millis(60));
        // one initial query plus several polls
        assert!(door.query_calls.load(Ordering::SeqCst) > 2);
        // flipped at issuance under the default policy
        assert!(!v.at_home());
        assert!(!v.actuation_in_flight());
    }

    #[tokio::test]
    async fn test_on_confirm_policy_keeps_at_home_after_timeout() {
        let door = Arc::new(FakeDoor::new(DoorState::Open).stuck());
        let settings = ActuationSettings { at_home_policy: AtHomePolicy::OnConfirm, ..fast_settings() };
        let (actuator, _tx) = actuator(door.clone(), settings);
        let v = outside_vehicle(Duration::ZERO);

        assert!(actuator.actuate(&v, Action::Close).await.is_err());
        assert!(v.at_home());
    }

    #[tokio::test]
    async fn test_on_confirm_policy_flips_after_completion() {
        let door = Arc::new(FakeDoor::new(DoorState::Open));
        let settings = ActuationSettings { at_home_policy: AtHomePolicy::OnConfirm, ..fast_settings() };
        let (actuator, _tx) = actuator(door.clone(), settings);
        let v = outside_vehicle(Duration::ZERO);

        let outcome = actuator.actuate(&v, Action::Close).await.unwrap();
        assert!(matches!(outcome, ActuationOutcome::Completed { .. }));
        assert!(!v.at_home());
    }

    #[tokio::test]
    async fn test_transitional_state_skipped_by_default() {
        let door = Arc::new(FakeDoor::new(DoorState::Other("closing".into())));
        let (actuator, _tx) = actuator(door.clone(), fast_settings());
        let v = outside_vehicle(Duration::ZERO);

        let outcome = actuator.actuate(&v, Action::Close).await.unwrap();

        assert_eq!(outcome, ActuationOutcome::Indeterminate(DoorState::Other("closing".into())));
        assert_eq!(door.set_calls.load(Ordering::SeqCst), 0);
        assert!(v.at_home());
    }

    #[tokio::test]
    async fn test_transitional_state_waits_when_configured() {
        let door = Arc::new(
            FakeDoor::new(DoorState::Open)
                .with_script(&[DoorState::Other("opening".into()), DoorState::Other("opening".into())]),
        );
        let settings = ActuationSettings { transitional_policy: TransitionalPolicy::Wait, ..fast_settings() };
        let (actuator, _tx) = actuator(door.clone(), settings);
        let v = outside_vehicle(Duration::ZERO);

        let outcome = actuator.actuate(&v, Action::Close).await.unwrap();

        assert!(matches!(outcome, ActuationOutcome::Completed { .. }));
        assert_eq!(door.set_calls.load(Ordering::SeqCst), 1);
        assert!(!v.at_home());
    }

    #[tokio::test]
    async fn test_concurrent_actuations_issue_one_command() {
        let door = Arc::new(FakeDoor::new(DoorState::Open).with_set_delay(Duration::from_millis(20)));
        let (actuator, _tx) = actuator(door.clone(), fast_settings());
        let actuator = Arc::new(actuator);
        let v = outside_vehicle(Duration::ZERO);

        let (a, b) = tokio::join!(actuator.actuate(&v, Action::Close), actuator.actuate(&v, Action::Close));

        let outcomes = [a.unwrap(), b.unwrap()];
        assert_eq!(outcomes.iter().filter(|o| **o == ActuationOutcome::Busy).count(), 1);
        assert_eq!(door.set_calls.load(Ordering::SeqCst), 1);
        assert!(!v.at_home());
    }

    #[tokio::test]
    async fn test_cooldown_holds_lock_until_shutdown() {
        let door = Arc::new(FakeDoor::new(DoorState::Open));
        let (actuator, shutdown_tx) = actuator(door.clone(), fast_settings());
        let actuator = Arc::new(actuator);
        let v = outside_vehicle(Duration::from_secs(600));

        let task = {
            let actuator = actuator.clone();
            let v = v.clone();
            tokio::spawn(async move { actuator.actuate(&v, Action::Close).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(v.actuation_in_flight(), "lock should be held during cooldown");
        assert_eq!(actuator.actuate(&v, Action::Open).await.unwrap(), ActuationOutcome::Busy);

        shutdown_tx.send(true).unwrap();
        let outcome = task.await.unwrap().unwrap();

        assert!(matches!(outcome, ActuationOutcome::Completed { .. }));
        assert!(!v.actuation_in_flight());
        assert_eq!(door.set_calls.load(Ordering::SeqCst), 1);
    }
}
