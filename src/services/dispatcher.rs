//! Location-update ingestion and per-vehicle evaluation scheduling
//!
//! The dispatcher is the single consumer of transport events. It applies
//! coordinate updates in arrival order and spawns one evaluate-and-actuate
//! task per qualifying update; the vehicle's actuation guard is the only
//! coordination between those tasks.

use crate::domain::types::{LocationUpdate, TopicKind, VehicleId};
use crate::domain::vehicle::VehicleState;
use crate::infra::metrics::Metrics;
use crate::services::actuator::{shutdown_requested, DoorActuator};
use crate::services::geofence::GeofenceEngine;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error, PartialEq)]
pub enum UpdateError {
    #[error("no vehicle configured with id {0}")]
    UnknownVehicle(VehicleId),

    #[error("invalid {topic} payload {payload:?}")]
    InvalidCoordinate { topic: &'static str, payload: String },
}

/// What `handle_update` did with an update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Geofence-name message, logged only
    GeofenceLogged,
    /// Coordinate stored; vehicle has no complete fix yet
    AwaitingFix,
    /// Coordinate stored; actuation or cooldown in progress so no evaluation
    SkippedInFlight,
    /// Coordinate stored and an evaluation task spawned
    Scheduled,
}

pub struct Dispatcher {
    vehicles: FxHashMap<VehicleId, Arc<VehicleState>>,
    engine: GeofenceEngine,
    actuator: Arc<DoorActuator>,
    metrics: Arc<Metrics>,
    tasks: JoinSet<()>,
}

impl Dispatcher {
    pub fn new(vehicles: Vec<VehicleState>, actuator: Arc<DoorActuator>, metrics: Arc<Metrics>) -> Self {
        let vehicles = vehicles.into_iter().map(|v| (v.id(), Arc::new(v))).collect();
        Self { vehicles, engine: GeofenceEngine::new(), actuator, metrics, tasks: JoinSet::new() }
    }

    pub fn vehicle(&self, id: VehicleId) -> Option<&Arc<VehicleState>> {
        self.vehicles.get(&id)
    }

    pub fn vehicle_ids(&self) -> impl Iterator<Item = VehicleId> + '_ {
        self.vehicles.keys().copied()
    }

    /// Evaluation tasks that have not been reaped yet
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Apply one update and, for coordinates, schedule an evaluation
    pub fn handle_update(
        &mut self,
        vehicle_id: VehicleId,
        topic: TopicKind,
        payload: &str,
    ) -> Result<UpdateOutcome, UpdateError> {
        self.reap_finished();

        let Some(vehicle) = self.vehicles.get(&vehicle_id).cloned() else {
            self.metrics.record_unknown_vehicle();
            return Err(UpdateError::UnknownVehicle(vehicle_id));
        };

        if !topic.is_coordinate() {
            info!(vehicle_id = %vehicle_id, geofence = %payload.trim(), "vehicle_geofence_reported");
            return Ok(UpdateOutcome::GeofenceLogged);
        }

        let value = parse_coordinate(topic, payload).ok_or_else(|| {
            self.metrics.record_parse_error();
            UpdateError::InvalidCoordinate { topic: topic.as_str(), payload: payload.to_string() }
        })?;

        match topic {
            TopicKind::Latitude => vehicle.set_latitude(value),
            TopicKind::Longitude => vehicle.set_longitude(value),
            TopicKind::Geofence => {}
        }
        debug!(vehicle_id = %vehicle_id, topic = %topic.as_str(), value = %value, "vehicle_coordinate_updated");

        if vehicle.fix().is_none() {
            return Ok(UpdateOutcome::AwaitingFix);
        }

        if vehicle.actuation_in_flight() {
            self.metrics.record_evaluation_skipped();
            debug!(vehicle_id = %vehicle_id, "evaluation_skipped_in_flight");
            return Ok(UpdateOutcome::SkippedInFlight);
        }

        self.spawn_evaluation(vehicle);
        Ok(UpdateOutcome::Scheduled)
    }

    fn spawn_evaluation(&mut self, vehicle: Arc<VehicleState>) {
        let engine = self.engine;
        let actuator = Arc::clone(&self.actuator);
        let metrics = Arc::clone(&self.metrics);
        self.metrics.record_evaluation_scheduled();

        self.tasks.spawn(async move {
            // Another task may have won the guard since the ingestion-side check
            let Some(guard) = vehicle.try_begin_actuation() else {
                metrics.record_evaluation_skipped();
                return;
            };
            let Some(action) = engine.evaluate(&vehicle) else {
                return;
            };

            metrics.record_action_decided();
            info!(
                vehicle_id = %vehicle.id(),
                action = %action,
                at_home = %vehicle.at_home(),
                "geofence_action_required"
            );
            // Outcome and errors are logged by the actuator
            let _ = actuator.actuate_with_guard(guard, action).await;
        });
    }

    fn reap_finished(&mut self) {
        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result {
                error!(error = %e, "evaluation_task_failed");
            }
        }
    }

    /// Consume updates until the channel closes or shutdown is signalled
    pub async fn run(&mut self, mut event_rx: mpsc::Receiver<LocationUpdate>, mut shutdown: watch::Receiver<bool>) {
        info!(vehicles = %self.vehicles.len(), "dispatcher_started");

        loop {
            tokio::select! {
                update = event_rx.recv() => {
                    match update {
                        Some(u) => self.process(u),
                        None => break, // Channel closed
                    }
                }
                _ = shutdown_requested(&mut shutdown) => {
                    info!("dispatcher_shutdown_requested");
                    break;
                }
            }
        }
    }

    fn process(&mut self, update: LocationUpdate) {
        match self.handle_update(update.vehicle_id, update.topic, &update.payload) {
            Ok(_) => {}
            Err(e @ UpdateError::UnknownVehicle(_)) => {
                warn!(error = %e, "location_update_dropped");
            }
            Err(e @ UpdateError::InvalidCoordinate { .. }) => {
                warn!(vehicle_id = %update.vehicle_id, error = %e, "location_update_dropped");
            }
        }
    }

    /// Wait for every spawned evaluation to finish
    pub async fn drain(&mut self) {
        let pending = self.tasks.len();
        if pending > 0 {
            info!(pending = %pending, "dispatcher_draining");
        }
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "evaluation_task_failed");
            }
        }
    }
}

fn parse_coordinate(topic: TopicKind, payload: &str) -> Option<f64> {
    let value: f64 = payload.trim().parse().ok()?;
    let limit = match topic {
        TopicKind::Latitude => 90.0,
        TopicKind::Longitude => 180.0,
        TopicKind::Geofence => return None,
    };
    (value.is_finite() && value.abs() <= limit).then_some(value)
}
