//! Geofence decision: which door action, if any, a vehicle's position calls for

use crate::domain::geo::{distance, Fence, Point};
use crate::domain::types::Action;
use crate::domain::vehicle::VehicleState;
use tracing::debug;

/// Decides open/close actions from position and occupancy assumption
#[derive(Debug, Clone, Copy, Default)]
pub struct GeofenceEngine;

impl GeofenceEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a vehicle's current state
    ///
    /// Returns `None` until the vehicle has a fix, and whenever the
    /// occupancy assumption already agrees with the position.
    pub fn evaluate(&self, vehicle: &VehicleState) -> Option<Action> {
        let position = vehicle.fix()?;
        let action = decide(vehicle.at_home(), position, vehicle.fence());

        debug!(
            vehicle_id = %vehicle.id(),
            position = %position,
            distance_km = format!("{:.3}", distance(position, vehicle.fence().center)),
            at_home = %vehicle.at_home(),
            action = ?action,
            "geofence_evaluated"
        );

        action
    }
}

/// At home and beyond the closing boundary: close.
/// Away and within the opening boundary: open.
pub fn decide(at_home: bool, position: Point, fence: &Fence) -> Option<Action> {
    if at_home && fence.beyond_close(position) {
        Some(Action::Close)
    } else if !at_home && fence.within_open(position) {
        Some(Action::Open)
    } else {
        None
    }
}
