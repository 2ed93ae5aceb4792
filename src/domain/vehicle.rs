//! Per-vehicle mutable state
//!
//! One `VehicleState` exists per configured vehicle for the whole process
//! lifetime. The ingestion path writes coordinates; evaluation tasks read
//! the fix and, while holding the actuation guard, flip `at_home`.

use crate::domain::geo::{Fence, Point};
use crate::domain::types::VehicleId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Coordinates received so far; a fix needs both
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Coordinates {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug)]
pub struct VehicleState {
    id: VehicleId,
    device_serial: String,
    fence: Fence,
    cooldown: Duration,
    position: Mutex<Coordinates>,
    at_home: AtomicBool,
    actuation_in_flight: AtomicBool,
}

impl VehicleState {
    /// New vehicle with no fix, assumed at home
    pub fn new(id: VehicleId, device_serial: impl Into<String>, fence: Fence, cooldown: Duration) -> Self {
        Self {
            id,
            device_serial: device_serial.into(),
            fence,
            cooldown,
            position: Mutex::new(Coordinates::default()),
            at_home: AtomicBool::new(true),
            actuation_in_flight: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> VehicleId {
        self.id
    }

    pub fn device_serial(&self) -> &str {
        &self.device_serial
    }

    pub fn fence(&self) -> &Fence {
        &self.fence
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn set_latitude(&self, latitude: f64) {
        self.position.lock().latitude = Some(latitude);
    }

    pub fn set_longitude(&self, longitude: f64) {
        self.position.lock().longitude = Some(longitude);
    }

    /// Current position, once both a latitude and a longitude have arrived
    pub fn fix(&self) -> Option<Point> {
        let coords = *self.position.lock();
        match (coords.latitude, coords.longitude) {
            (Some(lat), Some(lng)) => Some(Point::new(lat, lng)),
            _ => None,
        }
    }

    pub fn at_home(&self) -> bool {
        self.at_home.load(Ordering::Acquire)
    }

    pub fn actuation_in_flight(&self) -> bool {
        self.actuation_in_flight.load(Ordering::Acquire)
    }

    /// Claim the per-vehicle actuation lock, or `None` if another task holds it
    pub fn try_begin_actuation(&self) -> Option<ActuationGuard<'_>> {
        self.actuation_in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ActuationGuard { vehicle: self })
    }
}

/// Exclusive right to actuate one vehicle's door; released on drop
#[must_use = "the actuation lock is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ActuationGuard<'a> {
    vehicle: &'a VehicleState,
}

impl<'a> ActuationGuard<'a> {
    pub fn vehicle(&self) -> &'a VehicleState {
        self.vehicle
    }

    /// Flip the occupancy assumption; returns the new value
    pub fn toggle_at_home(&self) -> bool {
        !self.vehicle.at_home.fetch_xor(true, Ordering::AcqRel)
    }
}

impl Drop for ActuationGuard<'_> {
    fn drop(&mut self) {
        self.vehicle.actuation_in_flight.store(false, Ordering::Release);
    }
}
