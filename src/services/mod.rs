//! Services - business logic and state management
//!
//! - `geofence` - Open/close decision from position and occupancy assumption
//! - `actuator` - Drives a door action to a verified terminal state
//! - `dispatcher` - Single-consumer ingestion and per-vehicle evaluation tasks

pub mod actuator;
pub mod dispatcher;
pub mod geofence;

// Re-export commonly used types
pub use actuator::{ActuationError, ActuationOutcome, ActuationSettings, DoorActuator};
pub use dispatcher::{Dispatcher, UpdateError, UpdateOutcome};
pub use geofence::GeofenceEngine;
