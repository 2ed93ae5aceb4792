//! Domain models - geometry, vehicle state and shared types
//!
//! - `geo` - haversine distance and fence containment
//! - `types` - vehicle ids, topic kinds, door actions and states
//! - `vehicle` - per-vehicle state and the actuation guard

pub mod geo;
pub mod types;
pub mod vehicle;

pub use geo::{Fence, Point};
pub use types::{Action, DoorState, LocationUpdate, TopicKind, VehicleId};
pub use vehicle::{ActuationGuard, VehicleState};
