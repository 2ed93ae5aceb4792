//! Shared types for the geofence core

use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Newtype wrapper for vehicle IDs to provide type safety
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct VehicleId(pub i64);

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for VehicleId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(VehicleId)
    }
}

/// Kind of location message delivered for a vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    /// Named geofence reported by the tracker; informational only
    Geofence,
    Latitude,
    Longitude,
}

impl std::str::FromStr for TopicKind {
    type Err = UnknownTopicKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "geofence" => Ok(TopicKind::Geofence),
            "latitude" => Ok(TopicKind::Latitude),
            "longitude" => Ok(TopicKind::Longitude),
            other => Err(UnknownTopicKind(other.to_string())),
        }
    }
}

impl TopicKind {
    pub const ALL: [TopicKind; 3] = [TopicKind::Geofence, TopicKind::Latitude, TopicKind::Longitude];

    pub fn as_str(&self) -> &'static str {
        match self {
            TopicKind::Geofence => "geofence",
            TopicKind::Latitude => "latitude",
            TopicKind::Longitude => "longitude",
        }
    }

    /// Whether this kind carries a coordinate and should trigger evaluation
    pub fn is_coordinate(&self) -> bool {
        matches!(self, TopicKind::Latitude | TopicKind::Longitude)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown topic kind: {0}")]
pub struct UnknownTopicKind(pub String);

/// A single update from the location source
#[derive(Debug, Clone)]
pub struct LocationUpdate {
    pub vehicle_id: VehicleId,
    pub topic: TopicKind,
    pub payload: String,
    pub received_at: Instant,
}

impl LocationUpdate {
    pub fn new(vehicle_id: VehicleId, topic: TopicKind, payload: impl Into<String>) -> Self {
        Self { vehicle_id, topic, payload: payload.into(), received_at: Instant::now() }
    }
}

/// Door actuation requested by the geofence engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Open,
    Close,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Open => "open",
            Action::Close => "close",
        }
    }

    /// Terminal door state once this action has completed
    pub fn desired_state(&self) -> DoorState {
        match self {
            Action::Open => DoorState::Open,
            Action::Close => DoorState::Closed,
        }
    }

    /// The only state from which this action is issued
    pub fn actionable_from(&self, state: &DoorState) -> bool {
        matches!((self, state), (Action::Open, DoorState::Closed) | (Action::Close, DoorState::Open))
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Door state as reported by the device-control backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DoorState {
    Open,
    Closed,
    /// Any other reported state (opening, closing, stopped, ...)
    Other(String),
}

impl DoorState {
    /// Map a backend state string; unrecognised values are kept verbatim
    pub fn from_reported(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => DoorState::Open,
            "closed" => DoorState::Closed,
            _ => DoorState::Other(s.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DoorState::Open => "open",
            DoorState::Closed => "closed",
            DoorState::Other(s) => s,
        }
    }

    pub fn is_transitional(&self) -> bool {
        matches!(self, DoorState::Other(_))
    }
}

impl std::fmt::Display for DoorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
