//! Device-control collaborator interface
//!
//! The actuator only talks to the garage door through `DoorController`, so
//! any backend (HTTP API, test double) can be plugged in.

use crate::domain::types::{Action, DoorState};
use async_trait::async_trait;
use thiserror::Error;

/// Credentials could not be exchanged for a session
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credentials rejected: {0}")]
    Rejected(String),

    #[error("login request failed: {0}")]
    Request(String),
}

/// Transient failure while querying or commanding a device
#[derive(Debug, Error)]
pub enum DeviceQueryError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("unexpected status {status} from {path}")]
    Status { status: u16, path: String },

    #[error("unknown device serial {0}")]
    UnknownDevice(String),

    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("device backend unavailable: {0}")]
    Unavailable(String),
}

/// Authenticated session handed back by `DoorController::authenticate`
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// A device known to the backend
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub name: String,
    pub serial: String,
    pub device_type: String,
    pub state: DoorState,
}

#[async_trait]
pub trait DoorController: Send + Sync {
    async fn authenticate(&self) -> Result<Session, AuthError>;

    async fn query_state(&self, session: &Session, serial: &str) -> Result<DoorState, DeviceQueryError>;

    async fn set_state(&self, session: &Session, serial: &str, action: Action) -> Result<(), DeviceQueryError>;

    async fn list_devices(&self, session: &Session) -> Result<Vec<DeviceInfo>, DeviceQueryError>;
}
