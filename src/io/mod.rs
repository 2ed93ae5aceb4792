//! IO modules - external system interfaces
//!
//! - `mqtt` - MQTT client for receiving vehicle location updates
//! - `door` - Device-control collaborator interface and error taxonomy
//! - `http_door` - Door control over the vendor JSON HTTP API
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod door;
pub mod http_door;
pub mod mqtt;
pub mod prometheus;

// Re-export commonly used types
pub use door::{AuthError, DeviceInfo, DeviceQueryError, DoorController, Session};
pub use http_door::HttpDoorController;
