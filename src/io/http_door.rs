//! Door control over the device vendor's JSON HTTP API
//!
//! - `POST /api/v1/login` with Basic credentials returns `{"token": ...}`
//! - `GET /api/v1/devices` lists devices
//! - `GET /api/v1/devices/{serial}` returns `{"door_state": ...}`
//! - `PUT /api/v1/devices/{serial}/door_state` with `{"action": "open"|"close"}`

use crate::domain::types::{Action, DoorState};
use crate::infra::config::Config;
use crate::io::door::{AuthError, DeviceInfo, DeviceQueryError, DoorController, Session};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct DeviceStatusResponse {
    door_state: String,
}

#[derive(Debug, Deserialize)]
struct DeviceRecord {
    name: String,
    serial_number: String,
    #[serde(default)]
    device_type: String,
    #[serde(default)]
    door_state: String,
}

impl From<DeviceRecord> for DeviceInfo {
    fn from(record: DeviceRecord) -> Self {
        Self {
            name: record.name,
            serial: record.serial_number,
            device_type: record.device_type,
            state: DoorState::from_reported(&record.door_state),
        }
    }
}

#[derive(Debug, Serialize)]
struct SetStateRequest<'a> {
    action: &'a str,
}

pub struct HttpDoorController {
    base_url: String,
    email: String,
    password: String,
    client: reqwest::Client,
}

impl HttpDoorController {
    pub fn new(config: &Config) -> Result<Self, reqwest::Error> {
        // Create HTTP client once for reuse (connection pooling)
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.door_request_timeout_ms()))
            .build()?;

        Ok(Self {
            base_url: config.door_base_url().trim_end_matches('/').to_string(),
            email: config.door_email().to_string(),
            password: config.door_password().to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.base_url, path)
    }

    fn basic_auth(&self) -> String {
        let credentials = format!("{}:{}", self.email, self.password);
        format!("Basic {}", STANDARD.encode(credentials.as_bytes()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        session: &Session,
        path: &str,
        serial: Option<&str>,
    ) -> Result<T, DeviceQueryError> {
        let response = self.client.get(self.url(path)).bearer_auth(session.token()).send().await?;
        let body = check_status(response, path, serial).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Map a non-success device status onto the error taxonomy
fn device_status_error(status: StatusCode, path: &str, serial: Option<&str>) -> Option<DeviceQueryError> {
    if status == StatusCode::NOT_FOUND {
        if let Some(serial) = serial {
            return Some(DeviceQueryError::UnknownDevice(serial.to_string()));
        }
    }
    if status == StatusCode::SERVICE_UNAVAILABLE {
        return Some(DeviceQueryError::Unavailable(path.to_string()));
    }
    if !status.is_success() {
        return Some(DeviceQueryError::Status { status: status.as_u16(), path: path.to_string() });
    }
    None
}

/// Map a non-success login status onto `AuthError`
fn auth_status_error(status: StatusCode) -> Option<AuthError> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Some(AuthError::Rejected(format!("status {}", status.as_u16())));
    }
    if !status.is_success() {
        return Some(AuthError::Request(format!("unexpected status {}", status.as_u16())));
    }
    None
}

async fn check_status(
    response: reqwest::Response,
    path: &str,
    serial: Option<&str>,
) -> Result<bytes::Bytes, DeviceQueryError> {
    if let Some(err) = device_status_error(response.status(), path, serial) {
        return Err(err);
    }
    Ok(response.bytes().await?)
}

#[async_trait]
impl DoorController for HttpDoorController {
    async fn authenticate(&self) -> Result<Session, AuthError> {
        debug!(url = %self.url("login"), "door_login_request");

        let response = self
            .client
            .post(self.url("login"))
            .header("Authorization", self.basic_auth())
            .send()
            .await
            .map_err(|e| AuthError::Request(e.to_string()))?;

        if let Some(err) = auth_status_error(response.status()) {
            return Err(err);
        }

        let body = response.bytes().await.map_err(|e| AuthError::Request(e.to_string()))?;
        let login: LoginResponse =
            serde_json::from_slice(&body).map_err(|e| AuthError::Request(e.to_string()))?;

        info!("door_session_acquired");
        Ok(Session::new(login.token))
    }

    async fn query_state(&self, session: &Session, serial: &str) -> Result<DoorState, DeviceQueryError> {
        let path = format!("devices/{serial}");
        let status: DeviceStatusResponse = self.get_json(session, &path, Some(serial)).await?;
        Ok(DoorState::from_reported(&status.door_state))
    }

    async fn set_state(&self, session: &Session, serial: &str, action: Action) -> Result<(), DeviceQueryError> {
        let path = format!("devices/{serial}/door_state");
        let body = serde_json::to_vec(&SetStateRequest { action: action.as_str() })?;

        let response = self
            .client
            .put(self.url(&path))
            .bearer_auth(session.token())
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        check_status(response, &path, Some(serial)).await?;
        Ok(())
    }

    async fn list_devices(&self, session: &Session) -> Result<Vec<DeviceInfo>, DeviceQueryError> {
        let records: Vec<DeviceRecord> = self.get_json(session, "devices", None).await?;
        Ok(records.into_iter().map(DeviceInfo::from).collect())
    }
}
