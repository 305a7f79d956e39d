//! # Telemetry API Client Module
//!
//! HTTP client for the central telemetry service: connectivity probe,
//! credential login, and per-record submission. The pipeline owns exactly
//! one in-flight request at a time and treats every failure as
//! cycle-local — a failed submit leaves the record queued for the next
//! cycle, it is never retried inline.
//!
//! [`TelemetryApi`] is the seam between the pipeline and the network;
//! tests drive the pipeline against an in-memory implementation.

use std::time::Duration;

use log::{debug, error, info, warn};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::ApiConfig;
use crate::queue::QueuedRecord;
use crate::sensor::SensorReading;

/// Why a delivery attempt failed. The retry policy is flat — every
/// variant means "leave the record queued" — but the distinction matters
/// for logs and operator diagnosis.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    /// The API answered and said no. Transient and permanent rejections
    /// are not distinguished; both stay queued.
    #[error("rejected by telemetry API (status {status}): {detail}")]
    Rejected { status: u16, detail: String },
}

/// Remote telemetry service operations the delivery pipeline needs.
pub trait TelemetryApi {
    /// Cheap reachability probe. `false` skips delivery phases wholesale.
    async fn check_connectivity(&self) -> bool;

    /// Obtain a fresh access token. `None` means this cycle delivers
    /// nothing; the queue is untouched.
    async fn login(&self) -> Option<String>;

    /// Submit one record. The payload is a single flat object carrying
    /// identity, canonical timestamp, and every reading field.
    async fn submit(
        &self,
        token: &str,
        record: &QueuedRecord,
        reading: &SensorReading,
    ) -> Result<(), DeliveryError>;
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
}

/// Production client backed by `reqwest`.
pub struct TelemetryClient {
    config: ApiConfig,
    client: reqwest::Client,
}

impl TelemetryClient {
    /// Build a client from configuration.
    ///
    /// `accept_invalid_certs` exists because deployments in the field sit
    /// behind endpoints whose certificate the gateway cannot verify.
    pub fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        if config.accept_invalid_certs {
            warn!("TLS certificate verification is disabled for {}", config.base_url);
        }
        Ok(Self { config, client })
    }

    fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.config.timeout_seconds as u64)
    }

    fn login_url(&self) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), self.config.login_path)
    }

    fn telemetry_url(&self) -> String {
        format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.telemetry_path
        )
    }
}

impl TelemetryApi for TelemetryClient {
    async fn check_connectivity(&self) -> bool {
        let probe = self
            .client
            .get(&self.config.base_url)
            .header("Accept", "application/json")
            .send();
        match timeout(self.request_timeout(), probe).await {
            Ok(Ok(_)) => true, // any HTTP answer means the network path is up
            Ok(Err(e)) => {
                warn!("Connectivity check failed: {}", e);
                false
            }
            Err(_) => {
                warn!(
                    "Connectivity check timed out after {}s",
                    self.config.timeout_seconds
                );
                false
            }
        }
    }

    async fn login(&self) -> Option<String> {
        let request = self
            .client
            .post(self.login_url())
            .json(&json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .header("Accept", "application/json")
            .send();

        let response = match timeout(self.request_timeout(), request).await {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => {
                error!("Login request failed: {}", e);
                return None;
            }
            Err(_) => {
                error!("Login timed out after {}s", self.config.timeout_seconds);
                return None;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            error!("Login failed ({}): {}", status, detail);
            return None;
        }

        match response.json::<LoginResponse>().await {
            Ok(LoginResponse {
                access_token: Some(token),
            }) => {
                info!("Obtained telemetry access token");
                Some(token)
            }
            Ok(_) => {
                error!("Login response carried no access token");
                None
            }
            Err(e) => {
                error!("Failed to parse login response: {}", e);
                None
            }
        }
    }

    async fn submit(
        &self,
        token: &str,
        record: &QueuedRecord,
        reading: &SensorReading,
    ) -> Result<(), DeliveryError> {
        let mut payload = serde_json::to_value(reading)
            .map_err(|e| DeliveryError::Transport(format!("payload serialization: {}", e)))?;
        if let serde_json::Value::Object(ref mut map) = payload {
            map.insert("phone_number".into(), json!(record.identity));
            map.insert("created_at".into(), json!(record.timestamp));
        }
        debug!("Submitting telemetry for {}: {}", record.identity, payload);

        let request = self
            .client
            .post(self.telemetry_url())
            .bearer_auth(token)
            .json(&payload)
            .header("Accept", "application/json")
            .send();

        let response = match timeout(self.request_timeout(), request).await {
            Ok(Ok(r)) => r,
            Ok(Err(e)) => return Err(DeliveryError::Transport(e.to_string())),
            Err(_) => return Err(DeliveryError::Timeout(self.config.timeout_seconds as u64)),
        };

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status().as_u16();
            let detail = response.text().await.unwrap_or_default();
            Err(DeliveryError::Rejected { status, detail })
        }
    }
}
