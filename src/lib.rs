//! # Smsgate - SMS Telemetry Gateway
//!
//! Smsgate is an edge gateway that turns SMS messages from remote sensor
//! field units into telemetry API submissions. It polls a cellular
//! modem's inbox over a serial line, decodes the channel readings packed
//! into each message body, and forwards them upstream — buffering
//! durably on disk whenever the network is down so no reading is lost.
//!
//! ## Features
//!
//! - **Modem Polling**: AT-command text-mode SMS retrieval over USB/UART,
//!   with a fallback command ladder for firmware variants.
//! - **Sensor Decoding**: Declarative per-layout channel tables map
//!   `AIN`/`DIN` markers onto named physical quantities.
//! - **Durable Outbox**: One-file-per-record on-disk queue with atomic
//!   writes and idempotent removal; at-least-once delivery across crashes
//!   and outages.
//! - **Telemetry Client**: Token-authenticated JSON submission with
//!   bounded timeouts; every failure is cycle-local.
//! - **Daemon Mode**: Background service support (Unix) with PID file and
//!   TTY-aware logging.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smsgate::config::Config;
//! use smsgate::gateway::GatewayServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let mut gateway = GatewayServer::new(config).await?;
//!     gateway.connect_modem().await?;
//!     gateway.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`gateway`] - Delivery pipeline and polling loop
//! - [`modem`] - Cellular modem serial transport
//! - [`sms`] - Raw inbox parsing and timestamp normalization
//! - [`sensor`] - Channel decoding and station classification
//! - [`queue`] - Durable outbox persistence
//! - [`api`] - Telemetry service client
//! - [`config`] - Configuration management
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    Gateway      │ ← Polling loop and phase orchestration
//! └─────────────────┘
//!      │        │
//! ┌─────────┐ ┌─────────┐
//! │  Modem  │ │ Outbox  │ ← Serial transport / durable queue
//! └─────────┘ └─────────┘
//!      │        │
//! ┌─────────────────┐
//! │ SMS → Sensor →  │ ← Extraction, decoding, delivery
//! │ Telemetry API   │
//! └─────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod display;
pub mod gateway;
pub mod logutil;
pub mod modem;
pub mod queue;
pub mod sensor;
pub mod sms;
