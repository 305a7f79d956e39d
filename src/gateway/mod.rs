//! # Gateway Module - Delivery Pipeline
//!
//! Orchestrates the message-to-telemetry pipeline. Each polling cycle
//! runs three phases in order:
//!
//! ```text
//! DRAIN_QUEUE    deliver every pending outbox record, oldest first
//! INGEST_NEW     read the modem inbox, extract, enqueue, then deliver
//! CHECK_CAPACITY bulk-delete modem storage when it nears its ceiling
//! ```
//!
//! The enqueue-before-deliver ordering in INGEST_NEW is deliberate: a
//! crash between persistence and delivery loses nothing, because the next
//! DRAIN_QUEUE retries everything still on disk. Nothing is retried
//! within a cycle — retry is structural, via the outbox and the next
//! loop iteration.
//!
//! The pipeline exclusively owns the modem transport and the outbox; the
//! access token is refreshed once per cycle and passed into delivery
//! calls explicitly. A failure in any phase is logged and survived — the
//! outer loop never dies short of an external shutdown.

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::time::{sleep, Duration};

use crate::api::{TelemetryApi, TelemetryClient};
use crate::config::Config;
use crate::display::{LogDisplay, NullDisplay, StatusSink};
use crate::modem::ModemDevice;
use crate::queue::{Outbox, QueuedRecord};
use crate::sensor::{self, StationDirectory};
use crate::sms;

/// The gateway service: configuration, outbox, station directory, modem
/// and API handles, and the status display.
pub struct GatewayServer<A: TelemetryApi = TelemetryClient> {
    config: Config,
    outbox: Outbox,
    stations: StationDirectory,
    api: A,
    device: Option<ModemDevice>,
    display: Box<dyn StatusSink>,
}

impl GatewayServer<TelemetryClient> {
    /// Build the production gateway from configuration.
    pub async fn new(config: Config) -> Result<Self> {
        let api = TelemetryClient::new(config.api.clone())?;
        Self::with_api(config, api).await
    }
}

impl<A: TelemetryApi> GatewayServer<A> {
    /// Build a gateway against an arbitrary API implementation.
    pub async fn with_api(config: Config, api: A) -> Result<Self> {
        let outbox = Outbox::new(config.storage.outbox_dir()).await?;
        let stations = StationDirectory::new(config.stations.clone());
        let display: Box<dyn StatusSink> = if config.display.enabled {
            Box::new(LogDisplay)
        } else {
            Box::new(NullDisplay)
        };
        Ok(Self {
            config,
            outbox,
            stations,
            api,
            device: None,
            display,
        })
    }

    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Replace the status sink (e.g. with a panel driver).
    pub fn set_display(&mut self, display: Box<dyn StatusSink>) {
        self.display = display;
    }

    fn show(&mut self, text: &str) {
        self.display.show(text);
    }

    /// Open the modem serial port. Failure handling is the caller's
    /// policy (`require_device_at_startup`).
    pub async fn connect_modem(&mut self) -> Result<()> {
        let device = ModemDevice::new(&self.config.modem).await?;
        info!("Connected to modem on {}", device.port_name());
        self.device = Some(device);
        Ok(())
    }

    /// Run until an external shutdown signal.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            "Gateway started; polling every {}s, outbox at {}",
            self.config.gateway.poll_interval_secs,
            self.outbox.dir().display()
        );

        let mut poll =
            tokio::time::interval(Duration::from_secs(self.config.gateway.poll_interval_secs));
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    if let Err(e) = self.run_cycle().await {
                        // Catch-all boundary: no cycle error kills the process.
                        error!("Cycle error: {e:#}");
                        self.show("Cycle error; retrying");
                        sleep(Duration::from_secs(self.config.gateway.error_retry_secs)).await;
                    } else {
                        self.show("Waiting for new messages");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }
        Ok(())
    }

    /// One full DRAIN_QUEUE → INGEST_NEW → CHECK_CAPACITY cycle.
    pub async fn run_cycle(&mut self) -> Result<()> {
        // Token refresh happens once per cycle; delivery phases receive
        // it explicitly. No connectivity (or failed login) means no
        // deliveries this cycle — the queue is left untouched.
        let token = if self.api.check_connectivity().await {
            self.api.login().await
        } else {
            None
        };
        if token.is_none() {
            info!("No connectivity or login failed; deliveries deferred");
            self.show("Offline; buffering readings");
        }

        if let Some(ref token) = token {
            self.drain_queue(token).await?;
        }

        self.ingest_new(token.as_deref()).await?;
        self.check_capacity().await?;
        Ok(())
    }

    /// DRAIN_QUEUE: attempt delivery of every pending record in
    /// chronological order. One record's failure neither blocks the rest
    /// nor triggers an inline retry.
    async fn drain_queue(&mut self, token: &str) -> Result<()> {
        let pending = self.outbox.list_pending().await?;
        if pending.is_empty() {
            return Ok(());
        }
        info!("Draining {} pending record(s)", pending.len());
        for record in &pending {
            self.deliver_record(token, record).await;
        }
        Ok(())
    }

    /// INGEST_NEW: poll the modem, extract messages, persist each, then
    /// attempt immediate delivery under the same contract as the drain.
    async fn ingest_new(&mut self, token: Option<&str>) -> Result<()> {
        let raw = match self.device {
            Some(ref mut device) => {
                self.display.show("Reading inbox");
                device.read_inbox().await?
            }
            None => {
                debug!("No modem connected; skipping ingest");
                return Ok(());
            }
        };
        self.ingest_response(token, &raw).await
    }

    /// Process one raw modem response: extract, enqueue, deliver.
    ///
    /// Split out from [`Self::ingest_new`] so the pipeline can be driven
    /// without a serial device.
    pub async fn ingest_response(&mut self, token: Option<&str>, raw: &str) -> Result<()> {
        let messages = sms::extract_messages(raw, self.config.gateway.clock_offset_hours);
        if messages.is_empty() {
            return Ok(());
        }
        info!("Extracted {} sensor message(s)", messages.len());

        for message in messages {
            let record = QueuedRecord {
                identity: message.identity,
                timestamp: message.timestamp,
                body: message.body,
            };
            // Persist first: a crash after this point loses nothing.
            if let Err(e) = self.outbox.enqueue(&record).await {
                warn!("Could not persist record from {}: {e:#}", record.identity);
            }
            if let Some(token) = token {
                self.deliver_record(token, &record).await;
            }
        }
        Ok(())
    }

    /// Deliver one record; on confirmed success remove its durable unit.
    /// Returns whether delivery succeeded.
    async fn deliver_record(&mut self, token: &str, record: &QueuedRecord) -> bool {
        let mode = self.stations.classify(&record.identity);
        let reading = sensor::decode(&record.body, mode);
        match self.api.submit(token, record, &reading).await {
            Ok(()) => {
                info!("Delivered record from {} at {}", record.identity, record.timestamp);
                self.display.show(&format!("Delivered {}", record.identity));
                if let Err(e) = self.outbox.remove(record).await {
                    // Record stays on disk and re-delivers next cycle
                    warn!("Could not remove delivered record: {e:#}");
                }
                true
            }
            Err(e) => {
                warn!(
                    "Delivery failed for {} at {}: {}",
                    record.identity, record.timestamp, e
                );
                false
            }
        }
    }

    /// CHECK_CAPACITY: bulk-delete modem storage at the configured
    /// ceiling. The local outbox is unaffected.
    async fn check_capacity(&mut self) -> Result<()> {
        let Some(ref mut device) = self.device else {
            return Ok(());
        };
        let count = device.message_count().await?;
        debug!("Modem storage holds {} message(s)", count);
        if count >= self.config.gateway.modem_message_limit {
            info!(
                "Modem storage at {}/{}; clearing",
                count, self.config.gateway.modem_message_limit
            );
            device.delete_all().await?;
            self.display.show("Modem storage cleared");
        }
        Ok(())
    }

    /// Print a status summary for the `status` subcommand.
    pub async fn show_status(&self) -> Result<()> {
        let pending = self.outbox.list_pending().await?;
        println!("smsgate v{}", env!("CARGO_PKG_VERSION"));
        println!("Modem port:    {}", self.config.modem.port);
        println!("Telemetry API: {}", self.config.api.base_url);
        println!(
            "Outbox:        {} ({} pending)",
            self.outbox.dir().display(),
            pending.len()
        );
        for record in &pending {
            println!("  {}  {}", record.timestamp, record.identity);
        }
        Ok(())
    }
}
