//! # Cellular Modem Communication Module
//!
//! AT-command transport to the cellular modem over a USB/UART serial
//! link. The modem is polled in text mode (`AT+CMGF=1`) and answers list
//! commands with the `+CMGL` record format the [`crate::sms`] extractor
//! parses.
//!
//! The serial port is slow and occasionally mute: every operation is
//! bounded by the configured timeouts, a response is never assumed
//! complete on the first read, and any failure aborts only the current
//! polling cycle. The device is exclusively owned by the delivery
//! pipeline — there is at most one in-flight serial session.
//!
//! ## Configuration
//!
//! ```toml
//! [modem]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! command_settle_ms = 1000
//! response_wait_ms = 3000
//! ```

use anyhow::Result;
#[cfg(feature = "serial")]
use anyhow::anyhow;
use log::{debug, info};
#[cfg(not(feature = "serial"))]
use log::warn;
use tokio::time::{sleep, Duration};

#[cfg(feature = "serial")]
use serialport::SerialPort;
#[cfg(feature = "serial")]
use std::io::{Read, Write};

use crate::config::ModemConfig;
#[cfg(feature = "serial")]
use crate::logutil::escape_log;

/// Inbox list commands, tried in order until one yields records.
/// Firmware variants disagree on which form they accept.
const LIST_COMMANDS: &[&str] = &["AT+CMGL=\"REC UNREAD\"", "AT+CMGL=\"ALL\"", "AT+CMGL"];

/// Marker every list-response record header starts with.
const RECORD_MARKER: &str = "+CMGL:";

/// Serial connection to the cellular modem.
pub struct ModemDevice {
    port_name: String,
    #[cfg(feature = "serial")]
    port: Option<Box<dyn SerialPort>>,
    command_settle: Duration,
    response_wait: Duration,
}

impl ModemDevice {
    /// Open the serial port and put the modem in SMS text mode.
    pub async fn new(config: &ModemConfig) -> Result<Self> {
        info!(
            "Initializing modem on {} at {} baud",
            config.port, config.baud_rate
        );

        #[cfg(feature = "serial")]
        {
            let mut builder = serialport::new(&config.port, config.baud_rate)
                .timeout(Duration::from_millis(config.read_timeout_ms));
            // Some USB serial adapters need explicit settings
            #[cfg(unix)]
            {
                builder = builder
                    .data_bits(serialport::DataBits::Eight)
                    .stop_bits(serialport::StopBits::One)
                    .parity(serialport::Parity::None);
            }
            let mut port = builder
                .open()
                .map_err(|e| anyhow!("Failed to open serial port {}: {}", config.port, e))?;

            // Clear any buffered boot/URC text before the first command
            let mut purge_buf = [0u8; 512];
            if let Ok(available) = port.bytes_to_read() {
                if available > 0 {
                    let _ = port.read(&mut purge_buf);
                    debug!("Purged {} buffered bytes from modem", available);
                }
            }

            let mut device = ModemDevice {
                port_name: config.port.clone(),
                port: Some(port),
                command_settle: Duration::from_millis(config.command_settle_ms),
                response_wait: Duration::from_millis(config.response_wait_ms),
            };
            device.initialize().await?;
            Ok(device)
        }

        #[cfg(not(feature = "serial"))]
        {
            warn!("Serial support not compiled in, using mock modem");
            Ok(ModemDevice {
                port_name: config.port.clone(),
                command_settle: Duration::from_millis(config.command_settle_ms),
                response_wait: Duration::from_millis(config.response_wait_ms),
            })
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    /// Run the AT init sequence: echo check, verbose errors, text mode,
    /// SIM message storage.
    async fn initialize(&mut self) -> Result<()> {
        for cmd in ["AT", "AT+CMEE=2", "AT+CMGF=1", "AT+CPMS=\"SM\""] {
            self.send_command(cmd).await?;
            sleep(self.command_settle).await;
        }
        // The init sequence answers with OKs we don't need; drop them.
        let _ = self.read_available().await?;
        info!("Modem initialized on {}", self.port_name);
        Ok(())
    }

    /// Write one AT command (CR appended) to the modem.
    pub async fn send_command(&mut self, command: &str) -> Result<()> {
        debug!("Modem <- {}", command);
        #[cfg(feature = "serial")]
        {
            let port = self
                .port
                .as_mut()
                .ok_or_else(|| anyhow!("Serial port not open"))?;
            port.write_all(command.as_bytes())
                .and_then(|_| port.write_all(b"\r"))
                .map_err(|e| anyhow!("Serial write failed on {}: {}", self.port_name, e))?;
        }
        Ok(())
    }

    /// Drain whatever the modem has to say.
    ///
    /// Waits for the response to start, then keeps reading until the line
    /// goes quiet — multi-chunk responses are the norm at 115200 baud.
    pub async fn read_available(&mut self) -> Result<String> {
        sleep(self.response_wait).await;

        #[cfg(feature = "serial")]
        {
            let port = self
                .port
                .as_mut()
                .ok_or_else(|| anyhow!("Serial port not open"))?;
            let mut collected = Vec::new();
            let mut quiet_polls = 0u8;
            while quiet_polls < 2 {
                let available = port
                    .bytes_to_read()
                    .map_err(|e| anyhow!("Serial status failed on {}: {}", self.port_name, e))?
                    as usize;
                if available == 0 {
                    quiet_polls += 1;
                    sleep(Duration::from_millis(100)).await;
                    continue;
                }
                quiet_polls = 0;
                let mut buf = vec![0u8; available.min(4096)];
                match port.read(&mut buf) {
                    Ok(n) if n > 0 => collected.extend_from_slice(&buf[..n]),
                    Ok(_) => quiet_polls += 1,
                    Err(e) if e.kind() == std::io::ErrorKind::TimedOut => quiet_polls += 1,
                    Err(e) => {
                        return Err(anyhow!("Serial read failed on {}: {}", self.port_name, e))
                    }
                }
            }
            let text = String::from_utf8_lossy(&collected).into_owned();
            debug!("Modem -> {}", escape_log(&text));
            return Ok(text);
        }

        #[cfg(not(feature = "serial"))]
        {
            Ok(String::new())
        }
    }

    /// Read the SMS inbox, trying each list-command variant until one
    /// yields records. Returns an empty string when the inbox is empty.
    pub async fn read_inbox(&mut self) -> Result<String> {
        for cmd in LIST_COMMANDS {
            self.send_command(cmd).await?;
            let response = self.read_available().await?;
            if response.contains(RECORD_MARKER) {
                return Ok(response);
            }
        }
        debug!("No SMS records in modem storage");
        Ok(String::new())
    }

    /// Count messages currently held in modem memory.
    pub async fn message_count(&mut self) -> Result<usize> {
        self.send_command("AT+CMGL=\"ALL\"").await?;
        let response = self.read_available().await?;
        Ok(response.matches(RECORD_MARKER).count())
    }

    /// Bulk-delete every message in modem storage.
    ///
    /// Protects the modem's small SIM store from exhaustion; the local
    /// outbox is unaffected.
    pub async fn delete_all(&mut self) -> Result<()> {
        self.send_command("AT+CMGD=1,4").await?;
        sleep(self.command_settle).await;
        let _ = self.read_available().await?;
        info!("Deleted all messages from modem storage");
        Ok(())
    }
}
