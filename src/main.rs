//! Binary entrypoint for the smsgate CLI.
//!
//! Commands:
//! - `start [--port <path>]` - run the gateway, polling the modem and delivering telemetry
//! - `init` - create a starter `config.toml` and the data directory skeleton
//! - `status` - print configuration and outbox summary
//!
//! See the library crate docs for module-level details: `smsgate::`.
use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{info, warn};

use smsgate::config::Config;
use smsgate::gateway::GatewayServer;
use smsgate::queue::Outbox;

#[derive(Parser)]
#[command(name = "smsgate")]
#[command(about = "An SMS-to-telemetry gateway for remote sensor field units")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway polling loop
    Start {
        /// Modem serial port (e.g., /dev/ttyUSB0); overrides the config value
        #[arg(short, long)]
        port: Option<String>,

        /// Run as a background daemon (Unix only)
        #[arg(short, long)]
        daemon: bool,

        /// PID file location (for daemon mode)
        #[arg(long, default_value = "/tmp/smsgate.pid")]
        pid_file: String,
    },
    /// Initialize a new gateway configuration
    Init,
    /// Show gateway status and outbox contents
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config early to configure logging (except for Init which writes
    // the default later, and daemon Start which inits after forking)
    let pre_config = match cli.command {
        Commands::Init => None,
        Commands::Start { daemon, .. } if daemon => Config::load(&cli.config).await.ok(),
        _ => Config::load(&cli.config).await.ok(),
    };

    match &cli.command {
        Commands::Start { daemon, .. } if *daemon => {
            // Skip logging init - will happen after fork in child process
        }
        Commands::Init => {
            // Init doesn't have config yet
        }
        _ => {
            init_logging(&pre_config, cli.verbose);
        }
    }

    match cli.command {
        Commands::Start {
            port,
            daemon,
            pid_file,
        } => {
            #[cfg(all(unix, feature = "daemon"))]
            if daemon {
                let config = pre_config.unwrap_or(Config::load(&cli.config).await?);
                // Daemonize immediately - parent exits, child continues
                daemonize_process(&config, &pid_file)?;
                init_logging(&Some(config.clone()), cli.verbose);
                info!("Starting smsgate v{}", env!("CARGO_PKG_VERSION"));
                start_gateway(config, port).await?;
                return Ok(());
            }

            #[cfg(not(all(unix, feature = "daemon")))]
            if daemon {
                let _ = pid_file; // Suppress unused warning
                eprintln!("Error: Daemon mode requires Unix platform and 'daemon' feature.");
                eprintln!("Compile with: cargo build --features daemon");
                std::process::exit(1);
            }

            let config = pre_config.unwrap_or(Config::load(&cli.config).await?);
            init_logging(&Some(config.clone()), cli.verbose);
            info!("Starting smsgate v{}", env!("CARGO_PKG_VERSION"));
            start_gateway(config, port).await?;
        }
        Commands::Init => {
            init_logging(&None, cli.verbose);
            info!("Initializing new gateway configuration");
            let cfg = Config::default();
            let serialized = toml::to_string_pretty(&cfg)?;
            tokio::fs::write(&cli.config, serialized).await?;
            info!("Configuration file created at {}", cli.config);

            // Create the storage skeleton so the first start finds it
            let outbox = Outbox::new(cfg.storage.outbox_dir()).await?;
            info!("Initialized outbox at {}", outbox.dir().display());
        }
        Commands::Status => {
            let config = pre_config.unwrap_or(Config::load(&cli.config).await?);
            let gateway = GatewayServer::new(config).await?;
            gateway.show_status().await?;
        }
    }

    Ok(())
}

/// Shared startup path for foreground and daemon modes: connect the modem
/// (policy per config on failure) and run the polling loop.
async fn start_gateway(config: Config, cli_port: Option<String>) -> Result<()> {
    let mut config = config;
    if let Some(port) = cli_port {
        config.modem.port = port;
    }
    let require_device = config.modem.require_device_at_startup;
    let port_name = config.modem.port.clone();

    let mut gateway = GatewayServer::new(config).await?;
    match gateway.connect_modem().await {
        Ok(_) => {}
        Err(e) if require_device => {
            return Err(e.context(format!("Modem required at startup on {}", port_name)));
        }
        Err(e) => {
            warn!(
                "Failed to connect modem on {}: {} (gateway continuing; readings buffer until it returns)",
                port_name, e
            );
        }
    }

    info!("Gateway starting...");
    gateway.run().await
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity overrides config
    let base_level = match verbosity {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);
    if let Some(cfg) = config {
        if let Some(ref file) = cfg.logging.file {
            if let Ok(f) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
            {
                let mutex = std::sync::Arc::new(std::sync::Mutex::new(f));
                let write_mutex = mutex.clone();

                // If stdout is a terminal, mirror log lines to the console.
                // In daemon mode stdout is redirected so this is false.
                let is_tty = atty::is(atty::Stream::Stdout);

                builder.format(move |fmt, record| {
                    let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                    let line = format!("{} [{}] {}", ts, record.level(), record.args());

                    if let Ok(mut guard) = write_mutex.lock() {
                        let _ = writeln!(guard, "{}", line);
                    }

                    if is_tty {
                        writeln!(fmt, "{}", line)
                    } else {
                        Ok(())
                    }
                });
            } else {
                builder.format(|fmt, record| {
                    writeln!(
                        fmt,
                        "{} [{}] {}",
                        chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                        record.level(),
                        record.args()
                    )
                });
            }
        } else {
            builder.format(|fmt, record| {
                let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
            });
        }
    } else {
        builder.format(|fmt, record| {
            writeln!(
                fmt,
                "{} [{}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
                record.level(),
                record.args()
            )
        });
    }
    let _ = builder.try_init();
}

/// Daemonize the process (Unix only)
///
/// Spawns a detached copy of ourselves with I/O redirected to the log
/// file, writes the PID file, and exits the parent.
#[cfg(all(unix, feature = "daemon"))]
fn daemonize_process(config: &Config, pid_file: &str) -> Result<()> {
    use std::fs::OpenOptions;
    use std::process::Command;

    let log_path = config
        .logging
        .file
        .as_ref()
        .map(|s| s.as_str())
        .unwrap_or("smsgate.log");

    let current_exe = std::env::current_exe()?;
    let mut args: Vec<String> = std::env::args().collect();

    // Remove the --daemon flag to prevent infinite loop
    if let Some(pos) = args.iter().position(|arg| arg == "--daemon" || arg == "-d") {
        args.remove(pos);
    }

    // Skip the program name (args[0])
    let child_args = &args[1..];

    let log_file = OpenOptions::new().create(true).append(true).open(log_path)?;

    let child = Command::new(&current_exe)
        .args(child_args)
        .stdin(std::process::Stdio::null())
        .stdout(log_file.try_clone()?)
        .stderr(log_file)
        .spawn()?;

    std::fs::write(pid_file, format!("{}", child.id()))?;

    // Parent process exits here - child continues as daemon
    std::process::exit(0);
}
