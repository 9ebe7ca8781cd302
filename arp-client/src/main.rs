//! ARP client entry point.
//!
//! ```text
//! arp-client                         Connect with defaults
//! arp-client --config <path>         Use custom config TOML
//! arp-client --device <host:port>    Override the device address
//! arp-client --gen-config            Dump default config and exit
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use arp_client::config::ClientConfig;
use arp_client::runner;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "arp-client", about = "ARP remote device streaming client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "arp-client.toml")]
    config: PathBuf,

    /// Device address (overrides config). Example: 192.168.1.100:9000
    #[arg(short, long)]
    device: Option<String>,

    /// Session token (overrides config).
    #[arg(short, long)]
    session: Option<String>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.gen_config {
        let text = toml::to_string_pretty(&ClientConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = ClientConfig::load(&cli.config);
    if let Some(addr) = cli.device {
        config.network.device_address = addr;
    }
    if let Some(token) = cli.session {
        config.network.session_token = token;
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("arp-client v{}", env!("CARGO_PKG_VERSION"));

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C received, shutting down");
        }
    };

    match runner::run(config, shutdown).await {
        Ok(stats) => {
            info!(
                video_packets = stats.video_packets,
                audio_packets = stats.audio_packets,
                bytes = stats.bytes,
                "session finished"
            );
            Ok(())
        }
        Err(e) => {
            error!("session ended: {e}");
            Err(e.into())
        }
    }
}
