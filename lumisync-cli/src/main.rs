//! lumisync — entry point.
//!
//! ```text
//! lumisync scan                         Discover controllers on the LAN
//! lumisync send --color "#ff0000"       Push one color and exit
//! lumisync run --pattern                Stream colors to a controller
//! lumisync gen-config                   Dump default config and exit
//! ```

mod config;
mod source;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lumisync_core::{
    ColorPacket, Rgb, SyncLoop, Transport, TransportEvent, UdpTransport,
};

use config::CliConfig;
use source::{RawFileSource, TestPatternSource};

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "lumisync", about = "Ambient LED color sync over the local network")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "lumisync.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Broadcast discovery probes and list responding controllers.
    Scan {
        /// Discovery window in seconds (overrides config).
        #[arg(short, long)]
        window: Option<u64>,
    },

    /// Send one color frame to a controller and exit.
    Send {
        /// Controller address (overrides config). Example: 192.168.1.50:7777
        #[arg(short, long)]
        device: Option<String>,

        /// Whole-strip color as "#rrggbb".
        #[arg(long, conflicts_with_all = ["top", "right", "bottom", "left"])]
        color: Option<String>,

        /// Top edge color as "#rrggbb" (region frame; needs all four).
        #[arg(long)]
        top: Option<String>,

        /// Right edge color.
        #[arg(long)]
        right: Option<String>,

        /// Bottom edge color.
        #[arg(long)]
        bottom: Option<String>,

        /// Left edge color.
        #[arg(long)]
        left: Option<String>,
    },

    /// Stream extracted colors to a controller until interrupted.
    Run {
        /// Controller address (overrides config).
        #[arg(short, long)]
        device: Option<String>,

        /// Recording of raw RGBA frames to replay.
        #[arg(long, conflicts_with = "pattern")]
        input: Option<PathBuf>,

        /// Frame width of the recording.
        #[arg(long, default_value_t = 320)]
        width: u32,

        /// Frame height of the recording.
        #[arg(long, default_value_t = 240)]
        height: u32,

        /// Synthesize a moving test pattern instead of reading frames.
        #[arg(long)]
        pattern: bool,

        /// Scan first and stream to the first controller found.
        #[arg(long, conflicts_with = "device")]
        discover: bool,
    },

    /// Print the default configuration to stdout and exit.
    GenConfig,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if matches!(cli.command, Command::GenConfig) {
        let text = toml::to_string_pretty(&CliConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = CliConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("lumisync v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Scan { window } => {
            let window = Duration::from_secs(window.unwrap_or(config.device.scan_window_secs));
            scan(window).await
        }
        Command::Send {
            device,
            color,
            top,
            right,
            bottom,
            left,
        } => {
            let addr = parse_device(device.as_deref().unwrap_or(&config.device.address))?;
            let packet = match (color, top, right, bottom, left) {
                (Some(c), ..) => ColorPacket::Single(parse_color(&c)?),
                (None, Some(t), Some(r), Some(b), Some(l)) => ColorPacket::Regions {
                    top: parse_color(&t)?,
                    right: parse_color(&r)?,
                    bottom: parse_color(&b)?,
                    left: parse_color(&l)?,
                },
                _ => {
                    return Err(
                        "send needs --color, or all of --top --right --bottom --left".into(),
                    );
                }
            };
            send_once(addr, packet).await
        }
        Command::Run {
            device,
            input,
            width,
            height,
            pattern,
            discover,
        } => {
            let target = if discover {
                None
            } else {
                Some(parse_device(
                    device.as_deref().unwrap_or(&config.device.address),
                )?)
            };
            run_sync(target, &config, input, width, height, pattern).await
        }
        Command::GenConfig => unreachable!(),
    }
}

/// Accept "ip" (default color port) or "ip:port".
fn parse_device(address: &str) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok(addr);
    }
    let ip: std::net::IpAddr = address
        .parse()
        .map_err(|_| format!("invalid device address {address:?}"))?;
    Ok(SocketAddr::new(ip, lumisync_core::DEVICE_PORT))
}

fn parse_color(hex: &str) -> Result<Rgb, Box<dyn std::error::Error>> {
    Rgb::from_hex(hex).ok_or_else(|| format!("invalid color {hex:?}, expected \"#rrggbb\"").into())
}

// ── Subcommands ──────────────────────────────────────────────────

async fn scan(window: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, mut rx) = mpsc::channel(32);
    let transport = UdpTransport::new().with_events(tx);

    println!("scanning for {}s...", window.as_secs());
    transport.start_scan(window).await?;

    while let Some(event) = rx.recv().await {
        match event {
            TransportEvent::DeviceFound(device) => {
                println!(
                    "  {:<20} {:<24} {}",
                    device.id,
                    device.name,
                    device.address
                );
            }
            TransportEvent::ScanFinished { devices } => {
                println!("done: {devices} controller(s) found");
                break;
            }
            TransportEvent::ScanFailed(reason) => {
                return Err(format!("scan failed: {reason}").into());
            }
            _ => {}
        }
    }
    Ok(())
}

async fn send_once(
    addr: SocketAddr,
    packet: ColorPacket,
) -> Result<(), Box<dyn std::error::Error>> {
    let transport = UdpTransport::new();
    let id = transport.register("controller", addr);
    transport.connect(&id).await?;
    transport.send(&packet).await?;
    info!("sent {} byte frame to {addr}", packet.encoded_len());
    Ok(())
}

async fn run_sync(
    target: Option<SocketAddr>,
    config: &CliConfig,
    input: Option<PathBuf>,
    width: u32,
    height: u32,
    pattern: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, mut rx) = mpsc::channel(32);
    let transport = Arc::new(UdpTransport::new().with_events(tx));

    let id = match target {
        Some(addr) => transport.register("controller", addr),
        None => {
            // Scan and take the first controller that answers.
            let window = Duration::from_secs(config.device.scan_window_secs);
            println!("scanning for {}s...", window.as_secs());
            transport.start_scan(window).await?;
            loop {
                match rx.recv().await {
                    Some(TransportEvent::DeviceFound(device)) => {
                        info!("found {} at {}", device.name, device.address);
                        transport.stop_scan().await;
                        break device.id;
                    }
                    Some(TransportEvent::ScanFinished { .. }) => {
                        return Err("no controllers found".into());
                    }
                    Some(TransportEvent::ScanFailed(reason)) => {
                        return Err(format!("scan failed: {reason}").into());
                    }
                    Some(_) => {}
                    None => return Err("event channel closed".into()),
                }
            }
        }
    };

    transport.connect(&id).await?;
    info!("connected to {id}");

    let sync_config = config.sync_config();
    let source: Box<dyn lumisync_core::FrameSource> = if pattern {
        Box::new(TestPatternSource::new(width, height))
    } else if let Some(path) = input {
        Box::new(RawFileSource::open(&path, width, height)?)
    } else {
        return Err("run needs --input <file> or --pattern".into());
    };

    let mut sync = SyncLoop::new(source, transport, sync_config);

    // Ctrl-C trips the stop flag; the loop winds down at the next tick.
    let stop = sync.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt, stopping");
            stop.store(false, Ordering::SeqCst);
        }
    });

    sync.run().await?;
    Ok(())
}
