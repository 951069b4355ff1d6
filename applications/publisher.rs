use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use log::{info, warn};

use sim_lidar::{
    consts::{BLOCK_HEADER_SIZE, HEADER_SIZE, TAIL_SIZE},
    Config, ConfigFile, FrameGenerator, Overrides, PacketSink, RawTransport, TransportKind,
    UdpTransport,
};

/// Streams simulated MSOP point cloud packets.
#[derive(Parser, Debug)]
#[command(name = "publisher", version, about)]
struct Cli {
    /// Target IP address, broadcast when unset
    #[arg(short, long, value_name = "ADDR")]
    ipaddr: Option<String>,
    /// Target port
    #[arg(short, long)]
    port: Option<String>,
    /// Number of frames to send
    #[arg(short = 'n', long, value_name = "NUM")]
    count: Option<u32>,
    /// Number of laser modules
    #[arg(short, long, value_name = "NUM")]
    laser: Option<u16>,
    /// TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Pause between frames
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,
    /// Largest datagram the raw socket may send
    #[arg(long, value_name = "BYTES")]
    mtu: Option<usize>,
    /// Use a kernel UDP socket instead of a raw socket
    #[arg(long)]
    udp: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => ConfigFile::load(path).context("loading config file")?,
        None => ConfigFile::default(),
    };
    let overrides = Overrides {
        ipaddr: cli.ipaddr,
        port: cli.port,
        count: cli.count,
        laser: cli.laser,
        interval_ms: cli.interval_ms,
        mtu: cli.mtu,
        udp: cli.udp,
    };
    let config = Config::resolve(file, overrides).context("invalid configuration")?;
    print_summary(&config);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || stop.store(true, Ordering::Relaxed))
            .context("Error setting Ctrl-C handler")?;
    }

    let (sink, host) = match config.transport {
        TransportKind::Raw => {
            let transport = RawTransport::open()
                .context("opening raw socket (needs CAP_NET_RAW, or use --udp)")?;
            let host = transport.local_addr();
            (Box::new(transport) as Box<dyn PacketSink>, host)
        }
        TransportKind::Udp => {
            let transport = UdpTransport::open().context("opening udp socket")?;
            let host = transport.local_addr();
            (Box::new(transport) as Box<dyn PacketSink>, host)
        }
    };
    match host {
        Ok(host) => info!("Host: {host}, Target: {}", config.target),
        Err(error) => warn!("cannot read local socket address: {error}"),
    }

    println!("Press Ctrl-C to quit.");
    let mut generator = FrameGenerator::new(&config, sink);
    let stats = generator.run(config.frames, &stop);

    info!(
        "sent {} frames: {} packets ({} bytes), {} failed",
        stats.frames, stats.packets_sent, stats.bytes_sent, stats.packets_failed
    );
    println!("Exit!");
    Ok(())
}

fn print_summary(config: &Config) {
    let layout = &config.layout;
    info!(
        "Target: {} via {:?} socket, MTU {}",
        config.target, config.transport, config.mtu
    );
    info!(
        "{} modules, {} channels x {} blocks per packet, {} packets per frame, {} frames",
        layout.modules,
        layout.channels_per_block(),
        layout.blocks_per_packet,
        layout.packets_per_frame(),
        config.frames
    );
    let sizes = [
        ("packet", layout.packet_len()),
        ("header", HEADER_SIZE),
        ("block", layout.block_len()),
        ("block header", BLOCK_HEADER_SIZE),
        ("tail", TAIL_SIZE),
    ];
    info!(
        "Sizes: {}",
        sizes
            .iter()
            .map(|(name, len)| format!("{name} {len} B"))
            .join(", ")
    );
}
