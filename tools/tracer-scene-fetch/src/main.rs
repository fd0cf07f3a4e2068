// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! tracer-scene-fetch - pull scene segments from a scene server.
//!
//! # Usage
//!
//! ```bash
//! # List the segments a server has
//! tracer-scene-fetch --host 192.168.1.20
//!
//! # Save all segments to ./scene
//! tracer-scene-fetch --host 192.168.1.20 --output ./scene
//!
//! # Only some segments
//! tracer-scene-fetch --host 192.168.1.20 -s header -s nodes
//! ```

use clap::Parser;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracer::config::DEFAULT_DISTRIBUTION_PORT;
use tracer::{SceneClient, SegmentKind};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tracer-scene-fetch")]
#[command(about = "Fetch TRACER scene segments from a scene server")]
#[command(version)]
struct Args {
    /// Server host name or address
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_DISTRIBUTION_PORT)]
    port: u16,

    /// Segment to request (repeatable, default: all six)
    #[arg(short, long = "segment")]
    segments: Vec<String>,

    /// Directory to write the received segments into
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Connect and response timeout in milliseconds
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let server = resolve(&args.host, args.port)?;
    let names = segment_names(&args.segments);
    let mut client = SceneClient::connect(server, Duration::from_millis(args.timeout_ms))?;
    tracing::info!("Connected to {}", server);

    if let Some(ref dir) = args.output {
        std::fs::create_dir_all(dir)?;
    }

    println!("Scene from {}", server);
    let start = Instant::now();
    let mut total = 0usize;
    let mut received = 0usize;
    for name in &names {
        let bytes = client.request(name)?;
        if bytes.is_empty() {
            println!("  {:<12} missing", name);
            continue;
        }
        received += 1;
        total += bytes.len();
        println!("  {:<12} {} bytes", name, bytes.len());

        if let Some(ref dir) = args.output {
            let path = dir.join(format!("{}.bin", name));
            std::fs::write(&path, &bytes)?;
            tracing::debug!("Wrote {}", path.display());
        }
    }

    println!(
        "{}/{} segments, {} bytes in {:.1} ms",
        received,
        names.len(),
        total,
        start.elapsed().as_secs_f64() * 1000.0
    );
    Ok(())
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr, Box<dyn std::error::Error>> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| format!("No address for {}", host).into())
}

fn segment_names(requested: &[String]) -> Vec<String> {
    if requested.is_empty() {
        return SegmentKind::ALL
            .iter()
            .map(|kind| kind.name().to_string())
            .collect();
    }
    for name in requested {
        if SegmentKind::from_name(name).is_none() {
            tracing::warn!("'{}' is not a standard segment name", name);
        }
    }
    requested.to_vec()
}
