// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TRACER scene server
//!
//! Serves pre-serialized scene segments from a directory to requesting
//! clients until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Serve ./scene on the default port
//! tracer-scene-server --scene-dir ./scene
//!
//! # Re-read the segment files every 5 seconds
//! tracer-scene-server --scene-dir ./scene --reload-interval 5
//!
//! # Using configuration file
//! tracer-scene-server --config scene-server.toml
//! ```

mod config;
mod scene_dir;

use clap::{Parser, Subcommand};
use config::{ConfigError, ServerConfig};
use scene_dir::DirectoryScene;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracer::{DistributionServer, ServerStatsSnapshot, SnapshotCache};
use tracing_subscriber::EnvFilter;

/// TRACER scene distribution server
#[derive(Parser, Debug)]
#[command(name = "tracer-scene-server")]
#[command(about = "Serve TRACER scene segments to requesting clients")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the segment files
    #[arg(short, long, conflicts_with = "config")]
    scene_dir: Option<PathBuf>,

    /// Bind address
    #[arg(short, long, conflicts_with = "config")]
    bind: Option<String>,

    /// Port to listen on
    #[arg(short, long, conflicts_with = "config")]
    port: Option<u16>,

    /// Reload the segment files every N seconds (0 to disable)
    #[arg(long, conflicts_with = "config")]
    reload_interval: Option<u64>,

    /// Statistics reporting interval (seconds, 0 to disable)
    #[arg(long, default_value = "10")]
    stats_interval: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "scene-server.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(cmd) = args.command {
        init_tracing(&args.log_level);
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    // The config file, when given, decides the log level.
    let config = build_config(&args)?;
    init_tracing(&config.log_level);
    run(config)
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_config(args: &Args) -> Result<ServerConfig, ConfigError> {
    if let Some(ref config_path) = args.config {
        return ServerConfig::from_file(config_path);
    }

    let scene_dir = args
        .scene_dir
        .clone()
        .ok_or_else(|| ConfigError::Invalid("Missing --scene-dir (or use --config)".into()))?;

    let mut config = ServerConfig {
        scene_dir,
        stats_interval_secs: args.stats_interval,
        log_level: args.log_level.clone(),
        ..Default::default()
    };
    if let Some(ref bind) = args.bind {
        config.bind_address = bind.clone();
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(secs) = args.reload_interval {
        config.reload_interval_secs = secs;
    }
    config.validate()?;
    Ok(config)
}

fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let scene = DirectoryScene::new(&config.scene_dir);
    let cache = Arc::new(SnapshotCache::new());
    let server = DistributionServer::with_config(Arc::clone(&cache), config.to_distribution_config()?);
    let addr = server.send_scene(&scene)?;

    println!("TRACER Scene Server v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!();
    println!("Listening: {}", addr);
    println!("Scene dir: {}", scene.dir().display());
    print_segments(&cache);
    println!();
    println!("Press Ctrl+C to stop...");
    println!();

    let reload_interval = config.reload_interval();
    let stats_interval = config.stats_interval();
    let mut last_reload = Instant::now();
    let mut last_stats = Instant::now();

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));

        if let Some(interval) = reload_interval {
            if last_reload.elapsed() >= interval {
                let epoch = cache.refresh_from(&scene);
                tracing::debug!("Reloaded scene (epoch {})", epoch);
                last_reload = Instant::now();
            }
        }

        if let Some(interval) = stats_interval {
            if last_stats.elapsed() >= interval {
                print_stats(&server.stats());
                last_stats = Instant::now();
            }
        }
    }

    println!("\nShutting down...");
    let final_stats = server.stats();
    if let Err(e) = server.stop() {
        tracing::warn!("Server stopped with errors: {}", e);
    }

    println!("\nFinal Statistics:");
    print_stats(&final_stats);
    Ok(())
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig {
        scene_dir: PathBuf::from("/var/lib/tracer/scene"),
        reload_interval_secs: 5,
        ..Default::default()
    };

    let toml_str = toml::to_string_pretty(&config)?;

    let content = format!(
        r#"# TRACER Scene Server Configuration
# Generated by tracer-scene-server gen-config
#
# scene_dir holds one file per segment: header, nodes, objects,
# characters, textures, materials (optionally with a .bin extension).

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match ServerConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!("Bind:      {}:{}", config.bind_address, config.port);
            println!("Scene dir: {}", config.scene_dir.display());
            match config.reload_interval() {
                Some(interval) => println!("Reload:    every {}s", interval.as_secs()),
                None => println!("Reload:    disabled"),
            }
            println!("Max peers: {}", config.max_peers);
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_segments(cache: &SnapshotCache) {
    let snapshot = cache.snapshot();
    if snapshot.is_empty() {
        println!("Segments:  none (every request will be a miss)");
        return;
    }
    println!("Segments:");
    for name in snapshot.names() {
        let size = snapshot.get(name).map_or(0, |bytes| bytes.len());
        println!("  {:<12} {}", name, format_bytes(size as u64));
    }
}

fn print_stats(stats: &ServerStatsSnapshot) {
    println!("--- Server Statistics ---");
    println!(
        "  {} requests ({} hits, {} misses, {:.1}% hit rate), {} sent",
        stats.requests,
        stats.hits,
        stats.misses,
        stats.hit_rate() * 100.0,
        format_bytes(stats.bytes_sent)
    );
    println!(
        "  peers: {} active, {} accepted, {} dropped, {} refused",
        stats.active_peers, stats.peers_accepted, stats.peers_dropped, stats.peers_refused
    );
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
