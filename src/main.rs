// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use wasm_canvas_host::config::load_and_validate_config;
use wasm_canvas_host::host::LoadState;
use wasm_canvas_host::render::Canvas;
use wasm_canvas_host::runtime::{KeyEvent, PageSession};

#[derive(Parser, Debug)]
#[command(
    name = "wasm-canvas-host",
    about = "Run a WebAssembly canvas demo page against an offscreen surface."
)]
struct Args {
    /// Page configuration (YAML)
    config: PathBuf,

    /// How long to keep the page mounted before unmounting it
    #[arg(long, value_name = "MS", default_value_t = 1000)]
    duration_ms: u64,

    /// Keys to press and release once the page is ready, comma separated
    #[arg(long, value_name = "KEYS", value_delimiter = ',')]
    keys: Vec<String>,

    /// Write the surface to this PNG before unmounting
    #[arg(long, value_name = "PATH")]
    snapshot: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = load_and_validate_config(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;

    println!("📄 {} ({})", config.name, config.module.display());
    let mut session = PageSession::mount(config, Some(Canvas::new()))?;

    let status = session.load().await;
    println!("   {}", status);
    if let LoadState::Failed(error) = &status {
        session.unmount().await;
        bail!("page failed: {}", error);
    }

    if let Some(probe) = session.probe() {
        println!("   add = {}", probe.sum);
        println!("   buffer @{} = {:?}", probe.offset, probe.bytes);
    }

    let hub = session.hub();
    for key in &args.keys {
        hub.dispatch(&KeyEvent::down(key.as_str()));
        hub.dispatch(&KeyEvent::up(key.as_str()));
    }

    tokio::time::sleep(Duration::from_millis(args.duration_ms)).await;

    if session.frames() > 0 {
        println!("   frames: {}", session.frames());
    }
    if let Some(fault) = session.frame_fault() {
        println!("   ❌ frame {} failed: {}", fault.frame, fault.message);
    }
    if session.poll_ticks() > 0 {
        println!("   presenter ticks: {}", session.poll_ticks());
    }
    if let Some(fault) = session.present_fault() {
        println!("   ❌ presenter tick {} failed: {}", fault.tick, fault.error);
    }

    if let Some(path) = &args.snapshot {
        match session.surface() {
            Some(surface) => {
                surface
                    .lock()
                    .map_err(|e| anyhow::anyhow!("surface poisoned: {}", e))?
                    .save(path)?;
                println!("   📸 snapshot written to {}", path.display());
            }
            None => println!("   (page has no surface, skipping snapshot)"),
        }
    }

    session.unmount().await;
    Ok(())
}
