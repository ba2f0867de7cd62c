// Nano PoW Server - Free and Open Source Software Statement
//
// This project, nano-pow-server, is Free and Open Source Software (FOSS) licensed
// under the MIT License. You are free to use, modify, and distribute this
// software in accordance with the license terms. Contributions are welcome
// via pull requests to the project repository.
//
// File: src/main.rs
// Version: 1.1.0
// Developer: OIEIEIO <oieieio@protonmail.com>
//
// Binary entry point. Parses arguments, sets up logging, picks the search
// backend (OpenCL with --features gpu, CPU otherwise) and serves requests
// until interrupted.

use clap::Parser;
use nano_pow_server::miner::gpu::{AcceleratorBackend, ComputeDevice, NoDevice};
use nano_pow_server::miner::self_test::run_self_test;
use nano_pow_server::{Args, CpuBackend, RequestHandler, Result, WorkSearchEngine, WorkServer, WorkStats};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[cfg(feature = "gpu")]
use nano_pow_server::miner::gpu::opencl::OpenClEngine;

const STATS_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(err) = args.validate() {
        eprintln!("❌ Error: {}", err);
        std::process::exit(1);
    }

    // RUST_LOG wins over --log-level; log records from library modules are bridged
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if args.self_test {
        let passed = self_test(&args);
        std::process::exit(if passed { 0 } else { 1 });
    }

    #[cfg(feature = "gpu")]
    if !args.cpu_only {
        match OpenClEngine::detect() {
            Ok(device) => {
                info!("🎮 Using GPU {}", device.device().info_string());
                let accelerator = AcceleratorBackend::new(device, args.search_config().gpu_timeout);
                return serve(&args, Some(accelerator)).await;
            }
            Err(e) => tracing::warn!("⚠️ No usable GPU ({}), falling back to CPU", e),
        }
    }

    if args.cpu_only {
        info!("💻 GPU disabled by --cpu-only");
    }
    serve::<NoDevice>(&args, None).await
}

/// Build the engine around the chosen backend and run the listener
async fn serve<D: ComputeDevice + 'static>(args: &Args, accelerator: Option<AcceleratorBackend<D>>) -> Result<()> {
    let stats = Arc::new(WorkStats::new());
    let cpu = CpuBackend::new(args.worker_threads());
    let engine = Arc::new(WorkSearchEngine::new(args.search_config(), cpu, accelerator, Arc::clone(&stats)));
    info!("⚙️ Backend: {}", engine.backend_label());

    let handler = Arc::new(RequestHandler::new(engine, args.request_limit));
    let server = WorkServer::new(handler, Duration::from_secs(args.read_timeout_secs));

    let addr = args.listen_addr()?;
    let listener = match WorkServer::<D>::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let mut ticker = tokio::time::interval(STATS_INTERVAL);
    ticker.tick().await;
    let server_task = server.run(listener);
    tokio::pin!(server_task);

    loop {
        tokio::select! {
            result = &mut server_task => return result,
            _ = ticker.tick() => stats.log_summary(),
            _ = tokio::signal::ctrl_c() => {
                info!("🛑 Shutting down");
                stats.log_summary();
                return Ok(());
            }
        }
    }
}

#[cfg(feature = "gpu")]
fn self_test(args: &Args) -> bool {
    if args.cpu_only {
        return run_self_test::<NoDevice>(None).passed();
    }
    match OpenClEngine::detect() {
        Ok(device) => {
            let mut accelerator = AcceleratorBackend::new(device, args.search_config().gpu_timeout);
            run_self_test(Some(&mut accelerator)).passed()
        }
        Err(e) => {
            tracing::warn!("⚠️ No usable GPU ({}), running CPU checks only", e);
            run_self_test::<NoDevice>(None).passed()
        }
    }
}

#[cfg(not(feature = "gpu"))]
fn self_test(_args: &Args) -> bool {
    run_self_test::<NoDevice>(None).passed()
}

// Changelog:
// - v1.1.0 (2025-07-08): Periodic stats summary and Ctrl-C shutdown.
//   - --log-level applies when RUST_LOG is unset.
// - v1.0.0 (2025-07-02): Single entry point replacing the per-feature mining modes.
