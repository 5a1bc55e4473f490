use std::process::ExitCode;
use tracing::{error, info};

use rust_loadgen::config::Config;
use rust_loadgen::generator::LoadGenerator;

/// Prints helpful configuration documentation.
fn print_config_help() {
    eprintln!("Environment variables (all optional):");
    eprintln!("  SERVER_URL              - Target base URL (default: http://nodejs-server:3000)");
    eprintln!("  REQUEST_INTERVAL        - Milliseconds between ticks (default: 2000, must be > 0)");
    eprintln!("  CONCURRENT_REQUESTS     - Requests issued per tick (default: 3, 1 to 10000)");
    eprintln!();
    eprintln!("Scheduling and timeouts (durations like 500ms, 5s, 1m; at most 365d):");
    eprintln!("  STARTUP_DELAY           - Wait before the first tick (default: 5s)");
    eprintln!("  STATS_INTERVAL          - Statistics report period (default: 10s)");
    eprintln!("  CONNECT_TIMEOUT         - TCP connect timeout (default: 10s)");
    eprintln!("  REQUEST_TIMEOUT         - Whole-request timeout (default: 10s)");
    eprintln!();
    eprintln!("Advanced configuration:");
    eprintln!("  CUSTOM_HEADERS          - Comma-separated Name:Value headers (use \\, for literal commas)");
    eprintln!("  METRICS_PORT            - Serve Prometheus metrics on this port (default: disabled)");
    eprintln!("  METRIC_NAMESPACE        - Prometheus metric namespace (default: rust_loadgen)");
    eprintln!("  LOG_FORMAT              - text or json (default: text)");
    eprintln!("  RUST_LOG                - Log filter (default: info)");
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|f| f.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn main() -> ExitCode {
    init_tracing();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}\n", e);
            print_config_help();
            return ExitCode::FAILURE;
        }
    };

    config.print_summary();

    // One worker per concurrent request plus one for the timers, capped.
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "Failed to build runtime");
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(async {
        let generator = LoadGenerator::start(&config)?;
        generator.run_until_signal().await;
        Ok::<_, rust_loadgen::generator::StartError>(())
    });

    // Pending attempts are abandoned rather than awaited.
    runtime.shutdown_background();

    match result {
        Ok(()) => {
            info!("Load generator exited");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Error starting load generator");
            ExitCode::FAILURE
        }
    }
}
