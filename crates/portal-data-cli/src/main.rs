//! portal-data - diagnostic driver for the portal data access layer.
//!
//! Issues reads through a single `DataClient`, runs the prefetch planner for a
//! pathname and prints cache contents and per-route request counters, so the
//! cache and prefetch policy can be observed against a live API.

use std::io;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use portal_data_core::auth::ADMIN_ACCESS;
use portal_data_core::resources::fetch_session;
use portal_data_core::{
    ClientConfig, DataClient, IssuedPrefetch, PrefetchPlanner, RequestOptions, SessionData,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ============================================================================
// Constants
// ============================================================================

/// Log file prefix used when `--log-dir` is given
const LOG_FILE_PREFIX: &str = "portal-data.log";

const USAGE: &str = "\
Usage: portal-data [--log-dir <dir>] <command>

Commands:
  get <url> [--ttl <ms>] [--repeat <n>]     issue a read n times through one client
  plan <pathname> [--admin] [--permission <p>]...
                                            print the prefetch plan for a pathname
  prefetch <pathname> [--admin] [--permission <p>]...
                                            warm the cache for a pathname
  config                                    print the effective configuration

Without --admin or --permission, prefetch asks /api/me for the session.";

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, and additionally to a daily rolling file when a log
/// directory is given. The returned guard must be held until exit.
fn init_tracing(log_dir: Option<&PathBuf>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let log_dir = take_value(&mut args, "--log-dir")?.map(PathBuf::from);
    let _guard = init_tracing(log_dir.as_ref());

    let mut config = ClientConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        ClientConfig::default()
    });
    config.apply_env();

    if args.is_empty() {
        eprintln!("{}", USAGE);
        return Ok(());
    }
    let command = args.remove(0);

    match command.as_str() {
        "get" => run_get(config, args).await,
        "plan" => run_plan(args),
        "prefetch" => run_prefetch(config, args).await,
        "config" => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
}

/// Issue the same read `repeat` times and report how many reached the network
async fn run_get(config: ClientConfig, mut args: Vec<String>) -> Result<()> {
    let ttl_ms: u64 = take_value(&mut args, "--ttl")?
        .map(|v| v.parse::<u64>().context("--ttl expects milliseconds"))
        .transpose()?
        .unwrap_or(0);
    let repeat: usize = take_value(&mut args, "--repeat")?
        .map(|v| v.parse::<usize>().context("--repeat expects a count"))
        .transpose()?
        .unwrap_or(1);
    let url = single_positional(args, "get <url>")?;

    let client = DataClient::new(config).context("Failed to create data client")?;
    client.set_route("cli:get");

    let mut last = None;
    for attempt in 1..=repeat {
        let payload = client
            .request(&url, RequestOptions::get().ttl_ms(ttl_ms))
            .await
            .with_context(|| format!("Request {} to {} failed", attempt, url))?;
        last = Some(payload);
    }

    if let Some(payload) = last {
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }
    print_diagnostics(&client);
    Ok(())
}

fn run_plan(mut args: Vec<String>) -> Result<()> {
    let session = session_from_flags(&mut args)?.unwrap_or_default();
    let pathname = single_positional(args, "plan <pathname>")?;

    let plan = PrefetchPlanner::new().plan_for(&pathname, &session);
    if plan.is_empty() {
        println!("No prefetches for {}", pathname);
    }
    for request in plan {
        println!("GET {} (ttl {} ms)", request.url, request.ttl_ms);
    }
    Ok(())
}

async fn run_prefetch(config: ClientConfig, mut args: Vec<String>) -> Result<()> {
    let flagged = session_from_flags(&mut args)?;
    let pathname = single_positional(args, "prefetch <pathname>")?;

    let client = DataClient::new(config).context("Failed to create data client")?;
    let session = match flagged {
        Some(session) => session,
        None => fetch_session(&client).await.unwrap_or_else(|e| {
            warn!(error = %e, "Could not load session, prefetching as anonymous");
            SessionData::default()
        }),
    };

    client.set_route(&pathname);
    let issued = PrefetchPlanner::new().warm(&client, &pathname, &session);
    info!(pathname = %pathname, count = issued.len(), "Prefetches issued");

    for (url, outcome) in IssuedPrefetch::wait_all(issued).await {
        let status = if outcome.is_some() { "cached" } else { "failed" };
        println!("{:<8} {}", status, url);
    }
    print_diagnostics(&client);
    Ok(())
}

fn print_diagnostics(client: &DataClient) {
    eprintln!("\nCache entries:");
    for (key, entry) in client.cache().snapshot() {
        eprintln!("  {} (stored at {})", key, entry.stored_at_ms);
    }

    eprintln!("Requests by route:");
    for counter in client.perf().snapshot() {
        eprintln!("  {}: {}", counter.route, counter.api_requests);
    }
    eprintln!("Total network requests: {}", client.perf().total_requests());
}

/// Build a session from `--admin` / `--permission` flags, if any were given.
fn session_from_flags(args: &mut Vec<String>) -> Result<Option<SessionData>> {
    let mut permissions = Vec::new();
    while let Some(permission) = take_value(args, "--permission")? {
        permissions.push(permission);
    }
    if take_flag(args, "--admin") {
        permissions.push(ADMIN_ACCESS.to_string());
    }

    if permissions.is_empty() {
        Ok(None)
    } else {
        Ok(Some(SessionData::with_permissions(permissions)))
    }
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    match args.iter().position(|a| a == flag) {
        Some(index) => {
            args.remove(index);
            true
        }
        None => false,
    }
}

fn take_value(args: &mut Vec<String>, flag: &str) -> Result<Option<String>> {
    let Some(index) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    if index + 1 >= args.len() {
        bail!("{} expects a value", flag);
    }
    let value = args.remove(index + 1);
    args.remove(index);
    Ok(Some(value))
}

fn single_positional(args: Vec<String>, usage: &str) -> Result<String> {
    match <[String; 1]>::try_from(args) {
        Ok([value]) => Ok(value),
        Err(_) => bail!("Usage: portal-data {}", usage),
    }
}
