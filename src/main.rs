#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::correctness,
    missing_debug_implementations,
    missing_docs,
    clippy::all,
    clippy::wildcard_imports,
    clippy::needless_borrow,
    clippy::cast_lossless,
    clippy::unused_async,
    clippy::explicit_iter_loop,
    clippy::explicit_into_iter_loop,
    clippy::cloned_instead_of_copied
)]
#![cfg_attr(not(test), forbid(clippy::indexing_slicing))]
#![cfg_attr(not(test), forbid(clippy::string_slice))]
#![allow(
    clippy::match_bool,
    clippy::mixed_read_write_in_expression,
    clippy::bool_assert_comparison,
    clippy::manual_split_once,
    clippy::format_push_string,
    clippy::bool_to_int_with_if
)]
mod config;
pub(crate) mod error;
pub(crate) mod http_server;
pub(crate) mod message;
pub(crate) mod rate_limiter;
pub(crate) mod replies;
pub(crate) mod smtp_client;
pub(crate) mod submission;
pub(crate) mod utils;

use config::Config;
use env_logger::Env;
use http_server::{AppState, router, run_http_server};
use rate_limiter::SubmissionRateLimiter;
use smtp_client::{Dispatcher, SmtpRelay};
use std::env;
use std::process;
use std::sync::Arc;
use utils::unix_millis;

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Reads the optional config file, applies environment overrides and checks the result.
fn load_config(path: Option<&String>) -> Result<Config, error::Error> {
    let config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .with_env_overrides()?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    // default to info level
    let env = Env::new().filter_or("RUST_LOG", "info");
    env_logger::Builder::from_env(env)
        // disable timestamps - automatically added by systemd
        .format_timestamp(None)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() > 2 {
        eprintln!(
            "Usage: {} [config_file]",
            args.first().unwrap_or(&"contact-relay".to_string())
        );
        eprintln!("  settings missing from the file are read from the environment");
        process::exit(1);
    }

    let config = match load_config(args.get(1)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to read config: {}", e);
            process::exit(1);
        }
    };
    log::debug!("Loaded {config:?}");

    let dispatcher = match SmtpRelay::new(&config)
        .and_then(|relay| Dispatcher::from_config(&config, Arc::new(relay)))
    {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to set up mail relay: {}", e);
            process::exit(1);
        }
    };

    let limiter = Arc::new(SubmissionRateLimiter::new(
        config.max_submissions_per_window,
        config.rate_window(),
    ));

    // Identifiers that stopped sending would otherwise stay in memory forever.
    let sweeper = limiter.clone();
    let sweep_interval = config.sweep_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            match sweeper.retain_recent(unix_millis()) {
                Ok(tracked) => log::debug!("Rate limiter sweep done, {tracked} clients tracked"),
                Err(e) => log::error!("Rate limiter sweep failed: {}", e),
            }
        }
    });

    let state = Arc::new(AppState {
        limiter,
        dispatcher,
        default_language: config.language(),
    });
    log::info!(
        "Relaying contact messages to {} via {}:{}, {} submissions per {}s per client",
        config.site_mail_receiver,
        config.smtp_server_host,
        config.smtp_server_port,
        config.max_submissions_per_window,
        config.rate_window_secs
    );

    let app = router(state, config.max_body_bytes);
    if let Err(e) = run_http_server(&config.listen_addr, app).await {
        eprintln!("Server error: {}", e);
        process::exit(1);
    }
}
