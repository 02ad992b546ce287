//! Touch GW - gateway binary
//!
//! Wires the engine to an injection backend and a target probe, runs the
//! scheduler, and drives the control surface from a REPL plus config
//! hot-reload.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use touch_gw::cli::{self, Command};
use touch_gw::config::{AppConfig, ConfigWatcher};
use touch_gw::engine::Engine;
use touch_gw::inject::ConsoleInjector;
use touch_gw::probe::AlwaysActive;

/// Touch Gateway - drive a single-touch mirrored screen from keyboard and mouse
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Profile name (defaults to the first profile)
    #[arg(short, long)]
    profile: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Print the resolved configuration as JSON and exit
    #[arg(long)]
    show_config: bool,

    /// Start with mapping enabled
    #[arg(long)]
    enable: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level)?;

    info!("Starting Touch GW...");
    info!("Configuration file: {}", args.config);

    if args.show_config {
        let config = AppConfig::load(&args.config).await?;
        let profile = config.select_profile(args.profile.as_deref())?;
        let resolved = serde_json::json!({
            "target_window": config.target_window,
            "global": config.global,
            "profile": profile,
            "custom_mappings": config.custom_mappings,
        });
        println!("{}", serde_json::to_string_pretty(&resolved)?);
        return Ok(());
    }

    // Load configuration with hot-reload watcher
    let (mut config_watcher, config) = ConfigWatcher::new(args.config.clone()).await?;
    let profile = config.select_profile(args.profile.as_deref())?.clone();
    info!("Profile: {}", profile.name);

    // A platform injection backend would be registered here; the console
    // injector logs gestures instead of posting them.
    let injector = Arc::new(ConsoleInjector::new("console"));
    let engine = Arc::new(Engine::new(
        &config,
        profile,
        injector,
        Arc::new(AlwaysActive),
    )?);

    let scheduler = tokio::spawn(engine.clone().run());

    if args.enable {
        engine.set_mapping_enabled(true).await;
    }

    info!("✅ Touch GW ready (type 'status' for state, 'quit' to exit)");

    let mut repl = cli::spawn_repl();
    let profile_name = args.profile.clone();

    loop {
        tokio::select! {
            Some(cmd) = repl.recv() => {
                match cmd {
                    Command::Enable => engine.set_mapping_enabled(true).await,
                    Command::Disable => engine.set_mapping_enabled(false).await,
                    Command::Toggle => {
                        let enabled = engine.is_mapping_enabled();
                        engine.set_mapping_enabled(!enabled).await;
                    }
                    Command::Lock => engine.set_camera_lock(true),
                    Command::Unlock => engine.set_camera_lock(false),
                    Command::Backpack => engine.toggle_backpack(),
                    Command::Panic => engine.panic().await,
                    Command::Status => cli::print_status(&engine.status()),
                    Command::Quit => break,
                }
            }

            Some(new_config) = config_watcher.next_config() => {
                match new_config.select_profile(profile_name.as_deref()) {
                    Ok(profile) => engine.update_profile(profile.clone()),
                    Err(e) => warn!("config reload kept old profile: {}", e),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    engine.stop();
    let _ = scheduler.await;
    info!("Touch GW shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}
