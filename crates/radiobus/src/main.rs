// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! radiobus CLI
//!
//! Runs the packet-radio to MQTT gateway.
//!
//! # Usage
//!
//! ```bash
//! # Write an example configuration
//! radiobus gen-config --output radiobus.toml
//!
//! # Check a configuration without starting
//! radiobus validate --config radiobus.toml
//!
//! # Run the gateway
//! radiobus --config radiobus.toml --log-level debug
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use radiobus::{Gateway, GatewayConfig, GatewayHandle, LogIndicator, MqttBusClient, UdpRadio};
use tracing_subscriber::EnvFilter;

/// Packet-radio to MQTT gateway
#[derive(Parser, Debug)]
#[command(name = "radiobus")]
#[command(author = "naskel.com")]
#[command(about = "Packet-radio to MQTT gateway - radio datagrams republished as bus messages")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "radiobus.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "radiobus.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    let result = match args.command {
        Some(Commands::GenConfig { ref output }) => cmd_gen_config(output),
        Some(Commands::Validate { ref config }) => cmd_validate(config),
        None => run(&args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(args: &Args) -> Result<()> {
    let config = GatewayConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    init_logging(args.log_level.as_deref().unwrap_or(&config.gateway.log_level));

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    runtime.block_on(async {
        let radio = UdpRadio::from_config(&config.radio.udp);
        let bus = MqttBusClient::new(&config.mqtt).context("Invalid MQTT settings")?;
        let gateway = Gateway::new(&config, radio, bus)
            .context("Failed to start gateway")?
            .with_indicator(LogIndicator);

        tracing::info!(
            "radiobus v{} - node {} on {:.3} MHz, broker {}",
            env!("CARGO_PKG_VERSION"),
            config.radio.node_id,
            config.radio.frequency_mhz,
            config.mqtt.broker
        );

        tokio::spawn(wait_for_signal(gateway.handle()));
        let stats = gateway.run().await;
        tracing::info!(
            published = stats.messages_published,
            dropped = stats.publish_failures + stats.queue_drops,
            "Shutdown complete"
        );
        Ok::<(), anyhow::Error>(())
    })
}

async fn wait_for_signal(handle: GatewayHandle) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "Cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    tracing::info!("Shutting down...");
    handle.shutdown();
}

fn cmd_gen_config(output: &Path) -> Result<()> {
    let config = GatewayConfig::example();
    let toml_str = toml::to_string_pretty(&config).context("Failed to serialize config")?;

    std::fs::write(output, toml_str)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Generated configuration: {}", output.display());

    Ok(())
}

fn cmd_validate(path: &Path) -> Result<()> {
    let config = GatewayConfig::from_file(path)
        .with_context(|| format!("Invalid configuration {}", path.display()))?;

    println!("Configuration is valid: {}", path.display());
    println!("  Broker:    {} (client id '{}')", config.mqtt.broker, config.mqtt.client_id);
    println!("  Topic:     {}/<from> (qos {})", config.mqtt.topic.trim_end_matches('/'), config.mqtt.qos);
    println!(
        "  Radio:     node {} on {:.3} MHz, {} dBm{}",
        config.radio.node_id,
        config.radio.frequency_mhz,
        config.radio.tx_power_dbm,
        if config.radio.promiscuous { ", promiscuous" } else { "" }
    );
    if config.radio.reliable.enabled {
        println!(
            "  Reliable:  {} retries, {} ms timeout",
            config.radio.reliable.max_retries, config.radio.reliable.retry_timeout_ms
        );
    } else {
        println!("  Reliable:  disabled");
    }

    Ok(())
}
