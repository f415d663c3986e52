// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! distobj CLI
//!
//! Connects to an object server and mirrors its distributed objects.
//!
//! # Usage
//!
//! ```bash
//! # Mirror objects using a configuration file
//! distobj run --config distobj.toml
//!
//! # Override the server address
//! distobj run --host 10.0.0.5 --port 7199 --schema classes.toml
//!
//! # Check a class schema
//! distobj validate-schema classes.toml
//!
//! # Write an example configuration
//! distobj gen-config --output distobj.toml
//! ```

use clap::{Parser, Subcommand};
use distobj::{
    load_schema, ClassDescriptorRegistry, LifecycleDispatcher, MessagePump, PumpStatsSnapshot,
    RepositoryConfig, TcpTransport,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Client-side distributed object repository
#[derive(Parser, Debug)]
#[command(name = "distobj")]
#[command(about = "Client-side distributed object repository")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Connect to the object server and pump messages until Ctrl+C
    Run {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Object server host
        #[arg(long)]
        host: Option<String>,

        /// Object server port
        #[arg(long)]
        port: Option<u16>,

        /// Class schema file
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Retention cache capacity
        #[arg(long)]
        cache_capacity: Option<usize>,

        /// Statistics reporting interval (seconds, 0 to disable)
        #[arg(long, default_value = "10")]
        stats_interval: u64,
    },

    /// Validate a class schema file
    ValidateSchema {
        /// Schema file path (TOML or JSON)
        schema: PathBuf,
    },

    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "distobj.toml")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Commands::Run {
            config,
            host,
            port,
            schema,
            cache_capacity,
            stats_interval,
        } => {
            let mut cfg = match config {
                Some(path) => RepositoryConfig::from_file(path)?,
                None => RepositoryConfig::default(),
            };
            if let Some(host) = host {
                cfg.server_host = host;
            }
            if let Some(port) = port {
                cfg.server_port = port;
            }
            if let Some(schema) = schema {
                cfg.schema_path = schema;
            }
            if let Some(capacity) = cache_capacity {
                cfg.cache_capacity = capacity;
            }
            if let Some(level) = args.log_level {
                cfg.log_level = level;
            }
            cfg.validate()?;

            init_logging(&cfg.log_level);
            cmd_run(cfg, stats_interval).await
        }
        Commands::ValidateSchema { schema } => {
            init_logging(args.log_level.as_deref().unwrap_or("info"));
            cmd_validate_schema(schema)
        }
        Commands::GenConfig { output } => {
            init_logging(args.log_level.as_deref().unwrap_or("info"));
            cmd_gen_config(output)
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

async fn cmd_run(config: RepositoryConfig, stats_interval: u64) -> Result<(), Box<dyn std::error::Error>> {
    let classes = load_schema(&config.schema_path)?;
    let registry = ClassDescriptorRegistry::builder()
        .field_objects_for_unregistered()
        .build(classes)?;

    println!("distobj v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!("Server:         {}", config.server_addr());
    println!("Classes:        {}", registry.len());
    println!("Cache capacity: {}", config.cache_capacity);
    println!();
    println!("Press Ctrl+C to stop...");
    println!();

    let transport = TcpTransport::connect(&config).await?;
    let dispatcher = LifecycleDispatcher::new(Arc::new(registry), config.cache_capacity);
    let mut pump = MessagePump::new(dispatcher, transport);

    let shutdown = pump.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("\nShutting down...");
            shutdown.notify_one();
        }
    });

    let stats = pump.stats();
    let cache_stats = pump.dispatcher().cache().stats();
    if stats_interval > 0 {
        let stats = Arc::clone(&stats);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(stats_interval));
            interval.tick().await;
            loop {
                interval.tick().await;
                print_stats(&stats.snapshot());
            }
        });
    }

    let result = pump.run(config.poll_interval()).await;

    println!("\nFinal Statistics:");
    print_stats(&stats.snapshot());
    let cache = cache_stats.snapshot();
    println!(
        "  Cache: {} parked, {} revived, {} evicted",
        cache.insertions, cache.hits, cache.evictions
    );
    println!(
        "  Objects: {} live, {} cached",
        pump.dispatcher().table().len(),
        pump.dispatcher().cache().len()
    );

    pump.dispatcher_mut().clear();
    result.map_err(Into::into)
}

fn cmd_validate_schema(path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let classes = match load_schema(&path) {
        Ok(classes) => classes,
        Err(e) => {
            eprintln!("Schema invalid: {}", e);
            std::process::exit(1);
        }
    };
    let registry = match ClassDescriptorRegistry::builder()
        .field_objects_for_unregistered()
        .build(classes)
    {
        Ok(registry) => registry,
        Err(e) => {
            eprintln!("Schema invalid: {}", e);
            std::process::exit(1);
        }
    };

    println!("Schema valid!");
    println!();
    println!("Classes: {}", registry.len());
    for desc in registry.descriptors() {
        let required = desc.fields().iter().filter(|f| f.required).count();
        println!(
            "  [{}] {} ({} fields, {} required)",
            desc.id(),
            desc.name(),
            desc.fields().len(),
            required
        );
    }
    Ok(())
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = RepositoryConfig::default().to_toml()?;

    let content = format!(
        r#"# distobj Configuration
# Generated by distobj gen-config

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn print_stats(stats: &PumpStatsSnapshot) {
    println!("--- Pump Statistics ---");
    println!(
        "  {} msgs ({:.1} msg/s), {}, {} dropped, {} sent",
        stats.messages_received,
        stats.messages_per_second(),
        format_bytes(stats.bytes_received),
        stats.messages_dropped,
        stats.messages_sent
    );
    println!(
        "  generate {} / update {} / disable {} / delete {}",
        stats.generates, stats.field_updates, stats.disables, stats.deletes
    );
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
