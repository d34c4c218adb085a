use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use switchyard::app::{handle_fatal_error, init_logging, AppConfig};
use switchyard::config::{ConfigLoader, EngineConfig};
use switchyard::error::HandlerError;
use switchyard::message::MESSAGE_ID;
use switchyard::transport::InMemoryTransport;
use switchyard::{Engine, Message, Receipt};
use tracing::info;
use uuid::Uuid;

const BUNDLED_CONFIG: &str = include_str!("../config/orders.toml");

/// Route, tap, multicast and aggregate messages
#[derive(Parser)]
#[command(name = "switchyard")]
#[command(about = "In-process message routing and fan-out engine", long_about = None)]
struct Cli {
    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate an engine configuration file
    Validate {
        /// Path to the configuration file
        config: PathBuf,
    },
    /// Print the destination a message on a routed channel would be sent to
    Route {
        /// Path to the configuration file
        config: PathBuf,
        /// Inbound channel whose route is evaluated
        #[arg(short, long)]
        channel: String,
        /// Message header as KEY=VALUE (repeatable)
        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,
        /// Message body
        #[arg(short, long, default_value = "")]
        body: String,
    },
    /// Run the order routing and split/aggregate scenarios in memory
    Demo {
        /// Configuration to use instead of the bundled order routes
        #[arg(short = 'c', long)]
        config: Option<PathBuf>,
    },
}

fn parse_header(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = run(cli.command, cli.verbose).await;
    if let Err(e) = result {
        handle_fatal_error(e, cli.verbose);
    }
}

async fn run(command: Commands, verbose: u8) -> Result<()> {
    match command {
        Commands::Validate { config } => {
            let loaded = load(&config).await?;
            init_logging(&AppConfig::new(verbose).with_configured_log_level(loaded.log_level.clone()));
            println!(
                "{}: {} pool(s), {} route(s), {} multicast group(s)",
                config.display(),
                loaded.pools.len(),
                loaded.routes.len(),
                loaded.multicast.len()
            );
            Ok(())
        }
        Commands::Route {
            config,
            channel,
            headers,
            body,
        } => {
            let loaded = load(&config).await?;
            init_logging(&AppConfig::new(verbose).with_configured_log_level(loaded.log_level.clone()));

            let engine = Engine::from_config(loaded, Arc::new(InMemoryTransport::new()))?;
            let router = engine
                .router(&channel)
                .ok_or_else(|| anyhow!("No route is bound to channel '{channel}'"))?;
            let message = headers
                .into_iter()
                .fold(Message::new(body), |m, (k, v)| m.with_header(k, v));

            println!("{}", router.route(&message));
            Ok(())
        }
        Commands::Demo { config } => {
            let loaded = match config {
                Some(path) => load(&path).await?,
                None => EngineConfig::from_toml_str(BUNDLED_CONFIG)?,
            };
            init_logging(&AppConfig::new(verbose).with_configured_log_level(loaded.log_level.clone()));
            run_demo(loaded).await
        }
    }
}

async fn load(path: &Path) -> Result<EngineConfig> {
    ConfigLoader::new(path)
        .load()
        .await
        .with_context(|| format!("Failed to load configuration {}", path.display()))
}

async fn run_demo(config: EngineConfig) -> Result<()> {
    let transport = Arc::new(InMemoryTransport::new());
    let engine = Engine::from_config(config, transport.clone())?;

    let orders = [
        ("message1.xml", r#"<order name="motor" amount="1000" customer="honda"/>"#),
        ("message2.csv", "motor,1000,honda"),
        ("message3.csl", "brake pad,500,toyota"),
        ("message4.txt", "tire 4 ford"),
        ("message5.xml", r#"<order name="wheel" amount="4" customer="bmw" test="true"/>"#),
    ];

    for (file_name, body) in orders {
        let message = Message::new(body.to_string())
            .with_header("CamelFileName", file_name)
            .with_header(MESSAGE_ID, Uuid::new_v4().to_string());
        if let Receipt::Routed { destination } = engine.receive("incomingOrders", message).await? {
            println!("{file_name} -> {destination}");
        }
    }

    for order in transport.drain("xmlOrders").await {
        let file_name = order.header("CamelFileName").unwrap_or("?").to_string();
        match engine.receive("xmlOrders", order).await? {
            Receipt::Multicast { outcomes, .. } => {
                for outcome in outcomes {
                    let status = match outcome.result {
                        Ok(()) => "ok".to_string(),
                        Err(e) => e.to_string(),
                    };
                    println!("{file_name} => {} ({status})", outcome.destination);
                }
            }
            Receipt::Filtered { .. } => println!("{file_name} filtered out as a test order"),
            Receipt::Routed { destination } => println!("{file_name} -> {destination}"),
        }
    }

    // Let detached wire tap deliveries land before reporting them.
    tokio::time::sleep(Duration::from_millis(100)).await;
    println!(
        "audit received {} order(s)",
        transport.delivered("orderAudit").await.len()
    );

    let aggregate = engine
        .split_aggregate()?
        .run(Message::from("A,B,C"), |part| async move {
            let translated = match part.body_str() {
                Some("A") => "X",
                Some("B") => "Y",
                Some("C") => "Z",
                _ => {
                    return Err(HandlerError::Failed {
                        reason: format!("no translation for {}", part.body_lossy()),
                    })
                }
            };
            // Later parts finish first so the aggregator has to reorder them.
            let delay = 40 - 10 * part.split_index().unwrap_or(1).min(4) as u64;
            tokio::time::sleep(Duration::from_millis(delay)).await;
            info!(part = %part.body_lossy(), translated, "Translated split part");
            Ok(part.with_body(translated))
        })
        .await?;
    println!("Aggregated {}", aggregate.body_lossy());

    for pool in &engine.config().pools {
        if let Some(worker_pool) = engine.pool(&pool.name) {
            println!(
                "pool {}: {}",
                pool.name,
                serde_json::to_string(&worker_pool.metrics())?
            );
        }
    }

    engine.shutdown();
    Ok(())
}
