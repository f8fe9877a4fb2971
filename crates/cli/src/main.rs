//! RocketShoes CLI - Cart management from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Show the cart
//! rs-cli cart show
//!
//! # Add one unit of product 3
//! rs-cli cart add 3
//!
//! # Set product 3 to 2 units
//! rs-cli cart set 3 2
//!
//! # Remove product 3
//! rs-cli cart remove 3
//!
//! # Delete the persisted cart
//! rs-cli cart clear
//! ```
//!
//! Configuration is read from the environment (see `rocketshoes_cart::config`).

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use rocketshoes_cart::CartConfig;
use rocketshoes_core::ProductId;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "rs-cli")]
#[command(author, version, about = "RocketShoes cart tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and change the shopping cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show cart contents and totals
    Show,
    /// Add one unit of a product
    Add {
        /// Product ID
        id: ProductId,
    },
    /// Remove a product from the cart
    Remove {
        /// Product ID
        id: ProductId,
    },
    /// Set the amount of a product already in the cart
    Set {
        /// Product ID
        id: ProductId,

        /// New amount (zero or negative is ignored)
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },
    /// Delete the persisted cart
    Clear,
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &CartConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Load configuration from environment (needed for Sentry init)
    let config = CartConfig::from_env();

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = config.as_ref().ok().and_then(init_sentry);

    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rocketshoes_cart=info,rocketshoes_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli, &config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: &CartConfig) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Cart { action } => match action {
            CartAction::Clear => commands::cart::clear(config).await?,
            CartAction::Show => commands::cart::show(&commands::cart::open(config).await?),
            CartAction::Add { id } => {
                commands::cart::add(&commands::cart::open(config).await?, id).await?;
            }
            CartAction::Remove { id } => {
                commands::cart::remove(&commands::cart::open(config).await?, id).await?;
            }
            CartAction::Set { id, amount } => {
                commands::cart::set_amount(&commands::cart::open(config).await?, id, amount)
                    .await?;
            }
        },
    }
    Ok(())
}
