//! `acc-sdk` command-line tool.
//!
//! # Usage
//!
//! ```bash
//! # Log new payment and shop tasks until Ctrl-C
//! acc-sdk watch
//!
//! # Ledger queries
//! acc-sdk balance 0x5A3Fc8990417b3e6ddCdAE0E8039E798A609Ef84
//! acc-sdk nonce            # nonce of the configured key
//! acc-sdk phone-hash 08201012341234
//!
//! # Pick a network and a config file
//! CONFIG=/etc/acc-sdk.toml acc-sdk --network mainnet watch
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` - Path to TOML configuration file (default: `acc-sdk.toml`)
//! - `ACC_NETWORK` - Override the configured network
//! - `RUST_LOG` - Log level filter (default: `info`)
//!
//! A `.env` file in the working directory is loaded first.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use acc_sdk::id::{bytes32_to_hex, parse_address};
use acc_sdk::network::NetworkType;
use acc_sdk_evm::{phone_hash, signer_from_private_key};
use acc_sdk_http::RelayClient;
use alloy_primitives::Address;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use acc_sdk_cli::config::DEFAULT_CONFIG_PATH;
use acc_sdk_cli::shutdown::Shutdown;
use acc_sdk_cli::{CliConfig, CliError};

#[derive(Parser)]
#[command(name = "acc-sdk", author, version, about = "ACC loyalty-point network client")]
struct Cli {
    /// Configuration file
    #[arg(long, env = "CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Network to use instead of the configured one
    #[arg(long, env = "ACC_NETWORK", value_enum)]
    network: Option<NetworkType>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log new tasks from the relay until interrupted
    Watch,
    /// Print the point and token balances of a wallet
    Balance {
        /// Wallet address
        account: String,
    },
    /// Print the ledger nonce of a wallet (default: the configured key)
    Nonce {
        /// Wallet address
        account: Option<String>,
    },
    /// Print the hash of a phone number
    PhoneHash {
        /// Phone number, e.g. 08201012341234
        phone: String,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!("acc-sdk failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = CliConfig::load_from(&cli.config)?;
    if let Some(network) = cli.network {
        config.network = network;
    }
    tracing::debug!(network = %config.network, "Loaded configuration");

    match cli.command {
        Commands::PhoneHash { phone } => {
            emit(&bytes32_to_hex(&phone_hash(&phone)))?;
        }
        Commands::Balance { account } => {
            let relay = RelayClient::new(config.client_config()?);
            let balance = relay.get_balance_account(parse_address(&account)?).await?;
            emit(&format!(
                "point: {} (value {})\ntoken: {} (value {})",
                balance.point.balance, balance.point.value, balance.token.balance, balance.token.value
            ))?;
        }
        Commands::Nonce { account } => {
            let account = match account {
                Some(account) => parse_address(&account)?,
                None => configured_address(&config)?,
            };
            let relay = RelayClient::new(config.client_config()?);
            let nonce = relay.get_ledger_nonce_of(account).await?;
            emit(&nonce.to_string())?;
        }
        Commands::Watch => {
            let relay = Arc::new(RelayClient::new(config.client_config()?));
            let shutdown = Shutdown::install()?;
            tracing::info!(
                relay = %relay.endpoints().relay(),
                interval_ms = config.poll_interval_ms,
                "Watching task feed"
            );
            acc_sdk_cli::watch::watch(relay, config.poll_interval(), shutdown.token()).await;
            shutdown.recv().await;
        }
    }
    Ok(())
}

fn configured_address(config: &CliConfig) -> Result<Address, CliError> {
    let key = config.private_key().ok_or(CliError::MissingKey)?;
    Ok(signer_from_private_key(key)?.address())
}

fn emit(line: &str) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    writeln!(out, "{line}")?;
    Ok(())
}
