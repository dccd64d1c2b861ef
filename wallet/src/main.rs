use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

use solkit_wallet_lib::settings::init_settings_from_env;
use solkit_wallet_lib::validation::{total_amount, valid_count};
use solkit_wallet_lib::{
    Address, AlwaysConfirm, ConfirmationRequest, Confirmer, WalletContext, WalletError,
    WalletPaths, WalletResult, WalletSigner,
};

#[derive(Parser)]
#[command(name = "solkit")]
#[command(about = "Batch transfers, network profiles and account cleanup for Solana wallets")]
#[command(version)]
struct Cli {
    /// Directory holding saved preferences
    #[arg(long, env = "SOLKIT_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Network profile management
    Networks {
        #[command(subcommand)]
        command: NetworkCommands,
    },
    /// Validate a recipients file (one `address,amount` per line)
    Parse {
        /// Recipients file
        file: PathBuf,
    },
    /// Show the SOL balance of an address
    Balance {
        address: String,
        /// Keep refreshing until interrupted
        #[arg(long)]
        watch: bool,
    },
    /// Recent transactions for an address
    History { address: String },
    /// List token accounts that can be closed to reclaim rent
    Scan { address: String },
}

#[derive(Subcommand)]
enum NetworkCommands {
    /// List built-in and custom networks
    List,
    /// Show the active network
    Active,
    /// Switch to a network by id (cluster name or custom URL)
    Select { id: String },
    /// Add a custom RPC endpoint
    Add { name: String, url: String },
    /// Rename or repoint a custom RPC endpoint
    Update {
        original: String,
        name: String,
        url: String,
    },
    /// Delete a custom RPC endpoint
    Delete {
        name: String,
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}

/// Asks on the terminal and accepts `y` or `yes`.
struct PromptConfirmer;

#[async_trait]
impl Confirmer for PromptConfirmer {
    async fn confirm(&self, request: &ConfirmationRequest) -> bool {
        println!("{} [y/N]", request.prompt());
        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        match reader.read_line(&mut line).await {
            Ok(_) => matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(err) => {
                log::warn!("Could not read confirmation: {}", err);
                false
            }
        }
    }
}

/// An address without a key. Enough to watch a balance, never signs.
struct WatchOnly(Address);

#[async_trait]
impl WalletSigner for WatchOnly {
    fn public_key(&self) -> Option<Address> {
        Some(self.0)
    }

    async fn sign_message(&self, _message: &[u8]) -> WalletResult<[u8; 64]> {
        Err(WalletError::TransactionError(
            "watch-only address cannot sign".to_string(),
        ))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = init_settings_from_env()?;
    let default_level = if cli.verbose {
        "debug".to_string()
    } else {
        settings.log_level().to_ascii_lowercase()
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let root_dir = match cli.data_dir {
        Some(dir) => dir,
        None => WalletPaths::from_env()?.root_dir().to_path_buf(),
    };
    let context = WalletContext::initialize(root_dir.clone())
        .with_context(|| format!("Failed to open wallet data in {}", root_dir.display()))?;

    match cli.command {
        Commands::Networks { command } => handle_network_command(&context, command).await?,
        Commands::Parse { file } => handle_parse(&context, &file)?,
        Commands::Balance { address, watch } => handle_balance(&context, &address, watch).await?,
        Commands::History { address } => handle_history(&context, &address).await?,
        Commands::Scan { address } => handle_scan(&context, &address).await?,
    }

    Ok(())
}

async fn handle_network_command(
    context: &WalletContext,
    command: NetworkCommands,
) -> anyhow::Result<()> {
    let registry = context.registry();
    match command {
        NetworkCommands::List => {
            let active = registry.active_profile();
            for profile in registry.list_networks() {
                let marker = if profile.id == active.id { "*" } else { " " };
                let kind = if profile.is_custom { "custom" } else { "built-in" };
                println!("{} {:<16} {:<8} {}", marker, profile.name, kind, profile.endpoint);
            }
        }
        NetworkCommands::Active => {
            let profile = registry.active_profile();
            println!("{} ({})", profile.name, profile.endpoint);
        }
        NetworkCommands::Select { id } => {
            let profile = registry.select_network(&id)?;
            if profile.id != id {
                println!("Unknown network '{}', using {}", id, profile.name);
            } else {
                println!("Switched to {}", profile.name);
            }
        }
        NetworkCommands::Add { name, url } => {
            let profile = registry.add_custom_rpc(&name, &url)?;
            println!("Added {} ({})", profile.name, profile.endpoint);
        }
        NetworkCommands::Update {
            original,
            name,
            url,
        } => {
            let profile = registry.update_custom_rpc(&original, &name, &url)?;
            println!("Updated {} ({})", profile.name, profile.endpoint);
        }
        NetworkCommands::Delete { name, yes } => {
            let confirmer: &dyn Confirmer = if yes { &AlwaysConfirm } else { &PromptConfirmer };
            match context.delete_custom_rpc(&name, confirmer).await {
                Ok(active) => println!("Deleted '{}'. Active network: {}", name, active.name),
                Err(WalletError::Cancelled(_)) => println!("Nothing deleted"),
                Err(err) => return Err(err.into()),
            }
        }
    }
    Ok(())
}

fn handle_parse(context: &WalletContext, file: &Path) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let intents = context.parse_intents(&raw);
    if intents.is_empty() {
        bail!("{} has no recipients", file.display());
    }

    for intent in &intents {
        match &intent.error {
            None => println!("{:>4}  ok     {}  {}", intent.line, intent.address, intent.amount_input),
            Some(error) => println!(
                "{:>4}  error  {}  {}  ({})",
                intent.line, intent.address, intent.amount_input, error
            ),
        }
    }
    println!(
        "{} of {} rows valid, total {}",
        valid_count(&intents),
        intents.len(),
        total_amount(&intents)
    );
    Ok(())
}

async fn handle_balance(context: &WalletContext, address: &str, watch: bool) -> anyhow::Result<()> {
    let address = Address::from_string(address)?;
    if !watch {
        println!("{}", context.balance(&address).await?);
        return Ok(());
    }

    let handle = context.watch_balance(&WatchOnly(address), |balance| match balance {
        Some(amount) => println!("{}", amount),
        None => println!("balance unavailable"),
    })?;
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for interrupt")?;
    handle.stop().await;
    Ok(())
}

async fn handle_history(context: &WalletContext, address: &str) -> anyhow::Result<()> {
    let address = Address::from_string(address)?;
    let entries = context.history(&address).await?;
    if entries.is_empty() {
        println!("No transactions found");
        return Ok(());
    }

    for entry in entries {
        let amount = entry
            .amount
            .map(|amount| amount.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {:<8}  {:>18}  {}{}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            format!("{:?}", entry.direction),
            amount,
            context.explorer_url(&entry.signature)?,
            if entry.failed { "  (failed)" } else { "" }
        );
    }
    Ok(())
}

async fn handle_scan(context: &WalletContext, address: &str) -> anyhow::Result<()> {
    let owner = Address::from_string(address)?;
    let selection = context.scan_accounts(&owner).await?;
    if selection.candidates().is_empty() {
        println!("No token accounts found");
        return Ok(());
    }

    for candidate in selection.candidates() {
        println!(
            "[{}] {}  {:<24} balance {:<12} rent {}",
            if candidate.selected { "x" } else { " " },
            candidate.account_id,
            candidate.label(),
            candidate.token_balance,
            candidate.rent().to_fixed(6)
        );
    }
    println!(
        "{} empty account(s), about {} SOL reclaimable",
        selection.selected_count(),
        selection.total_rent().to_fixed(6)
    );
    Ok(())
}
