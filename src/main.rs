//! tx-orchestrator - sign, submit and confirm EVM transactions
//!
//! Command-line front end over the orchestration engine. Reads settings from
//! TOML, the signing key from the environment, and contract artifacts from
//! disk.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ethers::abi::token::{LenientTokenizer, Tokenizer};
use ethers::abi::{Param, Token};
use ethers::types::{Address, H256, U256};
use ethers::utils::{format_ether, parse_units};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use tx_orchestrator::artifacts;
use tx_orchestrator::chain::{
    locate_in_block, lookup_transaction, ChainProvider, LogQuery, NodeClient,
};
use tx_orchestrator::config::{Settings, CONFIG_ENV};
use tx_orchestrator::coordination::{Execution, TransactionEngine};
use tx_orchestrator::metrics;
use tx_orchestrator::tx::WaitOutcome;
use tx_orchestrator::{AccountIdentity, EventDecoder, PendingIntent};

type Engine = TransactionEngine<ChainProvider>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file
    #[arg(long, short, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    /// Overrides node.rpc_url
    #[arg(long, env = "ORCHESTRATOR_RPC_URL")]
    rpc_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the signing account's address
    Address,
    /// Print an account balance (defaults to the signing account)
    Balance { address: Option<Address> },
    /// Send value to an address
    Transfer {
        to: Address,
        /// Decimal amount in `unit`
        value: String,
        #[arg(long, default_value = "wei")]
        unit: String,
    },
    /// Deploy the configured contract artifact and save its address
    Deploy {
        /// Constructor arguments
        args: Vec<String>,
    },
    /// Send a state-changing method call and decode the emitted events
    Call {
        method: String,
        args: Vec<String>,
        /// Defaults to the saved contract address
        #[arg(long)]
        contract: Option<Address>,
    },
    /// Call a read-only method
    Read {
        method: String,
        args: Vec<String>,
        #[arg(long)]
        contract: Option<Address>,
    },
    /// Look up a transaction by hash
    Tx { hash: H256 },
    /// Print the latest block number
    BlockNumber,
    /// Find a transaction's position within its block
    Locate {
        hash: H256,
        /// Block to search; defaults to the block named by the receipt
        #[arg(long)]
        block: Option<u64>,
    },
    /// Decode contract events over a block range
    Events {
        #[arg(long)]
        contract: Option<Address>,
        /// Only this event
        #[arg(long)]
        event: Option<String>,
        #[arg(long)]
        from_block: Option<u64>,
        #[arg(long)]
        to_block: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(rpc_url) = cli.rpc_url {
        settings.node.rpc_url = rpc_url;
    }

    let provider = Arc::new(ChainProvider::new(settings.node.clone())?);
    info!("Using node at {}", provider.rpc_url());
    let engine = TransactionEngine::from_settings(provider, &settings);

    // Ctrl-C ends any confirmation wait; the transaction itself may still land
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            warn!("Shutdown signal received, cancelling wait");
            cancel.cancel();
        }
    });

    let result = run(cli.command, &settings, &engine, &cancel).await;

    if settings.metrics.enabled {
        print!("{}", metrics::render()?);
    }

    result
}

async fn run(
    command: Commands,
    settings: &Settings,
    engine: &Engine,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        Commands::Address => {
            println!("{:?}", signing_identity(settings)?.address());
        }

        Commands::Balance { address } => {
            let address = match address {
                Some(address) => address,
                None => signing_identity(settings)?.address(),
            };
            let balance = engine.balance(address).await?;
            println!("{} wei ({} ETH)", balance, format_ether(balance));
        }

        Commands::Transfer { to, value, unit } => {
            let identity = signing_identity(settings)?;
            let value: U256 = parse_units(&value, unit.as_str())
                .with_context(|| format!("invalid amount {} {}", value, unit))?
                .into();

            let intent = PendingIntent::Transfer { to, value };
            let execution = engine.execute(&identity, intent, cancel).await?;
            report(&execution, None)?;
        }

        Commands::Deploy { args } => {
            let identity = signing_identity(settings)?;
            let abi = artifacts::load_abi(&settings.artifacts.abi_path)?;
            let bytecode = artifacts::load_bytecode(&settings.artifacts.bytecode_path)?;

            let inputs = abi
                .constructor()
                .map(|constructor| constructor.inputs.as_slice())
                .unwrap_or_default();
            let tokens = tokenize_args(inputs, &args)?;

            let intent = PendingIntent::deploy_with_abi(&abi, bytecode, tokens)?;
            let execution = engine.execute(&identity, intent, cancel).await?;
            report(&execution, Some(&EventDecoder::new(&abi)))?;

            if let Some(address) = execution.contract_address {
                artifacts::write_contract_address(&settings.artifacts.contract_address_path, address)?;
                println!("Contract address: {:?}", address);
            }
        }

        Commands::Call {
            method,
            args,
            contract,
        } => {
            let identity = signing_identity(settings)?;
            let abi = artifacts::load_abi(&settings.artifacts.abi_path)?;
            let contract = contract_address(contract, settings)?;

            let function = abi
                .function(&method)
                .with_context(|| format!("no method {} in ABI", method))?;
            let tokens = tokenize_args(&function.inputs, &args)?;

            let intent = PendingIntent::call_method(&abi, contract, &method, tokens)?;
            let execution = engine.execute(&identity, intent, cancel).await?;
            report(&execution, Some(&EventDecoder::new(&abi)))?;
        }

        Commands::Read {
            method,
            args,
            contract,
        } => {
            let abi = artifacts::load_abi(&settings.artifacts.abi_path)?;
            let contract = contract_address(contract, settings)?;

            let function = abi
                .function(&method)
                .with_context(|| format!("no method {} in ABI", method))?;
            let tokens = tokenize_args(&function.inputs, &args)?;

            for value in engine.read(contract, function, &tokens).await? {
                println!("{}", value);
            }
        }

        Commands::Tx { hash } => {
            let Some(found) = lookup_transaction(engine.node(), hash).await? else {
                bail!("transaction {:?} not found", hash);
            };

            let tx = &found.transaction;
            println!("hash:      {:?}", tx.hash);
            println!("from:      {:?}", tx.from);
            match tx.to {
                Some(to) => println!("to:        {:?}", to),
                None => println!("to:        (contract creation)"),
            }
            println!("value:     {} ETH", format_ether(tx.value));
            println!("nonce:     {}", tx.nonce);
            if let Some(price) = tx.gas_price {
                println!("gas price: {} wei", price);
            }

            match &found.receipt {
                Some(receipt) => {
                    println!("block:     {}", receipt.block_number);
                    println!("status:    {}", receipt.status.as_str());
                    println!("gas used:  {}", receipt.gas_used);
                    if let Some(fee) = found.fee() {
                        println!("fee:       {} ETH", format_ether(fee));
                    }
                }
                None => println!("status:    pending"),
            }
        }

        Commands::BlockNumber => {
            let number = engine
                .node()
                .get_block_number()
                .await
                .context("block number query failed")?;
            println!("{}", number);
        }

        Commands::Locate { hash, block } => match locate_in_block(engine.node(), hash, block).await? {
            Some(position) => println!(
                "Transaction {:?} is #{} of {} in block {}",
                hash, position.index, position.transaction_count, position.block_number
            ),
            None => bail!("transaction {:?} not found in block", hash),
        },

        Commands::Events {
            contract,
            event,
            from_block,
            to_block,
        } => {
            let abi = artifacts::load_abi(&settings.artifacts.abi_path)?;
            let contract = contract_address(contract, settings)?;

            let to_block = match to_block {
                Some(block) => block,
                None => engine
                    .node()
                    .get_block_number()
                    .await
                    .context("block number query failed")?,
            };
            let from_block = from_block.unwrap_or(to_block);

            let mut query = LogQuery {
                address: contract,
                topic0: None,
                from_block,
                to_block,
            };
            if let Some(name) = event {
                let signature = abi
                    .event(&name)
                    .with_context(|| format!("no event {} in ABI", name))?
                    .signature();
                query = query.with_topic(signature);
            }
            let decoder = EventDecoder::new(&abi);
            for decoded in engine.query_events(&decoder, &query).await? {
                match decoded {
                    Ok(event) => print_event(&event),
                    Err(e) => warn!("{}", e),
                }
            }
        }
    }

    Ok(())
}

fn signing_identity(settings: &Settings) -> Result<AccountIdentity> {
    AccountIdentity::from_env(&settings.wallet.private_key_env)
        .with_context(|| format!("set {} to a hex private key", settings.wallet.private_key_env))
}

fn contract_address(explicit: Option<Address>, settings: &Settings) -> Result<Address> {
    match explicit {
        Some(address) => Ok(address),
        None => artifacts::read_contract_address(&settings.artifacts.contract_address_path)
            .context("no --contract given and no saved contract address"),
    }
}

/// Parse command-line arguments against ABI parameter types
fn tokenize_args(inputs: &[Param], args: &[String]) -> Result<Vec<Token>> {
    if inputs.len() != args.len() {
        bail!("expected {} arguments, got {}", inputs.len(), args.len());
    }

    inputs
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            LenientTokenizer::tokenize(&param.kind, arg)
                .with_context(|| format!("argument {} is not a valid {}", param.name, param.kind))
        })
        .collect()
}

fn print_event(event: &tx_orchestrator::DecodedEvent) {
    let fields: Vec<String> = event
        .fields
        .iter()
        .map(|(name, value)| format!("{}: {}", name, value))
        .collect();
    println!("{} @ {:?} {{ {} }}", event.name, event.address, fields.join(", "));
}

/// Print an execution and fail unless it was mined successfully
fn report(execution: &Execution, decoder: Option<&EventDecoder>) -> Result<()> {
    println!("Transaction hash: {:?}", execution.handle.hash);

    let receipt = match &execution.outcome {
        WaitOutcome::Mined(receipt) => receipt,
        outcome => {
            let state = outcome.state();
            bail!(
                "no receipt ({:?}); transaction {:?} may still be mined",
                state,
                execution.handle.hash
            );
        }
    };

    println!(
        "Mined in block {} with status {} (gas used {})",
        receipt.block_number,
        receipt.status.as_str(),
        receipt.gas_used
    );

    if let Some(decoder) = decoder {
        for decoded in decoder.decode_receipt(receipt) {
            match decoded {
                Ok(event) => print_event(&event),
                Err(e) => warn!("{}", e),
            }
        }
    }

    if !receipt.is_success() {
        bail!("transaction reverted");
    }
    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tx_orchestrator=debug,hyper=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
