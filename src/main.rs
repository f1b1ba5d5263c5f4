//! nested-safe CLI
//!
//! Inspect ownership trees, compute operation hashes and plan relayed
//! executions from JSON files. All output is JSON on stdout; logs go to
//! stderr.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ethers_core::types::{Address, U256};
use nested_safe::utils::logging;
use nested_safe::{
    log_error, AccountSnapshot, EcdsaKeySigner, KeyRing, OperationHasher, OwnershipTree,
    PasskeySigner, RelayChain, RelayConfig, RelayPlanner, WebAuthnSignerFactory,
};
use serde::Deserialize;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use zeroize::Zeroizing;

#[derive(Parser)]
#[command(name = "nested-safe")]
#[command(about = "Nested multisig authorization for ERC-4337 relays", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging on stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Select the executor account and print the path to it
    Executor {
        /// Account snapshot (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        #[command(flatten)]
        relay: RelayArgs,
    },

    /// Compute the operation hash an account's owners sign
    Hash {
        /// Account snapshot (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Authorization request (JSON)
        #[arg(short, long)]
        request: PathBuf,

        /// Account to hash for (defaults to the root)
        #[arg(short, long)]
        account: Option<Address>,

        #[command(flatten)]
        relay: RelayArgs,
    },

    /// Aggregate signatures along the executor path and build the UserOperation
    Plan {
        /// Account snapshot (JSON)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Authorization request (JSON)
        #[arg(short, long)]
        request: PathBuf,

        /// Signing keys (JSON)
        #[arg(short, long)]
        keys: PathBuf,

        #[command(flatten)]
        relay: RelayArgs,
    },
}

#[derive(Args)]
struct RelayArgs {
    /// Relay configuration (JSON)
    #[arg(long, conflicts_with = "chain")]
    config: Option<PathBuf>,

    /// Chain preset name or id
    #[arg(long)]
    chain: Option<String>,
}

impl RelayArgs {
    fn load(&self, snapshot: &AccountSnapshot) -> Result<RelayConfig> {
        let config = match (&self.config, &self.chain) {
            (Some(path), _) => RelayConfig::from_json(&read(path)?)?,
            (None, Some(chain)) => RelayConfig::for_chain(chain.parse::<RelayChain>()?),
            (None, None) => RelayConfig {
                chain_id: snapshot.chain_id,
                ..RelayConfig::default()
            },
        };
        Ok(config)
    }
}

/// Key file: hex secrets, never logged
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyFile {
    #[serde(default)]
    ecdsa: Vec<String>,
    #[serde(default)]
    passkeys: Vec<PasskeyEntry>,
}

#[derive(Deserialize)]
struct PasskeyEntry {
    secret: String,
    #[serde(default)]
    verifiers: U256,
}

fn main() {
    let cli = Cli::parse();
    if cli.debug {
        logging::enable_debug();
    }

    if let Err(err) = run(cli.command) {
        log_error!("cli", "Command failed", error = format!("{:#}", err));
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<()> {
    let output = match command {
        Commands::Executor { snapshot, relay } => {
            let snapshot = load_snapshot(&snapshot)?;
            let config = relay.load(&snapshot)?;
            let factory = WebAuthnSignerFactory::from_config(&config);
            let tree = OwnershipTree::build(&snapshot, &factory)?;
            let path = tree.executor_path()?;
            json!({
                "executor": path.executor(),
                "path": path.accounts(),
            })
        }
        Commands::Hash {
            snapshot,
            request,
            account,
            relay,
        } => {
            let snapshot = load_snapshot(&snapshot)?;
            let config = relay.load(&snapshot)?;
            let request = config.parse_request(&read(&request)?)?;
            let account = account.unwrap_or(snapshot.root);
            let pre_image = OperationHasher::pre_image(account, snapshot.chain_id, &request);
            json!({
                "account": account,
                "chainId": snapshot.chain_id,
                "domainSeparator": pre_image.domain_separator,
                "structHash": pre_image.struct_hash,
                "hash": pre_image.final_hash,
            })
        }
        Commands::Plan {
            snapshot,
            request,
            keys,
            relay,
        } => {
            let snapshot = load_snapshot(&snapshot)?;
            let config = relay.load(&snapshot)?;
            let request = config.parse_request(&read(&request)?)?;
            let factory = WebAuthnSignerFactory::from_config(&config);
            let tree = OwnershipTree::build(&snapshot, &factory)?;
            let keys = load_keys(&keys, &factory)?;
            let plan = RelayPlanner::new(&tree, &factory, &config).plan(&request, &keys)?;
            serde_json::to_value(&plan)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
}

fn load_snapshot(path: &Path) -> Result<AccountSnapshot> {
    Ok(AccountSnapshot::from_json(&read(path)?)?)
}

fn load_keys(path: &Path, factory: &WebAuthnSignerFactory) -> Result<KeyRing> {
    let contents = Zeroizing::new(read(path)?);
    let file: KeyFile = serde_json::from_str(&contents).context("parsing key file")?;

    let mut ring = KeyRing::new();
    for secret in &file.ecdsa {
        ring.insert(Box::new(EcdsaKeySigner::from_hex(secret)?));
    }
    for entry in &file.passkeys {
        let secret = Zeroizing::new(hex::decode(entry.secret.trim_start_matches("0x"))?);
        ring.insert(Box::new(PasskeySigner::from_bytes(&secret, entry.verifiers, factory)?));
    }

    if ring.is_empty() {
        bail!("key file {} contains no keys", path.display());
    }
    Ok(ring)
}
