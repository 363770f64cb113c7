//! Bridge operator CLI
//!
//! Offline tooling for signers and relayers:
//! - `bridge-cli keygen`      -> new Ed25519 signer key
//! - `bridge-cli hash`        -> build a transfer intent and print its hash
//! - `bridge-cli sign`        -> sign a transfer intent with `BRIDGE_SIGNER_KEY`
//! - `bridge-cli sign-admin`  -> sign an admin intent with `BRIDGE_SIGNER_KEY`
//!
//! Output is JSON so it can be piped into the node's `/v1/unlock` and
//! `/v1/admin` request bodies.

use bridge_core::{
    AccountId, AdminAction, AdminIntent, Amount, Direction, IntentSigner, SignatureEntry,
    SignerId, TransferIntent,
};
use bridge_node::config::parse_chain_id;
use bridge_node::redact::Redacted;
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, Result, WrapErr};
use serde_json::json;

#[derive(Parser)]
#[command(name = "bridge-cli")]
#[command(about = "Key, hash and signing tools for the quorum bridge", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new signer key pair
    Keygen,

    /// Print the hash of a transfer intent
    Hash(IntentArgs),

    /// Sign a transfer intent (key from BRIDGE_SIGNER_KEY)
    Sign(IntentArgs),

    /// Sign an admin intent (key from BRIDGE_SIGNER_KEY)
    SignAdmin(AdminArgs),
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Lock,
    Unlock,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Lock => Direction::Lock,
            DirectionArg::Unlock => Direction::Unlock,
        }
    }
}

#[derive(clap::Args)]
struct IntentArgs {
    /// Source chain ID (decimal or 0x-prefixed 4-byte hex)
    #[arg(long)]
    src: String,

    /// Destination chain ID
    #[arg(long)]
    dest: String,

    /// 32-byte account (0x hex)
    #[arg(long)]
    account: String,

    /// Amount in base units
    #[arg(long)]
    amount: String,

    #[arg(long)]
    nonce: u64,

    #[arg(long, value_enum, default_value = "unlock")]
    direction: DirectionArg,

    /// Unix timestamp after which the intent is void
    #[arg(long)]
    expiry: u64,
}

impl IntentArgs {
    fn build(&self) -> Result<TransferIntent> {
        let account: AccountId = self.account.parse().map_err(|e| eyre!("{}", e))?;
        let amount: Amount = self.amount.parse().map_err(|e| eyre!("{}", e))?;
        TransferIntent::new(
            parse_chain_id(&self.src).wrap_err("Invalid --src")?,
            parse_chain_id(&self.dest).wrap_err("Invalid --dest")?,
            account,
            amount,
            self.nonce,
            self.direction.into(),
            self.expiry,
        )
        .map_err(|e| eyre!("{}", e))
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ActionArg {
    AddSigner,
    RemoveSigner,
    SetThreshold,
    Pause,
    Unpause,
}

#[derive(clap::Args)]
struct AdminArgs {
    #[arg(long, value_enum)]
    action: ActionArg,

    /// Signer public key for add-signer / remove-signer
    #[arg(long)]
    signer: Option<String>,

    /// New threshold for set-threshold
    #[arg(long)]
    threshold: Option<u32>,

    /// Signer-set version the intent applies to (see GET /v1/signers)
    #[arg(long)]
    config_version: u64,

    #[arg(long)]
    expiry: u64,
}

impl AdminArgs {
    fn build(&self) -> Result<AdminIntent> {
        let signer = || -> Result<SignerId> {
            self.signer
                .as_deref()
                .ok_or_else(|| eyre!("--signer is required for this action"))?
                .parse()
                .map_err(|e| eyre!("{}", e))
        };
        let action = match self.action {
            ActionArg::AddSigner => AdminAction::AddSigner { signer: signer()? },
            ActionArg::RemoveSigner => AdminAction::RemoveSigner { signer: signer()? },
            ActionArg::SetThreshold => AdminAction::SetThreshold {
                threshold: self
                    .threshold
                    .ok_or_else(|| eyre!("--threshold is required for set-threshold"))?,
            },
            ActionArg::Pause => AdminAction::Pause,
            ActionArg::Unpause => AdminAction::Unpause,
        };
        Ok(AdminIntent::new(action, self.config_version, self.expiry))
    }
}

fn load_signer() -> Result<IntentSigner> {
    let _ = dotenvy::dotenv();
    let key: Redacted<String> = std::env::var("BRIDGE_SIGNER_KEY")
        .map_err(|_| eyre!("BRIDGE_SIGNER_KEY required"))?
        .into();
    IntentSigner::from_hex(key.expose()).map_err(|e| eyre!("Invalid BRIDGE_SIGNER_KEY: {}", e))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    bridge_node::logging::init_logging(false);

    let cli = Cli::parse();

    match cli.command {
        Commands::Keygen => {
            let signer = IntentSigner::generate();
            print_json(&json!({
                "signer": signer.signer_id(),
                "secretKey": signer.secret_hex(),
            }))?;
            eprintln!("Store secretKey as BRIDGE_SIGNER_KEY; add signer to BRIDGE_SIGNERS.");
        }
        Commands::Hash(args) => {
            let intent = args.build()?;
            print_json(&json!({
                "hash": intent.hash(),
                "intent": intent,
            }))?;
        }
        Commands::Sign(args) => {
            let intent = args.build()?;
            let signer = load_signer()?;
            tracing::debug!(signer = %signer.signer_id().short(), hash = %intent.hash(), "Signing transfer intent");
            let entry = SignatureEntry {
                signer: signer.signer_id(),
                signature: signer.sign(&intent.hash()),
            };
            print_json(&json!({
                "hash": intent.hash(),
                "intent": intent,
                "signature": entry,
            }))?;
        }
        Commands::SignAdmin(args) => {
            let intent = args.build()?;
            let signer = load_signer()?;
            tracing::debug!(signer = %signer.signer_id().short(), hash = %intent.hash(), "Signing admin intent");
            let entry = SignatureEntry {
                signer: signer.signer_id(),
                signature: signer.sign(&intent.hash()),
            };
            print_json(&json!({
                "hash": intent.hash(),
                "intent": intent,
                "signature": entry,
            }))?;
        }
    }

    Ok(())
}
