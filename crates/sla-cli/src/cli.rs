use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use sla_ledger::Role;
use sla_types::StatusPurpose;

#[derive(Parser)]
#[command(
    name = "sla",
    about = "Status list publishing and ledger anchoring",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory holding status lists, the ledger file and the version index
    #[arg(short, long, global = true, default_value = ".")]
    pub data_dir: PathBuf,

    /// Config file (default: <data-dir>/sla.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Ledger account sending transactions (overrides `account` in the config)
    #[arg(long, global = true)]
    pub account: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate an Ed25519 signing key for credential proofs
    Keygen(KeygenArgs),
    /// Create a status list with every entry unset
    Init(InitArgs),
    /// Set or clear one status entry
    Update(UpdateArgs),
    /// Show a status list document
    Show(ListArgs),
    /// Read one status entry
    Status(StatusArgs),
    /// Write the publishable document bytes
    Publish(PublishArgs),
    /// Issue a signed StatusList2021 credential
    Credential(CredentialArgs),
    /// Hash the document published at a URI
    Hash(HashArgs),
    /// Create the local ledger
    Deploy(DeployArgs),
    /// Grant a ledger role
    GrantRole(RoleArgs),
    /// Revoke a ledger role
    RevokeRole(RoleArgs),
    /// Anchor the current document of a list
    Anchor(AnchorArgs),
    /// Check the published document against its anchor
    Verify(VerifyArgs),
    /// Show the anchoring history of a list
    History(VerifyArgs),
}

#[derive(Args)]
pub struct KeygenArgs {
    /// Key file (default: <data-dir>/signing-key.hex)
    #[arg(short, long)]
    pub out: Option<PathBuf>,
    /// Overwrite an existing key file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct ListArgs {
    /// List name (default: `publisher.default_list`)
    #[arg(short, long)]
    pub list: Option<String>,
}

#[derive(Args)]
pub struct InitArgs {
    #[command(flatten)]
    pub list: ListArgs,
    #[arg(long, default_value = "revocation")]
    pub purpose: StatusPurpose,
    /// Number of entries (default: `publisher.default_list_size`)
    #[arg(long)]
    pub size: Option<usize>,
}

#[derive(Args)]
pub struct UpdateArgs {
    pub index: usize,
    /// true/false, 1/0, yes/no, on/off
    #[arg(value_parser = clap::builder::BoolishValueParser::new())]
    pub value: bool,
    #[command(flatten)]
    pub list: ListArgs,
}

#[derive(Args)]
pub struct StatusArgs {
    pub index: usize,
    #[command(flatten)]
    pub list: ListArgs,
}

#[derive(Args)]
pub struct PublishArgs {
    #[command(flatten)]
    pub list: ListArgs,
    /// Output file (default: <data-dir>/public/<list>.json)
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct CredentialArgs {
    #[command(flatten)]
    pub list: ListArgs,
    /// Signing key file (default: <data-dir>/signing-key.hex)
    #[arg(short, long)]
    pub key: Option<PathBuf>,
    /// Write the credential here instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct HashArgs {
    /// http(s)://, ipfs://, file:// or a local path
    pub uri: String,
}

#[derive(Args)]
pub struct DeployArgs {
    /// Initial admin (default: the sending account)
    #[arg(long)]
    pub admin: Option<String>,
    /// Replace an existing ledger file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct RoleArgs {
    /// admin or anchorer
    pub role: Role,
    pub account: String,
}

#[derive(Args)]
pub struct AnchorArgs {
    #[command(flatten)]
    pub list: ListArgs,
    /// Ledger list id as hex (default: derived from the list name)
    #[arg(long)]
    pub list_id: Option<String>,
    /// Published location to record (default: the document id)
    #[arg(long)]
    pub uri: Option<String>,
}

#[derive(Args)]
pub struct VerifyArgs {
    /// List name or hex list id (default: `publisher.default_list`)
    pub list: Option<String>,
}
