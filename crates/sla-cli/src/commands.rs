use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context as _};
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use sla_anchor::{
    AnchorClient, AnchorStatus, DocumentFetcher, FsVersionIndex, HttpFetcher, LocalLedgerRpc,
};
use sla_crypto::SigningKey;
use sla_ledger::{AnchorContract, LedgerEvent};
use sla_statuslist::{Ed25519JwsSigner, StatusListDocument};
use sla_store::{FsDocumentStore, StatusListService};
use sla_types::{AccountId, Digest, ListId, SystemClock};

use crate::cli::*;
use crate::config::{CliConfig, CONFIG_FILE};
use crate::ledger_file::{LedgerFile, LEDGER_FILE};

const KEY_FILE: &str = "signing-key.hex";
const INDEX_FILE: &str = "anchor-index.json";
const PUBLIC_DIR: &str = "public";

/// Exit status of `verify` when the published document does not match.
const EXIT_MISMATCH: u8 = 2;

pub async fn run_command(cli: Cli) -> anyhow::Result<ExitCode> {
    let ctx = Context::new(&cli)?;
    match cli.command {
        Command::Keygen(args) => cmd_keygen(&ctx, args),
        Command::Init(args) => cmd_init(&ctx, args),
        Command::Update(args) => cmd_update(&ctx, args),
        Command::Show(args) => cmd_show(&ctx, args),
        Command::Status(args) => cmd_status(&ctx, args),
        Command::Publish(args) => cmd_publish(&ctx, args),
        Command::Credential(args) => cmd_credential(&ctx, args),
        Command::Hash(args) => cmd_hash(&ctx, args).await,
        Command::Deploy(args) => cmd_deploy(&ctx, args),
        Command::GrantRole(args) => cmd_role(&ctx, args, true),
        Command::RevokeRole(args) => cmd_role(&ctx, args, false),
        Command::Anchor(args) => cmd_anchor(&ctx, args).await,
        Command::Verify(args) => cmd_verify(&ctx, args).await,
        Command::History(args) => cmd_history(&ctx, args),
    }
}

struct Context {
    data_dir: PathBuf,
    config: CliConfig,
    account: Option<String>,
    format: OutputFormat,
}

impl Context {
    fn new(cli: &Cli) -> anyhow::Result<Self> {
        let config = match &cli.config {
            Some(path) => CliConfig::load(path, true)?,
            None => CliConfig::load(&cli.data_dir.join(CONFIG_FILE), false)?,
        };
        tracing::debug!(data_dir = %cli.data_dir.display(), ?config, "loaded configuration");
        Ok(Self {
            data_dir: cli.data_dir.clone(),
            account: cli.account.clone().or_else(|| config.account.clone()),
            config,
            format: cli.format,
        })
    }

    fn list_name(&self, args: &ListArgs) -> String {
        args.list
            .clone()
            .unwrap_or_else(|| self.config.publisher.default_list.clone())
    }

    fn service(&self) -> anyhow::Result<StatusListService> {
        let store = FsDocumentStore::open(&self.data_dir)?;
        Ok(StatusListService::new(
            Arc::new(store),
            Arc::new(SystemClock),
            self.config.publisher.clone(),
        ))
    }

    fn ledger(&self) -> LedgerFile {
        LedgerFile::new(self.data_dir.join(LEDGER_FILE))
    }

    fn sender(&self) -> anyhow::Result<AccountId> {
        let raw = self
            .account
            .clone()
            .context("no sending account: pass --account or set `account` in sla.toml")?;
        Ok(AccountId::new(raw)?)
    }

    fn anchor_client(&self, contract: Arc<AnchorContract>, sender: AccountId) -> anyhow::Result<AnchorClient> {
        let rpc = Arc::new(LocalLedgerRpc::new(contract, sender));
        let index = Arc::new(FsVersionIndex::open(self.data_dir.join(INDEX_FILE))?);
        Ok(AnchorClient::with_http_fetcher(
            rpc,
            index,
            self.config.anchor.clone(),
        )?)
    }

    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn write_file(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

fn print_document(doc: &StatusListDocument) {
    println!("  Id:       {}", doc.id.blue());
    println!("  Purpose:  {}", doc.status_purpose.to_string().cyan());
    println!("  Size:     {}", doc.size);
    println!("  Version:  {}", doc.version.to_string().yellow());
    println!("  Hash:     {}", doc.hash.to_prefixed_hex().dimmed());
}

fn cmd_keygen(ctx: &Context, args: KeygenArgs) -> anyhow::Result<ExitCode> {
    let path = args.out.unwrap_or_else(|| ctx.data_dir.join(KEY_FILE));
    if path.exists() && !args.force {
        bail!("{} already exists (use --force to replace it)", path.display());
    }
    let key = SigningKey::generate();
    write_file(&path, format!("{}\n", key.to_hex()).as_bytes())?;

    let public = key.verifying_key();
    if ctx.json() {
        print_json(&json!({
            "path": path.display().to_string(),
            "publicKey": public.to_hex(),
            "keyId": public.key_id(),
        }))?;
    } else {
        println!("{} Wrote signing key to {}", "✓".green().bold(), path.display().to_string().bold());
        println!("  Public key: {}", public.to_hex().cyan());
        println!("  Key id:     {}", public.key_id().yellow());
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_init(ctx: &Context, args: InitArgs) -> anyhow::Result<ExitCode> {
    let list = ctx.list_name(&args.list);
    let doc = ctx.service()?.init(&list, args.purpose, args.size)?;
    if ctx.json() {
        print_json(&doc)?;
    } else {
        println!("{} Initialized status list {}", "✓".green().bold(), list.bold());
        print_document(&doc);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_update(ctx: &Context, args: UpdateArgs) -> anyhow::Result<ExitCode> {
    let list = ctx.list_name(&args.list);
    let doc = ctx.service()?.update(&list, args.index, args.value)?;
    if ctx.json() {
        print_json(&doc)?;
    } else {
        let state = if args.value { "set".red() } else { "cleared".green() };
        println!("{} Entry {} of {} {}", "✓".green().bold(), args.index, list.bold(), state);
        println!("  Version:  {}", doc.version.to_string().yellow());
        println!("  Hash:     {}", doc.hash.to_prefixed_hex().dimmed());
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_show(ctx: &Context, args: ListArgs) -> anyhow::Result<ExitCode> {
    let list = ctx.list_name(&args);
    let doc = ctx.service()?.read(&list)?;
    if ctx.json() {
        print_json(&doc)?;
    } else {
        let set = doc.bitset()?.count_set();
        println!("Status list {}", list.bold());
        print_document(&doc);
        println!("  Issuer:   {}", doc.issuer);
        println!("  Set:      {set}");
        println!("  Updated:  {}", sla_types::canonical_timestamp(&doc.updated_at));
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_status(ctx: &Context, args: StatusArgs) -> anyhow::Result<ExitCode> {
    let list = ctx.list_name(&args.list);
    let set = ctx.service()?.status(&list, args.index)?;
    if ctx.json() {
        print_json(&json!({ "list": list, "index": args.index, "set": set }))?;
    } else {
        let state = if set { "set".red().bold() } else { "unset".green().bold() };
        println!("{}[{}]: {}", list.bold(), args.index, state);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_publish(ctx: &Context, args: PublishArgs) -> anyhow::Result<ExitCode> {
    let list = ctx.list_name(&args.list);
    let service = ctx.service()?;
    let bytes = service.published_payload(&list)?;
    let path = args
        .out
        .unwrap_or_else(|| ctx.data_dir.join(PUBLIC_DIR).join(format!("{list}.json")));
    write_file(&path, &bytes)?;

    let hash = Digest::of(&bytes);
    if ctx.json() {
        print_json(&json!({
            "path": path.display().to_string(),
            "uri": service.document_uri(&list),
            "hash": hash.to_prefixed_hex(),
        }))?;
    } else {
        println!("{} Wrote {} ({} bytes)", "✓".green().bold(), path.display().to_string().bold(), bytes.len());
        println!("  Serve at: {}", service.document_uri(&list).blue());
        println!("  Hash:     {}", hash.to_prefixed_hex().dimmed());
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_credential(ctx: &Context, args: CredentialArgs) -> anyhow::Result<ExitCode> {
    let list = ctx.list_name(&args.list);
    let key_path = args.key.unwrap_or_else(|| ctx.data_dir.join(KEY_FILE));
    let key_hex = fs::read_to_string(&key_path)
        .with_context(|| format!("reading signing key {} (run `sla keygen`)", key_path.display()))?;
    let key = SigningKey::from_hex(key_hex.trim())?;
    let signer = Ed25519JwsSigner::new(key, ctx.config.publisher.signing_kid.clone());

    let credential = ctx.service()?.credential(&list, &signer)?;
    let json = serde_json::to_string_pretty(&credential)?;
    match args.out {
        Some(path) => {
            write_file(&path, json.as_bytes())?;
            if !ctx.json() {
                println!("{} Wrote credential to {}", "✓".green().bold(), path.display().to_string().bold());
                println!("  Id: {}", credential.credential.id.blue());
            }
        }
        None => println!("{json}"),
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_hash(ctx: &Context, args: HashArgs) -> anyhow::Result<ExitCode> {
    let fetcher = HttpFetcher::new(
        ctx.config.anchor.ipfs_gateway.clone(),
        ctx.config.anchor.request_timeout(),
    )?;
    let bytes = fetcher
        .fetch(&args.uri)
        .await
        .with_context(|| format!("fetching {}", args.uri))?;
    let hash = Digest::of(&bytes);
    if ctx.json() {
        print_json(&json!({ "uri": args.uri, "hash": hash.to_prefixed_hex(), "bytes": bytes.len() }))?;
    } else {
        println!("{}", hash.to_prefixed_hex());
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_deploy(ctx: &Context, args: DeployArgs) -> anyhow::Result<ExitCode> {
    let admin = match args.admin {
        Some(admin) => AccountId::new(admin)?,
        None => ctx.sender()?,
    };
    let ledger = ctx.ledger();
    let contract = ledger.deploy(admin.clone(), ctx.config.contract.clone(), args.force)?;
    if ctx.json() {
        print_json(&json!({
            "path": ledger.path().display().to_string(),
            "admin": admin,
            "blockHeight": contract.block_height(),
        }))?;
    } else {
        println!("{} Deployed ledger at {}", "✓".green().bold(), ledger.path().display().to_string().bold());
        println!("  Admin:    {}", admin.to_string().yellow());
        println!("  Floor:    {}", contract.config().version_floor);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_role(ctx: &Context, args: RoleArgs, grant: bool) -> anyhow::Result<ExitCode> {
    let sender = ctx.sender()?;
    let account = AccountId::new(args.account)?;
    let ledger = ctx.ledger();
    let _lock = ledger.lock()?;
    let contract = ledger.load()?;
    let event = if grant {
        contract.grant_role(&sender, args.role, &account)?
    } else {
        contract.revoke_role(&sender, args.role, &account)?
    };
    ledger.save(&contract)?;

    if ctx.json() {
        print_json(&json!({ "changed": event.is_some(), "event": event }))?;
    } else {
        let verb = if grant { "Granted" } else { "Revoked" };
        match event {
            Some(event) => println!(
                "{} {verb} {} {} {} (block {})",
                "✓".green().bold(),
                args.role.to_string().cyan(),
                if grant { "to" } else { "from" },
                account.to_string().yellow(),
                event.block()
            ),
            None if grant => println!("{account} already holds {}", args.role),
            None => println!("{account} does not hold {}", args.role),
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_anchor(ctx: &Context, args: AnchorArgs) -> anyhow::Result<ExitCode> {
    let list = ctx.list_name(&args.list);
    let doc = ctx.service()?.read(&list)?;
    let list_id = match &args.list_id {
        Some(raw) => ListId::from_hex(raw)?,
        None => ListId::derive(&list),
    };
    let uri = args.uri.unwrap_or_else(|| doc.id.clone());

    let ledger = ctx.ledger();
    let _lock = ledger.lock()?;
    let contract = Arc::new(ledger.load()?);
    let client = ctx.anchor_client(contract.clone(), ctx.sender()?)?;
    let outcome = client.anchor_at(list_id, &uri, &doc).await?;
    ledger.save(&contract)?;

    if ctx.json() {
        print_json(&outcome)?;
        return Ok(ExitCode::SUCCESS);
    }
    match &outcome.status {
        AnchorStatus::Submitted { receipt } => {
            println!("{} Anchored {} at version {}", "✓".green().bold(), list.bold(), outcome.submission.version.to_string().yellow());
            println!("  Tx:       {} (block {})", receipt.tx_hash.to_prefixed_hex().dimmed(), receipt.block);
        }
        AnchorStatus::AlreadyAnchored => {
            println!("{} {} already anchored at version {}", "✓".green(), list.bold(), outcome.submission.version.to_string().yellow());
        }
    }
    println!("  List id:  {}", list_id.to_hex().cyan());
    println!("  URI:      {}", outcome.submission.uri.blue());
    println!("  Hash:     {}", outcome.submission.hash.to_prefixed_hex().dimmed());
    println!("  Document: {}", outcome.document_version);
    Ok(ExitCode::SUCCESS)
}

fn resolve_list_id(ctx: &Context, arg: Option<String>) -> ListId {
    let raw = arg.unwrap_or_else(|| ctx.config.publisher.default_list.clone());
    ListId::parse_or_derive(&raw)
}

async fn cmd_verify(ctx: &Context, args: VerifyArgs) -> anyhow::Result<ExitCode> {
    let list_id = resolve_list_id(ctx, args.list);
    let contract = Arc::new(ctx.ledger().load()?);
    // Reads need no role; any well-formed account will do.
    let reader = match ctx.sender() {
        Ok(account) => account,
        Err(_) => AccountId::new("reader")?,
    };
    let report = ctx.anchor_client(contract, reader)?.verify(&list_id).await?;

    if ctx.json() {
        print_json(&report)?;
    } else if report.ok {
        println!("{} Published document matches anchor", "✓".green().bold());
        println!("  URI:      {}", report.uri.blue());
        println!("  Hash:     {}", report.on_chain_hash.dimmed());
        println!("  Version:  {} by {}", report.version, report.updater);
    } else {
        println!("{} Published document does not match anchor", "✗".red().bold());
        println!("  URI:      {}", report.uri.blue());
        println!("  Anchored: {}", report.on_chain_hash.yellow());
        println!("  Fetched:  {}", report.local_hash.red());
    }
    Ok(if report.ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_MISMATCH)
    })
}

fn cmd_history(ctx: &Context, args: VerifyArgs) -> anyhow::Result<ExitCode> {
    let list_id = resolve_list_id(ctx, args.list);
    let events = ctx.ledger().load()?.history(&list_id);
    if ctx.json() {
        print_json(&events)?;
        return Ok(ExitCode::SUCCESS);
    }
    if events.is_empty() {
        println!("No anchors for {}.", list_id.short_id());
        return Ok(ExitCode::SUCCESS);
    }
    for event in &events {
        if let LedgerEvent::StatusListAnchored {
            uri,
            hash,
            version,
            updater,
            block,
            ..
        } = event
        {
            println!(
                "{}  {}  {}  {}",
                format!("#{block}").yellow(),
                format!("v{version}").bold(),
                hash.short_hex().dimmed(),
                uri.blue()
            );
            println!("      by {updater}");
        }
    }
    Ok(ExitCode::SUCCESS)
}
