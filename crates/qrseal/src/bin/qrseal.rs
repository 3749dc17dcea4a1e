//! QRSeal command-line interface.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use qrseal::store::{Registry, SqliteRegistry};
use qrseal::vision::StandardPrimitives;
use qrseal::{
    keys, EngineConfig, ImageInput, IssueRequest, Issuer, Keypair, Serial, VerificationRequest,
    Verifier,
};

#[derive(Parser)]
#[command(name = "qrseal")]
#[command(about = "Signed QR label issuance and anti-counterfeit verification")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Registry database (overrides QRSEAL_DB_PATH)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Signing key file (overrides QRSEAL_KEY_PATH)
    #[arg(long, global = true)]
    key: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new signing key
    GenKeys {
        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Create or migrate the registry database
    InitDb,

    /// Issue a signed label
    Create {
        product: String,
        serial: String,
        batch: String,

        /// Canonical label image used for visual comparison
        #[arg(short, long)]
        image: PathBuf,
    },

    /// Verify a scanned label
    Verify {
        /// The scanned QR string
        #[arg(short, long)]
        qr: String,

        /// Photo of the label to compare against the canonical image
        #[arg(short, long)]
        image: Option<PathBuf>,

        /// Device descriptor
        #[arg(short, long, default_value = "unknown")]
        device: String,

        /// Extra context as a JSON object
        #[arg(short, long)]
        meta: Option<String>,
    },

    /// Show recent scans and flagged serials
    Report {
        /// Number of recent scans to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Delete all scan history
    ResetScans,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set subscriber")?;

    let mut config = EngineConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(key) = cli.key {
        config.key_path = key;
    }

    match cli.command {
        Commands::GenKeys { force } => cmd_gen_keys(&config, force),
        Commands::InitDb => cmd_init_db(&config),
        Commands::Create {
            product,
            serial,
            batch,
            image,
        } => cmd_create(&config, product, serial, batch, image).await,
        Commands::Verify {
            qr,
            image,
            device,
            meta,
        } => cmd_verify(&config, qr, image, device, meta).await,
        Commands::Report { limit } => cmd_report(&config, limit).await,
        Commands::ResetScans => cmd_reset_scans(&config).await,
    }
}

fn open_registry(config: &EngineConfig) -> Result<Arc<SqliteRegistry>> {
    let registry = SqliteRegistry::open(&config.db_path)
        .with_context(|| format!("opening registry {}", config.db_path.display()))?;
    Ok(Arc::new(registry))
}

fn cmd_gen_keys(config: &EngineConfig, force: bool) -> Result<()> {
    if config.key_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config.key_path.display()
        );
    }

    let keypair = Keypair::generate();
    keys::write_signing_key(&config.key_path, &keypair)?;

    println!("PUBLIC_KEY_B64={}", keypair.verify_key().to_base64url());
    Ok(())
}

fn cmd_init_db(config: &EngineConfig) -> Result<()> {
    open_registry(config)?;
    info!(path = %config.db_path.display(), "registry ready");
    Ok(())
}

async fn cmd_create(
    config: &EngineConfig,
    product: String,
    serial: String,
    batch: String,
    image: PathBuf,
) -> Result<()> {
    if !image.exists() {
        bail!("canonical image not found: {}", image.display());
    }

    let keypair = keys::load_signing_key(&config.key_path)?;
    let issuer = Issuer::new(keypair, open_registry(config)?);

    let issued = issuer
        .issue(IssueRequest {
            product,
            serial: Serial::from(serial),
            batch,
            canonical_image_path: image,
        })
        .await?;

    let out = serde_json::json!({
        "serial": issued.item.serial,
        "qr": issued.wire,
        "manufacture_date": issued.item.manufacture_date,
        "canonical_image_path": issued.item.canonical_image_path,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

async fn cmd_verify(
    config: &EngineConfig,
    qr: String,
    image: Option<PathBuf>,
    device: String,
    meta: Option<String>,
) -> Result<()> {
    let verify_key = keys::load_verify_key(config)?;
    let verifier = Verifier::new(
        open_registry(config)?,
        StandardPrimitives::new(),
        verify_key,
        config.verifier(),
    );

    let mut request = VerificationRequest::new(qr).with_device(device);
    if let Some(meta) = meta {
        request = request.with_meta(serde_json::from_str(&meta).context("--meta is not valid JSON")?);
    }
    if let Some(path) = image {
        let bytes = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
        request = request.with_image(ImageInput::Raw(bytes));
    }

    let response = verifier.verify(request).await;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn format_ts(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

async fn cmd_report(config: &EngineConfig, limit: usize) -> Result<()> {
    let registry = open_registry(config)?;

    println!("Items issued: {}", registry.item_count().await?);

    println!("\nRecent scans\n{}", "=".repeat(50));
    for row in registry.recent_scans(limit).await? {
        let scan = &row.scan;
        println!(
            "#{:<5} {}  {:<16} {:<12} {:<12} sim={:.3} tamper={}",
            scan.id,
            format_ts(scan.timestamp),
            scan.event.serial.as_str(),
            row.product.as_deref().unwrap_or("-"),
            scan.event.device,
            scan.event.similarity,
            if scan.event.visual_tamper { "yes" } else { "no" },
        );
    }

    println!(
        "\nFlagged serials (> {} scans)\n{}",
        config.scan_flag_threshold,
        "=".repeat(50)
    );
    for item in registry.flagged_items(config.scan_flag_threshold).await? {
        println!(
            "{:<16} {:<12} {:<10} scans={:<5} last={}",
            item.serial.as_str(),
            item.product.as_deref().unwrap_or("-"),
            item.batch.as_deref().unwrap_or("-"),
            item.scan_count,
            format_ts(item.last_scan),
        );
    }

    Ok(())
}

async fn cmd_reset_scans(config: &EngineConfig) -> Result<()> {
    let removed = open_registry(config)?.clear_scans().await?;
    info!(removed, "scan history cleared");
    println!("Removed {} scans", removed);
    Ok(())
}
