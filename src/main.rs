use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use log::{info, warn};
use std::fs;
use std::path::PathBuf;
use tokio::signal::ctrl_c;

use veil_dht::crypto::KeyPair;
use veil_dht::dht::{PrivateDht, SledOverlay};
use veil_dht::utils::{parse_log_level, setup_logger, Config};

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[clap(short, long, default_value = "veil_dht.json")]
    config: PathBuf,

    /// Node name
    #[clap(short, long)]
    name: Option<String>,

    /// Listen port announced to peers
    #[clap(short, long)]
    port: Option<u16>,

    /// Log level
    #[clap(long)]
    log_level: Option<String>,

    /// Run a local smoke workflow (put/get/announce/piece proof) and exit
    #[clap(long, action = ArgAction::SetTrue)]
    demo: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    if let Some(name) = args.name {
        config.node_name = name;
    }
    if let Some(port) = args.port {
        config.listen_port = port;
    }
    if let Some(level) = args.log_level {
        config.log_level = level;
    }

    let level = parse_log_level(&config.log_level).unwrap_or(log::LevelFilter::Info);
    if let Err(e) = setup_logger(Some(level)) {
        eprintln!("Failed to set up logger: {}", e);
    }

    info!("Starting {} on port {}", config.node_name, config.listen_port);

    let keypair = load_or_generate_identity(&config)?;
    info!(
        "Node identity ready ({}-bit plaintext space)",
        keypair.public.plaintext_bits()
    );

    let overlay = SledOverlay::open(&config.data_dir, Some(config.record_ttl()))
        .with_context(|| format!("Failed to open overlay at {}", config.data_dir.display()))?;
    let expired = overlay.cleanup_expired();
    if expired > 0 {
        info!("Dropped {} expired overlay records", expired);
    }

    let dht = PrivateDht::new(keypair, overlay, config.dht_config());

    if args.demo {
        return run_demo(&dht, config.listen_port).await;
    }

    info!("Node running, press Ctrl+C to stop");
    ctrl_c().await.context("Failed to wait for shutdown signal")?;
    info!("Shutting down");
    Ok(())
}

/// Loads the node keypair from disk, generating and persisting a new
/// one on first run.
fn load_or_generate_identity(config: &Config) -> Result<KeyPair> {
    if config.identity_path.exists() {
        let contents = fs::read_to_string(&config.identity_path)?;
        match serde_json::from_str::<KeyPair>(&contents) {
            Ok(keypair) => return Ok(keypair),
            Err(e) => {
                // A new keypair invalidates every record stored under
                // the old one; make that loud.
                warn!(
                    "Identity file unreadable ({}), generating a new keypair; \
                     previously stored ciphertexts are no longer decryptable",
                    e
                );
            }
        }
    }

    let keypair =
        KeyPair::generate_with_bits(config.plaintext_bits).context("Key generation failed")?;

    let contents = serde_json::to_string_pretty(&keypair)?;
    fs::write(&config.identity_path, contents)
        .with_context(|| format!("Failed to persist identity to {}", config.identity_path.display()))?;

    Ok(keypair)
}

/// Exercises the privacy layer end to end against the local overlay.
async fn run_demo(dht: &PrivateDht<SledOverlay>, port: u16) -> Result<()> {
    info!("Running demo workflow");

    dht.put(b"demo-key", 42).await?;
    let value = dht.get(b"demo-key").await?;
    info!("put/get round trip: {:?}", value);

    let receipt = dht.announce(b"demo-info-hash", port).await?;
    let verified = dht
        .verify_announce_proof(&receipt.proof, &receipt.obfuscated)
        .await;
    info!(
        "announced as {} (proof verifies: {})",
        receipt.obfuscated, verified
    );

    let piece = b"demo piece bytes";
    let proof = dht.generate_piece_proof(0, piece).await?;
    let commitment = veil_dht::crypto::Commitment::of_piece(0, piece);
    info!(
        "piece proof verifies: {}",
        dht.verify_piece_proof(&proof, &commitment, 0).await
    );

    let nodes = dht.find_node(b"demo-node").await?;
    info!("lookup returned {} nodes", nodes.len());

    Ok(())
}
