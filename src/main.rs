use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{info, warn};

use std::path::PathBuf;

use hashchain_ledger::blockchain::{calculate_hash, SkippedRecord};
use hashchain_ledger::{Blockchain, ChainConfig, ProofOfWork};

/// Walks through building, tampering with, verifying and mining a small chain
#[derive(Parser, Debug)]
#[command(name = "hashchain_ledger", version, about)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Hex prefix a mined block hash must start with
    #[arg(short, long)]
    target_prefix: Option<String>,

    /// Give up mining a block after this many nonces
    #[arg(short, long)]
    max_iterations: Option<u64>,
}

const GENESIS_BATCH: &str = "Alice,Bob,1.5;Charlie,Alice,2.0;Bob,Charlie,0.5;Dave,Alice,1.0";
const TAMPERED_BATCH: &str = "Bob,Alice,1.0;Charlie,Bob,0.5;Dave,Alice,0.8";
const BATCHES: [&str; 5] = [
    "Bob,Alice,0.8;Charlie,Alice,1.2;Dave,Charlie,0.7;Eve,Bob,0.3",
    "Alice,Charlie,2.5;Dave,Bob,0.3;Eve,Alice,1.0",
    "Bob,Eve,0.5;Charlie,Dave,0.9;Eve,Bob,1.2",
    "Alice,Charlie,1.5;Dave,Bob,0.2;Eve,Alice,0.7",
    "Bob,Eve,0.3;Charlie,Dave,1.1",
];

fn load_config(cli: &Cli) -> Result<ChainConfig> {
    let mut config = match &cli.config {
        Some(path) => ChainConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ChainConfig::default(),
    };

    if let Some(prefix) = &cli.target_prefix {
        config.mining.target_prefix = prefix.clone();
    }
    if let Some(limit) = cli.max_iterations {
        config.mining.max_iterations = Some(limit);
    }

    config.validate()?;
    Ok(config)
}

fn report_skipped(skipped: &[SkippedRecord]) {
    for record in skipped {
        warn!("Dropped {}", record);
    }
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let pow = ProofOfWork::from_config(&config.mining);

    let mut blockchain = Blockchain::with_config(config);

    report_skipped(&blockchain.new_block(GENESIS_BATCH, 0, "", Utc::now()));
    print!("{}", blockchain);

    report_skipped(&blockchain.change_block(0, TAMPERED_BATCH)?);
    println!("Blockchain is valid: {}", blockchain.verify_chain());

    println!("Hash: {}", calculate_hash("Hello, world!"));

    for (i, batch) in BATCHES.iter().enumerate() {
        let previous_hash = blockchain.last_hash().unwrap_or_default().to_string();
        report_skipped(&blockchain.new_block(batch, i as u64 + 1, &previous_hash, Utc::now()));
    }

    print!("{}", blockchain);
    println!("Blockchain is valid: {}", blockchain.verify_chain());
    println!();

    info!(
        "Mining {} blocks with target prefix {:?}",
        blockchain.len(),
        pow.target_prefix()
    );

    for index in 0..blockchain.len() {
        let nonce = blockchain.mine_block(index, &pow)?;
        println!("Proof of Work - Block {}, Nonce: {}", index, nonce);

        if let Some(block) = blockchain.get_block(index) {
            match block.merkle_tree().root_hash() {
                Some(root) => println!("Merkle Tree Root - Block {}: {}", index, root),
                None => println!("Merkle Tree Root - Block {}: <empty>", index),
            }
        }
    }

    Ok(())
}
