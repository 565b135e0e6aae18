use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use thiserror::Error;

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::block::Block;
use super::pow::{MiningError, ProofOfWork};
use super::transaction::{parse_transactions, SkippedRecord, Transaction};
use crate::config::ChainConfig;

/// Errors that can occur during blockchain operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockchainError {
    #[error("Block not found: index {index} (chain length {len})")]
    BlockNotFound { index: usize, len: usize },

    #[error("Invalid chain: block {index} hash does not match its content")]
    HashMismatch { index: usize },

    #[error("Invalid chain: block {index} does not link to its predecessor")]
    BrokenLink { index: usize },

    #[error("Mining error: {0}")]
    MiningError(#[from] MiningError),

    #[error("System error: {0}")]
    SystemError(String),
}

/// Represents the blockchain
///
/// Linkage is not checked on append or mutation; [`Blockchain::verify_chain`]
/// is the audit.
#[derive(Debug, Clone, Default)]
pub struct Blockchain {
    /// The chain of blocks
    blocks: Vec<Block>,

    /// Recorded settings (see [`ChainConfig`])
    config: ChainConfig,
}

impl Blockchain {
    /// Creates an empty blockchain with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty blockchain with the given configuration
    pub fn with_config(config: ChainConfig) -> Self {
        Blockchain {
            blocks: Vec::new(),
            config,
        }
    }

    /// Parses a raw batch and appends a new block built from it
    ///
    /// # Arguments
    ///
    /// * `raw_transactions` - `;`-separated `sender,receiver,amount` records
    /// * `nonce` - The initial nonce of the block
    /// * `previous_hash` - The hash the new block links to
    /// * `timestamp` - The creation time of the block
    ///
    /// # Returns
    ///
    /// The records that were dropped while parsing
    pub fn new_block(
        &mut self,
        raw_transactions: &str,
        nonce: u64,
        previous_hash: &str,
        timestamp: DateTime<Utc>,
    ) -> Vec<SkippedRecord> {
        let batch = parse_transactions(raw_transactions);
        self.append_block(batch.transactions, nonce, previous_hash, timestamp);
        batch.skipped
    }

    /// Appends a new block with an index equal to the current chain length
    ///
    /// `previous_hash` is taken as given; it is not compared with the last
    /// block's hash.
    pub fn append_block(
        &mut self,
        transactions: Vec<Transaction>,
        nonce: u64,
        previous_hash: &str,
        timestamp: DateTime<Utc>,
    ) -> &Block {
        let index = self.blocks.len() as u64;
        let block = Block::new(index, timestamp, transactions, nonce, previous_hash.to_string());

        info!(
            "Appended block {} with {} transactions",
            index,
            block.transactions().len()
        );
        debug!("Block {} hash {}", index, block.hash());

        self.blocks.push(block);
        &self.blocks[self.blocks.len() - 1]
    }

    /// Parses a raw batch and replaces the transactions of an existing block
    ///
    /// # Returns
    ///
    /// The records that were dropped while parsing, or `BlockNotFound` if
    /// `index` is out of range (the chain is left untouched)
    pub fn change_block(
        &mut self,
        index: usize,
        raw_transactions: &str,
    ) -> Result<Vec<SkippedRecord>, BlockchainError> {
        self.check_index(index)?;

        let batch = parse_transactions(raw_transactions);
        self.replace_block_transactions(index, batch.transactions)?;
        Ok(batch.skipped)
    }

    /// Replaces the transactions of a block and recalculates its hash
    ///
    /// The successor's `previous_hash` is not updated, so the chain no longer
    /// verifies afterwards.
    pub fn replace_block_transactions(
        &mut self,
        index: usize,
        transactions: Vec<Transaction>,
    ) -> Result<(), BlockchainError> {
        self.check_index(index)?;

        self.blocks[index].replace_transactions(transactions);
        info!("Replaced transactions of block {}", index);
        Ok(())
    }

    /// Runs proof of work on a block in place
    ///
    /// Only the mined block's hash changes; successors keep their recorded
    /// `previous_hash`.
    pub fn mine_block(&mut self, index: usize, pow: &ProofOfWork) -> Result<u64, BlockchainError> {
        self.check_index(index)?;

        let nonce = pow.search(&mut self.blocks[index])?;
        Ok(nonce)
    }

    /// Validates the blockchain
    ///
    /// For every block after the first, checks that its stored hash matches
    /// its content and that its `previous_hash` equals the preceding block's
    /// hash. Stops at the first violation.
    pub fn validate(&self) -> Result<(), BlockchainError> {
        for (i, pair) in self.blocks.windows(2).enumerate() {
            let (previous_block, current_block) = (&pair[0], &pair[1]);
            let index = i + 1;

            if !current_block.is_hash_valid() {
                warn!("Block {} hash does not match its content", index);
                return Err(BlockchainError::HashMismatch { index });
            }

            if current_block.previous_hash() != previous_block.hash() {
                warn!("Block {} does not link to block {}", index, i);
                return Err(BlockchainError::BrokenLink { index });
            }
        }

        Ok(())
    }

    /// Returns true if the chain passes [`Blockchain::validate`]
    ///
    /// Chains of zero or one block are always valid.
    pub fn verify_chain(&self) -> bool {
        self.validate().is_ok()
    }

    /// All blocks, in append order
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Block at `index`, if any
    pub fn get_block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    /// Most recently appended block
    pub fn last_block(&self) -> Option<&Block> {
        self.blocks.last()
    }

    /// Hash of the last block, if any
    pub fn last_hash(&self) -> Option<&str> {
        self.blocks.last().map(Block::hash)
    }

    /// Number of blocks in the chain
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns true if no block has been appended
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Recorded chain configuration
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Records the number of transactions per block (not enforced)
    pub fn set_transactions_per_block(&mut self, transactions_per_block: usize) {
        self.config.transactions_per_block = transactions_per_block;
    }

    /// Records the block hash range (not enforced)
    pub fn set_block_hash_range(&mut self, min: u64, max: u64) {
        self.config.hash_range_min = min;
        self.config.hash_range_max = max;
    }

    fn check_index(&self, index: usize) -> Result<(), BlockchainError> {
        if index >= self.blocks.len() {
            warn!(
                "Ignoring block index {} (chain length {})",
                index,
                self.blocks.len()
            );
            return Err(BlockchainError::BlockNotFound {
                index,
                len: self.blocks.len(),
            });
        }

        Ok(())
    }
}

impl fmt::Display for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for block in &self.blocks {
            writeln!(f, "{}", block)?;
        }
        Ok(())
    }
}

/// A blockchain handle that can be shared between threads
///
/// Every mutation takes the same lock, so a hash recomputation and the write
/// that triggered it are never interleaved with another writer.
#[derive(Debug, Clone, Default)]
pub struct SharedBlockchain {
    chain: Arc<Mutex<Blockchain>>,
}

impl SharedBlockchain {
    /// Wraps `blockchain` in a shared handle
    pub fn new(blockchain: Blockchain) -> Self {
        SharedBlockchain {
            chain: Arc::new(Mutex::new(blockchain)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Blockchain>, BlockchainError> {
        self.chain
            .lock()
            .map_err(|e| BlockchainError::SystemError(format!("Blockchain lock poisoned: {}", e)))
    }

    /// See [`Blockchain::new_block`]
    pub fn new_block(
        &self,
        raw_transactions: &str,
        nonce: u64,
        previous_hash: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<Vec<SkippedRecord>, BlockchainError> {
        Ok(self.lock()?.new_block(raw_transactions, nonce, previous_hash, timestamp))
    }

    /// Appends a block linked to whatever block is last at the time the lock
    /// is held
    pub fn append_linked_block(
        &self,
        transactions: Vec<Transaction>,
        nonce: u64,
        timestamp: DateTime<Utc>,
    ) -> Result<Block, BlockchainError> {
        let mut chain = self.lock()?;
        let previous_hash = chain.last_hash().unwrap_or_default().to_string();
        Ok(chain
            .append_block(transactions, nonce, &previous_hash, timestamp)
            .clone())
    }

    /// See [`Blockchain::change_block`]
    pub fn change_block(
        &self,
        index: usize,
        raw_transactions: &str,
    ) -> Result<Vec<SkippedRecord>, BlockchainError> {
        self.lock()?.change_block(index, raw_transactions)
    }

    /// See [`Blockchain::replace_block_transactions`]
    pub fn replace_block_transactions(
        &self,
        index: usize,
        transactions: Vec<Transaction>,
    ) -> Result<(), BlockchainError> {
        self.lock()?.replace_block_transactions(index, transactions)
    }

    /// See [`Blockchain::mine_block`]; the lock is held for the whole search
    pub fn mine_block(&self, index: usize, pow: &ProofOfWork) -> Result<u64, BlockchainError> {
        self.lock()?.mine_block(index, pow)
    }

    /// See [`Blockchain::verify_chain`]
    pub fn verify_chain(&self) -> Result<bool, BlockchainError> {
        Ok(self.lock()?.verify_chain())
    }

    /// Clones the current blocks
    pub fn get_chain(&self) -> Result<Vec<Block>, BlockchainError> {
        Ok(self.lock()?.blocks().to_vec())
    }
}
