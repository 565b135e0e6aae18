use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt;

use super::crypto::calculate_hash;
use super::merkle::MerkleTree;
use super::transaction::Transaction;

/// Errors that can occur when reading a block back from its serialized form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlockError {
    #[error("Hash mismatch: stored {stored}, calculated {calculated}")]
    HashMismatch { stored: String, calculated: String },
}

/// Represents a block in the blockchain
///
/// The stored hash always matches the block's content: every constructor and
/// mutator recomputes it before returning, and deserialization rejects a
/// block whose hash does not match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBlock")]
pub struct Block {
    /// Index of the block in the chain at creation time
    index: u64,

    /// Timestamp supplied when the block was created
    timestamp: DateTime<Utc>,

    /// List of transactions included in this block
    transactions: Vec<Transaction>,

    /// Proof of work search variable
    nonce: u64,

    /// Hash of the previous block
    previous_hash: String,

    /// Hash of the current block (calculated)
    hash: String,
}

/// Unvalidated wire form of a block
#[derive(Deserialize)]
struct RawBlock {
    index: u64,
    timestamp: DateTime<Utc>,
    transactions: Vec<Transaction>,
    nonce: u64,
    previous_hash: String,
    hash: String,
}

impl TryFrom<RawBlock> for Block {
    type Error = BlockError;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        let block = Block::new(
            raw.index,
            raw.timestamp,
            raw.transactions,
            raw.nonce,
            raw.previous_hash,
        );

        if block.hash != raw.hash {
            return Err(BlockError::HashMismatch {
                stored: raw.hash,
                calculated: block.hash,
            });
        }

        Ok(block)
    }
}

impl Block {
    /// Creates a new block
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `timestamp` - The time the block was created
    /// * `transactions` - The list of transactions to include in the block
    /// * `nonce` - The proof of work nonce
    /// * `previous_hash` - The hash of the previous block
    ///
    /// # Returns
    ///
    /// A new Block instance with its hash already calculated
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        transactions: Vec<Transaction>,
        nonce: u64,
        previous_hash: String,
    ) -> Self {
        let block = Block {
            index,
            timestamp,
            transactions,
            nonce,
            previous_hash,
            hash: String::new(),
        };

        let hash = block.calculate_hash();

        Block { hash, ..block }
    }

    /// Calculates the hash of the block
    ///
    /// Every field except the stored hash takes part in the digest.
    ///
    /// # Returns
    ///
    /// The SHA-256 hash of the block as a hexadecimal string
    pub fn calculate_hash(&self) -> String {
        let block_data = serde_json::json!({
            "index": self.index,
            "nonce": self.nonce,
            "timestamp": self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            "transactions": self.transactions,
            "previous_hash": self.previous_hash,
        });

        calculate_hash(block_data.to_string())
    }

    /// Returns true if the stored hash matches the block's current content
    pub fn is_hash_valid(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    /// Builds the Merkle tree of this block's transactions
    pub fn merkle_tree(&self) -> MerkleTree {
        MerkleTree::build(&self.transactions)
    }

    /// Index of the block in the chain at creation time
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Timestamp supplied when the block was created
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Transactions included in this block
    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Current proof of work nonce
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Hash of the previous block, as recorded at creation
    pub fn previous_hash(&self) -> &str {
        &self.previous_hash
    }

    /// Hash of this block
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Replaces the transaction batch and recalculates the hash
    pub(crate) fn replace_transactions(&mut self, transactions: Vec<Transaction>) {
        self.transactions = transactions;
        self.hash = self.calculate_hash();
    }

    /// Sets the nonce and recalculates the hash
    pub(crate) fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
        self.hash = self.calculate_hash();
    }

    #[cfg(test)]
    pub(crate) fn set_previous_hash_unchecked(&mut self, previous_hash: &str) {
        self.previous_hash = previous_hash.to_string();
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Block {}", self.index)?;
        write!(f, "Transactions: [")?;
        for (i, transaction) in self.transactions.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", transaction)?;
        }
        writeln!(f, "]")?;
        writeln!(f, "Nonce: {}", self.nonce)?;
        writeln!(f, "Previous Hash: {}", self.previous_hash)?;
        writeln!(f, "Hash: {}", self.hash)?;
        write!(f, "-------------------------------------")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 12, 0, 0).unwrap()
    }

    fn transfer(sender: &str, receiver: &str, amount: f64) -> Transaction {
        Transaction::new(sender, receiver, amount).unwrap()
    }

    fn sample_transactions() -> Vec<Transaction> {
        vec![transfer("Alice", "Bob", 1.5), transfer("Charlie", "Alice", 2.0)]
    }

    fn sample_block(index: u64, nonce: u64, previous_hash: &str) -> Block {
        Block::new(
            index,
            fixed_time(),
            sample_transactions(),
            nonce,
            previous_hash.to_string(),
        )
    }

    #[test]
    fn test_new_block() {
        let block = sample_block(1, 100, "previous_hash");

        assert_eq!(block.index(), 1);
        assert_eq!(block.nonce(), 100);
        assert_eq!(block.previous_hash(), "previous_hash");
        assert_eq!(block.transactions().len(), 2);
        assert_eq!(block.hash(), block.calculate_hash());
        assert_eq!(block.hash().len(), 64); // SHA-256 hash is 64 characters in hex
    }

    #[test]
    fn test_calculate_hash_is_deterministic() {
        let a = sample_block(3, 7, "prev");
        let b = sample_block(3, 7, "prev");

        assert_eq!(a.calculate_hash(), a.calculate_hash());
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn test_every_field_affects_hash() {
        let base = sample_block(1, 0, "prev");
        let later = fixed_time() + chrono::Duration::seconds(1);
        let single = vec![transfer("Alice", "Bob", 1.5)];

        let variants = vec![
            sample_block(2, 0, "prev"),
            Block::new(1, later, sample_transactions(), 0, "prev".to_string()),
            Block::new(1, fixed_time(), single, 0, "prev".to_string()),
            sample_block(1, 1, "prev"),
            sample_block(1, 0, "other"),
        ];

        for variant in variants {
            assert_ne!(base.hash(), variant.hash());
        }
    }

    #[test]
    fn test_distinct_amounts_give_distinct_hashes() {
        let amounts = [0.0, 1.5, 1.500001, -1.5, f64::MAX, f64::MIN_POSITIVE];
        let hashes: Vec<String> = amounts
            .iter()
            .map(|amount| {
                let transactions = vec![transfer("Alice", "Bob", *amount)];
                let block = Block::new(1, fixed_time(), transactions, 0, String::new());
                block.hash().to_string()
            })
            .collect();

        for (i, a) in hashes.iter().enumerate() {
            for b in &hashes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_mutators_recalculate_hash() {
        let mut block = sample_block(0, 0, "");
        let original = block.hash().to_string();

        block.replace_transactions(vec![transfer("Bob", "Alice", 1.0)]);
        assert_ne!(block.hash(), original);
        assert!(block.is_hash_valid());

        let replaced = block.hash().to_string();
        block.set_nonce(42);
        assert_eq!(block.nonce(), 42);
        assert_ne!(block.hash(), replaced);
        assert!(block.is_hash_valid());
    }

    #[test]
    fn test_stale_hash_is_detected() {
        let mut block = sample_block(0, 0, "");
        block.set_previous_hash_unchecked("forged");

        assert!(!block.is_hash_valid());
    }

    #[test]
    fn test_serde_roundtrip_keeps_hash() {
        let block = sample_block(4, 9, "prev");

        let json = serde_json::to_value(&block).unwrap();
        let restored: Block = serde_json::from_value(json).unwrap();

        assert_eq!(restored, block);
        assert!(restored.is_hash_valid());
    }

    #[test]
    fn test_deserialize_rejects_forged_hash() {
        let block = sample_block(4, 9, "prev");

        let mut json = serde_json::to_value(&block).unwrap();
        json["hash"] = serde_json::json!("deadbeef");
        assert!(serde_json::from_value::<Block>(json).is_err());

        let mut json = serde_json::to_value(&block).unwrap();
        json["nonce"] = serde_json::json!(10);
        assert!(serde_json::from_value::<Block>(json).is_err());
    }

    #[test]
    fn test_try_from_reports_both_hashes() {
        let block = sample_block(0, 0, "");
        let raw = RawBlock {
            index: block.index(),
            timestamp: block.timestamp(),
            transactions: block.transactions().to_vec(),
            nonce: block.nonce(),
            previous_hash: block.previous_hash().to_string(),
            hash: "deadbeef".to_string(),
        };

        assert_eq!(
            Block::try_from(raw),
            Err(BlockError::HashMismatch {
                stored: "deadbeef".to_string(),
                calculated: block.hash().to_string(),
            })
        );
    }

    #[test]
    fn test_display() {
        let transactions = vec![transfer("Alice", "Bob", 1.5)];
        let block = Block::new(0, fixed_time(), transactions, 0, String::new());
        let output = block.to_string();

        assert!(output.starts_with("Block 0\n"));
        assert!(output.contains("Transactions: [Alice -> Bob: 1.5]"));
        assert!(output.contains(&format!("Hash: {}", block.hash())));
    }
}
