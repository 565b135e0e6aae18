// Blockchain module
//
// This module contains the core ledger implementation including:
// - Hashing utilities
// - Transaction structure and batch parsing
// - Block structure
// - Proof of work search
// - Merkle tree builder
// - Blockchain structure

pub mod block;
pub mod chain;
pub mod crypto;
pub mod merkle;
pub mod pow;
pub mod transaction;

// Re-export main components for easier access
pub use block::{Block, BlockError};
pub use chain::{Blockchain, BlockchainError, SharedBlockchain};
pub use crypto::calculate_hash;
pub use merkle::{MerkleNode, MerkleTree};
pub use pow::{proof_of_work, MiningError, ProofOfWork};
pub use transaction::{
    parse_transactions, ParsedBatch, SkippedRecord, Transaction, TransactionError,
};
