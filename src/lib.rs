//! A minimal append-only ledger: hash-linked blocks, chain verification,
//! brute-force proof of work and Merkle roots over transaction batches.

pub mod blockchain;
pub mod config;

pub use blockchain::{Block, Blockchain, BlockchainError, MerkleTree, ProofOfWork, Transaction};
pub use config::{ChainConfig, ConfigError, MiningConfig};
