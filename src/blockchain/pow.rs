use log::{debug, info};
use thiserror::Error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::block::Block;
use crate::config::MiningConfig;

/// How often the search logs progress
const PROGRESS_INTERVAL: u64 = 100_000;

/// Errors that can stop a bounded proof of work search
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiningError {
    #[error("No nonce found within {attempts} attempts")]
    IterationLimitReached { attempts: u64 },

    #[error("Search cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },

    #[error("Nonce space exhausted")]
    NonceSpaceExhausted,
}

/// Brute-force nonce search against a literal hex prefix
///
/// Without an iteration limit or a cancellation flag, [`ProofOfWork::search`]
/// keeps going until the prefix is matched and never returns if it cannot be.
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    target_prefix: String,
    max_iterations: Option<u64>,
    cancel: Option<Arc<AtomicBool>>,
}

impl ProofOfWork {
    /// Creates an unbounded search for `target_prefix`
    pub fn new(target_prefix: impl Into<String>) -> Self {
        ProofOfWork {
            target_prefix: target_prefix.into(),
            max_iterations: None,
            cancel: None,
        }
    }

    /// Creates a search from the mining section of the configuration
    pub fn from_config(config: &MiningConfig) -> Self {
        ProofOfWork {
            target_prefix: config.target_prefix.clone(),
            max_iterations: config.max_iterations,
            cancel: None,
        }
    }

    /// Limits the number of nonces tried
    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    /// Stops the search once `cancel` is set
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// The hex prefix a winning hash must start with
    pub fn target_prefix(&self) -> &str {
        &self.target_prefix
    }

    /// Maximum number of nonces tried, if bounded
    pub fn max_iterations(&self) -> Option<u64> {
        self.max_iterations
    }

    /// Searches for a nonce whose block hash starts with the target prefix
    ///
    /// The nonce starts at 0 and is incremented after each miss. On success
    /// the block is left holding the winning nonce and its hash; on failure it
    /// holds the last nonce tried.
    ///
    /// # Arguments
    ///
    /// * `block` - The block to mine in place
    ///
    /// # Returns
    ///
    /// The winning nonce
    pub fn search(&self, block: &mut Block) -> Result<u64, MiningError> {
        let mut nonce: u64 = 0;
        let mut attempts: u64 = 0;

        loop {
            if let Some(limit) = self.max_iterations {
                if attempts >= limit {
                    return Err(MiningError::IterationLimitReached { attempts });
                }
            }

            if let Some(cancel) = &self.cancel {
                if cancel.load(Ordering::Relaxed) {
                    return Err(MiningError::Cancelled { attempts });
                }
            }

            block.set_nonce(nonce);
            attempts += 1;

            if block.hash().starts_with(&self.target_prefix) {
                info!(
                    "Mined block {} with nonce {} after {} attempts",
                    block.index(),
                    nonce,
                    attempts
                );
                return Ok(nonce);
            }

            if attempts % PROGRESS_INTERVAL == 0 {
                debug!("Block {}: {} nonces tried", block.index(), attempts);
            }

            nonce = nonce.checked_add(1).ok_or(MiningError::NonceSpaceExhausted)?;
        }
    }
}

/// Mines `block` in place until its hash starts with `target_prefix`
///
/// This search is unbounded and does not return for an unsatisfiable prefix.
/// Use [`ProofOfWork`] with an iteration limit or a cancellation flag when the
/// search must be bounded.
pub fn proof_of_work(block: &mut Block, target_prefix: &str) -> u64 {
    let mut nonce: u64 = 0;

    loop {
        block.set_nonce(nonce);

        if block.hash().starts_with(target_prefix) {
            return nonce;
        }

        nonce = nonce.wrapping_add(1);
    }
}
