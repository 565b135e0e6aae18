use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

/// Separator between records in a raw transaction batch
pub const RECORD_SEPARATOR: char = ';';

/// Separator between the fields of a single record
pub const FIELD_SEPARATOR: char = ',';

/// Errors that can occur while parsing a transaction record
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransactionError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Too many fields: expected 3, got {0}")]
    TooManyFields(usize),

    #[error("Empty {0} address")]
    EmptyAddress(&'static str),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Represents a value transfer between two parties
///
/// Fields are only set through [`Transaction::new`], so every transaction has
/// non-empty addresses and a finite amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTransaction")]
pub struct Transaction {
    /// Sender's address
    sender: String,

    /// Receiver's address
    receiver: String,

    /// Amount being transferred
    amount: f64,
}

/// Unvalidated wire form of a transaction
#[derive(Deserialize)]
struct RawTransaction {
    sender: String,
    receiver: String,
    amount: f64,
}

impl TryFrom<RawTransaction> for Transaction {
    type Error = TransactionError;

    fn try_from(raw: RawTransaction) -> Result<Self, Self::Error> {
        Transaction::new(raw.sender, raw.receiver, raw.amount)
    }
}

impl Transaction {
    /// Creates a new transaction
    ///
    /// # Arguments
    ///
    /// * `sender` - The sender's address
    /// * `receiver` - The receiver's address
    /// * `amount` - The amount to transfer
    ///
    /// # Returns
    ///
    /// The transaction, or an error if an address is empty or the amount is
    /// NaN or infinite
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: f64,
    ) -> Result<Self, TransactionError> {
        let sender = sender.into();
        let receiver = receiver.into();

        if sender.is_empty() {
            return Err(TransactionError::EmptyAddress("sender"));
        }
        if receiver.is_empty() {
            return Err(TransactionError::EmptyAddress("receiver"));
        }

        // non-finite values have no JSON form and would all hash as `null`
        if !amount.is_finite() {
            return Err(TransactionError::InvalidAmount(amount.to_string()));
        }

        Ok(Transaction {
            sender,
            receiver,
            amount,
        })
    }

    /// Sender's address
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Receiver's address
    pub fn receiver(&self) -> &str {
        &self.receiver
    }

    /// Amount being transferred
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Returns the fixed-order encoding used for Merkle leaves
    ///
    /// Fields are joined with `,` in the order sender, receiver, amount, and
    /// the amount always carries six fractional digits.
    pub fn canonical_encoding(&self) -> String {
        format!("{},{},{:.6}", self.sender, self.receiver, self.amount)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}: {}", self.sender, self.receiver, self.amount)
    }
}

impl FromStr for Transaction {
    type Err = TransactionError;

    /// Parses a single `sender,receiver,amount` record
    fn from_str(record: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = record.split(FIELD_SEPARATOR).map(str::trim).collect();

        if fields.len() > 3 {
            return Err(TransactionError::TooManyFields(fields.len()));
        }

        let sender = fields.first().copied().unwrap_or_default();
        let receiver = fields
            .get(1)
            .copied()
            .ok_or(TransactionError::MissingField("receiver"))?;
        let raw_amount = fields
            .get(2)
            .copied()
            .ok_or(TransactionError::MissingField("amount"))?;

        let amount: f64 = raw_amount
            .parse()
            .map_err(|_| TransactionError::InvalidAmount(raw_amount.to_string()))?;

        Transaction::new(sender, receiver, amount).map_err(|e| match e {
            TransactionError::InvalidAmount(_) => {
                TransactionError::InvalidAmount(raw_amount.to_string())
            }
            other => other,
        })
    }
}

/// A record that was dropped while parsing a batch
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRecord {
    /// Zero-based position of the record within the raw batch
    pub position: usize,

    /// The record text as it appeared in the batch
    pub record: String,

    /// Why the record was rejected
    pub reason: TransactionError,
}

impl fmt::Display for SkippedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record {} ({:?}): {}", self.position, self.record, self.reason)
    }
}

/// Result of parsing a raw transaction batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedBatch {
    /// Successfully parsed transactions, in input order
    pub transactions: Vec<Transaction>,

    /// Records that were dropped, in input order
    pub skipped: Vec<SkippedRecord>,
}

impl ParsedBatch {
    /// Returns true if every non-blank record parsed
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Parses a `;`-separated batch of `sender,receiver,amount` records
///
/// A malformed record is dropped and reported in [`ParsedBatch::skipped`];
/// the rest of the batch is still returned. Blank records are ignored.
pub fn parse_transactions(raw: &str) -> ParsedBatch {
    let mut batch = ParsedBatch::default();

    for (position, record) in raw.split(RECORD_SEPARATOR).enumerate() {
        if record.trim().is_empty() {
            continue;
        }

        match record.parse::<Transaction>() {
            Ok(transaction) => batch.transactions.push(transaction),
            Err(reason) => {
                warn!("Skipping transaction record {}: {}", position, reason);
                batch.skipped.push(SkippedRecord {
                    position,
                    record: record.to_string(),
                    reason,
                });
            }
        }
    }

    batch
}
