use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::schema::{ActualId, EntryId, PaymentId};

#[derive(Error, Debug)]
pub enum TreasuryError {
    #[error("Unknown time unit '{0}': expected day, week, fortnightly, month, bimonthly, quarterly, semiannually or annually")]
    UnknownTimeUnit(String),

    #[error("Unknown frequency '{0}'")]
    UnknownFrequency(String),

    #[error("Invalid horizon length {0}: must not be negative")]
    NegativeHorizon(i64),

    #[error("Horizon out of range: {unit} periods at offset {offset} fall outside the supported calendar")]
    HorizonOutOfRange { unit: String, offset: i64 },

    #[error("Invalid budget entry {entry}: {details}")]
    InvalidEntry { entry: String, details: String },

    #[error("Actual transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("Budget entry not found: {0}")]
    EntryNotFound(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Consolidated view not found: {0}")]
    ViewNotFound(String),

    #[error("Cash account not found: {0}")]
    AccountNotFound(String),

    #[error("Transaction {0} is written off and accepts no further payments")]
    TransactionWrittenOff(String),

    #[error("Transaction {0} is already settled and cannot be written off")]
    AlreadySettled(String),

    #[error("Payment amount {0} must be positive")]
    NonPositivePayment(Decimal),

    #[error("Payment of {attempted} on transaction {actual} exceeds the remaining {remaining}")]
    Overpayment {
        actual: String,
        attempted: Decimal,
        remaining: Decimal,
    },

    #[error("Balance discontinuity at period {index}: opening {opening} != previous closing {previous_closing}")]
    BalanceDiscontinuity {
        index: usize,
        opening: Decimal,
        previous_closing: Decimal,
    },

    #[error("Projection mismatch at period {index}: grouped closing {grouped} vs chart balance {chart} (difference {difference})")]
    ProjectionMismatch {
        index: usize,
        grouped: Decimal,
        chart: Decimal,
        difference: Decimal,
    },

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TreasuryError>;

/// Non-fatal problems found in the input data. The offending record is
/// skipped or reinterpreted and the computation carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DataIntegrityWarning {
    /// The actual points at a budget entry that is not in the input set.
    /// It is handled as an unlinked actual and joined by category.
    #[error("actual {actual} references missing budget entry {budget}")]
    DanglingBudgetLink { actual: ActualId, budget: EntryId },

    /// A payment record whose parent transaction does not exist.
    #[error("payment {payment} references missing transaction {actual}")]
    OrphanPayment { payment: PaymentId, actual: ActualId },

    /// A store record that could not be turned into a budget entry.
    #[error("entry {entry} skipped: {reason}")]
    MalformedEntry { entry: String, reason: String },

    /// A budget entry with amounts in the horizon whose category is not in
    /// the taxonomy. It is left out of the grouped rollups.
    #[error("entry {entry} has unknown category '{category}'")]
    UncategorizedEntry { entry: EntryId, category: String },

    /// An unlinked actual with payments in the horizon whose category is not
    /// in the taxonomy. It is left out of the grouped rollups.
    #[error("actual {actual} has unknown category '{category}'")]
    UncategorizedActual { actual: ActualId, category: String },

    /// Payments recorded beyond the transaction amount.
    #[error("actual {actual} paid {paid} against {amount}")]
    Overpaid {
        actual: ActualId,
        amount: Decimal,
        paid: Decimal,
    },
}
