use crate::db_types::ProcessedPayment;

pub enum InsertPaymentResult {
    Inserted(i64),
    AlreadyExists(i64),
}

/// The outcome of recording a payment against a savings goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessPaymentResult {
    Processed(ProcessedPayment),
    /// A transaction with the same `txid` is already on record (with the given id). Nothing was changed.
    AlreadyRecorded(i64),
}
