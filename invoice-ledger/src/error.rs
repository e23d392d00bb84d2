//! Error types for the ledger

use crate::types::{Amount, Identity, Role};
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
///
/// The first group are rejections: the call was refused and the ledger is
/// exactly as it was before. The rest are infrastructure failures.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller holds no role that permits the operation
    #[error("Unauthorized: {caller} is {role}")]
    Unauthorized {
        /// Calling identity
        caller: Identity,
        /// Role it currently holds
        role: Role,
    },

    /// Caller already holds a role
    #[error("Already registered: {caller} is {role}")]
    AlreadyRegistered {
        /// Calling identity
        caller: Identity,
        /// Role it currently holds
        role: Role,
    },

    /// Caller or target holds the wrong role for the operation
    #[error("Role mismatch: {identity} is {actual}, expected {expected}")]
    RoleMismatch {
        /// Identity whose role was checked
        identity: Identity,
        /// Role the operation requires
        expected: Role,
        /// Role actually held
        actual: Role,
    },

    /// Host still has an invoice with a nonzero remaining amount
    #[error("Outstanding invoice exists: {host} has invoice #{index} with {remaining} remaining")]
    OutstandingInvoiceExists {
        /// Issuing host
        host: Identity,
        /// Log position of the unpaid invoice
        index: usize,
        /// Amount still owed on it
        remaining: Amount,
    },

    /// Payment exceeds the guest's balance
    #[error("Insufficient balance: {caller} has {balance}, requested {requested}")]
    InsufficientBalance {
        /// Paying guest
        caller: Identity,
        /// Balance held
        balance: Amount,
        /// Amount the guest asked to pay
        requested: Amount,
    },

    /// Guest has never been invoiced
    #[error("No invoice found for {0}")]
    NoInvoiceFound(Identity),

    /// Credit arithmetic would exceed the representable range
    #[error("Overflow: crediting {amount} to {account}")]
    Overflow {
        /// Account being credited
        account: Identity,
        /// Amount that did not fit
        amount: Amount,
    },

    /// Malformed request at the call boundary
    #[error("Invalid call: {0}")]
    InvalidCall(String),

    /// Journal replay found an inconsistent history
    #[error("Journal error: {0}")]
    Journal(String),

    /// Event not found in the journal
    #[error("Event not found: {0}")]
    EventNotFound(u64),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True when the ledger refused the call on its own rules.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::Unauthorized { .. }
                | Error::AlreadyRegistered { .. }
                | Error::RoleMismatch { .. }
                | Error::OutstandingInvoiceExists { .. }
                | Error::InsufficientBalance { .. }
                | Error::NoInvoiceFound(_)
                | Error::Overflow { .. }
                | Error::InvalidCall(_)
        )
    }

    /// Short stable label, used for metrics and wire responses
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Unauthorized { .. } => "unauthorized",
            Error::AlreadyRegistered { .. } => "already_registered",
            Error::RoleMismatch { .. } => "role_mismatch",
            Error::OutstandingInvoiceExists { .. } => "outstanding_invoice_exists",
            Error::InsufficientBalance { .. } => "insufficient_balance",
            Error::NoInvoiceFound(_) => "no_invoice_found",
            Error::Overflow { .. } => "overflow",
            Error::InvalidCall(_) => "invalid_call",
            Error::Journal(_) => "journal",
            Error::EventNotFound(_) => "event_not_found",
            Error::Storage(_) => "storage",
            Error::Serialization(_) => "serialization",
            Error::Concurrency(_) => "concurrency",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
        }
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejections_are_classified() {
        let err = Error::NoInvoiceFound(Identity::new("bob"));
        assert!(err.is_rejection());
        assert_eq!(err.kind(), "no_invoice_found");

        let err = Error::Concurrency("Actor mailbox closed".to_string());
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_display_carries_context() {
        let err = Error::InsufficientBalance {
            caller: Identity::new("bob"),
            balance: 10,
            requested: 25,
        };
        let msg = err.to_string();
        assert!(msg.contains("bob"));
        assert!(msg.contains("25"));
    }
}
