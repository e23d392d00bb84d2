//! Invoice Ledger
//!
//! Role-gated credit ledger in which hosts invoice guests and guests pay
//! those invoices, in full or in installments, from prepaid balances.
//!
//! # Architecture
//!
//! - **Event Sourcing**: Every accepted mutation is a journaled event
//! - **Single Writer**: One actor task owns the ledger; calls are serialized
//! - **Plan/Apply**: Calls are validated before anything is written
//! - **Latest-Invoice Index**: O(1) lookup of an identity's newest invoice
//!
//! # Invariants
//!
//! - Roles are write-once: a registered identity never changes role
//! - Credit conservation: Σ(balances) == Σ(top-ups) for all time
//! - Remaining invoice amounts only decrease
//! - A host has at most one invoice with a nonzero remaining amount
//! - Deterministic replay: Same journal → same state
//! - Rejected calls leave no trace

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod error;
pub mod registry;
pub mod balances;
pub mod invoices;
pub mod ledger;
pub mod query;
pub mod call;
pub mod config;
pub mod storage;
pub mod metrics;
pub mod actor;
pub mod service;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    Amount, EventKind, Identity, Invoice, InvoiceIndex, InvoiceView, LedgerEvent, Role,
};
pub use ledger::Ledger;
pub use call::{Call, Reply};
pub use config::Config;
pub use storage::Storage;
pub use metrics::Metrics;
pub use actor::LedgerHandle;
pub use service::LedgerService;
