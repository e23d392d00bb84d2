//! External call surface
//!
//! One `Call` variant per public operation. The caller identity is not part of
//! the call; it is supplied by whoever hosts the ledger.

use crate::types::{Amount, Identity, InvoiceView, Role};
use serde::{Deserialize, Serialize};

/// Operation requested by a caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Call {
    /// Top up the caller's own balance
    AddBalance {
        /// Credit to add
        amount: Amount,
    },
    /// Read the caller's balance
    ViewBalance,
    /// Read the caller's role
    ViewRole,
    /// Become a host
    RegisterHost,
    /// Become a guest
    RegisterGuest,
    /// Invoice a guest
    SendInvoice {
        /// Guest to invoice
        guest: Identity,
        /// Requested amount
        amount: Amount,
    },
    /// Read the caller's most recent invoice
    ViewInvoice,
    /// Pay towards the caller's most recent invoice
    PayInvoice {
        /// Maximum amount to pay
        amount: Amount,
    },
}

impl Call {
    /// Operation name, matching the wire tag
    pub fn operation(&self) -> &'static str {
        match self {
            Call::AddBalance { .. } => "add_balance",
            Call::ViewBalance => "view_balance",
            Call::ViewRole => "view_role",
            Call::RegisterHost => "register_host",
            Call::RegisterGuest => "register_guest",
            Call::SendInvoice { .. } => "send_invoice",
            Call::ViewInvoice => "view_invoice",
            Call::PayInvoice { .. } => "pay_invoice",
        }
    }
}

/// Result of a successful call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    /// Mutation committed
    Done,
    /// Caller's balance
    Balance(Amount),
    /// Caller's role
    Role(Role),
    /// Caller's most recent invoice, or the empty view
    Invoice(InvoiceView),
}
