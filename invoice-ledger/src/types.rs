//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode for the journal, JSON at the boundary)
//! - Exact integer arithmetic (credits are whole units, never fractional)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Internal credit unit. Not backed by any external asset.
pub type Amount = u64;

/// Position of an invoice in the append-only log
pub type InvoiceIndex = usize;

/// Opaque participant identity (account address, key fingerprint, etc.)
///
/// Decoding goes through [`Identity::parse`], so the null identity never
/// arrives from outside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub struct Identity(String);

impl Identity {
    /// Create new identity
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Parse an identity received from outside, rejecting the null identity
    pub fn parse(id: &str) -> crate::Result<Self> {
        let id = id.trim();
        if id.is_empty() {
            return Err(crate::Error::InvalidCall("identity must not be empty".to_string()));
        }
        Ok(Self(id.to_string()))
    }

    /// The null identity, used only by the placeholder invoice and empty views
    pub fn null() -> Self {
        Self(String::new())
    }

    /// Whether this is the null identity
    pub fn is_null(&self) -> bool {
        self.0.is_empty()
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identity {
    type Error = crate::Error;

    fn try_from(id: String) -> crate::Result<Self> {
        Self::parse(&id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "<null>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Participant role. Assigned at most once, permanently.
///
/// Crosses the wire as its discriminant; decoding an out-of-range number fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Role {
    /// Never registered
    #[default]
    Unregistered = 0,
    /// Ledger initializer
    Administrator = 1,
    /// Issues invoices
    Host = 2,
    /// Pays invoices
    Guest = 3,
}

impl Role {
    /// Whether the identity holds any role at all
    pub fn is_registered(self) -> bool {
        self != Role::Unregistered
    }
}

impl From<Role> for u8 {
    fn from(role: Role) -> Self {
        role as u8
    }
}

impl TryFrom<u8> for Role {
    type Error = crate::Error;

    fn try_from(value: u8) -> crate::Result<Self> {
        match value {
            0 => Ok(Role::Unregistered),
            1 => Ok(Role::Administrator),
            2 => Ok(Role::Host),
            3 => Ok(Role::Guest),
            other => Err(crate::Error::InvalidCall(format!("unknown role {}", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Unregistered => "Unregistered",
            Role::Administrator => "Administrator",
            Role::Host => "Host",
            Role::Guest => "Guest",
        };
        write!(f, "{}", name)
    }
}

/// A request for payment from a host to a guest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invoice {
    /// Amount originally requested
    pub requested_amount: Amount,

    /// Amount still owed; only ever decreases
    pub remaining_amount: Amount,

    /// Issuing host
    pub host: Identity,

    /// Invoiced guest
    pub guest: Identity,
}

impl Invoice {
    /// New unpaid invoice
    pub fn new(host: Identity, guest: Identity, amount: Amount) -> Self {
        Self {
            requested_amount: amount,
            remaining_amount: amount,
            host,
            guest,
        }
    }

    /// All-zero record occupying log slot 0
    pub fn placeholder() -> Self {
        Self::new(Identity::null(), Identity::null(), 0)
    }

    /// Fully paid
    pub fn is_settled(&self) -> bool {
        self.remaining_amount == 0
    }

    /// Still owes something
    pub fn is_outstanding(&self) -> bool {
        !self.is_settled()
    }
}

/// Public view of an invoice: `(amount, remaining, host, guest)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceView {
    /// Requested amount
    pub amount: Amount,
    /// Remaining amount
    pub remaining: Amount,
    /// Issuing host
    #[serde(deserialize_with = "deserialize_party")]
    pub host: Identity,
    /// Invoiced guest
    #[serde(deserialize_with = "deserialize_party")]
    pub guest: Identity,
}

/// View parties may be null (the empty view), unlike call arguments
fn deserialize_party<'de, D>(deserializer: D) -> std::result::Result<Identity, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let id = String::deserialize(deserializer)?;
    if id.is_empty() {
        return Ok(Identity::null());
    }
    Identity::parse(&id).map_err(serde::de::Error::custom)
}

impl InvoiceView {
    /// Build a view from its parts
    pub fn new(amount: Amount, remaining: Amount, host: Identity, guest: Identity) -> Self {
        Self {
            amount,
            remaining,
            host,
            guest,
        }
    }

    /// The "not found" sentinel `(0, 0, null, null)`
    pub fn empty() -> Self {
        Self::new(0, 0, Identity::null(), Identity::null())
    }

    /// Whether this is the "not found" sentinel
    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }
}

impl From<&Invoice> for InvoiceView {
    fn from(invoice: &Invoice) -> Self {
        Self::new(
            invoice.requested_amount,
            invoice.remaining_amount,
            invoice.host.clone(),
            invoice.guest.clone(),
        )
    }
}

/// Committed state transition, the unit of the journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in the journal, starting at 0 with `Initialized`
    pub sequence: u64,

    /// Unique event ID (UUIDv7 for time-ordering)
    pub event_id: Uuid,

    /// When the transition was committed
    pub recorded_at: DateTime<Utc>,

    /// Identity that made the call
    pub caller: Identity,

    /// What happened
    pub kind: EventKind,
}

impl LedgerEvent {
    /// Stamp a new event
    pub fn new(sequence: u64, caller: Identity, kind: EventKind) -> Self {
        Self {
            sequence,
            event_id: Uuid::now_v7(),
            recorded_at: Utc::now(),
            caller,
            kind,
        }
    }
}

/// Event type (state transition)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    /// Ledger created; caller is the administrator
    Initialized {
        /// Administrator identity
        administrator: Identity,
    },
    /// Caller took a role
    RoleRegistered {
        /// Host or Guest
        role: Role,
    },
    /// Caller topped up its own balance
    BalanceAdded {
        /// Credited amount
        amount: Amount,
    },
    /// Caller (a host) issued an invoice
    InvoiceSent {
        /// Log position of the new invoice
        index: InvoiceIndex,
        /// Invoiced guest
        guest: Identity,
        /// Requested amount
        amount: Amount,
    },
    /// Caller (a guest) paid towards its latest invoice
    InvoicePaid {
        /// Log position of the invoice
        index: InvoiceIndex,
        /// Host credited
        host: Identity,
        /// Amount actually moved
        due: Amount,
    },
}

impl EventKind {
    /// Short label for logs
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Initialized { .. } => "initialized",
            EventKind::RoleRegistered { .. } => "role_registered",
            EventKind::BalanceAdded { .. } => "balance_added",
            EventKind::InvoiceSent { .. } => "invoice_sent",
            EventKind::InvoicePaid { .. } => "invoice_paid",
        }
    }
}
