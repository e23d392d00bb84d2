//! Append-only invoice log
//!
//! Slot 0 holds an all-zero placeholder so that index 0 never names a real
//! invoice. Invoices are never removed; only `remaining_amount` changes.
//!
//! Alongside the log, `latest` maps every host and guest to the position of the
//! newest invoice that names it. Each append updates both sides, so a lookup
//! through the map returns what a backward scan of the log would return.

use crate::{
    types::{Amount, Identity, Invoice, InvoiceIndex},
    Error, Result,
};
use std::collections::HashMap;

/// Invoice log with latest-invoice index
#[derive(Debug, Clone)]
pub struct InvoiceLog {
    entries: Vec<Invoice>,
    latest: HashMap<Identity, InvoiceIndex>,
}

impl Default for InvoiceLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceLog {
    /// Log containing only the placeholder
    pub fn new() -> Self {
        Self {
            entries: vec![Invoice::placeholder()],
            latest: HashMap::new(),
        }
    }

    /// Number of real invoices (placeholder excluded)
    pub fn len(&self) -> usize {
        self.entries.len() - 1
    }

    /// No invoice issued yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index the next appended invoice will receive
    pub fn next_index(&self) -> InvoiceIndex {
        self.entries.len()
    }

    /// Invoice at `index`; `None` for the placeholder or out of range
    pub fn get(&self, index: InvoiceIndex) -> Option<&Invoice> {
        if index == 0 {
            return None;
        }
        self.entries.get(index)
    }

    /// Real invoices with their indices, oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (InvoiceIndex, &Invoice)> + '_ {
        self.entries.iter().enumerate().skip(1)
    }

    /// Newest invoice issued by `host`
    pub fn latest_for_host(&self, host: &Identity) -> Option<(InvoiceIndex, &Invoice)> {
        self.latest_matching(host, |invoice| invoice.host == *host)
    }

    /// Newest invoice addressed to `guest`
    pub fn latest_for_guest(&self, guest: &Identity) -> Option<(InvoiceIndex, &Invoice)> {
        self.latest_matching(guest, |invoice| invoice.guest == *guest)
    }

    fn latest_matching<F>(&self, identity: &Identity, matches: F) -> Option<(InvoiceIndex, &Invoice)>
    where
        F: Fn(&Invoice) -> bool,
    {
        let index = *self.latest.get(identity)?;
        let invoice = self.get(index)?;
        matches(invoice).then_some((index, invoice))
    }

    /// Newest invoice satisfying `predicate`, found by walking the log backward
    pub fn scan_latest<F>(&self, predicate: F) -> Option<(InvoiceIndex, &Invoice)>
    where
        F: Fn(&Invoice) -> bool,
    {
        self.iter().rev().find(|entry| predicate(entry.1))
    }

    /// Unpaid invoice issued by `host`, if any.
    ///
    /// A host can only issue when its previous invoice is settled, so the only
    /// invoice of a host that can still be outstanding is its newest one.
    pub fn outstanding_for_host(&self, host: &Identity) -> Option<(InvoiceIndex, &Invoice)> {
        self.latest_for_host(host)
            .filter(|(_, invoice)| invoice.is_outstanding())
    }

    /// Append a new invoice, returning its index
    pub fn append(&mut self, invoice: Invoice) -> InvoiceIndex {
        let index = self.entries.len();
        self.latest.insert(invoice.host.clone(), index);
        self.latest.insert(invoice.guest.clone(), index);
        self.entries.push(invoice);
        index
    }

    /// Reduce the remaining amount of invoice `index` by `due`
    pub fn record_payment(&mut self, index: InvoiceIndex, due: Amount) -> Result<()> {
        if index == 0 {
            return Err(Error::Journal("payment against placeholder invoice".to_string()));
        }
        let invoice = self
            .entries
            .get_mut(index)
            .ok_or_else(|| Error::Journal(format!("invoice #{} does not exist", index)))?;

        invoice.remaining_amount = invoice.remaining_amount.checked_sub(due).ok_or_else(|| {
            Error::Journal(format!(
                "payment of {} exceeds remaining {} on invoice #{}",
                due, invoice.remaining_amount, index
            ))
        })?;
        Ok(())
    }

    /// Sum of all remaining amounts, `None` if it does not fit
    pub fn total_outstanding(&self) -> Option<Amount> {
        self.iter()
            .try_fold(0 as Amount, |acc, (_, invoice)| acc.checked_add(invoice.remaining_amount))
    }
}
