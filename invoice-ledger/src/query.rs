//! Read-only views over the ledger
//!
//! Any identity may query, registered or not. Queries never fail: missing data
//! reads as zero, `Unregistered` or the empty invoice view.

use crate::{
    call::{Call, Reply},
    types::{Amount, Identity, InvoiceView, Role},
    Ledger,
};

impl Ledger {
    /// Role of `identity`
    pub fn role_of(&self, identity: &Identity) -> Role {
        self.registry().role_of(identity)
    }

    /// Balance of `identity`
    pub fn balance_of(&self, identity: &Identity) -> Amount {
        self.balances().balance_of(identity)
    }

    /// Most recent invoice naming `identity`: as issuer for a host, as payer
    /// for a guest. Everyone else gets the empty view.
    pub fn latest_invoice_for(&self, identity: &Identity) -> InvoiceView {
        let found = match self.role_of(identity) {
            Role::Host => self.invoices().latest_for_host(identity),
            Role::Guest => self.invoices().latest_for_guest(identity),
            Role::Unregistered | Role::Administrator => None,
        };
        found
            .map(|(_, invoice)| InvoiceView::from(invoice))
            .unwrap_or_else(InvoiceView::empty)
    }

    /// Answer a read-only call; `None` for calls that mutate
    pub fn query(&self, caller: &Identity, call: &Call) -> Option<Reply> {
        match call {
            Call::ViewBalance => Some(Reply::Balance(self.balance_of(caller))),
            Call::ViewRole => Some(Reply::Role(self.role_of(caller))),
            Call::ViewInvoice => Some(Reply::Invoice(self.latest_invoice_for(caller))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unregistered_reads_defaults() {
        let ledger = Ledger::new(Identity::new("admin"));
        let stranger = Identity::new("stranger");

        assert_eq!(ledger.role_of(&stranger), Role::Unregistered);
        assert_eq!(ledger.balance_of(&stranger), 0);
        assert!(ledger.latest_invoice_for(&stranger).is_empty());
    }

    #[test]
    fn test_administrator_sees_empty_invoice() {
        let ledger = Ledger::new(Identity::new("admin"));
        assert!(ledger.latest_invoice_for(&Identity::new("admin")).is_empty());
    }

    #[test]
    fn test_host_without_invoices_sees_empty_view() {
        let mut ledger = Ledger::new(Identity::new("admin"));
        let host = Identity::new("alice");
        ledger.register_host(&host).unwrap();
        assert_eq!(ledger.latest_invoice_for(&host), InvoiceView::empty());
    }

    #[test]
    fn test_query_ignores_mutating_calls() {
        let ledger = Ledger::new(Identity::new("admin"));
        assert!(ledger
            .query(&Identity::new("admin"), &Call::RegisterHost)
            .is_none());
        assert_eq!(
            ledger.query(&Identity::new("admin"), &Call::ViewRole),
            Some(Reply::Role(Role::Administrator))
        );
    }
}
