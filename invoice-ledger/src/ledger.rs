//! The ledger aggregate
//!
//! `Ledger` owns the role registry, the balances and the invoice log. Every
//! mutation goes through two steps:
//!
//! 1. **plan**: validate the call against current state and describe the
//!    transition as a [`LedgerEvent`]. Nothing is written.
//! 2. **apply**: perform the transition. This is the only code path that
//!    mutates state, and it is also how a journal is replayed.
//!
//! A host that persists events writes the planned event first and applies it
//! second, so a failed write leaves memory untouched.
//!
//! # Example
//!
//! ```
//! use invoice_ledger::{Identity, InvoiceView, Ledger};
//!
//! let admin = Identity::new("admin");
//! let host = Identity::new("alice");
//! let guest = Identity::new("bob");
//!
//! let mut ledger = Ledger::new(admin);
//! ledger.register_host(&host).unwrap();
//! ledger.register_guest(&guest).unwrap();
//! ledger.add_balance(&guest, 100).unwrap();
//! ledger.send_invoice(&host, &guest, 80).unwrap();
//! ledger.pay_invoice(&guest, 50).unwrap();
//!
//! assert_eq!(ledger.balance_of(&guest), 50);
//! assert_eq!(
//!     ledger.latest_invoice_for(&host),
//!     InvoiceView::new(80, 30, host.clone(), guest.clone())
//! );
//! ```

use crate::{
    balances::BalanceLedger,
    call::{Call, Reply},
    invoices::InvoiceLog,
    registry::RoleRegistry,
    types::{Amount, EventKind, Identity, Invoice, LedgerEvent, Role},
    Error, Result,
};

/// Bookkeeping state for roles, balances and invoices
#[derive(Debug, Clone)]
pub struct Ledger {
    /// Identity granted the administrator role at creation
    administrator: Identity,

    /// Role assignments
    registry: RoleRegistry,

    /// Credit balances
    balances: BalanceLedger,

    /// Append-only invoice log
    invoices: InvoiceLog,

    /// Sequence number the next committed event receives
    next_sequence: u64,
}

impl Ledger {
    /// Create a ledger administered by `administrator`
    pub fn new(administrator: Identity) -> Self {
        Self::initialize(administrator).0
    }

    /// Create a ledger and return the `Initialized` event that opens its journal
    pub fn initialize(administrator: Identity) -> (Self, LedgerEvent) {
        let ledger = Self {
            administrator: administrator.clone(),
            registry: RoleRegistry::with_administrator(&administrator),
            balances: BalanceLedger::new(),
            invoices: InvoiceLog::new(),
            next_sequence: 1,
        };
        let event = LedgerEvent::new(
            0,
            administrator.clone(),
            EventKind::Initialized { administrator },
        );
        (ledger, event)
    }

    /// Rebuild a ledger from its journal.
    ///
    /// The journal must start with `Initialized` at sequence 0 and contain no
    /// gaps. Each event is re-validated as it is applied.
    pub fn replay<I>(events: I) -> Result<Self>
    where
        I: IntoIterator<Item = LedgerEvent>,
    {
        let mut ledger = Self::blank();
        for event in events {
            ledger.apply(&event).map_err(|e| match e {
                Error::Journal(msg) => Error::Journal(msg),
                other => Error::Journal(format!(
                    "event {} ({}) cannot be replayed: {}",
                    event.sequence,
                    event.kind.name(),
                    other
                )),
            })?;
        }
        if ledger.next_sequence == 0 {
            return Err(Error::Journal("journal is empty".to_string()));
        }
        tracing::info!(
            events = ledger.next_sequence,
            invoices = ledger.invoices.len(),
            "Ledger replayed from journal"
        );
        Ok(ledger)
    }

    fn blank() -> Self {
        Self {
            administrator: Identity::null(),
            registry: RoleRegistry::new(),
            balances: BalanceLedger::new(),
            invoices: InvoiceLog::new(),
            next_sequence: 0,
        }
    }

    // Accessors

    /// Administrator identity
    pub fn administrator(&self) -> &Identity {
        &self.administrator
    }

    /// Number of events committed so far, including `Initialized`
    pub fn journal_len(&self) -> u64 {
        self.next_sequence
    }

    /// Role registry
    pub fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    /// Balance ledger
    pub fn balances(&self) -> &BalanceLedger {
        &self.balances
    }

    /// Invoice log
    pub fn invoices(&self) -> &InvoiceLog {
        &self.invoices
    }

    // Operations

    /// Register `caller` as a host
    pub fn register_host(&mut self, caller: &Identity) -> Result<LedgerEvent> {
        let kind = self.plan_register(caller, Role::Host)?;
        self.commit(caller, kind)
    }

    /// Register `caller` as a guest
    pub fn register_guest(&mut self, caller: &Identity) -> Result<LedgerEvent> {
        let kind = self.plan_register(caller, Role::Guest)?;
        self.commit(caller, kind)
    }

    /// Credit `amount` to the caller's own balance
    pub fn add_balance(&mut self, caller: &Identity, amount: Amount) -> Result<LedgerEvent> {
        let kind = self.plan_add_balance(caller, amount)?;
        self.commit(caller, kind)
    }

    /// Issue an invoice from `caller` (a host) to `guest`
    pub fn send_invoice(
        &mut self,
        caller: &Identity,
        guest: &Identity,
        amount: Amount,
    ) -> Result<LedgerEvent> {
        let kind = self.plan_send_invoice(caller, guest, amount)?;
        self.commit(caller, kind)
    }

    /// Pay up to `amount` towards the caller's most recent invoice
    pub fn pay_invoice(&mut self, caller: &Identity, amount: Amount) -> Result<LedgerEvent> {
        let kind = self.plan_pay_invoice(caller, amount)?;
        self.commit(caller, kind)
    }

    /// Run any call in-process
    pub fn execute(&mut self, caller: &Identity, call: &Call) -> Result<Reply> {
        if let Some(reply) = self.query(caller, call) {
            return Ok(reply);
        }
        let event = self.plan(caller, call)?;
        self.apply(&event)?;
        Ok(Reply::Done)
    }

    // Planning

    /// Validate a mutating call and describe its effect without applying it
    pub fn plan(&self, caller: &Identity, call: &Call) -> Result<LedgerEvent> {
        let kind = match call {
            Call::AddBalance { amount } => self.plan_add_balance(caller, *amount)?,
            Call::RegisterHost => self.plan_register(caller, Role::Host)?,
            Call::RegisterGuest => self.plan_register(caller, Role::Guest)?,
            Call::SendInvoice { guest, amount } => {
                self.plan_send_invoice(caller, guest, *amount)?
            }
            Call::PayInvoice { amount } => self.plan_pay_invoice(caller, *amount)?,
            Call::ViewBalance | Call::ViewRole | Call::ViewInvoice => {
                return Err(Error::InvalidCall(format!(
                    "{} does not change state",
                    call.operation()
                )));
            }
        };
        Ok(LedgerEvent::new(self.next_sequence, caller.clone(), kind))
    }

    fn plan_register(&self, caller: &Identity, role: Role) -> Result<EventKind> {
        self.registry.ensure_assignable(caller)?;
        Ok(EventKind::RoleRegistered { role })
    }

    fn plan_add_balance(&self, caller: &Identity, amount: Amount) -> Result<EventKind> {
        let role = self.registry.role_of(caller);
        if !role.is_registered() {
            return Err(Error::Unauthorized {
                caller: caller.clone(),
                role,
            });
        }
        self.balances.checked_credit(caller, amount)?;
        Ok(EventKind::BalanceAdded { amount })
    }

    fn plan_send_invoice(
        &self,
        caller: &Identity,
        guest: &Identity,
        amount: Amount,
    ) -> Result<EventKind> {
        self.registry.ensure_role(caller, Role::Host)?;
        self.registry.ensure_role(guest, Role::Guest)?;

        if let Some((index, invoice)) = self.invoices.outstanding_for_host(caller) {
            return Err(Error::OutstandingInvoiceExists {
                host: caller.clone(),
                index,
                remaining: invoice.remaining_amount,
            });
        }

        Ok(EventKind::InvoiceSent {
            index: self.invoices.next_index(),
            guest: guest.clone(),
            amount,
        })
    }

    fn plan_pay_invoice(&self, caller: &Identity, amount: Amount) -> Result<EventKind> {
        self.registry.ensure_role(caller, Role::Guest)?;
        self.balances.checked_debit(caller, amount)?;

        let (index, invoice) = self
            .invoices
            .latest_for_guest(caller)
            .ok_or_else(|| Error::NoInvoiceFound(caller.clone()))?;

        let due = amount.min(invoice.remaining_amount);
        self.balances.checked_credit(&invoice.host, due)?;

        Ok(EventKind::InvoicePaid {
            index,
            host: invoice.host.clone(),
            due,
        })
    }

    // Applying

    /// Apply a committed event.
    ///
    /// Re-checks every rule the planner checked, so an event that does not fit
    /// the current state is refused and nothing changes.
    pub fn apply(&mut self, event: &LedgerEvent) -> Result<()> {
        if event.sequence != self.next_sequence {
            return Err(Error::Journal(format!(
                "expected event {}, got {}",
                self.next_sequence, event.sequence
            )));
        }

        let caller = &event.caller;
        match &event.kind {
            EventKind::Initialized { administrator } => {
                if self.next_sequence != 0 {
                    return Err(Error::Journal(
                        "ledger is already initialized".to_string(),
                    ));
                }
                if administrator != caller {
                    return Err(Error::Journal(format!(
                        "initializer {} is not administrator {}",
                        caller, administrator
                    )));
                }
                self.registry.assign(administrator, Role::Administrator)?;
                self.administrator = administrator.clone();
            }
            _ if self.next_sequence == 0 => {
                return Err(Error::Journal(
                    "journal must begin with Initialized".to_string(),
                ));
            }
            EventKind::RoleRegistered { role } => {
                if !matches!(role, Role::Host | Role::Guest) {
                    return Err(Error::InvalidCall(format!("{} is not self-assignable", role)));
                }
                self.registry.assign(caller, *role)?;
            }
            EventKind::BalanceAdded { amount } => {
                self.plan_add_balance(caller, *amount)?;
                self.balances.credit(caller, *amount)?;
            }
            EventKind::InvoiceSent {
                index,
                guest,
                amount,
            } => {
                self.plan_send_invoice(caller, guest, *amount)?;
                let expected = self.invoices.next_index();
                if *index != expected {
                    return Err(Error::Journal(format!(
                        "invoice index {} does not match log position {}",
                        index, expected
                    )));
                }
                self.invoices
                    .append(Invoice::new(caller.clone(), guest.clone(), *amount));
            }
            EventKind::InvoicePaid { index, host, due } => {
                self.registry.ensure_role(caller, Role::Guest)?;
                let (latest, invoice) = self
                    .invoices
                    .latest_for_guest(caller)
                    .ok_or_else(|| Error::NoInvoiceFound(caller.clone()))?;
                if latest != *index || invoice.host != *host || invoice.remaining_amount < *due {
                    return Err(Error::Journal(format!(
                        "payment of {} does not fit invoice #{}",
                        due, index
                    )));
                }
                self.balances.transfer(caller, host, *due)?;
                self.invoices.record_payment(*index, *due)?;
            }
        }

        self.next_sequence += 1;
        Ok(())
    }

    fn commit(&mut self, caller: &Identity, kind: EventKind) -> Result<LedgerEvent> {
        let event = LedgerEvent::new(self.next_sequence, caller.clone(), kind);
        self.apply(&event)?;

        tracing::info!(
            caller = %event.caller,
            sequence = event.sequence,
            event = event.kind.name(),
            "Transition committed"
        );

        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InvoiceView;

    fn id(s: &str) -> Identity {
        Identity::new(s)
    }

    fn setup() -> (Ledger, Identity, Identity) {
        let mut ledger = Ledger::new(id("admin"));
        let host = id("alice");
        let guest = id("bob");
        ledger.register_host(&host).unwrap();
        ledger.register_guest(&guest).unwrap();
        (ledger, host, guest)
    }

    #[test]
    fn test_initializer_is_administrator() {
        let (ledger, event) = Ledger::initialize(id("admin"));
        assert_eq!(ledger.role_of(&id("admin")), Role::Administrator);
        assert_eq!(ledger.administrator(), &id("admin"));
        assert_eq!(event.sequence, 0);
        assert_eq!(ledger.journal_len(), 1);
        assert!(ledger.invoices().is_empty());
    }

    #[test]
    fn test_register_twice_fails_without_change() {
        let (mut ledger, host, guest) = setup();
        let before = ledger.journal_len();

        assert!(matches!(
            ledger.register_guest(&host),
            Err(Error::AlreadyRegistered { role: Role::Host, .. })
        ));
        assert!(matches!(
            ledger.register_host(&guest),
            Err(Error::AlreadyRegistered { role: Role::Guest, .. })
        ));
        assert!(matches!(
            ledger.register_host(&id("admin")),
            Err(Error::AlreadyRegistered { role: Role::Administrator, .. })
        ));

        assert_eq!(ledger.role_of(&host), Role::Host);
        assert_eq!(ledger.role_of(&guest), Role::Guest);
        assert_eq!(ledger.journal_len(), before);
    }

    #[test]
    fn test_null_identity_cannot_register() {
        let (mut ledger, _, _) = setup();
        let before = ledger.journal_len();

        assert!(matches!(
            ledger.register_host(&Identity::null()),
            Err(Error::InvalidCall(_))
        ));
        assert!(matches!(
            ledger.plan(&Identity::null(), &Call::RegisterGuest),
            Err(Error::InvalidCall(_))
        ));
        assert_eq!(ledger.role_of(&Identity::null()), Role::Unregistered);
        assert_eq!(ledger.journal_len(), before);
    }

    #[test]
    fn test_add_balance_requires_registration() {
        let (mut ledger, host, _) = setup();
        let stranger = id("carol");

        assert!(matches!(
            ledger.add_balance(&stranger, 10),
            Err(Error::Unauthorized { role: Role::Unregistered, .. })
        ));
        assert_eq!(ledger.balance_of(&stranger), 0);

        ledger.add_balance(&host, 10).unwrap();
        ledger.add_balance(&id("admin"), 10).unwrap();
        assert_eq!(ledger.balance_of(&host), 10);
        assert_eq!(ledger.balance_of(&id("admin")), 10);
    }

    #[test]
    fn test_add_balance_overflow() {
        let (mut ledger, _, guest) = setup();
        ledger.add_balance(&guest, Amount::MAX).unwrap();
        assert!(matches!(
            ledger.add_balance(&guest, 1),
            Err(Error::Overflow { .. })
        ));
        assert_eq!(ledger.balance_of(&guest), Amount::MAX);
    }

    #[test]
    fn test_send_invoice_role_checks() {
        let (mut ledger, host, guest) = setup();
        let other_host = id("dave");
        ledger.register_host(&other_host).unwrap();

        // Guest cannot invoice.
        assert!(matches!(
            ledger.send_invoice(&guest, &guest, 10),
            Err(Error::RoleMismatch { expected: Role::Host, .. })
        ));
        // Target must be a guest.
        assert!(matches!(
            ledger.send_invoice(&host, &other_host, 10),
            Err(Error::RoleMismatch { expected: Role::Guest, actual: Role::Host, .. })
        ));
        assert!(matches!(
            ledger.send_invoice(&host, &id("admin"), 10),
            Err(Error::RoleMismatch { expected: Role::Guest, .. })
        ));
        assert!(ledger.invoices().is_empty());
    }

    #[test]
    fn test_send_invoice_sets_latest_for_both_parties() {
        let (mut ledger, host, guest) = setup();
        ledger.send_invoice(&host, &guest, 80).unwrap();

        let expected = InvoiceView::new(80, 80, host.clone(), guest.clone());
        assert_eq!(ledger.latest_invoice_for(&host), expected);
        assert_eq!(ledger.latest_invoice_for(&guest), expected);
    }

    #[test]
    fn test_one_outstanding_invoice_per_host() {
        let (mut ledger, host, guest) = setup();
        ledger.send_invoice(&host, &guest, 80).unwrap();

        let err = ledger.send_invoice(&host, &guest, 10).unwrap_err();
        assert!(matches!(
            err,
            Error::OutstandingInvoiceExists { index: 1, remaining: 80, .. }
        ));
        assert_eq!(ledger.invoices().len(), 1);
    }

    #[test]
    fn test_zero_amount_invoice_does_not_block() {
        let (mut ledger, host, guest) = setup();
        ledger.send_invoice(&host, &guest, 0).unwrap();
        ledger.send_invoice(&host, &guest, 5).unwrap();
        assert_eq!(ledger.invoices().len(), 2);
    }

    #[test]
    fn test_pay_invoice_preconditions_in_order() {
        let (mut ledger, host, guest) = setup();

        // Host cannot pay.
        assert!(matches!(
            ledger.pay_invoice(&host, 0),
            Err(Error::RoleMismatch { expected: Role::Guest, .. })
        ));
        // Balance is checked before the invoice lookup.
        assert!(matches!(
            ledger.pay_invoice(&guest, 1),
            Err(Error::InsufficientBalance { balance: 0, requested: 1, .. })
        ));
        assert!(matches!(
            ledger.pay_invoice(&guest, 0),
            Err(Error::NoInvoiceFound(_))
        ));
    }

    #[test]
    fn test_pay_invoice_charges_at_most_remaining() {
        let (mut ledger, host, guest) = setup();
        ledger.add_balance(&guest, 100).unwrap();
        ledger.send_invoice(&host, &guest, 30).unwrap();

        let event = ledger.pay_invoice(&guest, 50).unwrap();
        assert!(matches!(event.kind, EventKind::InvoicePaid { due: 30, index: 1, .. }));

        assert_eq!(ledger.balance_of(&guest), 70);
        assert_eq!(ledger.balance_of(&host), 30);
        assert_eq!(ledger.latest_invoice_for(&guest).remaining, 0);
    }

    #[test]
    fn test_pay_zero_is_noop_success() {
        let (mut ledger, host, guest) = setup();
        ledger.add_balance(&guest, 100).unwrap();
        ledger.send_invoice(&host, &guest, 80).unwrap();

        ledger.pay_invoice(&guest, 0).unwrap();
        assert_eq!(ledger.balance_of(&guest), 100);
        assert_eq!(ledger.balance_of(&host), 0);
        assert_eq!(ledger.latest_invoice_for(&guest).remaining, 80);
    }

    #[test]
    fn test_pay_settled_invoice_moves_nothing() {
        let (mut ledger, host, guest) = setup();
        ledger.add_balance(&guest, 100).unwrap();
        ledger.send_invoice(&host, &guest, 10).unwrap();
        ledger.pay_invoice(&guest, 10).unwrap();

        ledger.pay_invoice(&guest, 40).unwrap();
        assert_eq!(ledger.balance_of(&guest), 90);
        assert_eq!(ledger.balance_of(&host), 10);
    }

    #[test]
    fn test_pay_overflowing_host_balance_is_rejected() {
        let (mut ledger, host, guest) = setup();
        ledger.add_balance(&host, Amount::MAX).unwrap();
        ledger.add_balance(&guest, 5).unwrap();
        ledger.send_invoice(&host, &guest, 5).unwrap();

        assert!(matches!(
            ledger.pay_invoice(&guest, 5),
            Err(Error::Overflow { .. })
        ));
        assert_eq!(ledger.balance_of(&guest), 5);
        assert_eq!(ledger.latest_invoice_for(&guest).remaining, 5);
    }

    #[test]
    fn test_guest_pays_latest_invoice_only() {
        let (mut ledger, host, guest) = setup();
        let second_host = id("erin");
        ledger.register_host(&second_host).unwrap();
        ledger.add_balance(&guest, 100).unwrap();

        ledger.send_invoice(&host, &guest, 20).unwrap();
        ledger.send_invoice(&second_host, &guest, 30).unwrap();
        ledger.pay_invoice(&guest, 100).unwrap();

        assert_eq!(ledger.balance_of(&second_host), 30);
        assert_eq!(ledger.balance_of(&host), 0);
        assert_eq!(ledger.latest_invoice_for(&host).remaining, 20);
    }

    #[test]
    fn test_execute_dispatches_calls() {
        let mut ledger = Ledger::new(id("admin"));
        let host = id("alice");
        let guest = id("bob");

        assert_eq!(ledger.execute(&host, &Call::RegisterHost).unwrap(), Reply::Done);
        assert_eq!(ledger.execute(&guest, &Call::RegisterGuest).unwrap(), Reply::Done);
        ledger
            .execute(&guest, &Call::AddBalance { amount: 40 })
            .unwrap();
        ledger
            .execute(
                &host,
                &Call::SendInvoice {
                    guest: guest.clone(),
                    amount: 25,
                },
            )
            .unwrap();
        ledger
            .execute(&guest, &Call::PayInvoice { amount: 25 })
            .unwrap();

        assert_eq!(ledger.execute(&guest, &Call::ViewBalance).unwrap(), Reply::Balance(15));
        assert_eq!(ledger.execute(&host, &Call::ViewRole).unwrap(), Reply::Role(Role::Host));
        assert_eq!(
            ledger.execute(&host, &Call::ViewInvoice).unwrap(),
            Reply::Invoice(InvoiceView::new(25, 0, host.clone(), guest.clone()))
        );
    }

    #[test]
    fn test_plan_does_not_mutate() {
        let (ledger, host, _) = setup();
        let event = ledger.plan(&host, &Call::AddBalance { amount: 7 }).unwrap();
        assert_eq!(event.sequence, ledger.journal_len());
        assert_eq!(ledger.balance_of(&host), 0);
        assert!(ledger.plan(&host, &Call::ViewBalance).is_err());
    }

    #[test]
    fn test_replay_reproduces_state() {
        let (mut ledger, event0) = Ledger::initialize(id("admin"));
        let host = id("alice");
        let guest = id("bob");
        let mut journal = vec![event0];

        journal.push(ledger.register_host(&host).unwrap());
        journal.push(ledger.register_guest(&guest).unwrap());
        journal.push(ledger.add_balance(&guest, 100).unwrap());
        journal.push(ledger.send_invoice(&host, &guest, 80).unwrap());
        journal.push(ledger.pay_invoice(&guest, 50).unwrap());

        let replayed = Ledger::replay(journal).unwrap();
        assert_eq!(replayed.journal_len(), ledger.journal_len());
        assert_eq!(replayed.balance_of(&guest), 50);
        assert_eq!(replayed.balance_of(&host), 50);
        assert_eq!(replayed.latest_invoice_for(&host), ledger.latest_invoice_for(&host));
    }

    #[test]
    fn test_replay_rejects_bad_journals() {
        assert!(matches!(Ledger::replay(Vec::new()), Err(Error::Journal(_))));

        let (_, init) = Ledger::initialize(id("admin"));
        let stray = LedgerEvent::new(
            0,
            id("alice"),
            EventKind::RoleRegistered { role: Role::Host },
        );
        assert!(matches!(Ledger::replay(vec![stray]), Err(Error::Journal(_))));

        let gap = LedgerEvent::new(
            2,
            id("alice"),
            EventKind::RoleRegistered { role: Role::Host },
        );
        assert!(matches!(
            Ledger::replay(vec![init.clone(), gap]),
            Err(Error::Journal(_))
        ));

        let unregistered_topup = LedgerEvent::new(
            1,
            id("bob"),
            EventKind::BalanceAdded { amount: 5 },
        );
        assert!(matches!(
            Ledger::replay(vec![init, unregistered_topup]),
            Err(Error::Journal(_))
        ));
    }
}
