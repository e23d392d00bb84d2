//! Actor-based concurrency for the ledger
//!
//! A single Tokio task owns the [`Ledger`] and its journal. Callers talk to
//! it through a cloneable [`LedgerHandle`], so every call is processed
//! atomically and in arrival order.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox               │
//! └─────────────────────┬────────────────────────────────┘
//!                       │
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │                                                       │
//! │   query ──► reply                                     │
//! │   plan ──► Storage::append ──► Ledger::apply          │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! An event reaches memory only after it is durable. A failed append leaves
//! the ledger as it was. If a durable event then fails to apply, memory no
//! longer matches the journal and the actor stops; reopening the service
//! rebuilds state from the journal.

use crate::{
    call::{Call, Reply},
    metrics::{Metrics, OUTCOME_FAILED, OUTCOME_OK, OUTCOME_REJECTED},
    types::{Amount, EventKind, Identity, InvoiceView, LedgerEvent, Role},
    Error, Ledger, Result, Storage,
};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};

/// Message sent to the ledger actor
#[derive(Debug)]
pub enum LedgerMessage {
    /// Run a call on behalf of `caller`
    Execute {
        /// Calling identity
        caller: Identity,
        /// Requested operation
        call: Call,
        /// Reply channel
        response: oneshot::Sender<Result<Reply>>,
    },

    /// Number of committed events
    JournalLen {
        /// Reply channel
        response: oneshot::Sender<Result<u64>>,
    },

    /// Journaled event by sequence number
    GetEvent {
        /// Sequence number
        sequence: u64,
        /// Reply channel
        response: oneshot::Sender<Result<LedgerEvent>>,
    },

    /// Copy of the current ledger state
    Snapshot {
        /// Reply channel
        response: oneshot::Sender<Result<Ledger>>,
    },

    /// Close the journal and stop the actor
    Shutdown {
        /// Acknowledged once storage is closed
        response: oneshot::Sender<Result<()>>,
    },
}

/// Actor that processes ledger messages
#[derive(Debug)]
pub struct LedgerActor {
    /// In-memory state
    ledger: Ledger,

    /// Journal; `None` runs the ledger in memory only
    storage: Option<Storage>,

    /// Metrics collector
    metrics: Metrics,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Set once memory and journal have diverged
    halted: bool,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        ledger: Ledger,
        storage: Option<Storage>,
        metrics: Metrics,
        mailbox: mpsc::Receiver<LedgerMessage>,
    ) -> Self {
        Self {
            ledger,
            storage,
            metrics,
            mailbox,
            halted: false,
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        while !self.halted {
            let Some(msg) = self.mailbox.recv().await else {
                break;
            };

            match msg {
                LedgerMessage::Execute {
                    caller,
                    call,
                    response,
                } => {
                    let result = self.handle_call(&caller, &call);
                    let _ = response.send(result);
                }

                LedgerMessage::JournalLen { response } => {
                    let _ = response.send(Ok(self.ledger.journal_len()));
                }

                LedgerMessage::GetEvent { sequence, response } => {
                    let result = match &self.storage {
                        Some(storage) => storage.get_event(sequence),
                        None => Err(Error::Storage(
                            "journal persistence is disabled".to_string(),
                        )),
                    };
                    let _ = response.send(result);
                }

                LedgerMessage::Snapshot { response } => {
                    let _ = response.send(Ok(self.ledger.clone()));
                }

                LedgerMessage::Shutdown { response } => {
                    let result = match self.storage.take() {
                        Some(storage) => storage.close(),
                        None => Ok(()),
                    };
                    let _ = response.send(result);
                    break;
                }
            }
        }

        tracing::info!(events = self.ledger.journal_len(), "Ledger actor stopped");
    }

    /// Handle one call and record its outcome
    fn handle_call(&mut self, caller: &Identity, call: &Call) -> Result<Reply> {
        let started = Instant::now();
        let result = self.dispatch(caller, call);
        let elapsed = started.elapsed().as_secs_f64();

        let outcome = match &result {
            Ok(_) => OUTCOME_OK,
            Err(e) if e.is_rejection() => {
                tracing::debug!(
                    caller = %caller,
                    operation = call.operation(),
                    reason = e.kind(),
                    "Call rejected: {}",
                    e
                );
                OUTCOME_REJECTED
            }
            Err(e) => {
                tracing::error!(
                    caller = %caller,
                    operation = call.operation(),
                    "Call failed: {}",
                    e
                );
                OUTCOME_FAILED
            }
        };
        self.metrics.record_call(call.operation(), outcome, elapsed);

        result
    }

    fn dispatch(&mut self, caller: &Identity, call: &Call) -> Result<Reply> {
        if let Some(reply) = self.ledger.query(caller, call) {
            return Ok(reply);
        }

        let event = self.ledger.plan(caller, call)?;
        self.commit(&event)?;

        self.metrics.record_event_committed();
        if matches!(event.kind, EventKind::InvoiceSent { .. }) {
            self.metrics.record_invoice_issued();
        }

        tracing::info!(
            caller = %caller,
            sequence = event.sequence,
            event = event.kind.name(),
            "Call committed"
        );

        Ok(Reply::Done)
    }

    /// Persist then apply a planned event
    fn commit(&mut self, event: &LedgerEvent) -> Result<()> {
        let Some(storage) = &self.storage else {
            return self.ledger.apply(event);
        };

        storage.append(event)?;

        if let Err(e) = self.ledger.apply(event) {
            // Memory is one event behind the journal; every later append would fail.
            self.halted = true;
            tracing::error!(
                sequence = event.sequence,
                event = event.kind.name(),
                "Journaled event could not be applied, stopping ledger actor: {}",
                e
            );
            return Err(Error::Journal(format!(
                "journaled event {} could not be applied: {}",
                event.sequence, e
            )));
        }

        Ok(())
    }
}

/// Handle for sending messages to the actor
#[derive(Debug, Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;

        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Run any call on behalf of `caller`
    pub async fn execute(&self, caller: Identity, call: Call) -> Result<Reply> {
        self.request(|response| LedgerMessage::Execute {
            caller,
            call,
            response,
        })
        .await
    }

    async fn execute_mutation(&self, caller: Identity, call: Call) -> Result<()> {
        match self.execute(caller, call).await? {
            Reply::Done => Ok(()),
            other => Err(unexpected_reply(other)),
        }
    }

    /// Top up the caller's balance
    pub async fn add_balance(&self, caller: Identity, amount: Amount) -> Result<()> {
        self.execute_mutation(caller, Call::AddBalance { amount })
            .await
    }

    /// Read the caller's balance
    pub async fn view_balance(&self, caller: Identity) -> Result<Amount> {
        match self.execute(caller, Call::ViewBalance).await? {
            Reply::Balance(balance) => Ok(balance),
            other => Err(unexpected_reply(other)),
        }
    }

    /// Read the caller's role
    pub async fn view_role(&self, caller: Identity) -> Result<Role> {
        match self.execute(caller, Call::ViewRole).await? {
            Reply::Role(role) => Ok(role),
            other => Err(unexpected_reply(other)),
        }
    }

    /// Register the caller as a host
    pub async fn register_host(&self, caller: Identity) -> Result<()> {
        self.execute_mutation(caller, Call::RegisterHost).await
    }

    /// Register the caller as a guest
    pub async fn register_guest(&self, caller: Identity) -> Result<()> {
        self.execute_mutation(caller, Call::RegisterGuest).await
    }

    /// Invoice `guest` from the calling host
    pub async fn send_invoice(
        &self,
        caller: Identity,
        guest: Identity,
        amount: Amount,
    ) -> Result<()> {
        self.execute_mutation(caller, Call::SendInvoice { guest, amount })
            .await
    }

    /// Read the caller's most recent invoice
    pub async fn view_invoice(&self, caller: Identity) -> Result<InvoiceView> {
        match self.execute(caller, Call::ViewInvoice).await? {
            Reply::Invoice(view) => Ok(view),
            other => Err(unexpected_reply(other)),
        }
    }

    /// Pay up to `amount` towards the caller's most recent invoice
    pub async fn pay_invoice(&self, caller: Identity, amount: Amount) -> Result<()> {
        self.execute_mutation(caller, Call::PayInvoice { amount })
            .await
    }

    /// Number of committed events
    pub async fn journal_len(&self) -> Result<u64> {
        self.request(|response| LedgerMessage::JournalLen { response })
            .await
    }

    /// Journaled event by sequence number
    pub async fn event(&self, sequence: u64) -> Result<LedgerEvent> {
        self.request(|response| LedgerMessage::GetEvent { sequence, response })
            .await
    }

    /// Copy of the current ledger state
    pub async fn snapshot(&self) -> Result<Ledger> {
        self.request(|response| LedgerMessage::Snapshot { response })
            .await
    }

    /// Close the journal and stop the actor
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|response| LedgerMessage::Shutdown { response })
            .await
    }
}

fn unexpected_reply(reply: Reply) -> Error {
    Error::Concurrency(format!("Unexpected reply from actor: {:?}", reply))
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    ledger: Ledger,
    storage: Option<Storage>,
    metrics: Metrics,
    mailbox_capacity: usize,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(mailbox_capacity); // Bounded channel for backpressure
    let actor = LedgerActor::new(ledger, storage, metrics, rx);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}
