//! Ledger service bootstrap
//!
//! Opens the journal, rebuilds or initializes the ledger and starts the actor.

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    metrics::Metrics,
    types::Identity,
    Config, Error, Ledger, Result, Storage,
};

/// Running ledger: the actor plus the resources shared with its host
#[derive(Debug, Clone)]
pub struct LedgerService {
    /// Configuration the service was opened with
    config: Config,

    /// Handle to the ledger actor
    handle: LedgerHandle,

    /// Metrics collector
    metrics: Metrics,
}

impl LedgerService {
    /// Open the ledger described by `config`.
    ///
    /// With storage enabled an existing journal is replayed; an empty one is
    /// started with the `Initialized` event. A journal created for a
    /// different administrator is refused.
    pub async fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let administrator = Identity::parse(&config.administrator)?;

        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        let (ledger, storage) = if config.storage.enabled {
            let storage = Storage::open(&config)?;
            let ledger = Self::recover(&storage, administrator)?;
            let stats = storage.stats()?;
            tracing::info!(
                journal_len = stats.journal_len,
                live_data_bytes = stats.live_data_bytes,
                "Journal loaded"
            );
            (ledger, Some(storage))
        } else {
            tracing::warn!("Journal persistence disabled; ledger state lives in memory only");
            (Ledger::new(administrator), None)
        };

        tracing::info!(
            service = %config.service_name,
            version = %config.service_version,
            administrator = %ledger.administrator(),
            events = ledger.journal_len(),
            "Ledger opened"
        );

        let handle = spawn_ledger_actor(ledger, storage, metrics.clone(), config.mailbox_capacity);

        Ok(Self {
            config,
            handle,
            metrics,
        })
    }

    fn recover(storage: &Storage, administrator: Identity) -> Result<Ledger> {
        let events = storage.load_journal()?;

        if events.is_empty() {
            let (ledger, init) = Ledger::initialize(administrator);
            storage.append(&init)?;
            tracing::info!(administrator = %ledger.administrator(), "Initialized new journal");
            return Ok(ledger);
        }

        let ledger = Ledger::replay(events)?;
        if *ledger.administrator() != administrator {
            return Err(Error::Config(format!(
                "journal belongs to administrator {}, configured {}",
                ledger.administrator(),
                administrator
            )));
        }
        Ok(ledger)
    }

    /// Handle for issuing calls
    pub fn handle(&self) -> LedgerHandle {
        self.handle.clone()
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Stop the actor and close the journal
    pub async fn shutdown(self) -> Result<()> {
        self.handle.shutdown().await?;
        tracing::info!("Ledger service stopped");
        Ok(())
    }
}
