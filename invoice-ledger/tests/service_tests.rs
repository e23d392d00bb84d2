//! End-to-end tests through the service and its actor

use invoice_ledger::{Config, Error, Identity, InvoiceView, LedgerService, Role};
use tempfile::TempDir;

fn id(s: &str) -> Identity {
    Identity::new(s)
}

fn persistent_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.data_dir = temp_dir.path().join("ledger");
    config.storage.sync_writes = false;
    (config, temp_dir)
}

fn in_memory_config() -> Config {
    let mut config = Config::default();
    config.storage.enabled = false;
    config
}

#[tokio::test]
async fn test_host_guest_scenario() {
    let service = LedgerService::open(in_memory_config()).await.unwrap();
    let ledger = service.handle();
    let (host, guest) = (id("alice"), id("bob"));

    ledger.register_host(host.clone()).await.unwrap();
    ledger.register_guest(guest.clone()).await.unwrap();
    ledger.add_balance(guest.clone(), 100).await.unwrap();

    ledger
        .send_invoice(host.clone(), guest.clone(), 80)
        .await
        .unwrap();
    assert_eq!(
        ledger.view_invoice(guest.clone()).await.unwrap(),
        InvoiceView::new(80, 80, host.clone(), guest.clone())
    );

    let err = ledger
        .send_invoice(host.clone(), guest.clone(), 5)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::OutstandingInvoiceExists { .. }));

    ledger.pay_invoice(guest.clone(), 50).await.unwrap();
    assert_eq!(ledger.view_balance(guest.clone()).await.unwrap(), 50);
    assert_eq!(ledger.view_invoice(host.clone()).await.unwrap().remaining, 30);

    // Only the remaining 30 is charged
    ledger.pay_invoice(guest.clone(), 50).await.unwrap();
    assert_eq!(ledger.view_balance(guest.clone()).await.unwrap(), 20);
    assert_eq!(ledger.view_balance(host.clone()).await.unwrap(), 80);
    assert_eq!(ledger.view_invoice(host.clone()).await.unwrap().remaining, 0);

    ledger
        .send_invoice(host.clone(), guest.clone(), 10)
        .await
        .unwrap();
    assert_eq!(
        ledger.view_invoice(host.clone()).await.unwrap(),
        InvoiceView::new(10, 10, host.clone(), guest.clone())
    );

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unregistered_caller() {
    let service = LedgerService::open(in_memory_config()).await.unwrap();
    let ledger = service.handle();
    let stranger = id("stranger");

    assert!(matches!(
        ledger.add_balance(stranger.clone(), 10).await,
        Err(Error::Unauthorized { .. })
    ));
    assert_eq!(ledger.view_balance(stranger.clone()).await.unwrap(), 0);
    assert_eq!(
        ledger.view_role(stranger.clone()).await.unwrap(),
        Role::Unregistered
    );
    assert!(ledger.view_invoice(stranger.clone()).await.unwrap().is_empty());
    assert!(matches!(
        ledger.send_invoice(stranger.clone(), id("bob"), 1).await,
        Err(Error::RoleMismatch { .. })
    ));
    assert!(matches!(
        ledger.pay_invoice(stranger, 1).await,
        Err(Error::RoleMismatch { .. })
    ));
    assert_eq!(ledger.journal_len().await.unwrap(), 1);

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_state_survives_restart() {
    let (config, _temp) = persistent_config();
    let (host, guest) = (id("alice"), id("bob"));

    {
        let service = LedgerService::open(config.clone()).await.unwrap();
        let ledger = service.handle();
        ledger.register_host(host.clone()).await.unwrap();
        ledger.register_guest(guest.clone()).await.unwrap();
        ledger.add_balance(guest.clone(), 100).await.unwrap();
        ledger
            .send_invoice(host.clone(), guest.clone(), 80)
            .await
            .unwrap();
        ledger.pay_invoice(guest.clone(), 50).await.unwrap();
        // Rejected, so never journaled
        assert!(ledger.register_guest(guest.clone()).await.is_err());
        service.shutdown().await.unwrap();
    }

    let service = LedgerService::open(config).await.unwrap();
    let ledger = service.handle();

    assert_eq!(ledger.journal_len().await.unwrap(), 6);
    assert_eq!(ledger.view_role(host.clone()).await.unwrap(), Role::Host);
    assert_eq!(ledger.view_balance(guest.clone()).await.unwrap(), 50);
    assert_eq!(ledger.view_balance(host.clone()).await.unwrap(), 50);
    assert_eq!(
        ledger.view_invoice(guest.clone()).await.unwrap(),
        InvoiceView::new(80, 30, host.clone(), guest.clone())
    );

    // Outstanding invoice still blocks after restart
    assert!(matches!(
        ledger.send_invoice(host.clone(), guest.clone(), 1).await,
        Err(Error::OutstandingInvoiceExists { .. })
    ));

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_administrator_mismatch_is_refused() {
    let (config, _temp) = persistent_config();

    let service = LedgerService::open(config.clone()).await.unwrap();
    service.shutdown().await.unwrap();

    let mut other = config;
    other.administrator = "mallory".to_string();
    assert!(matches!(
        LedgerService::open(other).await,
        Err(Error::Config(_))
    ));
}

#[tokio::test]
async fn test_metrics_track_calls() {
    let service = LedgerService::open(in_memory_config()).await.unwrap();
    let ledger = service.handle();

    ledger.register_host(id("alice")).await.unwrap();
    ledger.register_guest(id("bob")).await.unwrap();
    ledger
        .send_invoice(id("alice"), id("bob"), 10)
        .await
        .unwrap();
    let _ = ledger.send_invoice(id("alice"), id("bob"), 10).await;

    let metrics = service.metrics();
    assert_eq!(metrics.invoices_total.get(), 1);
    assert_eq!(metrics.calls("send_invoice", "ok"), 1);
    assert_eq!(metrics.calls("send_invoice", "rejected"), 1);

    service.shutdown().await.unwrap();
}
