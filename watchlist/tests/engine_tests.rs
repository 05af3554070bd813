use std::sync::atomic::Ordering;

use tokio::test;
use tracing_test::traced_test;

use market::Catalog;
use session::{Identity, UserKey};
use watchlist::store::RemoteEvent;
use watchlist::{CommitOutcome, MigrationState, Tier, WatchlistError};

use mock_store::{catalog_quote, harness, settle, symbols};

fn authenticated(user: &str) -> Identity {
    Identity::AuthenticatedRemote {
        user: UserKey::new(user),
    }
}

fn reference_symbols() -> Vec<String> {
    Catalog::reference().iter().map(|d| d.symbol.clone()).collect()
}

#[test]
async fn signed_out_start_populates_catalog_in_memory() -> anyhow::Result<()> {
    let h = harness(1);

    let outcome = h.engine.on_identity(Identity::SignedOutLocal).await?;

    assert!(outcome.changed);
    assert!(!outcome.migration_offered);
    assert_eq!(outcome.entries, 5);
    assert_eq!(symbols(&h.engine.entries().await), reference_symbols());
    assert_eq!(h.engine.tier().await, Tier::Local);

    // candidates are not written until the user changes something
    assert!(h.local.stored().await.is_none());
    Ok(())
}

#[test]
async fn stored_local_entries_come_first_and_are_refreshed() -> anyhow::Result<()> {
    let h = harness(2);
    let stored = catalog_quote("GOLDHALF", 99);
    h.local.seed(vec![stored.clone()]).await;

    h.engine.on_identity(Identity::SignedOutLocal).await?;
    let entries = h.engine.entries().await;

    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0].symbol, "GOLDHALF");
    assert_eq!(entries[0].id, stored.id);
    Ok(())
}

#[test]
async fn repeated_identity_is_a_no_op() -> anyhow::Result<()> {
    let h = harness(3);

    let first = h.engine.on_identity(Identity::SignedOutLocal).await?;
    let before = h.engine.entries().await;
    let again = h.engine.on_identity(Identity::SignedOutLocal).await?;
    let signed_in = h.engine.on_identity(authenticated("user-1")).await?;

    assert!(!again.changed);
    assert_eq!(again.generation, first.generation);
    assert_eq!(signed_in.generation, first.generation + 1);
    assert_eq!(h.engine.entries().await, before);
    Ok(())
}

#[test]
async fn refresh_keeps_symbol_set_and_writes_through() -> anyhow::Result<()> {
    let h = harness(4);
    h.engine.on_identity(Identity::SignedOutLocal).await?;

    let first = h.engine.refresh_all().await?;
    let after_first = symbols(&h.engine.entries().await);
    let second = h.engine.refresh_all().await?;
    let after_second = symbols(&h.engine.entries().await);

    assert_eq!(
        first,
        CommitOutcome::Applied {
            entries: 5,
            persisted: true
        }
    );
    assert_eq!(second, first);
    assert_eq!(after_first, after_second);
    assert_eq!(after_first, reference_symbols());

    let stored = h.local.stored().await.expect("slot written");
    assert_eq!(symbols(&stored), reference_symbols());
    Ok(())
}

#[test]
async fn refresh_never_adds_after_user_removed_an_instrument() -> anyhow::Result<()> {
    let h = harness(5);
    h.engine.on_identity(Identity::SignedOutLocal).await?;

    h.engine.remove_instrument("NSE003").await?;
    h.engine.refresh_all().await?;

    let syms = symbols(&h.engine.entries().await);
    assert_eq!(syms.len(), 4);
    assert!(!syms.contains(&"MON100".to_string()));
    Ok(())
}

#[test]
async fn add_catalog_and_generic_instruments() -> anyhow::Result<()> {
    let h = harness(6);
    h.engine.on_identity(Identity::SignedOutLocal).await?;
    h.engine.remove_instrument("NSE002").await?;

    let known = h.engine.add_instrument(" bankbees ").await?;
    assert_eq!(known.symbol, "BANKBEES");
    assert_eq!(known.id, "NSE002");

    let generic = h.engine.add_instrument("xyz").await?;
    assert_eq!(generic.symbol, "XYZ");
    assert_eq!(generic.name, "XYZ ETF (Generic Mock)");

    let stored = h.local.stored().await.expect("slot written");
    assert_eq!(stored.len(), 6);
    assert_eq!(stored.last().map(|e| e.symbol.as_str()), Some("XYZ"));
    Ok(())
}

#[test]
async fn duplicate_or_empty_symbol_is_rejected() -> anyhow::Result<()> {
    let h = harness(7);
    h.engine.on_identity(Identity::SignedOutLocal).await?;
    let before = h.engine.entries().await;

    let dup = h.engine.add_instrument("niftybees").await;
    assert!(
        matches!(&dup, Err(WatchlistError::Validation(m)) if m == "NIFTYBEES is already in your list.")
    );

    let empty = h.engine.add_instrument("   ").await;
    assert!(
        matches!(&empty, Err(WatchlistError::Validation(m)) if m == "Please enter an instrument symbol.")
    );

    assert_eq!(h.engine.entries().await, before);
    assert_eq!(h.local.puts.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
async fn remove_returns_entry_and_rejects_unknown_id() -> anyhow::Result<()> {
    let h = harness(8);
    h.engine.on_identity(Identity::SignedOutLocal).await?;

    let removed = h.engine.remove_instrument("NSE001").await?;
    assert_eq!(removed.symbol, "NIFTYBEES");
    assert_eq!(h.engine.entries().await.len(), 4);

    let again = h.engine.remove_instrument("NSE001").await;
    assert!(matches!(again, Err(WatchlistError::Validation(_))));
    Ok(())
}

#[test]
async fn local_write_failure_keeps_in_memory_entry() -> anyhow::Result<()> {
    let h = harness(9);
    h.engine.on_identity(Identity::SignedOutLocal).await?;
    h.local.fail_put.store(true, Ordering::SeqCst);

    let res = h.engine.add_instrument("XYZ").await;

    assert!(matches!(
        res,
        Err(WatchlistError::StorageUnavailable {
            tier: Tier::Local,
            ..
        })
    ));
    assert!(symbols(&h.engine.entries().await).contains(&"XYZ".to_string()));
    assert!(h.local.stored().await.is_none());
    Ok(())
}

#[test]
async fn anonymous_identity_uses_local_tier() -> anyhow::Result<()> {
    let h = harness(10);
    h.engine
        .on_identity(Identity::AnonymousRemote {
            user: UserKey::new("anon-1"),
        })
        .await?;

    assert_eq!(h.engine.tier().await, Tier::Local);
    h.engine.add_instrument("XYZ").await?;

    assert_eq!(h.local.stored().await.map(|e| e.len()), Some(6));
    assert_eq!(h.remote.puts.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
async fn authenticated_mutations_go_to_remote_document() -> anyhow::Result<()> {
    let h = harness(11);
    let user = UserKey::new("user-1");

    h.engine.on_identity(authenticated("user-1")).await?;
    assert_eq!(h.engine.tier().await, Tier::Remote);

    h.engine.add_instrument("XYZ").await?;

    let doc = h.remote.document(&user).await.expect("document written");
    assert_eq!(doc.entries.len(), 6);
    assert!(h.local.stored().await.is_none());
    Ok(())
}

#[test]
#[traced_test]
async fn remote_write_failure_keeps_in_memory_entry() -> anyhow::Result<()> {
    let h = harness(12);
    h.engine.on_identity(authenticated("user-1")).await?;
    h.remote.fail_put.store(true, Ordering::SeqCst);

    let res = h.engine.add_instrument("XYZ").await;

    assert!(matches!(
        res,
        Err(WatchlistError::StorageUnavailable {
            tier: Tier::Remote,
            ..
        })
    ));
    assert!(symbols(&h.engine.entries().await).contains(&"XYZ".to_string()));
    assert!(h.remote.document(&UserKey::new("user-1")).await.is_none());
    assert!(logs_contain("write-through failed"));
    Ok(())
}

#[test]
async fn transient_remote_failure_never_triggers_migration() -> anyhow::Result<()> {
    let h = harness(13);
    let user = UserKey::new("user-1");
    h.local.seed(vec![catalog_quote("NIFTYBEES", 1)]).await;
    h.remote.fail_get.store(true, Ordering::SeqCst);

    let res = h.engine.on_identity(authenticated("user-1")).await;

    assert!(matches!(
        res,
        Err(WatchlistError::StorageUnavailable {
            tier: Tier::Remote,
            ..
        })
    ));
    assert!(h.engine.is_remote_pending().await);
    assert_eq!(h.engine.migration_state().await, MigrationState::Idle);
    assert!(h.engine.entries().await.is_empty());
    assert!(h.remote.document(&user).await.is_none());
    assert!(h.local.stored().await.is_some());

    // still failing: user operations surface the error and change nothing
    let add = h.engine.add_instrument("XYZ").await;
    assert!(matches!(add, Err(WatchlistError::StorageUnavailable { .. })));
    assert!(h.remote.document(&user).await.is_none());

    // tier recovers: the deferred load runs first and finds no document
    h.remote.fail_get.store(false, Ordering::SeqCst);
    let add = h.engine.add_instrument("XYZ").await;
    assert!(matches!(add, Err(WatchlistError::Validation(_))));
    assert!(!h.engine.is_remote_pending().await);
    assert!(h.engine.migration_state().await.is_offered());
    Ok(())
}

#[test]
async fn push_replaces_entries_verbatim() -> anyhow::Result<()> {
    let mut h = harness(14);
    let user = UserKey::new("user-1");
    h.remote.seed(&user, vec![catalog_quote("NIFTYBEES", 1)]).await;
    h.engine.on_identity(authenticated("user-1")).await?;

    let pushed = vec![catalog_quote("GOLDHALF", 5)];
    assert_eq!(h.remote.external_write(&user, pushed.clone()).await, 1);

    let event = h.remote_rx.recv().await.expect("push delivered");
    assert!(h.engine.apply_remote(event).await?);
    assert_eq!(h.engine.entries().await, pushed);
    Ok(())
}

#[test]
async fn push_for_inactive_user_is_ignored() -> anyhow::Result<()> {
    let h = harness(15);
    h.engine.on_identity(authenticated("user-1")).await?;
    let before = h.engine.entries().await;

    let applied = h
        .engine
        .apply_remote(RemoteEvent::Snapshot {
            user: UserKey::new("someone-else"),
            version: 1,
            entries: Vec::new(),
        })
        .await?;

    assert!(!applied);
    assert_eq!(h.engine.entries().await, before);
    Ok(())
}

#[test]
async fn sync_channel_error_is_transient() -> anyhow::Result<()> {
    let h = harness(16);
    h.engine.on_identity(authenticated("user-1")).await?;
    let before = h.engine.entries().await;

    let res = h
        .engine
        .apply_remote(RemoteEvent::Error {
            user: UserKey::new("user-1"),
            message: "stream reset".into(),
        })
        .await;

    assert!(matches!(res, Err(WatchlistError::TransientSync(_))));
    assert_eq!(h.engine.entries().await, before);
    Ok(())
}

#[test]
async fn refresh_overtaken_by_push_is_discarded() -> anyhow::Result<()> {
    let mut h = harness(17);
    let user = UserKey::new("user-1");
    h.remote.seed(&user, vec![catalog_quote("NIFTYBEES", 1)]).await;
    h.engine.on_identity(authenticated("user-1")).await?;

    let ticket = h.engine.prepare_refresh().await?;

    let pushed = vec![catalog_quote("GOLDHALF", 5)];
    h.remote.external_write(&user, pushed.clone()).await;
    let event = h.remote_rx.recv().await.expect("push delivered");
    h.engine.apply_remote(event).await?;

    let outcome = h.engine.commit_refresh(ticket).await?;

    assert_eq!(outcome, CommitOutcome::Discarded);
    assert_eq!(h.engine.entries().await, pushed);
    let doc = h.remote.document(&user).await.expect("document");
    assert_eq!(doc.entries, pushed);
    Ok(())
}

#[test]
async fn refresh_overtaken_by_identity_change_is_discarded() -> anyhow::Result<()> {
    let h = harness(18);
    h.engine.on_identity(Identity::SignedOutLocal).await?;

    let ticket = h.engine.prepare_refresh().await?;
    h.engine.on_identity(authenticated("user-1")).await?;
    let signed_in = h.engine.entries().await;

    let outcome = h.engine.commit_refresh(ticket).await?;

    assert_eq!(outcome, CommitOutcome::Discarded);
    assert_eq!(h.engine.entries().await, signed_in);
    assert!(h.local.stored().await.is_none());
    Ok(())
}

#[test]
async fn refresh_overtaken_by_user_mutation_is_discarded() -> anyhow::Result<()> {
    let h = harness(19);
    h.engine.on_identity(Identity::SignedOutLocal).await?;

    let ticket = h.engine.prepare_refresh().await?;
    h.engine.add_instrument("XYZ").await?;

    let outcome = h.engine.commit_refresh(ticket).await?;

    assert_eq!(outcome, CommitOutcome::Discarded);
    assert!(symbols(&h.engine.entries().await).contains(&"XYZ".to_string()));
    Ok(())
}

#[test]
async fn sign_out_drops_subscription() -> anyhow::Result<()> {
    let h = harness(20);
    let user = UserKey::new("user-1");
    h.engine.on_identity(authenticated("user-1")).await?;
    assert_eq!(h.remote.external_write(&user, Vec::new()).await, 1);

    h.engine.on_identity(Identity::SignedOutLocal).await?;
    settle().await;

    assert_eq!(h.remote.external_write(&user, Vec::new()).await, 0);
    Ok(())
}

#[test]
async fn snapshot_reports_movers_of_current_entries() -> anyhow::Result<()> {
    let h = harness(21);
    h.engine.on_identity(Identity::SignedOutLocal).await?;

    let snapshot = h.engine.snapshot().await;
    let entries = h.engine.entries().await;

    let gainer = snapshot.gainer.expect("non-empty list has a gainer");
    let loser = snapshot.loser.expect("non-empty list has a loser");
    assert!(entries.iter().all(|e| e.change_percent <= gainer.change_percent));
    assert!(entries.iter().all(|e| e.change_percent >= loser.change_percent));
    Ok(())
}

#[test]
async fn echo_of_own_earlier_write_never_rolls_back_newer_change() -> anyhow::Result<()> {
    let mut h = harness(22);
    let user = UserKey::new("user-1");
    h.remote.seed(&user, vec![catalog_quote("NIFTYBEES", 1)]).await;
    h.engine.on_identity(authenticated("user-1")).await?;

    h.engine.refresh_all().await?;
    h.engine.add_instrument("XYZ").await?;
    settle().await;

    // the refresh's echo lands after the add
    let refresh_echo = h.remote_rx.try_recv()?;
    assert!(!h.engine.apply_remote(refresh_echo).await?);

    let outcome = h.engine.refresh_all().await?;
    settle().await;
    while let Ok(echo) = h.remote_rx.try_recv() {
        assert!(!h.engine.apply_remote(echo).await?);
    }

    assert!(matches!(outcome, CommitOutcome::Applied { entries: 6, .. }));
    assert!(symbols(&h.engine.entries().await).contains(&"XYZ".to_string()));
    let doc = h.remote.document(&user).await.expect("document");
    assert!(symbols(&doc.entries).contains(&"XYZ".to_string()));
    assert_eq!(doc.entries, h.engine.entries().await);
    Ok(())
}

#[test]
async fn echo_after_failed_remote_write_keeps_unsaved_entry() -> anyhow::Result<()> {
    let mut h = harness(23);
    let user = UserKey::new("user-1");
    h.remote.seed(&user, vec![catalog_quote("NIFTYBEES", 1)]).await;
    h.engine.on_identity(authenticated("user-1")).await?;

    h.engine.refresh_all().await?;
    h.remote.fail_put.store(true, Ordering::SeqCst);
    let res = h.engine.add_instrument("XYZ").await;
    assert!(matches!(res, Err(WatchlistError::StorageUnavailable { .. })));
    settle().await;

    let echo = h.remote_rx.try_recv()?;
    assert!(!h.engine.apply_remote(echo).await?);
    assert!(symbols(&h.engine.entries().await).contains(&"XYZ".to_string()));

    // another device still wins with a newer document
    let pushed = vec![catalog_quote("GOLDHALF", 5)];
    h.remote.external_write(&user, pushed.clone()).await;
    settle().await;
    let push = h.remote_rx.try_recv()?;
    assert!(h.engine.apply_remote(push).await?);
    assert_eq!(h.engine.entries().await, pushed);
    Ok(())
}

#[test]
async fn reordered_push_older_than_applied_one_is_ignored() -> anyhow::Result<()> {
    let h = harness(24);
    let user = UserKey::new("user-1");
    h.engine.on_identity(authenticated("user-1")).await?;

    let newer = vec![catalog_quote("MON100", 2)];
    let applied = h
        .engine
        .apply_remote(RemoteEvent::Snapshot {
            user: user.clone(),
            version: 5,
            entries: newer.clone(),
        })
        .await?;
    let stale = h
        .engine
        .apply_remote(RemoteEvent::Snapshot {
            user,
            version: 4,
            entries: Vec::new(),
        })
        .await?;

    assert!(applied);
    assert!(!stale);
    assert_eq!(h.engine.entries().await, newer);
    Ok(())
}
