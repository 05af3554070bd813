use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::test;

use session::{AuthError, AuthProvider, Identity, IdentityTransition, SessionController, UserKey};

use mock_auth::MockAuthProvider;

fn controller() -> (
    Arc<MockAuthProvider>,
    SessionController,
    tokio::sync::mpsc::UnboundedReceiver<IdentityTransition>,
) {
    let auth = Arc::new(MockAuthProvider::default());
    let provider: Arc<dyn AuthProvider> = auth.clone();
    let (ctl, rx) = SessionController::new(Some(provider));
    (auth, ctl, rx)
}

fn authenticated() -> Identity {
    Identity::AuthenticatedRemote {
        user: UserKey::new("user-1"),
    }
}

#[test]
async fn startup_observation_is_published_first() -> anyhow::Result<()> {
    let (_auth, ctl, mut rx) = controller();

    let first = rx.try_recv()?;
    assert_eq!(first.previous, None);
    assert_eq!(first.current, Identity::SignedOutLocal);
    assert_eq!(ctl.current(), Identity::SignedOutLocal);
    assert!(rx.try_recv().is_err());

    Ok(())
}

#[test]
async fn transitions_are_published_in_order() -> anyhow::Result<()> {
    let (_auth, ctl, mut rx) = controller();
    let _startup = rx.try_recv()?;

    ctl.sign_in_anonymously().await?;
    ctl.sign_in().await?;
    ctl.sign_out().await?;

    let kinds: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
        .map(|t| t.current)
        .collect();

    assert_eq!(
        kinds,
        vec![
            Identity::AnonymousRemote {
                user: UserKey::new("anon-1")
            },
            authenticated(),
            Identity::SignedOutLocal,
        ]
    );
    Ok(())
}

#[test]
async fn repeated_identity_publishes_once() -> anyhow::Result<()> {
    let (auth, ctl, mut rx) = controller();
    let _startup = rx.try_recv()?;

    ctl.sign_in().await?;
    ctl.sign_in().await?;
    assert!(ctl.observe(authenticated()).is_none());

    assert_eq!(auth.sign_in_calls.load(Ordering::SeqCst), 2);
    assert_eq!(rx.try_recv()?.current, authenticated());
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[test]
async fn rejected_sign_in_leaves_identity_unchanged() -> anyhow::Result<()> {
    let (auth, ctl, mut rx) = controller();
    let _startup = rx.try_recv()?;

    auth.reject.store(true, Ordering::SeqCst);
    let err = ctl.sign_in().await.unwrap_err();

    assert!(matches!(err, AuthError::Rejected(_)));
    assert_eq!(ctl.current(), Identity::SignedOutLocal);
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[test]
async fn rejected_sign_out_keeps_user_signed_in() -> anyhow::Result<()> {
    let (auth, ctl, _rx) = controller();

    ctl.sign_in().await?;
    auth.reject.store(true, Ordering::SeqCst);

    assert!(ctl.sign_out().await.is_err());
    assert_eq!(ctl.current(), authenticated());
    Ok(())
}

#[test]
async fn missing_provider_reports_not_initialized() -> anyhow::Result<()> {
    let (ctl, mut rx) = SessionController::new(None);
    let _startup = rx.try_recv()?;

    assert!(!ctl.has_provider());
    assert_eq!(ctl.sign_in().await, Err(AuthError::NotInitialized));
    assert_eq!(ctl.sign_out().await, Err(AuthError::NotInitialized));
    assert!(rx.try_recv().is_err());
    Ok(())
}
