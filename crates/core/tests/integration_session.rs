//! Integration tests for the authentication session lifecycle

use blocklaunch_core::credentials::{Credential, CredentialStore};
use blocklaunch_core::progress::{ProgressEvent, RecordingEmitter};
use blocklaunch_core::session::{MockIdentityProvider, Session, SessionState};

fn stored_credential() -> Credential {
    Credential {
        access_token: "expired-token".to_string(),
        client_token: "client".to_string(),
        user_id: "uuid-alex".to_string(),
        display_name: "Alex".to_string(),
        session_metadata: None,
    }
}

#[tokio::test]
async fn test_expired_session_falls_back_to_interactive_login() {
    let root = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(root.path());
    store.save(&stored_credential()).unwrap();

    let provider = MockIdentityProvider::new();
    provider.set_valid(false);
    provider.push_login(MockIdentityProvider::success("Alex", "uuid-alex", "fresh-token"));

    let mut session = Session::new(provider, CredentialStore::new(root.path()));
    let emitter = RecordingEmitter::new();

    // startup: provisional auth from disk
    assert!(session.restore(&emitter).is_some());
    assert_eq!(session.state(), SessionState::Provisional);

    // validation and the single refresh attempt both fail
    assert!(!session.validate(&emitter).await.unwrap());
    assert_eq!(session.state(), SessionState::Invalid);
    assert!(!store.exists());
    assert!(emitter.events().contains(&ProgressEvent::AuthFailed));

    // launch time: interactive login with remember-me persists again
    let credential = session.ensure_authenticated(true, &emitter).await.unwrap();
    assert_eq!(credential.access_token, "fresh-token");
    assert_eq!(session.state(), SessionState::Valid);
    assert_eq!(store.load().unwrap().access_token, "fresh-token");

    assert_eq!(
        session.provider().calls(),
        vec!["validate", "refresh", "login"]
    );
}

#[tokio::test]
async fn test_refresh_keeps_session_alive() {
    let root = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(root.path());
    store.save(&stored_credential()).unwrap();

    let provider = MockIdentityProvider::new();
    provider.set_valid(false);
    provider.push_refresh(MockIdentityProvider::success("Alex", "uuid-alex", "refreshed"));

    let mut session = Session::new(provider, CredentialStore::new(root.path()));
    let emitter = RecordingEmitter::new();
    session.restore(&emitter);

    assert!(session.validate(&emitter).await.unwrap());
    assert_eq!(session.state(), SessionState::Valid);
    assert_eq!(store.load().unwrap().access_token, "refreshed");
    assert!(!emitter.events().contains(&ProgressEvent::AuthFailed));
}

#[test]
fn test_corrupt_credential_file_reads_as_absent() {
    let root = tempfile::tempdir().unwrap();
    let store = CredentialStore::new(root.path());
    std::fs::write(store.path(), "{\"access_token\": ").unwrap();
    assert!(store.load().is_none());

    let mut session = Session::new(MockIdentityProvider::new(), store);
    assert!(session.restore(&RecordingEmitter::new()).is_none());
    assert_eq!(session.state(), SessionState::NoCredential);
}
