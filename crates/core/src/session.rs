//! Session lifecycle
//!
//! The session owns the single credential slot. A credential restored from
//! disk is usable immediately (provisional) and validated in the background;
//! a credential that fails validation gets exactly one refresh attempt before
//! it is discarded and the user has to log in again.
//!
//! ```text
//! NoCredential --restore--> Provisional --validate ok--------------> Valid
//!                                |      --validate fail--> Refreshing --ok--> Valid
//!                                |                             \--fail--> Invalid
//! NoCredential --login--> Valid
//! ```

use crate::credentials::{Credential, CredentialStore};
use crate::errors::{AuthError, Result};
use crate::progress::{emit_or_warn, ProgressEmitter, ProgressEvent};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

/// Player profile returned by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: String,
    pub name: String,
}

/// Response of an interactive login or a token refresh
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderResponse {
    Success {
        access_token: String,
        #[serde(default)]
        client_token: Option<String>,
        #[serde(default)]
        profile: Option<Profile>,
        #[serde(default)]
        metadata: Option<serde_json::Value>,
    },
    Cancelled,
    Failed {
        reason: String,
    },
}

impl ProviderResponse {
    /// Turn a provider response into a credential.
    ///
    /// A success without a profile or access token is rejected here so that
    /// no partially filled credential ever reaches the session.
    pub fn into_credential(self) -> std::result::Result<Credential, AuthError> {
        match self {
            ProviderResponse::Success {
                access_token,
                client_token,
                profile,
                metadata,
            } => {
                let profile = profile.ok_or_else(|| AuthError::InvalidResponse {
                    message: "no profile in response".to_string(),
                })?;
                if access_token.is_empty() {
                    return Err(AuthError::InvalidResponse {
                        message: "empty access token".to_string(),
                    });
                }
                if profile.id.is_empty() || profile.name.is_empty() {
                    return Err(AuthError::InvalidResponse {
                        message: "incomplete profile".to_string(),
                    });
                }
                Ok(Credential {
                    access_token,
                    client_token: client_token.unwrap_or_default(),
                    user_id: profile.id,
                    display_name: profile.name,
                    session_metadata: Some(metadata.unwrap_or_else(|| serde_json::json!({}))),
                })
            }
            ProviderResponse::Cancelled => Err(AuthError::Cancelled),
            ProviderResponse::Failed { reason } => Err(AuthError::Provider { reason }),
        }
    }
}

/// External identity capability
#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Run the interactive login flow
    async fn login(&self) -> std::result::Result<ProviderResponse, AuthError>;

    /// Check whether the credential is still accepted
    async fn validate(&self, credential: &Credential) -> std::result::Result<bool, AuthError>;

    /// Exchange a credential for a fresh one
    async fn refresh(
        &self,
        credential: &Credential,
    ) -> std::result::Result<ProviderResponse, AuthError>;
}

/// Lifecycle state of the credential slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoCredential,
    /// Restored from disk, not yet validated
    Provisional,
    Refreshing,
    Valid,
    /// Validation and refresh both failed; the credential was discarded
    Invalid,
}

/// The user's authentication session
#[derive(Debug)]
pub struct Session<P: IdentityProvider> {
    provider: P,
    store: CredentialStore,
    state: SessionState,
    credential: Option<Credential>,
    persisted: bool,
}

impl<P: IdentityProvider> Session<P> {
    pub fn new(provider: P, store: CredentialStore) -> Self {
        Self {
            provider,
            store,
            state: SessionState::NoCredential,
            credential: None,
            persisted: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    fn announce(&self, emitter: &dyn ProgressEmitter) {
        if let Some(credential) = &self.credential {
            emit_or_warn(
                emitter,
                ProgressEvent::AuthSuccess {
                    name: credential.display_name.clone(),
                    id: credential.user_id.clone(),
                },
            );
        }
    }

    /// Load a persisted credential and make it provisionally available
    pub fn restore(&mut self, emitter: &dyn ProgressEmitter) -> Option<&Credential> {
        let credential = self.store.load()?;
        info!(user = %credential.display_name, "Restored saved session");
        self.credential = Some(credential);
        self.persisted = true;
        self.state = SessionState::Provisional;
        self.announce(emitter);
        self.credential.as_ref()
    }

    /// Validate the held credential, refreshing it once if needed.
    ///
    /// Returns `Ok(false)` when there is no credential or it had to be
    /// discarded; the persisted copy is removed in that case.
    #[instrument(skip_all)]
    pub async fn validate(&mut self, emitter: &dyn ProgressEmitter) -> Result<bool> {
        let Some(credential) = self.credential.clone() else {
            return Ok(false);
        };

        match self.provider.validate(&credential).await {
            Ok(true) => {
                debug!("Session is valid");
                self.state = SessionState::Valid;
                return Ok(true);
            }
            Ok(false) => info!("Session expired, refreshing"),
            Err(e) => warn!("Session validation failed, refreshing: {}", e),
        }

        self.state = SessionState::Refreshing;
        let refreshed = match self.provider.refresh(&credential).await {
            Ok(response) => response.into_credential(),
            Err(e) => Err(e),
        };

        match refreshed {
            Ok(fresh) => {
                if self.persisted {
                    self.store.save(&fresh)?;
                }
                info!(user = %fresh.display_name, "Session refreshed");
                self.credential = Some(fresh);
                self.state = SessionState::Valid;
                self.announce(emitter);
                Ok(true)
            }
            Err(e) => {
                warn!("Session refresh failed: {}", e);
                self.credential = None;
                self.persisted = false;
                self.state = SessionState::Invalid;
                let cleared = self.store.clear();
                emit_or_warn(emitter, ProgressEvent::AuthFailed);
                cleared.map(|_| false)
            }
        }
    }

    /// Run the interactive login.
    ///
    /// The credential is persisted only when `remember` is set; otherwise any
    /// previously persisted credential is removed.
    #[instrument(skip(self, emitter))]
    pub async fn login(
        &mut self,
        remember: bool,
        emitter: &dyn ProgressEmitter,
    ) -> Result<Credential> {
        let result = match self.provider.login().await {
            Ok(response) => response.into_credential(),
            Err(e) => Err(e),
        };

        let credential = match result {
            Ok(credential) => credential,
            Err(e) => {
                self.reset();
                return Err(e.into());
            }
        };

        if remember {
            self.store.save(&credential)?;
        } else {
            self.store.clear()?;
        }
        info!(user = %credential.display_name, remember, "Logged in");

        self.persisted = remember;
        self.credential = Some(credential.clone());
        self.state = SessionState::Valid;
        self.announce(emitter);
        Ok(credential)
    }

    /// Make sure a valid credential is held, logging in if necessary
    pub async fn ensure_authenticated(
        &mut self,
        remember: bool,
        emitter: &dyn ProgressEmitter,
    ) -> Result<Credential> {
        if let Some(credential) = &self.credential {
            if self.state == SessionState::Valid {
                return Ok(credential.clone());
            }
        }
        if self.credential.is_some() && self.validate(emitter).await? {
            if let Some(credential) = &self.credential {
                return Ok(credential.clone());
            }
        }
        self.login(remember, emitter).await
    }

    /// Forget the credential, in memory and on disk
    pub fn logout(&mut self) -> Result<()> {
        self.reset();
        self.store.clear()
    }

    /// Forget the in-memory credential, keeping the persisted copy
    pub fn reset(&mut self) {
        self.credential = None;
        self.persisted = false;
        self.state = SessionState::NoCredential;
    }
}

/// Identity provider backed by a helper executable.
///
/// The helper is invoked as `<helper> login|validate|refresh`. For
/// `validate` and `refresh` the credential is written to its stdin as JSON.
/// It prints a [`ProviderResponse`] document, or `{"valid": bool}` for
/// `validate`.
#[derive(Debug, Clone)]
pub struct CommandIdentityProvider {
    helper: PathBuf,
}

#[derive(Deserialize)]
struct ValidateReply {
    valid: bool,
}

impl CommandIdentityProvider {
    pub fn new(helper: impl Into<PathBuf>) -> Self {
        Self {
            helper: helper.into(),
        }
    }

    async fn run(
        &self,
        action: &str,
        credential: Option<&Credential>,
    ) -> std::result::Result<Vec<u8>, AuthError> {
        let helper_err = |message: String| AuthError::Helper { message };

        let mut child = tokio::process::Command::new(&self.helper)
            .arg(action)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::inherit())
            .spawn()
            .map_err(|e| helper_err(format!("{}: {}", self.helper.display(), e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Some(credential) = credential {
                let payload = serde_json::to_vec(credential)
                    .map_err(|e| helper_err(e.to_string()))?;
                stdin
                    .write_all(&payload)
                    .await
                    .map_err(|e| helper_err(e.to_string()))?;
            }
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| helper_err(e.to_string()))?;
        if !output.status.success() {
            return Err(helper_err(format!(
                "{} {} exited with {:?}",
                self.helper.display(),
                action,
                output.status.code()
            )));
        }
        Ok(output.stdout)
    }

    fn parse_response(bytes: &[u8]) -> std::result::Result<ProviderResponse, AuthError> {
        serde_json::from_slice(bytes).map_err(|e| AuthError::InvalidResponse {
            message: e.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl IdentityProvider for CommandIdentityProvider {
    async fn login(&self) -> std::result::Result<ProviderResponse, AuthError> {
        let stdout = self.run("login", None).await?;
        Self::parse_response(&stdout)
    }

    async fn validate(&self, credential: &Credential) -> std::result::Result<bool, AuthError> {
        let stdout = self.run("validate", Some(credential)).await?;
        let reply: ValidateReply =
            serde_json::from_slice(&stdout).map_err(|e| AuthError::InvalidResponse {
                message: e.to_string(),
            })?;
        Ok(reply.valid)
    }

    async fn refresh(
        &self,
        credential: &Credential,
    ) -> std::result::Result<ProviderResponse, AuthError> {
        let stdout = self.run("refresh", Some(credential)).await?;
        Self::parse_response(&stdout)
    }
}

/// Scripted identity provider for tests
#[derive(Debug, Default)]
pub struct MockIdentityProvider {
    logins: Mutex<VecDeque<ProviderResponse>>,
    refreshes: Mutex<VecDeque<ProviderResponse>>,
    valid: Mutex<bool>,
    calls: Mutex<Vec<String>>,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response of the next login
    pub fn push_login(&self, response: ProviderResponse) {
        lock(&self.logins).push_back(response);
    }

    /// Queue the response of the next refresh
    pub fn push_refresh(&self, response: ProviderResponse) {
        lock(&self.refreshes).push_back(response);
    }

    /// Answer of every validation
    pub fn set_valid(&self, valid: bool) {
        *lock(&self.valid) = valid;
    }

    /// Names of the provider operations invoked so far
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    /// A successful response for the given player
    pub fn success(name: &str, id: &str, token: &str) -> ProviderResponse {
        ProviderResponse::Success {
            access_token: token.to_string(),
            client_token: None,
            profile: Some(Profile {
                id: id.to_string(),
                name: name.to_string(),
            }),
            metadata: None,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[async_trait::async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn login(&self) -> std::result::Result<ProviderResponse, AuthError> {
        lock(&self.calls).push("login".to_string());
        Ok(lock(&self.logins)
            .pop_front()
            .unwrap_or(ProviderResponse::Cancelled))
    }

    async fn validate(&self, _credential: &Credential) -> std::result::Result<bool, AuthError> {
        lock(&self.calls).push("validate".to_string());
        Ok(*lock(&self.valid))
    }

    async fn refresh(
        &self,
        _credential: &Credential,
    ) -> std::result::Result<ProviderResponse, AuthError> {
        lock(&self.calls).push("refresh".to_string());
        lock(&self.refreshes)
            .pop_front()
            .ok_or_else(|| AuthError::Provider {
                reason: "refresh token expired".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::sample_credential;
    use crate::errors::LauncherError;
    use crate::progress::RecordingEmitter;

    fn session(dir: &std::path::Path) -> Session<MockIdentityProvider> {
        Session::new(MockIdentityProvider::new(), CredentialStore::new(dir))
    }

    #[test]
    fn test_into_credential_validation() {
        let credential = MockIdentityProvider::success("Steve", "id-1", "tok")
            .into_credential()
            .unwrap();
        assert_eq!(credential.display_name, "Steve");
        assert_eq!(credential.user_id, "id-1");
        assert_eq!(credential.client_token, "");

        let no_profile = ProviderResponse::Success {
            access_token: "tok".to_string(),
            client_token: None,
            profile: None,
            metadata: None,
        };
        assert!(matches!(
            no_profile.into_credential(),
            Err(AuthError::InvalidResponse { .. })
        ));
        assert!(matches!(
            MockIdentityProvider::success("Steve", "id", "").into_credential(),
            Err(AuthError::InvalidResponse { .. })
        ));
        assert!(matches!(
            ProviderResponse::Cancelled.into_credential(),
            Err(AuthError::Cancelled)
        ));
    }

    #[test]
    fn test_provider_response_wire_format() {
        let response: ProviderResponse = serde_json::from_str(
            r#"{"type": "success", "access_token": "t", "profile": {"id": "u", "name": "n"}}"#,
        )
        .unwrap();
        assert!(response.into_credential().is_ok());

        let response: ProviderResponse =
            serde_json::from_str(r#"{"type": "failed", "reason": "locked"}"#).unwrap();
        assert_eq!(
            response,
            ProviderResponse::Failed {
                reason: "locked".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_restore_is_provisional_and_announced() {
        let dir = tempfile::tempdir().unwrap();
        CredentialStore::new(dir.path())
            .save(&sample_credential("Steve"))
            .unwrap();
        let emitter = RecordingEmitter::new();
        let mut session = session(dir.path());

        assert!(session.restore(&emitter).is_some());
        assert_eq!(session.state(), SessionState::Provisional);
        assert_eq!(
            emitter.events(),
            vec![ProgressEvent::AuthSuccess {
                name: "Steve".to_string(),
                id: "uuid-Steve".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_restore_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = RecordingEmitter::new();
        let mut session = session(dir.path());
        assert!(session.restore(&emitter).is_none());
        assert_eq!(session.state(), SessionState::NoCredential);
        assert!(emitter.events().is_empty());
    }

    #[tokio::test]
    async fn test_validate_success() {
        let dir = tempfile::tempdir().unwrap();
        CredentialStore::new(dir.path())
            .save(&sample_credential("Steve"))
            .unwrap();
        let emitter = RecordingEmitter::new();
        let mut session = session(dir.path());
        session.provider().set_valid(true);
        session.restore(&emitter);

        assert!(session.validate(&emitter).await.unwrap());
        assert_eq!(session.state(), SessionState::Valid);
        assert_eq!(session.provider().calls(), vec!["validate"]);
    }

    #[tokio::test]
    async fn test_refresh_overwrites_persisted_credential() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(&sample_credential("Steve")).unwrap();
        let emitter = RecordingEmitter::new();
        let mut session = session(dir.path());
        session
            .provider()
            .push_refresh(MockIdentityProvider::success("Steve", "uuid-Steve", "fresh"));
        session.restore(&emitter);

        assert!(session.validate(&emitter).await.unwrap());
        assert_eq!(session.state(), SessionState::Valid);
        assert_eq!(store.load().unwrap().access_token, "fresh");
        assert_eq!(emitter.events().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_clears_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(&sample_credential("Steve")).unwrap();
        let emitter = RecordingEmitter::new();
        let mut session = session(dir.path());
        session.restore(&emitter);

        assert!(!session.validate(&emitter).await.unwrap());
        assert_eq!(session.state(), SessionState::Invalid);
        assert!(session.credential().is_none());
        assert!(store.load().is_none());
        assert_eq!(emitter.events().last(), Some(&ProgressEvent::AuthFailed));
        assert_eq!(session.provider().calls(), vec!["validate", "refresh"]);
    }

    #[tokio::test]
    async fn test_login_remember_controls_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        let emitter = RecordingEmitter::new();
        let mut session = session(dir.path());

        session
            .provider()
            .push_login(MockIdentityProvider::success("Alex", "id-a", "tok-a"));
        session.login(false, &emitter).await.unwrap();
        assert!(store.load().is_none());
        assert_eq!(session.state(), SessionState::Valid);

        session
            .provider()
            .push_login(MockIdentityProvider::success("Alex", "id-a", "tok-b"));
        session.login(true, &emitter).await.unwrap();
        assert_eq!(store.load().unwrap().access_token, "tok-b");
    }

    #[tokio::test]
    async fn test_cancelled_login_resets_state() {
        let dir = tempfile::tempdir().unwrap();
        let emitter = RecordingEmitter::new();
        let mut session = session(dir.path());

        let err = session.login(true, &emitter).await.unwrap_err();
        assert!(matches!(err, LauncherError::Auth(AuthError::Cancelled)));
        assert_eq!(session.state(), SessionState::NoCredential);
        assert!(emitter.events().is_empty());
    }

    #[tokio::test]
    async fn test_ensure_authenticated_uses_valid_session() {
        let dir = tempfile::tempdir().unwrap();
        CredentialStore::new(dir.path())
            .save(&sample_credential("Steve"))
            .unwrap();
        let emitter = RecordingEmitter::new();
        let mut session = session(dir.path());
        session.provider().set_valid(true);
        session.restore(&emitter);

        let credential = session.ensure_authenticated(false, &emitter).await.unwrap();
        assert_eq!(credential.display_name, "Steve");
        assert_eq!(session.provider().calls(), vec!["validate"]);

        session.ensure_authenticated(false, &emitter).await.unwrap();
        assert_eq!(session.provider().calls(), vec!["validate"]);
    }

    #[tokio::test]
    async fn test_logout_clears_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path());
        store.save(&sample_credential("Steve")).unwrap();
        let emitter = RecordingEmitter::new();
        let mut session = session(dir.path());
        session.restore(&emitter);

        session.logout().unwrap();
        assert!(session.credential().is_none());
        assert!(!store.exists());
    }

    #[tokio::test]
    async fn test_command_provider_missing_helper() {
        let provider = CommandIdentityProvider::new("/nonexistent/blocklaunch-auth");
        let err = provider.login().await.unwrap_err();
        assert!(matches!(err, AuthError::Helper { .. }));
    }
}
