//! Authentication
//!
//! [`Authenticator`] is the seam to whatever performs the interactive
//! multi-factor sign-in; it only has to hand back a [`SessionStore`].
//! [`AuthSession`] owns the current store, checks it before every request and
//! refreshes it (one refresh at a time) when the primary cookie is about to
//! expire.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use async_trait::async_trait;
use colored::*;
use is_terminal::IsTerminal;
use tokio::sync::Mutex;

use super::session::{PRIMARY_TOKEN, SESSION_COOKIES, SessionStore, SessionToken, now_epoch_secs};
use crate::error::{CrmError, Result};

/// Service user credentials
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Performs the interactive sign-in
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Sign in and return the captured session cookies
    async fn login(&self, credentials: &Credentials) -> Result<SessionStore>;

    /// Release anything the sign-in flow holds on to
    async fn logout(&self) -> Result<()> {
        Ok(())
    }
}

/// Current session plus the means to renew it
pub struct AuthSession {
    authenticator: Box<dyn Authenticator>,
    credentials: ArcSwapOption<Credentials>,
    store: ArcSwap<SessionStore>,
    store_path: Option<PathBuf>,
    refresh_lock: Mutex<()>,
}

impl AuthSession {
    /// Create a session backed by a cookie file, loading it if it exists
    pub fn new(
        authenticator: impl Authenticator + 'static,
        credentials: Option<Credentials>,
        store_path: PathBuf,
    ) -> Result<Self> {
        let store = SessionStore::load(&store_path)?;
        Ok(Self {
            authenticator: Box::new(authenticator),
            credentials: ArcSwapOption::from(credentials.map(Arc::new)),
            store: ArcSwap::from_pointee(store),
            store_path: Some(store_path),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Create a session that lives in memory only
    pub fn in_memory(
        authenticator: impl Authenticator + 'static,
        credentials: Option<Credentials>,
        store: SessionStore,
    ) -> Self {
        Self {
            authenticator: Box::new(authenticator),
            credentials: ArcSwapOption::from(credentials.map(Arc::new)),
            store: ArcSwap::from_pointee(store),
            store_path: None,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Snapshot of the current cookies
    pub fn store(&self) -> Arc<SessionStore> {
        self.store.load_full()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.load().is_valid()
    }

    pub fn cookies_as_tuples(&self) -> Vec<(String, String)> {
        self.store.load().cookies_as_tuples()
    }

    pub fn set_credentials(&self, credentials: Credentials) {
        self.credentials.store(Some(Arc::new(credentials)));
    }

    /// Return a valid session, signing in first if the current one is expiring
    ///
    /// Concurrent callers share a single sign-in: whoever gets the lock
    /// refreshes, the rest re-check and reuse the new cookies.
    pub async fn ensure_valid(&self) -> Result<Arc<SessionStore>> {
        let current = self.store.load_full();
        if current.is_valid() {
            return Ok(current);
        }

        let _guard = self.refresh_lock.lock().await;

        let current = self.store.load_full();
        if current.is_valid() {
            log::debug!("Session was refreshed by another request");
            return Ok(current);
        }

        log::info!("Authentication expired, refreshing...");
        let outcome = self.login_locked().await;
        if let Err(e) = self.persist() {
            log::warn!("Failed to save session cookies: {}", e);
        }
        outcome
    }

    /// Sign in unconditionally
    ///
    /// Unlike the implicit refresh in [`ensure_valid`](Self::ensure_valid),
    /// a session that signed in but could not be written to disk is an error.
    pub async fn refresh(&self) -> Result<Arc<SessionStore>> {
        let _guard = self.refresh_lock.lock().await;
        let store = self.login_locked().await?;
        self.persist()?;
        Ok(store)
    }

    /// Drop credentials and cookies
    pub async fn logout(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        self.credentials.store(None);
        self.store.store(Arc::new(SessionStore::new()));
        self.persist()?;
        self.authenticator.logout().await
    }

    async fn login_locked(&self) -> Result<Arc<SessionStore>> {
        let credentials = self.credentials.load_full().ok_or_else(|| {
            log::error!("No user provided for authentication");
            CrmError::Auth("No user provided for authentication".into())
        })?;

        log::debug!("Attempting login for user: {}", credentials.username);

        let outcome = match self.authenticator.login(&credentials).await {
            Ok(store) if store.is_valid() => {
                log::info!("Authentication completed successfully ({} cookies)", store.len());
                self.store.store(Arc::new(store));
                Ok(self.store.load_full())
            }
            Ok(store) => {
                log::error!(
                    "Login returned {} cookies but no valid {} cookie",
                    store.len(),
                    PRIMARY_TOKEN
                );
                Err(CrmError::Auth(format!(
                    "Login produced no usable session ({} missing or expiring)",
                    PRIMARY_TOKEN
                )))
            }
            Err(e) => {
                log::error!("Authentication refresh failed: {}", e);
                if e.is_auth() {
                    Err(e)
                } else {
                    Err(CrmError::Auth(e.to_string()))
                }
            }
        };

        outcome
    }

    fn persist(&self) -> Result<()> {
        match &self.store_path {
            Some(path) => self.store.load().save(path),
            None => Ok(()),
        }
    }
}

/// Interactive sign-in where the user completes the multi-factor flow in a
/// browser and pastes the issued cookies into the terminal
#[derive(Debug, Clone)]
pub struct PromptAuthenticator {
    login_url: String,
    session_lifetime: Duration,
}

impl PromptAuthenticator {
    pub fn new(login_url: impl Into<String>, session_lifetime: Duration) -> Self {
        Self {
            login_url: login_url.into(),
            session_lifetime,
        }
    }
}

#[async_trait]
impl Authenticator for PromptAuthenticator {
    async fn login(&self, credentials: &Credentials) -> Result<SessionStore> {
        if !std::io::stdin().is_terminal() {
            return Err(CrmError::Auth(
                "Interactive login requires a terminal; run 'crm-cli auth login' first".into(),
            ));
        }

        let login_url = self.login_url.clone();
        let username = credentials.username.clone();
        let lifetime = self.session_lifetime;

        tokio::task::spawn_blocking(move || prompt_for_cookies(&login_url, &username, lifetime))
            .await
            .map_err(|e| CrmError::Auth(format!("Login prompt failed: {}", e)))?
    }
}

fn prompt_for_cookies(login_url: &str, username: &str, lifetime: Duration) -> Result<SessionStore> {
    let prompt_err = |e: &dyn fmt::Display| CrmError::Auth(format!("Login prompt failed: {}", e));

    eprintln!();
    eprintln!("{}", "=".repeat(50));
    eprintln!("Sign in as {} at:", username.bright_green().bold());
    eprintln!("  {}", login_url.cyan());
    eprintln!("Approve the sign-in in your phone app, then copy the");
    eprintln!("session cookies from the browser's developer tools.");
    eprintln!("{}", "=".repeat(50));
    eprintln!();

    let domain = reqwest::Url::parse(login_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string));
    let expires = now_epoch_secs() + lifetime.as_secs_f64();

    let mut store = SessionStore::new();
    for name in SESSION_COOKIES {
        let value = if name == PRIMARY_TOKEN {
            rpassword::prompt_password(format!("{}: ", name)).map_err(|e| prompt_err(&e))?
        } else {
            dialoguer::Input::<String>::new()
                .with_prompt(format!("{} (optional)", name))
                .allow_empty(true)
                .interact_text()
                .map_err(|e| prompt_err(&e))?
        };

        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        let mut token = SessionToken::new(name, value).expires(expires);
        if let Some(domain) = &domain {
            token = token.domain(domain.clone());
        }
        store.insert(token);
    }

    if store.get(PRIMARY_TOKEN).is_none() {
        return Err(CrmError::Auth(format!("No {} cookie entered", PRIMARY_TOKEN)));
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingAuthenticator {
        logins: Arc<AtomicUsize>,
        lifetime: f64,
    }

    #[async_trait]
    impl Authenticator for CountingAuthenticator {
        async fn login(&self, _credentials: &Credentials) -> Result<SessionStore> {
            self.logins.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(SessionStore::from_tokens([SessionToken::new(PRIMARY_TOKEN, "fresh")
                .expires(now_epoch_secs() + self.lifetime)]))
        }
    }

    struct FailingAuthenticator;

    #[async_trait]
    impl Authenticator for FailingAuthenticator {
        async fn login(&self, _credentials: &Credentials) -> Result<SessionStore> {
            Err(CrmError::Auth("MFA approval timed out".into()))
        }
    }

    fn counting(lifetime: f64) -> (CountingAuthenticator, Arc<AtomicUsize>) {
        let logins = Arc::new(AtomicUsize::new(0));
        (
            CountingAuthenticator {
                logins: logins.clone(),
                lifetime,
            },
            logins,
        )
    }

    fn creds() -> Option<Credentials> {
        Some(Credentials::new("service@example.com", "pw"))
    }

    #[tokio::test]
    async fn test_valid_session_skips_login() {
        let (auth, logins) = counting(3600.0);
        let store = SessionStore::from_tokens([
            SessionToken::new(PRIMARY_TOKEN, "cached").expires(now_epoch_secs() + 3600.0)
        ]);
        let session = AuthSession::in_memory(auth, creds(), store);

        let current = session.ensure_valid().await.unwrap();
        assert_eq!(current.get(PRIMARY_TOKEN).unwrap().value, "cached");
        assert_eq!(logins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expiring_session_is_replaced() {
        let (auth, logins) = counting(3600.0);
        let store = SessionStore::from_tokens([
            SessionToken::new(PRIMARY_TOKEN, "stale").expires(now_epoch_secs() + 60.0),
            SessionToken::new("orgId", "old-org"),
        ]);
        let session = AuthSession::in_memory(auth, creds(), store);
        assert!(!session.is_authenticated());

        let current = session.ensure_valid().await.unwrap();
        assert_eq!(current.get(PRIMARY_TOKEN).unwrap().value, "fresh");
        assert!(current.get("orgId").is_none());
        assert!(session.is_authenticated());
        assert_eq!(logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let (auth, logins) = counting(3600.0);
        let session = Arc::new(AuthSession::in_memory(auth, creds(), SessionStore::new()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let session = session.clone();
                tokio::spawn(async move { session.ensure_valid().await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(logins.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_login_without_usable_cookie_is_auth_error() {
        let (auth, _) = counting(10.0);
        let session = AuthSession::in_memory(auth, creds(), SessionStore::new());

        let err = session.ensure_valid().await.unwrap_err();
        assert!(err.is_auth());
        assert!(session.store().is_empty());
    }

    #[tokio::test]
    async fn test_failed_login_propagates() {
        let session = AuthSession::in_memory(FailingAuthenticator, creds(), SessionStore::new());
        let err = session.ensure_valid().await.unwrap_err();
        assert!(err.is_auth());
        assert!(err.to_string().contains("MFA approval timed out"));
    }

    #[tokio::test]
    async fn test_missing_credentials() {
        let (auth, logins) = counting(3600.0);
        let session = AuthSession::in_memory(auth, None, SessionStore::new());

        assert!(session.ensure_valid().await.unwrap_err().is_auth());
        assert_eq!(logins.load(Ordering::SeqCst), 0);

        session.set_credentials(Credentials::new("late@example.com", "pw"));
        assert!(session.ensure_valid().await.is_ok());
    }

    #[tokio::test]
    async fn test_login_attempt_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");

        let (auth, _) = counting(3600.0);
        let session = AuthSession::new(auth, creds(), path.clone()).unwrap();
        session.refresh().await.unwrap();

        let saved = SessionStore::load(&path).unwrap();
        assert_eq!(saved.get(PRIMARY_TOKEN).unwrap().value, "fresh");

        session.logout().await.unwrap();
        assert!(SessionStore::load(&path).unwrap().is_empty());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_corrupt_session_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cookies.json");
        std::fs::write(&path, "{").unwrap();

        let (auth, _) = counting(3600.0);
        let session = AuthSession::new(auth, creds(), path).unwrap();
        assert!(session.store().is_empty());
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_explicit_login_reports_unsaved_session() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, "").unwrap();
        let path = blocker.join("cookies.json");

        let (auth, logins) = counting(3600.0);
        let session = AuthSession::new(auth, creds(), path.clone()).unwrap();
        assert!(matches!(
            session.refresh().await.unwrap_err(),
            CrmError::Storage { .. }
        ));

        // the implicit path keeps working with the in-memory session
        let (auth, _) = counting(3600.0);
        let session = AuthSession::new(auth, creds(), path).unwrap();
        let current = session.ensure_valid().await.unwrap();
        assert_eq!(current.get(PRIMARY_TOKEN).unwrap().value, "fresh");
        assert_eq!(logins.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let debug = format!("{:?}", Credentials::new("user", "hunter2"));
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }
}
