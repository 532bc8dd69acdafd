use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{CredentialProvider, FleetApi};
use crate::models::User;

use super::TokenStore;

/// Point-in-time view of the session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub credential: Option<String>,
    pub identity: Option<User>,
    /// True only while the startup token is being validated.
    pub is_loading: bool,
}

impl SessionSnapshot {
    pub fn is_authenticated(&self) -> bool {
        self.credential.is_some() && self.identity.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.is_authenticated() && self.identity.as_ref().is_some_and(User::is_admin)
    }

    pub fn username(&self) -> Option<&str> {
        self.identity.as_ref().map(|u| u.username.as_str())
    }
}

/// Shared read side of the session.
///
/// Clones observe the same cell. The HTTP client holds one as its
/// `CredentialProvider`, so the token it sends is always the published one.
#[derive(Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<SessionSnapshot>>,
}

impl SessionHandle {
    /// A fresh session, loading until `SessionManager::initialize` resolves.
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(SessionSnapshot {
                is_loading: true,
                ..SessionSnapshot::default()
            })),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.tx.subscribe()
    }

    pub fn is_authenticated(&self) -> bool {
        self.tx.borrow().is_authenticated()
    }

    pub fn is_admin(&self) -> bool {
        self.tx.borrow().is_admin()
    }

    pub fn is_loading(&self) -> bool {
        self.tx.borrow().is_loading
    }

    pub fn identity(&self) -> Option<User> {
        self.tx.borrow().identity.clone()
    }

    fn publish(&self, token: &str, user: User) {
        self.tx.send_modify(|s| {
            s.credential = Some(token.to_string());
            s.identity = Some(user);
        });
    }

    fn clear(&self) {
        self.tx.send_modify(|s| {
            s.credential = None;
            s.identity = None;
        });
    }

    fn finish_loading(&self) {
        self.tx.send_if_modified(|s| std::mem::replace(&mut s.is_loading, false));
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialProvider for SessionHandle {
    fn bearer_token(&self) -> Option<String> {
        self.tx.borrow().credential.clone()
    }
}

/// Owns the session lifecycle.
///
/// Public operations never return errors: failures are logged and reported
/// as `false`. A failed login publishes nothing, so an existing session
/// survives it; a failed token validation clears the session.
#[derive(Clone)]
pub struct SessionManager {
    api: Arc<dyn FleetApi>,
    tokens: Arc<dyn TokenStore>,
    handle: SessionHandle,
}

impl SessionManager {
    pub fn new(api: Arc<dyn FleetApi>, tokens: Arc<dyn TokenStore>, handle: SessionHandle) -> Self {
        Self {
            api,
            tokens,
            handle,
        }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.handle.snapshot()
    }

    /// Rehydrate the persisted token, validating it against the backend.
    pub async fn initialize(&self) {
        let token = match self.tokens.load() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted token");
                None
            }
        };

        match token {
            Some(token) => {
                debug!("Validating persisted token");
                self.check_auth(&token).await;
            }
            None => debug!("No persisted token"),
        }

        self.handle.finish_loading();
    }

    /// Validate `token` by fetching its identity. Any failure logs out.
    pub async fn check_auth(&self, token: &str) -> bool {
        match self.api.current_user(token).await {
            Ok(user) => {
                info!(username = %user.username, role = %user.role, "Session restored");
                self.handle.publish(token, user);
                true
            }
            Err(e) => {
                warn!(error = %e, "Token validation failed");
                self.logout();
                false
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> bool {
        match self.try_login(username, password).await {
            Ok(user) => {
                info!(username = %user.username, role = %user.role, "Logged in");
                true
            }
            Err(e) => {
                warn!(username, error = %e, "Login failed");
                false
            }
        }
    }

    async fn try_login(&self, username: &str, password: &str) -> Result<User> {
        let response = self
            .api
            .login(username, password)
            .await
            .context("Login request failed")?;
        let token = response.access_token;

        let user = self
            .api
            .current_user(&token)
            .await
            .context("Failed to fetch identity for new token")?;

        self.handle.publish(&token, user.clone());
        if let Err(e) = self.tokens.save(&token) {
            warn!(error = %e, "Failed to persist token; session will not survive restart");
        }
        Ok(user)
    }

    /// Create an account and log into it. Mismatched passwords never reach the backend.
    pub async fn register(&self, username: &str, password: &str, confirm_password: &str) -> bool {
        if password != confirm_password {
            debug!("Registration rejected: passwords do not match");
            return false;
        }
        match self.api.register(username, password, confirm_password).await {
            Ok(user) => {
                info!(username = %user.username, "Registered");
                self.login(username, password).await
            }
            Err(e) => {
                warn!(username, error = %e, "Registration failed");
                false
            }
        }
    }

    /// Same contract as `register`, creating an ADMIN account.
    pub async fn register_admin(
        &self,
        username: &str,
        password: &str,
        confirm_password: &str,
    ) -> bool {
        if password != confirm_password {
            debug!("Admin registration rejected: passwords do not match");
            return false;
        }
        match self
            .api
            .register_admin(username, password, confirm_password)
            .await
        {
            Ok(user) => {
                info!(username = %user.username, "Registered admin");
                self.login(username, password).await
            }
            Err(e) => {
                warn!(username, error = %e, "Admin registration failed");
                false
            }
        }
    }

    /// Clear the session and the persisted token.
    pub fn logout(&self) {
        let was_authenticated = self.handle.is_authenticated();
        self.handle.clear();
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "Failed to remove persisted token");
        }
        if was_authenticated {
            info!("Logged out");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;
    use crate::models::Role;
    use crate::testing::FakeBackend;

    fn manager_with(
        backend: Arc<FakeBackend>,
        tokens: Arc<MemoryTokenStore>,
    ) -> SessionManager {
        SessionManager::new(backend, tokens, SessionHandle::new())
    }

    #[tokio::test]
    async fn test_login_then_logout() {
        let backend = Arc::new(FakeBackend::new());
        let tokens = Arc::new(MemoryTokenStore::new());
        let manager = manager_with(backend.clone(), tokens.clone());
        manager.initialize().await;
        assert!(!manager.snapshot().is_authenticated());

        assert!(manager.login("alice", "secret1").await);
        let snapshot = manager.snapshot();
        assert!(snapshot.is_authenticated());
        assert!(!snapshot.is_admin());
        assert_eq!(snapshot.username(), Some("alice"));
        assert!(tokens.load().unwrap().is_some());
        assert_eq!(manager.handle().bearer_token(), snapshot.credential);

        manager.logout();
        let snapshot = manager.snapshot();
        assert!(!snapshot.is_authenticated());
        assert_eq!(snapshot.credential, None);
        assert_eq!(tokens.load().unwrap(), None);
        assert_eq!(manager.handle().bearer_token(), None);
    }

    #[tokio::test]
    async fn test_failed_login_leaves_session_cleared() {
        let backend = Arc::new(FakeBackend::new());
        let tokens = Arc::new(MemoryTokenStore::new());
        let manager = manager_with(backend.clone(), tokens.clone());

        assert!(!manager.login("alice", "wrong").await);
        assert!(!manager.snapshot().is_authenticated());
        assert_eq!(tokens.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_login_keeps_existing_session() {
        let backend = Arc::new(FakeBackend::new());
        let tokens = Arc::new(MemoryTokenStore::new());
        let manager = manager_with(backend.clone(), tokens.clone());
        manager.initialize().await;
        assert!(manager.login("admin", "admin123").await);
        let before = manager.snapshot();
        let stored = tokens.load().unwrap();
        assert!(stored.is_some());

        assert!(!manager.login("admin", "typo").await);

        let after = manager.snapshot();
        assert!(after.is_authenticated());
        assert_eq!(after.credential, before.credential);
        assert_eq!(after.username(), Some("admin"));
        assert_eq!(tokens.load().unwrap(), stored);
        assert_eq!(manager.handle().bearer_token(), before.credential);
    }

    #[tokio::test]
    async fn test_login_never_publishes_half_a_session() {
        let backend = Arc::new(FakeBackend::new());
        backend.fail("current_user", 500);
        let tokens = Arc::new(MemoryTokenStore::new());
        let manager = manager_with(backend.clone(), tokens.clone());
        let mut rx = manager.handle().subscribe();
        rx.mark_unchanged();

        assert!(!manager.login("admin", "admin123").await);
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.credential, None);
        assert_eq!(snapshot.identity, None);
        assert_eq!(tokens.load().unwrap(), None);
        // Every published state had credential and identity in step
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.credential.is_some(), seen.identity.is_some());
    }

    #[tokio::test]
    async fn test_admin_login() {
        let backend = Arc::new(FakeBackend::new());
        let manager = manager_with(backend, Arc::new(MemoryTokenStore::new()));
        assert!(manager.login("admin", "admin123").await);
        assert!(manager.snapshot().is_admin());
        assert!(manager.handle().is_admin());
    }

    #[tokio::test]
    async fn test_register_mismatch_makes_no_call() {
        let backend = Arc::new(FakeBackend::new());
        let manager = manager_with(backend.clone(), Arc::new(MemoryTokenStore::new()));

        assert!(!manager.register("bob", "secret1", "secret2").await);
        assert!(!manager.register_admin("bob", "secret1", "secret2").await);
        assert_eq!(backend.total_calls(), 0);
        assert!(!manager.snapshot().is_authenticated());
    }

    #[tokio::test]
    async fn test_register_logs_in() {
        let backend = Arc::new(FakeBackend::new());
        let manager = manager_with(backend.clone(), Arc::new(MemoryTokenStore::new()));

        assert!(manager.register("bob", "secret9", "secret9").await);
        let snapshot = manager.snapshot();
        assert_eq!(snapshot.username(), Some("bob"));
        assert_eq!(snapshot.identity.map(|u| u.role), Some(Role::User));
        assert_eq!(backend.calls(), vec!["register", "login", "current_user"]);
    }

    #[tokio::test]
    async fn test_register_admin_logs_in_as_admin() {
        let backend = Arc::new(FakeBackend::new());
        let manager = manager_with(backend.clone(), Arc::new(MemoryTokenStore::new()));

        assert!(manager.register_admin("root2", "secret9", "secret9").await);
        assert!(manager.snapshot().is_admin());
        assert_eq!(backend.call_count("register_admin"), 1);
    }

    #[tokio::test]
    async fn test_register_duplicate_fails() {
        let backend = Arc::new(FakeBackend::new());
        let manager = manager_with(backend.clone(), Arc::new(MemoryTokenStore::new()));
        assert!(!manager.register("alice", "secret1", "secret1").await);
        assert_eq!(backend.call_count("login"), 0);
    }

    #[tokio::test]
    async fn test_initialize_restores_valid_token() {
        let backend = Arc::new(FakeBackend::new());
        let token = backend.issue_token("admin");
        let tokens = Arc::new(MemoryTokenStore::with_token(&token));
        let manager = manager_with(backend.clone(), tokens.clone());

        assert!(manager.handle().is_loading());
        manager.initialize().await;

        let snapshot = manager.snapshot();
        assert!(!snapshot.is_loading);
        assert!(snapshot.is_admin());
        assert_eq!(snapshot.credential.as_deref(), Some(token.as_str()));
        assert_eq!(tokens.load().unwrap().as_deref(), Some(token.as_str()));
    }

    #[tokio::test]
    async fn test_initialize_with_expired_token() {
        let backend = Arc::new(FakeBackend::new());
        let token = backend.issue_token("alice");
        backend.revoke_tokens();
        let tokens = Arc::new(MemoryTokenStore::with_token(&token));
        let manager = manager_with(backend.clone(), tokens.clone());

        manager.initialize().await;

        let snapshot = manager.snapshot();
        assert!(!snapshot.is_loading);
        assert!(!snapshot.is_authenticated());
        assert_eq!(tokens.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_initialize_without_token_makes_no_call() {
        let backend = Arc::new(FakeBackend::new());
        let manager = manager_with(backend.clone(), Arc::new(MemoryTokenStore::new()));
        manager.initialize().await;
        assert!(!manager.handle().is_loading());
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_loading_flips_exactly_once() {
        let backend = Arc::new(FakeBackend::new());
        let token = backend.issue_token("alice");
        let manager = manager_with(backend, Arc::new(MemoryTokenStore::with_token(&token)));
        let mut rx = manager.handle().subscribe();
        rx.mark_unchanged();

        manager.initialize().await;
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().is_loading);

        // A second initialize must not republish the loading flag
        manager.initialize().await;
        assert!(!manager.handle().is_loading());
    }

    #[test]
    fn test_snapshot_predicates() {
        let user = User {
            id: 1,
            username: "root".into(),
            role: Role::Admin,
        };
        let identity_only = SessionSnapshot {
            credential: None,
            identity: Some(user.clone()),
            is_loading: false,
        };
        assert!(!identity_only.is_authenticated());
        assert!(!identity_only.is_admin());

        let full = SessionSnapshot {
            credential: Some("t".into()),
            identity: Some(user),
            is_loading: false,
        };
        assert!(full.is_authenticated());
        assert!(full.is_admin());
    }
}
