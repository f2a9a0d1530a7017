//! The identity manager: login flow, session lookup with refresh, logout.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::locks::KeyedLocks;

use super::callback::parse_callback;
use super::error::{AuthError, AuthResult};
use super::pending::PendingLogins;
use super::pkce::PkcePair;
use super::provider::{IdentityProvider, ProviderTokens};
use super::session::{now_unix, SessionToken};
use super::store::TokenStore;

/// Lifetime assumed for a game token when the service omits `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

/// What the UI needs to start a login.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub authorization_url: String,
    pub state: String,
    pub code_verifier: String,
}

/// Outcome of a callback delivered through the inbox.
#[derive(Debug, Clone)]
pub enum LoginEvent {
    SignedIn { uuid: String, name: String },
    Failed { message: String },
}

/// Owns the pending-login table, the token store and the provider chain.
pub struct IdentityManager {
    provider: Arc<dyn IdentityProvider>,
    pending: PendingLogins,
    store: TokenStore,
    locks: KeyedLocks,
    client_token: String,
    exchange_timeout: Duration,
    events: broadcast::Sender<LoginEvent>,
}

impl IdentityManager {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        store: TokenStore,
        pending_ttl: Duration,
        exchange_timeout: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            provider,
            pending: PendingLogins::new(pending_ttl),
            store,
            locks: KeyedLocks::new(),
            client_token: uuid::Uuid::new_v4().simple().to_string(),
            exchange_timeout,
            events,
        }
    }

    /// Start a login: generate PKCE material and remember it under a fresh state.
    pub fn begin_login(&self) -> LoginRequest {
        let pkce = PkcePair::generate();
        let state = uuid::Uuid::new_v4().to_string();
        let authorization_url = self.provider.authorization_url(&pkce.challenge, &state);

        self.pending.insert(state.clone(), pkce.verifier.clone());
        debug!(state = %state, "Login started");

        LoginRequest {
            authorization_url,
            state,
            code_verifier: pkce.verifier,
        }
    }

    /// Finish a login with the code and state from the callback.
    ///
    /// The state is consumed before any network call, so a replayed or
    /// concurrent second completion fails with [`AuthError::InvalidState`].
    pub async fn complete_login(&self, code: &str, state: &str) -> AuthResult<SessionToken> {
        let verifier = self.pending.take(state).ok_or(AuthError::InvalidState)?;

        let chain = async {
            let tokens = self.provider.exchange_code(code, &verifier).await?;
            self.run_chain(tokens).await
        };
        let token = self.with_timeout(chain).await?;

        let _guard = self.locks.lock(&token.uuid).await;
        self.store.put(token.clone()).await?;
        info!(uuid = %token.uuid, name = %token.name, "Signed in");
        Ok(token)
    }

    /// Return a usable session for `subject`, refreshing it if needed.
    ///
    /// A stored, unexpired token is checked against the profile endpoint; a
    /// rejection removes it while a network failure keeps it. An expired token
    /// is refreshed through the full chain; if that fails the record is
    /// removed and `None` returned.
    pub async fn get_session(&self, subject: &str) -> AuthResult<Option<SessionToken>> {
        let _guard = self.locks.lock(subject).await;

        let Some(token) = self.store.get(subject) else {
            return Ok(None);
        };

        if !token.is_expired() {
            return match self.provider.profile(&token.access_token).await {
                Ok(_) => Ok(Some(token)),
                Err(e) if e.is_transient() => {
                    debug!(uuid = %subject, error = %e, "Could not validate session, keeping it");
                    Ok(Some(token))
                }
                Err(e) => {
                    warn!(uuid = %subject, error = %e, "Stored session rejected");
                    self.store.remove(subject).await?;
                    Ok(None)
                }
            };
        }

        let Some(refresh_token) = token.refresh_token.clone() else {
            debug!(uuid = %subject, "Session expired without refresh handle");
            self.store.remove(subject).await?;
            return Ok(None);
        };

        let refreshed = self
            .with_timeout(async {
                let tokens = self.provider.refresh(&refresh_token).await?;
                self.run_chain(tokens).await
            })
            .await;

        match refreshed {
            Ok(mut fresh) if fresh.uuid == subject => {
                if fresh.refresh_token.is_none() {
                    fresh.refresh_token = Some(refresh_token);
                }
                self.store.put(fresh.clone()).await?;
                info!(uuid = %subject, "Session refreshed");
                Ok(Some(fresh))
            }
            Ok(other) => {
                warn!(uuid = %subject, refreshed = %other.uuid, "Refresh returned a different profile");
                self.store.remove(subject).await?;
                Ok(None)
            }
            Err(e) => {
                warn!(uuid = %subject, error = %e, "Session refresh failed");
                self.store.remove(subject).await?;
                Ok(None)
            }
        }
    }

    /// Forget the subject's session. Only local state is touched.
    pub async fn logout(&self, subject: &str) -> AuthResult<()> {
        let _guard = self.locks.lock(subject).await;
        self.store.remove(subject).await?;
        info!(uuid = %subject, "Signed out");
        Ok(())
    }

    /// Subscribe to results of callbacks delivered through [`Self::spawn_callback_inbox`].
    pub fn subscribe(&self) -> broadcast::Receiver<LoginEvent> {
        self.events.subscribe()
    }

    /// Consume raw callback URIs from a channel and complete logins.
    ///
    /// The task ends when every sender is dropped.
    pub fn spawn_callback_inbox(
        self: Arc<Self>,
        mut inbox: mpsc::Receiver<String>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(uri) = inbox.recv().await {
                let result = match parse_callback(&uri) {
                    Ok(params) => self.complete_login(&params.code, &params.state).await,
                    Err(e) => Err(e),
                };
                let event = match result {
                    Ok(token) => LoginEvent::SignedIn {
                        uuid: token.uuid,
                        name: token.name,
                    },
                    Err(e) => {
                        warn!(error = %e, "Callback rejected");
                        LoginEvent::Failed {
                            message: e.to_string(),
                        }
                    }
                };
                // No subscribers is fine.
                let _ = self.events.send(event);
            }
        })
    }

    async fn run_chain(&self, tokens: ProviderTokens) -> AuthResult<SessionToken> {
        let user = self.provider.xbox_live(&tokens.access_token).await?;
        let xsts = self.provider.xsts(&user.token).await?;
        let game = self.provider.game_token(&xsts).await?;
        let profile = self.provider.profile(&game.access_token).await?;

        let lifetime = game.expires_in.unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS);
        Ok(SessionToken {
            access_token: game.access_token,
            client_token: self.client_token.clone(),
            uuid: profile.id,
            name: profile.name,
            expires_at: now_unix() + lifetime as i64,
            refresh_token: tokens.refresh_token,
        })
    }

    async fn with_timeout<F>(&self, future: F) -> AuthResult<SessionToken>
    where
        F: std::future::Future<Output = AuthResult<SessionToken>>,
    {
        tokio::time::timeout(self.exchange_timeout, future)
            .await
            .map_err(|_| AuthError::Timeout {
                timeout_secs: self.exchange_timeout.as_secs(),
            })?
    }
}
