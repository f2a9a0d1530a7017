//! Identity management.
//!
//! Signs a user in through the Microsoft OAuth2 authorization-code flow with
//! PKCE, then walks the downstream chain to a game session:
//!
//! ```text
//! code + verifier ─► provider token ─► Xbox Live ─► XSTS ─► game token ─► profile
//! ```
//!
//! Sessions are persisted per subject in `tokens.json` and refreshed with the
//! provider refresh handle when they expire. Callback URIs delivered by the
//! OS can be pushed through [`IdentityManager::spawn_callback_inbox`].

mod callback;
mod error;
mod manager;
mod microsoft;
mod pending;
pub mod pkce;
mod provider;
mod session;
mod store;

pub use callback::{parse_callback, CallbackParams};
pub use error::{AuthError, AuthResult, ExchangeHop};
pub use manager::{IdentityManager, LoginEvent, LoginRequest, DEFAULT_TOKEN_LIFETIME_SECS};
pub use microsoft::{MicrosoftConfig, MicrosoftProvider};
pub use pending::PendingLogins;
pub use provider::{GameProfile, GameToken, IdentityProvider, ProviderTokens, XboxToken};
pub use session::{now_unix, AuthToken, SessionToken};
pub use store::TokenStore;
