//! The identity provider seam.
//!
//! [`IdentityProvider`] models each hop of the exchange chain as one call so
//! the manager can drive the chain, tag failures per hop and be tested with a
//! scripted fake. [`super::MicrosoftProvider`] is the real implementation.

use crate::BoxFuture;

use super::error::AuthResult;

/// Tokens issued by the OAuth provider.
#[derive(Clone)]
pub struct ProviderTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// An Xbox Live or XSTS token with the user hash from its display claims.
#[derive(Clone)]
pub struct XboxToken {
    pub token: String,
    pub user_hash: String,
}

/// Game-service access token.
#[derive(Clone)]
pub struct GameToken {
    pub access_token: String,
    pub expires_in: Option<u64>,
}

/// The game profile owned by the account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameProfile {
    pub id: String,
    pub name: String,
}

/// One call per hop of the login chain.
///
/// Implementations tag their own failures with the hop they belong to
/// (see [`super::ExchangeHop`]).
pub trait IdentityProvider: Send + Sync {
    /// Build the URL the user opens to sign in.
    fn authorization_url(&self, challenge: &str, state: &str) -> String;

    /// Redeem an authorization code together with its PKCE verifier.
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        verifier: &'a str,
    ) -> BoxFuture<'a, AuthResult<ProviderTokens>>;

    /// Redeem a refresh handle for fresh provider tokens.
    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, AuthResult<ProviderTokens>>;

    /// Provider access token → Xbox Live user token.
    fn xbox_live<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, AuthResult<XboxToken>>;

    /// Xbox Live user token → XSTS token.
    fn xsts<'a>(&'a self, user_token: &'a str) -> BoxFuture<'a, AuthResult<XboxToken>>;

    /// XSTS token → game-service token.
    fn game_token<'a>(&'a self, xsts: &'a XboxToken) -> BoxFuture<'a, AuthResult<GameToken>>;

    /// Game-service token → profile.
    fn profile<'a>(&'a self, game_token: &'a str) -> BoxFuture<'a, AuthResult<GameProfile>>;
}
