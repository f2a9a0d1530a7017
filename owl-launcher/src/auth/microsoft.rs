//! Microsoft account → Xbox Live → XSTS → game service chain over HTTPS.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::BoxFuture;

use super::error::{AuthError, AuthResult, ExchangeHop};
use super::provider::{GameProfile, GameToken, IdentityProvider, ProviderTokens, XboxToken};

/// XSTS error codes with a user-facing explanation.
const XSTS_NO_ACCOUNT: u64 = 2_148_916_233;
const XSTS_CHILD_ACCOUNT: u64 = 2_148_916_238;

/// Endpoints and client registration for the Microsoft login chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MicrosoftConfig {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: String,
    pub authorize_url: String,
    pub token_url: String,
    pub xbox_auth_url: String,
    pub xsts_auth_url: String,
    pub game_login_url: String,
    pub profile_url: String,
}

impl Default for MicrosoftConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: "owl-launcher://callback".to_string(),
            scopes: "XboxLive.signin offline_access".to_string(),
            authorize_url: "https://login.microsoftonline.com/consumers/oauth2/v2.0/authorize"
                .to_string(),
            token_url: "https://login.microsoftonline.com/consumers/oauth2/v2.0/token".to_string(),
            xbox_auth_url: "https://user.auth.xboxlive.com/user/authenticate".to_string(),
            xsts_auth_url: "https://xsts.auth.xboxlive.com/xsts/authorize".to_string(),
            game_login_url: "https://api.minecraftservices.com/authentication/login_with_xbox"
                .to_string(),
            profile_url: "https://api.minecraftservices.com/minecraft/profile".to_string(),
        }
    }
}

#[derive(Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XboxResponse {
    token: String,
    display_claims: DisplayClaims,
}

#[derive(Deserialize)]
struct DisplayClaims {
    xui: Vec<UserHash>,
}

#[derive(Deserialize)]
struct UserHash {
    uhs: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct XstsErrorResponse {
    x_err: Option<u64>,
    message: Option<String>,
}

#[derive(Deserialize)]
struct GameLoginResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Deserialize)]
struct ProfileResponse {
    id: String,
    name: String,
}

/// Real [`IdentityProvider`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct MicrosoftProvider {
    client: Client,
    config: MicrosoftConfig,
}

impl MicrosoftProvider {
    pub fn new(config: MicrosoftConfig, timeout: Duration) -> AuthResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::exchange(ExchangeHop::AuthorizationCode, e))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &MicrosoftConfig {
        &self.config
    }

    async fn token_request(
        &self,
        hop: ExchangeHop,
        form: &[(&str, &str)],
    ) -> AuthResult<ProviderTokens> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| AuthError::transport(hop, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::exchange(hop, format!("HTTP {}: {}", status, body)));
        }

        let parsed: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::exchange(hop, e))?;
        Ok(ProviderTokens {
            access_token: parsed.access_token,
            refresh_token: parsed.refresh_token,
        })
    }

    async fn xbox_request(
        &self,
        hop: ExchangeHop,
        url: &str,
        body: serde_json::Value,
    ) -> AuthResult<XboxToken> {
        let response = self
            .client
            .post(url)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::transport(hop, e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::exchange(hop, describe_xbox_error(status, &text)));
        }

        let parsed: XboxResponse = response
            .json()
            .await
            .map_err(|e| AuthError::exchange(hop, e))?;
        let user_hash = parsed
            .display_claims
            .xui
            .into_iter()
            .next()
            .map(|claim| claim.uhs)
            .ok_or_else(|| AuthError::exchange(hop, "response carries no user hash"))?;

        Ok(XboxToken {
            token: parsed.token,
            user_hash,
        })
    }
}

fn describe_xbox_error(status: reqwest::StatusCode, body: &str) -> String {
    let parsed: Option<XstsErrorResponse> = serde_json::from_str(body).ok();
    match parsed.and_then(|p| p.x_err.map(|code| (code, p.message))) {
        Some((XSTS_NO_ACCOUNT, _)) => "the account has no Xbox profile".to_string(),
        Some((XSTS_CHILD_ACCOUNT, _)) => {
            "the account is a child account and must be added to a family".to_string()
        }
        Some((code, message)) => format!(
            "HTTP {} XErr {}{}",
            status,
            code,
            message.map(|m| format!(": {m}")).unwrap_or_default()
        ),
        None => format!("HTTP {}", status),
    }
}

impl IdentityProvider for MicrosoftProvider {
    fn authorization_url(&self, challenge: &str, state: &str) -> String {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("client_id", &self.config.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes)
            .append_pair("code_challenge", challenge)
            .append_pair("code_challenge_method", "S256")
            .append_pair("response_mode", "query")
            .append_pair("state", state)
            .finish();
        format!("{}?{}", self.config.authorize_url, query)
    }

    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        verifier: &'a str,
    ) -> BoxFuture<'a, AuthResult<ProviderTokens>> {
        Box::pin(async move {
            debug!("Redeeming authorization code");
            self.token_request(
                ExchangeHop::AuthorizationCode,
                &[
                    ("client_id", self.config.client_id.as_str()),
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", self.config.redirect_uri.as_str()),
                    ("code_verifier", verifier),
                    ("scope", self.config.scopes.as_str()),
                ],
            )
            .await
        })
    }

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, AuthResult<ProviderTokens>> {
        Box::pin(async move {
            debug!("Refreshing provider token");
            self.token_request(
                ExchangeHop::RefreshToken,
                &[
                    ("client_id", self.config.client_id.as_str()),
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token),
                    ("scope", self.config.scopes.as_str()),
                ],
            )
            .await
        })
    }

    fn xbox_live<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, AuthResult<XboxToken>> {
        Box::pin(async move {
            let body = json!({
                "Properties": {
                    "AuthMethod": "RPS",
                    "SiteName": "user.auth.xboxlive.com",
                    "RpsTicket": format!("d={}", access_token),
                },
                "RelyingParty": "http://auth.xboxlive.com",
                "TokenType": "JWT",
            });
            self.xbox_request(ExchangeHop::XboxLive, &self.config.xbox_auth_url, body)
                .await
        })
    }

    fn xsts<'a>(&'a self, user_token: &'a str) -> BoxFuture<'a, AuthResult<XboxToken>> {
        Box::pin(async move {
            let body = json!({
                "Properties": {
                    "SandboxId": "RETAIL",
                    "UserTokens": [user_token],
                },
                "RelyingParty": "rp://api.minecraftservices.com/",
                "TokenType": "JWT",
            });
            self.xbox_request(ExchangeHop::Xsts, &self.config.xsts_auth_url, body)
                .await
        })
    }

    fn game_token<'a>(&'a self, xsts: &'a XboxToken) -> BoxFuture<'a, AuthResult<GameToken>> {
        Box::pin(async move {
            let hop = ExchangeHop::GameService;
            let body = json!({
                "identityToken": format!("XBL3.0 x={};{}", xsts.user_hash, xsts.token),
            });
            let response = self
                .client
                .post(&self.config.game_login_url)
                .json(&body)
                .send()
                .await
                .map_err(|e| AuthError::transport(hop, e))?;

            let status = response.status();
            if !status.is_success() {
                return Err(AuthError::exchange(hop, format!("HTTP {}", status)));
            }

            let parsed: GameLoginResponse = response
                .json()
                .await
                .map_err(|e| AuthError::exchange(hop, e))?;
            Ok(GameToken {
                access_token: parsed.access_token,
                expires_in: parsed.expires_in,
            })
        })
    }

    fn profile<'a>(&'a self, game_token: &'a str) -> BoxFuture<'a, AuthResult<GameProfile>> {
        Box::pin(async move {
            let hop = ExchangeHop::Profile;
            let response = self
                .client
                .get(&self.config.profile_url)
                .bearer_auth(game_token)
                .send()
                .await
                .map_err(|e| AuthError::transport(hop, e))?;

            let status = response.status();
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(AuthError::exchange(hop, "the account does not own the game"));
            }
            if !status.is_success() {
                return Err(AuthError::exchange(hop, format!("HTTP {}", status)));
            }

            let parsed: ProfileResponse = response
                .json()
                .await
                .map_err(|e| AuthError::exchange(hop, e))?;
            Ok(GameProfile {
                id: parsed.id,
                name: parsed.name,
            })
        })
    }
}
