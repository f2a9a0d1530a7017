//! Callback URI parsing.
//!
//! The OS hands the launcher the redirect URI in several shapes depending on
//! platform and how the app was started:
//!
//! - `owl-launcher://callback?code=..&state=..`
//! - `/callback?code=..&state=..`
//! - `?code=..&state=..` or a bare `code=..&state=..`
//!
//! All of them normalize to the same [`CallbackParams`].

use super::error::{AuthError, AuthResult};

/// The parameters carried back by the authorization redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

/// Extract the query portion of any supported callback shape.
fn query_part(uri: &str) -> &str {
    let uri = uri.trim();
    let uri = uri.split_once('#').map(|(before, _)| before).unwrap_or(uri);
    match uri.split_once('?') {
        Some((_, query)) => query,
        None if uri.contains('=') => uri.trim_start_matches('/'),
        None => "",
    }
}

/// Parse a callback URI into its code and state.
///
/// # Errors
///
/// - [`AuthError::ProviderRejected`] if the redirect carries an `error` parameter
/// - [`AuthError::MalformedCallback`] if `code` or `state` is missing
pub fn parse_callback(uri: &str) -> AuthResult<CallbackParams> {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;

    for (key, value) in url::form_urlencoded::parse(query_part(uri).as_bytes()) {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(AuthError::ProviderRejected { error, description });
    }

    if uri.trim().is_empty() {
        return Err(AuthError::MalformedCallback("empty callback".to_string()));
    }

    match (code.filter(|c| !c.is_empty()), state.filter(|s| !s.is_empty())) {
        (Some(code), Some(state)) => Ok(CallbackParams { code, state }),
        (None, _) => Err(AuthError::MalformedCallback("missing code".to_string())),
        (_, None) => Err(AuthError::MalformedCallback("missing state".to_string())),
    }
}
