use crate::client::{create_rest_client, Config};
use crate::context::{CallContext, Reply};
use crate::error::{map_error, BigIpError, Result};
use crate::path::ResourcePath;
use crate::token::{IssuedToken, LoginResponse, Token};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Header carrying the auth token
pub const TOKEN_HEADER: &str = "X-F5-Auth-Token";

const LOGIN_PATH: &str = "mgmt/shared/authn/login";
const TOKENS_PATH: &str = "mgmt/shared/authz/tokens";

enum AuthMode {
    /// Credentials sent with every request
    Basic,
    /// Bearer token obtained by login, renewed on expiry or rejection
    Token(Mutex<Token>),
}

/// One outgoing request, replayable after a token refresh
pub(crate) struct Call {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
}

/// Authenticated session with one appliance.
///
/// A `Session` can be shared between threads; the token is the only mutable
/// state and is renewed under a lock, so a request never carries a token that
/// a completed refresh has already replaced.
pub struct Session {
    client: Client,
    config: Config,
    base_url: Url,
    auth: AuthMode,
}

impl Session {
    /// Create a session sending basic-auth credentials on every request.
    ///
    /// No network call is made.
    pub fn basic(config: Config) -> Result<Self> {
        Ok(Session {
            client: create_rest_client(&config)?,
            base_url: config.base_url()?,
            config,
            auth: AuthMode::Basic,
        })
    }

    /// Create a token session, logging in immediately
    pub fn token(config: Config) -> Result<Self> {
        Session::token_with_context(config, &CallContext::background())
    }

    /// Create a token session, logging in under the given context
    pub fn token_with_context(config: Config, cx: &CallContext) -> Result<Self> {
        let client = create_rest_client(&config)?;
        let base_url = config.base_url()?;
        let token = login(&client, &config, &base_url, cx)?;
        Ok(Session {
            client,
            config,
            base_url,
            auth: AuthMode::Token(Mutex::new(token)),
        })
    }

    /// Create a token session from a token obtained elsewhere.
    ///
    /// The configured credentials are used once the token expires.
    pub fn from_token(config: Config, token: Token) -> Result<Self> {
        Ok(Session {
            client: create_rest_client(&config)?,
            base_url: config.base_url()?,
            config,
            auth: AuthMode::Token(Mutex::new(token)),
        })
    }

    /// Session configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Appliance base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Whether this session authenticates with a token
    pub fn is_token_session(&self) -> bool {
        matches!(self.auth, AuthMode::Token(_))
    }

    /// Current token value, for token sessions
    pub fn token_value(&self) -> Option<String> {
        match self.auth {
            AuthMode::Basic => None,
            AuthMode::Token(ref state) => Some(lock(state).value.clone()),
        }
    }

    /// Force the next call to log in again
    pub fn mark_token_expired(&self) {
        if let AuthMode::Token(ref state) = self.auth {
            lock(state).mark_expired();
        }
    }

    pub(crate) fn url(&self, path: &ResourcePath) -> Result<Url> {
        path.to_url(&self.base_url)
    }

    /// Attach credentials to an outgoing request.
    ///
    /// Returns the token used, if any. An expired token is renewed first unless
    /// this call already refreshed once.
    fn authorize(
        &self,
        cx: &CallContext,
        request: RequestBuilder,
        refreshed: &mut bool,
    ) -> Result<(RequestBuilder, Option<String>)> {
        match self.auth {
            AuthMode::Basic => Ok((
                request.basic_auth(&self.config.username, Some(&self.config.password)),
                None,
            )),
            AuthMode::Token(ref state) => {
                let mut token = lock(state);
                if token.is_expired() && !*refreshed {
                    debug!("auth token expired, logging in again");
                    *token = login(&self.client, &self.config, &self.base_url, cx)?;
                    *refreshed = true;
                }
                let value = token.value.clone();
                Ok((request.header(TOKEN_HEADER, value.as_str()), Some(value)))
            }
        }
    }

    /// Re-login after the appliance rejected `stale`.
    ///
    /// If another caller already replaced that token, its replacement is kept.
    fn refresh_if_needed(&self, cx: &CallContext, stale: &str) -> Result<()> {
        if let AuthMode::Token(ref state) = self.auth {
            let mut token = lock(state);
            if token.value != stale {
                debug!("auth token already refreshed by a concurrent call");
                return Ok(());
            }
            *token = login(&self.client, &self.config, &self.base_url, cx)?;
        }
        Ok(())
    }

    /// Execute a request with authorization, one refresh-and-replay on 401,
    /// and error mapping for any other non-2xx status.
    pub(crate) fn execute(&self, cx: &CallContext, call: &Call) -> Result<Reply> {
        let mut refreshed = false;

        loop {
            cx.check()?;

            let mut request = self
                .client
                .request(call.method.clone(), call.url.clone())
                .headers(call.headers.clone())
                .timeout(cx.attempt_timeout(self.config.timeout));
            if let Some(ref body) = call.body {
                request = request.body(body.clone());
            }
            let (request, used_token) = self.authorize(cx, request, &mut refreshed)?;

            let start = Instant::now();
            let reply = cx.dispatch(request)?;
            let status = reply.status;
            debug!(
                method = %call.method,
                path = call.url.path(),
                status = status.as_u16(),
                elapsed = ?start.elapsed(),
                "appliance request"
            );

            if status.is_success() {
                return Ok(reply);
            }

            if status == StatusCode::UNAUTHORIZED && !refreshed {
                if let Some(stale) = used_token {
                    debug!("auth token rejected, re-authenticating once");
                    self.refresh_if_needed(cx, &stale)?;
                    refreshed = true;
                    continue;
                }
            }

            let err = map_error(status.as_u16(), &reply.body, &self.config.error_patterns);
            if err.is_auth_failure() {
                warn!(path = call.url.path(), "appliance rejected credentials");
            }
            return Err(err);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url.as_str())
            .field("token_session", &self.is_token_session())
            .finish()
    }
}

fn lock(state: &Mutex<Token>) -> MutexGuard<'_, Token> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Obtain a fresh token, wrapping every failure as a login error
fn login(client: &Client, config: &Config, base_url: &Url, cx: &CallContext) -> Result<Token> {
    try_login(client, config, base_url, cx).map_err(|e| {
        warn!(user = %config.username, error = %e, "login failed");
        BigIpError::Login(Box::new(e))
    })
}

fn try_login(client: &Client, config: &Config, base_url: &Url, cx: &CallContext) -> Result<Token> {
    cx.check()?;

    let url = ResourcePath::new(LOGIN_PATH).to_url(base_url)?;
    let body = serde_json::json!({
        "username": config.username,
        "password": config.password,
        "loginProviderName": config.login_provider,
    });

    let request = client
        .post(url)
        .json(&body)
        .timeout(cx.attempt_timeout(config.timeout));
    let bytes = read_success(cx.dispatch(request)?, config)?;
    let login: LoginResponse = serde_json::from_slice(&bytes)?;
    let mut token: Token = login.token.into();

    if let Some(lifetime) = config.token_timeout {
        extend_token(client, config, base_url, cx, &mut token, lifetime)?;
    }

    debug!(user = %config.username, expires_at = %token.expires_at, "obtained auth token");
    Ok(token)
}

/// Ask the appliance to keep `token` valid for `lifetime`
fn extend_token(
    client: &Client,
    config: &Config,
    base_url: &Url,
    cx: &CallContext,
    token: &mut Token,
    lifetime: Duration,
) -> Result<()> {
    cx.check()?;

    let secs = i64::try_from(lifetime.as_secs())
        .map_err(|_| BigIpError::Config(format!("token lifetime too large: {:?}", lifetime)))?;
    let url = ResourcePath::new(TOKENS_PATH).segments(&token.value).to_url(base_url)?;

    let request = client
        .patch(url)
        .header(TOKEN_HEADER, token.value.as_str())
        .json(&serde_json::json!({ "timeout": secs }))
        .timeout(cx.attempt_timeout(config.timeout));
    let bytes = read_success(cx.dispatch(request)?, config)?;
    let issued: IssuedToken = serde_json::from_slice(&bytes)?;

    token.set_lifetime(issued.timeout.unwrap_or(secs));
    if let Some(expiration) = issued.expiration_micros {
        token.expires_at = expiration.0;
    }
    Ok(())
}

fn read_success(reply: Reply, config: &Config) -> Result<Vec<u8>> {
    if !reply.status.is_success() {
        return Err(map_error(reply.status.as_u16(), &reply.body, &config.error_patterns));
    }
    Ok(reply.body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_session_makes_no_call() {
        // Nothing listens on this address; construction must still succeed
        let session = Session::basic(Config::new("https://127.0.0.1:1", "admin", "admin")).unwrap();
        assert!(!session.is_token_session());
        assert_eq!(session.token_value(), None);
    }

    #[test]
    fn test_from_token() {
        let token = Token::new("T1".to_string(), 1200);
        let session = Session::from_token(Config::new("10.1.1.4", "admin", "admin"), token).unwrap();
        assert!(session.is_token_session());
        assert_eq!(session.token_value().as_deref(), Some("T1"));
        assert_eq!(session.base_url().as_str(), "https://10.1.1.4/");
    }

    #[test]
    fn test_token_session_login_failure_is_auth_error() {
        let config = Config::new("http://127.0.0.1:1", "admin", "admin")
            .with_timeout(Duration::from_secs(2));
        let err = Session::token(config).unwrap_err();
        assert!(err.is_auth_failure());
        assert!(matches!(err, BigIpError::Login(_)));
    }
}
