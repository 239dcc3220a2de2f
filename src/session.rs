//! Session token lifecycle: load the cached token, validate it, and bootstrap
//! a new one from the device identity when needed.

use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderValue};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::ApiConfig;
use crate::device::{DeviceIdentity, TOKEN_HEADER};
use crate::error::{Error, Result, describe_response};
use crate::token::{SessionToken, TokenStore};

/// Owns authentication for one client instance.
///
/// The live token is kept behind an async mutex, so concurrent callers of
/// [`ensure_authenticated`](Self::ensure_authenticated) on the same instance
/// never bootstrap twice. Only tokens that passed the profile probe are ever
/// stored as live, and a token the probe rejected is never presented again
/// by this instance.
pub struct SessionManager {
    http: Client,
    api: ApiConfig,
    identity: DeviceIdentity,
    store: TokenStore,
    request_timeout: Duration,
    state: Mutex<AuthState>,
}

#[derive(Default)]
struct AuthState {
    live: Option<SessionToken>,
    rejected: Vec<SessionToken>,
}

impl AuthState {
    fn is_rejected(&self, token: &SessionToken) -> bool {
        self.rejected.contains(token)
    }
}

impl SessionManager {
    pub fn new(
        http: Client,
        api: ApiConfig,
        identity: DeviceIdentity,
        store: TokenStore,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http,
            api,
            identity,
            store,
            request_timeout,
            state: Mutex::new(AuthState::default()),
        }
    }

    pub fn http(&self) -> &Client {
        &self.http
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Absolute URL of a mobile-API path such as `tasks/123`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api.base_url.trim_end_matches('/'), path)
    }

    fn oracle_endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.api.oracle_url.trim_end_matches('/'), path)
    }

    /// Make sure a validated session token is live.
    ///
    /// 1. If this instance already holds a validated token, return at once.
    /// 2. Otherwise load the cached token and probe the profile endpoint with it.
    /// 3. If that fails, run the setup handshake, persist the new token and
    ///    probe once more. A second failure is [`Error::Auth`].
    ///
    /// Rejected tokens are remembered and removed from the cache file.
    pub async fn ensure_authenticated(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.live.is_some() {
            return Ok(());
        }

        if let Some(cached) = self.store.load() {
            if state.is_rejected(&cached) {
                log::debug!("Cached token was already rejected, skipping it");
            } else if self.probe(&cached).await? {
                log::info!("Logged in with cached token");
                state.live = Some(cached);
                return Ok(());
            } else {
                log::info!("Cached token was rejected, discarding it");
                self.reject(&mut state, cached);
            }
        }

        log::info!("Requesting a new session token...");
        let fresh = self.bootstrap().await?;
        if state.is_rejected(&fresh) {
            return Err(Error::Auth(
                "setup handed out a token that was already rejected".into(),
            ));
        }
        if let Err(e) = self.store.save(&fresh) {
            log::warn!(
                "Could not cache session token at {}: {e}",
                self.store.path().display()
            );
        }

        if !self.probe(&fresh).await? {
            self.reject(&mut state, fresh);
            return Err(Error::Auth(
                "profile activation failed even with a freshly issued token".into(),
            ));
        }

        log::info!("New token acquired and user profile activated");
        state.live = Some(fresh);
        Ok(())
    }

    fn reject(&self, state: &mut AuthState, token: SessionToken) {
        if let Err(e) = self.store.clear() {
            log::warn!(
                "Could not remove rejected token cache {}: {e}",
                self.store.path().display()
            );
        }
        state.rejected.push(token);
    }

    /// Drop the live token so the next [`ensure_authenticated`](Self::ensure_authenticated)
    /// re-validates from scratch.
    pub async fn invalidate(&self) {
        self.state.lock().await.live.take();
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.live.is_some()
    }

    /// Device headers plus the live session token.
    pub async fn auth_headers(&self) -> Result<HeaderMap> {
        let state = self.state.lock().await;
        let token = state
            .live
            .as_ref()
            .ok_or_else(|| Error::Auth("no active session".into()))?;
        self.headers_with(token)
    }

    fn headers_with(&self, token: &SessionToken) -> Result<HeaderMap> {
        let mut headers = self.identity.base_headers();
        let value = HeaderValue::from_str(token.as_str())
            .map_err(|_| Error::Auth("session token is not a valid header value".into()))?;
        headers.insert(TOKEN_HEADER, value);
        Ok(headers)
    }

    /// `GET users/@me` with `token`. Any non-2xx answer means "not valid".
    async fn probe(&self, token: &SessionToken) -> Result<bool> {
        let headers = match self.headers_with(token) {
            Ok(h) => h,
            Err(_) => return Ok(false),
        };

        let resp = self
            .http
            .get(self.endpoint("users/@me"))
            .headers(headers)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            log::debug!("Profile probe rejected: {}", resp.status());
            return Ok(false);
        }

        let profile: serde_json::Value = resp.json().await.unwrap_or_default();
        match profile.get("balance") {
            Some(balance) => log::info!("User profile active. Balance: {balance}"),
            None => log::info!("User profile active. Balance: N/A"),
        }
        Ok(true)
    }

    /// Unauthenticated setup call that mints a new token.
    async fn bootstrap(&self) -> Result<SessionToken> {
        let headers = self
            .identity
            .bootstrap_headers(chrono::Utc::now().timestamp());

        let resp = self
            .http
            .get(self.oracle_endpoint("setup"))
            .headers(headers)
            .timeout(self.request_timeout)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::Auth(format!(
                "setup request failed: {}",
                describe_response(resp).await
            )));
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::Auth(format!("setup response is not JSON: {e}")))?;

        extract_setup_token(&data)
            .ok_or_else(|| Error::Auth(format!("token not found in setup response: {data}")))
    }
}

/// Token location in the setup response: `settings.__identity__.token`.
fn extract_setup_token(data: &serde_json::Value) -> Option<SessionToken> {
    data.pointer("/settings/__identity__/token")
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .map(SessionToken::new)
}
