use std::time::Duration;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, LOCATION, ORIGIN, REFERER, USER_AGENT};
use reqwest::{redirect, StatusCode};
use tokio::sync::Mutex;

use crate::auth::pkce::PkceChallenge;
use crate::auth::scrape::{extract_code_from_redirect, extract_form_action};
use crate::auth::token::TokenSet;
use crate::error::HyperopticError;

/// Base URL of the Hyperoptic Keycloak realm.
pub const AUTH_BASE: &str = "https://auth.hyperoptic.com/realms/hyperoptic";
/// Public client id of the customer portal.
pub const CLIENT_ID: &str = "customer-portal";
/// Registered redirect URI. Never actually fetched; only its `code` query
/// parameter matters.
pub const REDIRECT_URI: &str = "https://account.hyperoptic.com/my-plan";
/// Scopes the portal front end requests.
pub const DEFAULT_SCOPES: &str = "openid email customer_id atlas-chat-audience profile";

const PORTAL_ORIGIN: &str = "https://account.hyperoptic.com";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/144.0.0.0 Safari/537.36";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_REDIRECT_HOPS: usize = 5;

/// The two ways of obtaining a token set from the realm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStrategy {
    /// Direct resource-owner password grant.
    PasswordGrant,
    /// Simulated-browser PKCE authorization-code flow.
    PkceFlow,
}

/// Browser-like headers the portal's bot mitigation expects on every call.
pub(crate) fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(ORIGIN, HeaderValue::from_static(PORTAL_ORIGIN));
    headers.insert(
        REFERER,
        HeaderValue::from_static("https://account.hyperoptic.com/"),
    );
    headers
}

/// Manages authentication against the Hyperoptic Keycloak realm.
///
/// Owns at most one [`TokenSet`] at a time, replaced wholesale on every
/// successful token response. Login and refresh transitions are serialized
/// behind a mutex so concurrent callers never observe a half-updated set.
pub struct PortalAuth {
    email: String,
    password: String,
    auth_base: String,
    http: reqwest::Client,
    tokens: Mutex<Option<TokenSet>>,
}

impl PortalAuth {
    pub fn new(email: &str, password: &str) -> Result<Self, HyperopticError> {
        Self::with_auth_base(email, password, AUTH_BASE)
    }

    /// Point the manager at a different realm base URL (used by tests).
    pub fn with_auth_base(
        email: &str,
        password: &str,
        auth_base: &str,
    ) -> Result<Self, HyperopticError> {
        let http = reqwest::Client::builder()
            .default_headers(browser_headers())
            .redirect(redirect::Policy::none())
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(PortalAuth {
            email: email.to_string(),
            password: password.to_string(),
            auth_base: auth_base.trim_end_matches('/').to_string(),
            http,
            tokens: Mutex::new(None),
        })
    }

    fn token_url(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.auth_base)
    }

    fn auth_url(&self) -> String {
        format!("{}/protocol/openid-connect/auth", self.auth_base)
    }

    /// Return a valid access token, logging in or refreshing as needed.
    ///
    /// This is the sole read path: unauthenticated managers log in, expired
    /// access tokens are refreshed, and a dead refresh token triggers a full
    /// re-login.
    pub async fn get_valid_access_token(&self) -> Result<String, HyperopticError> {
        let mut guard = self.tokens.lock().await;

        if let Some(tokens) = guard.as_ref() {
            if !tokens.access_expired() {
                return Ok(tokens.access_token.clone());
            }
            if !tokens.refresh_expired() {
                let refreshed = self.refresh(tokens.refresh_token.clone()).await?;
                let access_token = refreshed.access_token.clone();
                *guard = Some(refreshed);
                return Ok(access_token);
            }
            tracing::info!("refresh token expired, performing full re-login");
        }

        let fresh = self.authenticate().await?;
        let access_token = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access_token)
    }

    /// An `Authorization: Bearer ...` header value for the current token.
    pub async fn authorization_header(&self) -> Result<String, HyperopticError> {
        Ok(format!("Bearer {}", self.get_valid_access_token().await?))
    }

    /// Authenticate from scratch, replacing any held token set.
    pub async fn login(&self) -> Result<(), HyperopticError> {
        let tokens = self.authenticate().await?;
        *self.tokens.lock().await = Some(tokens);
        Ok(())
    }

    /// Snapshot of the currently held token set.
    pub async fn current_tokens(&self) -> Option<TokenSet> {
        self.tokens.lock().await.clone()
    }

    /// Run the login strategies in order: password grant first, PKCE flow
    /// when the realm refuses it. A password-grant refusal is an expected
    /// fallback trigger and is never surfaced; transport errors propagate.
    async fn authenticate(&self) -> Result<TokenSet, HyperopticError> {
        match self.login_password_grant().await {
            Ok(tokens) => {
                tracing::info!(strategy = ?LoginStrategy::PasswordGrant, "authenticated");
                Ok(tokens)
            }
            Err(HyperopticError::Authentication(reason)) => {
                tracing::info!(%reason, "password grant refused, falling back to PKCE flow");
                let tokens = self.login_pkce_flow().await?;
                tracing::info!(strategy = ?LoginStrategy::PkceFlow, "authenticated");
                Ok(tokens)
            }
            Err(other) => Err(other),
        }
    }

    async fn login_password_grant(&self) -> Result<TokenSet, HyperopticError> {
        let resp = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "password"),
                ("client_id", CLIENT_ID),
                ("username", self.email.as_str()),
                ("password", self.password.as_str()),
                ("scope", DEFAULT_SCOPES),
            ])
            .send()
            .await?;

        if resp.status() != StatusCode::OK {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(HyperopticError::Authentication(format!(
                "password grant failed ({status}): {body}"
            )));
        }

        Ok(TokenSet::from_response(resp.json().await?, Utc::now()))
    }

    async fn login_pkce_flow(&self) -> Result<TokenSet, HyperopticError> {
        let pkce = PkceChallenge::generate();

        // Cookie jar scoped to this single flow attempt; Keycloak session
        // cookies must travel from the login page into the form POST and
        // any redirect chain.
        let browser = reqwest::Client::builder()
            .default_headers(browser_headers())
            .redirect(redirect::Policy::none())
            .cookie_store(true)
            .timeout(HTTP_TIMEOUT)
            .build()?;

        let login_page = self.fetch_login_page(&browser, &pkce.code_challenge).await?;

        let form_action = extract_form_action(&login_page).ok_or_else(|| {
            HyperopticError::Authentication(
                "could not find login form action in Keycloak page".to_string(),
            )
        })?;

        let login_resp = browser
            .post(&form_action)
            .form(&[
                ("username", self.email.as_str()),
                ("password", self.password.as_str()),
            ])
            .send()
            .await?;

        if !matches!(
            login_resp.status(),
            StatusCode::FOUND | StatusCode::SEE_OTHER
        ) {
            return Err(HyperopticError::Authentication(format!(
                "expected redirect after credential submit, got {}; check email/password",
                login_resp.status()
            )));
        }

        let redirect_url = header_str(&login_resp, LOCATION);
        let code = match extract_code_from_redirect(&redirect_url) {
            Some(code) => code,
            None => self
                .walk_redirects_for_code(&browser, login_resp)
                .await?
                .ok_or_else(|| {
                    HyperopticError::Authentication(format!(
                        "could not extract authorization code from redirect: {redirect_url}"
                    ))
                })?,
        };

        self.exchange_code(&pkce.code_verifier, &code).await
    }

    /// GET the Keycloak login page with the PKCE parameters, following
    /// redirects by hand so the jar captures every session cookie.
    async fn fetch_login_page(
        &self,
        browser: &reqwest::Client,
        code_challenge: &str,
    ) -> Result<String, HyperopticError> {
        let mut resp = browser
            .get(self.auth_url())
            .query(&[
                ("client_id", CLIENT_ID),
                ("redirect_uri", REDIRECT_URI),
                ("response_type", "code"),
                ("scope", DEFAULT_SCOPES),
                ("code_challenge", code_challenge),
                ("code_challenge_method", "S256"),
            ])
            .send()
            .await?;

        for _ in 0..MAX_REDIRECT_HOPS {
            if !resp.status().is_redirection() {
                break;
            }
            let location = header_str(&resp, LOCATION);
            if location.is_empty() {
                break;
            }
            let Ok(next) = resp.url().join(&location) else {
                break;
            };
            resp = browser.get(next).send().await?;
        }

        if resp.status() != StatusCode::OK {
            return Err(HyperopticError::Authentication(format!(
                "failed to load Keycloak login page ({})",
                resp.status()
            )));
        }

        Ok(resp.text().await?)
    }

    /// Walk a redirect chain by hand (max 5 hops) looking for the `code`
    /// query parameter. A bounded loop over the next `Location` value, so
    /// the hop limit stays trivially enforceable.
    async fn walk_redirects_for_code(
        &self,
        browser: &reqwest::Client,
        mut resp: reqwest::Response,
    ) -> Result<Option<String>, HyperopticError> {
        for _ in 0..MAX_REDIRECT_HOPS {
            let location = header_str(&resp, LOCATION);
            if let Some(code) = extract_code_from_redirect(&location) {
                return Ok(Some(code));
            }
            if location.is_empty() {
                return Ok(None);
            }
            let Ok(next) = resp.url().join(&location) else {
                return Ok(None);
            };
            resp = browser.get(next).send().await?;
            if !resp.status().is_redirection() {
                return Ok(None);
            }
        }
        Ok(None)
    }

    async fn exchange_code(
        &self,
        code_verifier: &str,
        code: &str,
    ) -> Result<TokenSet, HyperopticError> {
        let resp = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "authorization_code"),
                ("client_id", CLIENT_ID),
                ("code", code),
                ("redirect_uri", REDIRECT_URI),
                ("code_verifier", code_verifier),
            ])
            .send()
            .await?;

        if resp.status() != StatusCode::OK {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(HyperopticError::Authentication(format!(
                "token exchange failed ({status}): {body}"
            )));
        }

        Ok(TokenSet::from_response(resp.json().await?, Utc::now()))
    }

    /// Exchange the refresh token for a new token set. Rejection is
    /// expected when the server revokes sessions, so it falls back to a
    /// full login instead of surfacing.
    async fn refresh(&self, refresh_token: String) -> Result<TokenSet, HyperopticError> {
        let resp = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "refresh_token"),
                ("client_id", CLIENT_ID),
                ("refresh_token", refresh_token.as_str()),
            ])
            .send()
            .await?;

        if resp.status() != StatusCode::OK {
            tracing::warn!(status = %resp.status(), "token refresh failed, performing full re-login");
            return self.authenticate().await;
        }

        let tokens = TokenSet::from_response(resp.json().await?, Utc::now());
        tracing::debug!("access token refreshed");
        Ok(tokens)
    }
}

fn header_str(resp: &reqwest::Response, name: reqwest::header::HeaderName) -> String {
    resp.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}
