//! High-level client for the Hyperoptic account-service API.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::auth::manager::{browser_headers, PortalAuth, AUTH_BASE};
use crate::error::HyperopticError;
use crate::models::{Customer, Package};

/// Base URL of the account-service REST API.
pub const API_BASE: &str = "https://api.hyperopticportal.com/account-service";

/// Sort order the portal front end uses for package listings.
pub const DEFAULT_PACKAGE_SORT: &str = "identifier,desc";

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct CustomersEnvelope {
    #[serde(rename = "_embedded", default)]
    embedded: CustomersEmbedded,
}

#[derive(Debug, Default, Deserialize)]
struct CustomersEmbedded {
    #[serde(default)]
    customers: Vec<Customer>,
}

#[derive(Debug, Deserialize)]
struct PackagesEnvelope {
    #[serde(rename = "_embedded", default)]
    embedded: PackagesEmbedded,
}

#[derive(Debug, Default, Deserialize)]
struct PackagesEmbedded {
    #[serde(default)]
    packages: Vec<Package>,
}

/// Client for the Hyperoptic customer portal API.
///
/// Owns a [`PortalAuth`] and attaches a valid bearer token to every
/// request. A 401 triggers exactly one forced re-login and one retry of
/// the same request; any remaining status >= 400 surfaces as
/// [`HyperopticError::Api`].
pub struct HyperopticClient {
    auth: PortalAuth,
    http: reqwest::Client,
    base_url: String,
}

impl HyperopticClient {
    pub fn new(email: &str, password: &str) -> Result<Self, HyperopticError> {
        Self::with_base_urls(email, password, API_BASE, AUTH_BASE)
    }

    /// Point the client at different API/realm base URLs (used by tests).
    pub fn with_base_urls(
        email: &str,
        password: &str,
        api_base: &str,
        auth_base: &str,
    ) -> Result<Self, HyperopticError> {
        let http = reqwest::Client::builder()
            .default_headers(browser_headers())
            .timeout(HTTP_TIMEOUT)
            .build()?;
        Ok(HyperopticClient {
            auth: PortalAuth::with_auth_base(email, password, auth_base)?,
            http,
            base_url: api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn auth(&self) -> &PortalAuth {
        &self.auth
    }

    /// Send an authenticated request, retrying once after a forced
    /// re-login when the server answers 401.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: Option<&[(&str, &str)]>,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, HyperopticError> {
        let url = format!("{}{}", self.base_url, path);
        let token = self.auth.get_valid_access_token().await?;
        let mut resp = self.send(method.clone(), &url, query, body, &token).await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            // Token may have been revoked server-side.
            tracing::info!(%url, "got 401, re-authenticating");
            self.auth.login().await?;
            let token = self.auth.get_valid_access_token().await?;
            resp = self.send(method, &url, query, body, &token).await?;
        }

        if resp.status().as_u16() >= 400 {
            let status = resp.status().as_u16();
            let url = resp.url().to_string();
            let message = resp.text().await.unwrap_or_default();
            return Err(HyperopticError::Api {
                status,
                message,
                url,
            });
        }

        Ok(resp)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: Option<&[(&str, &str)]>,
        body: Option<&Value>,
        token: &str,
    ) -> Result<reqwest::Response, HyperopticError> {
        let mut req = self.http.request(method, url).bearer_auth(token);
        if let Some(query) = query {
            req = req.query(query);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        Ok(req.send().await?)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&[(&str, &str)]>,
    ) -> Result<T, HyperopticError> {
        let resp = self.request(Method::GET, path, query, None).await?;
        Ok(resp.json().await?)
    }

    /// Fetch all customers linked to the authenticated account.
    pub async fn get_customers(&self) -> Result<Vec<Customer>, HyperopticError> {
        let envelope: CustomersEnvelope = self.get_json("/customers", None).await?;
        Ok(envelope.embedded.customers)
    }

    /// Convenience: the first (usually only) customer.
    pub async fn get_customer(&self) -> Result<Customer, HyperopticError> {
        let mut customers = self.get_customers().await?;
        if customers.is_empty() {
            return Err(HyperopticError::Api {
                status: 404,
                message: "no customers found for this account".to_string(),
                url: format!("{}/customers", self.base_url),
            });
        }
        Ok(customers.remove(0))
    }

    /// Fetch packages for a given customer UUID.
    pub async fn get_packages(
        &self,
        customer_id: &str,
        sort: &str,
    ) -> Result<Vec<Package>, HyperopticError> {
        let path = format!("/customers/{customer_id}/packages");
        let envelope: PackagesEnvelope = self.get_json(&path, Some(&[("sort", sort)])).await?;
        Ok(envelope.embedded.packages)
    }

    /// Fetch packages for the primary customer on this account.
    pub async fn get_my_packages(&self) -> Result<Vec<Package>, HyperopticError> {
        let customer = self.get_customer().await?;
        self.get_packages(&customer.id, DEFAULT_PACKAGE_SORT).await
    }

    /// Fetch raw connection details by ID.
    pub async fn get_connection(&self, connection_id: &str) -> Result<Value, HyperopticError> {
        self.get_json(&format!("/connections/{connection_id}"), None)
            .await
    }

    /// Fetch connection details for every account of the primary customer.
    pub async fn get_my_connections(&self) -> Result<Vec<Value>, HyperopticError> {
        let customer = self.get_customer().await?;
        let mut connections = Vec::new();
        for account in &customer.accounts {
            if let Some(url) = account.connection_url() {
                let connection_id = url.rsplit_once('/').map_or(url, |(_, id)| id);
                connections.push(self.get_connection(connection_id).await?);
            }
        }
        Ok(connections)
    }

    /// Fetch Total WiFi promotion info for a customer.
    pub async fn get_total_wifi_promotion(
        &self,
        customer_id: &str,
    ) -> Result<Value, HyperopticError> {
        self.get_json(&format!("/customers/{customer_id}/promotions/total-wifi"), None)
            .await
    }

    /// Arbitrary authenticated GET against the account-service API.
    /// Useful for discovering new endpoints.
    pub async fn get_raw(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, HyperopticError> {
        let query = if params.is_empty() { None } else { Some(params) };
        self.get_json(path, query).await
    }
}
