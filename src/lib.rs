//! Client for the Hyperoptic customer-portal web API.
//!
//! Authenticates against the Hyperoptic Keycloak realm (direct password
//! grant, with a simulated-browser PKCE fallback), manages the token
//! lifecycle, and issues authenticated REST calls for customer, account,
//! package, connection and promotion data.
//!
//! ```no_run
//! # async fn demo() -> Result<(), hyperoptic::HyperopticError> {
//! let client = hyperoptic::HyperopticClient::new("user@example.com", "secret")?;
//! let customer = client.get_customer().await?;
//! println!("{}", customer.full_name());
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod error;
pub mod models;

pub use auth::{PortalAuth, TokenSet};
pub use client::HyperopticClient;
pub use error::HyperopticError;
pub use models::{Account, Customer, Package};

/// One-shot convenience function: log in and fetch the primary customer.
pub async fn fetch_customer(email: &str, password: &str) -> Result<Customer, HyperopticError> {
    let client = HyperopticClient::new(email, password)?;
    client.get_customer().await
}
