//! Keycloak OIDC authentication for the Hyperoptic customer portal.
//!
//! Two strategies, tried in order:
//! 1. Direct `grant_type=password` (resource-owner password credentials),
//!    used when the realm allows it.
//! 2. Simulated-browser PKCE authorization-code flow: scrape the Keycloak
//!    login form, POST credentials, follow the redirect for the auth code,
//!    exchange it for tokens. Automatic fallback.

pub mod manager;
pub mod pkce;
pub mod scrape;
pub mod token;

pub use manager::{LoginStrategy, PortalAuth, AUTH_BASE, CLIENT_ID, DEFAULT_SCOPES, REDIRECT_URI};
pub use pkce::{derive_code_challenge, generate_code_verifier, PkceChallenge};
pub use scrape::{extract_code_from_redirect, extract_form_action};
pub use token::{TokenResponse, TokenSet};
