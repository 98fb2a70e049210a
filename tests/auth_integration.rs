mod common;

use hyperoptic::auth::PortalAuth;
use hyperoptic::HyperopticError;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{login_page_html, token_json, AUTH_PATH, TOKEN_PATH};

/// A never-authenticated manager performs exactly one login and returns
/// the resulting access token.
#[tokio::test]
async fn password_grant_login() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("client_id=customer-portal"))
        .and(body_string_contains("username=user%40example.com"))
        .and(header("origin", "https://account.hyperoptic.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("A1", "R1")))
        .expect(1)
        .mount(&server)
        .await;

    let auth = PortalAuth::with_auth_base("user@example.com", "secret", &server.uri()).unwrap();
    assert_eq!(auth.get_valid_access_token().await.unwrap(), "A1");

    let tokens = auth.current_tokens().await.unwrap();
    assert_eq!(tokens.access_token, "A1");
    assert_eq!(tokens.refresh_token, "R1");
    assert!(!tokens.access_expired());
}

/// When the realm refuses the password grant, the manager falls through to
/// the full PKCE browser simulation and comes out authenticated.
#[tokio::test]
async fn password_grant_refusal_falls_back_to_pkce() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=password"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error":"unauthorized_client"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Login page carrying a session cookie; the form action holds an
    // HTML-escaped query string.
    let action = format!(
        "{}/login-actions/authenticate?session_code=sess123&amp;tab_id=t1",
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path(AUTH_PATH))
        .and(query_param("client_id", "customer-portal"))
        .and(query_param("response_type", "code"))
        .and(query_param("code_challenge_method", "S256"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "AUTH_SESSION_ID=abc; Path=/")
                .set_body_string(login_page_html(&action)),
        )
        .expect(1)
        .mount(&server)
        .await;

    // Credential POST must carry the captured session cookie and the
    // entity-decoded action query string.
    Mock::given(method("POST"))
        .and(path("/login-actions/authenticate"))
        .and(query_param("session_code", "sess123"))
        .and(query_param("tab_id", "t1"))
        .and(header("cookie", "AUTH_SESSION_ID=abc"))
        .and(body_string_contains("username=user%40example.com"))
        .and(body_string_contains("password=secret"))
        .respond_with(ResponseTemplate::new(302).insert_header(
            "location",
            "https://account.hyperoptic.com/my-plan?code=authcode42&state=xyz",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=authcode42"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("A-pkce", "R-pkce")))
        .expect(1)
        .mount(&server)
        .await;

    let auth = PortalAuth::with_auth_base("user@example.com", "secret", &server.uri()).unwrap();
    assert_eq!(auth.get_valid_access_token().await.unwrap(), "A-pkce");
}

/// No login form in the fetched page fails the whole login with an
/// authentication error; the password grant is attempted exactly once.
#[tokio::test]
async fn pkce_without_login_form_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(AUTH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>Service unavailable</body></html>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let auth = PortalAuth::with_auth_base("user@example.com", "wrong", &server.uri()).unwrap();
    let err = auth.get_valid_access_token().await.unwrap_err();
    assert!(matches!(err, HyperopticError::Authentication(_)));
    assert!(err.to_string().contains("login form"));
}

/// A non-redirect answer to the credential POST is a credential failure.
#[tokio::test]
async fn credential_rejection_surfaces_authentication_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let action = format!("{}/login-actions/authenticate", server.uri());
    Mock::given(method("GET"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page_html(&action)))
        .mount(&server)
        .await;

    // Keycloak re-renders the login page on bad credentials.
    Mock::given(method("POST"))
        .and(path("/login-actions/authenticate"))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page_html(&action)))
        .mount(&server)
        .await;

    let auth = PortalAuth::with_auth_base("user@example.com", "wrong", &server.uri()).unwrap();
    let err = auth.get_valid_access_token().await.unwrap_err();
    assert!(matches!(err, HyperopticError::Authentication(_)));
    assert!(err.to_string().contains("check email/password"));
}

/// When the first redirect carries no code, the manager walks the chain
/// (bounded) until one appears.
#[tokio::test]
async fn redirect_chain_walked_for_code() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let action = format!("{}/login-actions/authenticate", server.uri());
    Mock::given(method("GET"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page_html(&action)))
        .mount(&server)
        .await;

    // First hop has no code; the next Location does.
    Mock::given(method("POST"))
        .and(path("/login-actions/authenticate"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/interstitial", server.uri()).as_str()),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/interstitial"))
        .respond_with(ResponseTemplate::new(302).insert_header(
            "location",
            "https://account.hyperoptic.com/my-plan?code=chained77",
        ))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=chained77"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("A-chain", "R-chain")))
        .expect(1)
        .mount(&server)
        .await;

    let auth = PortalAuth::with_auth_base("user@example.com", "secret", &server.uri()).unwrap();
    assert_eq!(auth.get_valid_access_token().await.unwrap(), "A-chain");
}

/// A failed token exchange is a hard failure of the whole login.
#[tokio::test]
async fn failed_code_exchange_surfaces_authentication_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;

    let action = format!("{}/login-actions/authenticate", server.uri());
    Mock::given(method("GET"))
        .and(path(AUTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string(login_page_html(&action)))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/login-actions/authenticate"))
        .respond_with(ResponseTemplate::new(302).insert_header(
            "location",
            "https://account.hyperoptic.com/my-plan?code=expiredcode",
        ))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(
            ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#),
        )
        .mount(&server)
        .await;

    let auth = PortalAuth::with_auth_base("user@example.com", "secret", &server.uri()).unwrap();
    let err = auth.get_valid_access_token().await.unwrap_err();
    assert!(matches!(err, HyperopticError::Authentication(_)));
    assert!(err.to_string().contains("token exchange failed"));
}

/// End to end: login yields a token that dies immediately (inside the 30s
/// grace window), so the next read refreshes and returns the new token.
#[tokio::test]
async fn expired_access_token_refreshes_on_next_read() {
    let server = MockServer::start().await;

    let mut short_lived = token_json("A1", "R1");
    short_lived["expires_in"] = serde_json::json!(0);
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(short_lived))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=R1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json("A2", "R2")))
        .expect(1)
        .mount(&server)
        .await;

    let auth = PortalAuth::with_auth_base("user@example.com", "secret", &server.uri()).unwrap();
    assert_eq!(auth.get_valid_access_token().await.unwrap(), "A1");
    assert_eq!(auth.get_valid_access_token().await.unwrap(), "A2");
    // Refreshed set is stored wholesale.
    let tokens = auth.current_tokens().await.unwrap();
    assert_eq!(tokens.refresh_token, "R2");
}
