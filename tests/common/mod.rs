//! Shared fixtures for the wiremock-backed integration tests: a fake
//! Keycloak realm and canned account-service payloads.
#![allow(dead_code)]

use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN_PATH: &str = "/protocol/openid-connect/token";
pub const AUTH_PATH: &str = "/protocol/openid-connect/auth";

pub fn token_json(access: &str, refresh: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": access,
        "refresh_token": refresh,
        "id_token": "eyJhbGciOiJSUzI1NiJ9.id",
        "token_type": "Bearer",
        "expires_in": 300,
        "refresh_expires_in": 1800,
        "scope": "openid email customer_id atlas-chat-audience profile",
    })
}

/// Mount a password-grant token mock answering with the given tokens.
pub async fn mount_password_grant(server: &MockServer, access: &str, refresh: &str) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_json(access, refresh)))
        .mount(server)
        .await;
}

/// A Keycloak-shaped login page whose form posts to `action`.
pub fn login_page_html(action: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html><head><title>Sign in to Hyperoptic</title></head><body>
<div id="kc-form">
  <form id="kc-form-login" onsubmit="login.disabled = true; return true;" action="{action}" method="post">
    <input id="username" name="username" type="text" autofocus/>
    <input id="password" name="password" type="password"/>
    <input type="submit" value="Sign In"/>
  </form>
</div></body></html>"#
    )
}

/// A `/customers` envelope whose single account links to `connection_href`.
pub fn customers_json(connection_href: &str) -> serde_json::Value {
    serde_json::json!({
        "_embedded": {
            "customers": [
                {
                    "id": "07e3793f-0418-476e-a9c0-98fad1060b3f",
                    "identifier": 1217923,
                    "additionalType": "RESIDENTIAL",
                    "givenName": "Kieran",
                    "familyName": "Roper",
                    "email": "someone@example.com",
                    "telephone": "+447700900000",
                    "emailVerified": false,
                    "accounts": [
                        {
                            "id": "2fb9ff7b-2634-4211-a643-eaa95a9befc4",
                            "uprn": 10007888137u64,
                            "bundleName": "1Gb Fibre Connection - Broadband Only",
                            "bundleType": "BROADBAND",
                            "orderStatus": "ACTIVE",
                            "activationStatus": "FINISHED",
                            "haveHyperhub": true,
                            "_links": { "connection": { "href": connection_href } }
                        }
                    ]
                }
            ]
        },
        "page": { "size": 30, "totalElements": 1, "totalPages": 1, "number": 1 }
    })
}

/// A `/customers/{id}/packages` envelope with one active package.
pub fn packages_json() -> serde_json::Value {
    serde_json::json!({
        "_embedded": {
            "packages": [
                {
                    "id": "185a6934-e37a-4da7-90be-4fe65e30c9bd",
                    "identifier": 1932546,
                    "status": "ACTIVE",
                    "startDate": "2025-09-02",
                    "endDate": "2026-09-02",
                    "bundleName": "1Gb Fibre Connection - Broadband",
                    "bundleType": "BROADBAND",
                    "durationMonths": 12,
                    "currentPrice": 16.0,
                    "broadbandProduct": {
                        "webCode": "B-01000",
                        "downloadSpeedMbps": 1000,
                        "uploadSpeedMbps": 1000
                    },
                    "planDetails": {
                        "speeds": { "averageDownload": "900.00", "averageUpload": "900.00" },
                        "pricing": [
                            { "price": "63.0" },
                            { "from": "2025-09-01", "until": "2026-05-01", "price": "16.0" }
                        ],
                        "flags": { "isPhone": false, "isTotalWifi": false }
                    },
                    "canRenew": true
                }
            ]
        },
        "page": { "size": 20, "totalElements": 1, "totalPages": 1, "number": 1 }
    })
}

/// A raw `/connections/{id}` payload.
pub fn connection_json(connection_id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": connection_id,
        "isInstalled": true,
        "installedDate": "2018-08-20T09:22:46Z",
        "connectionType": null,
        "account": {
            "id": "2fb9ff7b-2634-4211-a643-eaa95a9befc4",
            "uprn": 10007888137u64,
            "bundleName": "1Gb Fibre Connection - Broadband Only",
            "orderStatus": "ACTIVE"
        }
    })
}
