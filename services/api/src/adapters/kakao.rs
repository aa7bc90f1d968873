//! services/api/src/adapters/kakao.rs
//!
//! This module contains the adapter for Kakao Login (OAuth 2.0 authorization code flow).
//! It implements the `OAuthProvider` port from the `core` crate.

use async_trait::async_trait;
use restoration_core::domain::{OAuthToken, UserProfile};
use restoration_core::ports::{OAuthProvider, PortError, PortResult};
use serde::Deserialize;
use std::time::Duration;

use crate::config::KakaoSettings;

/// Fixed timeout for every call to the provider.
pub const KAKAO_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `OAuthProvider` port against the Kakao REST API.
#[derive(Clone)]
pub struct KakaoOAuthAdapter {
    settings: KakaoSettings,
    http: reqwest::Client,
}

impl KakaoOAuthAdapter {
    /// Creates a new `KakaoOAuthAdapter` with its own HTTP client.
    pub fn new(settings: KakaoSettings) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(KAKAO_HTTP_TIMEOUT)
            .build()?;
        Ok(Self { settings, http })
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> PortResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        Err(PortError::Upstream {
            operation,
            status,
            detail,
        })
    }
}

//=========================================================================================
// Kakao Wire Types
//=========================================================================================

#[derive(Debug, Deserialize)]
struct KakaoTokenResponse {
    access_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    refresh_token_expires_in: Option<u64>,
    #[serde(default)]
    scope: Option<String>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

impl KakaoTokenResponse {
    fn to_domain(self) -> OAuthToken {
        OAuthToken {
            access_token: self.access_token,
            token_type: self.token_type,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in,
            refresh_token_expires_in: self.refresh_token_expires_in,
            scope: self.scope,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct KakaoUserMe {
    #[serde(default)]
    kakao_account: Option<KakaoAccount>,
}

#[derive(Debug, Default, Deserialize)]
struct KakaoAccount {
    #[serde(default)]
    profile: Option<KakaoProfile>,
}

#[derive(Debug, Default, Deserialize)]
struct KakaoProfile {
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    profile_image_url: Option<String>,
    #[serde(default)]
    thumbnail_image_url: Option<String>,
}

impl KakaoUserMe {
    /// Nickname and avatar, preferring the full-size image over the thumbnail.
    fn to_domain(self) -> UserProfile {
        let profile = self
            .kakao_account
            .and_then(|account| account.profile)
            .unwrap_or_default();
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        UserProfile {
            nickname: non_empty(profile.nickname),
            avatar_url: non_empty(profile.profile_image_url)
                .or_else(|| non_empty(profile.thumbnail_image_url)),
        }
    }
}

//=========================================================================================
// `OAuthProvider` Trait Implementation
//=========================================================================================

#[async_trait]
impl OAuthProvider for KakaoOAuthAdapter {
    fn authorization_url(&self, state: &str) -> String {
        let mut url = self.settings.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", self.settings.redirect_uri.as_str())
            .append_pair("response_type", "code")
            .append_pair("state", state);
        url.into()
    }

    async fn exchange_code(&self, code: &str) -> PortResult<OAuthToken> {
        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("client_id", self.settings.client_id.as_str()),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
            ("code", code),
        ];
        // Only sent when the Kakao app has "client secret" enabled.
        if let Some(secret) = &self.settings.client_secret {
            params.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http
            .post(self.settings.token_url.clone())
            .form(&params)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("token exchange request failed: {}", e)))?;

        let response = Self::ensure_success(response, "token exchange").await?;
        let token = response
            .json::<KakaoTokenResponse>()
            .await
            .map_err(|e| PortError::Unexpected(format!("invalid token response: {}", e)))?;
        Ok(token.to_domain())
    }

    async fn fetch_profile(&self, access_token: &str) -> PortResult<UserProfile> {
        let response = self
            .http
            .get(self.settings.userme_url.clone())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("user-info request failed: {}", e)))?;

        let response = Self::ensure_success(response, "user-info request").await?;
        let user_me = response
            .json::<KakaoUserMe>()
            .await
            .map_err(|e| PortError::Unexpected(format!("invalid user-info response: {}", e)))?;
        Ok(user_me.to_domain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_settings() -> KakaoSettings {
        KakaoSettings {
            client_id: "test-client".to_string(),
            client_secret: None,
            redirect_uri: "https://example.com/auth/callback".parse().unwrap(),
            authorize_url: "https://kauth.kakao.com/oauth/authorize".parse().unwrap(),
            token_url: "https://kauth.kakao.com/oauth/token".parse().unwrap(),
            userme_url: "https://kapi.kakao.com/v2/user/me".parse().unwrap(),
        }
    }

    #[test]
    fn test_authorization_url_contains_required_params() {
        let adapter = KakaoOAuthAdapter::new(test_settings()).unwrap();
        let url: url::Url = adapter.authorization_url("123.nonce.sig").parse().unwrap();

        assert_eq!(url.host_str(), Some("kauth.kakao.com"));
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("client_id".into(), "test-client".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "https://example.com/auth/callback".into()
        )));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("state".into(), "123.nonce.sig".into())));
    }

    #[test]
    fn test_redirect_uri_is_percent_encoded() {
        let adapter = KakaoOAuthAdapter::new(test_settings()).unwrap();
        let url = adapter.authorization_url("s");

        assert!(url.contains("redirect_uri=https%3A%2F%2Fexample.com%2Fauth%2Fcallback"));
    }

    #[test]
    fn test_profile_prefers_full_image() {
        let body = serde_json::json!({
            "id": 42,
            "kakao_account": {
                "profile": {
                    "nickname": "Minji",
                    "profile_image_url": "https://img.example/full.jpg",
                    "thumbnail_image_url": "https://img.example/thumb.jpg"
                }
            }
        });
        let profile = serde_json::from_value::<KakaoUserMe>(body).unwrap().to_domain();

        assert_eq!(profile.nickname.as_deref(), Some("Minji"));
        assert_eq!(profile.avatar_url.as_deref(), Some("https://img.example/full.jpg"));
    }

    #[test]
    fn test_profile_falls_back_to_thumbnail() {
        let body = serde_json::json!({
            "kakao_account": {
                "profile": { "nickname": "", "thumbnail_image_url": "https://img.example/t.jpg" }
            }
        });
        let profile = serde_json::from_value::<KakaoUserMe>(body).unwrap().to_domain();

        assert_eq!(profile.nickname, None);
        assert_eq!(profile.avatar_url.as_deref(), Some("https://img.example/t.jpg"));
    }

    #[test]
    fn test_profile_without_account_is_empty() {
        let profile = serde_json::from_value::<KakaoUserMe>(serde_json::json!({ "id": 1 }))
            .unwrap()
            .to_domain();

        assert_eq!(profile, UserProfile::default());
    }

    #[test]
    fn test_token_response_defaults() {
        let body = serde_json::json!({ "access_token": "abc", "expires_in": 21599 });
        let token = serde_json::from_value::<KakaoTokenResponse>(body)
            .unwrap()
            .to_domain();

        assert_eq!(token.access_token, "abc");
        assert_eq!(token.token_type, "bearer");
        assert_eq!(token.expires_in, Some(21599));
        assert_eq!(token.refresh_token, None);
    }

    //=====================================================================================
    // HTTP round trips against a local stand-in for the Kakao endpoints
    //=====================================================================================

    use axum::extract::{Form, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Captured {
        forms: Vec<HashMap<String, String>>,
        authorizations: Vec<String>,
    }

    #[derive(Clone)]
    struct ProviderState {
        captured: Arc<Mutex<Captured>>,
        token_status: StatusCode,
    }

    async fn token_route(
        State(state): State<ProviderState>,
        Form(form): Form<HashMap<String, String>>,
    ) -> Response {
        state.captured.lock().unwrap().forms.push(form);
        if state.token_status != StatusCode::OK {
            return (state.token_status, r#"{"error":"invalid_grant"}"#).into_response();
        }
        Json(serde_json::json!({
            "access_token": "tok-1",
            "token_type": "bearer",
            "expires_in": 21599
        }))
        .into_response()
    }

    async fn userme_route(State(state): State<ProviderState>, headers: HeaderMap) -> Response {
        let authorization = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        state.captured.lock().unwrap().authorizations.push(authorization);
        Json(serde_json::json!({
            "id": 7,
            "kakao_account": { "profile": { "nickname": "Local" } }
        }))
        .into_response()
    }

    /// Serves the token and user-info endpoints on an ephemeral port.
    async fn spawn_provider(
        token_status: StatusCode,
        client_secret: Option<&str>,
    ) -> (KakaoOAuthAdapter, Arc<Mutex<Captured>>) {
        let captured = Arc::new(Mutex::new(Captured::default()));
        let app = Router::new()
            .route("/oauth/token", post(token_route))
            .route("/v2/user/me", get(userme_route))
            .with_state(ProviderState {
                captured: captured.clone(),
                token_status,
            });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let settings = KakaoSettings {
            client_secret: client_secret.map(str::to_string),
            token_url: format!("http://{}/oauth/token", addr).parse().unwrap(),
            userme_url: format!("http://{}/v2/user/me", addr).parse().unwrap(),
            ..test_settings()
        };
        (KakaoOAuthAdapter::new(settings).unwrap(), captured)
    }

    #[tokio::test]
    async fn test_exchange_code_posts_form_without_secret() {
        let (adapter, captured) = spawn_provider(StatusCode::OK, None).await;

        let token = adapter.exchange_code("auth-code").await.unwrap();

        assert_eq!(token.access_token, "tok-1");
        assert_eq!(token.expires_in, Some(21599));
        let captured = captured.lock().unwrap();
        let form = &captured.forms[0];
        assert_eq!(form["grant_type"], "authorization_code");
        assert_eq!(form["client_id"], "test-client");
        assert_eq!(form["redirect_uri"], "https://example.com/auth/callback");
        assert_eq!(form["code"], "auth-code");
        assert!(!form.contains_key("client_secret"));
    }

    #[tokio::test]
    async fn test_exchange_code_sends_configured_secret() {
        let (adapter, captured) = spawn_provider(StatusCode::OK, Some("shh")).await;

        adapter.exchange_code("auth-code").await.unwrap();

        assert_eq!(captured.lock().unwrap().forms[0]["client_secret"], "shh");
    }

    #[tokio::test]
    async fn test_fetch_profile_sends_bearer_token() {
        let (adapter, captured) = spawn_provider(StatusCode::OK, None).await;

        let profile = adapter.fetch_profile("tok-1").await.unwrap();

        assert_eq!(profile.nickname.as_deref(), Some("Local"));
        assert_eq!(captured.lock().unwrap().authorizations, vec!["Bearer tok-1"]);
    }

    #[tokio::test]
    async fn test_rejected_exchange_maps_to_upstream_error() {
        let (adapter, _captured) = spawn_provider(StatusCode::BAD_REQUEST, None).await;

        let err = adapter.exchange_code("stale-code").await.unwrap_err();

        match err {
            PortError::Upstream {
                operation,
                status,
                detail,
            } => {
                assert_eq!(operation, "token exchange");
                assert_eq!(status, 400);
                assert!(detail.contains("invalid_grant"));
            }
            other => panic!("expected an upstream error, got {:?}", other),
        }
    }
}
