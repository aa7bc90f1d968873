//! services/api/src/web/auth.rs
//!
//! Optional Kakao sign-in: login redirect, OAuth callback, logout and the
//! current-user endpoint.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Extension, Json,
};
use restoration_core::domain::BrowserSession;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::web::middleware::persist;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

/// Query parameters the provider (or the logout link) sends to the callback.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
#[serde(default)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    pub logout: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct MeResponse {
    pub logged_in: bool,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
}

/// Reasons reported back to the page in the `auth_error` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginFailure {
    ProviderDenied,
    StateInvalid,
    ProviderError,
}

impl LoginFailure {
    fn code(&self) -> &'static str {
        match self {
            LoginFailure::ProviderDenied => "provider_denied",
            LoginFailure::StateInvalid => "state_invalid",
            LoginFailure::ProviderError => "provider_error",
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /auth/login - Redirect to the provider's consent page
#[utoipa::path(
    get,
    path = "/auth/login",
    responses(
        (status = 303, description = "Redirect to the OAuth provider with a signed state token")
    )
)]
pub async fn login_handler(State(state): State<Arc<AppState>>) -> Redirect {
    let token = state.state_tokens.issue();
    Redirect::to(&state.oauth.authorization_url(&token))
}

/// GET /auth/callback - Complete (or abort) the OAuth login
#[utoipa::path(
    get,
    path = "/auth/callback",
    params(CallbackParams),
    responses(
        (status = 303, description = "Redirect home, with `auth_error` set when login failed"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn callback_handler(
    State(state): State<Arc<AppState>>,
    Extension(mut session): Extension<BrowserSession>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect, (StatusCode, String)> {
    let home = state.config.post_login_redirect.clone();

    if params.logout.is_some() {
        session.sign_out();
        persist(&state, session).await?;
        return Ok(Redirect::to(&home));
    }

    if let Some(provider_error) = params.error {
        warn!(
            "OAuth provider returned an error: {} ({})",
            provider_error,
            params.error_description.as_deref().unwrap_or("no description")
        );
        return Ok(redirect_with_failure(&home, LoginFailure::ProviderDenied));
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return Ok(Redirect::to(&home));
    };

    // A reloaded callback page must not exchange the same code twice.
    if session.handled_code.as_deref() == Some(code.as_str()) {
        info!("Ignoring an authorization code that was already handled");
        return Ok(Redirect::to(&home));
    }
    session.handled_code = Some(code.clone());

    let outcome = complete_login(&state, &mut session, &code, params.state.as_deref()).await;
    persist(&state, session).await?;

    Ok(match outcome {
        Ok(()) => Redirect::to(&home),
        Err(failure) => redirect_with_failure(&home, failure),
    })
}

/// GET|POST /auth/logout - Forget the OAuth login
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 303, description = "Signed out; redirect home"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    Extension(mut session): Extension<BrowserSession>,
) -> Result<Redirect, (StatusCode, String)> {
    session.sign_out();
    persist(&state, session).await?;
    Ok(Redirect::to(&state.config.post_login_redirect))
}

/// GET /me - The signed-in user's profile, if any
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Login status and profile", body = MeResponse)
    )
)]
pub async fn me_handler(Extension(session): Extension<BrowserSession>) -> impl IntoResponse {
    let profile = session.profile.clone().unwrap_or_default();
    Json(MeResponse {
        logged_in: session.is_logged_in(),
        nickname: profile.nickname,
        avatar_url: profile.avatar_url,
    })
}

//=========================================================================================
// Helpers
//=========================================================================================

async fn complete_login(
    state: &AppState,
    session: &mut BrowserSession,
    code: &str,
    state_token: Option<&str>,
) -> Result<(), LoginFailure> {
    // 1. Check the CSRF state token before talking to the provider
    if let Err(e) = state.state_tokens.verify(state_token.unwrap_or_default()) {
        warn!("Rejected OAuth callback with an invalid state token: {}", e);
        return Err(LoginFailure::StateInvalid);
    }

    // 2. Exchange the code for a token
    let token = state.oauth.exchange_code(code).await.map_err(|e| {
        error!("Failed to exchange authorization code: {:?}", e);
        LoginFailure::ProviderError
    })?;

    // 3. Fetch the profile with that token
    let profile = state
        .oauth
        .fetch_profile(&token.access_token)
        .await
        .map_err(|e| {
            error!("Failed to fetch user profile: {:?}", e);
            LoginFailure::ProviderError
        })?;

    info!(
        "User signed in as {}",
        profile.nickname.as_deref().unwrap_or("(no nickname)")
    );
    session.token = Some(token);
    session.profile = Some(profile);
    Ok(())
}

fn redirect_with_failure(home: &str, failure: LoginFailure) -> Redirect {
    let separator = if home.contains('?') { '&' } else { '?' };
    Redirect::to(&format!("{}{}auth_error={}", home, separator, failure.code()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn location(redirect: Redirect) -> String {
        let response = redirect.into_response();
        response.headers()[header::LOCATION]
            .to_str()
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_failure_is_appended_as_query_parameter() {
        assert_eq!(
            location(redirect_with_failure("/", LoginFailure::StateInvalid)),
            "/?auth_error=state_invalid"
        );
        assert_eq!(
            location(redirect_with_failure("/app?tab=1", LoginFailure::ProviderError)),
            "/app?tab=1&auth_error=provider_error"
        );
    }
}
