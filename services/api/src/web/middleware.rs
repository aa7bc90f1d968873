//! services/api/src/web/middleware.rs
//!
//! Browser-session middleware. Every route gets a `BrowserSession` in its request
//! extensions, keyed by the `restore_session` cookie.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use restoration_core::domain::BrowserSession;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

use crate::web::state::AppState;

pub const SESSION_COOKIE: &str = "restore_session";

/// Loads the caller's browser session, or starts a new one and sets its cookie.
///
/// Sessions idle for longer than the configured window are dropped and replaced.
pub async fn browser_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let cutoff = idle_cutoff(state.config.session_idle);

    // 1. Look up the session named by the cookie, if any
    let cookie_id = session_id_from_headers(req.headers()).map(str::to_string);
    let existing = match cookie_id {
        Some(id) => state.sessions.load(&id).await.map_err(|e| {
            error!("Failed to load browser session: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })?,
        None => None,
    };
    let existing = existing.filter(|s| cutoff.map_or(true, |c| s.last_accessed_at >= c));

    // 2. Start a fresh one when there is nothing usable, sweeping idle sessions first
    let (mut session, is_new) = match existing {
        Some(session) => (session, false),
        None => {
            if let Some(cutoff) = cutoff {
                match state.sessions.purge_idle(cutoff).await {
                    Ok(0) => {}
                    Ok(n) => debug!("Purged {} idle browser sessions", n),
                    Err(e) => error!("Failed to purge idle sessions: {:?}", e),
                }
            }
            (BrowserSession::new(Uuid::new_v4().simple().to_string()), true)
        }
    };

    // 3. Record the access and hand the session to the handler
    session.touch();
    let session_id = session.id.clone();
    state.sessions.save(session.clone()).await.map_err(|e| {
        error!("Failed to save browser session: {:?}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    req.extensions_mut().insert(session);

    let mut response = next.run(req).await;

    if is_new {
        match HeaderValue::from_str(&session_cookie(&session_id, state.config.secure_cookies)) {
            Ok(cookie) => {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            Err(e) => error!("Failed to build session cookie: {:?}", e),
        }
    }

    Ok(response)
}

/// Writes a handler's changes back to the store.
pub async fn persist(state: &AppState, session: BrowserSession) -> Result<(), (StatusCode, String)> {
    state.sessions.save(session).await.map_err(|e| {
        error!("Failed to save browser session: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to save session".to_string(),
        )
    })
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .find_map(|c| c.trim().strip_prefix("restore_session="))
        .filter(|id| !id.is_empty())
}

/// No Max-Age: the cookie ends with the browser session.
fn session_cookie(session_id: &str, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/",
        SESSION_COOKIE, session_id
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn idle_cutoff(idle: Duration) -> Option<DateTime<Utc>> {
    let idle = chrono::Duration::from_std(idle).ok()?;
    Utc::now().checked_sub_signed(idle)
}
