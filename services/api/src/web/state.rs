//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use restoration_core::ports::{
    ImageRestorationService, OAuthProvider, SessionStore, StoryGenerationService,
};
use restoration_core::state_token::StateTokenSigner;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: Arc<dyn SessionStore>,
    pub oauth: Arc<dyn OAuthProvider>,
    pub filters: Arc<dyn ImageRestorationService>,
    pub stories: Arc<dyn StoryGenerationService>,
    pub state_tokens: StateTokenSigner,
}

impl AppState {
    /// Builds the state, deriving the state-token signer from the configured secret and TTL.
    pub fn new(
        config: Arc<Config>,
        sessions: Arc<dyn SessionStore>,
        oauth: Arc<dyn OAuthProvider>,
        filters: Arc<dyn ImageRestorationService>,
        stories: Arc<dyn StoryGenerationService>,
    ) -> Self {
        let state_tokens = StateTokenSigner::new(config.state_secret.as_bytes(), config.state_ttl);
        Self {
            config,
            sessions,
            oauth,
            filters,
            stories,
            state_tokens,
        }
    }
}
