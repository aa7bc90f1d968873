//! crates/restoration_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like the OAuth
//! provider, the image library or the session storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    BrowserSession, OAuthToken, Operation, OperationCounts, PhotoKind, RestoredImage,
    UserProfile,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., HTTP, image codecs).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Upstream {operation} failed with status {status}: {detail}")]
    Upstream {
        operation: &'static str,
        status: u16,
        detail: String,
    },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The third-party OAuth provider used for optional sign-in.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// Builds the URL the browser is redirected to, carrying the signed `state`.
    fn authorization_url(&self, state: &str) -> String;

    /// Exchanges an authorization code for a token record.
    async fn exchange_code(&self, code: &str) -> PortResult<OAuthToken>;

    /// Fetches the signed-in user's profile with a bearer token.
    async fn fetch_profile(&self, access_token: &str) -> PortResult<UserProfile>;
}

/// The placeholder "AI" filters. Implementations are CPU-bound and synchronous.
pub trait ImageRestorationService: Send + Sync {
    /// Applies `operation` to an encoded image and returns the encoded result.
    fn apply(&self, operation: Operation, image: &[u8]) -> PortResult<RestoredImage>;

    /// Reads the pixel dimensions of an encoded image, rejecting unsupported formats.
    fn inspect(&self, image: &[u8]) -> PortResult<(u32, u32)>;
}

/// Everything a story generator gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct StoryRequest<'a> {
    pub image: &'a [u8],
    pub photo_kind: PhotoKind,
    pub counts: OperationCounts,
    pub hint: Option<&'a str>,
}

#[async_trait]
pub trait StoryGenerationService: Send + Sync {
    /// Writes a short story about the restored photo.
    async fn generate_story(&self, request: StoryRequest<'_>) -> PortResult<String>;
}

/// Holds browser sessions for as long as the browser keeps its cookie.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> PortResult<Option<BrowserSession>>;

    async fn save(&self, session: BrowserSession) -> PortResult<()>;

    async fn delete(&self, session_id: &str) -> PortResult<()>;

    /// Drops every session last accessed before `cutoff`; returns how many were removed.
    async fn purge_idle(&self, cutoff: DateTime<Utc>) -> PortResult<usize>;
}
