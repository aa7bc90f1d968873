//! crates/restoration_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any storage or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// OAuth Records
//=========================================================================================

/// The token record returned by the OAuth provider's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthToken {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub refresh_token_expires_in: Option<u64>,
    pub scope: Option<String>,
}

/// The subset of the provider's user-info response the service keeps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserProfile {
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
}

//=========================================================================================
// Restoration Operations
//=========================================================================================

/// Every action that consumes one use from a per-operation budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Colorize,
    Upscale,
    Denoise,
    Story,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Colorize,
        Operation::Upscale,
        Operation::Denoise,
        Operation::Story,
    ];

    /// The stable identifier used in URLs and JSON payloads.
    pub fn slug(&self) -> &'static str {
        match self {
            Operation::Colorize => "colorize",
            Operation::Upscale => "upscale",
            Operation::Denoise => "denoise",
            Operation::Story => "story",
        }
    }

    /// The label recorded on history entries.
    pub fn label(&self) -> &'static str {
        match self {
            Operation::Colorize => "Colorize",
            Operation::Upscale => "Upscale x2",
            Operation::Denoise => "Denoise",
            Operation::Story => "Story",
        }
    }

    /// Whether the operation produces a new image.
    pub fn is_image_operation(&self) -> bool {
        !matches!(self, Operation::Story)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation '{0}'")]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.slug().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

/// The kind of photo the user said they uploaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PhotoKind {
    #[default]
    Monochrome,
    Color,
}

impl PhotoKind {
    pub fn slug(&self) -> &'static str {
        match self {
            PhotoKind::Monochrome => "monochrome",
            PhotoKind::Color => "color",
        }
    }
}

impl FromStr for PhotoKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "monochrome" | "mono" | "bw" | "흑백" => Ok(PhotoKind::Monochrome),
            "color" | "colour" | "컬러" => Ok(PhotoKind::Color),
            other => Err(format!("unknown photo type '{}'", other)),
        }
    }
}

/// Per-operation use counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperationCounts {
    pub colorize: u8,
    pub upscale: u8,
    pub denoise: u8,
    pub story: u8,
}

impl OperationCounts {
    pub fn get(&self, op: Operation) -> u8 {
        match op {
            Operation::Colorize => self.colorize,
            Operation::Upscale => self.upscale,
            Operation::Denoise => self.denoise,
            Operation::Story => self.story,
        }
    }

    pub(crate) fn increment(&mut self, op: Operation) {
        let slot = match op {
            Operation::Colorize => &mut self.colorize,
            Operation::Upscale => &mut self.upscale,
            Operation::Denoise => &mut self.denoise,
            Operation::Story => &mut self.story,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn total(&self) -> u32 {
        Operation::ALL.iter().map(|op| u32::from(self.get(*op))).sum()
    }
}

/// How many times each operation may run per uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageLimits {
    pub basic: u8,
    pub advanced: u8,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self {
            basic: 1,
            advanced: 3,
        }
    }
}

impl UsageLimits {
    pub fn cap(&self, advanced_mode: bool) -> u8 {
        if advanced_mode {
            self.advanced
        } else {
            self.basic
        }
    }
}

//=========================================================================================
// Restoration Session State
//=========================================================================================

/// An encoded image produced by one of the restoration filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub note: String,
}

/// A snapshot recorded every time an image operation runs.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub operation: Operation,
    pub label: String,
    pub image: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub created_at: DateTime<Utc>,
    pub note: String,
}

/// A generated story with the counts it was written against.
#[derive(Debug, Clone)]
pub struct StoryRecord {
    pub text: String,
    pub counts_at_generation: OperationCounts,
    pub created_at: DateTime<Utc>,
}

/// A decoded-and-checked upload, ready to start a restoration session.
#[derive(Debug, Clone)]
pub struct UploadedPhoto {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub photo_kind: PhotoKind,
}

/// Everything tracked for the currently uploaded photo.
#[derive(Debug, Clone)]
pub struct RestorationSession {
    pub id: Uuid,
    pub file_name: String,
    pub photo_kind: PhotoKind,
    pub original: Vec<u8>,
    pub original_width: u32,
    pub original_height: u32,
    pub content_hash: String,
    pub counts: OperationCounts,
    pub history: Vec<HistoryEntry>,
    pub story: Option<StoryRecord>,
    pub created_at: DateTime<Utc>,
}

//=========================================================================================
// Browser Session
//=========================================================================================

/// Represents one browser session (identified by a cookie).
#[derive(Debug, Clone)]
pub struct BrowserSession {
    pub id: String,
    pub token: Option<OAuthToken>,
    pub profile: Option<UserProfile>,
    /// The last authorization code processed, so a reloaded callback is not exchanged twice.
    pub handled_code: Option<String>,
    pub advanced_mode: bool,
    pub limits: UsageLimits,
    pub restoration: Option<RestorationSession>,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl BrowserSession {
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            token: None,
            profile: None,
            handled_code: None,
            advanced_mode: false,
            limits: UsageLimits::default(),
            restoration: None,
            created_at: now,
            last_accessed_at: now,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.token.is_some()
    }

    /// Drops everything the OAuth login put into the session.
    pub fn sign_out(&mut self) {
        self.token = None;
        self.profile = None;
        self.handled_code = None;
    }

    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
    }
}
