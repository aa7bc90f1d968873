pub mod domain;
pub mod ports;
pub mod state_token;
pub mod workflow;

pub use domain::{
    BrowserSession, HistoryEntry, OAuthToken, Operation, OperationCounts, PhotoKind,
    RestorationSession, RestoredImage, StoryRecord, UploadedPhoto, UsageLimits, UserProfile,
};
pub use ports::{
    ImageRestorationService, OAuthProvider, PortError, PortResult, SessionStore,
    StoryGenerationService, StoryRequest,
};
pub use state_token::{StateTokenError, StateTokenSigner, DEFAULT_STATE_TTL};
pub use workflow::{content_hash, UploadOutcome};
