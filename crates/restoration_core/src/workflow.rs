//! crates/restoration_core/src/workflow.rs
//!
//! The bookkeeping rules of the restoration workflow: upload detection,
//! per-operation caps, and the history of applied operations.

use chrono::Utc;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::domain::{
    BrowserSession, HistoryEntry, Operation, OperationCounts, RestorationSession, RestoredImage,
    StoryRecord, UploadedPhoto,
};

/// Hex-encoded SHA-256 of an uploaded file, used to detect re-uploads.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// What an upload did to the session's restoration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// No photo was loaded before.
    Started,
    /// A different photo replaced the previous one; counters and history were reset.
    Replaced,
    /// The same bytes were uploaded again; nothing changed.
    Unchanged,
}

impl UploadOutcome {
    pub fn did_reset(&self) -> bool {
        !matches!(self, UploadOutcome::Unchanged)
    }
}

impl BrowserSession {
    /// Registers an uploaded photo, resetting all progress only when the content changed.
    pub fn ingest_upload(&mut self, upload: UploadedPhoto) -> UploadOutcome {
        let hash = content_hash(&upload.bytes);
        let outcome = match &self.restoration {
            Some(existing) if existing.content_hash == hash => return UploadOutcome::Unchanged,
            Some(_) => UploadOutcome::Replaced,
            None => UploadOutcome::Started,
        };

        self.restoration = Some(RestorationSession::new(upload, hash));
        outcome
    }

    pub fn set_advanced_mode(&mut self, enabled: bool) {
        self.advanced_mode = enabled;
    }

    /// The cap that currently applies to `op`.
    pub fn limit_for(&self, _op: Operation) -> u8 {
        self.limits.cap(self.advanced_mode)
    }

    /// Uses of `op` left for the current photo; zero when nothing is uploaded.
    pub fn remaining(&self, op: Operation) -> u8 {
        match &self.restoration {
            Some(restoration) => self.limit_for(op).saturating_sub(restoration.counts.get(op)),
            None => 0,
        }
    }

    pub fn discard_restoration(&mut self) -> bool {
        self.restoration.take().is_some()
    }
}

impl RestorationSession {
    pub fn new(upload: UploadedPhoto, content_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: upload.file_name,
            photo_kind: upload.photo_kind,
            original: upload.bytes,
            original_width: upload.width,
            original_height: upload.height,
            content_hash,
            counts: OperationCounts::default(),
            history: Vec::new(),
            story: None,
            created_at: Utc::now(),
        }
    }

    /// The bytes every next operation starts from.
    pub fn current_image(&self) -> &[u8] {
        self.history
            .last()
            .map(|entry| entry.image.as_slice())
            .unwrap_or(self.original.as_slice())
    }

    /// Pixel size of `current_image()`.
    pub fn current_dimensions(&self) -> (u32, u32) {
        self.history
            .last()
            .map(|entry| (entry.width, entry.height))
            .unwrap_or((self.original_width, self.original_height))
    }

    pub fn history_image(&self, index: usize) -> Option<&HistoryEntry> {
        self.history.get(index)
    }

    pub fn can_apply(&self, op: Operation, cap: u8) -> bool {
        self.counts.get(op) < cap
    }

    /// Appends the result of an image operation. Returns `false` and leaves the
    /// session untouched once `op` has reached `cap`.
    pub fn record_image(&mut self, op: Operation, image: RestoredImage, cap: u8) -> bool {
        if !op.is_image_operation() || !self.can_apply(op, cap) {
            return false;
        }

        self.counts.increment(op);
        self.history.push(HistoryEntry {
            operation: op,
            label: op.label().to_string(),
            image: image.bytes,
            width: image.width,
            height: image.height,
            created_at: Utc::now(),
            note: image.note,
        });
        true
    }

    /// Stores a generated story. Returns `false` once the story budget is spent.
    pub fn record_story(&mut self, text: impl Into<String>, cap: u8) -> bool {
        if !self.can_apply(Operation::Story, cap) {
            return false;
        }

        self.counts.increment(Operation::Story);
        self.story = Some(StoryRecord {
            text: text.into(),
            counts_at_generation: self.counts,
            created_at: Utc::now(),
        });
        true
    }
}
