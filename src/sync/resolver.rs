//! Temp-id to real-id resolution, scoped to one diff transaction.

use std::collections::HashMap;

use crate::error::AppError;
use crate::sync::diff::SpeakerRef;

/// Mutable mapping from client temp ids to server-assigned row ids,
/// populated as creations flush inside the transaction. Speaker and line
/// temp ids live in separate namespaces: each map is only consulted within
/// its own entity's creation loop.
#[derive(Debug, Default)]
pub struct IdResolver {
    speakers: HashMap<String, i64>,
    lines: HashMap<String, i64>,
}

impl IdResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a freshly inserted speaker. Each temp id may map to exactly
    /// one real id; a duplicate means the client sent a malformed diff.
    pub fn record_speaker(&mut self, temp_id: &str, id: i64) -> Result<(), AppError> {
        if self.speakers.insert(temp_id.to_string(), id).is_some() {
            return Err(AppError::Validation(format!(
                "duplicate speaker temp_id '{}'",
                temp_id
            )));
        }
        Ok(())
    }

    pub fn record_line(&mut self, temp_id: &str, id: i64) -> Result<(), AppError> {
        if self.lines.insert(temp_id.to_string(), id).is_some() {
            return Err(AppError::Validation(format!(
                "duplicate script line temp_id '{}'",
                temp_id
            )));
        }
        Ok(())
    }

    /// Resolve a new line's speaker reference: the temp map wins over the
    /// numeric reading, so a temp id that happens to look like a number
    /// still resolves to the speaker created in this diff. Whether a
    /// resolved numeric id actually exists is the foreign key's problem.
    pub fn resolve_speaker(&self, speaker_ref: &SpeakerRef) -> Result<i64, AppError> {
        match speaker_ref {
            SpeakerRef::Pending(temp_id) => self
                .speakers
                .get(temp_id)
                .copied()
                .ok_or_else(|| AppError::UnresolvedReference(temp_id.clone())),
            SpeakerRef::Existing(id) => Ok(self
                .speakers
                .get(&id.to_string())
                .copied()
                .unwrap_or(*id)),
        }
    }

    pub fn speaker_id(&self, temp_id: &str) -> Option<i64> {
        self.speakers.get(temp_id).copied()
    }

    pub fn line_id(&self, temp_id: &str) -> Option<i64> {
        self.lines.get(temp_id).copied()
    }
}
