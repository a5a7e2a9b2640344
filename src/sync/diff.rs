//! Change-set payload the editor submits for one document.
//!
//! Sub-lists are independent and default to empty, so a payload that only
//! renames one speaker is just `{"speakers": {"updated": [{"id": 3, "name": "x"}]}}`.

use serde::{Deserialize, Serialize};

use crate::database::models::DocumentStatus;

/// Reference from a new script line to its speaker: either a speaker row
/// that already exists, or a speaker created earlier in the same diff and
/// known only by its client-side temp id.
///
/// The wire form is a single string; it is classified once at parse time
/// instead of being re-inspected at every use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeakerRef {
    Existing(i64),
    Pending(String),
}

impl SpeakerRef {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(id) => Self::Existing(id),
            Err(_) => Self::Pending(raw.to_string()),
        }
    }
}

impl std::fmt::Display for SpeakerRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Existing(id) => write!(f, "{}", id),
            Self::Pending(temp_id) => write!(f, "{}", temp_id),
        }
    }
}

impl Serialize for SpeakerRef {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for SpeakerRef {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Ok(SpeakerRef::parse(&raw))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerCreate {
    pub temp_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerUpdate {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeakerDiff {
    #[serde(default)]
    pub created: Vec<SpeakerCreate>,
    #[serde(default)]
    pub updated: Vec<SpeakerUpdate>,
    #[serde(default)]
    pub deleted: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptLineCreate {
    pub temp_id: String,
    /// Existing speaker row id as a decimal string, or a temp id from
    /// `speakers.created` in the same diff.
    pub speaker_id: SpeakerRef,
    pub text: String,
    #[serde(default)]
    pub start_time: Option<String>,
    pub order: i64,
}

/// Sparse patch: only fields present in the payload are written. `None`
/// means "leave untouched", matching the editor's partial-update contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptLineUpdate {
    pub id: i64,
    #[serde(default)]
    pub speaker_id: Option<i64>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
}

impl ScriptLineUpdate {
    pub fn is_empty(&self) -> bool {
        self.speaker_id.is_none() && self.text.is_none() && self.start_time.is_none()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order: i64,
}

/// Workflow statuses a diff is allowed to set. `pending` is the ingestion
/// default and is never re-entered through the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusChange {
    InProgress,
    Completed,
}

impl From<StatusChange> for DocumentStatus {
    fn from(s: StatusChange) -> Self {
        match s {
            StatusChange::InProgress => DocumentStatus::InProgress,
            StatusChange::Completed => DocumentStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScriptLineDiff {
    #[serde(default)]
    pub speakers: SpeakerDiff,
    #[serde(default)]
    pub created: Vec<ScriptLineCreate>,
    #[serde(default)]
    pub updated: Vec<ScriptLineUpdate>,
    #[serde(default)]
    pub deleted: Vec<i64>,
    #[serde(default)]
    pub orders: Vec<OrderItem>,
    #[serde(default)]
    pub status: Option<StatusChange>,
}

/// One `(temp_id, real id)` pair reported back after a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMapping {
    pub temp_id: String,
    pub id: i64,
}

/// Reconciliation result: creation mappings only. Updates, deletes, and
/// reorders produce no entries — the client already knows those ids.
/// Empty sequences, not absent fields, when the diff created nothing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffResult {
    pub speakers: Vec<IdMapping>,
    pub lines: Vec<IdMapping>,
}
