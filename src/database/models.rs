use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    InProgress,
    Completed,
}

impl Default for DocumentStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl From<String> for DocumentStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "pending" => Self::Pending,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            _ => Self::Pending,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub category_id: i64,
    pub title: String,
    pub audio_url: Option<String>,
    pub file_size: i64,
    pub status: DocumentStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speaker {
    pub id: i64,
    pub document_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptLine {
    pub id: i64,
    pub document_id: i64,
    pub speaker_id: Option<i64>,
    pub text: String,
    /// Free-form "mm:ss" marker supplied by the transcription pass.
    pub start_time: Option<String>,
    pub order: i64,
}

/// A document together with its speakers and ordered script lines,
/// as returned to the editor for a full load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDetail {
    pub document: Document,
    pub speakers: Vec<Speaker>,
    pub script_lines: Vec<ScriptLine>,
}

/// Sort keys accepted by the document listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSort {
    Id,
    Title,
    FileSize,
    UpdatedAt,
}

impl Default for DocumentSort {
    fn default() -> Self {
        Self::Id
    }
}
