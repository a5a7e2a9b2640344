//! Transcript editor backend.
//!
//! Storage-backed document/speaker/script-line model plus the diff
//! synchronization engine that reconciles editor change-sets atomically.
//! Transport, payload validation, export formatting, and audio URL signing
//! live in the callers.

pub mod database;
pub mod error;
pub mod sync;

pub use database::{Database, Document, DocumentDetail, DocumentStatus, ScriptLine, Speaker};
pub use error::AppError;
pub use sync::{DiffResult, ScriptLineDiff};
