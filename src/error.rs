use thiserror::Error;

/// Typed application error hierarchy for the editor backend.
///
/// Serializes as a plain string (the `error.message` convention the editor
/// frontend expects) while giving Rust code typed variants that can be
/// matched or propagated with `?`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unresolved speaker reference: {0}")]
    UnresolvedReference(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Invalid diff: {0}")]
    Validation(String),

    #[error("{0}")]
    Database(String),

    #[error("{0}")]
    Io(String),

    #[error("{0}")]
    Json(String),

    #[error("{0}")]
    Other(String),
}

/// Serialize as a plain string so callers receive the same
/// `"error message"` string a raw `String` error would produce.
impl serde::Serialize for AppError {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

// ── From impls ─────────────────────────────────────────────────────────────

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        // A constraint failure that crossed an anyhow boundary inside the
        // storage layer keeps its identity.
        match e.downcast::<rusqlite::Error>() {
            Ok(sql) => sql.into(),
            Err(other) => AppError::Database(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                AppError::Constraint(e.to_string())
            }
            _ => AppError::Database(e.to_string()),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Json(e.to_string())
    }
}

/// Allows `.map_err(|e| format!("…", e))?` and `ok_or_else(|| format!(…))?`
/// to coerce into AppError without changing the call sites.
impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Other(s)
    }
}

/// Allows `.ok_or("literal string")?` to coerce into AppError.
impl From<&str> for AppError {
    fn from(s: &str) -> Self {
        AppError::Other(s.to_string())
    }
}
