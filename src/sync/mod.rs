//! Diff synchronization engine.
//!
//! Reconciles a client-authored change-set against one document as a single
//! atomic unit: resolves client temp ids to server-assigned ids created
//! mid-transaction, applies all mutations in the fixed plan order, and
//! reports the temp-id to real-id mappings back for client reconciliation.
//! Any failure anywhere in the plan rolls the whole batch back; there is no
//! partial-success shape.

pub mod diff;
pub mod plan;
pub mod resolver;


use rusqlite::{params, OptionalExtension, ToSql, Transaction};

use crate::database::{Database, DocumentStatus};
use crate::error::AppError;

pub use diff::{
    DiffResult, IdMapping, OrderItem, ScriptLineCreate, ScriptLineDiff, ScriptLineUpdate,
    SpeakerCreate, SpeakerDiff, SpeakerRef, SpeakerUpdate, StatusChange,
};
pub use plan::{DiffStep, EXECUTION_ORDER};
pub use resolver::IdResolver;

impl Database {
    /// Apply one editor diff to a document, atomically.
    ///
    /// Either every accepted step lands durably or none do. Concurrent diffs
    /// against the same document are not coordinated beyond the storage
    /// transaction itself; the last commit wins on overlapping fields.
    pub fn apply_diff(
        &self,
        document_id: i64,
        diff: &ScriptLineDiff,
    ) -> Result<DiffResult, AppError> {
        validate_diff(diff)?;

        log::info!(
            "Applying diff to document {}: {} speaker creates, {} speaker updates, {} speaker deletes, {} line creates, {} line updates, {} line deletes, {} reorders, status {:?}",
            document_id,
            diff.speakers.created.len(),
            diff.speakers.updated.len(),
            diff.speakers.deleted.len(),
            diff.created.len(),
            diff.updated.len(),
            diff.deleted.len(),
            diff.orders.len(),
            diff.status,
        );

        let mut conn = self.conn.lock().unwrap();

        // Fail fast before any mutating statement
        let exists: Option<i64> = conn
            .query_row(
                "SELECT id FROM documents WHERE id = ?",
                params![document_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(AppError::from)?;
        if exists.is_none() {
            return Err(AppError::NotFound(format!("document {}", document_id)));
        }

        // One transaction wraps every step; dropping it without commit (any
        // error path, or a caller abort) rolls everything back.
        let tx = conn.transaction().map_err(AppError::from)?;
        let mut resolver = IdResolver::new();

        for step in EXECUTION_ORDER {
            tracing::debug!(?step, document_id, "executing diff step");
            match step {
                DiffStep::DeleteSpeakers => {
                    delete_by_ids(&tx, "speakers", document_id, &diff.speakers.deleted)?;
                }
                DiffStep::CreateSpeakers => {
                    create_speakers(&tx, document_id, &diff.speakers.created, &mut resolver)?;
                }
                DiffStep::UpdateSpeakers => {
                    update_speakers(&tx, document_id, &diff.speakers.updated)?;
                }
                DiffStep::DeleteLines => {
                    delete_by_ids(&tx, "script_lines", document_id, &diff.deleted)?;
                }
                DiffStep::CreateLines => {
                    create_lines(&tx, document_id, &diff.created, &mut resolver)?;
                }
                DiffStep::UpdateLines => {
                    update_lines(&tx, document_id, &diff.updated)?;
                }
                DiffStep::ReorderLines => {
                    reorder_lines(&tx, document_id, &diff.orders)?;
                }
                DiffStep::UpdateStatus => {
                    if let Some(status) = diff.status {
                        update_status(&tx, document_id, status.into())?;
                    }
                }
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE documents SET updated_at = ? WHERE id = ?",
            params![now, document_id],
        )
        .map_err(AppError::from)?;

        tx.commit().map_err(AppError::from)?;

        report(diff, &resolver)
    }
}

/// Shape checks the engine can do before touching storage. Deeper problems
/// (dangling speaker ids, rows owned by another document) are left to the
/// transaction's constraint enforcement.
fn validate_diff(diff: &ScriptLineDiff) -> Result<(), AppError> {
    let mut seen = std::collections::HashSet::new();
    for speaker in &diff.speakers.created {
        if !seen.insert(speaker.temp_id.as_str()) {
            return Err(AppError::Validation(format!(
                "duplicate speaker temp_id '{}'",
                speaker.temp_id
            )));
        }
    }
    seen.clear();
    for line in &diff.created {
        if !seen.insert(line.temp_id.as_str()) {
            return Err(AppError::Validation(format!(
                "duplicate script line temp_id '{}'",
                line.temp_id
            )));
        }
    }
    Ok(())
}

/// Bulk delete by id set, scoped to the owning document. Ids already gone
/// are a no-op, matching delete semantics everywhere else in this backend.
fn delete_by_ids(
    tx: &Transaction<'_>,
    table: &str,
    document_id: i64,
    ids: &[i64],
) -> Result<(), AppError> {
    if ids.is_empty() {
        return Ok(());
    }
    let id_list = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "DELETE FROM {} WHERE document_id = ?1 AND id IN ({})",
        table, id_list
    );
    tx.execute(&sql, params![document_id])
        .map_err(AppError::from)?;
    Ok(())
}

/// Insert new speakers in listed order. Each insert's assigned id is
/// recorded in the resolver before the next one runs, so line creation can
/// see every speaker from this diff.
fn create_speakers(
    tx: &Transaction<'_>,
    document_id: i64,
    created: &[SpeakerCreate],
    resolver: &mut IdResolver,
) -> Result<(), AppError> {
    for speaker in created {
        tx.execute(
            "INSERT INTO speakers (document_id, name) VALUES (?, ?)",
            params![document_id, speaker.name],
        )
        .map_err(AppError::from)?;
        resolver.record_speaker(&speaker.temp_id, tx.last_insert_rowid())?;
    }
    Ok(())
}

fn update_speakers(
    tx: &Transaction<'_>,
    document_id: i64,
    updated: &[SpeakerUpdate],
) -> Result<(), AppError> {
    for speaker in updated {
        let affected = tx
            .execute(
                "UPDATE speakers SET name = ? WHERE id = ? AND document_id = ?",
                params![speaker.name, speaker.id, document_id],
            )
            .map_err(AppError::from)?;
        if affected == 0 {
            return Err(AppError::Constraint(format!(
                "speaker {} does not belong to document {}",
                speaker.id, document_id
            )));
        }
    }
    Ok(())
}

fn create_lines(
    tx: &Transaction<'_>,
    document_id: i64,
    created: &[ScriptLineCreate],
    resolver: &mut IdResolver,
) -> Result<(), AppError> {
    for line in created {
        let speaker_id = resolver.resolve_speaker(&line.speaker_id)?;
        tx.execute(
            "INSERT INTO script_lines (document_id, speaker_id, text, start_time, line_order)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![document_id, speaker_id, line.text, line.start_time, line.order],
        )
        .map_err(AppError::from)?;
        resolver.record_line(&line.temp_id, tx.last_insert_rowid())?;
    }
    Ok(())
}

/// Sparse patches: only the fields present in each patch are written.
fn update_lines(
    tx: &Transaction<'_>,
    document_id: i64,
    updated: &[ScriptLineUpdate],
) -> Result<(), AppError> {
    for patch in updated {
        if patch.is_empty() {
            continue;
        }

        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<&dyn ToSql> = Vec::new();
        if let Some(ref speaker_id) = patch.speaker_id {
            assignments.push("speaker_id = ?");
            values.push(speaker_id);
        }
        if let Some(ref text) = patch.text {
            assignments.push("text = ?");
            values.push(text);
        }
        if let Some(ref start_time) = patch.start_time {
            assignments.push("start_time = ?");
            values.push(start_time);
        }
        values.push(&patch.id);
        values.push(&document_id);

        let sql = format!(
            "UPDATE script_lines SET {} WHERE id = ? AND document_id = ?",
            assignments.join(", ")
        );
        let affected = tx.execute(&sql, &values[..]).map_err(AppError::from)?;
        if affected == 0 {
            return Err(AppError::Constraint(format!(
                "script line {} does not belong to document {}",
                patch.id, document_id
            )));
        }
    }
    Ok(())
}

/// Order reassignments, independent of the sparse updates even when both
/// touch the same line.
fn reorder_lines(
    tx: &Transaction<'_>,
    document_id: i64,
    orders: &[OrderItem],
) -> Result<(), AppError> {
    for item in orders {
        let affected = tx
            .execute(
                "UPDATE script_lines SET line_order = ? WHERE id = ? AND document_id = ?",
                params![item.order, item.id, document_id],
            )
            .map_err(AppError::from)?;
        if affected == 0 {
            return Err(AppError::Constraint(format!(
                "script line {} does not belong to document {}",
                item.id, document_id
            )));
        }
    }
    Ok(())
}

/// No monotonicity check: a diff may legally move status backward or resend
/// the same value.
fn update_status(
    tx: &Transaction<'_>,
    document_id: i64,
    status: DocumentStatus,
) -> Result<(), AppError> {
    tx.execute(
        "UPDATE documents SET status = ? WHERE id = ?",
        params![status.to_string(), document_id],
    )
    .map_err(AppError::from)?;
    Ok(())
}

/// Assemble the response mappings after a successful commit, in the order
/// the creations were listed.
fn report(diff: &ScriptLineDiff, resolver: &IdResolver) -> Result<DiffResult, AppError> {
    let mut result = DiffResult::default();
    for speaker in &diff.speakers.created {
        let id = resolver
            .speaker_id(&speaker.temp_id)
            .ok_or_else(|| AppError::Other(format!("unmapped temp_id '{}'", speaker.temp_id)))?;
        result.speakers.push(IdMapping {
            temp_id: speaker.temp_id.clone(),
            id,
        });
    }
    for line in &diff.created {
        let id = resolver
            .line_id(&line.temp_id)
            .ok_or_else(|| AppError::Other(format!("unmapped temp_id '{}'", line.temp_id)))?;
        result.lines.push(IdMapping {
            temp_id: line.temp_id.clone(),
            id,
        });
    }
    Ok(result)
}
