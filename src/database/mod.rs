pub mod models;


use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub use models::*;

pub struct Database {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        // WAL for concurrent reads; foreign keys ON so dangling speaker or
        // document references abort the surrounding transaction.
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            PRAGMA cache_size=10000;
            PRAGMA temp_store=MEMORY;
        ",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        // Initialize schema
        db.init_schema()?;

        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                category_id INTEGER NOT NULL,
                title TEXT NOT NULL DEFAULT 'New Document',
                audio_url TEXT,
                file_size INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                FOREIGN KEY (category_id) REFERENCES categories(id)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_category
                ON documents(category_id);
            CREATE INDEX IF NOT EXISTS idx_documents_status
                ON documents(category_id, status);

            CREATE TABLE IF NOT EXISTS speakers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id INTEGER NOT NULL,
                name TEXT NOT NULL DEFAULT 'New Speaker',
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_speakers_document ON speakers(document_id);

            CREATE TABLE IF NOT EXISTS script_lines (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id INTEGER NOT NULL,
                speaker_id INTEGER,
                text TEXT NOT NULL,
                start_time TEXT,
                line_order INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE,
                FOREIGN KEY (speaker_id) REFERENCES speakers(id) ON DELETE SET NULL
            );

            CREATE INDEX IF NOT EXISTS idx_script_lines_document
                ON script_lines(document_id, line_order);
            CREATE INDEX IF NOT EXISTS idx_script_lines_speaker
                ON script_lines(speaker_id);
        "#,
        )?;

        Ok(())
    }

    // =========================================================================
    // Category queries
    // =========================================================================

    pub fn get_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, name, created_at FROM categories ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
                created_at: row.get(2)?,
            })
        })?;
        let mut categories = Vec::new();
        for row in rows {
            categories.push(row?);
        }
        Ok(categories)
    }

    pub fn create_category(&self, name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute("INSERT INTO categories (name) VALUES (?)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    // =========================================================================
    // Document queries
    // =========================================================================

    pub fn get_documents(
        &self,
        category_id: i64,
        q: Option<&str>,
        status: Option<DocumentStatus>,
        sort_by: DocumentSort,
        sort_desc: bool,
        page: i64,
        size: i64,
    ) -> Result<(Vec<Document>, i64)> {
        let conn = self.conn.lock().unwrap();

        let mut conditions = vec!["category_id = ?1".to_string()];
        if let Some(search_term) = q {
            if !search_term.is_empty() {
                conditions.push(format!(
                    "title LIKE '%{}%'",
                    search_term.replace('\'', "''")
                ));
            }
        }
        if let Some(status) = status {
            conditions.push(format!("status = '{}'", status));
        }

        let where_clause = format!("WHERE {}", conditions.join(" AND "));

        let sort_column = match sort_by {
            DocumentSort::Id => "id",
            DocumentSort::Title => "title",
            DocumentSort::FileSize => "file_size",
            DocumentSort::UpdatedAt => "updated_at",
        };
        let sort_direction = if sort_desc { "DESC" } else { "ASC" };

        // Get total count
        let count_sql = format!("SELECT COUNT(*) FROM documents {}", where_clause);
        let total: i64 = conn.query_row(&count_sql, params![category_id], |row| row.get(0))?;

        let page = page.max(1);
        let sql = format!(
            "SELECT id, category_id, title, audio_url, file_size, status, created_at, updated_at
             FROM documents {}
             ORDER BY {} {}
             LIMIT ?2 OFFSET ?3",
            where_clause, sort_column, sort_direction
        );

        let mut stmt = conn.prepare(&sql)?;
        let documents = stmt
            .query_map(params![category_id, size, (page - 1) * size], map_document)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok((documents, total))
    }

    pub fn get_document(&self, id: i64) -> Result<Option<Document>> {
        let conn = self.conn.lock().unwrap();
        let document = conn
            .query_row(
                "SELECT id, category_id, title, audio_url, file_size, status, created_at, updated_at
                 FROM documents WHERE id = ?",
                params![id],
                map_document,
            )
            .optional()?;
        Ok(document)
    }

    /// Full editor load: document row plus speakers and ordered script lines.
    pub fn get_document_detail(&self, id: i64) -> Result<Option<DocumentDetail>> {
        let document = match self.get_document(id)? {
            Some(d) => d,
            None => return Ok(None),
        };
        let speakers = self.get_speakers(id)?;
        let script_lines = self.get_script_lines(id)?;
        Ok(Some(DocumentDetail {
            document,
            speakers,
            script_lines,
        }))
    }

    /// Ingestion entry point: register a document under a category.
    pub fn create_document(
        &self,
        category_id: i64,
        title: &str,
        audio_url: Option<&str>,
        file_size: i64,
    ) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO documents (category_id, title, audio_url, file_size, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)",
            params![category_id, title, audio_url, file_size, now, now],
        )?;
        Ok(conn.last_insert_rowid())
    }

    // =========================================================================
    // Speaker and script-line queries
    // =========================================================================

    pub fn get_speakers(&self, document_id: i64) -> Result<Vec<Speaker>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, document_id, name FROM speakers WHERE document_id = ? ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![document_id], |row| {
            Ok(Speaker {
                id: row.get(0)?,
                document_id: row.get(1)?,
                name: row.get(2)?,
            })
        })?;
        let mut speakers = Vec::new();
        for row in rows {
            speakers.push(row?);
        }
        Ok(speakers)
    }

    pub fn get_script_lines(&self, document_id: i64) -> Result<Vec<ScriptLine>> {
        let conn = self.conn.lock().unwrap();
        // line_order is not required to be contiguous or unique; id is the
        // stable tiebreak.
        let mut stmt = conn.prepare(
            "SELECT id, document_id, speaker_id, text, start_time, line_order
             FROM script_lines WHERE document_id = ?
             ORDER BY line_order ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![document_id], map_script_line)?;
        let mut lines = Vec::new();
        for row in rows {
            lines.push(row?);
        }
        Ok(lines)
    }

    pub fn get_script_line(&self, id: i64) -> Result<Option<ScriptLine>> {
        let conn = self.conn.lock().unwrap();
        let line = conn
            .query_row(
                "SELECT id, document_id, speaker_id, text, start_time, line_order
                 FROM script_lines WHERE id = ?",
                params![id],
                map_script_line,
            )
            .optional()?;
        Ok(line)
    }

    /// Register a speaker outside the diff path (offline ingestion).
    pub fn insert_speaker(&self, document_id: i64, name: &str) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO speakers (document_id, name) VALUES (?, ?)",
            params![document_id, name],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Bulk-load the script lines a transcription pass produced, in one
    /// transaction. Lines are numbered by their position in the slice.
    pub fn insert_script_lines(
        &self,
        document_id: i64,
        lines: &[(Option<i64>, String, Option<String>)],
    ) -> Result<Vec<i64>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut ids = Vec::with_capacity(lines.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO script_lines (document_id, speaker_id, text, start_time, line_order)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for (idx, (speaker_id, text, start_time)) in lines.iter().enumerate() {
                stmt.execute(params![document_id, speaker_id, text, start_time, idx as i64])?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit()?;
        Ok(ids)
    }
}

fn map_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(0)?,
        category_id: row.get(1)?,
        title: row.get(2)?,
        audio_url: row.get(3)?,
        file_size: row.get(4)?,
        status: row.get::<_, String>(5).unwrap_or_default().into(),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn map_script_line(row: &Row<'_>) -> rusqlite::Result<ScriptLine> {
    Ok(ScriptLine {
        id: row.get(0)?,
        document_id: row.get(1)?,
        speaker_id: row.get(2)?,
        text: row.get(3)?,
        start_time: row.get(4)?,
        order: row.get(5)?,
    })
}
