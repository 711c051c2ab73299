//! Search field repository.

use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use crate::error::StoreError;
use crate::store::{format_timestamp, parse_timestamp, Database};
use crate::twitter::types::{SearchField, SearchSpec};

const SELECT_SPEC: &str = "SELECT id, author, search_field, created_at FROM search_fields";

impl Database {
    /// All stored search fields, newest first.
    pub fn list_specs(&self) -> Result<Vec<SearchSpec>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{SELECT_SPEC} ORDER BY id DESC"))?;
        let rows = stmt.query_map([], read_row)?;

        let mut specs = Vec::new();
        for row in rows {
            specs.push(row?.into_spec()?);
        }
        Ok(specs)
    }

    pub fn get_spec(&self, id: i64) -> Result<SearchSpec, StoreError> {
        let conn = self.conn();
        let row = conn
            .query_row(&format!("{SELECT_SPEC} WHERE id = ?1"), [id], read_row)
            .optional()?
            .ok_or(StoreError::NotFound)?;
        row.into_spec()
    }

    /// Insert a new search field. The author column mirrors `q.author`.
    pub fn create_spec(&self, field: &SearchField) -> Result<SearchSpec, StoreError> {
        let serialized = serde_json::to_string(field)?;
        let created_at = Utc::now();

        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO search_fields (author, search_field, created_at) VALUES (?1, ?2, ?3)",
                params![field.q.author, serialized, format_timestamp(&created_at)],
            )
            .map_err(|e| author_conflict(e, &field.q.author))?;
            conn.last_insert_rowid()
        };

        log::info!("➕ Search field {} created for @{}", id, field.q.author);
        Ok(SearchSpec {
            id,
            author: field.q.author.clone(),
            search_field: field.clone(),
            created_at,
        })
    }

    /// Replace author and criteria of an existing search field atomically.
    pub fn replace_spec(&self, id: i64, field: &SearchField) -> Result<SearchSpec, StoreError> {
        let serialized = serde_json::to_string(field)?;
        let updated = self
            .conn()
            .execute(
                "UPDATE search_fields SET author = ?1, search_field = ?2 WHERE id = ?3",
                params![field.q.author, serialized, id],
            )
            .map_err(|e| author_conflict(e, &field.q.author))?;

        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        log::info!("✏️  Search field {} replaced (@{})", id, field.q.author);
        self.get_spec(id)
    }

    pub fn delete_spec(&self, id: i64) -> Result<(), StoreError> {
        let deleted = self
            .conn()
            .execute("DELETE FROM search_fields WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(StoreError::NotFound);
        }
        log::info!("🗑️  Search field {} deleted", id);
        Ok(())
    }
}

struct SpecRow {
    id: i64,
    author: String,
    search_field: String,
    created_at: String,
}

impl SpecRow {
    fn into_spec(self) -> Result<SearchSpec, StoreError> {
        Ok(SearchSpec {
            id: self.id,
            author: self.author,
            search_field: serde_json::from_str(&self.search_field)?,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<SpecRow> {
    Ok(SpecRow {
        id: row.get(0)?,
        author: row.get(1)?,
        search_field: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn author_conflict(e: rusqlite::Error, author: &str) -> StoreError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Validation(format!("A search field for author '{author}' already exists"))
        }
        other => StoreError::Database(other),
    }
}
