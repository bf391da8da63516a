//! Excuse record store.
//!
//! A single SQLite table keyed by excuse text. Every operation is one
//! statement on a connection acquired from the pool for the duration of the
//! call; SQLite wraps it in an implicit transaction and the connection goes
//! back to the pool on every exit path.

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::models::{ExcuseRecord, HistoryEntry, Rating};

/// Canonical stored form; sorts lexicographically in time order.
pub const STORED_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Accepts the stored form with or without fractional seconds.
const PARSE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// Human-facing form used in history listings.
pub const DISPLAY_TIME_FORMAT: &str = "%b %d, %Y – %I:%M %p";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("No excuse with id {0}")]
    RecordNotFound(i64),

    #[error("Rating {0} is outside the 1-5 scale")]
    InvalidRating(i64),

    #[error("Excuse {id} has an unparseable created_at '{value}': {source}")]
    CorruptTimestamp {
        id: i64,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Store integrity violation: {0}")]
    Integrity(String),
}

#[derive(Debug, Clone)]
pub struct ExcuseStore {
    pool: SqlitePool,
}

impl ExcuseStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert `text` or return the id of the record that already holds it.
    pub async fn dedup_insert(&self, text: &str) -> Result<i64, StoreError> {
        self.dedup_insert_at(text, Utc::now()).await
    }

    /// `dedup_insert` with an explicit creation time. The time is only used
    /// when a new record is created; an existing record keeps its own.
    pub async fn dedup_insert_at(
        &self,
        text: &str,
        created_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let stamp = created_at.format(STORED_TIME_FORMAT).to_string();

        // The no-op update makes RETURNING yield the existing row on conflict,
        // so insert-or-lookup is one statement under the UNIQUE(text) constraint.
        let row: Option<(i64, String)> = sqlx::query_as(
            r#"
            INSERT INTO excuses (text, rating, created_at)
            VALUES (?1, NULL, ?2)
            ON CONFLICT(text) DO UPDATE SET text = excluded.text
            RETURNING id, created_at
            "#,
        )
        .bind(text)
        .bind(&stamp)
        .fetch_optional(&self.pool)
        .await?;

        let (id, stored_at) = row.ok_or_else(|| {
            StoreError::Integrity("dedup insert returned no row".to_string())
        })?;

        if stored_at == stamp {
            tracing::info!(id, "Stored new excuse");
        } else {
            tracing::debug!(id, "Excuse text already stored, reusing record");
        }

        Ok(id)
    }

    /// Overwrite the rating of record `id`.
    pub async fn set_rating(&self, id: i64, rating: Rating) -> Result<(), StoreError> {
        let affected = sqlx::query("UPDATE excuses SET rating = ?1 WHERE id = ?2")
            .bind(rating.value())
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            tracing::warn!(id, "Rating targeted an unknown excuse");
            return Err(StoreError::RecordNotFound(id));
        }

        tracing::info!(id, rating = rating.value(), "Excuse rated");
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Option<ExcuseRecord>, StoreError> {
        let record = sqlx::query_as::<_, ExcuseRecord>(
            "SELECT id, text, rating, created_at FROM excuses WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Up to `limit` records, newest first. Equal timestamps fall back to
    /// insertion order, newest insert first.
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<HistoryEntry>, StoreError> {
        let records = sqlx::query_as::<_, ExcuseRecord>(
            r#"
            SELECT id, text, rating, created_at
            FROM excuses
            ORDER BY created_at DESC, id DESC
            LIMIT ?1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(to_history_entry).collect()
    }

    /// Remove every record. Returns how many were deleted.
    pub async fn clear_all(&self) -> Result<u64, StoreError> {
        let removed = sqlx::query("DELETE FROM excuses")
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(removed, "Cleared excuse history");
        Ok(removed)
    }
}

pub fn parse_stored_time(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, PARSE_TIME_FORMAT)
}

fn to_history_entry(record: ExcuseRecord) -> Result<HistoryEntry, StoreError> {
    let parsed = match parse_stored_time(&record.created_at) {
        Ok(t) => t,
        Err(source) => {
            tracing::error!(id = record.id, value = %record.created_at, "Corrupt stored timestamp");
            return Err(StoreError::CorruptTimestamp {
                id: record.id,
                value: record.created_at,
                source,
            });
        }
    };

    Ok(HistoryEntry {
        id: record.id,
        text: record.text,
        rating: record.rating,
        formatted_time: parsed.format(DISPLAY_TIME_FORMAT).to_string(),
    })
}
