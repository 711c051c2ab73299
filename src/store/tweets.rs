//! Tweet repository and the idempotent persistence sink.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter};
use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;
use crate::store::{format_timestamp, parse_timestamp, Database};
use crate::twitter::types::TweetRecord;

/// Outcome of one batch write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    /// Newly inserted rows
    pub written: usize,
    /// Records whose tweet_id was already stored
    pub skipped: usize,
}

/// Destination of mapped tweet batches.
///
/// Implementations must make the uniqueness check and insert atomic so that
/// overlapping cycles never store a tweet twice, and must never update an
/// existing row.
#[async_trait]
pub trait TweetSink: Send + Sync {
    async fn write_all(&self, records: &[TweetRecord]) -> Result<WriteSummary, StoreError>;
}

/// A tweet row as exposed by the API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredTweet {
    pub id: i64,
    pub tweet_id: u64,
    pub author: String,
    pub author_id: u64,
    pub tweet_text: String,
    pub tweet_date: DateTime<Utc>,
    pub json_data: Value,
    pub search_params: Value,
    pub datetime_added: DateTime<Utc>,
}

#[async_trait]
impl TweetSink for Database {
    async fn write_all(&self, records: &[TweetRecord]) -> Result<WriteSummary, StoreError> {
        self.insert_tweets(records)
    }
}

impl Database {
    /// Insert a batch in one transaction, ignoring known tweet ids.
    pub fn insert_tweets(&self, records: &[TweetRecord]) -> Result<WriteSummary, StoreError> {
        let inserted_at = format_timestamp(&Utc::now());
        let mut summary = WriteSummary::default();

        let mut conn = self.conn();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO tweets (
                    tweet_id, author, author_id, tweet_text, tweet_date,
                    json_data, search_params, datetime_added
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;

            for record in records {
                let changed = stmt.execute(params![
                    to_sql_id(record.tweet_id)?,
                    record.author,
                    to_sql_id(record.author_id)?,
                    record.text,
                    format_timestamp(&record.posted_at),
                    record.raw_payload,
                    record.source_query,
                    inserted_at,
                ])?;
                if changed == 0 {
                    summary.skipped += 1;
                } else {
                    summary.written += 1;
                }
            }
        }
        tx.commit()?;

        log::info!(
            "💾 Stored {} tweets ({} already known)",
            summary.written,
            summary.skipped
        );
        Ok(summary)
    }

    /// Highest stored tweet id for `author`, the next fetch's since_id.
    pub fn latest_tweet_id(&self, author: &str) -> Result<Option<u64>, StoreError> {
        let latest: Option<i64> = self.conn().query_row(
            "SELECT MAX(tweet_id) FROM tweets WHERE author = ?1",
            [author],
            |row| row.get(0),
        )?;
        latest.map(from_sql_id).transpose()
    }

    /// Stored tweets, newest tweet id first, optionally restricted to a set
    /// of authors. An empty slice means no filter.
    pub fn list_tweets(&self, authors: &[String]) -> Result<Vec<StoredTweet>, StoreError> {
        let mut sql = String::from(
            "SELECT id, tweet_id, author, author_id, tweet_text, tweet_date, \
             json_data, search_params, datetime_added FROM tweets",
        );
        if !authors.is_empty() {
            let placeholders = vec!["?"; authors.len()].join(", ");
            sql.push_str(&format!(" WHERE author IN ({placeholders})"));
        }
        sql.push_str(" ORDER BY tweet_id DESC");

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(authors.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, String>(8)?,
            ))
        })?;

        let mut tweets = Vec::new();
        for row in rows {
            let (id, tweet_id, author, author_id, text, date, json_data, search_params, added) = row?;
            tweets.push(StoredTweet {
                id,
                tweet_id: from_sql_id(tweet_id)?,
                author,
                author_id: from_sql_id(author_id)?,
                tweet_text: text,
                tweet_date: parse_timestamp(&date)?,
                json_data: serde_json::from_str(&json_data)?,
                search_params: serde_json::from_str(&search_params)?,
                datetime_added: parse_timestamp(&added)?,
            });
        }
        Ok(tweets)
    }

    pub fn count_tweets(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM tweets", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn to_sql_id(id: u64) -> Result<i64, StoreError> {
    i64::try_from(id).map_err(|_| StoreError::Validation(format!("id {id} exceeds the storable range")))
}

fn from_sql_id(id: i64) -> Result<u64, StoreError> {
    u64::try_from(id).map_err(|_| StoreError::Corrupt(format!("negative id {id}")))
}
