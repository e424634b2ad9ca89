//! SQLite-backed ledger of notification emails that have already been handled.

use chrono::{DateTime, Utc};
use replybot_core::{CoreError, DatabaseError, LedgerEntry, LedgerStats, ParsedReference};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

#[cfg(test)]
mod tests;

/// The outcome recorded for one message.
///
/// `response_url` doubles as the posted flag so a row can never claim a reply without a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedRecord {
    pub message_id: String,
    pub reddit_url: String,
    pub post_id: String,
    pub comment_id: Option<String>,
    pub relevant: bool,
    pub response_url: Option<String>,
}

impl ProcessedRecord {
    /// A message with no usable Reddit reference.
    pub fn unparseable(message_id: &str) -> Self {
        Self {
            message_id: message_id.to_string(),
            reddit_url: String::new(),
            post_id: String::new(),
            comment_id: None,
            relevant: false,
            response_url: None,
        }
    }

    pub fn for_reference(message_id: &str, reference: &ParsedReference) -> Self {
        Self {
            message_id: message_id.to_string(),
            reddit_url: reference.url.clone(),
            post_id: reference.post_id.clone(),
            comment_id: reference.comment_id.clone(),
            relevant: false,
            response_url: None,
        }
    }

    pub fn relevant(mut self, relevant: bool) -> Self {
        self.relevant = relevant;
        self
    }

    pub fn posted(mut self, response_url: impl Into<String>) -> Self {
        self.response_url = Some(response_url.into());
        self
    }

    pub fn response_posted(&self) -> bool {
        self.response_url.is_some()
    }
}

type EntryRow = (
    String,
    String,
    String,
    Option<String>,
    bool,
    bool,
    Option<String>,
    DateTime<Utc>,
);

pub struct Database {
    connection_string: String,
    pool: Option<SqlitePool>,
}

impl Database {
    pub fn new(connection_string: String) -> Self {
        Self {
            connection_string,
            pool: None,
        }
    }

    pub async fn connect(&mut self) -> Result<(), CoreError> {
        let options = SqliteConnectOptions::from_str(&self.connection_string)
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true);

        // Runs are sequential; one connection also keeps in-memory databases coherent.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| DatabaseError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        info!("Connected to ledger at {}", self.connection_string);
        self.pool = Some(pool);
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<(), CoreError> {
        sqlx::migrate!("./migrations")
            .run(self.pool()?)
            .await
            .map_err(|e| DatabaseError::MigrationFailed {
                migration: e.to_string(),
            })?;
        debug!("Ledger migrations applied");
        Ok(())
    }

    pub async fn is_processed(&self, message_id: &str) -> Result<bool, CoreError> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM processed_emails WHERE email_id = ?1")
                .bind(message_id)
                .fetch_optional(self.pool()?)
                .await
                .map_err(DatabaseError::from)?;
        Ok(found.is_some())
    }

    /// Insert or overwrite the outcome for `record.message_id`. The first `processed_at` is kept.
    pub async fn mark_processed(&self, record: &ProcessedRecord) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO processed_emails \
             (email_id, reddit_url, reddit_post_id, reddit_comment_id, processed_at, relevant, response_posted, response_url) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
             ON CONFLICT(email_id) DO UPDATE SET \
             reddit_url = excluded.reddit_url, \
             reddit_post_id = excluded.reddit_post_id, \
             reddit_comment_id = excluded.reddit_comment_id, \
             relevant = excluded.relevant, \
             response_posted = excluded.response_posted, \
             response_url = excluded.response_url",
        )
        .bind(&record.message_id)
        .bind(&record.reddit_url)
        .bind(&record.post_id)
        .bind(&record.comment_id)
        .bind(Utc::now())
        .bind(record.relevant)
        .bind(record.response_posted())
        .bind(&record.response_url)
        .execute(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;

        debug!(
            "Recorded {} (relevant: {}, posted: {})",
            record.message_id,
            record.relevant,
            record.response_posted()
        );
        Ok(())
    }

    pub async fn get_stats(&self) -> Result<LedgerStats, CoreError> {
        let (total, relevant, posted): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(relevant), 0), COALESCE(SUM(response_posted), 0) \
             FROM processed_emails",
        )
        .fetch_one(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;

        Ok(LedgerStats {
            total_processed: total.max(0) as u64,
            relevant: relevant.max(0) as u64,
            responses_posted: posted.max(0) as u64,
        })
    }

    pub async fn get_entry(&self, message_id: &str) -> Result<Option<LedgerEntry>, CoreError> {
        let row: Option<EntryRow> = sqlx::query_as(
            "SELECT email_id, reddit_url, reddit_post_id, reddit_comment_id, relevant, response_posted, response_url, processed_at \
             FROM processed_emails WHERE email_id = ?1",
        )
        .bind(message_id)
        .fetch_optional(self.pool()?)
        .await
        .map_err(DatabaseError::from)?;

        Ok(row.map(
            |(message_id, reddit_url, post_id, comment_id, relevant, response_posted, response_url, processed_at)| {
                LedgerEntry {
                    message_id,
                    reddit_url,
                    post_id,
                    comment_id,
                    relevant,
                    response_posted,
                    response_url,
                    processed_at,
                }
            },
        ))
    }

    pub async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
        }
    }

    fn pool(&self) -> Result<&SqlitePool, CoreError> {
        self.pool
            .as_ref()
            .ok_or_else(|| DatabaseError::NotConnected.into())
    }
}
