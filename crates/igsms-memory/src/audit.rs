//! Audit log: records every SMS that enters or leaves igsms.

use igsms_core::error::IgsmsError;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// An entry to write to the audit log.
pub struct AuditEntry {
    pub direction: Direction,
    /// Phone number on the other end.
    pub counterparty: String,
    pub body: String,
    pub status: AuditStatus,
    /// Error text or denial reason.
    pub detail: Option<String>,
}

/// Which way the message travelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// Status of an audited message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    Ok,
    Error,
    Denied,
}

impl AuditStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Denied => "denied",
        }
    }
}

/// A stored audit row.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AuditRecord {
    pub id: String,
    pub timestamp: String,
    pub direction: String,
    pub counterparty: String,
    pub body: String,
    pub status: String,
    pub detail: Option<String>,
}

/// Audit logger backed by SQLite.
#[derive(Clone)]
pub struct AuditLogger {
    pool: SqlitePool,
}

impl AuditLogger {
    /// Create a new audit logger sharing the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Write an entry to the audit log.
    pub async fn log(&self, entry: &AuditEntry) -> Result<(), IgsmsError> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            "INSERT INTO audit_log (id, direction, counterparty, body, status, detail) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(entry.direction.as_str())
        .bind(&entry.counterparty)
        .bind(&entry.body)
        .bind(entry.status.as_str())
        .bind(&entry.detail)
        .execute(&self.pool)
        .await
        .map_err(|e| IgsmsError::Store(format!("audit log write failed: {e}")))?;

        debug!(
            "audit: {} {} [{}] {}",
            entry.direction.as_str(),
            entry.counterparty,
            entry.status.as_str(),
            truncate(&entry.body, 80)
        );

        Ok(())
    }

    /// Most recent entries, newest first.
    pub async fn recent(&self, limit: i64) -> Result<Vec<AuditRecord>, IgsmsError> {
        sqlx::query_as::<_, AuditRecord>(
            "SELECT id, timestamp, direction, counterparty, body, status, detail \
             FROM audit_log ORDER BY timestamp DESC, rowid DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| IgsmsError::Store(format!("audit log read failed: {e}")))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
