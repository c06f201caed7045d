//! Key-value monitor state.

use super::Store;
use chrono::{DateTime, Utc};
use igsms_core::error::IgsmsError;
use serde::Serialize;

const LAST_SEEN_ID: &str = "last_seen_id";
const IS_RUNNING: &str = "is_running";
const LAST_LOGIN_TS: &str = "last_login_ts";

/// Everything the monitor persists, read in one go for status output.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StateSnapshot {
    pub last_seen_id: Option<String>,
    pub running: bool,
    pub last_login_ts: Option<String>,
}

impl Store {
    /// Read a raw state value.
    pub async fn get_state(&self, key: &str) -> Result<Option<String>, IgsmsError> {
        let row: Option<(Option<String>,)> =
            sqlx::query_as("SELECT value FROM app_state WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| IgsmsError::Store(format!("get {key} failed: {e}")))?;
        Ok(row.and_then(|(v,)| v))
    }

    /// Insert or replace a raw state value.
    pub async fn set_state(&self, key: &str, value: &str) -> Result<(), IgsmsError> {
        sqlx::query(
            "INSERT INTO app_state (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| IgsmsError::Store(format!("set {key} failed: {e}")))?;
        Ok(())
    }

    pub async fn get_last_seen_id(&self) -> Result<Option<String>, IgsmsError> {
        self.get_state(LAST_SEEN_ID).await
    }

    pub async fn set_last_seen_id(&self, message_id: &str) -> Result<(), IgsmsError> {
        self.set_state(LAST_SEEN_ID, message_id).await
    }

    /// Whether the monitor was asked to run. Survives restarts.
    pub async fn is_running(&self) -> Result<bool, IgsmsError> {
        Ok(self.get_state(IS_RUNNING).await?.as_deref() == Some("1"))
    }

    pub async fn set_running(&self, running: bool) -> Result<(), IgsmsError> {
        self.set_state(IS_RUNNING, if running { "1" } else { "0" })
            .await
    }

    pub async fn get_last_login_ts(&self) -> Result<Option<String>, IgsmsError> {
        self.get_state(LAST_LOGIN_TS).await
    }

    /// Record a successful login, stored as RFC 3339 UTC.
    pub async fn set_last_login_ts(&self, ts: DateTime<Utc>) -> Result<(), IgsmsError> {
        self.set_state(LAST_LOGIN_TS, &ts.to_rfc3339()).await
    }

    pub async fn snapshot(&self) -> Result<StateSnapshot, IgsmsError> {
        Ok(StateSnapshot {
            last_seen_id: self.get_last_seen_id().await?,
            running: self.is_running().await?,
            last_login_ts: self.get_last_login_ts().await?,
        })
    }
}
