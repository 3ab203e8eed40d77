//! SQLite-backed usage entitlement ledger
//!
//! One row per token lineage. The only mutating path for consumption is a
//! single conditional UPDATE, so correctness rests on SQLite's row
//! atomicity rather than on read-then-write logic here. Free allowance is
//! always drawn before paid allowance.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, warn};

use super::types::{CreditKind, UsageEntitlement, UsageResult};

#[derive(Debug, Error)]
pub enum UsageStoreError {
    /// Consumption was attempted before the row was created
    #[error("no usage entitlement exists for token {0}")]
    EntitlementNotFound(String),
    #[error("no usage remaining for token {0}")]
    NoUsageRemaining(String),
    #[error("usage database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("failed to prepare usage database: {0}")]
    Setup(String),
}

/// Grants applied when a row is created lazily
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultGrants {
    pub free: u32,
    pub paid: u32,
}

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS usage_entitlements (
        token_id TEXT PRIMARY KEY NOT NULL,
        free_granted INTEGER NOT NULL DEFAULT 0 CHECK (free_granted >= 0),
        free_used INTEGER NOT NULL DEFAULT 0 CHECK (free_used >= 0),
        paid_granted INTEGER NOT NULL DEFAULT 0 CHECK (paid_granted >= 0),
        paid_used INTEGER NOT NULL DEFAULT 0 CHECK (paid_used >= 0),
        last_consumed TEXT,
        updated_at INTEGER NOT NULL,
        CHECK (free_used <= free_granted),
        CHECK (paid_used <= paid_granted)
    );
"#;

const ROW_COLUMNS: &str =
    "token_id, free_granted, free_used, paid_granted, paid_used, updated_at";

/// Durable per-token entitlement ledger
pub struct UsageStore {
    conn: Mutex<Connection>,
    defaults: DefaultGrants,
}

impl UsageStore {
    /// Create or open the ledger at `path`
    pub fn open(path: &Path, defaults: DefaultGrants) -> Result<Self, UsageStoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                UsageStoreError::Setup(format!("failed to create {}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path)?;
        // Concurrent readers while a writer holds the lock
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        Self::with_connection(conn, defaults)
    }

    pub fn open_in_memory(defaults: DefaultGrants) -> Result<Self, UsageStoreError> {
        Self::with_connection(Connection::open_in_memory()?, defaults)
    }

    fn with_connection(conn: Connection, defaults: DefaultGrants) -> Result<Self, UsageStoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            defaults,
        })
    }

    /// `~/.config/roomstage/usage.db`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("roomstage").join("usage.db"))
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned: PoisonError<MutexGuard<'_, Connection>>| {
                warn!("Usage database mutex was poisoned, recovering connection");
                poisoned.into_inner()
            })
    }

    /// Insert the row with default grants, or fetch it if it already exists
    pub fn get_or_create_usage_entitlement(
        &self,
        token_id: &str,
    ) -> Result<UsageEntitlement, UsageStoreError> {
        let conn = self.lock();
        Self::insert_or_fetch(&conn, token_id, self.defaults)
    }

    fn insert_or_fetch(
        conn: &Connection,
        token_id: &str,
        defaults: DefaultGrants,
    ) -> Result<UsageEntitlement, UsageStoreError> {
        let inserted = conn.execute(
            "INSERT INTO usage_entitlements (token_id, free_granted, paid_granted, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(token_id) DO NOTHING",
            params![token_id, defaults.free, defaults.paid, Utc::now().timestamp()],
        )?;
        if inserted > 0 {
            debug!(token_id, free = defaults.free, paid = defaults.paid, "Created usage entitlement");
        }

        Self::fetch(conn, token_id)?
            .ok_or_else(|| UsageStoreError::EntitlementNotFound(token_id.to_string()))
    }

    fn fetch(conn: &Connection, token_id: &str) -> Result<Option<UsageEntitlement>, UsageStoreError> {
        let row = conn
            .query_row(
                &format!("SELECT {ROW_COLUMNS} FROM usage_entitlements WHERE token_id = ?1"),
                params![token_id],
                map_entitlement,
            )
            .optional()?;
        Ok(row)
    }

    /// Read a row without creating it
    pub fn get_usage_entitlement(
        &self,
        token_id: &str,
    ) -> Result<Option<UsageEntitlement>, UsageStoreError> {
        let conn = self.lock();
        Self::fetch(&conn, token_id)
    }

    /// Consume exactly one use, free before paid, in a single statement
    pub fn consume_one_entitlement(&self, token_id: &str) -> Result<UsageResult, UsageStoreError> {
        let conn = self.lock();

        // Every right-hand side reads the pre-update row
        let consumed = conn
            .query_row(
                &format!(
                    "UPDATE usage_entitlements SET
                        free_used = CASE WHEN free_used < free_granted
                            THEN free_used + 1 ELSE free_used END,
                        paid_used = CASE WHEN free_used >= free_granted AND paid_used < paid_granted
                            THEN paid_used + 1 ELSE paid_used END,
                        last_consumed = CASE WHEN free_used < free_granted
                            THEN 'free' ELSE 'paid' END,
                        updated_at = ?2
                     WHERE token_id = ?1
                       AND (free_used < free_granted
                            OR (free_used >= free_granted AND paid_used < paid_granted))
                     RETURNING {ROW_COLUMNS}, last_consumed"
                ),
                params![token_id, Utc::now().timestamp()],
                |row| {
                    let entitlement = map_entitlement(row)?;
                    let kind: String = row.get(6)?;
                    Ok((entitlement, kind))
                },
            )
            .optional()?;

        match consumed {
            Some((entitlement, kind)) => {
                let consumed = CreditKind::parse(&kind).unwrap_or(CreditKind::Paid);
                debug!(
                    token_id,
                    kind = consumed.as_str(),
                    remaining = entitlement.total_remaining(),
                    "Consumed usage entitlement"
                );
                Ok(UsageResult {
                    consumed,
                    entitlement,
                })
            }
            None => {
                // Zero rows: distinguish a missing row from an exhausted one
                if Self::fetch(&conn, token_id)?.is_some() {
                    Err(UsageStoreError::NoUsageRemaining(token_id.to_string()))
                } else {
                    Err(UsageStoreError::EntitlementNotFound(token_id.to_string()))
                }
            }
        }
    }

    /// Return one use of `kind` taken by `consume_one_entitlement`
    ///
    /// `None` when the row is missing or has nothing of that kind to return.
    pub fn release_one_entitlement(
        &self,
        token_id: &str,
        kind: CreditKind,
    ) -> Result<Option<UsageEntitlement>, UsageStoreError> {
        let column = match kind {
            CreditKind::Free => "free_used",
            CreditKind::Paid => "paid_used",
        };
        let conn = self.lock();
        let released = conn
            .query_row(
                &format!(
                    "UPDATE usage_entitlements
                     SET {column} = {column} - 1, updated_at = ?2
                     WHERE token_id = ?1 AND {column} > 0
                     RETURNING {ROW_COLUMNS}"
                ),
                params![token_id, Utc::now().timestamp()],
                map_entitlement,
            )
            .optional()?;

        if released.is_some() {
            debug!(token_id, kind = kind.as_str(), "Released usage entitlement");
        }
        Ok(released)
    }

    /// Add paid credits; existing counts are never reduced
    pub fn grant_paid_credits(
        &self,
        token_id: &str,
        credits: u32,
    ) -> Result<UsageEntitlement, UsageStoreError> {
        let conn = self.lock();
        Self::insert_or_fetch(&conn, token_id, self.defaults)?;

        let entitlement = conn.query_row(
            &format!(
                "UPDATE usage_entitlements
                 SET paid_granted = paid_granted + ?2, updated_at = ?3
                 WHERE token_id = ?1
                 RETURNING {ROW_COLUMNS}"
            ),
            params![token_id, credits, Utc::now().timestamp()],
            map_entitlement,
        )?;

        debug!(token_id, credits, paid_granted = entitlement.paid_granted, "Granted paid credits");
        Ok(entitlement)
    }
}

fn map_entitlement(row: &Row<'_>) -> rusqlite::Result<UsageEntitlement> {
    Ok(UsageEntitlement {
        token_id: row.get(0)?,
        free_granted: row.get(1)?,
        free_used: row.get(2)?,
        paid_granted: row.get(3)?,
        paid_used: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
