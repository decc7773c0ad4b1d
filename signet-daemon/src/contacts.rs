//! Per-user contact lists.

use sqlx::SqlitePool;

use crate::db::Database;
use crate::directory::{DirectoryError, UserRecord};
use crate::unix_now;

pub struct ContactStore {
    pool: SqlitePool,
}

impl ContactStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Add `contact` to `owner`'s list. Returns `false` if it was already there.
    pub async fn add(&self, owner: &UserRecord, contact: &UserRecord) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO contacts (user_id, contact_id, added_at) VALUES (?, ?, ?)",
        )
        .bind(owner.id)
        .bind(contact.id)
        .bind(unix_now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// `owner`'s contacts, alphabetical.
    pub async fn list(&self, owner: &UserRecord) -> Result<Vec<UserRecord>, DirectoryError> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.username, u.public_key, u.created_at
            FROM contacts c
            JOIN users u ON u.id = c.contact_id
            WHERE c.user_id = ?
            ORDER BY u.username
            "#,
        )
        .bind(owner.id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(UserRecord::from_row).collect()
    }
}
