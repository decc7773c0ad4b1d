//! Registered users and their public keys.
//!
//! SQLite is the source of truth. An in-memory snapshot (swapped atomically
//! with `ArcSwap`) serves the synchronous lookups the login and integrity
//! paths need, without touching the database per request.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use signet_auth::{Directory, Fingerprint, KeyRegistry, PublicKey};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::db::Database;
use crate::unix_now;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 64;

/// Errors from directory and contact operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("invalid username")]
    InvalidUsername,
    #[error("username already registered")]
    UsernameTaken,
    #[error("public key already registered")]
    KeyTaken,
    #[error("user not found")]
    NotFound,
    #[error("stored public key for {username} is corrupt")]
    CorruptKey { username: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub public_key: PublicKey,
    #[serde(skip)]
    pub created_at: i64,
}

impl UserRecord {
    pub(crate) fn from_row(row: &SqliteRow) -> Result<Self, DirectoryError> {
        let username: String = row.get("username");
        let public_key: String = row.get("public_key");
        let public_key = PublicKey::from_hex(&public_key)
            .map_err(|_| DirectoryError::CorruptKey {
                username: username.clone(),
            })?;
        Ok(Self {
            id: row.get("id"),
            username,
            public_key,
            created_at: row.get("created_at"),
        })
    }
}

/// Check the username rules: 3 to 64 characters from `[A-Za-z0-9_.-]`.
pub fn validate_username(username: &str) -> Result<(), DirectoryError> {
    let len = username.chars().count();
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-');
    if !(MIN_USERNAME_LEN..=MAX_USERNAME_LEN).contains(&len) || !username.chars().all(allowed) {
        return Err(DirectoryError::InvalidUsername);
    }
    Ok(())
}

#[derive(Default, Clone)]
struct Snapshot {
    keys: HashMap<String, PublicKey>,
    owners: HashMap<Fingerprint, String>,
}

impl Snapshot {
    fn insert(&mut self, username: &str, key: &PublicKey) {
        self.keys.insert(username.to_owned(), key.clone());
        self.owners.insert(key.fingerprint(), username.to_owned());
    }
}

/// SQLite-backed user directory with a lock-free read cache.
pub struct UserDirectory {
    pool: SqlitePool,
    cache: ArcSwap<Snapshot>,
}

impl UserDirectory {
    /// Wrap the database and prime the cache.
    pub async fn new(db: &Database) -> Result<Self, DirectoryError> {
        let directory = Self {
            pool: db.pool().clone(),
            cache: ArcSwap::from_pointee(Snapshot::default()),
        };
        directory.refresh_cache().await?;
        Ok(directory)
    }

    /// Rebuild the cache from the database and swap it in.
    pub async fn refresh_cache(&self) -> Result<(), DirectoryError> {
        let mut snapshot = Snapshot::default();
        for user in self.list().await? {
            snapshot.insert(&user.username, &user.public_key);
        }
        self.cache.store(Arc::new(snapshot));
        Ok(())
    }

    /// Number of cached users.
    pub fn len(&self) -> usize {
        self.cache.load().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Register a new user.
    ///
    /// Usernames and keys are both unique: a key identifies exactly one
    /// sender at the integrity gate.
    pub async fn register(
        &self,
        username: &str,
        public_key: &PublicKey,
    ) -> Result<UserRecord, DirectoryError> {
        validate_username(username)?;

        {
            let cache = self.cache.load();
            if cache.keys.contains_key(username) {
                return Err(DirectoryError::UsernameTaken);
            }
            if cache.owners.contains_key(&public_key.fingerprint()) {
                return Err(DirectoryError::KeyTaken);
            }
        }

        let now = unix_now();
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, public_key, key_fingerprint, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(username)
        .bind(public_key.to_hex())
        .bind(public_key.fingerprint().as_str())
        .bind(now)
        .execute(&self.pool)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                return Err(if err.message().contains("username") {
                    DirectoryError::UsernameTaken
                } else {
                    DirectoryError::KeyTaken
                });
            }
            Err(err) => return Err(err.into()),
        };

        self.cache.rcu(|old| {
            let mut next = (**old).clone();
            next.insert(username, public_key);
            Arc::new(next)
        });
        tracing::debug!(username = %username, key = %public_key.fingerprint(), "User cached");

        Ok(UserRecord {
            id,
            username: username.to_owned(),
            public_key: public_key.clone(),
            created_at: now,
        })
    }

    /// Fetch one user by exact username.
    pub async fn find(&self, username: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let row = sqlx::query(
            "SELECT id, username, public_key, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(UserRecord::from_row).transpose()
    }

    /// Like [`find`](Self::find) but a missing user is an error.
    pub async fn require(&self, username: &str) -> Result<UserRecord, DirectoryError> {
        self.find(username).await?.ok_or(DirectoryError::NotFound)
    }

    /// Users whose name contains `query` (case-sensitive substring),
    /// excluding `exclude`. An empty query matches nobody.
    pub async fn search(
        &self,
        query: &str,
        exclude: &str,
        limit: i64,
    ) -> Result<Vec<UserRecord>, DirectoryError> {
        if query.is_empty() {
            return Ok(Vec::new());
        }
        // instr() instead of LIKE so '%' and '_' in the query are literal.
        let rows = sqlx::query(
            r#"
            SELECT id, username, public_key, created_at FROM users
            WHERE instr(username, ?) > 0 AND username != ?
            ORDER BY username
            LIMIT ?
            "#,
        )
        .bind(query)
        .bind(exclude)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(UserRecord::from_row).collect()
    }

    /// Every registered user, oldest first.
    pub async fn list(&self) -> Result<Vec<UserRecord>, DirectoryError> {
        let rows = sqlx::query("SELECT id, username, public_key, created_at FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(UserRecord::from_row).collect()
    }
}

impl Directory for UserDirectory {
    fn lookup_public_key(&self, username: &str) -> Option<PublicKey> {
        self.cache.load().keys.get(username).cloned()
    }
}

impl KeyRegistry for UserDirectory {
    fn owner_of(&self, key: &PublicKey) -> Option<String> {
        self.cache.load().owners.get(&key.fingerprint()).cloned()
    }
}
