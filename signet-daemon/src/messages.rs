//! Append-only message log.
//!
//! Every row carries the integrity material it arrived with (payload digest,
//! signature and sender key) so a recipient can re-verify it offline.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::db::Database;

/// A message about to be stored.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_username: String,
    pub receiver_username: String,
    pub encrypted_message: String,
    pub message_hash: String,
    pub signature_r: String,
    pub signature_s: String,
    pub sender_public_key: String,
}

/// A stored message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub id: i64,
    pub sender_username: String,
    pub receiver_username: String,
    pub encrypted_message: String,
    pub message_hash: String,
    pub signature_r: String,
    pub signature_s: String,
    pub sender_public_key: String,
    /// RFC 3339, UTC.
    pub timestamp: String,
}

impl MessageRecord {
    fn from_row(row: &SqliteRow) -> Self {
        Self {
            id: row.get("id"),
            sender_username: row.get("sender_username"),
            receiver_username: row.get("receiver_username"),
            encrypted_message: row.get("encrypted_message"),
            message_hash: row.get("message_hash"),
            signature_r: row.get("signature_r"),
            signature_s: row.get("signature_s"),
            sender_public_key: row.get("sender_public_key"),
            timestamp: row.get("timestamp"),
        }
    }
}

pub struct MessageStore {
    pool: SqlitePool,
}

impl MessageStore {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Store a message, stamped with the current time. Returns its id.
    pub async fn append(&self, message: &NewMessage) -> Result<MessageRecord, sqlx::Error> {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let result = sqlx::query(
            r#"
            INSERT INTO messages (
                sender_username, receiver_username, encrypted_message, message_hash,
                signature_r, signature_s, sender_public_key, timestamp
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.sender_username)
        .bind(&message.receiver_username)
        .bind(&message.encrypted_message)
        .bind(&message.message_hash)
        .bind(&message.signature_r)
        .bind(&message.signature_s)
        .bind(&message.sender_public_key)
        .bind(&timestamp)
        .execute(&self.pool)
        .await?;

        Ok(MessageRecord {
            id: result.last_insert_rowid(),
            sender_username: message.sender_username.clone(),
            receiver_username: message.receiver_username.clone(),
            encrypted_message: message.encrypted_message.clone(),
            message_hash: message.message_hash.clone(),
            signature_r: message.signature_r.clone(),
            signature_s: message.signature_s.clone(),
            sender_public_key: message.sender_public_key.clone(),
            timestamp,
        })
    }

    /// All messages exchanged between `a` and `b`, in arrival order.
    pub async fn conversation(&self, a: &str, b: &str) -> Result<Vec<MessageRecord>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM messages
            WHERE (sender_username = ?1 AND receiver_username = ?2)
               OR (sender_username = ?2 AND receiver_username = ?1)
            ORDER BY id ASC
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(MessageRecord::from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(from: &str, to: &str, body: &str) -> NewMessage {
        NewMessage {
            sender_username: from.to_owned(),
            receiver_username: to.to_owned(),
            encrypted_message: body.to_owned(),
            message_hash: "00".repeat(32),
            signature_r: "01".repeat(32),
            signature_s: "02".repeat(32),
            sender_public_key: "03".repeat(33),
        }
    }

    async fn store() -> MessageStore {
        MessageStore::new(&Database::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_append_assigns_increasing_ids() {
        let store = store().await;
        let first = store.append(&message("alice", "bob", "one")).await.unwrap();
        let second = store.append(&message("bob", "alice", "two")).await.unwrap();

        assert!(second.id > first.id);
        assert!(first.timestamp.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_conversation_is_ordered_and_symmetric() {
        let store = store().await;
        store.append(&message("alice", "bob", "one")).await.unwrap();
        store.append(&message("bob", "alice", "two")).await.unwrap();
        store.append(&message("alice", "carol", "other")).await.unwrap();
        store.append(&message("alice", "bob", "three")).await.unwrap();

        let from_alice = store.conversation("alice", "bob").await.unwrap();
        let from_bob = store.conversation("bob", "alice").await.unwrap();

        let bodies: Vec<&str> = from_alice
            .iter()
            .map(|m| m.encrypted_message.as_str())
            .collect();
        assert_eq!(bodies, vec!["one", "two", "three"]);
        assert_eq!(from_alice, from_bob);
    }

    #[tokio::test]
    async fn test_stored_fields_roundtrip() {
        let store = store().await;
        let stored = store.append(&message("alice", "bob", "x")).await.unwrap();
        let loaded = store.conversation("alice", "bob").await.unwrap();

        assert_eq!(loaded, vec![stored]);
    }

    #[tokio::test]
    async fn test_serializes_camel_case() {
        let store = store().await;
        let stored = store.append(&message("alice", "bob", "x")).await.unwrap();
        let json = serde_json::to_value(&stored).unwrap();

        assert_eq!(json["senderUsername"], "alice");
        assert_eq!(json["encryptedMessage"], "x");
        assert!(json.get("signatureR").is_some());
    }
}
