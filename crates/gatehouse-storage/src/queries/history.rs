// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message transcript operations.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use gatehouse_core::types::{ChatTurn, MessageMetadata, Role};
use gatehouse_core::GatehouseError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{from_ts, to_ts};

/// Insert one transcript message. Assistant messages carry their
/// aggregated metadata as JSON.
#[allow(clippy::too_many_arguments)]
pub async fn insert_message(
    db: &Database,
    message_id: &str,
    user: &str,
    chat: &str,
    role: Role,
    content: &str,
    metadata: Option<&MessageMetadata>,
    created_at: DateTime<Utc>,
) -> Result<(), GatehouseError> {
    let metadata_json = metadata
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| GatehouseError::Store {
            source: Box::new(e),
        })?;
    let message_id = message_id.to_string();
    let user = user.to_string();
    let chat = chat.to_string();
    let content = content.to_string();
    let created_s = to_ts(created_at);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO messages (id, user_id, chat_id, role, content, metadata, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    message_id,
                    user,
                    chat,
                    role.to_string(),
                    content,
                    metadata_json,
                    created_s,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// The most recent `limit` turns of one chat, returned oldest-first so
/// they can feed a model context directly.
pub async fn load_history(
    db: &Database,
    chat: &str,
    limit: u32,
) -> Result<Vec<ChatTurn>, GatehouseError> {
    let chat = chat.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT role, content FROM (
                     SELECT role, content, created_at FROM messages
                     WHERE chat_id = ?1 ORDER BY created_at DESC LIMIT ?2
                 ) ORDER BY created_at ASC",
            )?;
            let rows = stmt.query_map(params![chat, limit], |row| {
                let role_str: String = row.get(0)?;
                let role = Role::from_str(&role_str).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(ChatTurn {
                    role,
                    content: row.get(1)?,
                })
            })?;
            let mut turns = Vec::new();
            for row in rows {
                turns.push(row?);
            }
            Ok(turns)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn history_is_oldest_first_and_capped() {
        let (db, _dir) = setup_db().await;
        let t0 = Utc::now();
        for i in 0..4 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            insert_message(
                &db,
                &format!("m{i}"),
                "u1",
                "c1",
                role,
                &format!("turn {i}"),
                None,
                t0 + chrono::Duration::seconds(i),
            )
            .await
            .unwrap();
        }

        let turns = load_history(&db, "c1", 3).await.unwrap();
        assert_eq!(turns.len(), 3);
        // The oldest of the retained turns comes first.
        assert_eq!(turns[0].content, "turn 1");
        assert_eq!(turns[2].content, "turn 3");
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn metadata_persists_as_json() {
        let (db, _dir) = setup_db().await;
        let meta = MessageMetadata {
            tokens_used: 77,
            tools_used: vec!["create_price_chart".to_string()],
            processing_time_ms: 900,
            chart_url: Some("https://charts.example/abc.png".to_string()),
        };
        insert_message(
            &db,
            "m1",
            "u1",
            "c1",
            Role::Assistant,
            "done",
            Some(&meta),
            Utc::now(),
        )
        .await
        .unwrap();

        let turns = load_history(&db, "c1", 10).await.unwrap();
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].role, Role::Assistant);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn chats_are_isolated() {
        let (db, _dir) = setup_db().await;
        insert_message(&db, "m1", "u1", "c1", Role::User, "hi", None, Utc::now())
            .await
            .unwrap();
        let other = load_history(&db, "c2", 10).await.unwrap();
        assert!(other.is_empty());
        db.close().await.unwrap();
    }
}
