// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Violation record operations.

use std::str::FromStr;

use gatehouse_core::types::{ChatId, LimitScope, UserId, Violation};
use gatehouse_core::GatehouseError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{from_ts, to_ts};

/// Insert one violation record.
pub async fn insert(db: &Database, violation: &Violation) -> Result<(), GatehouseError> {
    let v = violation.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO violations
                     (user_id, chat_id, scope, limit_value, prompts_used, decided_action,
                      user_message, ip_address, user_agent, occurred_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    v.user_id.0,
                    v.chat_id.as_ref().map(|c| c.0.clone()),
                    v.scope.to_string(),
                    v.limit_value,
                    v.prompts_used,
                    v.decided_action,
                    v.user_message,
                    v.ip_address,
                    v.user_agent,
                    to_ts(v.occurred_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// List violations, most recent first, optionally filtered by user and scope.
pub async fn list(
    db: &Database,
    user: Option<&UserId>,
    scope: Option<LimitScope>,
    limit: u32,
    offset: u32,
) -> Result<Vec<Violation>, GatehouseError> {
    let user = user.map(|u| u.0.clone());
    let scope = scope.map(|s| s.to_string());
    db.connection()
        .call(move |conn| {
            let mut sql = String::from(
                "SELECT user_id, chat_id, scope, limit_value, prompts_used, decided_action,
                        user_message, ip_address, user_agent, occurred_at
                 FROM violations WHERE 1=1",
            );
            let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
            if let Some(u) = &user {
                sql.push_str(" AND user_id = ?");
                args.push(Box::new(u.clone()));
            }
            if let Some(s) = &scope {
                sql.push_str(" AND scope = ?");
                args.push(Box::new(s.clone()));
            }
            sql.push_str(" ORDER BY occurred_at DESC LIMIT ? OFFSET ?");
            args.push(Box::new(limit));
            args.push(Box::new(offset));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                rusqlite::params_from_iter(args.iter().map(|a| a.as_ref())),
                |row| {
                    let scope_str: String = row.get(2)?;
                    let scope = LimitScope::from_str(&scope_str).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            2,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                    Ok(Violation {
                        user_id: UserId(row.get(0)?),
                        chat_id: row.get::<_, Option<String>>(1)?.map(ChatId),
                        scope,
                        limit_value: row.get(3)?,
                        prompts_used: row.get(4)?,
                        decided_action: row.get(5)?,
                        user_message: row.get(6)?,
                        ip_address: row.get(7)?,
                        user_agent: row.get(8)?,
                        occurred_at: from_ts(&row.get::<_, String>(9)?, 9)?,
                    })
                },
            )?;
            let mut violations = Vec::new();
            for row in rows {
                violations.push(row?);
            }
            Ok(violations)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        (db, dir)
    }

    fn make_violation(user: &str, scope: LimitScope) -> Violation {
        Violation {
            user_id: UserId(user.to_string()),
            chat_id: Some(ChatId("c1".to_string())),
            scope,
            limit_value: 10,
            prompts_used: 10,
            decided_action: "blocked".to_string(),
            user_message: Some("what is the price of X?".to_string()),
            ip_address: None,
            user_agent: None,
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_and_list_roundtrips() {
        let (db, _dir) = setup_db().await;
        insert(&db, &make_violation("u1", LimitScope::Burst)).await.unwrap();
        insert(&db, &make_violation("u1", LimitScope::Daily)).await.unwrap();
        insert(&db, &make_violation("u2", LimitScope::Burst)).await.unwrap();

        let all = list(&db, None, None, 50, 0).await.unwrap();
        assert_eq!(all.len(), 3);

        let u1 = list(&db, Some(&UserId("u1".into())), None, 50, 0).await.unwrap();
        assert_eq!(u1.len(), 2);

        let bursts = list(&db, None, Some(LimitScope::Burst), 50, 0).await.unwrap();
        assert_eq!(bursts.len(), 2);
        assert!(bursts.iter().all(|v| v.scope == LimitScope::Burst));
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn pagination_applies() {
        let (db, _dir) = setup_db().await;
        for _ in 0..5 {
            insert(&db, &make_violation("u1", LimitScope::Hourly)).await.unwrap();
        }
        let page = list(&db, None, None, 2, 2).await.unwrap();
        assert_eq!(page.len(), 2);
        db.close().await.unwrap();
    }
}
