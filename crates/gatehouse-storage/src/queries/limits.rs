// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Limit configuration persistence. The whole config document is stored
//! as one JSON row and replaced atomically on save.

use chrono::Utc;
use gatehouse_core::types::StoredLimitConfig;
use gatehouse_core::GatehouseError;
use rusqlite::params;

use crate::database::Database;
use crate::models::to_ts;

/// Load the persisted limit config. `None` before the first save.
pub async fn load(db: &Database) -> Result<Option<StoredLimitConfig>, GatehouseError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare("SELECT config FROM limit_config WHERE id = 1")?;
            let result = stmt.query_row([], |row| row.get::<_, String>(0));
            match result {
                Ok(json) => Ok(Some(json)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)?
        .map(|json| {
            serde_json::from_str(&json).map_err(|e| GatehouseError::Store {
                source: Box::new(e),
            })
        })
        .transpose()
}

/// Replace the persisted limit config.
pub async fn save(db: &Database, config: &StoredLimitConfig) -> Result<(), GatehouseError> {
    let json = serde_json::to_string(config).map_err(|e| GatehouseError::Store {
        source: Box::new(e),
    })?;
    let now_s = to_ts(Utc::now());
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO limit_config (id, config, updated_at) VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET config = ?1, updated_at = ?2",
                params![json, now_s],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_core::types::{LimitOverride, LimitSet};
    use tempfile::tempdir;

    #[tokio::test]
    async fn save_and_load_roundtrips() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();

        assert!(load(&db).await.unwrap().is_none());

        let mut config = StoredLimitConfig {
            global: LimitSet {
                burst: 10,
                per_chat: 50,
                hourly: 150,
                daily: 1000,
            },
            overrides: Default::default(),
            whitelist: vec!["load-tester".to_string()],
            version: 1,
        };
        config.overrides.insert(
            "power-user".to_string(),
            LimitOverride {
                daily: Some(5000),
                ..Default::default()
            },
        );

        save(&db, &config).await.unwrap();
        let loaded = load(&db).await.unwrap().unwrap();
        assert_eq!(loaded, config);

        // Saving again replaces the single row.
        config.version = 2;
        save(&db, &config).await.unwrap();
        let loaded = load(&db).await.unwrap().unwrap();
        assert_eq!(loaded.version, 2);
        db.close().await.unwrap();
    }
}
