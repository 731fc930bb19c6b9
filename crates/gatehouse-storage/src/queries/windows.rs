// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Window and chat counter operations.
//!
//! The commit statement performs the lazy window reset: an expired window
//! restarts at count 1 with its start set to the admission timestamp, a
//! live window increments. All four counters move in one transaction.

use chrono::{DateTime, Utc};
use gatehouse_core::types::WindowCounters;
use gatehouse_core::GatehouseError;
use rusqlite::params;

use crate::database::Database;
use crate::models::{from_ts, to_ts};

/// Load a user's window counters, inserting a zeroed row at `now` when the
/// user has never been seen.
pub async fn load(
    db: &Database,
    user: &str,
    now: DateTime<Utc>,
) -> Result<WindowCounters, GatehouseError> {
    let user = user.to_string();
    let now_s = to_ts(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO window_counters
                     (user_id, minute_count, minute_start, hour_count, hour_start, day_count, day_start)
                 VALUES (?1, 0, ?2, 0, ?2, 0, ?2)
                 ON CONFLICT(user_id) DO NOTHING",
                params![user, now_s],
            )?;
            let mut stmt = conn.prepare(
                "SELECT minute_count, minute_start, hour_count, hour_start, day_count, day_start
                 FROM window_counters WHERE user_id = ?1",
            )?;
            let counters = stmt.query_row(params![user], |row| {
                Ok(WindowCounters {
                    minute_count: row.get(0)?,
                    minute_start: from_ts(&row.get::<_, String>(1)?, 1)?,
                    hour_count: row.get(2)?,
                    hour_start: from_ts(&row.get::<_, String>(3)?, 3)?,
                    day_count: row.get(4)?,
                    day_start: from_ts(&row.get::<_, String>(5)?, 5)?,
                })
            })?;
            Ok(counters)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Lifetime prompt count for one chat. Missing rows count as zero.
pub async fn chat_count(db: &Database, user: &str, chat: &str) -> Result<u32, GatehouseError> {
    let user = user.to_string();
    let chat = chat.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT prompt_count FROM chat_counters WHERE user_id = ?1 AND chat_id = ?2",
            )?;
            let result = stmt.query_row(params![user, chat], |row| row.get::<_, u32>(0));
            match result {
                Ok(count) => Ok(count),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Commit one admitted prompt: minute/hour/day windows reset-or-increment
/// and the chat counter increments, all in one transaction.
pub async fn commit(
    db: &Database,
    user: &str,
    chat: &str,
    now: DateTime<Utc>,
) -> Result<(), GatehouseError> {
    let user = user.to_string();
    let chat = chat.to_string();
    let now_s = to_ts(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO window_counters
                     (user_id, minute_count, minute_start, hour_count, hour_start, day_count, day_start)
                 VALUES (?1, 0, ?2, 0, ?2, 0, ?2)
                 ON CONFLICT(user_id) DO NOTHING",
                params![user, now_s],
            )?;
            // Expired windows restart at 1, live ones increment. The
            // comparisons mirror the read-side effective_count exactly.
            tx.execute(
                "UPDATE window_counters SET
                     minute_count = CASE WHEN strftime('%s', ?2) - strftime('%s', minute_start) >= 60
                                         THEN 1 ELSE minute_count + 1 END,
                     minute_start = CASE WHEN strftime('%s', ?2) - strftime('%s', minute_start) >= 60
                                         THEN ?2 ELSE minute_start END,
                     hour_count   = CASE WHEN strftime('%s', ?2) - strftime('%s', hour_start) >= 3600
                                         THEN 1 ELSE hour_count + 1 END,
                     hour_start   = CASE WHEN strftime('%s', ?2) - strftime('%s', hour_start) >= 3600
                                         THEN ?2 ELSE hour_start END,
                     day_count    = CASE WHEN strftime('%s', ?2) - strftime('%s', day_start) >= 86400
                                         THEN 1 ELSE day_count + 1 END,
                     day_start    = CASE WHEN strftime('%s', ?2) - strftime('%s', day_start) >= 86400
                                         THEN ?2 ELSE day_start END
                 WHERE user_id = ?1",
                params![user, now_s],
            )?;
            tx.execute(
                "INSERT INTO chat_counters (user_id, chat_id, prompt_count)
                 VALUES (?1, ?2, 1)
                 ON CONFLICT(user_id, chat_id) DO UPDATE SET prompt_count = prompt_count + 1",
                params![user, chat],
            )?;
            tx.commit()?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Administrative reset of a user's window counters. Chat counters are
/// lifetime counts and are left alone.
pub async fn reset(db: &Database, user: &str, now: DateTime<Utc>) -> Result<(), GatehouseError> {
    let user = user.to_string();
    let now_s = to_ts(now);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE window_counters SET
                     minute_count = 0, minute_start = ?2,
                     hour_count = 0, hour_start = ?2,
                     day_count = 0, day_start = ?2
                 WHERE user_id = ?1",
                params![user, now_s],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}
