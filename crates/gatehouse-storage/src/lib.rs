// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the gatehouse session core.
//!
//! One database file holds window counters, chat counters, violation
//! records, the limit configuration document, and the message transcript.
//! All writes go through a single tokio-rusqlite connection; the commit
//! path for admission counters runs in one transaction so concurrent
//! admissions never observe a partially-incremented state.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::Database;
