// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `gatehouse doctor` command implementation.
//!
//! Runs diagnostic checks against the environment: configuration, the
//! SQLite store, Anthropic API reachability, and each configured tool
//! server. With `--deep`, adds database integrity and memory checks.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use gatehouse_config::model::GatehouseConfig;
use gatehouse_core::GatehouseError;

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: String, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message,
            duration: start.elapsed(),
        }
    }
}

/// Run the `gatehouse doctor` command.
pub async fn run_doctor(
    config: &GatehouseConfig,
    deep: bool,
    plain: bool,
) -> Result<(), GatehouseError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let mut results = Vec::new();

    results.push(check_config().await);
    results.push(check_database(&config.store.database_path).await);
    results.push(check_provider_api(config).await);
    for (server, base_url) in sorted_servers(config) {
        results.push(check_tool_server(&server, &base_url).await);
    }

    if deep {
        results.push(check_db_integrity(&config.store.database_path).await);
        results.push(check_memory_baseline().await);
    }

    println!();
    println!("  gatehouse doctor");
    println!("  {}", "-".repeat(50));

    let mut fail_count = 0;
    let mut warn_count = 0;

    for result in &results {
        match result.status {
            CheckStatus::Warn => warn_count += 1,
            CheckStatus::Fail => fail_count += 1,
            CheckStatus::Pass => {}
        }
        println!("{}", render_line(result, use_color));
    }

    println!();

    if fail_count > 0 || warn_count > 0 {
        let issues = fail_count + warn_count;
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep for detailed diagnostics.");
        }
    } else {
        println!("  All checks passed.");
    }

    println!();

    Ok(())
}

fn render_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green().to_string(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow().to_string(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red().to_string(), result.message.red()),
        };
        format!("    {symbol} {:<20} {message} ({duration_ms}ms)", result.name)
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

fn sorted_servers(config: &GatehouseConfig) -> Vec<(String, String)> {
    let mut servers: Vec<(String, String)> = config
        .tools
        .servers
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    servers.sort();
    servers
}

/// Check configuration loads without errors.
async fn check_config() -> CheckResult {
    let start = Instant::now();
    match gatehouse_config::load_and_validate() {
        Ok(_) => CheckResult::new("Configuration", CheckStatus::Pass, "valid".into(), start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

/// Check the database file exists and answers a query.
async fn check_database(db_path: &str) -> CheckResult {
    let start = Instant::now();

    if !std::path::Path::new(db_path).exists() {
        return CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {db_path} (will be created on first run)"),
            start,
        );
    }

    match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => {
            let query_result: Result<(), tokio_rusqlite::Error> = conn
                .call(|conn| {
                    conn.execute_batch("SELECT 1")?;
                    Ok(())
                })
                .await;
            match query_result {
                Ok(()) => {
                    CheckResult::new("Database", CheckStatus::Pass, "connected".into(), start)
                }
                Err(e) => CheckResult::new(
                    "Database",
                    CheckStatus::Fail,
                    format!("query failed: {e}"),
                    start,
                ),
            }
        }
        Err(e) => CheckResult::new(
            "Database",
            CheckStatus::Fail,
            format!("open failed: {e}"),
            start,
        ),
    }
}

/// Check Anthropic API reachability via HEAD request.
async fn check_provider_api(config: &GatehouseConfig) -> CheckResult {
    let start = Instant::now();

    let has_api_key =
        config.provider.api_key.is_some() || std::env::var("ANTHROPIC_API_KEY").is_ok();
    if !has_api_key {
        return CheckResult::new(
            "Provider API",
            CheckStatus::Warn,
            "no API key configured".into(),
            start,
        );
    }

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            return CheckResult::new(
                "Provider API",
                CheckStatus::Fail,
                format!("HTTP client error: {e}"),
                start,
            );
        }
    };

    match client
        .head("https://api.anthropic.com/v1/messages")
        .send()
        .await
    {
        Ok(_) => CheckResult::new("Provider API", CheckStatus::Pass, "reachable".into(), start),
        Err(e) => {
            let msg = if e.is_timeout() {
                "timeout (5s)".to_string()
            } else if e.is_connect() {
                "connection refused".to_string()
            } else {
                format!("error: {e}")
            };
            CheckResult::new("Provider API", CheckStatus::Fail, msg, start)
        }
    }
}

/// Check one tool server answers its health endpoint.
async fn check_tool_server(server: &str, base_url: &str) -> CheckResult {
    let start = Instant::now();
    let name = format!("Tools: {server}");
    let url = format!("{}/health", base_url.trim_end_matches('/'));

    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
    {
        Ok(c) => c,
        Err(e) => {
            return CheckResult::new(
                &name,
                CheckStatus::Fail,
                format!("HTTP client error: {e}"),
                start,
            );
        }
    };

    match client.get(&url).send().await {
        Ok(resp) if resp.status().is_success() => {
            CheckResult::new(&name, CheckStatus::Pass, "reachable".into(), start)
        }
        Ok(resp) => CheckResult::new(
            &name,
            CheckStatus::Warn,
            format!("status {}", resp.status()),
            start,
        ),
        Err(_) => CheckResult::new(
            &name,
            CheckStatus::Warn,
            format!("not reachable at {url}"),
            start,
        ),
    }
}

/// Deep check: SQLite integrity check.
async fn check_db_integrity(db_path: &str) -> CheckResult {
    let start = Instant::now();

    if !std::path::Path::new(db_path).exists() {
        return CheckResult::new(
            "DB integrity",
            CheckStatus::Warn,
            "database not found (skipped)".into(),
            start,
        );
    }

    match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => {
            let result: Result<Vec<String>, tokio_rusqlite::Error> = conn
                .call(|conn| {
                    let mut stmt = conn.prepare("PRAGMA integrity_check")?;
                    let rows: Vec<String> = stmt
                        .query_map([], |row| row.get(0))?
                        .filter_map(|r| r.ok())
                        .collect();
                    Ok(rows)
                })
                .await;
            match result {
                Ok(rows) if rows.len() == 1 && rows[0] == "ok" => {
                    CheckResult::new("DB integrity", CheckStatus::Pass, "ok".into(), start)
                }
                Ok(rows) => CheckResult::new(
                    "DB integrity",
                    CheckStatus::Fail,
                    format!("{} issue(s) found", rows.len()),
                    start,
                ),
                Err(e) => CheckResult::new(
                    "DB integrity",
                    CheckStatus::Fail,
                    format!("check failed: {e}"),
                    start,
                ),
            }
        }
        Err(e) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("open failed: {e}"),
            start,
        ),
    }
}

/// Deep check: memory baseline via jemalloc.
async fn check_memory_baseline() -> CheckResult {
    let start = Instant::now();

    #[cfg(not(target_env = "msvc"))]
    {
        let _ = tikv_jemalloc_ctl::epoch::advance();
        let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
        let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
        let allocated_mb = allocated as f64 / (1024.0 * 1024.0);
        let resident_mb = resident as f64 / (1024.0 * 1024.0);

        CheckResult::new(
            "Memory baseline",
            CheckStatus::Pass,
            format!("heap: {allocated_mb:.1} MB, resident: {resident_mb:.1} MB"),
            start,
        )
    }

    #[cfg(target_env = "msvc")]
    {
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Warn,
            "jemalloc not available on MSVC".into(),
            start,
        )
    }
}
