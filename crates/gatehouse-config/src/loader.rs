// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./gatehouse.toml` > `~/.config/gatehouse/gatehouse.toml`
//! > `/etc/gatehouse/gatehouse.toml` with environment variable overrides via
//! `GATEHOUSE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::GatehouseConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/gatehouse/gatehouse.toml` (system-wide)
/// 3. `~/.config/gatehouse/gatehouse.toml` (user XDG config)
/// 4. `./gatehouse.toml` (local directory)
/// 5. `GATEHOUSE_*` environment variables
pub fn load_config() -> Result<GatehouseConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env vars).
///
/// Used for testing and explicit config specification.
pub fn load_config_from_str(toml_content: &str) -> Result<GatehouseConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GatehouseConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<GatehouseConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(GatehouseConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(GatehouseConfig::default()))
        .merge(Toml::file("/etc/gatehouse/gatehouse.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("gatehouse/gatehouse.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("gatehouse.toml"))
        .merge(env_provider())
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `GATEHOUSE_STORE_DATABASE_PATH` must map
/// to `store.database_path`, not `store.database.path`.
fn env_provider() -> Env {
    Env::prefixed("GATEHOUSE_").map(|key| {
        // `key` is the lowercased env var name with the prefix stripped.
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("server_", "server.", 1)
            .replacen("limits_", "limits.", 1)
            .replacen("store_", "store.", 1)
            .replacen("provider_", "provider.", 1)
            .replacen("tools_", "tools.", 1)
            .replacen("generation_", "generation.", 1);
        mapped.into()
    })
}
