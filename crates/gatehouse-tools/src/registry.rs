// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Registry of the tools actually available at runtime.
//!
//! Built once at startup from the built-in catalog filtered by the
//! configured servers. Lookup by name is the only mutation-free read path
//! the orchestrator needs.

use std::collections::HashMap;

use gatehouse_config::model::ToolsConfig;
use serde_json::Value;
use tracing::info;

use crate::catalog::{ToolSpec, builtin_catalog};

pub struct ToolRegistry {
    tools: HashMap<&'static str, ToolSpec>,
}

impl ToolRegistry {
    /// Register every catalog tool whose server has a configured base URL.
    pub fn from_config(config: &ToolsConfig) -> Self {
        let mut tools = HashMap::new();
        for spec in builtin_catalog() {
            if config.servers.contains_key(spec.server) {
                tools.insert(spec.name, spec);
            }
        }
        info!(tool_count = tools.len(), "tool registry built");
        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Provider-format definitions for every registered tool, sorted by
    /// name so the model request is deterministic.
    pub fn provider_definitions(&self) -> Vec<Value> {
        let mut specs: Vec<_> = self.tools.values().collect();
        specs.sort_by_key(|s| s.name);
        specs.iter().map(|s| s.provider_definition()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_registers_full_catalog() {
        let registry = ToolRegistry::from_config(&ToolsConfig::default());
        assert_eq!(registry.len(), builtin_catalog().len());
        assert!(registry.get("get_stock_info").is_some());
        assert!(registry.get("no_such_tool").is_none());
    }

    #[test]
    fn unconfigured_server_drops_its_tools() {
        let mut config = ToolsConfig::default();
        config.servers.remove("visualization");
        let registry = ToolRegistry::from_config(&config);
        assert!(registry.get("create_price_chart").is_none());
        assert!(registry.get("get_stock_info").is_some());
    }

    #[test]
    fn provider_definitions_are_sorted() {
        let registry = ToolRegistry::from_config(&ToolsConfig::default());
        let defs = registry.provider_definitions();
        let names: Vec<_> = defs
            .iter()
            .filter_map(|d| d["name"].as_str().map(str::to_string))
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
