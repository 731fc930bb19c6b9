// SPDX-FileCopyrightText: 2026 Gatehouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in tool catalog.
//!
//! Every tool the model may call is declared here: which capability server
//! hosts it, what it does, and the JSON Schema of its arguments. Tools on a
//! server that is not configured are simply not registered.

use serde_json::{Value, json};

/// Declaration of a single callable tool.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Tool name as the model addresses it.
    pub name: &'static str,
    /// Capability server hosting the tool.
    pub server: &'static str,
    pub description: &'static str,
    /// JSON Schema for the tool's arguments.
    pub parameters: Value,
}

impl ToolSpec {
    /// The provider-format tool definition sent with model requests.
    pub fn provider_definition(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "input_schema": self.parameters,
        })
    }
}

fn symbol_schema(extra: &str) -> Value {
    let mut properties = json!({
        "symbol": {
            "type": "string",
            "description": "Ticker symbol, e.g. RELIANCE or TCS"
        }
    });
    if extra == "period" {
        properties["period"] = json!({
            "type": "string",
            "description": "Lookback period: 1mo, 3mo, 6mo, 1y",
            "enum": ["1mo", "3mo", "6mo", "1y"]
        });
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": ["symbol"]
    })
}

/// The full catalog across the five capability servers.
pub fn builtin_catalog() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "get_stock_info",
            server: "financial-data",
            description: "Current price, market cap and key fundamentals for a stock.",
            parameters: symbol_schema(""),
        },
        ToolSpec {
            name: "get_historical_prices",
            server: "financial-data",
            description: "Daily OHLCV history for a stock over a period.",
            parameters: symbol_schema("period"),
        },
        ToolSpec {
            name: "get_financial_statements",
            server: "financial-data",
            description: "Income statement, balance sheet and cash flow summaries.",
            parameters: symbol_schema(""),
        },
        ToolSpec {
            name: "get_technical_indicators",
            server: "market-technical",
            description: "RSI, MACD, moving averages and other technical indicators.",
            parameters: symbol_schema("period"),
        },
        ToolSpec {
            name: "get_support_resistance",
            server: "market-technical",
            description: "Support and resistance levels derived from recent price action.",
            parameters: symbol_schema(""),
        },
        ToolSpec {
            name: "get_governance_data",
            server: "governance-compliance",
            description: "Shareholding pattern, board composition and governance flags.",
            parameters: symbol_schema(""),
        },
        ToolSpec {
            name: "get_regulatory_filings",
            server: "governance-compliance",
            description: "Recent regulatory filings and corporate announcements.",
            parameters: symbol_schema(""),
        },
        ToolSpec {
            name: "get_news_sentiment",
            server: "news-sentiment",
            description: "Recent news headlines with aggregated sentiment scores.",
            parameters: symbol_schema(""),
        },
        ToolSpec {
            name: "create_price_chart",
            server: "visualization",
            description: "Render a price chart image and return its URL.",
            parameters: symbol_schema("period"),
        },
        ToolSpec {
            name: "create_comparison_chart",
            server: "visualization",
            description: "Render a normalized comparison chart for several symbols.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "symbols": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Ticker symbols to compare"
                    },
                    "period": {
                        "type": "string",
                        "enum": ["1mo", "3mo", "6mo", "1y"]
                    }
                },
                "required": ["symbols"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_all_five_servers() {
        let catalog = builtin_catalog();
        let servers: std::collections::HashSet<_> =
            catalog.iter().map(|t| t.server).collect();
        for server in [
            "financial-data",
            "market-technical",
            "governance-compliance",
            "news-sentiment",
            "visualization",
        ] {
            assert!(servers.contains(server), "missing server {server}");
        }
    }

    #[test]
    fn provider_definition_shape() {
        let spec = &builtin_catalog()[0];
        let def = spec.provider_definition();
        assert_eq!(def["name"], "get_stock_info");
        assert_eq!(def["input_schema"]["type"], "object");
        assert!(def["description"].as_str().is_some());
    }

    #[test]
    fn tool_names_are_unique() {
        let catalog = builtin_catalog();
        let mut names: Vec<_> = catalog.iter().map(|t| t.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), catalog.len());
    }
}
