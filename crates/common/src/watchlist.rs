use serde::{Deserialize, Serialize};

/// Top-level watchlist config file (TOML).
///
/// Example `config/watchlist.toml`:
/// ```toml
/// [[symbol]]
/// name = "CL"
/// description = "WTI Crude Oil"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatchlistConfig {
    #[serde(rename = "symbol")]
    pub symbols: Vec<SymbolConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SymbolConfig {
    /// Underlying root symbol, e.g. "CL".
    pub name: String,
    /// Human-readable label shown in logs and the dashboard.
    #[serde(default)]
    pub description: String,
}

impl WatchlistConfig {
    /// Load from a TOML file. Exits process on error.
    pub fn load(path: &str) -> Self {
        let content = std::fs::read_to_string(path)
            .unwrap_or_else(|e| panic!("Failed to read watchlist config at '{path}': {e}"));
        toml::from_str(&content)
            .unwrap_or_else(|e| panic!("Failed to parse watchlist config at '{path}': {e}"))
    }

    /// Deduplicated symbol names in file order.
    pub fn symbol_names(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.symbols
            .iter()
            .filter_map(|s| {
                if seen.insert(s.name.clone()) {
                    Some(s.name.clone())
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watchlist_parses_and_dedupes() {
        let toml = r#"
            [[symbol]]
            name = "CL"
            description = "WTI Crude Oil"

            [[symbol]]
            name = "NG"

            [[symbol]]
            name = "CL"
        "#;
        let cfg: WatchlistConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.symbols.len(), 3);
        assert_eq!(cfg.symbol_names(), vec!["CL".to_string(), "NG".to_string()]);
    }
}
