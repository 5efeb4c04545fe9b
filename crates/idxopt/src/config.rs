use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Settings read from an optional TOML file, e.g.
///
/// ```toml
/// slow_ms = 100
///
/// [index_options]
/// background = true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Passed verbatim as the options of every `createIndex` statement.
    pub index_options: Map<String, Value>,
    /// Entries faster than this are not offered to the optimizer. 0 keeps all.
    pub slow_ms: u64,
}

impl OptimizerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: OptimizerConfig = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_options_table() {
        let config: OptimizerConfig = toml::from_str(
            r#"
slow_ms = 100

[index_options]
background = true
name = "hot_path"
"#,
        )
        .unwrap();
        assert_eq!(config.slow_ms, 100);
        assert_eq!(
            Value::Object(config.index_options),
            json!({"background": true, "name": "hot_path"})
        );
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = OptimizerConfig::load(Path::new("/nonexistent/idxopt.toml")).unwrap();
        assert_eq!(config, OptimizerConfig::default());
    }
}
