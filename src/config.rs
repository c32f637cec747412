use std::path::Path;

use serde::Deserialize;

use crate::error::{InstrumentError, Result};

/// Files above this size are skipped by detection and only pattern-matched by
/// the transformer.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Engine configuration. Every key is optional in the JSON form.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InstrumentConfig {
    /// Local name of the instrumentation function (`instrument`).
    pub import_name: String,
    /// Helpers that decorate a component and still yield a component.
    pub component_helpers: Vec<String>,
    /// Base classes marking class components.
    pub base_components: Vec<String>,
    /// Low-level element factories (`React.createElement(...)`).
    pub element_factories: Vec<String>,
    pub max_file_bytes: u64,
    pub max_depth: usize,
    /// Directory names never descended into.
    pub ignore_dirs: Vec<String>,
    pub extensions: Vec<String>,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            import_name: "instrument".to_string(),
            component_helpers: strings(&["memo", "forwardRef", "lazy"]),
            base_components: strings(&["Component", "PureComponent"]),
            element_factories: strings(&["createElement"]),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_depth: DEFAULT_MAX_DEPTH,
            ignore_dirs: strings(&[
                "node_modules",
                ".git",
                ".expo",
                ".next",
                "build",
                "dist",
                "coverage",
                "ios",
                "android",
                "__generated__",
            ]),
            extensions: strings(&["js", "jsx", "ts", "tsx"]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl InstrumentConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| InstrumentError::read(path, e))?;
        Self::from_json(&text).map_err(|source| InstrumentError::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn is_component_helper(&self, name: &str) -> bool {
        self.component_helpers.iter().any(|h| h == name)
    }

    pub fn is_base_component(&self, name: &str) -> bool {
        self.base_components.iter().any(|b| b == name)
    }

    pub fn is_element_factory(&self, name: &str) -> bool {
        self.element_factories.iter().any(|f| f == name)
    }

    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.ignore_dirs.iter().any(|d| d == name)
    }

    pub fn has_source_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| self.extensions.iter().any(|x| x == e))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = InstrumentConfig::from_json(r#"{ "importName": "withProfiler", "maxFileBytes": 10 }"#)
            .unwrap();
        assert_eq!(cfg.import_name, "withProfiler");
        assert_eq!(cfg.max_file_bytes, 10);
        assert!(cfg.is_component_helper("forwardRef"));
        assert!(cfg.is_ignored_dir("node_modules"));
    }

    #[test]
    fn extension_filter() {
        let cfg = InstrumentConfig::default();
        assert!(cfg.has_source_extension(Path::new("src/App.tsx")));
        assert!(!cfg.has_source_extension(Path::new("src/styles.css")));
        assert!(!cfg.has_source_extension(Path::new("Makefile")));
    }
}
