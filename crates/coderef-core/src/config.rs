//! Configuration for analysis, querying, traversal and storage.
//!
//! Load order: `.coderef/config.toml` → environment variables → defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level coderef configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoderefConfig {
    pub analysis: AnalysisConfig,
    pub query: QueryConfig,
    pub traversal: TraversalConfig,
    pub storage: StorageConfig,
    pub export: ExportConfig,
}

/// Graph construction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Resolve a bare reference to the first element with that short name
    /// when no exact or same-file id matches.
    pub resolve_by_name: bool,
}

/// Query executor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// How long a cached query response stays valid.
    pub cache_expiry_ms: u64,
    /// Hard cap on cached responses.
    pub max_cache_entries: usize,
    /// Depth bound for all-paths when the request does not set one.
    pub default_max_depth: usize,
    /// Maximum number of paths all-paths returns.
    pub max_paths: usize,
}

/// Multi-hop traversal settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    pub max_depth: usize,
    /// Hard cap on emitted results per traversal.
    pub max_results: usize,
    pub max_cache_entries: usize,
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Compress graph.json with zstd before writing.
    /// Decompression on load is automatic (detected by magic bytes).
    pub compress: bool,
}

/// Export configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Attach node positions, colors and layout hints to exported graphs.
    pub include_visualization: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            resolve_by_name: true,
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            cache_expiry_ms: 300_000,
            max_cache_entries: 1000,
            default_max_depth: 5,
            max_paths: 100,
        }
    }
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            max_results: 100,
            max_cache_entries: 1000,
        }
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

impl CoderefConfig {
    /// Load config from `.coderef/config.toml` in the project root, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(".coderef").join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };

        env_override("CODEREF_CACHE_EXPIRY_MS", &mut config.query.cache_expiry_ms);
        env_override("CODEREF_MAX_PATHS", &mut config.query.max_paths);
        env_override("CODEREF_MAX_DEPTH", &mut config.traversal.max_depth);
        env_override("CODEREF_MAX_RESULTS", &mut config.traversal.max_results);
        env_override("CODEREF_COMPRESS", &mut config.storage.compress);

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.traversal.max_depth == 0 {
            anyhow::bail!("traversal.max_depth must be at least 1");
        }
        if self.traversal.max_results == 0 {
            anyhow::bail!("traversal.max_results must be at least 1");
        }
        if self.query.default_max_depth == 0 {
            anyhow::bail!("query.default_max_depth must be at least 1");
        }
        Ok(())
    }
}
