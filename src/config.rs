//! Configuration file support for storyloom
//!
//! Reads from .storyloom/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration structure
#[derive(Debug, Deserialize, Serialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Graph editor viewport and load-time grid
    #[serde(default)]
    pub graph: GraphConfig,

    /// Placement of nodes created from the editor
    #[serde(default)]
    pub placement: PlacementConfig,

    /// Export/import limits
    #[serde(default)]
    pub transfer: TransferConfig,
}

/// Viewport bounds and the grid used when loading storylets into the editor
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GraphConfig {
    /// Smallest allowed zoom factor
    pub min_scale: f64,
    /// Largest allowed zoom factor
    pub max_scale: f64,
    /// Nodes per row before the load grid wraps
    pub grid_columns: usize,
    pub column_spacing: f64,
    pub row_spacing: f64,
    pub origin_x: f64,
    pub origin_y: f64,
    /// Node box size used for hit testing and edge anchors
    pub node_width: f64,
    pub node_height: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            min_scale: 0.1,
            max_scale: 5.0,
            grid_columns: 4,
            column_spacing: 300.0,
            row_spacing: 200.0,
            origin_x: 100.0,
            origin_y: 100.0,
            node_width: 200.0,
            node_height: 80.0,
        }
    }
}

impl GraphConfig {
    /// Scale bounds that `f64::clamp` accepts and a non-empty grid
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.min_scale.is_finite() && self.min_scale > 0.0) {
            self.min_scale = defaults.min_scale;
        }
        if !(self.max_scale.is_finite() && self.max_scale >= self.min_scale) {
            self.max_scale = defaults.max_scale.max(self.min_scale);
        }
        if self.grid_columns == 0 {
            self.grid_columns = 1;
        }
        for (value, fallback) in [
            (&mut self.column_spacing, defaults.column_spacing),
            (&mut self.row_spacing, defaults.row_spacing),
            (&mut self.origin_x, defaults.origin_x),
            (&mut self.origin_y, defaults.origin_y),
            (&mut self.node_width, defaults.node_width),
            (&mut self.node_height, defaults.node_height),
        ] {
            if !value.is_finite() {
                *value = fallback;
            }
        }
        self
    }
}

/// Greedy non-overlap placement for new nodes
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PlacementConfig {
    /// Offset from the anchor node to the first candidate position
    pub offset_x: f64,
    pub offset_y: f64,
    /// A candidate collides with any node closer than this box
    pub clearance_width: f64,
    pub clearance_height: f64,
    /// Nudge increments
    pub step_x: f64,
    pub step_y: f64,
    /// Candidates past this x wrap back to the starting column
    pub wrap_x: f64,
    /// Give up after this many candidates
    pub max_attempts: usize,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            offset_x: 300.0,
            offset_y: 50.0,
            clearance_width: 220.0,
            clearance_height: 100.0,
            step_x: 50.0,
            step_y: 50.0,
            wrap_x: 1200.0,
            max_attempts: 2000,
        }
    }
}

impl PlacementConfig {
    /// Finite offsets and strictly positive steps, so the search always moves
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.step_x.is_finite() && self.step_x > 0.0) {
            self.step_x = defaults.step_x;
        }
        if !(self.step_y.is_finite() && self.step_y > 0.0) {
            self.step_y = defaults.step_y;
        }
        for (value, fallback) in [
            (&mut self.offset_x, defaults.offset_x),
            (&mut self.offset_y, defaults.offset_y),
            (&mut self.clearance_width, defaults.clearance_width),
            (&mut self.clearance_height, defaults.clearance_height),
            (&mut self.wrap_x, defaults.wrap_x),
        ] {
            if !value.is_finite() {
                *value = fallback;
            }
        }
        self
    }
}

/// Export/import limits
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TransferConfig {
    /// Largest import payload accepted, in bytes
    pub max_import_bytes: usize,
    /// Export + import operations allowed per window
    pub max_operations: usize,
    pub window_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            max_import_bytes: 10 * 1024 * 1024,
            max_operations: 5,
            window_secs: 60,
        }
    }
}

impl Config {
    /// Load config from .storyloom/config.toml
    /// Returns default config if file doesn't exist
    pub fn load() -> Self {
        if let Some(path) = Self::find_config_path() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(config) => return config.sanitized(),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable config");
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "could not read config");
                }
            }
        }
        Self::default()
    }

    /// Find config.toml by walking up directory tree
    fn find_config_path() -> Option<PathBuf> {
        let current_dir = std::env::current_dir().ok()?;
        let mut dir = current_dir.as_path();

        loop {
            let config_path = dir.join(".storyloom").join("config.toml");
            if config_path.exists() {
                return Some(config_path);
            }

            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
        None
    }

    /// Repair values that would make the editor unusable
    pub fn sanitized(mut self) -> Self {
        self.graph = self.graph.sanitized();
        self.placement = self.placement.sanitized();
        self
    }

    /// The TOML written by `storyloom init`
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.graph.min_scale, 0.1);
        assert_eq!(config.graph.max_scale, 5.0);
        assert_eq!(config.placement.clearance_width, 220.0);
        assert_eq!(config.placement.wrap_x, 1200.0);
    }

    #[test]
    fn test_parse_partial_config() {
        let toml = r#"
[graph]
max_scale = 3.0
grid_columns = 6
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.graph.max_scale, 3.0);
        assert_eq!(config.graph.grid_columns, 6);
        assert_eq!(config.graph.min_scale, 0.1);
        assert_eq!(config.transfer, TransferConfig::default());
    }

    #[test]
    fn test_sanitize_repairs_inverted_scale_bounds() {
        let mut config = Config::default();
        config.graph.min_scale = 2.0;
        config.graph.max_scale = 1.0;
        config.graph.grid_columns = 0;

        let config = config.sanitized();
        assert_eq!(config.graph.min_scale, 2.0);
        assert_eq!(config.graph.max_scale, 5.0);
        assert_eq!(config.graph.grid_columns, 1);
    }

    #[test]
    fn test_default_toml_parses_back() {
        let parsed: Config = toml::from_str(&Config::default_toml()).unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn test_sanitize_rejects_nan() {
        let mut config = Config::default();
        config.graph.max_scale = f64::NAN;
        config.graph.row_spacing = f64::INFINITY;
        config.placement.step_x = f64::NAN;
        config.placement.step_y = -5.0;
        config.placement.wrap_x = f64::NAN;

        let config = config.sanitized();
        assert_eq!(config.graph.max_scale, 5.0);
        assert_eq!(config.graph.row_spacing, 200.0);
        assert_eq!(config.placement.step_x, 50.0);
        assert_eq!(config.placement.step_y, 50.0);
        assert_eq!(config.placement.wrap_x, 1200.0);
    }
}
