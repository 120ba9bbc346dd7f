use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use voxmap_cache::CacheConfig;
use voxmap_chunk::YBounds;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config toml: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("render.min_y must not exceed render.max_y")]
    EmptyVerticalRange,
}

/// Service configuration, deserialized from TOML. Every field has a default
/// so an empty file is a valid config.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct VoxmapConfig {
    pub render: RenderConfig,
    pub performance: PerformanceConfig,
    /// Per-world overrides; worlds absent from the table are enabled.
    pub worlds: HashMap<String, WorldEntry>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Vertical meshing range, absolute and inclusive.
    pub min_y: i32,
    pub max_y: i32,
    /// Refuse to mesh chunks the source reports as not resident.
    pub require_chunk_loaded: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            min_y: -64,
            max_y: 319,
            require_chunk_loaded: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Mesh worker threads; 0 means half the available cores.
    pub mesher_threads: usize,
    pub max_cached_chunk_meshes_per_world: usize,
    pub chunk_dirty_debounce_ms: u64,
    pub snapshot_timeout_ms: u64,
    pub build_timeout_ms: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            mesher_threads: 0,
            max_cached_chunk_meshes_per_world: 1024,
            chunk_dirty_debounce_ms: 500,
            snapshot_timeout_ms: 2_000,
            build_timeout_ms: 12_000,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct WorldEntry {
    pub enabled: bool,
    pub display_name: Option<String>,
    pub icon: Option<String>,
}

impl Default for WorldEntry {
    fn default() -> Self {
        Self {
            enabled: true,
            display_name: None,
            icon: None,
        }
    }
}

impl VoxmapConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let cfg: VoxmapConfig = toml::from_str(toml_str)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Field-level checks for configs assembled in code rather than parsed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.render.min_y > self.render.max_y {
            return Err(ConfigError::EmptyVerticalRange);
        }
        Ok(())
    }

    /// Worlds missing from the table default to enabled.
    pub fn is_world_enabled(&self, world: &str) -> bool {
        self.worlds.get(world).map(|w| w.enabled).unwrap_or(true)
    }

    pub fn vertical_bounds(&self) -> YBounds {
        YBounds::new(self.render.min_y, self.render.max_y)
    }

    pub fn cache_config(&self) -> CacheConfig {
        let defaults = CacheConfig::default();
        let workers = if self.performance.mesher_threads == 0 {
            defaults.workers
        } else {
            self.performance.mesher_threads
        };
        CacheConfig {
            workers,
            // Floor keeps a pathological config from thrashing the cache.
            capacity_per_world: self.performance.max_cached_chunk_meshes_per_world.max(128),
            snapshot_timeout: Duration::from_millis(self.performance.snapshot_timeout_ms),
            build_timeout: Duration::from_millis(self.performance.build_timeout_ms),
            debounce_window: Duration::from_millis(self.performance.chunk_dirty_debounce_ms),
            require_resident: self.render.require_chunk_loaded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = VoxmapConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.render.min_y, -64);
        assert!(cfg.is_world_enabled("anything"));
        let cache = cfg.cache_config();
        assert_eq!(cache.capacity_per_world, 1024);
        assert_eq!(cache.snapshot_timeout, Duration::from_secs(2));
        assert!(cache.workers >= 1);
    }

    #[test]
    fn disabled_world_and_capacity_floor() {
        let cfg = VoxmapConfig::from_toml_str(
            r#"
            [performance]
            max_cached_chunk_meshes_per_world = 4

            [worlds.creative]
            enabled = false
            display_name = "Creative"
        "#,
        )
        .unwrap();
        assert!(!cfg.is_world_enabled("creative"));
        assert!(cfg.is_world_enabled("overworld"));
        assert_eq!(cfg.cache_config().capacity_per_world, 128);
    }

    #[test]
    fn inverted_vertical_range_is_rejected() {
        let err = VoxmapConfig::from_toml_str(
            r#"
            [render]
            min_y = 10
            max_y = -10
        "#,
        );
        assert!(matches!(err, Err(ConfigError::EmptyVerticalRange)));
    }
}
