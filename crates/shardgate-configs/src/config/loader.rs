use super::defaults::default_primary_storage_id;
use super::types::GatewayConfig;
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;

const VALID_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

impl GatewayConfig {
    /// Load configuration from a TOML file
    ///
    /// Note: Environment overrides are applied separately via `apply_env_overrides()`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let mut config: GatewayConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;

        config.finalize()?;

        Ok(config)
    }

    /// Apply `SHARDGATE_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(level) = env::var("SHARDGATE_LOG_LEVEL") {
            self.logging.level = level;
        }

        if let Ok(value) = env::var("SHARDGATE_REMOTE_PAGE_SIZE") {
            self.remote.page_size = value.parse().map_err(|_| {
                anyhow::anyhow!("Invalid SHARDGATE_REMOTE_PAGE_SIZE value: {}", value)
            })?;
        }

        if let Ok(value) = env::var("SHARDGATE_REMOTE_MAX_CONCURRENCY") {
            self.remote.max_concurrency = value.parse().map_err(|_| {
                anyhow::anyhow!("Invalid SHARDGATE_REMOTE_MAX_CONCURRENCY value: {}", value)
            })?;
        }

        Ok(())
    }

    /// Normalize settings and validate configuration.
    ///
    /// Call this after applying environment overrides.
    pub fn finalize(&mut self) -> anyhow::Result<()> {
        self.logging.level = self.logging.level.trim().to_lowercase();
        for level in self.logging.targets.values_mut() {
            *level = level.trim().to_lowercase();
        }

        self.validate()?;

        Ok(())
    }

    /// Validate configuration settings
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storages.is_empty() {
            return Err(anyhow::anyhow!("At least one storage must be configured"));
        }

        let mut seen = HashSet::new();
        for storage in &self.storages {
            if storage.id == 0 {
                return Err(anyhow::anyhow!("Storage id cannot be 0"));
            }
            if !seen.insert(storage.id) {
                return Err(anyhow::anyhow!("Duplicate storage id {}", storage.id));
            }
        }

        let primary = default_primary_storage_id();
        if !seen.contains(&primary) {
            return Err(anyhow::anyhow!("Primary storage (id {}) is not configured", primary));
        }

        if self.remote.page_size == 0 {
            return Err(anyhow::anyhow!("remote.page_size cannot be 0"));
        }

        if self.remote.max_concurrency == 0 {
            return Err(anyhow::anyhow!("remote.max_concurrency cannot be 0"));
        }

        if !VALID_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(anyhow::anyhow!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                VALID_LEVELS.join(", ")
            ));
        }

        for (target, level) in &self.logging.targets {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(anyhow::anyhow!(
                    "Invalid log level '{}' for target '{}'. Must be one of: {}",
                    level,
                    target,
                    VALID_LEVELS.join(", ")
                ));
            }
        }

        Ok(())
    }
}
