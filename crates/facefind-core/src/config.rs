//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults, `config.toml`, `config.<env>.toml`
//! and `APP_*` env vars (`APP_POOL__SIZE=4` sets `pool.size`). Typed sections
//! carry serde defaults so an empty environment yields a working setup.
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::FaceError;
use crate::types::MatchPolicy;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.settings()?;
        Ok(config)
    }

    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view of every section, validated.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub pool: PoolConfig,
    pub insert: InsertConfig,
    pub matching: MatchingConfig,
    pub store: StoreConfig,
    pub detector: DetectorConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), FaceError> {
        if self.pool.size == 0 {
            return Err(FaceError::InvalidConfig("pool.size must be at least 1".to_string()));
        }
        if self.pool.search_timeout_ms == 0 {
            return Err(FaceError::InvalidConfig("pool.search_timeout_ms must be positive".to_string()));
        }
        for (key, t) in [
            ("matching.strict_threshold", self.matching.strict_threshold),
            ("matching.lenient_threshold", self.matching.lenient_threshold),
        ] {
            if !(0.0..=1.0).contains(&t) {
                return Err(FaceError::InvalidConfig(format!("{key} must be within [0, 1], got {t}")));
            }
        }
        if self.detector.dim == 0 {
            return Err(FaceError::InvalidConfig("detector.dim must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub size: usize,
    pub search_timeout_ms: u64,
    pub insert_timeout_ms: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self { size: 3, search_timeout_ms: 5_000, insert_timeout_ms: 5_000 }
    }
}

impl PoolConfig {
    pub fn search_timeout(&self) -> Duration { Duration::from_millis(self.search_timeout_ms) }

    pub fn insert_timeout(&self) -> Duration { Duration::from_millis(self.insert_timeout_ms) }
}

/// Whether an insert returns once broadcast, or once every worker applied it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsertMode {
    #[default]
    Eventual,
    Acknowledged,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InsertConfig {
    pub mode: InsertMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    #[default]
    Cosine,
    Euclidean,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub metric: MetricKind,
    pub strict_threshold: f32,
    pub lenient_threshold: f32,
    /// Scale applied to the L2 distance by the euclidean metric.
    pub euclidean_multiplier: f32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self { metric: MetricKind::Cosine, strict_threshold: 0.55, lenient_threshold: 0.40, euclidean_multiplier: 50.0 }
    }
}

impl MatchingConfig {
    pub fn threshold(&self, policy: MatchPolicy) -> f32 {
        match policy {
            MatchPolicy::Strict => self.strict_threshold,
            MatchPolicy::Lenient => self.lenient_threshold,
            MatchPolicy::Custom(t) => t,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self { Self { path: "result.json".to_string() } }
}

impl StoreConfig {
    pub fn resolved_path(&self, base: &Path) -> PathBuf { resolve_with_base(base, &self.path) }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub dim: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self { Self { dim: 1024 } }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
