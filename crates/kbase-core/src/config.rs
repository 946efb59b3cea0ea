//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RETRIEVAL__TOP_K=10`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against the directory the configuration was loaded from.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::DocFrequency;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(Path::new("."), &env_name)
    }

    pub fn load_for_env(dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(Toml::file(dir.join("config.toml")));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file(dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment, base_dir: dir.to_path_buf() };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed view over every section; missing keys fall back to defaults.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self.figment.extract().map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn base_dir(&self) -> &Path { &self.base_dir }

    /// Resolve a configured path against the configuration directory.
    pub fn resolve_path<S: AsRef<str>>(&self, p: S) -> PathBuf {
        resolve_with_base(&self.base_dir, p)
    }

    fn validate(&self) -> anyhow::Result<()> {
        self.settings()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub index: IndexSettings,
    pub vectorizer: VectorizerSettings,
    pub reducer: ReducerSettings,
    pub retrieval: RetrievalSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.vectorizer.validate()?;
        if self.reducer.components == 0 {
            return Err(Error::InvalidConfig("reducer.components must be at least 1".into()));
        }
        if self.index.version.trim().is_empty() {
            return Err(Error::InvalidConfig("index.version must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub raw_txt_dir: String,
    pub extensions: Vec<String>,
    pub file_limit: Option<usize>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            raw_txt_dir: "./data/raw".to_string(),
            extensions: crate::data_processor::DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            file_limit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub snapshot_dir: String,
    pub version: String,
    /// Build and persist a snapshot from the corpus when none exists yet.
    pub build_on_miss: bool,
    pub load_timeout_secs: u64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            snapshot_dir: "./data/processed".to_string(),
            version: "v1".to_string(),
            build_on_miss: false,
            load_timeout_secs: 30,
        }
    }
}

/// Term weighting parameters. Terms are kept when
/// `min_df <= document frequency <= max_df`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorizerSettings {
    pub min_df: DocFrequency,
    pub max_df: DocFrequency,
    pub stop_words: bool,
    pub min_token_len: usize,
}

impl Default for VectorizerSettings {
    fn default() -> Self {
        Self {
            min_df: DocFrequency::Count(2),
            max_df: DocFrequency::Proportion(0.95),
            stop_words: true,
            min_token_len: 2,
        }
    }
}

impl VectorizerSettings {
    /// Keeps every term that occurs at least once. Useful for tiny corpora
    /// where the default thresholds would prune everything.
    pub fn permissive() -> Self {
        Self { min_df: DocFrequency::Count(1), max_df: DocFrequency::Proportion(1.0), ..Self::default() }
    }

    pub fn validate(&self) -> Result<()> {
        self.min_df.validate("min_df")?;
        self.max_df.validate("max_df")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReducerSettings {
    pub components: usize,
    pub oversamples: usize,
    pub power_iterations: usize,
    pub seed: u64,
}

impl Default for ReducerSettings {
    fn default() -> Self {
        Self { components: 100, oversamples: 10, power_iterations: 4, seed: 42 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub normalize: bool,
    pub drop_non_positive: bool,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { top_k: 5, normalize: false, drop_non_positive: false }
    }
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
