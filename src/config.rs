//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILGRAPH_CONFIG` (environment variable)
//! 2. `~/.config/mailgraph/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailgraph\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Graph connection settings can then be overridden with `NEO4J_URI`,
//! `NEO4J_DATABASE`, `NEO4J_USERNAME` and `NEO4J_PASSWORD`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Corpus walk settings.
    pub corpus: CorpusConfig,
    /// Graph database connection.
    pub graph: GraphConfig,
    /// Batch loader tuning.
    pub load: LoadConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
}

/// Corpus walk settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    /// Mailbox roots used when none are given on the command line.
    pub roots: Vec<PathBuf>,
    /// Stop the walk after this many messages.
    pub max_messages: Option<usize>,
    /// Directory receiving `users.json` and `messages.json`.
    pub output_dir: PathBuf,
}

/// Graph database connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Base HTTP URI of the Neo4j server.
    pub uri: String,
    pub database: String,
    pub username: String,
    pub password: Option<String>,
    /// Per-request timeout in seconds (0 = none).
    pub timeout_secs: u64,
}

/// Batch loader tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Rows per upsert round trip.
    pub batch_size: usize,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            log_level: "warn".to_string(),
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            max_messages: None,
            output_dir: PathBuf::from("user_data"),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:7474".to_string(),
            database: "neo4j".to_string(),
            username: "neo4j".to_string(),
            password: None,
            timeout_secs: 30,
        }
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

// ── Environment overrides ───────────────────────────────────────

impl Config {
    /// Apply `NEO4J_*` variables from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply graph overrides from `lookup`; empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if let Some(uri) = get("NEO4J_URI") {
            self.graph.uri = uri;
        }
        if let Some(database) = get("NEO4J_DATABASE") {
            self.graph.database = database;
        }
        if let Some(username) = get("NEO4J_USERNAME") {
            self.graph.username = username;
        }
        if let Some(password) = get("NEO4J_PASSWORD") {
            self.graph.password = Some(password);
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// A loaded configuration plus what happened while looking for its file.
///
/// Loading runs before logging is set up, so the outcome is kept here and
/// reported through [`LoadedConfig::log_outcome`] once a subscriber exists.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    /// File the settings came from, if one was read.
    pub path: Option<PathBuf>,
    /// Why the file at `path` was ignored, if it was.
    pub problem: Option<String>,
}

impl LoadedConfig {
    /// Emit the deferred "loaded" or "using defaults" event.
    pub fn log_outcome(&self) {
        let Some(path) = &self.path else {
            tracing::debug!("No config file, using defaults");
            return;
        };
        match &self.problem {
            Some(problem) => tracing::warn!(
                path = %path.display(),
                error = %problem,
                "Failed to load config, using defaults"
            ),
            None => tracing::info!(path = %path.display(), "Loaded config"),
        }
    }
}

/// Load configuration, searching standard locations, then apply environment
/// overrides.
///
/// Falls back to the default configuration if no file is found or on parse
/// error; the reason is kept in [`LoadedConfig::problem`].
pub fn load_config() -> LoadedConfig {
    let mut loaded = load_config_from(config_file_path());
    loaded.config.apply_env();
    loaded
}

/// Read the config file at `path` without environment overrides.
pub fn load_config_from(path: Option<PathBuf>) -> LoadedConfig {
    let Some(path) = path.filter(|p| p.exists()) else {
        return LoadedConfig {
            config: Config::default(),
            path: None,
            problem: None,
        };
    };
    let parsed = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read file: {e}"))
        .and_then(|contents| toml::from_str::<Config>(&contents).map_err(|e| e.to_string()));
    match parsed {
        Ok(config) => LoadedConfig {
            config,
            path: Some(path),
            problem: None,
        },
        Err(problem) => LoadedConfig {
            config: Config::default(),
            path: Some(path),
            problem: Some(problem),
        },
    }
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILGRAPH_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailgraph").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailgraph")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mailgraph.log")
}
