use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Once, OnceLock};

use globset::{Glob, GlobSet, GlobSetBuilder};
use parking_lot::ReentrantMutex;
use thiserror::Error;
use tracing_subscriber::prelude::*;

mod diagnostics;
mod schema;

pub use diagnostics::ConfigDiagnostics;
pub use schema::json_schema;

/// File name looked up in the root of a conversion run.
pub const CONFIG_FILE_NAME: &str = "recordify.toml";

/// Overrides config discovery (absolute, or relative to the run root).
pub const RECORDIFY_CONFIG_ENV_VAR: &str = "RECORDIFY_CONFIG_PATH";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct RecordifyConfig {
    /// Which files a directory run visits.
    #[serde(default)]
    pub files: FilesConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Report and diff rendering.
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct FilesConfig {
    /// Glob patterns, relative to the run root, of files to convert.
    #[serde(default = "FilesConfig::default_include")]
    pub include: Vec<String>,

    /// Glob patterns of files to skip even when included.
    #[serde(default = "FilesConfig::default_exclude")]
    pub exclude: Vec<String>,

    /// Follow symbolic links while walking directories.
    #[serde(default)]
    pub follow_links: bool,
}

impl FilesConfig {
    fn default_include() -> Vec<String> {
        vec!["**/*.java".to_owned()]
    }

    fn default_exclude() -> Vec<String> {
        vec![
            "**/target/**".to_owned(),
            "**/build/**".to_owned(),
            "**/.git/**".to_owned(),
        ]
    }

    pub fn matcher(&self) -> Result<FileMatcher, ConfigError> {
        Ok(FileMatcher {
            include: build_glob_set(&self.include)?,
            exclude: build_glob_set(&self.exclude)?,
        })
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            include: Self::default_include(),
            exclude: Self::default_exclude(),
            follow_links: false,
        }
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|err| ConfigError::Glob {
            pattern: pattern.clone(),
            message: err.kind().to_string(),
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|err| ConfigError::Glob {
        pattern: patterns.join(", "),
        message: err.kind().to_string(),
    })
}

/// Compiled form of [`FilesConfig`].
#[derive(Debug, Clone)]
pub struct FileMatcher {
    include: GlobSet,
    exclude: GlobSet,
}

impl FileMatcher {
    /// `path` is relative to the run root.
    pub fn is_match(&self, path: &Path) -> bool {
        self.include.is_match(path) && !self.exclude.is_match(path)
    }

    /// Whether a directory walk can skip everything below `dir`.
    pub fn is_excluded_dir(&self, dir: &Path) -> bool {
        self.exclude.is_match(dir.join("_"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct LoggingConfig {
    /// A level (`info`, `debug`, ...) or a full `EnvFilter` directive string.
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,

    /// Emit logs as JSON lines.
    #[serde(default)]
    pub json: bool,

    /// Write logs to stderr. Disabled, logging is off entirely.
    #[serde(default = "LoggingConfig::default_stderr")]
    pub stderr: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "warn".to_owned()
    }

    fn default_stderr() -> bool {
        true
    }

    pub(crate) fn normalize_level_directives(input: &str) -> String {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default_level();
        }

        match trimmed.to_ascii_lowercase().as_str() {
            "trace" => "trace".to_owned(),
            "debug" => "debug".to_owned(),
            "info" => "info".to_owned(),
            "warn" | "warning" => "warn".to_owned(),
            "error" => "error".to_owned(),
            "off" | "none" => "off".to_owned(),
            _ => trimmed.to_owned(),
        }
    }

    fn config_env_filter(&self) -> tracing_subscriber::EnvFilter {
        let directives = Self::normalize_level_directives(&self.level);
        tracing_subscriber::EnvFilter::try_new(directives).unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::default()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into())
        })
    }

    /// The effective filter. `RUST_LOG`, when set, is merged after the
    /// configured level.
    pub fn env_filter(&self) -> tracing_subscriber::EnvFilter {
        let env_directives = std::env::var("RUST_LOG")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let config_directives = Self::normalize_level_directives(&self.level);

        match env_directives {
            Some(env_directives) => {
                let combined = format!("{config_directives},{env_directives}");
                tracing_subscriber::EnvFilter::try_new(combined)
                    .or_else(|_| tracing_subscriber::EnvFilter::try_new(env_directives))
                    .unwrap_or_else(|_| self.config_env_filter())
            }
            None => self.config_env_filter(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
            stderr: Self::default_stderr(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct OutputConfig {
    /// Unchanged lines shown around each hunk of a dry-run diff.
    #[serde(default = "OutputConfig::default_diff_context")]
    pub diff_context: usize,
}

impl OutputConfig {
    fn default_diff_context() -> usize {
        3
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            diff_context: Self::default_diff_context(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse toml config: {0}")]
    Toml(String),
    #[error("invalid glob `{pattern}`: {message}")]
    Glob { pattern: String, message: String },
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        // The default `Display` includes a source snippet; keep only the message.
        ConfigError::Toml(err.message().to_owned())
    }
}

impl RecordifyConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(Self::load_from_path_with_diagnostics(path)?.0)
    }

    /// Load a config file and report keys the schema does not know.
    pub fn load_from_path_with_diagnostics(
        path: impl AsRef<Path>,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str_with_diagnostics(&text)
    }

    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        Ok(Self::load_from_str_with_diagnostics(text)?.0)
    }

    pub fn load_from_str_with_diagnostics(
        text: &str,
    ) -> Result<(Self, ConfigDiagnostics), ConfigError> {
        let (config, unknown_keys) =
            diagnostics::deserialize_toml_with_unknown_keys::<RecordifyConfig>(text)?;
        // Surface bad globs at load time rather than mid-walk.
        config.files.matcher()?;

        let mut diagnostics = ConfigDiagnostics {
            unknown_keys,
            ..ConfigDiagnostics::default()
        };
        let normalized = LoggingConfig::normalize_level_directives(&config.logging.level);
        if tracing_subscriber::EnvFilter::try_new(&normalized).is_err() {
            diagnostics.warnings.push(format!(
                "logging.level `{}` is not a valid filter; falling back to `warn`",
                config.logging.level
            ));
        }
        Ok((config, diagnostics))
    }
}

static CONFIG_ENV_LOCK: OnceLock<ReentrantMutex<()>> = OnceLock::new();

fn config_env_lock() -> &'static ReentrantMutex<()> {
    CONFIG_ENV_LOCK.get_or_init(|| ReentrantMutex::new(()))
}

/// Run `f` while holding the lock that guards [`RECORDIFY_CONFIG_ENV_VAR`].
///
/// Environment variables are process-global; tests that set the override
/// must serialize with discovery running on other threads.
pub fn with_config_env_lock<R>(f: impl FnOnce() -> R) -> R {
    let _guard = config_env_lock().lock();
    f()
}

/// Find the config for a run rooted at `root`.
///
/// Search order:
/// 1) `RECORDIFY_CONFIG_PATH` (absolute or relative to `root`)
/// 2) `recordify.toml` in `root`
/// 3) `.recordify.toml` in `root`
pub fn discover_config_path(root: &Path) -> Option<PathBuf> {
    let _guard = config_env_lock().lock();
    if let Some(value) = std::env::var_os(RECORDIFY_CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(value);
        let path = if candidate.is_absolute() {
            candidate
        } else {
            root.join(candidate)
        };
        return Some(path);
    }

    [CONFIG_FILE_NAME, ".recordify.toml"]
        .into_iter()
        .map(|name| root.join(name))
        .find(|path| path.is_file())
}

/// Load the config for `root`, or the defaults when there is none.
pub fn load_for_root(root: &Path) -> Result<(RecordifyConfig, Option<PathBuf>), ConfigError> {
    let Some(path) = discover_config_path(root) else {
        return Ok((RecordifyConfig::default(), None));
    };
    let config = RecordifyConfig::load_from_path(&path)?;
    Ok((config, Some(path)))
}

static TRACING_INIT: Once = Once::new();

/// Install the global subscriber. Only the first call has any effect.
pub fn init_tracing(config: &LoggingConfig) {
    TRACING_INIT.call_once(|| {
        if !config.stderr {
            return;
        }
        let filter = config.env_filter();

        let layer: Box<dyn tracing_subscriber::Layer<_> + Send + Sync> = if config.json {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
                .boxed()
        };

        let subscriber = tracing_subscriber::registry().with(filter).with(layer);
        if tracing::subscriber::set_global_default(subscriber).is_ok() {
            tracing::debug!(
                target: "recordify.config",
                level = %config.level,
                json = config.json,
                "tracing initialized"
            );
        }
    });
}
