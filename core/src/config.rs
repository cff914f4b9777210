//! Configuration
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. a TOML file (`playground.toml`, or the path given by `--config` /
//!    `PLAYGROUND_CONFIG_PATH`)
//! 3. `PLAYGROUND_*` environment variables, nested keys separated by `__`
//!    (`PLAYGROUND_COMPILER__LOCATOR`), after `.env` is loaded
//! 4. explicit builder overrides

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::compiler::loader::DEFAULT_LOCATOR;
use crate::compiler::{CompilerOptions, ScriptTarget};
use crate::sandbox::{SandboxLimits, DEFAULT_STACK_SIZE_MB};
use crate::script::interpreter::DEFAULT_MAX_CALL_DEPTH;

/// File looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "playground.toml";

const ENV_PREFIX: &str = "PLAYGROUND";
const CONFIG_PATH_ENV: &str = "PLAYGROUND_CONFIG_PATH";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub compiler: CompilerConfig,
    pub sandbox: SandboxConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Where the compiler capability is fetched from
    pub locator: String,
    pub target: ScriptTarget,
    pub strict: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        let options = CompilerOptions::default();
        Self {
            locator: DEFAULT_LOCATOR.to_string(),
            target: options.target,
            strict: options.strict,
        }
    }
}

impl CompilerConfig {
    pub fn options(&self) -> CompilerOptions {
        CompilerOptions {
            target: self.target,
            strict: self.strict,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    pub max_call_depth: usize,
    /// Stack of the evaluation thread, in MiB
    pub stack_size_mb: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            stack_size_mb: DEFAULT_STACK_SIZE_MB,
        }
    }
}

impl SandboxConfig {
    pub fn limits(&self) -> SandboxLimits {
        SandboxLimits {
            max_call_depth: self.max_call_depth,
            stack_size_mb: self.stack_size_mb,
        }
    }
}

impl Config {
    /// Load from the default file, `.env` and the environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// The effective configuration as a TOML document
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.compiler.locator.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "compiler.locator must not be empty".to_string(),
            ));
        }
        if self.sandbox.max_call_depth == 0 {
            return Err(ConfigError::Invalid(
                "sandbox.max_call_depth must be at least 1".to_string(),
            ));
        }
        if self.sandbox.stack_size_mb == 0 {
            return Err(ConfigError::Invalid(
                "sandbox.stack_size_mb must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Layered configuration loading with explicit overrides
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    locator: Option<String>,
    target: Option<ScriptTarget>,
    skip_env: bool,
}

impl ConfigBuilder {
    /// Read this file instead of the default lookup; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Override `compiler.locator`
    pub fn locator(mut self, locator: Option<String>) -> Self {
        self.locator = locator;
        self
    }

    /// Override `compiler.target`
    pub fn target(mut self, target: Option<ScriptTarget>) -> Self {
        self.target = target;
        self
    }

    /// Ignore `.env` and `PLAYGROUND_*` variables
    pub fn skip_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        if !self.skip_env {
            // a missing .env is fine
            let _ = dotenvy::dotenv();
        }

        let explicit = self.config_path.clone().or_else(|| {
            if self.skip_env {
                None
            } else {
                std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from)
            }
        });

        let mut builder = config::Config::builder();
        match &explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.clone()));
                }
                debug!(path = %path.display(), "Loading config file");
                builder = builder.add_source(file_source(path).required(true));
            }
            None => {
                builder = builder.add_source(file_source(Path::new(DEFAULT_CONFIG_FILE)).required(false));
            }
        }

        if !self.skip_env {
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        if let Some(locator) = self.locator {
            builder = builder.set_override("compiler.locator", locator)?;
        }
        if let Some(target) = self.target {
            builder = builder.set_override("compiler.target", target.to_string())?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

fn file_source(path: &Path) -> config::File<config::FileSourceFile, config::FileFormat> {
    config::File::from(path).format(config::FileFormat::Toml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("Should create temp file");
        file.write_all(contents.as_bytes()).expect("Should write config");
        file
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.compiler.locator, "bundled:snippet-script");
        assert_eq!(config.compiler.target, ScriptTarget::Es2015);
        assert!(config.compiler.strict);
        assert_eq!(config.sandbox.max_call_depth, 1000);
        assert_eq!(config.sandbox.stack_size_mb, 256);
    }

    #[test]
    fn test_file_values() {
        let file = write_config(
            r#"
[compiler]
locator = "bundled:snippet-script@0.1.0"
target = "esnext"
strict = false

[sandbox]
max_call_depth = 200
"#,
        );

        let config = Config::builder()
            .config_path(Some(file.path().to_path_buf()))
            .skip_env()
            .build()
            .expect("Should load");

        assert_eq!(config.compiler.locator, "bundled:snippet-script@0.1.0");
        assert_eq!(config.compiler.target, ScriptTarget::EsNext);
        assert!(!config.compiler.strict);
        assert_eq!(config.sandbox.max_call_depth, 200);
        assert_eq!(config.sandbox.stack_size_mb, 256);
    }

    #[test]
    fn test_overrides_beat_file() {
        let file = write_config("[compiler]\nlocator = \"bundled:from-file\"\n");

        let config = Config::builder()
            .config_path(Some(file.path().to_path_buf()))
            .locator(Some("bundled:from-flag".to_string()))
            .target(Some(ScriptTarget::Es2016))
            .skip_env()
            .build()
            .expect("Should load");

        assert_eq!(config.compiler.locator, "bundled:from-flag");
        assert_eq!(config.compiler.target, ScriptTarget::Es2016);
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = Config::builder()
            .config_path(Some(PathBuf::from("/nonexistent/playground.toml")))
            .skip_env()
            .build();
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_invalid_values() {
        let file = write_config("[sandbox]\nmax_call_depth = 0\n");
        let result = Config::builder()
            .config_path(Some(file.path().to_path_buf()))
            .skip_env()
            .build();
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let file = write_config("[compiler]\ntarget = \"es5\"\n");
        let result = Config::builder()
            .config_path(Some(file.path().to_path_buf()))
            .skip_env()
            .build();
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_to_toml_round_trips_through_file() {
        let mut config = Config::default();
        config.compiler.target = ScriptTarget::EsNext;
        let rendered = config.to_toml().expect("Should render");
        assert!(rendered.contains("target = \"esnext\""));

        let file = write_config(&rendered);
        let loaded = Config::builder()
            .config_path(Some(file.path().to_path_buf()))
            .skip_env()
            .build()
            .expect("Should load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_options_and_limits() {
        let config = Config::default();
        assert_eq!(config.compiler.options(), CompilerOptions::default());
        assert_eq!(config.sandbox.limits(), SandboxLimits::default());
    }
}
