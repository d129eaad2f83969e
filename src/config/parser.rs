//! Configuration parser for loading configuration files.
//!
//! This module handles loading configuration from YAML files, the `.env`
//! file next to it, and environment variable overrides.

use crate::error::{ConfigError, Result, StackfabError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::spec::StackfabConfig;

/// Environment variable overriding the template bucket.
pub const ENV_TEMPLATES_BUCKET: &str = "STACKFAB_TEMPLATES_BUCKET";

/// Environment variable overriding the template prefix.
pub const ENV_TEMPLATES_PREFIX: &str = "STACKFAB_TEMPLATES_PREFIX";

/// Configuration parser.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Base path, if set.
    #[must_use]
    pub fn base_path(&self) -> Option<&Path> {
        self.base_path.as_deref()
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<StackfabConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(StackfabError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            StackfabError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<StackfabConfig> {
        debug!("Parsing YAML configuration");

        let config: StackfabConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            StackfabError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed configuration with {} stacks", config.stacks.len());
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<StackfabConfig> {
        let mut config = self.load_file(path)?;
        Self::apply_env_overrides(&mut config, |name| std::env::var(name).ok());
        Ok(config)
    }

    /// Applies environment overrides read through `lookup`.
    ///
    /// Template location comes from `STACKFAB_TEMPLATES_*`; the AWS selection
    /// from the standard `AWS_*` variables.
    pub fn apply_env_overrides(
        config: &mut StackfabConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) {
        let lookup = |name: &str| lookup(name).filter(|v| !v.is_empty());

        if let Some(bucket) = lookup(ENV_TEMPLATES_BUCKET) {
            debug!("Overriding templates.bucket from environment");
            config.templates.bucket = bucket;
        }

        if let Some(prefix) = lookup(ENV_TEMPLATES_PREFIX) {
            debug!("Overriding templates.prefix from environment");
            config.templates.prefix = prefix;
        }

        if let Some(profile) = lookup("AWS_PROFILE") {
            debug!("Overriding aws.profile from environment");
            config.aws.profile = Some(profile);
        }

        if let Some(region) = lookup("AWS_REGION").or_else(|| lookup("AWS_DEFAULT_REGION")) {
            debug!("Overriding aws.region from environment");
            config.aws.region = Some(region);
        }

        if let (Some(key_id), Some(secret)) =
            (lookup("AWS_ACCESS_KEY_ID"), lookup("AWS_SECRET_ACCESS_KEY"))
        {
            debug!("Using static credentials from environment");
            config.aws.access_key_id = Some(key_id);
            config.aws.secret_access_key = Some(secret);
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                StackfabError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["stackfab.yaml", "stackfab.yml"];

/// Finds the configuration file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(StackfabError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const FULL: &str = r#"
templates:
  bucket: my-templates
  prefix: "example/%(EnvName)s"
  local_dir: templates
defaults:
  capabilities: [CAPABILITY_IAM]
context:
  EnvName: dev
aws:
  profile: default
  region: ap-northeast-1
confirmation:
  message: "Execute task on production?"
  when:
    EnvName: production
stacks:
  - alias: foo
    stack_name: "stackfab-%(EnvName)s-foo"
    template: foo.yaml
  - alias: bar
    stack_name: "stackfab-%(EnvName)s-bar"
    template: subdir/bar.yaml
    args:
      tags: { example: EXAMPLE }
"#;

    #[test]
    fn test_parse_minimal_config() {
        let config = ConfigParser::new()
            .parse_yaml("templates:\n  bucket: b\n", None)
            .unwrap();
        assert_eq!(config.templates.bucket, "b");
        assert!(config.context.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let config = ConfigParser::new().parse_yaml(FULL, None).unwrap();

        assert_eq!(config.stacks.len(), 2);
        assert_eq!(config.stacks[1].template, "subdir/bar.yaml");
        assert_eq!(
            config.stacks[1]
                .args
                .tags
                .as_ref()
                .and_then(|t| t.get("example"))
                .map(String::as_str),
            Some("EXAMPLE")
        );
        assert_eq!(config.context.get("EnvName").map(String::as_str), Some("dev"));
        assert_eq!(config.aws.region.as_deref(), Some("ap-northeast-1"));
    }

    #[test]
    fn test_parse_error_carries_location() {
        let err = ConfigParser::new()
            .parse_yaml("templates: [", Some(Path::new("stackfab.yaml")))
            .unwrap_err();
        match err {
            StackfabError::Config(ConfigError::ParseError { location, .. }) => {
                assert_eq!(location.as_deref(), Some("stackfab.yaml"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ConfigParser::new().parse_yaml(FULL, None).unwrap();
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_TEMPLATES_BUCKET, "other-bucket"),
            ("AWS_DEFAULT_REGION", "eu-west-1"),
            ("AWS_PROFILE", ""),
            ("AWS_ACCESS_KEY_ID", "AKIDEXAMPLE"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
        ]);

        ConfigParser::apply_env_overrides(&mut config, |name| {
            env.get(name).map(|v| (*v).to_string())
        });

        assert_eq!(config.templates.bucket, "other-bucket");
        assert_eq!(config.templates.prefix, "example/%(EnvName)s");
        assert_eq!(config.aws.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.aws.profile.as_deref(), Some("default"));
        assert_eq!(config.aws.access_key_id.as_deref(), Some("AKIDEXAMPLE"));
    }

    #[test]
    fn test_find_config_file_searches_upward() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("stackfab.yml"), "templates: {bucket: b}\n").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("stackfab.yml"));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = ConfigParser::new()
            .load_file(dir.path().join("stackfab.yaml"))
            .unwrap_err();
        assert!(matches!(
            err,
            StackfabError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
