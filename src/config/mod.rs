//! Configuration module for stackfab.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `stackfab.yaml`
//! - Environment overrides and `.env` loading
//! - Validation of configuration values

mod parser;
mod spec;
mod validator;

pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_TEMPLATES_BUCKET, ENV_TEMPLATES_PREFIX,
    find_config_file,
};
pub use spec::{AwsConfig, ConfirmationConfig, StackfabConfig};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
