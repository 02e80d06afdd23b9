/*!
 * Configuration types for bundle-relay
 *
 * A `RelayConfig` is built once at process entry (TOML file and/or
 * environment) and handed to the orchestrator by reference.
 */

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RelayError, Result};

/// Policy flag value that selects the Voltron (primary) route
pub const POLICY_VOLTRON_COPY: &str = "VOLTRON_COPY";

/// Policy flag value that selects the CAT2 (secondary) route
pub const POLICY_CAT2_COPY: &str = "CAT2_COPY";

/// Pattern file listing names that are never routed
pub const TRANSFER_EXCLUSION_FILE: &str = "file-pattern-ignore-transfer.json";

/// Pattern file listing names that are already encrypted
pub const ENCRYPTION_EXCLUSION_FILE: &str = "file-pattern-ignore-encryption.json";

/// Environment variable names
pub mod env {
    pub const POLICY_FLAG: &str = "TAG_BASED_ACTION";
    pub const CAT2_BUCKET: &str = "CAT_2_BUCKET";
    pub const VOLTRON_BUCKET: &str = "VOLTRON_BUCKET";
    pub const VOLTRON_PREFIX: &str = "VOLTRON_PREFIX";
    pub const PATTERN_DIR: &str = "PATTERN_CONFIG_DIR";
    pub const ENCRYPTION_KEY: &str = "BUNDLE_ENCRYPTION_KEY";
    pub const SOURCE_REGION: &str = "AWS_REGION";
    pub const SOURCE_ENDPOINT: &str = "S3_ENDPOINT";
    pub const CAT2_REGION: &str = "CAT2_REGION";
    pub const CAT2_ENDPOINT: &str = "CAT2_ENDPOINT";
}

/// Operator-supplied route selector.
///
/// Opaque: any value other than the two known ones simply selects no route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyFlag(String);

impl PolicyFlag {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the flag enables the Voltron route
    pub fn selects_primary(&self) -> bool {
        self.0 == POLICY_VOLTRON_COPY
    }

    /// True when the flag enables the CAT2 route
    pub fn selects_secondary(&self) -> bool {
        self.0 == POLICY_CAT2_COPY
    }
}

impl std::fmt::Display for PolicyFlag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Connection settings for one object store client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// AWS region (e.g., "us-east-1"); falls back to the default provider chain
    #[serde(default)]
    pub region: Option<String>,

    /// Custom endpoint URL (MinIO, LocalStack)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Path-style addressing
    #[serde(default)]
    pub force_path_style: bool,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            region: None,
            endpoint: None,
            force_path_style: false,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

/// Main configuration for a relay invocation
#[derive(Debug, Deserialize)]
pub struct RelayConfig {
    /// Route selector (`VOLTRON_COPY`, `CAT2_COPY`, anything else disables both)
    #[serde(default)]
    pub policy_flag: PolicyFlag,

    /// Destination bucket for the CAT2 route
    #[serde(default)]
    pub cat2_bucket: Option<String>,

    /// Destination bucket for the Voltron route
    #[serde(default)]
    pub voltron_bucket: Option<String>,

    /// Key prefix prepended to the file name on the Voltron route
    #[serde(default)]
    pub voltron_prefix: Option<String>,

    /// Directory holding the two JSON pattern files
    #[serde(default = "default_pattern_dir")]
    pub pattern_dir: PathBuf,

    /// Base64 AES-256 key for the CAT2 route; environment only
    #[serde(skip)]
    pub encryption_key: Option<SecretString>,

    /// Client settings for the source bucket (also used for Voltron writes)
    #[serde(default)]
    pub source_store: StoreConfig,

    /// Client settings for the CAT2 account
    #[serde(default)]
    pub cat2_store: StoreConfig,

    /// Log level for diagnostic output
    #[serde(default)]
    pub log_level: LogLevel,

    /// JSON log file path (None = compact lines on stderr)
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (shorthand for log_level = debug)
    #[serde(default)]
    pub verbose: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            policy_flag: PolicyFlag::default(),
            cat2_bucket: None,
            voltron_bucket: None,
            voltron_prefix: None,
            pattern_dir: default_pattern_dir(),
            encryption_key: None,
            source_store: StoreConfig::default(),
            cat2_store: StoreConfig::default(),
            log_level: LogLevel::default(),
            log_file: None,
            verbose: false,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

fn default_pattern_dir() -> PathBuf {
    PathBuf::from("file_configs")
}

fn default_timeout_seconds() -> u64 {
    300
}

impl RelayConfig {
    /// Build from process environment only
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file, then let the environment override it
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RelayError::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let mut config: RelayConfig = toml::from_str(&contents).map_err(|e| {
            RelayError::Config(format!("Failed to parse config file {}: {}", path.display(), e))
        })?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay settings from a key lookup; blank values are ignored
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(flag) = get(env::POLICY_FLAG) {
            self.policy_flag = PolicyFlag::new(flag);
        }
        if let Some(bucket) = get(env::CAT2_BUCKET) {
            self.cat2_bucket = Some(bucket);
        }
        if let Some(bucket) = get(env::VOLTRON_BUCKET) {
            self.voltron_bucket = Some(bucket);
        }
        if let Some(prefix) = get(env::VOLTRON_PREFIX) {
            self.voltron_prefix = Some(prefix);
        }
        if let Some(dir) = get(env::PATTERN_DIR) {
            self.pattern_dir = PathBuf::from(dir);
        }
        if let Some(key) = get(env::ENCRYPTION_KEY) {
            self.encryption_key = Some(SecretString::new(key.into_boxed_str()));
        }
        if let Some(region) = get(env::SOURCE_REGION) {
            self.source_store.region = Some(region);
        }
        if let Some(endpoint) = get(env::SOURCE_ENDPOINT) {
            self.source_store.endpoint = Some(endpoint);
            self.source_store.force_path_style = true;
        }
        if let Some(region) = get(env::CAT2_REGION) {
            self.cat2_store.region = Some(region);
        }
        if let Some(endpoint) = get(env::CAT2_ENDPOINT) {
            self.cat2_store.endpoint = Some(endpoint);
            self.cat2_store.force_path_style = true;
        }
    }

    /// Settings needed on every path
    pub fn validate(&self) -> Result<()> {
        if self.policy_flag.is_empty() {
            return Err(RelayError::Config(format!("{} is not set", env::POLICY_FLAG)));
        }
        Ok(())
    }

    pub fn cat2_bucket(&self) -> Result<&str> {
        require(self.cat2_bucket.as_deref(), env::CAT2_BUCKET)
    }

    pub fn voltron_bucket(&self) -> Result<&str> {
        require(self.voltron_bucket.as_deref(), env::VOLTRON_BUCKET)
    }

    pub fn voltron_prefix(&self) -> Result<&str> {
        require(self.voltron_prefix.as_deref(), env::VOLTRON_PREFIX)
    }

    pub fn encryption_key(&self) -> Result<&SecretString> {
        self.encryption_key
            .as_ref()
            .ok_or_else(|| RelayError::Config(format!("{} is not set", env::ENCRYPTION_KEY)))
    }

    pub fn transfer_exclusion_path(&self) -> PathBuf {
        self.pattern_dir.join(TRANSFER_EXCLUSION_FILE)
    }

    pub fn encryption_exclusion_path(&self) -> PathBuf {
        self.pattern_dir.join(ENCRYPTION_EXCLUSION_FILE)
    }
}

fn require<'a>(value: Option<&'a str>, name: &str) -> Result<&'a str> {
    value.ok_or_else(|| RelayError::Config(format!("{} is not set", name)))
}
