//! Adapter configuration.
//!
//! Credentials and the target container come from the process environment and are
//! read exactly once, when [`Config`] is built at startup. Everything else is a
//! command-line flag with a default that reproduces the plain `:8080` service.

use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

use crate::auth::SharedKeyCredential;

/// Environment variable holding the storage account name.
pub const ENV_ACCOUNT_NAME: &str = "storageAccountName";

/// Environment variable holding the storage account access key.
pub const ENV_ACCESS_KEY: &str = "accessKey";

/// Environment variable holding the container name.
pub const ENV_CONTAINER_NAME: &str = "containerName";

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default upload block size (4 MiB).
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;

/// Default number of blocks staged concurrently.
pub const DEFAULT_PARALLELISM: usize = 16;

/// Largest block the service accepts (4000 MiB).
pub const MAX_BLOCK_SIZE: u64 = 4000 * 1024 * 1024;

/// Storage REST API version sent with every request.
pub const API_VERSION: &str = "2021-10-04";

/// Account name of the local storage emulator.
pub const EMULATOR_ACCOUNT: &str = "devstoreaccount1";

/// Well-known account key of the local storage emulator (base64 encoded).
pub const EMULATOR_ACCOUNT_KEY: &str =
    "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";

/// Command-line arguments for the adapter.
#[derive(Parser, Debug, Clone)]
#[command(name = "azblob-adapter")]
#[command(about = "HTTP adapter for listing, uploading and deleting Azure blobs")]
#[command(version)]
pub struct Args {
    /// Host address to bind to.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, short = 'p', default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Blob service endpoint, e.g. http://127.0.0.1:10000/devstoreaccount1.
    /// Defaults to https://{account}.blob.core.windows.net.
    #[arg(long)]
    pub blob_endpoint: Option<String>,

    /// Upload block size in bytes.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,

    /// Maximum number of blocks uploaded concurrently.
    #[arg(long, default_value_t = DEFAULT_PARALLELISM)]
    pub parallelism: usize,

    /// Directory for transient upload files.
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Do not try to create the container when a request starts.
    #[arg(long)]
    pub skip_container_create: bool,

    /// Serve from an in-memory blob store instead of a storage account.
    #[arg(long)]
    pub in_memory: bool,

    /// Enable debug logging.
    #[arg(long, short = 'd')]
    pub debug: bool,

    /// Enable silent mode (minimal logging).
    #[arg(long, short = 's')]
    pub silent: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            blob_endpoint: None,
            block_size: DEFAULT_BLOCK_SIZE,
            parallelism: DEFAULT_PARALLELISM,
            scratch_dir: None,
            skip_container_create: false,
            in_memory: false,
            debug: false,
            silent: false,
        }
    }
}

/// Configuration failures. All of them stop the adapter before it serves anything.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("storageAccountName or accessKey or containerName environment variable is not set (missing {0})")]
    MissingEnv(&'static str),

    #[error("invalid container name {name:?}: {reason}")]
    InvalidContainerName { name: String, reason: &'static str },

    #[error("invalid upload options: {0}")]
    InvalidUpload(&'static str),

    #[error("invalid blob endpoint {0:?}")]
    InvalidEndpoint(String),

    #[error("invalid credentials: account key is not valid base64")]
    InvalidAccountKey,
}

/// Account credentials.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    pub name: String,
    pub key: String,
}

/// Tunables for the chunked block upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    /// Bytes per block.
    pub block_size: usize,
    /// Blocks in flight at once.
    pub parallelism: usize,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            parallelism: DEFAULT_PARALLELISM,
        }
    }
}

impl UploadOptions {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 || self.block_size as u64 > MAX_BLOCK_SIZE {
            return Err(ConfigError::InvalidUpload(
                "block size must be between 1 byte and 4000 MiB",
            ));
        }
        if self.parallelism == 0 {
            return Err(ConfigError::InvalidUpload("parallelism must be at least 1"));
        }
        Ok(())
    }
}

/// Immutable adapter configuration, shared by every request.
#[derive(Debug, Clone)]
pub struct Config {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Storage account credentials.
    pub account: AccountConfig,
    /// Container every operation targets.
    pub container: String,
    /// Blob service endpoint override.
    pub blob_endpoint: Option<String>,
    /// Block upload tunables.
    pub upload: UploadOptions,
    /// Directory for transient upload files.
    pub scratch_dir: PathBuf,
    /// Create the container when a session opens.
    pub ensure_container: bool,
    /// Use the in-memory blob store.
    pub in_memory: bool,
}

impl Config {
    /// Builds the configuration from arguments and the process environment.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        Self::from_lookup(args, |key| std::env::var(key).ok())
    }

    /// Builds the configuration from arguments and an arbitrary variable lookup.
    pub fn from_lookup<F>(args: Args, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingEnv(key))
        };

        let name = required(ENV_ACCOUNT_NAME)?;
        let key = required(ENV_ACCESS_KEY)?;
        let container = required(ENV_CONTAINER_NAME)?;

        let config = Self {
            host: args.host,
            port: args.port,
            account: AccountConfig { name, key },
            container,
            blob_endpoint: args.blob_endpoint,
            upload: UploadOptions {
                block_size: args.block_size,
                parallelism: args.parallelism,
            },
            scratch_dir: args.scratch_dir.unwrap_or_else(std::env::temp_dir),
            ensure_container: !args.skip_container_create,
            in_memory: args.in_memory,
        };
        config.validate()?;
        Ok(config)
    }

    /// Configuration for a local storage emulator listening on `endpoint`.
    pub fn emulator(endpoint: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            account: AccountConfig {
                name: EMULATOR_ACCOUNT.to_string(),
                key: EMULATOR_ACCOUNT_KEY.to_string(),
            },
            container: container.into(),
            blob_endpoint: Some(endpoint.into()),
            upload: UploadOptions::default(),
            scratch_dir: std::env::temp_dir(),
            ensure_container: true,
            in_memory: false,
        }
    }

    /// Checks everything that can be checked without talking to the service.
    pub fn validate(&self) -> Result<(), ConfigError> {
        SharedKeyCredential::new(&self.account.name, &self.account.key)?;
        validate_container_name(&self.container)?;
        self.upload.validate()?;
        if let Some(endpoint) = &self.blob_endpoint {
            url::Url::parse(endpoint).map_err(|_| ConfigError::InvalidEndpoint(endpoint.clone()))?;
        }
        Ok(())
    }

    /// Returns the blob service URL of the account, without a trailing slash.
    pub fn account_url(&self) -> String {
        match &self.blob_endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.blob.core.windows.net", self.account.name),
        }
    }

    /// Returns the URL of the configured container.
    pub fn container_url(&self) -> String {
        format!("{}/{}", self.account_url(), self.container)
    }

    /// Returns the bind address.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn validate_container_name(name: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidContainerName {
        name: name.to_string(),
        reason,
    };

    // $root, $logs and $web are special containers
    if matches!(name, "$root" | "$logs" | "$web") {
        return Ok(());
    }

    if name.len() < 3 || name.len() > 63 {
        return Err(invalid("must be between 3 and 63 characters"));
    }

    if !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
        return Err(invalid("must start with a letter or number"));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(invalid("can only contain lowercase letters, numbers, and hyphens"));
    }

    if name.contains("--") {
        return Err(invalid("cannot have consecutive hyphens"));
    }

    Ok(())
}
