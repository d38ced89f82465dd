use crate::services::session_service::SessionConfig;
use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use secrecy::SecretString;
use std::{env, str::FromStr, time::Duration};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Where image binaries are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ObjectStoreKind {
    /// Files under `--storage-dir`, served by this process under `/media`.
    Local,
    /// An S3-style bucket reachable over HTTP.
    Remote,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectStoreConfig {
    Local {
        storage_dir: String,
    },
    Remote {
        endpoint: String,
        bucket: String,
        /// Origin the bucket is publicly served from; defaults to `endpoint`.
        public_url: Option<String>,
        timeout: Duration,
    },
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Externally visible origin used to build image URLs.
    pub public_base_url: String,
    pub object_store: ObjectStoreConfig,
    pub session: SessionConfig,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Clinic gallery admin API")]
pub struct Args {
    /// Host to bind to (overrides CLINIC_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides CLINIC_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides CLINIC_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Object store backend (overrides CLINIC_OBJECT_STORE)
    #[arg(long, value_enum)]
    pub object_store: Option<ObjectStoreKind>,

    /// Directory for the local backend (overrides CLINIC_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Public origin for image URLs (overrides CLINIC_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Bucket endpoint for the remote backend (overrides CLINIC_REMOTE_ENDPOINT)
    #[arg(long)]
    pub remote_endpoint: Option<String>,

    /// Bucket name for the remote backend (overrides CLINIC_REMOTE_BUCKET)
    #[arg(long)]
    pub remote_bucket: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::from_sources(args, |name| env::var(name).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge parsed CLI args over values obtained from `lookup`.
    pub fn from_sources(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = lookup("CLINIC_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_var(&lookup, "CLINIC_PORT", 3000u16)?;
        let env_db = lookup("CLINIC_DATABASE_URL")
            .unwrap_or_else(|| "sqlite://./data/meta/clinic.db".into());
        let env_kind = match lookup("CLINIC_OBJECT_STORE") {
            Some(value) => <ObjectStoreKind as ValueEnum>::from_str(value.trim(), true)
                .map_err(|err| anyhow!(err))
                .with_context(|| format!("parsing CLINIC_OBJECT_STORE value `{}`", value))?,
            None => ObjectStoreKind::Local,
        };

        // --- Merge ---
        let port = args.port.unwrap_or(env_port);
        let public_base_url = args
            .public_base_url
            .or_else(|| lookup("CLINIC_PUBLIC_BASE_URL"))
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let object_store = match args.object_store.unwrap_or(env_kind) {
            ObjectStoreKind::Local => ObjectStoreConfig::Local {
                storage_dir: args
                    .storage_dir
                    .or_else(|| lookup("CLINIC_STORAGE_DIR"))
                    .unwrap_or_else(|| "./data/images".into()),
            },
            ObjectStoreKind::Remote => ObjectStoreConfig::Remote {
                endpoint: args
                    .remote_endpoint
                    .or_else(|| lookup("CLINIC_REMOTE_ENDPOINT"))
                    .context("CLINIC_REMOTE_ENDPOINT is required for the remote object store")?,
                bucket: args
                    .remote_bucket
                    .or_else(|| lookup("CLINIC_REMOTE_BUCKET"))
                    .unwrap_or_else(|| "clinic-gallery".into()),
                public_url: lookup("CLINIC_REMOTE_PUBLIC_URL"),
                timeout: Duration::from_secs(parse_var(&lookup, "CLINIC_REMOTE_TIMEOUT_SECS", 30u64)?),
            },
        };

        let session = SessionConfig {
            admin_password: secret_var(&lookup, "ADMIN_PASSWORD"),
            session_secret: secret_var(&lookup, "CLINIC_SESSION_SECRET"),
            cookie_secure: parse_bool_var(&lookup, "CLINIC_COOKIE_SECURE", true)?,
        };

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port,
            database_url: args.database_url.unwrap_or(env_db),
            public_base_url,
            object_store,
            session,
            max_upload_bytes: parse_var(&lookup, "CLINIC_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(default),
    }
}

fn parse_bool_var(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: bool,
) -> Result<bool> {
    match lookup(name) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow!("parsing {} value `{}`: expected a boolean", name, value)),
        },
        None => Ok(default),
    }
}

/// Secrets come from the environment only. Empty values count as unset.
fn secret_var(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<SecretString> {
    lookup(name)
        .filter(|value| !value.is_empty())
        .map(SecretString::new)
}
