use anyhow::{Context, Result, bail};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub staging_dir: String,
    pub database_url: String,
    pub bucket: String,
    pub project: String,
    pub public_base_url: String,
    pub allowed_extensions: Vec<String>,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Upload images and browse them in a gallery")]
pub struct Args {
    /// Host to bind to (overrides PHOTO_GALLERY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PHOTO_GALLERY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Root directory of the blob store (overrides PHOTO_GALLERY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Directory for uploads in flight (overrides PHOTO_GALLERY_STAGING_DIR)
    #[arg(long)]
    pub staging_dir: Option<String>,

    /// Database URL (overrides PHOTO_GALLERY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Bucket that receives uploaded images (overrides PHOTO_GALLERY_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Project identifier used as the metadata namespace (overrides PHOTO_GALLERY_PROJECT)
    #[arg(long)]
    pub project: Option<String>,

    /// Base of public object URLs (overrides PHOTO_GALLERY_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Comma-separated list of accepted extensions (overrides PHOTO_GALLERY_ALLOWED_EXTENSIONS)
    #[arg(long)]
    pub allowed_extensions: Option<String>,

    /// Largest accepted request body in bytes (overrides PHOTO_GALLERY_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        Self::resolve(Args::parse(), |name| env::var(name))
    }

    /// Merge parsed arguments over values looked up through `lookup`.
    fn resolve<F>(args: Args, lookup: F) -> Result<(Self, bool)>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let var_or = |name: &str, default: &str| -> Result<String> {
            match lookup(name) {
                Ok(value) => Ok(value),
                Err(env::VarError::NotPresent) => Ok(default.into()),
                Err(err) => Err(err).with_context(|| format!("reading {}", name)),
            }
        };

        // --- Environment fallback ---
        let env_host = var_or("PHOTO_GALLERY_HOST", "0.0.0.0")?;
        let env_port = match lookup("PHOTO_GALLERY_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing PHOTO_GALLERY_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 8080,
            Err(err) => return Err(err).context("reading PHOTO_GALLERY_PORT"),
        };
        let env_max_upload = match lookup("PHOTO_GALLERY_MAX_UPLOAD_BYTES") {
            Ok(value) => value.parse::<usize>().with_context(|| {
                format!("parsing PHOTO_GALLERY_MAX_UPLOAD_BYTES value `{}`", value)
            })?,
            Err(env::VarError::NotPresent) => 10 * 1024 * 1024,
            Err(err) => return Err(err).context("reading PHOTO_GALLERY_MAX_UPLOAD_BYTES"),
        };
        let env_storage = var_or("PHOTO_GALLERY_STORAGE_DIR", "./data/objects")?;
        let env_staging = var_or("PHOTO_GALLERY_STAGING_DIR", "./data/staging")?;
        let env_db = var_or(
            "PHOTO_GALLERY_DATABASE_URL",
            "sqlite://./data/meta/photo_gallery.db",
        )?;
        let env_bucket = var_or("PHOTO_GALLERY_BUCKET", "cloudnativenew")?;
        let env_project = var_or("PHOTO_GALLERY_PROJECT", "photo-gallery")?;
        let env_public = var_or(
            "PHOTO_GALLERY_PUBLIC_BASE_URL",
            "https://storage.googleapis.com",
        )?;
        let env_extensions = var_or("PHOTO_GALLERY_ALLOWED_EXTENSIONS", "jpg,jpeg,png")?;

        // --- Merge ---
        let allowed_extensions =
            parse_extensions(&args.allowed_extensions.unwrap_or(env_extensions));
        if allowed_extensions.is_empty() {
            bail!("at least one allowed extension must be configured");
        }

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            staging_dir: args.staging_dir.unwrap_or(env_staging),
            database_url: args.database_url.unwrap_or(env_db),
            bucket: args.bucket.unwrap_or(env_bucket),
            project: args.project.unwrap_or(env_project),
            public_base_url: args
                .public_base_url
                .unwrap_or(env_public)
                .trim_end_matches('/')
                .to_string(),
            allowed_extensions,
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split a comma-separated extension list, dropping leading dots and blanks.
fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect()
}
