//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::{NonZeroU64, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Directive;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "flog";
const ENV_PREFIX: &str = "FLOG";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 32 * 1024 * 1024;
const DEFAULT_USERNAME: &str = "admin";
const DEFAULT_SESSION_TTL_MINUTES: u64 = 12 * 60;
const DEFAULT_SITE_TITLE: &str = "Flog";
const DEFAULT_ENTRIES_PER_PAGE: usize = 5;
const DEFAULT_ENTRIES_IN_FEED: usize = 5;

/// Command-line arguments for the Flog server binary.
#[derive(Debug, Parser)]
#[command(name = "flog", version, about = "Flog blog server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FLOG_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Flog HTTP server.
    Serve(Box<ServeArgs>),
    /// Print the SHA-256 digest to use as `auth.password_sha256`.
    #[command(name = "hash-password")]
    HashPassword(HashPasswordArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct HashPasswordArgs {
    /// Operator password to digest.
    #[arg(value_name = "PASSWORD")]
    pub password: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the uploads directory.
    #[arg(long = "uploads-directory", value_name = "PATH")]
    pub uploads_directory: Option<PathBuf>,

    /// Override the maximum request size for client API calls in bytes.
    #[arg(long = "uploads-max-request-bytes", value_name = "BYTES")]
    pub uploads_max_request_bytes: Option<u64>,

    /// Override the site title.
    #[arg(long = "site-title", value_name = "TITLE")]
    pub site_title: Option<String>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub uploads: UploadSettings,
    pub auth: AuthSettings,
    pub site: SiteSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
    /// Extra filter directives such as `flog::http=debug`.
    pub directives: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub directory: PathBuf,
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub username: String,
    /// Raw SHA-256 digest of the operator password; `None` disables login.
    pub password_sha256: Option<Vec<u8>>,
    /// Lifetime of a session, measured from login.
    pub session_ttl: time::Duration,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub title: String,
    pub categories: Vec<String>,
    /// Page size of the category listings.
    pub entries_per_page: NonZeroUsize,
    pub entries_in_feed: NonZeroUsize,
    /// Absolute base URL used for feed links, always ending in `/`.
    pub public_url: String,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::HashPassword(_)) | None => {
            raw.apply_serve_overrides(&ServeOverrides::default())
        }
    }

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    uploads: RawUploadSettings,
    auth: RawAuthSettings,
    site: RawSiteSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(directory) = overrides.uploads_directory.as_ref() {
            self.uploads.directory = Some(directory.clone());
        }
        if let Some(limit) = overrides.uploads_max_request_bytes {
            self.uploads.max_request_bytes = Some(limit);
        }
        if let Some(title) = overrides.site_title.as_ref() {
            self.site.title = Some(title.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            uploads,
            auth,
            site,
        } = raw;

        let server = build_server_settings(server)?;
        let site = build_site_settings(site, &server)?;
        Ok(Self {
            server,
            logging: build_logging_settings(logging)?,
            uploads: build_upload_settings(uploads)?,
            auth: build_auth_settings(auth)?,
            site,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;
    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    let mut directives = Vec::new();
    for spec in logging.directives.unwrap_or_default() {
        let spec = spec.trim().to_string();
        Directive::from_str(&spec).map_err(|err| {
            LoadError::invalid("logging.directives", format!("`{spec}`: {err}"))
        })?;
        directives.push(spec);
    }

    Ok(LoggingSettings {
        level,
        format,
        directives,
    })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let directory = uploads
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "uploads.directory",
            "path must not be empty",
        ));
    }

    let max_request_bytes_value = uploads
        .max_request_bytes
        .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "uploads.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings {
        directory,
        max_request_bytes,
    })
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let username = auth
        .username
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_USERNAME.to_string());
    if username.is_empty() {
        return Err(LoadError::invalid("auth.username", "must not be empty"));
    }

    let password_sha256 = match auth.password_sha256 {
        Some(value) if !value.trim().is_empty() => {
            let digest = hex::decode(value.trim()).map_err(|err| {
                LoadError::invalid("auth.password_sha256", format!("not hex: {err}"))
            })?;
            if digest.len() != 32 {
                return Err(LoadError::invalid(
                    "auth.password_sha256",
                    "expected 64 hex characters",
                ));
            }
            Some(digest)
        }
        _ => None,
    };

    let ttl_minutes = auth
        .session_ttl_minutes
        .unwrap_or(DEFAULT_SESSION_TTL_MINUTES);
    if ttl_minutes == 0 {
        return Err(LoadError::invalid(
            "auth.session_ttl_minutes",
            "must be greater than zero",
        ));
    }
    let session_ttl = i64::try_from(ttl_minutes)
        .ok()
        .and_then(|minutes| minutes.checked_mul(60))
        .map(time::Duration::seconds)
        .ok_or_else(|| LoadError::invalid("auth.session_ttl_minutes", "value is too large"))?;

    Ok(AuthSettings {
        username,
        password_sha256,
        session_ttl,
    })
}

fn build_site_settings(
    site: RawSiteSettings,
    server: &ServerSettings,
) -> Result<SiteSettings, LoadError> {
    let title = site
        .title
        .unwrap_or_else(|| DEFAULT_SITE_TITLE.to_string());

    let mut categories: Vec<String> = Vec::new();
    for name in site.categories.unwrap_or_default() {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(LoadError::invalid(
                "site.categories",
                "category names must not be empty",
            ));
        }
        if !categories.contains(&name) {
            categories.push(name);
        }
    }

    let entries_per_page = NonZeroUsize::new(
        site.entries_per_page.unwrap_or(DEFAULT_ENTRIES_PER_PAGE),
    )
    .ok_or_else(|| LoadError::invalid("site.entries_per_page", "must be greater than zero"))?;
    let entries_in_feed = NonZeroUsize::new(
        site.entries_in_feed.unwrap_or(DEFAULT_ENTRIES_IN_FEED),
    )
    .ok_or_else(|| LoadError::invalid("site.entries_in_feed", "must be greater than zero"))?;

    let public_url = match site.public_url {
        Some(url) => {
            let url = url.trim().trim_end_matches('/');
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(LoadError::invalid(
                    "site.public_url",
                    "must be an absolute http(s) URL",
                ));
            }
            format!("{url}/")
        }
        None => format!("http://{}/", server.addr),
    };

    Ok(SiteSettings {
        title,
        categories,
        entries_per_page,
        entries_in_feed,
        public_url,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
    directives: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    directory: Option<PathBuf>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    username: Option<String>,
    password_sha256: Option<String>,
    session_ttl_minutes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    title: Option<String>,
    categories: Option<Vec<String>>,
    entries_per_page: Option<usize>,
    entries_in_feed: Option<usize>,
    public_url: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

#[cfg(test)]
mod tests;
