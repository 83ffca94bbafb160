//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, DatabaseOverride, EligibleArgs, ServeArgs, ServeOverrides};

use std::{net::SocketAddr, num::NonZeroU32, str::FromStr, time::Duration};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::application::ad_slots::{AdSlotPolicy, DEFAULT_MAX_ELIGIBLE, DEFAULT_TTL_MINUTES};
use crate::application::manager::ManagerConfig;
use crate::application::pixel::PixelConfig;
use crate::cache::{CacheBackend, CacheConfig};
use crate::domain::entities::CampaignId;
use crate::domain::query::{ContentQuery, MetaClause};
use crate::domain::slots::{SlotCatalog, SlotDefinition};
use crate::domain::types::{ContentStatus, MetaCompare, MetaValueType};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "sponsorship";
const ENV_PREFIX: &str = "SPONSORSHIP";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_SITE_URL: &str = "http://localhost/";
const DEFAULT_CONTENT_TYPE: &str = "post";
/// Base path of the slot API; placeholders fetch item markup below it.
pub const SLOT_API_PATH: &str = "/api/v1/slots";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub site: SiteSettings,
    pub sponsorship: SponsorshipSettings,
    pub ad_slots: AdSlotSettings,
    pub cache: CacheConfig,
    pub pixel: PixelConfig,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    /// Without a URL the service runs on in-memory repositories.
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    /// Always ends with `/` so relative joins keep the full path.
    pub url: Url,
}

#[derive(Debug, Clone)]
pub struct SponsorshipSettings {
    pub enabled_content_types: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AdSlotSettings {
    pub ttl: time::Duration,
    pub max_eligible: u32,
    pub skip_cache: bool,
    pub catalog: SlotCatalog,
}

impl Settings {
    pub fn ad_slot_policy(&self) -> AdSlotPolicy {
        AdSlotPolicy {
            ttl: self.ad_slots.ttl,
            max_eligible: self.ad_slots.max_eligible,
            skip_cache: self.ad_slots.skip_cache,
            enabled_content_types: self.sponsorship.enabled_content_types.clone(),
        }
    }

    pub fn manager_config(&self) -> ManagerConfig {
        ManagerConfig {
            catalog: self.ad_slots.catalog.clone(),
            policy: self.ad_slot_policy(),
            pixel: self.pixel.clone(),
            site_url: self.site.url.clone(),
            slot_endpoint: SLOT_API_PATH.to_string(),
        }
    }
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

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("sponsorship.enabled_content_types"),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Eligible(args)) => raw.apply_database_override(&args.database),
        Some(Command::CheckConfig) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    site: RawSiteSettings,
    sponsorship: RawSponsorshipSettings,
    ad_slots: RawAdSlotSettings,
    cache: RawCacheSettings,
    pixel: PixelConfig,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(backend) = overrides.cache_backend.as_ref() {
            self.cache.backend = Some(backend.clone());
        }
        if let Some(skip) = overrides.skip_cache {
            self.ad_slots.skip_cache = Some(skip);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            site,
            sponsorship,
            ad_slots,
            cache,
            pixel,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            site: build_site_settings(site)?,
            sponsorship: build_sponsorship_settings(sponsorship)?,
            ad_slots: build_ad_slot_settings(ad_slots)?,
            cache: build_cache_settings(cache)?,
            pixel: build_pixel_settings(pixel)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
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

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let raw_url = site.url.unwrap_or_else(|| DEFAULT_SITE_URL.to_string());
    let mut url = Url::parse(raw_url.trim())
        .map_err(|err| LoadError::invalid("site.url", format!("invalid URL: {err}")))?;
    if url.cannot_be_a_base() {
        return Err(LoadError::invalid("site.url", "must be an absolute http(s) URL"));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(SiteSettings { url })
}

fn build_sponsorship_settings(
    sponsorship: RawSponsorshipSettings,
) -> Result<SponsorshipSettings, LoadError> {
    let enabled_content_types = match sponsorship.enabled_content_types {
        Some(types) => clean_list(types),
        None => vec![DEFAULT_CONTENT_TYPE.to_string()],
    };
    if enabled_content_types.is_empty() {
        return Err(LoadError::invalid(
            "sponsorship.enabled_content_types",
            "at least one content type must be enabled",
        ));
    }
    Ok(SponsorshipSettings {
        enabled_content_types,
    })
}

fn build_ad_slot_settings(ad_slots: RawAdSlotSettings) -> Result<AdSlotSettings, LoadError> {
    let ttl_minutes = ad_slots.ttl_minutes.unwrap_or(DEFAULT_TTL_MINUTES);
    if ttl_minutes <= 0 {
        return Err(LoadError::invalid(
            "ad_slots.ttl_minutes",
            "must be greater than zero",
        ));
    }

    let max_eligible = ad_slots.max_eligible.unwrap_or(DEFAULT_MAX_ELIGIBLE);
    if max_eligible == 0 {
        return Err(LoadError::invalid(
            "ad_slots.max_eligible",
            "must be greater than zero",
        ));
    }

    let slots = ad_slots
        .slots
        .into_iter()
        .map(build_slot)
        .collect::<Result<Vec<_>, _>>()?;
    let catalog = SlotCatalog::new(slots)
        .map_err(|err| LoadError::invalid("ad_slots.slots", err.to_string()))?;

    Ok(AdSlotSettings {
        ttl: time::Duration::minutes(ttl_minutes),
        max_eligible,
        skip_cache: ad_slots.skip_cache.unwrap_or(false),
        catalog,
    })
}

fn build_slot(raw: RawSlot) -> Result<SlotDefinition, LoadError> {
    let statuses = raw
        .statuses
        .iter()
        .map(|status| {
            ContentStatus::try_from(status.as_str()).map_err(|_| {
                LoadError::invalid(
                    "ad_slots.slots.statuses",
                    format!("unknown status `{status}` in slot `{}`", raw.name),
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut meta = raw.meta.clone();
    if let Some(clause) = shorthand_meta_clause(&raw)? {
        if !meta.contains(&clause) {
            meta.push(clause);
        }
    }

    let filters = ContentQuery {
        content_types: clean_list(raw.content_types),
        statuses,
        campaigns: raw.campaigns,
        meta,
        limit: raw.limit,
        ..Default::default()
    };

    let slot = SlotDefinition::new(raw.name, raw.label.unwrap_or_default(), filters)
        .map_err(|err| LoadError::invalid("ad_slots.slots.name", err.to_string()))?;
    Ok(match raw.renderer {
        Some(renderer) if !renderer.trim().is_empty() => slot.with_renderer(renderer.trim()),
        _ => slot,
    })
}

/// Fold the `meta_key` / `meta_value` / `meta_value_num` / `meta_compare`
/// shorthand into a single clause. A bare key means "key exists".
fn shorthand_meta_clause(raw: &RawSlot) -> Result<Option<MetaClause>, LoadError> {
    let Some(key) = raw
        .meta_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
    else {
        return Ok(None);
    };

    let compare = match raw.meta_compare.as_deref() {
        Some(compare) => MetaCompare::try_from(compare).map_err(|_| {
            LoadError::invalid(
                "ad_slots.slots.meta_compare",
                format!("unsupported comparison `{compare}` in slot `{}`", raw.name),
            )
        })?,
        None => MetaCompare::Eq,
    };

    let (value, value_type) = match (&raw.meta_value_num, &raw.meta_value) {
        (Some(number), _) => {
            let trimmed = number.trim();
            trimmed.parse::<f64>().map_err(|_| {
                LoadError::invalid(
                    "ad_slots.slots.meta_value_num",
                    format!("`{number}` is not a number in slot `{}`", raw.name),
                )
            })?;
            (Some(trimmed.to_string()), MetaValueType::Numeric)
        }
        (None, Some(value)) => (Some(value.clone()), MetaValueType::Char),
        (None, None) => (None, MetaValueType::Char),
    };

    Ok(Some(match value {
        Some(value) if compare.needs_value() => MetaClause::compare(key, compare, value, value_type),
        _ if compare == MetaCompare::NotExists => MetaClause {
            compare,
            ..MetaClause::exists(key)
        },
        _ => MetaClause::exists(key),
    }))
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheConfig, LoadError> {
    let defaults = CacheConfig::default();
    let backend = match cache.backend.as_deref() {
        Some(name) => CacheBackend::try_from(name).map_err(|_| {
            LoadError::invalid(
                "cache.backend",
                format!("unknown backend `{name}`; expected `memory` or `postgres`"),
            )
        })?,
        None => defaults.backend,
    };
    let capacity = cache.capacity.unwrap_or(defaults.capacity);
    if capacity == 0 {
        return Err(LoadError::invalid(
            "cache.capacity",
            "must be greater than zero",
        ));
    }
    Ok(CacheConfig { backend, capacity })
}

fn build_pixel_settings(mut pixel: PixelConfig) -> Result<PixelConfig, LoadError> {
    pixel.param = pixel.param.trim().to_string();
    if pixel.param.is_empty() {
        return Err(LoadError::invalid("pixel.param", "must not be empty"));
    }
    pixel.override_url = pixel
        .override_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());
    if let Some(url) = pixel.override_url.as_deref() {
        Url::parse(url)
            .map_err(|err| LoadError::invalid("pixel.override_url", format!("invalid URL: {err}")))?;
    }
    Ok(pixel)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSponsorshipSettings {
    enabled_content_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAdSlotSettings {
    ttl_minutes: Option<i64>,
    max_eligible: Option<u32>,
    skip_cache: Option<bool>,
    slots: Vec<RawSlot>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSlot {
    name: String,
    label: Option<String>,
    content_types: Vec<String>,
    statuses: Vec<String>,
    campaigns: Vec<CampaignId>,
    meta: Vec<MetaClause>,
    meta_key: Option<String>,
    meta_value: Option<String>,
    meta_value_num: Option<String>,
    meta_compare: Option<String>,
    limit: Option<u32>,
    renderer: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    backend: Option<String>,
    capacity: Option<usize>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::new();
    for value in values {
        let value = value.trim();
        if !value.is_empty() && !cleaned.iter().any(|existing| existing == value) {
            cleaned.push(value.to_string());
        }
    }
    cleaned
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
