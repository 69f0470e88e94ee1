use chrono::FixedOffset;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub pipeline: PipelineConfig,
    pub geocoder: GeocoderConfig,
    pub storage: StorageConfig,
    pub template_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let pipeline = PipelineConfig::from_env()?;
        let geocoder = GeocoderConfig::from_env()?;
        let storage = StorageConfig {
            root: env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./uploads")),
            public_url: env::var("STORAGE_PUBLIC_URL")
                .unwrap_or_else(|_| format!("http://{host}:{port}/uploads")),
        };
        let template_path = env::var("INSPECTION_TEMPLATE_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            pipeline,
            geocoder,
            storage,
            template_path,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Tuning for the per-photo compression, watermark, and location steps.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub max_dimension: u32,
    pub compress_quality: u8,
    pub watermark_quality: u8,
    pub brand_label: String,
    pub location_timeout: Duration,
    pub geocode_timeout: Duration,
    /// Longest the watermark step waits on an address that is still resolving.
    pub address_grace: Duration,
    /// UTC offset of the facility clock stamped on photos. `None` uses the host timezone.
    pub facility_offset: Option<FixedOffset>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_dimension: 1200,
            compress_quality: 85,
            watermark_quality: 90,
            brand_label: "SITE INSPECTOR".to_string(),
            location_timeout: Duration::from_millis(8_000),
            geocode_timeout: Duration::from_millis(3_000),
            address_grace: Duration::from_millis(500),
            facility_offset: None,
        }
    }
}

impl PipelineConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let max_dimension = read_number("PHOTO_MAX_DIMENSION", defaults.max_dimension)?;
        if max_dimension == 0 {
            return Err(ConfigError::OutOfRange {
                variable: "PHOTO_MAX_DIMENSION",
                value: max_dimension.to_string(),
            });
        }

        let compress_quality = read_quality("PHOTO_COMPRESS_QUALITY", defaults.compress_quality)?;
        let watermark_quality =
            read_quality("PHOTO_WATERMARK_QUALITY", defaults.watermark_quality)?;
        let brand_label = env::var("WATERMARK_BRAND_LABEL").unwrap_or(defaults.brand_label);

        let location_timeout = Duration::from_millis(read_number(
            "LOCATION_TIMEOUT_MS",
            defaults.location_timeout.as_millis() as u64,
        )?);
        let geocode_timeout = Duration::from_millis(read_number(
            "GEOCODE_TIMEOUT_MS",
            defaults.geocode_timeout.as_millis() as u64,
        )?);
        let address_grace = Duration::from_millis(read_number(
            "GEOCODE_GRACE_MS",
            defaults.address_grace.as_millis() as u64,
        )?)
        .min(geocode_timeout);
        let facility_offset = read_offset("WATERMARK_UTC_OFFSET_MINUTES")?;

        Ok(Self {
            max_dimension,
            compress_quality,
            watermark_quality,
            brand_label,
            location_timeout,
            geocode_timeout,
            address_grace,
            facility_offset,
        })
    }
}

/// Reverse geocoding service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocoderConfig {
    pub enabled: bool,
    pub base_url: String,
    pub user_agent: String,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("site-inspector/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl GeocoderConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let enabled = match env::var("GEOCODER_ENABLED") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError::InvalidFlag {
                variable: "GEOCODER_ENABLED",
                value: raw,
            })?,
            Err(_) => defaults.enabled,
        };

        Ok(Self {
            enabled,
            base_url: env::var("GEOCODER_URL").unwrap_or(defaults.base_url),
            user_agent: env::var("GEOCODER_USER_AGENT").unwrap_or(defaults.user_agent),
        })
    }
}

/// Where uploaded evidence lands and how it is addressed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub public_url: String,
}

fn read_number<T>(variable: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber {
                variable,
                value: raw,
            }),
        Err(_) => Ok(default),
    }
}

fn read_quality(variable: &'static str, default: u8) -> Result<u8, ConfigError> {
    let quality = read_number(variable, default)?;
    if (1..=100).contains(&quality) {
        Ok(quality)
    } else {
        Err(ConfigError::OutOfRange {
            variable,
            value: quality.to_string(),
        })
    }
}

fn read_offset(variable: &'static str) -> Result<Option<FixedOffset>, ConfigError> {
    if env::var_os(variable).is_none() {
        return Ok(None);
    }
    let minutes: i32 = read_number(variable, 0)?;
    minutes
        .checked_mul(60)
        .and_then(FixedOffset::east_opt)
        .map(Some)
        .ok_or(ConfigError::OutOfRange {
            variable,
            value: minutes.to_string(),
        })
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { variable: &'static str, value: String },
    OutOfRange { variable: &'static str, value: String },
    InvalidFlag { variable: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { variable, value } => {
                write!(f, "{variable} must be a whole number, got '{value}'")
            }
            ConfigError::OutOfRange { variable, value } => {
                write!(f, "{variable} is out of range: {value}")
            }
            ConfigError::InvalidFlag { variable, value } => {
                write!(f, "{variable} must be true or false, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
