use std::collections::BTreeMap;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use crate::scoring::{default_grade_table, ContextSettings, EngineConfig, GradeBucket, DEFAULT_ROUNDS};

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
    pub scoring: EngineConfig,
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

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scoring: scoring_from_env()?,
        })
    }
}

fn scoring_from_env() -> Result<EngineConfig, ConfigError> {
    let rounds = match env::var("APPRAISAL_ROUNDS") {
        Ok(raw) => parse_rounds(&raw)?,
        Err(_) => DEFAULT_ROUNDS,
    };
    let grade_table = match env::var("APPRAISAL_GRADE_TABLE") {
        Ok(raw) if !raw.trim().is_empty() => parse_grade_table(&raw)?,
        _ => default_grade_table(),
    };

    let mut context = ContextSettings::default();
    if let Ok(raw) = env::var("APPRAISAL_STAFF_LEVELS") {
        context.staff_levels = parse_list(&raw);
    }
    if let Ok(raw) = env::var("APPRAISAL_SECTION_GROUPS") {
        context.section_groups = parse_section_groups(&raw)?;
    }

    Ok(EngineConfig {
        rounds,
        grade_table,
        context,
    })
}

/// Resolver round count; must be a positive integer.
pub fn parse_rounds(raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(rounds) if rounds > 0 => Ok(rounds),
        _ => Err(ConfigError::InvalidRounds {
            value: raw.to_string(),
        }),
    }
}

/// `GRADE:MIN:MAX,GRADE:MIN:MAX,...`, kept in the given order.
pub fn parse_grade_table(raw: &str) -> Result<Vec<GradeBucket>, ConfigError> {
    let invalid = |entry: &str| ConfigError::InvalidGradeTable {
        entry: entry.trim().to_string(),
    };

    raw.split(',')
        .filter(|entry| !entry.trim().is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
            let [grade, min, max] = parts.as_slice() else {
                return Err(invalid(entry));
            };
            if grade.is_empty() {
                return Err(invalid(entry));
            }
            let min = min.parse::<f64>().map_err(|_| invalid(entry))?;
            let max = max.parse::<f64>().map_err(|_| invalid(entry))?;
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(invalid(entry));
            }
            Ok(GradeBucket::new(grade, min, max))
        })
        .collect()
}

/// `group=SectionA|SectionB;group2=SectionC`.
pub fn parse_section_groups(raw: &str) -> Result<BTreeMap<String, Vec<String>>, ConfigError> {
    let mut groups = BTreeMap::new();
    for entry in raw.split(';').filter(|entry| !entry.trim().is_empty()) {
        let Some((group, sections)) = entry.split_once('=') else {
            return Err(ConfigError::InvalidSectionGroups {
                entry: entry.trim().to_string(),
            });
        };
        let group = group.trim();
        if group.is_empty() {
            return Err(ConfigError::InvalidSectionGroups {
                entry: entry.trim().to_string(),
            });
        }
        let sections = sections
            .split('|')
            .map(str::trim)
            .filter(|section| !section.is_empty())
            .map(str::to_string)
            .collect();
        groups.insert(group.to_string(), sections);
    }
    Ok(groups)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
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

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidRounds { value: String },
    InvalidGradeTable { entry: String },
    InvalidSectionGroups { entry: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidRounds { value } => {
                write!(f, "APPRAISAL_ROUNDS must be a positive integer, got '{value}'")
            }
            ConfigError::InvalidGradeTable { entry } => write!(
                f,
                "APPRAISAL_GRADE_TABLE entry '{entry}' must look like GRADE:MIN:MAX with MIN <= MAX"
            ),
            ConfigError::InvalidSectionGroups { entry } => write!(
                f,
                "APPRAISAL_SECTION_GROUPS entry '{entry}' must look like group=SectionA|SectionB"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidRounds { .. }
            | ConfigError::InvalidGradeTable { .. }
            | ConfigError::InvalidSectionGroups { .. } => None,
        }
    }
}
