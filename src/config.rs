use std::{env, net::SocketAddr, str::FromStr};

use thiserror::Error;

use crate::{
    services::{
        rate_limit::{RateLimitPolicy, RateLimitSettings},
        tenant::TenantSettings,
    },
    utils::jwt::{JwtKeys, JwtSecretError},
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
    #[error(transparent)]
    JwtSecret(#[from] JwtSecretError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_keys: JwtKeys,
    pub production: bool,
    pub bind_addr: SocketAddr,
    pub frontend_origin: Option<String>,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub tenant: TenantSettings,
    pub site_password: Option<String>,
    pub cron_secret: Option<String>,
    pub trust_proxy_headers: bool,
    pub rate_limit: RateLimitSettings,
    pub rate_limit_backend: RateLimitBackend,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok(); // Load .env file
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url = var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let jwt_keys = JwtKeys::from_secret(var("JWT_SECRET").unwrap_or_default())?;

        let production =
            var("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production"));
        let bind_addr = parse_or(
            "BIND_ADDR",
            var("BIND_ADDR"),
            SocketAddr::from(([127, 0, 0, 1], 3000)),
        )?;

        let dev_hosts_in_production = parse_bool(
            "TENANT_DEV_HOSTS_IN_PRODUCTION",
            var("TENANT_DEV_HOSTS_IN_PRODUCTION"),
        )?;
        let tenant = TenantSettings {
            default_slug: var("DEFAULT_ORGANIZATION_SLUG"),
            dev_hosts: var("TENANT_DEV_HOSTS")
                .map(|hosts| {
                    hosts
                        .split(',')
                        .map(|host| host.trim().to_ascii_lowercase())
                        .filter(|host| !host.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            dev_hosts_enabled: !production || dev_hosts_in_production,
        };

        let defaults = RateLimitSettings::default();
        let rate_limit = RateLimitSettings {
            standard: RateLimitPolicy::new(
                parse_or(
                    "RATE_LIMIT_STANDARD_MAX",
                    var("RATE_LIMIT_STANDARD_MAX"),
                    defaults.standard.limit,
                )?,
                parse_or(
                    "RATE_LIMIT_STANDARD_WINDOW_SECONDS",
                    var("RATE_LIMIT_STANDARD_WINDOW_SECONDS"),
                    defaults.standard.window.as_secs(),
                )?,
            ),
            strict: RateLimitPolicy::new(
                parse_or(
                    "RATE_LIMIT_STRICT_MAX",
                    var("RATE_LIMIT_STRICT_MAX"),
                    defaults.strict.limit,
                )?,
                parse_or(
                    "RATE_LIMIT_STRICT_WINDOW_SECONDS",
                    var("RATE_LIMIT_STRICT_WINDOW_SECONDS"),
                    defaults.strict.window.as_secs(),
                )?,
            ),
            strict_prefixes: defaults.strict_prefixes,
        };
        if rate_limit.standard.window.is_zero() || rate_limit.strict.window.is_zero() {
            return Err(ConfigError::Invalid {
                name: "RATE_LIMIT_*_WINDOW_SECONDS",
                value: "0".into(),
            });
        }

        let store = var("RATE_LIMIT_STORE").map(|value| value.to_ascii_lowercase());
        let rate_limit_backend = match store.as_deref() {
            None | Some("postgres") => RateLimitBackend::Postgres,
            Some("memory") => RateLimitBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "RATE_LIMIT_STORE",
                    value: other.to_string(),
                })
            }
        };

        Ok(Config {
            database_url,
            jwt_keys,
            production,
            bind_addr,
            frontend_origin: var("FRONTEND_ORIGIN"),
            jwt_issuer: var("JWT_ISSUER").unwrap_or_else(|| "tenantgate".to_string()),
            jwt_audience: var("JWT_AUDIENCE").unwrap_or_else(|| "tenantgate-web".to_string()),
            tenant,
            site_password: var("SITE_PASSWORD"),
            cron_secret: var("CRON_SECRET"),
            trust_proxy_headers: parse_bool("TRUST_PROXY_HEADERS", var("TRUST_PROXY_HEADERS"))?,
            rate_limit,
            rate_limit_backend,
        })
    }
}

fn parse_or<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid { name, value }),
    }
}

fn parse_bool(name: &'static str, raw: Option<String>) -> Result<bool, ConfigError> {
    match raw.as_deref().map(str::to_ascii_lowercase).as_deref() {
        None | Some("false") | Some("0") | Some("no") => Ok(false),
        Some("true") | Some("1") | Some("yes") => Ok(true),
        Some(_) => Err(ConfigError::Invalid {
            name,
            value: raw.unwrap_or_default(),
        }),
    }
}
