use std::env;
use std::net::SocketAddr;

use chrono::Duration;
use thiserror::Error;
use uuid::Uuid;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_AUTH_SERVICE_URL: &str = "http://auth.localhost:8080";
const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_WAITLIST_OFFER_HOURS: i64 = 48;
// One year.
const MAX_WAITLIST_OFFER_HOURS: i64 = 24 * 365;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value: {value}")]
    Invalid { key: &'static str, value: String },
}

/// How requests are mapped onto organizations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tenancy {
    /// Each user acts inside the organization stored on their user row.
    Multi,
    /// Every request is pinned to one organization; other users are refused.
    Single(Uuid),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub auth_service_url: String,
    pub max_connections: u32,
    pub waitlist_offer_hours: i64,
    pub tenancy: Tenancy,
    pub dev_mode: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let jwt_secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let port = match get("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: raw,
            })?,
            None => DEFAULT_PORT,
        };

        let max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "DATABASE_MAX_CONNECTIONS",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let waitlist_offer_hours = match get("WAITLIST_OFFER_HOURS") {
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) if (1..=MAX_WAITLIST_OFFER_HOURS).contains(&n) => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "WAITLIST_OFFER_HOURS",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_WAITLIST_OFFER_HOURS,
        };

        let tenancy = match get("SINGLE_TENANT_ORGANIZATION_ID") {
            Some(raw) => Tenancy::Single(Uuid::parse_str(&raw).map_err(|_| {
                ConfigError::Invalid {
                    key: "SINGLE_TENANT_ORGANIZATION_ID",
                    value: raw.clone(),
                }
            })?),
            None => Tenancy::Multi,
        };

        let dev_mode = match get("DEV_MODE") {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::Invalid {
                key: "DEV_MODE",
                value: raw,
            })?,
            None => false,
        };

        Ok(Self {
            database_url,
            host: get("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            jwt_secret,
            auth_service_url: get("AUTH_SERVICE_URL")
                .unwrap_or_else(|| DEFAULT_AUTH_SERVICE_URL.to_string()),
            max_connections,
            waitlist_offer_hours,
            tenancy,
            dev_mode,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::Invalid {
            key: "HOST",
            value: raw,
        })
    }

    pub fn offer_window(&self) -> Duration {
        Duration::hours(self.waitlist_offer_hours)
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/camp"),
        ("JWT_SECRET", "secret"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3000);
        assert_eq!(config.waitlist_offer_hours, 48);
        assert_eq!(config.tenancy, Tenancy::Multi);
        assert!(!config.dev_mode);
        assert_eq!(config.bind_addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_missing_required() {
        let err = Config::from_lookup(lookup(&[("JWT_SECRET", "x")])).unwrap_err();
        assert_eq!(err, ConfigError::Missing("DATABASE_URL"));

        let err = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://x"), ("JWT_SECRET", "  ")]))
            .unwrap_err();
        assert_eq!(err, ConfigError::Missing("JWT_SECRET"));
    }

    #[test]
    fn test_single_tenant() {
        let org = Uuid::new_v4();
        let org_str = org.to_string();
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SINGLE_TENANT_ORGANIZATION_ID", &org_str));
        pairs.push(("DEV_MODE", "yes"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.tenancy, Tenancy::Single(org));
        assert!(config.dev_mode);
    }

    #[test]
    fn test_invalid_values() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("WAITLIST_OFFER_HOURS", "0"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "WAITLIST_OFFER_HOURS", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("WAITLIST_OFFER_HOURS", "10000000000"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "WAITLIST_OFFER_HOURS", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("WAITLIST_OFFER_HOURS", "8760"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.offer_window(), Duration::hours(8760));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "http"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("SINGLE_TENANT_ORGANIZATION_ID", "acme"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());
    }
}
