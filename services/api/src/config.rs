//! Process configuration, read once from the environment at boot.

use std::time::Duration;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set when STORE_BACKEND={1}")]
    Missing(&'static str, &'static str),
    #[error("invalid value `{value}` for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    /// Hosted backend's REST interface, called with the service-role key.
    Rest {
        url: String,
        service_role_key: String,
        timeout: Duration,
    },
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityConfig {
    pub jwt_secret: String,
    pub audience: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub store: StoreBackend,
    pub identity: Option<IdentityConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests need not touch
    /// the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = parse_or(get("API_PORT"), "API_PORT", 8081u16)?;

        let backend = get("STORE_BACKEND").unwrap_or_else(|| "rest".to_string());
        let store = match backend.as_str() {
            "rest" => StoreBackend::Rest {
                url: get("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL", "rest"))?,
                service_role_key: get("SUPABASE_SERVICE_ROLE_KEY")
                    .ok_or(ConfigError::Missing("SUPABASE_SERVICE_ROLE_KEY", "rest"))?,
                timeout: Duration::from_secs(parse_or(
                    get("STORE_TIMEOUT_SECS"),
                    "STORE_TIMEOUT_SECS",
                    15u64,
                )?),
            },
            "postgres" => StoreBackend::Postgres {
                database_url: get("DATABASE_URL")
                    .ok_or(ConfigError::Missing("DATABASE_URL", "postgres"))?,
                max_connections: parse_or(
                    get("DATABASE_MAX_CONNECTIONS"),
                    "DATABASE_MAX_CONNECTIONS",
                    5u32,
                )?,
            },
            "memory" => StoreBackend::Memory,
            _ => {
                return Err(ConfigError::Invalid {
                    key: "STORE_BACKEND",
                    value: backend,
                })
            }
        };

        let identity = get("AUTH_JWT_SECRET").map(|jwt_secret| IdentityConfig {
            jwt_secret,
            audience: get("AUTH_JWT_AUDIENCE").unwrap_or_else(|| "authenticated".to_string()),
        });

        Ok(Self {
            port,
            store,
            identity,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn rest_backend_is_default_and_needs_credentials() {
        assert_eq!(
            config(&[]),
            Err(ConfigError::Missing("SUPABASE_URL", "rest"))
        );

        let cfg = config(&[
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_SERVICE_ROLE_KEY", "service"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 8081);
        assert!(cfg.identity.is_none());
        assert_eq!(
            cfg.store,
            StoreBackend::Rest {
                url: "https://x.supabase.co".into(),
                service_role_key: "service".into(),
                timeout: Duration::from_secs(15),
            }
        );
    }

    #[test]
    fn memory_backend_with_identity() {
        let cfg = config(&[
            ("STORE_BACKEND", "memory"),
            ("API_PORT", "9000"),
            ("AUTH_JWT_SECRET", "s3cret"),
        ])
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.store, StoreBackend::Memory);
        assert_eq!(
            cfg.identity,
            Some(IdentityConfig {
                jwt_secret: "s3cret".into(),
                audience: "authenticated".into(),
            })
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert_eq!(
            config(&[("STORE_BACKEND", "memory"), ("API_PORT", "http")]),
            Err(ConfigError::Invalid {
                key: "API_PORT",
                value: "http".into()
            })
        );
        assert!(matches!(
            config(&[("STORE_BACKEND", "mongo")]),
            Err(ConfigError::Invalid { key: "STORE_BACKEND", .. })
        ));
        assert_eq!(
            config(&[("STORE_BACKEND", "postgres")]),
            Err(ConfigError::Missing("DATABASE_URL", "postgres"))
        );
    }
}
