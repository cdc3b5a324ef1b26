use std::{env, fmt::Display, net::IpAddr, path::PathBuf, str::FromStr};

use crate::schema::ToggleMode;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is required but not set")]
    Missing(&'static str),
    #[error("Invalid {key} value: {info}")]
    Invalid { key: &'static str, info: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub jwt_secret: String,
    pub token_lifetime_hours: i64,
    pub page_size: i64,
    pub toggle_mode: ToggleMode,
    pub media_root: PathBuf,
    pub media_url: String,
    pub max_body_bytes: u64,
    pub db_max_connections: u32,
}

impl Config {
    /// Reads the process environment. Call `dotenv::dotenv()` first to pick up a `.env` file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            database_url: require(&lookup, "DATABASE_URL")?,
            host: try_load(&lookup, "HOST", "0.0.0.0")?,
            port: try_load(&lookup, "PORT", "8000")?,
            jwt_secret: require(&lookup, "JWT_SECRET")?,
            token_lifetime_hours: try_load(&lookup, "TOKEN_LIFETIME_HOURS", "24")?,
            page_size: try_load(&lookup, "PAGE_SIZE", "6")?,
            toggle_mode: try_load(&lookup, "TOGGLE_MODE", "strict")?,
            media_root: try_load(&lookup, "MEDIA_ROOT", "media")?,
            media_url: try_load(&lookup, "MEDIA_URL", "/media/")?,
            max_body_bytes: try_load(&lookup, "MAX_BODY_BYTES", "10485760")?,
            db_max_connections: try_load(&lookup, "DB_MAX_CONNECTIONS", "5")?,
        };

        if config.page_size < 1 {
            return Err(ConfigError::Invalid {
                key: "PAGE_SIZE",
                info: String::from("must be at least 1"),
            });
        }
        if config.token_lifetime_hours < 1 {
            return Err(ConfigError::Invalid {
                key: "TOKEN_LIFETIME_HOURS",
                info: String::from("must be at least 1"),
            });
        }

        Ok(config)
    }

    /// Configuration for tests: every default, with placeholder database and secret.
    pub fn for_tests() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| match key {
            "DATABASE_URL" => Some(String::from("postgres://foodgram@localhost/foodgram")),
            "JWT_SECRET" => Some(String::from("test-secret")),
            _ => None,
        })
    }

    pub fn address(&self) -> (IpAddr, u16) {
        (self.host, self.port)
    }
}

fn require<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or(ConfigError::Missing(key))
}

fn try_load<T, F>(lookup: &F, key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .unwrap_or_else(|| {
            log::info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| {
            log::warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                info: e.to_string(),
            }
        })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_optional_values_are_missing() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("JWT_SECRET", "secret"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8000);
        assert_eq!(config.page_size, 6);
        assert_eq!(config.toggle_mode, ToggleMode::Strict);
        assert_eq!(config.media_root, PathBuf::from("media"));
        assert_eq!(config.media_url, "/media/");
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
        assert_eq!(config.address().0.to_string(), "0.0.0.0");
    }

    #[test]
    fn database_url_and_secret_are_required() {
        let error = Config::from_lookup(lookup(&[("JWT_SECRET", "secret")])).unwrap_err();
        assert!(matches!(error, ConfigError::Missing("DATABASE_URL")));

        let error =
            Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/foodgram")]))
                .unwrap_err();
        assert!(matches!(error, ConfigError::Missing("JWT_SECRET")));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let base = [
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("JWT_SECRET", "secret"),
        ];

        let mut vars = base.to_vec();
        vars.push(("PORT", "eighty"));
        assert!(matches!(
            Config::from_lookup(lookup(&vars)).unwrap_err(),
            ConfigError::Invalid { key: "PORT", .. }
        ));

        let mut vars = base.to_vec();
        vars.push(("TOGGLE_MODE", "sometimes"));
        assert!(Config::from_lookup(lookup(&vars)).is_err());

        let mut vars = base.to_vec();
        vars.push(("PAGE_SIZE", "0"));
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn test_configuration_uses_defaults() {
        let config = Config::for_tests().unwrap();
        assert_eq!(config.jwt_secret, "test-secret");
        assert_eq!(config.toggle_mode, ToggleMode::Strict);
    }

    #[test]
    fn toggle_mode_can_be_relaxed() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/foodgram"),
            ("JWT_SECRET", "secret"),
            ("TOGGLE_MODE", "idempotent"),
        ]))
        .unwrap();
        assert_eq!(config.toggle_mode, ToggleMode::Idempotent);
    }
}
