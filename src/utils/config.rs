use std::env;

use thiserror::Error;

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_CACHE_MAX_ENTRIES: usize = 500;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} environment variable is required. For local development set it in your .env file")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings read from the environment (after `.env` is loaded).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mongo_uri: String,
    pub mongo_db: String,
    /// Teams may live in a separate database; both fall back to the main one.
    pub teams_mongo_uri: String,
    pub teams_mongo_db: String,
    pub debug: bool,
    pub port: u16,
    pub cache_max_entries: usize,
    pub cors_allowed_origin: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let mongo_uri = non_empty("MONGO_URI").ok_or(ConfigError::Missing("MONGO_URI"))?;
        let mongo_db = non_empty("MONGO_DB").ok_or(ConfigError::Missing("MONGO_DB"))?;

        let teams_mongo_uri = non_empty("TEAMS_MONGO_URI").unwrap_or_else(|| mongo_uri.clone());
        let teams_mongo_db = non_empty("TEAMS_MONGO_DB").unwrap_or_else(|| mongo_db.clone());

        let debug = match non_empty("DEBUG") {
            Some(value) => parse_flag(&value).ok_or(ConfigError::Invalid {
                name: "DEBUG",
                value,
            })?,
            None => false,
        };

        let port = match non_empty("PORT") {
            Some(value) => value
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value })?,
            None => DEFAULT_PORT,
        };

        let cache_max_entries = match non_empty("CACHE_MAX_ENTRIES") {
            Some(value) => match value.parse::<usize>() {
                Ok(entries) if entries > 0 => entries,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "CACHE_MAX_ENTRIES",
                        value,
                    })
                }
            },
            None => DEFAULT_CACHE_MAX_ENTRIES,
        };

        let cors_allowed_origin =
            non_empty("CORS_ALLOWED_ORIGIN").unwrap_or_else(|| "*".to_string());

        Ok(Self {
            mongo_uri,
            mongo_db,
            teams_mongo_uri,
            teams_mongo_db,
            debug,
            port,
            cache_max_entries,
            cors_allowed_origin,
        })
    }

    pub fn log_filter(&self) -> &'static str {
        if self.debug {
            "interview_insights=debug,tower_http=debug"
        } else {
            "interview_insights=info,tower_http=info"
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn requires_mongo_uri_and_db() {
        assert_eq!(
            config_from(&[("MONGO_DB", "interviews")]).unwrap_err(),
            ConfigError::Missing("MONGO_URI")
        );
        assert_eq!(
            config_from(&[("MONGO_URI", "mongodb://localhost:27017")]).unwrap_err(),
            ConfigError::Missing("MONGO_DB")
        );
    }

    #[test]
    fn teams_database_falls_back_to_main() {
        let config = config_from(&[
            ("MONGO_URI", "mongodb://localhost:27017"),
            ("MONGO_DB", "interviewSupport"),
        ])
        .unwrap();

        assert_eq!(config.teams_mongo_uri, "mongodb://localhost:27017");
        assert_eq!(config.teams_mongo_db, "interviewSupport");
        assert_eq!(config.port, 5000);
        assert_eq!(config.cache_max_entries, 500);
        assert!(!config.debug);
    }

    #[test]
    fn reads_overrides() {
        let config = config_from(&[
            ("MONGO_URI", "mongodb://main"),
            ("MONGO_DB", "main"),
            ("TEAMS_MONGO_URI", "mongodb://teams"),
            ("TEAMS_MONGO_DB", "teams"),
            ("DEBUG", "true"),
            ("PORT", "8080"),
            ("CACHE_MAX_ENTRIES", "64"),
        ])
        .unwrap();

        assert_eq!(config.teams_mongo_uri, "mongodb://teams");
        assert_eq!(config.teams_mongo_db, "teams");
        assert!(config.debug);
        assert_eq!(config.port, 8080);
        assert_eq!(config.cache_max_entries, 64);
        assert_eq!(config.log_filter(), "interview_insights=debug,tower_http=debug");
    }

    #[test]
    fn rejects_bad_port() {
        let err = config_from(&[
            ("MONGO_URI", "mongodb://main"),
            ("MONGO_DB", "main"),
            ("PORT", "not-a-port"),
        ])
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }
}
