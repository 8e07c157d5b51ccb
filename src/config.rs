use chrono::{Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub dbdir: Option<String>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub popularity: PopularityConfig,
    #[serde(default)]
    pub catalog: Vec<CatalogMovie>,
    #[serde(skip)]
    pub debug_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListenConfig {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_port")]
    pub port: String,
    #[serde(default)]
    pub tlscert: Option<String>,
    #[serde(default)]
    pub tlskey: Option<String>,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
            tlscert: None,
            tlskey: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub sqlite: Option<SqliteConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SqliteConfig {
    pub filename: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(alias = "bcryptcost", default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

/// Controls how timestamps are rendered for people, e.g. in purchase history.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct DisplayConfig {
    #[serde(alias = "utcoffset", default)]
    pub utc_offset_minutes: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PopularityConfig {
    #[serde(alias = "topn", default = "default_top_n")]
    pub top_n: usize,
    #[serde(alias = "historylimit", default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for PopularityConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            history_limit: default_history_limit(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogMovie {
    pub name: String,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub description: String,
}

fn default_port() -> String {
    "8000".to_string()
}

fn default_bcrypt_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

fn default_top_n() -> usize {
    5
}

fn default_history_limit() -> usize {
    15
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: ListenConfig::default(),
            dbdir: None,
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            display: DisplayConfig::default(),
            popularity: PopularityConfig::default(),
            catalog: Vec::new(),
            debug_logs: false,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(path.to_string(), e))?;

        Self::parse(path, &content)
    }

    fn parse(path: &str, content: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::ParseError(path.to_string(), e))?;

        if config.popularity.top_n == 0 {
            return Err(ConfigError::Invalid("popularity.top_n must be at least 1".to_string()));
        }
        if !(4..=31).contains(&config.auth.bcrypt_cost) {
            return Err(ConfigError::Invalid("auth.bcrypt_cost must be between 4 and 31".to_string()));
        }

        Ok(config)
    }

    pub fn get_database_path(&self) -> Option<String> {
        if let Some(ref sqlite) = self.database.sqlite {
            return Some(sqlite.filename.clone());
        }

        if let Some(ref dbdir) = self.dbdir {
            let path = PathBuf::from(dbdir).join("moviestore.db");
            return Some(path.to_string_lossy().to_string());
        }

        None
    }

    /// Offset used when formatting dates for display. Out of range values fall back to UTC.
    pub fn display_offset(&self) -> chrono::FixedOffset {
        chrono::FixedOffset::east_opt(self.display.utc_offset_minutes * 60)
            .unwrap_or_else(|| Utc.fix())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(String, std::io::Error),
    #[error("Failed to parse config file {0}: {1}")]
    ParseError(String, serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let config = Config::parse("test.yaml", "{}").unwrap();
        assert_eq!(config.listen.port, "8000");
        assert_eq!(config.popularity.top_n, 5);
        assert_eq!(config.popularity.history_limit, 15);
        assert_eq!(config.display.utc_offset_minutes, 0);
        assert!(config.get_database_path().is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
listen:
  address: 127.0.0.1
  port: "9000"
database:
  sqlite:
    filename: /tmp/store.db
auth:
  bcrypt_cost: 4
display:
  utc_offset_minutes: -300
popularity:
  top_n: 3
catalog:
  - name: Inception
    price: 12
    description: Dreams within dreams.
  - name: Avatar
"#;
        let config = Config::parse("test.yaml", yaml).unwrap();
        assert_eq!(config.listen.address.as_deref(), Some("127.0.0.1"));
        assert_eq!(config.get_database_path().as_deref(), Some("/tmp/store.db"));
        assert_eq!(config.auth.bcrypt_cost, 4);
        assert_eq!(config.popularity.top_n, 3);
        assert_eq!(config.popularity.history_limit, 15);
        assert_eq!(config.catalog.len(), 2);
        assert_eq!(config.catalog[1].price, 0);
        assert_eq!(config.display_offset().local_minus_utc(), -300 * 60);
    }

    #[test]
    fn test_dbdir_fallback() {
        let config = Config::parse("test.yaml", "dbdir: /var/lib/moviestore").unwrap();
        assert_eq!(
            config.get_database_path().as_deref(),
            Some("/var/lib/moviestore/moviestore.db")
        );
    }

    #[test]
    fn test_rejects_zero_top_n() {
        let err = Config::parse("test.yaml", "popularity:\n  top_n: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
