use serde::{Deserialize, Serialize};

/// Main configuration structure for Veer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Scoring configuration
    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            scoring: ScoringConfig::default(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".veer/veer.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Scoring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScoringConfig {
    /// Tier label used when no threshold band matches
    #[serde(default = "default_tier_label")]
    pub default_tier_label: String,
}

fn default_tier_label() -> String {
    "C".to_string()
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default_tier_label: default_tier_label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.database.path, ".veer/veer.db");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.scoring.default_tier_label, "C");
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config: Config =
            serde_yaml::from_str("database:\n  path: /tmp/test.db\n").unwrap();
        assert_eq!(config.database.path, "/tmp/test.db");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.logging.format, "pretty");
    }
}
