//! Configuration for the backup reaper.
//!
//! Every setting can be given as a flag or through the environment; flags win.

use std::path::PathBuf;
use std::time::Duration;

use backupuccino_retention::RetentionConfig;
use clap::builder::BoolishValueParser;
use clap::Parser;

use crate::error::ConfigError;

/// Command line and environment surface.
#[derive(Debug, Clone, Parser)]
#[command(name = "backupuccino")]
#[command(author, version, about = "Prune panel server backups on a schedule", long_about = None)]
pub struct Args {
    /// Panel client API base URL (example: https://panel.example.com/api/client).
    #[arg(long, env = "PTERODACTYL_API_URL")]
    pub api_url: String,

    /// Panel client API key.
    #[arg(long, env = "PTERODACTYL_CLIENT_KEY", hide_env_values = true)]
    pub api_key: String,

    /// Successful backups kept per server.
    #[arg(long, env = "MAX_BACKUP_LIMIT", default_value_t = 3)]
    pub max_backup_limit: usize,

    /// Allow locked backups to be pruned by the retention limit.
    #[arg(long, env = "DELETE_LOCKED", value_parser = BoolishValueParser::new())]
    pub delete_locked: bool,

    /// Count locked backups toward the retention limit.
    #[arg(long, env = "USE_LOCKED_BACKUPS", value_parser = BoolishValueParser::new())]
    pub count_locked: bool,

    /// Seconds to sleep between reconciliation cycles.
    #[arg(long, env = "APP_CHECK_INTERVAL", default_value_t = 3600)]
    pub check_interval_secs: u64,

    /// Per-request timeout in seconds.
    #[arg(long, env = "HTTP_TIMEOUT", default_value_t = 10)]
    pub http_timeout_secs: u64,

    /// Attempts per request before giving up.
    #[arg(long, env = "HTTP_RETRY_COUNT", default_value_t = 3)]
    pub http_retry_count: u32,

    /// Seconds to wait between attempts.
    #[arg(long, env = "HTTP_RETRY_DELAY", default_value_t = 3)]
    pub http_retry_delay_secs: u64,

    /// Servers pruned concurrently.
    #[arg(long, env = "MAX_CONCURRENT_SERVERS", default_value_t = 8)]
    pub max_concurrent_servers: usize,

    /// Log file path. Empty disables the file sink.
    #[arg(long, env = "BACKUPUCCINO_LOG_FILE", default_value = "backupuccino.log")]
    pub log_file: String,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    #[arg(long, env = "BACKUPUCCINO_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Run a single cycle and exit.
    #[arg(long, env = "BACKUPUCCINO_RUN_ONCE", value_parser = BoolishValueParser::new())]
    pub once: bool,
}

/// Panel API key. Never printed in full.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Leading characters of the key, enough to tell keys apart in logs.
    pub fn hint(&self) -> String {
        let prefix: String = self.0.chars().take(8).collect();
        format!("{prefix}...")
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey({})", self.hint())
    }
}

/// Request executor settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpConfig {
    /// Per-request timeout.
    pub timeout: Duration,

    /// Total attempts per logical request (at least one).
    pub retry_count: u32,

    /// Delay between attempts.
    pub retry_delay: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retry_count: 3,
            retry_delay: Duration::from_secs(3),
        }
    }
}

/// Validated reaper configuration, immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct Config {
    /// Panel base URL without a trailing slash.
    pub api_url: String,

    pub api_key: ApiKey,

    pub retention: RetentionConfig,

    pub http: HttpConfig,

    /// Sleep between cycles.
    pub check_interval: Duration,

    pub max_concurrent_servers: usize,

    /// Durable log sink, if any.
    pub log_file: Option<PathBuf>,

    pub log_level: String,

    pub once: bool,
}

impl Config {
    /// Parse flags and environment, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        Self::try_from(Args::parse())
    }
}

impl TryFrom<Args> for Config {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let api_url = args.api_url.trim().trim_end_matches('/').to_string();
        if api_url.is_empty() {
            return Err(ConfigError::Missing("api url"));
        }
        if !(api_url.starts_with("http://") || api_url.starts_with("https://")) {
            return Err(ConfigError::InvalidApiUrl(api_url));
        }

        let api_key = args.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(ConfigError::Missing("api key"));
        }

        if args.http_retry_count == 0 {
            return Err(ConfigError::OutOfRange {
                name: "http retry count",
                reason: "must be at least 1",
            });
        }
        if args.max_concurrent_servers == 0 {
            return Err(ConfigError::OutOfRange {
                name: "max concurrent servers",
                reason: "must be at least 1",
            });
        }
        if args.check_interval_secs == 0 {
            return Err(ConfigError::OutOfRange {
                name: "check interval",
                reason: "must be at least 1 second",
            });
        }

        let log_file = match args.log_file.trim() {
            "" => None,
            path => Some(PathBuf::from(path)),
        };

        Ok(Self {
            api_url,
            api_key: ApiKey::new(api_key),
            retention: RetentionConfig {
                max_backup_limit: args.max_backup_limit,
                delete_locked: args.delete_locked,
                count_locked: args.count_locked,
            },
            http: HttpConfig {
                timeout: Duration::from_secs(args.http_timeout_secs),
                retry_count: args.http_retry_count,
                retry_delay: Duration::from_secs(args.http_retry_delay_secs),
            },
            check_interval: Duration::from_secs(args.check_interval_secs),
            max_concurrent_servers: args.max_concurrent_servers,
            log_file,
            log_level: args.log_level,
            once: args.once,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Config, ConfigError> {
        let mut argv = vec![
            "backupuccino",
            "--api-url",
            "https://panel.example.com/api/client/",
            "--api-key",
            "ptlc_0123456789abcdef",
        ];
        argv.extend_from_slice(extra);
        Config::try_from(Args::try_parse_from(argv).unwrap())
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).unwrap();
        assert_eq!(config.api_url, "https://panel.example.com/api/client");
        assert_eq!(config.retention, RetentionConfig::default());
        assert_eq!(config.http, HttpConfig::default());
        assert_eq!(config.check_interval, Duration::from_secs(3600));
        assert_eq!(config.max_concurrent_servers, 8);
        assert_eq!(config.log_file, Some(PathBuf::from("backupuccino.log")));
        assert!(!config.once);
    }

    #[test]
    fn test_overrides() {
        let config = parse(&[
            "--max-backup-limit",
            "0",
            "--delete-locked",
            "--http-retry-count",
            "5",
            "--check-interval-secs",
            "60",
            "--log-file",
            "",
            "--once",
        ])
        .unwrap();
        assert_eq!(config.retention.max_backup_limit, 0);
        assert!(config.retention.delete_locked);
        assert_eq!(config.http.retry_count, 5);
        assert_eq!(config.check_interval, Duration::from_secs(60));
        assert_eq!(config.log_file, None);
        assert!(config.once);
    }

    #[test]
    fn test_rejects_zero_retry_count() {
        let err = parse(&["--http-retry-count", "0"]).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn test_rejects_non_http_url() {
        let args = Args::try_parse_from([
            "backupuccino",
            "--api-url",
            "panel.example.com",
            "--api-key",
            "ptlc_key",
        ])
        .unwrap();
        let err = Config::try_from(args).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidApiUrl(_)));
    }

    #[test]
    fn test_api_key_redacted() {
        let key = ApiKey::new("ptlc_0123456789abcdef");
        assert_eq!(key.hint(), "ptlc_012...");
        assert!(!format!("{key:?}").contains("abcdef"));
    }
}
