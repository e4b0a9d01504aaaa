use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the HTTP server, the pub/sub broker and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the bind address and where the static page and assets live.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub static_dir: PathBuf,
}

/// Configuration settings for the broker connection.
///
/// `url` selects the backend: `redis://` / `rediss://` for Redis, `memory://`
/// for the in-process hub.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub url: String,
    pub max_active: usize,
    pub idle_timeout_secs: u64,
    /// How long a publish waits for a free pooled connection before the
    /// message is dropped.
    pub publish_wait_ms: u64,
}

impl BrokerSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn publish_wait(&self) -> Duration {
        Duration::from_millis(self.publish_wait_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Any subset of settings may be given. Missing values are filled from defaults.
#[derive(Debug, Default, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialBrokerSettings {
    pub url: Option<String>,
    pub max_active: Option<usize>,
    pub idle_timeout_secs: Option<u64>,
    pub publish_wait_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl PartialSettings {
    /// Fills every missing value from `defaults`.
    pub fn merge(self, defaults: Settings) -> Settings {
        let server = self.server.unwrap_or_default();
        let broker = self.broker.unwrap_or_default();
        let log = self.log.unwrap_or_default();

        Settings {
            server: ServerSettings {
                host: server.host.unwrap_or(defaults.server.host),
                port: server.port.unwrap_or(defaults.server.port),
                static_dir: server.static_dir.unwrap_or(defaults.server.static_dir),
            },
            broker: BrokerSettings {
                url: broker.url.unwrap_or(defaults.broker.url),
                max_active: broker.max_active.unwrap_or(defaults.broker.max_active),
                idle_timeout_secs: broker
                    .idle_timeout_secs
                    .unwrap_or(defaults.broker.idle_timeout_secs),
                publish_wait_ms: broker
                    .publish_wait_ms
                    .unwrap_or(defaults.broker.publish_wait_ms),
            },
            log: LogSettings {
                level: log.level.unwrap_or(defaults.log.level),
            },
        }
    }
}

/// Provides default values for `Settings`.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
                static_dir: PathBuf::from("static"),
            },
            broker: BrokerSettings {
                url: "redis://127.0.0.1:6379".to_string(),
                max_active: 80,
                idle_timeout_secs: 240,
                publish_wait_ms: 1000,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
