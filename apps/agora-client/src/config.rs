use std::env;
use std::time::Duration;

use url::Url;

use crate::connection::{ConnectionOptions, OfflinePolicy};
use crate::connection::reconnect::ReconnectPolicy;
use crate::error::ClientError;

const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8536/api/v1/ws";
const DEFAULT_SEND_QUEUE_LIMIT: usize = 64;

/// Client configuration, read from `AGORA_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Websocket endpoint of the agora server.
    pub server_url: String,
    pub reconnect_delay_ms: u64,
    pub reconnect_max_attempts: u32,
    /// Reject sends while disconnected instead of queueing them.
    pub reject_offline_sends: bool,
    pub send_queue_limit: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let server_url = env::var("AGORA_SERVER_URL")
            .map(|raw| normalize_server_url(&raw))
            .unwrap_or(defaults.server_url);
        let reconnect_delay_ms = env::var("AGORA_RECONNECT_DELAY_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.reconnect_delay_ms);
        let reconnect_max_attempts = env::var("AGORA_RECONNECT_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.reconnect_max_attempts);
        let reject_offline_sends = env::var("AGORA_OFFLINE_POLICY")
            .map(|v| v.trim().eq_ignore_ascii_case("reject"))
            .unwrap_or(defaults.reject_offline_sends);
        let send_queue_limit = env::var("AGORA_SEND_QUEUE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.send_queue_limit);

        Self {
            server_url,
            reconnect_delay_ms,
            reconnect_max_attempts,
            reject_offline_sends,
            send_queue_limit,
        }
    }

    pub fn websocket_url(&self) -> Result<Url, ClientError> {
        let url = Url::parse(&self.server_url)
            .map_err(|err| ClientError::Config(format!("{}: {err}", self.server_url)))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(ClientError::Config(format!(
                "unsupported scheme {other} in {}",
                self.server_url
            ))),
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            Duration::from_millis(self.reconnect_delay_ms),
            self.reconnect_max_attempts,
        )
    }

    pub fn offline_policy(&self) -> OfflinePolicy {
        if self.reject_offline_sends {
            OfflinePolicy::Reject
        } else {
            OfflinePolicy::Queue {
                limit: self.send_queue_limit,
            }
        }
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions {
            reconnect: self.reconnect_policy(),
            offline: self.offline_policy(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let policy = ReconnectPolicy::default();
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            reconnect_delay_ms: policy.delay.as_millis() as u64,
            reconnect_max_attempts: policy.max_attempts,
            reject_offline_sends: false,
            send_queue_limit: DEFAULT_SEND_QUEUE_LIMIT,
        }
    }
}

/// Adds a scheme when missing (plain ws for loopback hosts, wss otherwise) and
/// maps `localhost` to IPv4 to avoid an IPv6 preference.
pub fn normalize_server_url(raw: &str) -> String {
    let raw = raw.trim();
    let mut url = if raw.starts_with("ws://") || raw.starts_with("wss://") {
        raw.to_string()
    } else if raw.starts_with("http://") {
        raw.replacen("http://", "ws://", 1)
    } else if raw.starts_with("https://") {
        raw.replacen("https://", "wss://", 1)
    } else if raw.starts_with("localhost") || raw.starts_with("127.0.0.1") {
        format!("ws://{raw}")
    } else {
        format!("wss://{raw}")
    };
    if url.contains("//localhost") {
        url = url.replacen("//localhost", "//127.0.0.1", 1);
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{LazyLock, Mutex};

    // Mutex to ensure environment variable tests don't run in parallel
    static ENV_MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

    const VARS: &[&str] = &[
        "AGORA_SERVER_URL",
        "AGORA_RECONNECT_DELAY_MS",
        "AGORA_RECONNECT_MAX_ATTEMPTS",
        "AGORA_OFFLINE_POLICY",
        "AGORA_SEND_QUEUE_LIMIT",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    fn default_config_matches_reconnect_defaults() {
        let config = Config::default();
        assert_eq!(config.server_url, "ws://127.0.0.1:8536/api/v1/ws");
        assert_eq!(config.reconnect_delay_ms, 3000);
        assert_eq!(config.reconnect_max_attempts, 10);
        assert_eq!(config.offline_policy(), OfflinePolicy::Queue { limit: 64 });
    }

    #[test]
    fn from_env_without_vars_uses_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        assert_eq!(Config::from_env(), Config::default());
    }

    #[test]
    fn from_env_reads_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("AGORA_SERVER_URL", "localhost:8536/api/v1/ws");
            env::set_var("AGORA_RECONNECT_DELAY_MS", "250");
            env::set_var("AGORA_RECONNECT_MAX_ATTEMPTS", "3");
            env::set_var("AGORA_OFFLINE_POLICY", "Reject");
        }
        let config = Config::from_env();
        clear_env();

        assert_eq!(config.server_url, "ws://127.0.0.1:8536/api/v1/ws");
        assert_eq!(
            config.reconnect_policy(),
            ReconnectPolicy::new(Duration::from_millis(250), 3)
        );
        assert_eq!(config.offline_policy(), OfflinePolicy::Reject);
    }

    #[test]
    fn unparsable_numbers_fall_back() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear_env();
        unsafe {
            env::set_var("AGORA_RECONNECT_DELAY_MS", "soon");
        }
        let config = Config::from_env();
        clear_env();
        assert_eq!(config.reconnect_delay_ms, 3000);
    }

    #[test]
    fn normalizes_server_urls() {
        assert_eq!(normalize_server_url("example.org/api/v1/ws"), "wss://example.org/api/v1/ws");
        assert_eq!(normalize_server_url("https://example.org/ws"), "wss://example.org/ws");
        assert_eq!(normalize_server_url("ws://localhost:8536/ws"), "ws://127.0.0.1:8536/ws");
    }

    #[test]
    fn rejects_non_websocket_scheme() {
        let config = Config {
            server_url: "ftp://example.org".into(),
            ..Config::default()
        };
        assert!(matches!(config.websocket_url(), Err(ClientError::Config(_))));
    }
}
