//! Configuration types.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Rule engine limits.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Documents larger than this are rejected instead of parsed.
    pub max_document_bytes: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_document_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Inbox client settings.
#[derive(Debug, Clone)]
pub struct InboxConfig {
    /// Base URL of the message store API (e.g. a MailHog instance).
    pub base_url: String,
    /// Path of the message-listing endpoint, appended to `base_url`.
    pub messages_path: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for InboxConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8025".to_string(),
            messages_path: "/api/v2/messages".to_string(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Monitor configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub inbox: InboxConfig,
    pub audit: AuditConfig,
    /// Poll period while at least one observer is attached.
    pub poll_interval: Duration,
    /// Events buffered per observer before it is considered lagging and dropped.
    pub observer_buffer: usize,
    /// HTTP listen address.
    pub bind_addr: SocketAddr,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            inbox: InboxConfig::default(),
            audit: AuditConfig::default(),
            poll_interval: Duration::from_millis(2000),
            observer_buffer: 64,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
        }
    }
}

impl MonitorConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let base_url = lookup("INBOX_API_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or(defaults.inbox.base_url);
        let messages_path = lookup("INBOX_MESSAGES_PATH").unwrap_or(defaults.inbox.messages_path);

        let request_timeout = parse_var::<u64>(&lookup, "INBOX_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.inbox.request_timeout);

        let poll_interval = parse_var::<u64>(&lookup, "INBOX_POLL_INTERVAL_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);
        if poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "INBOX_POLL_INTERVAL_MS".into(),
                message: "must be greater than zero".into(),
            });
        }

        let observer_buffer = parse_var::<usize>(&lookup, "MONITOR_OBSERVER_BUFFER")?
            .unwrap_or(defaults.observer_buffer);
        if observer_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MONITOR_OBSERVER_BUFFER".into(),
                message: "must be greater than zero".into(),
            });
        }

        let bind_addr =
            parse_var::<SocketAddr>(&lookup, "MONITOR_BIND_ADDR")?.unwrap_or(defaults.bind_addr);

        let max_document_bytes = parse_var::<usize>(&lookup, "AUDIT_MAX_DOCUMENT_BYTES")?
            .unwrap_or(defaults.audit.max_document_bytes);

        Ok(Self {
            inbox: InboxConfig {
                base_url,
                messages_path,
                request_timeout,
            },
            audit: AuditConfig { max_document_bytes },
            poll_interval,
            observer_buffer,
            bind_addr,
        })
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}
