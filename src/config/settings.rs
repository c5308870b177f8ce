use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::NeonPgError;

/// Environment variable holding the primary (usually pooled) connection string.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
/// Environment variable holding the optional direct connection string.
pub const ENV_DATABASE_URL_DIRECT: &str = "DATABASE_URL_DIRECT";

/// Inputs to [`connect`](crate::connect).
///
/// Everything except `connection_string` has a default tuned for serverless
/// compute that scales to zero: a small pool, no warm minimum, and a connect
/// timeout long enough to ride out a cold start. Unset, zero durations and a
/// zero `max_conns` all mean "use the default".
///
/// Settings can be deserialized from any serde format; durations are
/// humantime strings:
/// ```rust
/// # use neon_pg::ConnectionSettings;
/// let settings: ConnectionSettings = serde_json::from_str(r#"{
///     "connection_string": "postgresql://app:pw@ep-x-pooler.us-east-2.aws.neon.tech/db?sslmode=require",
///     "max_conns": 4,
///     "connect_timeout": "20s"
/// }"#).unwrap();
/// assert_eq!(settings.max_conns, 4);
/// ```
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Primary connection string, URL or keyword/value form. TLS is mandatory:
    /// `sslmode=require` or stricter.
    pub connection_string: String,

    /// Connection string for session-level work (migrations, LISTEN/NOTIFY,
    /// advisory locks). When empty and the primary host is a pooled
    /// endpoint, it is derived by stripping the pooler label.
    pub direct_url: Option<String>,

    pub max_conns: u32,
    pub min_conns: u32,

    /// Use the pooler-safe query mode even when the hostname does not look pooled.
    pub force_pooler_mode: bool,

    /// Turn off connection validation. `health_check_period` is then ignored.
    pub health_checks_disabled: bool,

    #[serde(deserialize_with = "humantime_opt")]
    pub health_check_period: Option<Duration>,
    #[serde(deserialize_with = "humantime_opt")]
    pub max_conn_lifetime: Option<Duration>,
    #[serde(deserialize_with = "humantime_opt")]
    pub max_conn_idle_time: Option<Duration>,
    #[serde(deserialize_with = "humantime_opt")]
    pub connect_timeout: Option<Duration>,
}

impl ConnectionSettings {
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            ..Self::default()
        }
    }

    /// Read `DATABASE_URL` and, if present, `DATABASE_URL_DIRECT`.
    ///
    /// # Errors
    /// Returns [`NeonPgError::MissingConnectionString`] when `DATABASE_URL`
    /// is unset or blank.
    pub fn from_env() -> Result<Self, NeonPgError> {
        let connection_string = std::env::var(ENV_DATABASE_URL)
            .map(|v| v.trim().to_string())
            .unwrap_or_default();
        if connection_string.is_empty() {
            return Err(NeonPgError::MissingConnectionString);
        }
        let direct_url = std::env::var(ENV_DATABASE_URL_DIRECT)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Ok(Self {
            connection_string,
            direct_url,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_direct_url(mut self, direct_url: impl Into<String>) -> Self {
        self.direct_url = Some(direct_url.into());
        self
    }

    #[must_use]
    pub fn with_force_pooler_mode(mut self, force: bool) -> Self {
        self.force_pooler_mode = force;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }
}

// Connection strings carry credentials.
impl fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("connection_string", &"<redacted>")
            .field("direct_url", &self.direct_url.as_ref().map(|_| "<redacted>"))
            .field("max_conns", &self.max_conns)
            .field("min_conns", &self.min_conns)
            .field("force_pooler_mode", &self.force_pooler_mode)
            .field("health_checks_disabled", &self.health_checks_disabled)
            .field("health_check_period", &self.health_check_period)
            .field("max_conn_lifetime", &self.max_conn_lifetime)
            .field("max_conn_idle_time", &self.max_conn_idle_time)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

fn humantime_opt<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| humantime::parse_duration(&s).map_err(serde::de::Error::custom))
        .transpose()
}
