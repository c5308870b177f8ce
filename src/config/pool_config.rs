use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tokio_postgres::config::Host;

use super::dsn::split_tls_params;
use super::settings::ConnectionSettings;
use super::tls::{SslMode, TlsSettings};
use crate::error::NeonPgError;

pub const DEFAULT_MAX_CONNS: u32 = 10;
pub const DEFAULT_MIN_CONNS: u32 = 0;
pub const DEFAULT_HEALTH_CHECK_PERIOD: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_CONN_LIFETIME: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_MAX_CONN_IDLE_TIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_STATEMENT_CACHE_CAPACITY: usize = 512;

/// How statements are sent to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryExecMode {
    /// Prepare named statements and cache them per connection.
    #[default]
    CacheStatement,
    /// Never leave named statements on the server: each statement is one
    /// unnamed parse/bind/execute round trip, with parameter types taken
    /// from the argument values. Safe behind a transaction-mode pooler.
    Simple,
}

/// Per-connection options.
#[derive(Debug, Clone)]
pub struct ConnOptions {
    pub pg: tokio_postgres::Config,
    pub tls: TlsSettings,
    pub exec_mode: QueryExecMode,
    pub statement_cache_capacity: usize,
}

impl ConnOptions {
    /// First configured host, as used for endpoint classification and in
    /// log-safe error messages. Unix socket paths are rendered as text.
    #[must_use]
    pub fn host(&self) -> String {
        match self.pg.get_hosts().first() {
            Some(Host::Tcp(host)) => host.clone(),
            #[cfg(unix)]
            Some(Host::Unix(path)) => path.display().to_string(),
            None => String::new(),
        }
    }
}

/// The fully resolved pool configuration handed to customizers and then to
/// the [`PoolFactory`](crate::PoolFactory).
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub conn: ConnOptions,
    pub max_size: u32,
    pub min_idle: u32,
    /// How often bb8's reaper runs. The reaper only drops connections past
    /// `max_lifetime` or `max_idle_time`; it never tests them. Liveness is
    /// checked with `SELECT 1` when a connection is checked out, and only
    /// while this is `Some`. `None` turns that check off.
    pub health_check_period: Option<Duration>,
    pub max_lifetime: Duration,
    pub max_idle_time: Duration,
}

impl PoolConfig {
    /// Parse a connection string into a configuration carrying driver defaults.
    ///
    /// # Errors
    /// Returns [`NeonPgError::InvalidConnectionString`] for anything that
    /// cannot be parsed. The error never carries the input or the
    /// underlying parser's message, which may echo it.
    pub fn parse(connection_string: &str) -> Result<Self, NeonPgError> {
        let split =
            split_tls_params(connection_string).map_err(|_| NeonPgError::InvalidConnectionString)?;

        let mode = match split.sslmode.as_deref() {
            Some(raw) => SslMode::from_str(raw).map_err(|_| NeonPgError::InvalidConnectionString)?,
            None => SslMode::default(),
        };
        let tls = TlsSettings {
            mode,
            root_cert: split.sslrootcert.map(PathBuf::from),
        };

        let mut pg = tokio_postgres::Config::from_str(&split.rest)
            .map_err(|_| NeonPgError::InvalidConnectionString)?;
        if pg.get_hosts().is_empty() {
            return Err(NeonPgError::InvalidConnectionString);
        }
        pg.ssl_mode(tls.driver_mode());

        Ok(Self {
            conn: ConnOptions {
                pg,
                tls,
                exec_mode: QueryExecMode::CacheStatement,
                statement_cache_capacity: DEFAULT_STATEMENT_CACHE_CAPACITY,
            },
            max_size: DEFAULT_MAX_CONNS,
            min_idle: DEFAULT_MIN_CONNS,
            health_check_period: Some(DEFAULT_HEALTH_CHECK_PERIOD),
            max_lifetime: DEFAULT_MAX_CONN_LIFETIME,
            max_idle_time: DEFAULT_MAX_CONN_IDLE_TIME,
        })
    }

    /// Switch to the pooler-safe query mode and drop statement caching.
    pub fn clamp_for_pooler(&mut self) {
        self.conn.exec_mode = QueryExecMode::Simple;
        self.conn.statement_cache_capacity = 0;
    }

    /// Apply sizing and lifecycle settings, falling back to defaults for
    /// anything unset or zero.
    pub fn apply_settings(&mut self, settings: &ConnectionSettings) {
        self.max_size = match settings.max_conns {
            0 => DEFAULT_MAX_CONNS,
            n => n,
        };
        self.min_idle = settings.min_conns;

        self.health_check_period = if settings.health_checks_disabled {
            None
        } else {
            Some(positive_or(settings.health_check_period, DEFAULT_HEALTH_CHECK_PERIOD))
        };
        self.max_lifetime = positive_or(settings.max_conn_lifetime, DEFAULT_MAX_CONN_LIFETIME);
        self.max_idle_time = positive_or(settings.max_conn_idle_time, DEFAULT_MAX_CONN_IDLE_TIME);
        self.conn
            .pg
            .connect_timeout(positive_or(settings.connect_timeout, DEFAULT_CONNECT_TIMEOUT));
    }

    /// The connect timeout the driver will use.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        self.conn
            .pg
            .get_connect_timeout()
            .copied()
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT)
    }
}

fn positive_or(value: Option<Duration>, default: Duration) -> Duration {
    value.filter(|d| !d.is_zero()).unwrap_or(default)
}
