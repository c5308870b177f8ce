//! Connection settings, connection-string parsing and TLS policy.

pub(crate) mod dsn;
mod pool_config;
mod settings;
pub mod tls;

pub use pool_config::{
    ConnOptions, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HEALTH_CHECK_PERIOD, DEFAULT_MAX_CONN_IDLE_TIME,
    DEFAULT_MAX_CONN_LIFETIME, DEFAULT_MAX_CONNS, DEFAULT_MIN_CONNS,
    DEFAULT_STATEMENT_CACHE_CAPACITY, PoolConfig, QueryExecMode,
};
pub use settings::{ConnectionSettings, ENV_DATABASE_URL, ENV_DATABASE_URL_DIRECT};
pub use tls::{SslMode, TlsError, TlsSettings};
