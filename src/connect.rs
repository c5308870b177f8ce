//! Building a [`Pool`] from [`ConnectionSettings`].

use tracing::{debug, info, warn};

use crate::config::{ConnectionSettings, PoolConfig, QueryExecMode};
use crate::db::Db;
use crate::endpoint::{is_pooled_host, resolve_direct_url};
use crate::error::{NeonPgError, SafeError};
use crate::pool::{Pool, PoolFactory};
use crate::postgres::Bb8Factory;

type Customizer = Box<dyn FnOnce(&mut PoolConfig) + Send>;

/// Connects with optional escape hatches.
///
/// Customizers run after every safety default has been applied, in the
/// order they were added, and may override any of them:
/// ```rust,no_run
/// # async fn demo() -> Result<(), neon_pg::NeonPgError> {
/// use neon_pg::{ConnectionSettings, Connector};
///
/// let pool = Connector::new()
///     .customize(|cfg| cfg.max_size = 4)
///     .connect(ConnectionSettings::from_env()?)
///     .await?;
/// # drop(pool);
/// # Ok(())
/// # }
/// ```
pub struct Connector {
    customizers: Vec<Customizer>,
    factory: Box<dyn PoolFactory>,
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            customizers: Vec::new(),
            factory: Box::new(Bb8Factory),
        }
    }

    /// Append a function that may rewrite the resolved pool configuration.
    #[must_use]
    pub fn customize(mut self, f: impl FnOnce(&mut PoolConfig) + Send + 'static) -> Self {
        self.customizers.push(Box::new(f));
        self
    }

    /// Replace the pool constructor.
    #[must_use]
    pub fn factory(mut self, factory: impl PoolFactory + 'static) -> Self {
        self.factory = Box::new(factory);
        self
    }

    /// Validate settings, build the pool and probe it once.
    ///
    /// # Errors
    /// * [`NeonPgError::MissingConnectionString`] for an empty string.
    /// * [`NeonPgError::InvalidConnectionString`] when it cannot be parsed.
    /// * [`NeonPgError::InsecureTransport`] when negotiation could end up
    ///   unencrypted.
    /// * [`NeonPgError::DirectUrl`] when a pooled string has no derivable
    ///   direct URL.
    /// * [`NeonPgError::PoolConstruction`] and [`NeonPgError::Liveness`]
    ///   wrap the driver's error behind a hostname-only message.
    pub async fn connect(self, settings: ConnectionSettings) -> Result<Pool, NeonPgError> {
        if settings.connection_string.is_empty() {
            return Err(NeonPgError::MissingConnectionString);
        }

        let mut config = PoolConfig::parse(&settings.connection_string)?;
        config.conn.tls.enforce_encrypted()?;

        let host = config.conn.host();
        let pooled = is_pooled_host(&host);
        if pooled || settings.force_pooler_mode {
            config.clamp_for_pooler();
        }
        debug!(
            host = %host,
            pooled,
            forced = settings.force_pooler_mode,
            exec_mode = ?config.conn.exec_mode,
            "query mode selected"
        );

        let direct_url = resolve_direct_url(
            &settings.connection_string,
            settings.direct_url.as_deref(),
            &host,
        )?;

        config.apply_settings(&settings);

        for customize in self.customizers {
            customize(&mut config);
        }
        if config.conn.exec_mode == QueryExecMode::CacheStatement && pooled {
            warn!(host = %host, "customizer re-enabled statement caching on a pooled endpoint");
        }

        let pool = self.factory.build(config).await.map_err(|cause| {
            NeonPgError::PoolConstruction(SafeError::new(
                format!("neon-pg: failed to create pool (host={host})"),
                cause,
            ))
        })?;

        if let Err(err) = pool.ping().await {
            pool.close();
            return Err(NeonPgError::Liveness(SafeError::new(
                format!("neon-pg: initial ping failed (host={host}, is your compute active?)"),
                err,
            )));
        }

        info!(host = %host, "connected");
        Ok(Pool::new(pool, direct_url))
    }
}

/// Connect with the default pool constructor and no customizers.
///
/// # Errors
/// See [`Connector::connect`].
pub async fn connect(settings: ConnectionSettings) -> Result<Pool, NeonPgError> {
    Connector::new().connect(settings).await
}
