use std::future::Future;

use bb8::ManageConnection;
use postgres_native_tls::MakeTlsConnector;
use tracing::{debug, warn};

use super::connection::PgConn;
use crate::config::ConnOptions;

/// bb8 manager for TLS Postgres connections.
pub struct PgManager {
    options: ConnOptions,
    tls: MakeTlsConnector,
}

impl PgManager {
    #[must_use]
    pub fn new(options: ConnOptions, tls: MakeTlsConnector) -> Self {
        Self { options, tls }
    }
}

impl ManageConnection for PgManager {
    type Connection = PgConn;
    type Error = tokio_postgres::Error;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let cfg = self.options.pg.clone();
        let tls = self.tls.clone();
        let host = self.options.host();
        let exec_mode = self.options.exec_mode;
        let cache_capacity = self.options.statement_cache_capacity;
        async move {
            debug!(host = %host, "connect start");
            let (client, connection) = cfg.connect(tls).await?;
            debug!(host = %host, "connect established");
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    warn!(host = %host, error = %e, "connection task ended with error");
                }
            });
            Ok(PgConn::new(client, exec_mode, cache_capacity))
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.validate().await }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.is_closed()
    }
}
