use std::time::Duration;

use clap::Parser;
use neon_pg::{ConnectionSettings, NeonPgError};

#[derive(Parser, Debug)]
#[command(author, version, about = "Connect to a serverless Postgres endpoint and report on the pool")]
pub(crate) struct Args {
    /// Primary connection string. Falls back to DATABASE_URL.
    #[arg(long)]
    pub(crate) url: Option<String>,
    /// Direct connection string. Falls back to DATABASE_URL_DIRECT.
    #[arg(long)]
    pub(crate) direct_url: Option<String>,
    #[arg(long)]
    pub(crate) max_conns: Option<u32>,
    #[arg(long)]
    pub(crate) min_conns: Option<u32>,
    #[arg(long)]
    pub(crate) force_pooler_mode: bool,
    #[arg(long)]
    pub(crate) no_health_checks: bool,
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) connect_timeout: Option<Duration>,
    /// Emit the health status as JSON on stdout.
    #[arg(long)]
    pub(crate) json: bool,
}

impl Args {
    pub(crate) fn into_settings(self) -> Result<ConnectionSettings, NeonPgError> {
        let mut settings = match self.url {
            Some(url) => ConnectionSettings::new(url),
            None => ConnectionSettings::from_env()?,
        };
        if let Some(direct) = self.direct_url {
            settings.direct_url = Some(direct);
        }
        if let Some(max) = self.max_conns {
            settings.max_conns = max;
        }
        if let Some(min) = self.min_conns {
            settings.min_conns = min;
        }
        settings.force_pooler_mode = self.force_pooler_mode;
        settings.health_checks_disabled = self.no_health_checks;
        settings.connect_timeout = self.connect_timeout;
        Ok(settings)
    }
}
