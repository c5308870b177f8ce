mod args;

use std::process::ExitCode;

use clap::Parser;
use neon_pg::{Db, PoolConfig, connect, health_check, is_pooled_host};
use tracing::{Level, error, info};

use crate::args::Args;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_max_level(Level::INFO)
        .init();

    let args = Args::parse();
    let json = args.json;
    let settings = match args.into_settings() {
        Ok(settings) => settings,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let pooled = PoolConfig::parse(&settings.connection_string)
        .map(|cfg| is_pooled_host(&cfg.conn.host()))
        .unwrap_or(false);
    let mode = if pooled || settings.force_pooler_mode {
        "pooler"
    } else {
        "direct"
    };

    let pool = match connect(settings).await {
        Ok(pool) => pool,
        Err(err) => {
            error!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let direct_host = url::Url::parse(pool.direct_url())
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "<keyword/value>".to_string());
    info!(mode, direct_host = %direct_host, "pool ready");

    let code = match health_check(&pool).await {
        Ok(status) => {
            let stats = pool.stats();
            if json {
                let report = serde_json::json!({
                    "health": status,
                    "mode": mode,
                    "direct_host": direct_host,
                    "stats": stats,
                });
                println!("{report}");
            } else {
                info!(
                    status = %status.status,
                    connections = stats.connections,
                    idle = stats.idle_connections,
                    "health check passed"
                );
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    };
    pool.close();
    code
}
