use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use reconciler::{
    DEFAULT_CONFIG_PATH, Reconciler, SmsClient, TicketingClient, delay_until_next, load_config,
    parse_run_at,
};
use storage::{Db, DbConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "reconciler", about = "Tickets open incidents and sends SMS alerts")]
struct Args {
    /// TOML file with schedule, service desk and SMS settings
    #[arg(long, env = "RECONCILER_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run a single cycle now and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let mut config = load_config(&args.config);
    config.apply_env(|key| std::env::var(key).ok());
    let run_at = parse_run_at(&config.schedule.run_at)
        .with_context(|| format!("invalid run_at {:?}, expected HH:MM", config.schedule.run_at))?;

    let db_config = DbConfig::from_env()?;
    let db = Db::connect_or_defer(&db_config).await?;

    let reconciler = Reconciler::new(
        Arc::new(db),
        TicketingClient::new(config.ticketing.clone())?,
        SmsClient::new(config.sms.clone())?,
    );

    if args.once {
        let report = reconciler.run_cycle().await;
        info!(?report, "single cycle done");
        return Ok(());
    }

    info!("reconciler scheduled daily at {run_at}");
    loop {
        let delay = delay_until_next(run_at);
        info!("next cycle in {}s", delay.as_secs());
        tokio::select! {
            _ = tokio::time::sleep(delay) => {
                reconciler.run_cycle().await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                return Ok(());
            }
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
