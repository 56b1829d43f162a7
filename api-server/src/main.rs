use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use api_server::{AppState, IncidentIngest, ServerConfig, router};
use clap::Parser;
use core_types::ThresholdPolicy;
use storage::{Db, DbConfig, IncidentRecorder};
use telemetry::{EnvDirectory, PublicIpLookup, SysinfoSource};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "api-server", about = "Host telemetry API with threshold incidents")]
struct Args {
    /// Address to listen on
    #[arg(long, env = "API_BIND", default_value = "127.0.0.1:5000")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let args = Args::parse();

    let config = ServerConfig::from_env();
    let db_config = DbConfig::from_env()?;
    info!(db_type = %db_config.db_type, dialect = ?db_config.dialect, "incident store");

    // The API keeps serving when the database is down; saves then fail per
    // request and are reported as saved_to_database = false.
    let db = Db::connect_or_defer(&db_config).await?;

    let directory = Arc::new(EnvDirectory);
    let source = SysinfoSource::new(
        directory.clone(),
        PublicIpLookup::new(config.public_ip_url.clone(), config.public_ip_timeout),
    )
    .with_host_timeout(config.host_read_timeout);
    let policy = ThresholdPolicy::new(config.thresholds);
    info!(thresholds = ?config.thresholds, "critical thresholds");

    let state = AppState {
        ingest: Arc::new(IncidentIngest::new(
            Arc::new(source),
            policy,
            IncidentRecorder::new(Arc::new(db)),
        )),
        directory,
    };

    let listener = TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    info!("api-server listening on http://{}/api/system-info", args.bind);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
