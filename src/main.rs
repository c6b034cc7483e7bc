mod api;
mod broadcast;
mod cli;
mod config;
mod correlation;
mod error;
mod ingest;
mod logging;
mod scheduler;
mod stats;

#[cfg(test)]
mod tests;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;

use api::{ApiServer, AppState};
use broadcast::Broadcaster;
use cli::{Cli, Commands, ServeArgs};
use config::ServerConfig;
use correlation::store::{AnalysisStore, MemoryAnalysisStore, MemoryThreatStore, ThreatStore};
use correlation::{CorrelationEngine, CorrelationWindow};
use error::{OtwatchError, Result};
use ingest::{AlarmIngestor, AnalysisIngestor};
use logging::init_logging;
use scheduler::Scheduler;
use stats::StatsService;

fn main() {
    let cli = Cli::parse();

    let log_level = logging::level_from_str(&cli.log_level);
    if let Err(e) = init_logging(log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    match &cli.command {
        Commands::Version => {
            println!("otwatch v{}", env!("CARGO_PKG_VERSION"));
            println!("OT security monitoring backend");
        }
        Commands::Serve(args) => {
            let config = match load_config(&cli, args) {
                Ok(config) => config,
                Err(e) => {
                    log::error!("{}", e);
                    std::process::exit(1);
                }
            };

            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    log::error!("failed to start runtime: {}", e);
                    std::process::exit(1);
                }
            };

            if let Err(e) = runtime.block_on(serve(config)) {
                log::error!("server failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}

fn load_config(cli: &Cli, args: &ServeArgs) -> Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(listen) = &args.listen {
        config.listen_addr = listen.clone();
    }
    Ok(config)
}

async fn serve(config: ServerConfig) -> Result<()> {
    let address: SocketAddr = config.listen_addr.parse().map_err(|e| {
        OtwatchError::ConfigError(format!("invalid listen address '{}': {}", config.listen_addr, e))
    })?;
    let config = Arc::new(config);

    let hub = Arc::new(Broadcaster::new(config.sse.channel_capacity));
    let threats: Arc<dyn ThreatStore> = Arc::new(MemoryThreatStore::new());
    let analyses: Arc<dyn AnalysisStore> = Arc::new(MemoryAnalysisStore::new());

    let engine = Arc::new(CorrelationEngine::new(
        threats.clone(),
        CorrelationWindow::from_secs(config.correlation.window_secs),
    ));
    let alarm_ingestor = Arc::new(AlarmIngestor::new(
        threats.clone(),
        hub.clone(),
        config.index_start,
    ));
    let analysis_ingestor = Arc::new(AnalysisIngestor::new(engine, analyses.clone(), hub.clone()));
    let stats = Arc::new(StatsService::new(
        threats.clone(),
        analyses.clone(),
        hub.clone(),
    ));

    let scheduler = Scheduler::new(
        threats.clone(),
        stats.clone(),
        hub.clone(),
        config.scheduler.refresh_interval(),
        config.scheduler.stats_interval(),
        config.sse.heartbeat_interval(),
    );
    // Detached on purpose: the loops live as long as the runtime
    let _loops = scheduler.start();

    let state = AppState {
        config: config.clone(),
        hub,
        threats,
        analyses,
        alarm_ingestor,
        analysis_ingestor,
        stats,
    };

    ApiServer::new(address).run(state).await
}
