use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crewbot_core::{InMemoryArtifactStore, Planner};
use crewbot_server::agents::{
    HttpTestRunner, PlaceholderFixProducer, ReviewerAgent, SimulatedTestRunner, TestRunner,
};
use crewbot_server::api::app_router;
use crewbot_server::config::Config;
use crewbot_server::orchestrator::{log_outcomes, Agents, OrchestratorSettings};
use crewbot_server::{AppState, GitHubClient, Orchestrator, RecordingLogger, RepositoryHost};

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting crewbot {}", crewbot_server::get_bot_version());

    let config = Config::from_env().context("Failed to load configuration from environment")?;

    if let Some(url) = &config.vector_db_url {
        info!(
            "VECTOR_DB_URL is set ({}); artifacts are kept in process memory",
            url
        );
    }

    let recording_logger = if config.recording_enabled {
        match RecordingLogger::new(PathBuf::from(&config.recording_log_path)) {
            Ok(logger) => {
                info!(
                    "Recording enabled, logging to: {}",
                    config.recording_log_path
                );
                Some(logger)
            }
            Err(e) => {
                error!("Failed to initialize recording logger: {}", e);
                None
            }
        }
    } else {
        None
    };

    let github_client = Arc::new(GitHubClient::new_with_recording(
        config.github_token.clone(),
        config.github_api_url.clone(),
        config.http_timeout,
        recording_logger.clone(),
    )?);

    let test_runner: Arc<dyn TestRunner> = match &config.ci_runner_url {
        Some(url) => {
            info!("Running tests on CI runner at {}", url);
            Arc::new(HttpTestRunner::new(url.clone(), config.http_timeout)?)
        }
        None => {
            info!("Using simulated test runner ({:?} delay)", config.test_delay);
            Arc::new(SimulatedTestRunner::new(config.test_delay))
        }
    };

    let mut settings = OrchestratorSettings::new(config.github_repo.clone());
    settings.base_branch = config.base_branch.clone();
    settings.report_lookup = config.report_lookup;

    let (orchestrator, outcomes) = Orchestrator::new(
        Planner::new(),
        Arc::new(InMemoryArtifactStore::new()),
        github_client.clone() as Arc<dyn RepositoryHost>,
        Agents {
            test_runner,
            fix_producer: Arc::new(PlaceholderFixProducer),
            reviewer: ReviewerAgent::new(),
        },
        settings,
        recording_logger.clone(),
    );

    tokio::spawn(log_outcomes(outcomes));

    let app_state = Arc::new(AppState {
        orchestrator,
        webhook_secret: config.github_webhook_secret.clone(),
        recording_logger,
    });

    if app_state.webhook_secret.is_none() {
        warn!("GITHUB_WEBHOOK_SECRET is not set; webhook signatures are not verified");
    }

    let app = app_router(app_state.clone());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Server listening on {}", config.bind_address());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    drop(app_state);
    match Arc::try_unwrap(github_client) {
        Ok(client) => client.close(),
        Err(_) => warn!("GitHub client still held by running tasks; closing when they finish"),
    }

    Ok(())
}
