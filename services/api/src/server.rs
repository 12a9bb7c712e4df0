use crate::cli::ServeArgs;
use crate::infra::{cors_layer, AppState};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use job_board::board::{BoardSettings, InMemoryStore, JobBoard, LogNotifier, SqliteStore, Store};
use job_board::config::AppConfig;
use job_board::error::AppError;
use job_board::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    match config.storage.database_url.as_deref() {
        Some(url) => {
            let store = SqliteStore::connect(url, config.storage.max_connections).await?;
            info!(max_connections = config.storage.max_connections, "using sqlite storage");
            serve(config, store).await
        }
        None => {
            if config.is_production() {
                warn!("DATABASE_URL is not set; board data lives in memory and is lost on restart");
            }
            serve(config, InMemoryStore::new()).await
        }
    }
}

async fn serve<S: Store + 'static>(config: AppConfig, store: S) -> Result<(), AppError> {
    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let settings = BoardSettings::from_config(&config)?;
    let board = Arc::new(JobBoard::new(Arc::new(store), Arc::new(LogNotifier), settings));
    if let Some(admin) = &config.auth.admin {
        if !board.accounts.ensure_admin(admin).await? {
            info!(email = %admin.email, "administrator account already present");
        }
    }

    let app = with_operational_routes(board)
        .layer(Extension(app_state))
        .layer(prometheus_layer)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.server));

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "job board listening");

    axum::serve(listener, app).await?;
    Ok(())
}
