use crate::cli::ServeArgs;
use crate::infra::{AppState, BackendGateway};
use crate::routes::{with_tracker_routes, Services};
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use jobdeck::config::AppConfig;
use jobdeck::error::AppError;
use jobdeck::interview::{InterviewDefaults, TavusClient};
use jobdeck::profile::ProfileDirectory;
use jobdeck::search::HttpJobSearchClient;
use jobdeck::telemetry;
use jobdeck::tracker::{ApplicationGateway, TrackerRegistry};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    if config.search.api_key.is_none() {
        warn!("JOB_SEARCH_API_KEY is not set; job search requests will be rejected");
    }
    if config.avatar.api_key.is_none() {
        warn!("TAVUS_API_KEY is not set; interview sessions are unavailable");
    }

    let gateway = Arc::new(BackendGateway::from_config(&config.backend)?);
    let registry = Arc::new(TrackerRegistry::new(Arc::clone(&gateway)));
    spawn_session_sweeper(Arc::clone(&registry), config.sessions.idle_timeout);

    let services = Services {
        registry,
        search: Arc::new(HttpJobSearchClient::from_config(&config.search)?),
        avatar: Arc::new(TavusClient::from_config(&config.avatar)?),
        interview_defaults: InterviewDefaults::from(&config.avatar),
        profiles: Arc::new(ProfileDirectory::new(gateway)),
    };

    let app = with_tracker_routes(services)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "application tracker ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Periodically drops tracker sessions idle for longer than `idle_timeout`.
fn spawn_session_sweeper<G>(registry: Arc<TrackerRegistry<G>>, idle_timeout: Duration)
where
    G: ApplicationGateway + 'static,
{
    let period = (idle_timeout / 4).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let evicted = registry.evict_idle(idle_timeout);
            if evicted > 0 {
                debug!(
                    evicted,
                    remaining = registry.active_sessions(),
                    "idle tracker sessions evicted"
                );
            }
        }
    });
}
