//! HTTP surface of the exporter.
//!
//! Serves the LSF metrics, the exporter's own metrics, a health probe and a
//! landing page. Binding defaults to dual-stack `[::]` and falls back to
//! `0.0.0.0` when IPv6 is unavailable.

mod process;
mod stats;

pub use process::ProcessMetrics;
pub use stats::{HttpStats, register_build_info};

use crate::collectors::Collector;
use crate::collectors::config::CollectorConfig;
use crate::collectors::error::CollectorError;
use crate::collectors::registry::CollectorRegistry;
use crate::collectors::scrape::LsfCollector;
use crate::collectors::util::register_fallback_metrics;
use anyhow::{Context, Result};
use axum::{
    Router,
    extract::{RawQuery, State},
    http::{HeaderValue, Request, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::get,
};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, Registry, TextEncoder};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, info_span, warn};

/// Query parameter selecting collectors for one scrape; repeatable.
const COLLECT_PARAM: &str = "collect[]";

/// Everything the HTTP layer needs besides the listen address.
#[derive(Clone)]
pub struct ExporterSettings {
    pub telemetry_path: String,
    pub disable_exporter_metrics: bool,
    /// Concurrent metrics requests allowed; `0` disables the limit.
    pub max_requests: usize,
    pub registry: CollectorRegistry,
    pub config: CollectorConfig,
}

impl ExporterSettings {
    #[must_use]
    pub fn new(registry: CollectorRegistry, config: CollectorConfig) -> Self {
        Self {
            telemetry_path: "/metrics".to_string(),
            disable_exporter_metrics: false,
            max_requests: 40,
            registry,
            config,
        }
    }

    #[must_use]
    pub fn with_telemetry_path(mut self, path: impl Into<String>) -> Self {
        self.telemetry_path = path.into();
        self
    }

    #[must_use]
    pub const fn with_exporter_metrics(mut self, enabled: bool) -> Self {
        self.disable_exporter_metrics = !enabled;
        self
    }

    #[must_use]
    pub const fn with_max_requests(mut self, max_requests: usize) -> Self {
        self.max_requests = max_requests;
        self
    }
}

struct AppState {
    registry: CollectorRegistry,
    instances: HashMap<&'static str, Arc<dyn Collector>>,
    default_scrape: LsfCollector,
    own_metrics: Registry,
    process: Option<ProcessMetrics>,
    stats: Option<HttpStats>,
    limiter: Option<Semaphore>,
    telemetry_path: String,
}

impl AppState {
    fn new(settings: ExporterSettings) -> Result<Self> {
        let mut instances = HashMap::new();
        for registration in settings.registry.registrations() {
            let collector = (registration.factory)(&settings.config)
                .with_context(|| format!("failed to build collector {}", registration.name))?;
            instances.insert(registration.name, collector);
        }

        let default_scrape = LsfCollector::new(
            settings
                .registry
                .resolve(&[])?
                .into_iter()
                .filter_map(|r| instances.get(r.name).cloned())
                .collect(),
        );

        let own_metrics = Registry::new();
        register_fallback_metrics(&own_metrics)?;
        register_build_info(&own_metrics)?;

        let (process, stats) = if settings.disable_exporter_metrics {
            (None, None)
        } else {
            let process = ProcessMetrics::new();
            process.register(&own_metrics)?;
            let stats = HttpStats::new();
            stats.register(&own_metrics)?;
            (Some(process), Some(stats))
        };

        Ok(Self {
            registry: settings.registry,
            instances,
            default_scrape,
            own_metrics,
            process,
            stats,
            limiter: (settings.max_requests > 0).then(|| Semaphore::new(settings.max_requests)),
            telemetry_path: settings.telemetry_path,
        })
    }

    /// Domain families for the selected collectors followed by the
    /// exporter's own families.
    async fn gather(&self, filters: &[String]) -> Result<Vec<MetricFamily>, CollectorError> {
        let mut families = if filters.is_empty() {
            self.default_scrape.gather().await?
        } else {
            let collectors = self
                .registry
                .resolve(filters)?
                .into_iter()
                .filter_map(|r| self.instances.get(r.name).cloned())
                .collect();
            LsfCollector::new(collectors).gather().await?
        };

        if let Some(process) = &self.process {
            process.update();
        }
        families.extend(self.own_metrics.gather());

        Ok(families)
    }

    fn record(&self, code: StatusCode) {
        if let Some(stats) = &self.stats {
            stats.record(code.as_u16());
        }
    }
}

#[derive(Clone, Copy, Default)]
struct MakeRequestUlid;

impl MakeRequestId for MakeRequestUlid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&ulid::Ulid::new().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Values of every `collect[]` parameter, in order; blank values are ignored.
#[must_use]
pub fn collect_filters(query: Option<&str>) -> Vec<String> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .filter(|(key, value)| key == COLLECT_PARAM && !value.trim().is_empty())
                .map(|(_, value)| value.trim().to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn text(code: StatusCode, body: impl Into<String>) -> Response {
    (code, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body.into()).into_response()
}

async fn metrics_handler(State(state): State<Arc<AppState>>, RawQuery(query): RawQuery) -> Response {
    let _permit = match state.limiter.as_ref().map(Semaphore::try_acquire) {
        Some(Err(_)) => {
            warn!("too many concurrent metrics requests");
            state.record(StatusCode::SERVICE_UNAVAILABLE);
            return text(StatusCode::SERVICE_UNAVAILABLE, "too many concurrent requests\n");
        }
        Some(Ok(permit)) => Some(permit),
        None => None,
    };

    let _timer = state.stats.as_ref().map(HttpStats::start_scrape);
    let filters = collect_filters(query.as_deref());
    debug!(?filters, "scrape requested");

    let families = match state.gather(&filters).await {
        Ok(families) => families,
        Err(CollectorError::UnknownCollector(name)) => {
            warn!(collector = %name, "scrape requested an unknown collector");
            state.record(StatusCode::BAD_REQUEST);
            return text(StatusCode::BAD_REQUEST, format!("unknown collector: {name}\n"));
        }
        Err(e) => {
            error!(error = %e, "failed to gather metrics");
            state.record(StatusCode::INTERNAL_SERVER_ERROR);
            return text(StatusCode::INTERNAL_SERVER_ERROR, format!("failed to gather metrics: {e}\n"));
        }
    };

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&families, &mut buffer) {
        error!(error = %e, "failed to encode metrics");
        state.record(StatusCode::INTERNAL_SERVER_ERROR);
        return text(StatusCode::INTERNAL_SERVER_ERROR, format!("failed to encode metrics: {e}\n"));
    }

    state.record(StatusCode::OK);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response()
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn landing_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>LSF Exporter</title></head>\n<body>\n<h1>LSF Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n<p>Version {version}</p>\n</body>\n</html>\n",
        path = state.telemetry_path,
        version = crate::built_info::PKG_VERSION,
    ))
}

/// Build the application router.
///
/// # Errors
///
/// Returns an error if a collector cannot be built or the exporter's own
/// metrics cannot be registered.
pub fn router(settings: ExporterSettings) -> Result<Router> {
    let state = Arc::new(AppState::new(settings)?);

    let mut app = Router::new()
        .route(&state.telemetry_path, get(metrics_handler))
        .route("/health", get(health_handler));

    if state.telemetry_path != "/" {
        app = app.route("/", get(landing_handler));
    }

    let layers = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUlid))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
            let request_id = request
                .headers()
                .get("x-request-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default();
            info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                request_id,
                otel.kind = "server"
            )
        }))
        .layer(PropagateRequestIdLayer::x_request_id());

    Ok(app.layer(layers).with_state(state))
}

/// Bind `port` on `listen`, or on `[::]` then `0.0.0.0` when unset.
///
/// # Errors
///
/// Returns an error if the address is not an IP or the port cannot be bound.
pub async fn bind(port: u16, listen: Option<&str>) -> Result<TcpListener> {
    if let Some(addr) = listen {
        let ip: IpAddr = addr
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse()
            .with_context(|| format!("invalid listen address: {addr}"))?;
        return TcpListener::bind(SocketAddr::new(ip, port))
            .await
            .with_context(|| format!("failed to bind {ip}:{port}"));
    }

    match TcpListener::bind(SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port)).await {
        Ok(listener) => Ok(listener),
        Err(e) => {
            debug!(error = %e, "IPv6 bind failed, falling back to IPv4");
            TcpListener::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
                .await
                .with_context(|| format!("failed to bind 0.0.0.0:{port}"))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}

/// Start the exporter and serve until SIGINT or SIGTERM.
///
/// # Errors
///
/// Returns an error if the router cannot be built, the port cannot be bound
/// or the server fails.
pub async fn new(port: u16, listen: Option<String>, settings: ExporterSettings) -> Result<()> {
    let app = router(settings)?;
    let listener = bind(port, listen.as_deref()).await?;

    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("exporter stopped");
    Ok(())
}
