use axum::http::HeaderValue;
use job_board::board::{Notifier, NotifyError, OutboundEmail};
use job_board::config::ServerConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Keeps every rendered e-mail so the demo can print what would have been sent.
#[derive(Default, Clone)]
pub(crate) struct OutboxNotifier {
    outbox: Arc<Mutex<Vec<OutboundEmail>>>,
}

impl Notifier for OutboxNotifier {
    fn send(&self, email: &OutboundEmail) -> Result<(), NotifyError> {
        let mut guard = self
            .outbox
            .lock()
            .map_err(|_| NotifyError::Transport("outbox lock poisoned".to_string()))?;
        guard.push(email.clone());
        Ok(())
    }
}

impl OutboxNotifier {
    pub(crate) fn drain(&self) -> Vec<OutboundEmail> {
        match self.outbox.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => Vec::new(),
        }
    }
}

/// `*` allows any origin; otherwise a comma separated allow-list.
pub(crate) fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    let raw = server.cors_allow_origin.trim();
    if raw == "*" {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = raw
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring malformed CORS origin");
                None
            }
        })
        .collect();
    base.allow_origin(AllowOrigin::list(origins))
}
