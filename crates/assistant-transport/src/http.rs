//! HTTP front end: liveness and metadata routes over the proxied runtime.

use std::sync::Arc;

use assistant_core::ServiceConfig;
use axum::{
    Json, Router,
    extract::{Request, State},
    http::HeaderValue,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    protocol::{HealthStatus, ServiceInfo},
    proxy::RuntimeProxy,
};

const DEV_UI_HTML: &str = include_str!("dev_ui.html");

/// Handler state.
#[derive(Clone)]
pub struct HttpState {
    proxy: Arc<RuntimeProxy>,
    dev_ui: Arc<str>,
}

impl HttpState {
    /// Create handler state.
    #[must_use]
    pub fn new(proxy: RuntimeProxy, app_name: &str) -> Self {
        Self {
            proxy: Arc::new(proxy),
            dev_ui: DEV_UI_HTML.replace("{{APP_NAME}}", &script_string(app_name)).into(),
        }
    }
}

/// Encode `value` as a JavaScript string literal safe inside `<script>`.
fn script_string(value: &str) -> String {
    serde_json::Value::from(value)
        .to_string()
        .replace("</", "<\\/")
}

/// Build the HTTP front end.
///
/// `/health` and `/` are served here; `/dev-ui` too when the web interface
/// is enabled. Every other route is forwarded to the agent runtime.
///
/// # Example
/// ```ignore
/// let proxy = RuntimeProxy::new(&config.runtime_url)?;
/// let app = create_router(&config, proxy);
/// axum::serve(listener, app).await?;
/// ```
#[must_use]
pub fn create_router(config: &ServiceConfig, proxy: RuntimeProxy) -> Router {
    let state = HttpState::new(proxy, &config.app_name);

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/", get(root_handler));

    if config.serve_web_interface {
        router = router
            .route("/dev-ui", get(dev_ui_handler))
            .route("/dev-ui/", get(dev_ui_handler));
    }

    router
        .fallback(proxy_handler)
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy for the configured origins; `*` allows any origin.
#[must_use]
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Skipping invalid CORS origin {origin:?}: {e}");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(allowed))
}

async fn health_handler() -> Json<HealthStatus> {
    Json(HealthStatus::healthy())
}

async fn root_handler() -> Json<ServiceInfo> {
    Json(ServiceInfo::current())
}

async fn dev_ui_handler(State(state): State<HttpState>) -> Html<String> {
    Html(state.dev_ui.to_string())
}

async fn proxy_handler(State(state): State<HttpState>, request: Request) -> Response {
    match state.proxy.forward(request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Proxy error: {e}");
            e.into_response()
        }
    }
}
