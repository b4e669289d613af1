use std::sync::Arc;

use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{FeatureStore, Result};

pub use auth::{AllowAll, Authenticator, ForwardAuth, StaticAuth};

pub mod auth;
mod handler;

/// Shared by every handler: the open store and the authenticator gating
/// admin mutations. Handlers hold no other state between requests.
#[derive(Clone)]
pub struct AppState {
    pub(crate) store: Arc<FeatureStore>,
    pub(crate) auth: Arc<dyn Authenticator>,
}

/// Build the service router.
pub fn app(store: Arc<FeatureStore>, auth: Arc<dyn Authenticator>) -> Router {
    let state = AppState { store, auth };

    Router::new()
        .route("/", get(handler::home))
        .route("/features", get(handler::scope_features))
        .route("/features/:name", get(handler::check_feature))
        .route("/admin/features", get(handler::admin_features))
        .route("/admin/features/:name", post(handler::set_feature))
        .route("/admin/scopes", get(handler::admin_scopes))
        .route("/admin/scopes/:scope/features", get(handler::scope_features_full))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Echo the request `Origin` and answer OPTIONS preflights with the allowed
/// methods.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Bind and serve until the listener is torn down.
pub async fn serve(
    port: u16,
    store: Arc<FeatureStore>,
    auth: Arc<dyn Authenticator>,
) -> Result<()> {
    let router = app(store, auth);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(addr = %listener.local_addr()?, "flipadelphia listening");
    axum::serve(listener, router).await?;
    Ok(())
}
