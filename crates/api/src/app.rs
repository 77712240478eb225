use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use domain::services::{LoyaltyService, ServiceConfig};
use persistence::PgLoyaltyStore;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, require_admin, require_auth, trace_id};
use crate::routes::{admin, fidelity, health, loyalty};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub loyalty: Arc<LoyaltyService>,
}

impl AppState {
    pub fn new(config: Config, pool: PgPool) -> Self {
        let store = Arc::new(PgLoyaltyStore::new(pool.clone()));
        let loyalty = LoyaltyService::new(store, ServiceConfig::from(&config.loyalty));
        Self {
            pool,
            config: Arc::new(config),
            loyalty: Arc::new(loyalty),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

pub fn create_app(config: Config, pool: PgPool) -> Router {
    let state = AppState::new(config, pool);
    let config = state.config.clone();

    // Unit-scoped or admin API key; handlers check the unit.
    let protected_routes = Router::new()
        .route(
            "/api/v1/units/:unit_id/fidelity",
            get(fidelity::get_fidelity_config).put(fidelity::update_fidelity_config),
        )
        .route(
            "/api/v1/clients/:client_id/loyalty",
            get(loyalty::get_loyalty_state),
        )
        .route(
            "/api/v1/clients/:client_id/loyalty/visits",
            post(loyalty::record_visit),
        )
        .route(
            "/api/v1/clients/:client_id/loyalty/redemptions",
            post(loyalty::redeem_courtesy),
        )
        .route(
            "/api/v1/clients/:client_id/loyalty/free-cut",
            get(loyalty::predict_free_cut),
        )
        .route(
            "/api/v1/clients/:client_id/loyalty/recalculate",
            post(loyalty::recalculate),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let admin_routes = Router::new()
        .route(
            "/api/v1/admin/units/:unit_id/loyalty/recalculate",
            post(admin::recalculate_unit),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors_layer(&config.security.cors_origins))
        .with_state(state)
}
