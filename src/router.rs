use crate::auth;
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::public::health))
        .route(
            "/circles",
            post(handlers::circles::create_circle).get(handlers::circles::list_circles),
        )
        .route("/circles/search", get(handlers::circles::search_circles))
        .route("/circles/trending", get(handlers::circles::trending_circles))
        .route("/circles/:id", get(handlers::circles::get_circle))
        .route(
            "/circles/:id/transactions",
            get(handlers::circles::circle_transactions),
        )
        .route("/trading/buy", post(handlers::trading::buy))
        .route("/trading/sell", post(handlers::trading::sell))
        .route(
            "/trading/balance/:circle_id/:address",
            get(handlers::trading::balance),
        )
        .route("/trading/price/:circle_id", get(handlers::trading::price))
        .route("/trading/quote/:circle_id", get(handlers::trading::quote))
        .route("/transactions/:hash", get(handlers::public::transaction));

    // Reconciliation hooks mutate the projection from chain data; keep them behind the admin token.
    let admin_routes = Router::new()
        .route("/metrics", get(crate::metrics::metrics_handler))
        .route("/circles/:id/link", put(handlers::circles::link_chain_id))
        .route("/circles/:id/sync", put(handlers::circles::sync_circle))
        .route("/circles/:id/stats", post(handlers::circles::refresh_stats))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin_token,
        ));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .with_state(state)
        // All payloads are small JSON.
        .layer(DefaultBodyLimit::max(32 * 1024))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
