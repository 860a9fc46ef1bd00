use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    config::AppConfig,
    cors::OriginPolicy,
    handlers::{get_product, healthcheck, list_products, login, place_order, register, root},
    state::AppState,
};

pub fn build_router(state: AppState, config: &AppConfig) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(healthcheck))
        .route("/api/products", get(list_products))
        .route("/api/products/{id}", get(get_product))
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/order", post(place_order))
        .nest_service("/public", ServeDir::new(&config.public_dir))
        .layer(OriginPolicy::from_config(config).into_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
