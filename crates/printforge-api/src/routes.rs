use crate::{
    admin_handlers, auth, auth_handlers, cart_handlers, catalog_handlers, handlers,
    middleware as mw, queue_handlers, quote_handlers, AppState,
};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn create_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_handler))
        .route("/auth/register", post(auth_handlers::register))
        .route("/auth/login", post(auth_handlers::login))
        .route("/catalog/categories", get(catalog_handlers::list_categories))
        .route("/catalog/products", get(catalog_handlers::list_products))
        .route(
            "/catalog/products/{slug}",
            get(catalog_handlers::get_product),
        )
        .route("/catalog/materials", get(quote_handlers::list_materials))
        // Tracking is deliberately unauthenticated: the code is the secret.
        .route("/track/{code}", get(queue_handlers::track));

    let authed = Router::new()
        .route("/auth/logout", post(auth_handlers::logout))
        .route("/auth/me", get(auth_handlers::me))
        .route("/cart", get(cart_handlers::get_cart))
        .route("/cart/items", post(cart_handlers::add_cart_item))
        .route(
            "/cart/items/{product_id}",
            delete(cart_handlers::remove_cart_item),
        )
        .route("/checkout", post(cart_handlers::checkout))
        .route("/orders", get(cart_handlers::list_orders))
        .route("/quotes", post(quote_handlers::create_quote))
        .route_layer(from_fn_with_state(state.clone(), auth::require_auth));

    let admin = Router::new()
        .route(
            "/catalog/categories",
            post(catalog_handlers::create_category),
        )
        .route(
            "/catalog/categories/{id}",
            put(catalog_handlers::update_category).delete(catalog_handlers::delete_category),
        )
        .route("/catalog/products", post(catalog_handlers::create_product))
        .route(
            "/catalog/products/{id}",
            put(catalog_handlers::update_product).delete(catalog_handlers::delete_product),
        )
        .route("/queue", get(queue_handlers::list_jobs))
        .route("/queue/{id}/cancel", post(queue_handlers::cancel_job))
        .route("/queue/{id}/priority", post(queue_handlers::set_job_priority))
        .route("/dashboard", get(admin_handlers::dashboard))
        .route("/alerts", get(admin_handlers::alert_history))
        .route("/alerts/export", get(admin_handlers::export_alerts))
        .route_layer(from_fn(auth::require_admin))
        .route_layer(from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .merge(public)
        .merge(authed)
        .nest("/admin", admin)
        .with_state(state.clone())
        .layer(from_fn_with_state(state, mw::track_metrics_middleware))
        .layer(from_fn(mw::security_headers_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}
