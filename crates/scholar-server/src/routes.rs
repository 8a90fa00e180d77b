use crate::handlers;
use crate::middleware::auth::{AuthConfig, authenticate};
use crate::middleware::rate_limit::rate_limit_by_user;
use crate::state::AppState;
use axum::{Router, middleware::from_fn_with_state, routing::get};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(state: Arc<AppState>) -> Router {
    let auth = &state.cfg.auth;

    let user_auth = Arc::new(
        AuthConfig::require_auth(Arc::clone(&state.token_maker))
            .with_cookie_name(&auth.cookie_name)
            .with_skip_paths(auth.skip_paths.iter().cloned()),
    );
    let admin_auth = Arc::new(
        AuthConfig::require_roles(Arc::clone(&state.token_maker), ["admin"])
            .with_cookie_name(&auth.cookie_name)
            .with_skip_paths(auth.skip_paths.iter().cloned()),
    );

    let mut user_routes = Router::new().route("/api/me", get(handlers::whoami));
    let mut admin_routes = Router::new().route("/api/admin/me", get(handlers::whoami));

    // Layers run outside-in, so the limiter added first sits inside auth.
    if let Some(limiter) = &state.rate_limiter {
        user_routes =
            user_routes.route_layer(from_fn_with_state(Arc::clone(limiter), rate_limit_by_user));
        admin_routes =
            admin_routes.route_layer(from_fn_with_state(Arc::clone(limiter), rate_limit_by_user));
    }

    let user_routes = user_routes.route_layer(from_fn_with_state(user_auth, authenticate));
    let admin_routes = admin_routes.route_layer(from_fn_with_state(admin_auth, authenticate));

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/auth/public-key", get(handlers::public_key))
        .merge(user_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
