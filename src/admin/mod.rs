//! Admin REST router.
//!
//! ```text
//! /admin/status        built-in status handler   ┐ bearer guard when an
//! /admin/...           user admin routes         ┘ api_key is configured
//! /health/live|ready   health probes (unguarded)
//! ```

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::get_status;
use crate::health::HealthServer;

#[derive(Clone)]
pub struct AdminState {
    pub service_name: Arc<str>,
    pub health: Option<HealthServer>,
}

/// Inputs for the admin router.
pub struct AdminContext {
    pub service_name: String,
    pub api_key: Option<String>,
    pub health: Option<HealthServer>,
    /// User-supplied admin routes, merged under the guard.
    pub routes: Option<Router>,
}

pub fn setup_admin_router(ctx: AdminContext) -> Router {
    let state = AdminState {
        service_name: Arc::from(ctx.service_name),
        health: ctx.health.clone(),
    };

    let mut guarded = Router::new()
        .route("/admin/status", get(get_status))
        .with_state(state);
    if let Some(routes) = ctx.routes {
        guarded = guarded.merge(routes);
    }
    if let Some(key) = ctx.api_key {
        guarded = guarded.layer(middleware::from_fn_with_state(
            Arc::<str>::from(key),
            admin_auth_middleware,
        ));
    }

    match ctx.health {
        Some(health) => guarded.merge(health.http_router()),
        None => guarded,
    }
}
