//! Top-level server for one process.
//!
//! # Responsibilities
//! - Decide which listeners are enabled from config and registered handlers
//! - Refuse to run without a public listener
//! - Assemble the listeners into one composite, exactly once
//! - Flip health readiness around the composite's lifetime
//!
//! # Data Flow
//! ```text
//! SupervisorBuilder (config, routes, gRPC handlers, extra servers, hooks)
//!     → build(): validate config
//!     → start(): assemble listeners → CompositeServer → set ready → composite.start()
//!     → stop() / graceful_stop(): set not ready → composite.stop() / graceful_stop()
//! ```
//!
//! # Design Decisions
//! - Listener sockets are bound by the composite's start, never during assembly
//! - One async mutex guards the composite slot for all three operations; it
//!   is released before the composite is started or stopped
//! - A stop that arrives before start closes the supervisor; a later start
//!   returns at once

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::sync::Mutex;

use crate::admin::{setup_admin_router, AdminContext};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, PublicRestConfig, ServiceConfig};
use crate::error::{Misconfiguration, Operation, ServerError};
use crate::grpc::{public_grpc_listener, GrpcHandler};
use crate::health::HealthServer;
use crate::http::middleware::{admin_stack, public_stack};
use crate::http::HttpListener;
use crate::lifecycle::composite::{CompositeServer, CompositeState};
use crate::lifecycle::server::ManagedServer;

pub const ADMIN_SERVER_NAME: &str = "admin REST server";
pub const PUBLIC_REST_SERVER_NAME: &str = "public REST server";
pub const PUBLIC_GRPC_SERVER_NAME: &str = "public gRPC server";

/// Request context timeout used when none is configured.
pub const DEFAULT_CONTEXT_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request timeout for the REST listeners.
pub fn effective_context_timeout(config: Option<&PublicRestConfig>) -> Duration {
    match config.map(|c| c.context_timeout_secs) {
        Some(secs) if secs > 0 => Duration::from_secs(secs),
        _ => DEFAULT_CONTEXT_TIMEOUT,
    }
}

/// Routers for the REST listeners.
#[derive(Default)]
pub struct RestHandlers {
    pub public: Option<Router>,
    pub admin: Option<Router>,
}

type ConfigHook = Box<dyn Fn(&ServiceConfig) -> Result<(), String> + Send + Sync>;
type RouterHook = Box<dyn Fn(Router) -> Router + Send + Sync>;

/// Customization points applied while building and assembling.
#[derive(Default)]
pub struct Hooks {
    /// Extra config check run by [`SupervisorBuilder::build`].
    pub validate_config: Option<ConfigHook>,
    /// Applied to the public routes before the standard middleware.
    pub public_middleware: Option<RouterHook>,
}

#[derive(Default)]
struct Parts {
    rest: RestHandlers,
    grpc_handlers: Vec<Arc<dyn GrpcHandler>>,
    extra: Vec<Arc<dyn ManagedServer>>,
}

struct Assembly {
    servers: Vec<Arc<dyn ManagedServer>>,
    health: Option<HealthServer>,
}

struct Assembled {
    composite: Arc<CompositeServer>,
    health: Option<HealthServer>,
}

enum Slot {
    Pending(Box<Parts>),
    Assembled(Assembled),
    Closed,
}

pub struct SupervisorBuilder {
    config: ServiceConfig,
    hooks: Hooks,
    parts: Parts,
}

impl SupervisorBuilder {
    pub fn rest(mut self, handlers: RestHandlers) -> Self {
        self.parts.rest = handlers;
        self
    }

    pub fn public_routes(mut self, router: Router) -> Self {
        self.parts.rest.public = Some(router);
        self
    }

    pub fn admin_routes(mut self, router: Router) -> Self {
        self.parts.rest.admin = Some(router);
        self
    }

    pub fn grpc_handler(mut self, handler: Arc<dyn GrpcHandler>) -> Self {
        self.parts.grpc_handlers.push(handler);
        self
    }

    /// Add a server run alongside the listeners, e.g. a background worker.
    ///
    /// Extra servers never count as public listeners.
    pub fn server(mut self, server: Arc<dyn ManagedServer>) -> Self {
        self.parts.extra.push(server);
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn build(self) -> Result<Supervisor, ConfigError> {
        validate_config(&self.config).map_err(ConfigError::Validation)?;
        if let Some(hook) = &self.hooks.validate_config {
            hook(&self.config).map_err(ConfigError::Rejected)?;
        }

        Ok(Supervisor {
            config: self.config,
            hooks: self.hooks,
            slot: Mutex::new(Slot::Pending(Box::new(self.parts))),
        })
    }
}

/// Runs every enabled listener of a service as one [`ManagedServer`].
pub struct Supervisor {
    config: ServiceConfig,
    hooks: Hooks,
    slot: Mutex<Slot>,
}

impl Supervisor {
    pub fn builder(config: ServiceConfig) -> SupervisorBuilder {
        SupervisorBuilder {
            config,
            hooks: Hooks::default(),
            parts: Parts::default(),
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The health server, once assembled and if enabled.
    pub async fn health(&self) -> Option<HealthServer> {
        match &*self.slot.lock().await {
            Slot::Assembled(assembled) => assembled.health.clone(),
            _ => None,
        }
    }

    /// Names of the assembled servers, in start order.
    pub async fn server_names(&self) -> Vec<String> {
        match &*self.slot.lock().await {
            Slot::Assembled(assembled) => assembled.composite.server_names(),
            _ => Vec::new(),
        }
    }

    /// State of the composite, once assembled.
    pub async fn composite_state(&self) -> Option<CompositeState> {
        match &*self.slot.lock().await {
            Slot::Assembled(assembled) => Some(assembled.composite.state()),
            _ => None,
        }
    }

    async fn assemble(&self, parts: Parts) -> Result<Assembly, Misconfiguration> {
        let config = &self.config;
        let context_timeout = effective_context_timeout(config.public_rest.as_ref());
        let mut grpc_handlers = parts.grpc_handlers;
        let mut servers: Vec<Arc<dyn ManagedServer>> = Vec::new();

        let health = if config.library.health {
            tracing::info!("found health config");
            let health = HealthServer::new().await;
            grpc_handlers.push(Arc::new(health.clone()));
            Some(health)
        } else {
            tracing::info!("no health config was found");
            None
        };

        match &config.admin {
            Some(admin) => {
                tracing::info!(address = %admin.bind_address, "found admin server config");
                let router = setup_admin_router(AdminContext {
                    service_name: config.name.clone(),
                    api_key: admin.api_key.clone(),
                    health: health.clone(),
                    routes: parts.rest.admin,
                });
                servers.push(Arc::new(HttpListener::new(
                    ADMIN_SERVER_NAME,
                    &admin.bind_address,
                    admin_stack(router, context_timeout),
                )));
            }
            None => tracing::info!("no admin server config was found"),
        }

        let mut reachable = false;

        match &config.public_rest {
            Some(rest) => {
                tracing::info!(address = %rest.bind_address, "found public REST server config");
                let routes = parts.rest.public.unwrap_or_else(|| {
                    tracing::info!("no public routes were registered, serving an empty router");
                    Router::new()
                });
                let routes = match &self.hooks.public_middleware {
                    Some(hook) => hook(routes),
                    None => routes,
                };
                servers.push(Arc::new(HttpListener::new(
                    PUBLIC_REST_SERVER_NAME,
                    &rest.bind_address,
                    public_stack(routes, context_timeout),
                )));
                reachable = true;
            }
            None => tracing::info!("no public REST server config was found"),
        }

        match &config.public_grpc {
            Some(grpc) if !grpc_handlers.is_empty() => {
                tracing::info!(
                    address = %grpc.bind_address,
                    handlers = grpc_handlers.len(),
                    "found public gRPC server config"
                );
                servers.push(Arc::new(public_grpc_listener(
                    PUBLIC_GRPC_SERVER_NAME,
                    &grpc.bind_address,
                    &grpc_handlers,
                )));
                reachable = true;
            }
            Some(_) => tracing::info!("found public gRPC server config but no gRPC handlers were registered"),
            None => tracing::info!("no public gRPC server config was found"),
        }

        if !reachable {
            return Err(Misconfiguration);
        }

        servers.extend(parts.extra);
        Ok(Assembly { servers, health })
    }

    async fn shut_down(&self, operation: Operation) -> Result<(), ServerError> {
        let composite = {
            let mut slot = self.slot.lock().await;
            match *slot {
                Slot::Pending(_) => {
                    *slot = Slot::Closed;
                    tracing::debug!(service = %self.config.name, "Stop before start, nothing to stop");
                    return Ok(());
                }
                Slot::Closed => return Ok(()),
                Slot::Assembled(ref assembled) => {
                    if let Some(health) = &assembled.health {
                        health.set_ready(false).await;
                    }
                    Arc::clone(&assembled.composite)
                }
            }
        };

        match operation {
            Operation::GracefulStop => composite.graceful_stop().await,
            _ => composite.stop().await,
        }
    }
}

#[async_trait]
impl ManagedServer for Supervisor {
    /// Assemble the enabled listeners and run them until the first exits.
    ///
    /// # Panics
    ///
    /// Panics if neither public REST nor public gRPC is enabled. No listener
    /// has been started at that point.
    async fn start(&self) -> Result<(), ServerError> {
        let composite = {
            let mut slot = self.slot.lock().await;
            let parts = match std::mem::replace(&mut *slot, Slot::Closed) {
                Slot::Pending(parts) => parts,
                Slot::Assembled(assembled) => {
                    *slot = Slot::Assembled(assembled);
                    return Err(ServerError::AlreadyStarted {
                        name: self.config.name.clone(),
                    });
                }
                Slot::Closed => {
                    tracing::debug!(service = %self.config.name, "Stopped before start, not starting");
                    return Ok(());
                }
            };

            let assembly = match self.assemble(*parts).await {
                Ok(assembly) => assembly,
                Err(err) => {
                    tracing::error!(service = %self.config.name, error = %err, "Fatal misconfiguration");
                    panic!("{err}");
                }
            };

            let span = tracing::info_span!("supervisor", service = %self.config.name);
            let composite = Arc::new(CompositeServer::with_span(assembly.servers, span));
            if let Some(health) = &assembly.health {
                health.set_ready(true).await;
            }
            *slot = Slot::Assembled(Assembled {
                composite: Arc::clone(&composite),
                health: assembly.health,
            });
            composite
        };

        composite.start().await
    }

    async fn stop(&self) -> Result<(), ServerError> {
        self.shut_down(Operation::Stop).await
    }

    async fn graceful_stop(&self) -> Result<(), ServerError> {
        self.shut_down(Operation::GracefulStop).await
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}
