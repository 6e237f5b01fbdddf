//! Route registration and dispatcher assembly.
//!
//! [`RouteRegistrar`] validates configured routes one at a time and binds
//! each into an `axum::Router`. Conflicts the router would only detect by
//! panicking (overlapping capture names, a verb bound twice on one pattern)
//! are checked up front so a bad entry disqualifies that entry alone.
//!
//! A trailing catch-all also answers for its bare prefix (`/files/` for
//! `/files/*`) unless an explicit route already holds that method there.
//!
//! Dispatch precedence is the router's: static segments win over `{name}`
//! captures, which win over `{*name}` catch-alls. A known pattern with an
//! unbound method answers `405`, an unknown path answers `404`.
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use axum::{
    Router,
    extract::Request,
    routing::{MethodFilter, MethodRouter, any},
};
use http::Method;
use thiserror::Error;

use crate::{
    adapters::http_handler::RouteHandler,
    config::{
        models::{ApiConfig, GatewayConfig},
        validation::{RouteValidator, ValidationError},
    },
    core::route::{MethodSelector, catch_all_prefix},
    ports::http_client::HttpClient,
};

/// Why a single route entry was not bound.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("pattern '{pattern}' conflicts with a registered route: {reason}")]
    PatternConflict { pattern: String, reason: String },

    #[error("{method} {path} is already registered")]
    DuplicateBinding { method: String, path: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("no APIs registered")]
    NoRoutes,
}

/// A route that was bound into the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredRoute {
    pub path: String,
    pub methods: MethodSelector,
}

/// Methods already bound under one pattern.
#[derive(Debug)]
enum Binding {
    Any,
    Methods(HashSet<Method>),
}

/// The bare prefix of a catch-all route, bound once every explicit route is in.
struct PrefixBinding {
    path: String,
    methods: MethodSelector,
    handler: RouteHandler,
}

pub struct RouteRegistrar {
    client: Arc<dyn HttpClient>,
    router: Router,
    patterns: matchit::Router<()>,
    bindings: HashMap<String, Binding>,
    prefixes: Vec<PrefixBinding>,
    registered: Vec<RegisteredRoute>,
}

impl RouteRegistrar {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self {
            client,
            router: Router::new(),
            patterns: matchit::Router::new(),
            bindings: HashMap::new(),
            prefixes: Vec::new(),
            registered: Vec::new(),
        }
    }

    /// Validate `api` and bind it. On error nothing is bound.
    ///
    /// A pattern ending in a catch-all also claims its bare prefix
    /// (`/files/` for `/files/*`). That binding is made in
    /// [`into_parts`](Self::into_parts) and only for methods no explicit
    /// route holds on the prefix.
    pub fn register(&mut self, api: &ApiConfig) -> Result<&RegisteredRoute, RegistrationError> {
        let route = RouteValidator::validate(api)?;
        self.check_binding(&route.path, &route.methods)?;

        let handler = RouteHandler::new(&route, self.client.clone());
        let method_router = method_router(&route.methods, handler.clone())?;
        self.reserve(&route.path, &route.methods)?;
        self.router = std::mem::take(&mut self.router).route(&route.path, method_router);

        match &route.methods {
            MethodSelector::Any => {
                tracing::info!(pattern = %route.path, "Registering wildcard-API");
            }
            MethodSelector::Methods(methods) => {
                for method in methods {
                    tracing::info!(method = %method, pattern = %route.path, "Registering API");
                }
            }
        }

        if let Some(prefix) = catch_all_prefix(&route.path) {
            self.prefixes.push(PrefixBinding {
                path: prefix.to_string(),
                methods: route.methods.clone(),
                handler,
            });
        }

        self.registered.push(RegisteredRoute {
            path: route.path,
            methods: route.methods,
        });
        Ok(&self.registered[self.registered.len() - 1])
    }

    pub fn registered(&self) -> &[RegisteredRoute] {
        &self.registered
    }

    pub fn into_parts(mut self) -> (Router, Vec<RegisteredRoute>) {
        for prefix in std::mem::take(&mut self.prefixes) {
            self.bind_prefix(prefix);
        }
        (self.router, self.registered)
    }

    /// Bind a catch-all prefix to whatever methods are still free on it.
    fn bind_prefix(&mut self, prefix: PrefixBinding) {
        let methods = match (self.bindings.get(&prefix.path), prefix.methods) {
            (None, methods) => methods,
            (Some(Binding::Any), _) => return,
            // Becomes the fallback behind the explicit verbs.
            (Some(Binding::Methods(_)), MethodSelector::Any) => MethodSelector::Any,
            (Some(Binding::Methods(bound)), MethodSelector::Methods(methods)) => {
                let free: Vec<Method> = methods
                    .into_iter()
                    .filter(|m| !bound.contains(m))
                    .collect();
                if free.is_empty() {
                    return;
                }
                MethodSelector::Methods(free)
            }
        };

        let bound = method_router(&methods, prefix.handler)
            .and_then(|method_router| {
                self.reserve(&prefix.path, &methods)?;
                Ok(method_router)
            });
        match bound {
            Ok(method_router) => {
                tracing::debug!(pattern = %prefix.path, "Registering catch-all prefix");
                self.router = std::mem::take(&mut self.router).route(&prefix.path, method_router);
            }
            Err(e) => {
                tracing::warn!(pattern = %prefix.path, error = %e, "Catch-all prefix not bound");
            }
        }
    }

    fn check_binding(&self, path: &str, methods: &MethodSelector) -> Result<(), RegistrationError> {
        let duplicate = |method: &str| RegistrationError::DuplicateBinding {
            method: method.to_string(),
            path: path.to_string(),
        };

        match (self.bindings.get(path), methods) {
            (None, _) => Ok(()),
            (Some(Binding::Any), MethodSelector::Any) => Err(duplicate("*")),
            (Some(Binding::Any), MethodSelector::Methods(methods)) => {
                Err(duplicate(methods.first().map_or("*", Method::as_str)))
            }
            (Some(Binding::Methods(_)), MethodSelector::Any) => Err(duplicate("*")),
            (Some(Binding::Methods(bound)), MethodSelector::Methods(methods)) => {
                match methods.iter().find(|m| bound.contains(*m)) {
                    Some(m) => Err(duplicate(m.as_str())),
                    None => Ok(()),
                }
            }
        }
    }

    /// Record the pattern and its methods. A pattern seen for the first time
    /// must be insertable alongside every pattern seen so far.
    fn reserve(&mut self, path: &str, methods: &MethodSelector) -> Result<(), RegistrationError> {
        if !self.bindings.contains_key(path) {
            self.patterns
                .insert(path, ())
                .map_err(|e| RegistrationError::PatternConflict {
                    pattern: path.to_string(),
                    reason: e.to_string(),
                })?;
        }

        match methods {
            MethodSelector::Any => {
                self.bindings.insert(path.to_string(), Binding::Any);
            }
            MethodSelector::Methods(methods) => {
                let entry = self
                    .bindings
                    .entry(path.to_string())
                    .or_insert_with(|| Binding::Methods(HashSet::new()));
                if let Binding::Methods(bound) = entry {
                    bound.extend(methods.iter().cloned());
                }
            }
        }
        Ok(())
    }
}

fn method_router(
    methods: &MethodSelector,
    handler: RouteHandler,
) -> Result<MethodRouter, RegistrationError> {
    let endpoint = move |req: Request| {
        let handler = handler.clone();
        async move { handler.handle(req).await }
    };

    match methods {
        MethodSelector::Any => Ok(any(endpoint)),
        MethodSelector::Methods(methods) => {
            let mut filter: Option<MethodFilter> = None;
            for method in methods {
                let next = MethodFilter::try_from(method.clone()).map_err(|_| {
                    ValidationError::InvalidMethod {
                        method: method.to_string(),
                    }
                })?;
                filter = Some(filter.map_or(next, |f| f.or(next)));
            }
            let filter = filter.ok_or(ValidationError::MissingMethod)?;
            Ok(MethodRouter::new().on(filter, endpoint))
        }
    }
}

/// The assembled dispatcher for one configuration.
#[derive(Clone)]
pub struct Gateway {
    router: Router,
    routes: Vec<RegisteredRoute>,
}

impl Gateway {
    /// Register every configured route in order.
    ///
    /// Entries that fail are logged and skipped. Fails only when no entry
    /// could be registered at all.
    pub fn build(config: &GatewayConfig, client: Arc<dyn HttpClient>) -> Result<Self, GatewayError> {
        let mut registrar = RouteRegistrar::new(client);

        for api in &config.apis {
            if let Err(e) = registrar.register(api) {
                tracing::error!(path = %api.input.path, error = %e, "Failed to register API");
            }
        }

        let (router, routes) = registrar.into_parts();
        if routes.is_empty() {
            return Err(GatewayError::NoRoutes);
        }
        Ok(Self { router, routes })
    }

    pub fn routes(&self) -> &[RegisteredRoute] {
        &self.routes
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}
