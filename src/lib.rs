//! http-rewrite - a declarative HTTP gateway.
//!
//! Routes are read from a YAML file. Each route matches a method set and a
//! path pattern and either proxies the request to a backend, optionally
//! rewriting the path and query from `${VAR}` templates, or answers with a
//! fixed status and body.
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use http_rewrite::{Gateway, HttpClientAdapter, config::load_config};
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config = load_config("config.yaml").await?;
//! let gateway = Gateway::build(&config, Arc::new(HttpClientAdapter::new()?))?;
//! let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.listen)).await?;
//! axum::serve(listener, gateway.into_router()).await?;
//! # Ok(()) }
//! ```
//!
//! # Architecture
//! **ports** hold the traits the gateway talks to the outside world through,
//! **adapters** implement them, and **core** holds routing, templating and
//! rewriting with no I/O of its own. Configuration parsing and validation
//! live in **config**.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

pub use crate::{
    adapters::{HttpClientAdapter, RouteHandler},
    core::{Gateway, GatewayError, RegistrationError, RouteRegistrar},
    ports::http_client::HttpClient,
    utils::GracefulShutdown,
};
