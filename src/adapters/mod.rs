pub mod http_client;
pub mod http_handler;
pub mod status_observer;

/// Re-export commonly used types from adapters
pub use http_client::HttpClientAdapter;
pub use http_handler::RouteHandler;
pub use status_observer::{StatusObserver, StatusObserverLayer};
