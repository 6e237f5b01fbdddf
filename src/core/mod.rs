pub mod backend;
pub mod gateway;
pub mod mapper;
pub mod rewrite;
pub mod route;
pub mod template;

pub use gateway::{Gateway, GatewayError, RegistrationError, RouteRegistrar};
