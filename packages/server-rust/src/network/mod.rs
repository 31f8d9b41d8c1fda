//! Local HTTP gateway: configuration, middleware, handlers, and lifecycle.

pub mod config;
pub mod handlers;
pub mod lifecycle;
pub mod middleware;
pub mod module;

pub use config::GatewayConfig;
pub use handlers::AppState;
pub use lifecycle::{GatewayLifecycle, InvocationGuard, Phase};
pub use module::GatewayModule;
