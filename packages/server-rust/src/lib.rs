//! Roster server: event routing and dispatch, transactional database
//! sessions, the students/classes/programs services, and a local HTTP gateway.

pub mod network;
pub mod service;
pub mod session;
pub mod telemetry;

pub use network::{GatewayConfig, GatewayModule};
pub use service::{
    DispatchConfig, DispatchError, Dispatcher, Handler, HandlerError, Router, RuntimeConfig,
};
pub use session::{SessionConfig, SessionError, SessionManager};
