//! Routing and invocation.
//!
//! 1. **Routing** (`router`): descriptors to handlers, with REST path matching
//! 2. **Dispatch** (`dispatch`): classify, resolve, extract arguments, invoke
//!    inside a transaction, format the response
//! 3. **Middleware** (`middleware`): tower layers around the dispatcher
//! 4. **Domain** (`domain`): students, classes, and programs handlers

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod router;

pub use config::{DispatchConfig, RuntimeConfig};
pub use dispatch::{DispatchResponse, Dispatcher, Invocation};
pub use error::{DispatchError, HandlerError};
pub use handler::{handler_fn, FnHandler, Handler, HandlerExt, Requires};
pub use middleware::{build_invocation_pipeline, InstrumentLayer, InvocationPipeline};
pub use router::{GraphqlEndpoint, RestEndpoint, RestMatch, Resolved, RouteManifest, Router};
