//! Pipeline composition: wraps the dispatcher in the middleware stack.

use tower::ServiceBuilder;

use super::instrument::{InstrumentLayer, InstrumentService};
use crate::service::dispatch::Dispatcher;

/// The dispatcher wrapped in its middleware stack.
pub type InvocationPipeline = InstrumentService<Dispatcher>;

/// Builds the invocation pipeline around `dispatcher`.
///
/// Only instrumentation sits in front of the dispatcher. The pipeline is
/// cheap to clone, so entry points hand a copy to each request.
#[must_use]
pub fn build_invocation_pipeline(dispatcher: Dispatcher) -> InvocationPipeline {
    let service_name = dispatcher.config().service_name.clone();
    ServiceBuilder::new()
        .layer(InstrumentLayer::new(service_name))
        .service(dispatcher)
}
