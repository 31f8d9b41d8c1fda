//! Roster core: inbound event shapes, route descriptors, argument mapping,
//! response envelopes, and the naming-convention mapper.

pub mod args;
pub mod case;
pub mod event;
pub mod response;
pub mod route;

pub use args::{ArgumentError, Arguments};
pub use event::{BodyError, ClassifyError, DirectEvent, GraphqlEvent, InboundEvent, QueryValue, RestEvent};
pub use response::RestResponse;
pub use route::{PathPattern, PatternError, RouteDescriptor, RouteKind};
