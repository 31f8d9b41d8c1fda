//! The handler abstraction invoked by the dispatcher.

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use roster_core::Arguments;
use serde_json::Value;

use super::error::HandlerError;
use crate::session::DataAccess;

/// Business logic behind one route.
///
/// Handlers run inside a transaction opened by the session manager and see
/// only the data-access half of the connection: they can query and execute
/// but cannot commit, roll back, or close it.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn call(&self, db: &mut dyn DataAccess, args: Arguments) -> Result<Value, HandlerError>;

    /// Argument keys that must be present before the transaction opens.
    fn required_arguments(&self) -> &[&'static str] {
        &[]
    }
}

/// Adapts a function or closure into a [`Handler`].
pub struct FnHandler<F> {
    f: F,
}

/// Wraps `f` as a handler.
///
/// Plain `fn` items returning `BoxFuture<'_, ...>` work directly; closures
/// should box an `async move` block.
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: for<'c> Fn(&'c mut dyn DataAccess, Arguments) -> BoxFuture<'c, Result<Value, HandlerError>>
        + Send
        + Sync
        + 'static,
{
    FnHandler { f }
}

#[async_trait]
impl<F> Handler for FnHandler<F>
where
    F: for<'c> Fn(&'c mut dyn DataAccess, Arguments) -> BoxFuture<'c, Result<Value, HandlerError>>
        + Send
        + Sync
        + 'static,
{
    async fn call(&self, db: &mut dyn DataAccess, args: Arguments) -> Result<Value, HandlerError> {
        (self.f)(db, args).await
    }
}

/// A handler with a declared set of required argument keys.
pub struct Requires<H> {
    inner: H,
    required: &'static [&'static str],
}

#[async_trait]
impl<H: Handler> Handler for Requires<H> {
    async fn call(&self, db: &mut dyn DataAccess, args: Arguments) -> Result<Value, HandlerError> {
        self.inner.call(db, args).await
    }

    fn required_arguments(&self) -> &[&'static str] {
        self.required
    }
}

pub trait HandlerExt: Handler + Sized {
    /// Declares argument keys the dispatcher checks before invoking.
    fn requires(self, required: &'static [&'static str]) -> Requires<Self> {
        Requires {
            inner: self,
            required,
        }
    }
}

impl<H: Handler> HandlerExt for H {}
