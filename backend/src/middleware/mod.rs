//! Request middleware chain
//!
//! A [`Middleware`] turns a [`Handler`] into a new handler that wraps it. A
//! [`MiddlewareSet`] is an ordered, immutable list of middlewares; wrapping
//! a handler with a set makes the first element the outermost layer, so it
//! sees the request first and the response last.
//!
//! Routes build their own sets from the named building blocks in
//! [`standard`] and [`crate::auth::authenticator`].

pub mod standard;


pub use standard::{allow_method, json_content, logger, recoverer};

use axum::{extract::Request, response::Response};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use tower::{util::BoxCloneService, Layer, Service};

/// Type-erased request handler
pub type Handler = BoxCloneService<Request, Response, Infallible>;

type WrapFn = dyn Fn(Handler) -> Handler + Send + Sync;

/// Named handler wrapper
#[derive(Clone)]
pub struct Middleware {
    name: &'static str,
    wrap: Arc<WrapFn>,
}

impl Middleware {
    /// Create a middleware from a wrapping function
    pub fn new<F>(name: &'static str, wrap: F) -> Self
    where
        F: Fn(Handler) -> Handler + Send + Sync + 'static,
    {
        Self {
            name,
            wrap: Arc::new(wrap),
        }
    }

    /// Create a middleware from a tower layer, e.g. `axum::middleware::from_fn`
    pub fn from_layer<L>(name: &'static str, layer: L) -> Self
    where
        L: Layer<Handler> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        Self::new(name, move |inner| BoxCloneService::new(layer.layer(inner)))
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Wrap a handler
    pub fn wrap(&self, handler: Handler) -> Handler {
        (self.wrap)(handler)
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Middleware").field(&self.name).finish()
    }
}

/// Ordered middleware sequence, outermost first
///
/// Sets never change after construction; [`MiddlewareSet::with`] returns an
/// extended copy and leaves the original untouched.
#[derive(Clone, Debug)]
pub struct MiddlewareSet {
    middlewares: Arc<[Middleware]>,
}

impl Default for MiddlewareSet {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl MiddlewareSet {
    pub fn new(middlewares: impl IntoIterator<Item = Middleware>) -> Self {
        Self {
            middlewares: middlewares.into_iter().collect(),
        }
    }

    /// A new set with `middleware` appended as the innermost layer
    pub fn with(&self, middleware: Middleware) -> Self {
        Self::new(self.middlewares.iter().cloned().chain(std::iter::once(middleware)))
    }

    /// Middleware names, outermost first
    pub fn names(&self) -> Vec<&'static str> {
        self.middlewares.iter().map(Middleware::name).collect()
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Wrap a handler with every middleware in the set
    pub fn wrap(&self, handler: Handler) -> Handler {
        self.middlewares
            .iter()
            .rev()
            .fold(handler, |inner, middleware| middleware.wrap(inner))
    }

    /// Wrap an axum handler function, binding its state
    pub fn wrap_handler<H, T, S>(&self, handler: H, state: S) -> Handler
    where
        H: axum::handler::Handler<T, S>,
        T: 'static,
        S: Clone + Send + Sync + 'static,
    {
        self.wrap(BoxCloneService::new(handler.with_state(state)))
    }
}
