//! Declarative endpoint registry: immutable route descriptors built once at
//! wiring time and mounted onto the Axum routing tree. The descriptor table
//! is the contract between the dispatch core and the business handlers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, Request};
use axum::http::Method;
use axum::routing::{on, MethodFilter};
use axum::Router;

use crate::auth::AuthPredicate;
use crate::dispatch::context::RequestContext;
use crate::dispatch::render::Reply;
use crate::error::ApiError;
use crate::params::ParamSchema;
use crate::state::AppState;

pub type HandlerFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Reply, ApiError>> + Send + 'a>>;

/// The seam between core and business logic: a plain async fn over the
/// request context and shared state. Wrap with [`crate::handler!`].
pub type HandlerFn = for<'a> fn(&'a mut RequestContext, &'a AppState) -> HandlerFuture<'a>;

/// Adapt a plain `async fn(&mut RequestContext, &AppState) -> Result<Reply, ApiError>`
/// to the boxed [`HandlerFn`] seam.
#[macro_export]
macro_rules! handler {
    ($f:path) => {{
        fn call<'a>(
            ctx: &'a mut $crate::dispatch::context::RequestContext,
            state: &'a $crate::state::AppState,
        ) -> $crate::dispatch::registry::HandlerFuture<'a> {
            Box::pin($f(ctx, state))
        }
        call as $crate::dispatch::registry::HandlerFn
    }};
}

/// Immutable route descriptor: created at wiring, shared read-only across
/// all requests matching the route.
pub struct Endpoint {
    pub method: Method,
    pub path: &'static str,
    pub handler: HandlerFn,
    /// `None` means public: every request reaches the handler.
    pub auth: Option<AuthPredicate>,
    /// `None` means decoding is skipped and the body is never read.
    pub params: Option<ParamSchema>,
}

impl Endpoint {
    pub fn new(method: Method, path: &'static str, handler: HandlerFn) -> Self {
        Self {
            method,
            path,
            handler,
            auth: None,
            params: None,
        }
    }

    pub fn auth(mut self, predicate: AuthPredicate) -> Self {
        self.auth = Some(predicate);
        self
    }

    pub fn params(mut self, schema: ParamSchema) -> Self {
        self.params = Some(schema);
        self
    }
}

/// Mount the endpoint table onto a router. Every matched request enters
/// [`super::dispatch`] with its descriptor and the shared state.
pub fn mount(endpoints: Vec<Endpoint>, state: AppState) -> Router {
    let mut router = Router::new();

    for endpoint in endpoints {
        let path = endpoint.path;
        // The endpoint table is static; a bogus method is a wiring bug.
        let filter = MethodFilter::try_from(endpoint.method.clone())
            .expect("unsupported HTTP method in endpoint table");

        let endpoint = Arc::new(endpoint);
        let state = state.clone();
        let entry = move |req: Request| {
            let endpoint = Arc::clone(&endpoint);
            let state = state.clone();
            async move { super::dispatch(endpoint, state, req).await }
        };

        router = router.route(path, on(filter, entry));
    }

    // The decode phase enforces its own in-memory cap and spills oversized
    // upload parts to disk; the framework's default body limit would reject
    // those requests before decoding ever ran.
    router.layer(DefaultBodyLimit::disable())
}
