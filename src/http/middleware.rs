//! Explicit request interceptor chain.
//!
//! The gateway composes an ordered list of [`Interceptor`]s in front of a
//! terminal [`Endpoint`]. Each interceptor either answers the request itself
//! or hands it to the rest of the chain through [`Next::run`].
//!
//! ```text
//! Pipeline::execute(request)
//!     → interceptor[0].handle(request, next)
//!         → interceptor[1].handle(request, next)
//!             → endpoint.call(request)
//! ```

use std::sync::Arc;
use async_trait::async_trait;
use axum::{body::Body, http::Request, response::Response};

/// A step in the request pipeline.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn handle(&self, request: Request<Body>, next: Next<'_>) -> Response;
}

/// The terminal handler of a pipeline.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, request: Request<Body>) -> Response;
}

/// The remainder of a pipeline, handed to each interceptor.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Interceptor>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    /// Pass the request to the next interceptor, or to the endpoint.
    pub async fn run(self, request: Request<Body>) -> Response {
        match self.chain.split_first() {
            Some((head, rest)) => {
                let next = Next { chain: rest, endpoint: self.endpoint };
                head.handle(request, next).await
            }
            None => self.endpoint.call(request).await,
        }
    }
}

/// Ordered interceptors in front of one endpoint.
pub struct Pipeline {
    interceptors: Vec<Arc<dyn Interceptor>>,
    endpoint: Arc<dyn Endpoint>,
}

impl Pipeline {
    pub fn new(endpoint: Arc<dyn Endpoint>) -> Self {
        Self {
            interceptors: Vec::new(),
            endpoint,
        }
    }

    /// Append an interceptor; earlier interceptors run first.
    pub fn with(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub async fn execute(&self, request: Request<Body>) -> Response {
        let next = Next {
            chain: &self.interceptors,
            endpoint: self.endpoint.as_ref(),
        };
        next.run(request).await
    }
}
