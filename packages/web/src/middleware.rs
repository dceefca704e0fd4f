//! Per-node middleware chain.
//!
//! Middleware ordering follows the outer-to-inner convention: the first
//! middleware in a composed chain processes the request first on the way
//! in and the response last on the way out. The registrar composes each
//! node's chain as: global middlewares, then every ancestor's declared
//! list in root-to-node order, each list in declaration order.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Request;
use axum::response::Response;

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// One middleware around a node handler.
#[async_trait]
pub trait PageMiddleware: Send + Sync {
    /// Handles the request, calling `next.run(req)` to continue the chain.
    async fn handle(&self, req: Request, next: Next) -> Response;
}

type Endpoint = Arc<dyn Fn(Request) -> BoxFuture<Response> + Send + Sync>;

/// The remainder of a middleware chain, ending at the node handler.
pub struct Next {
    rest: Vec<Arc<dyn PageMiddleware>>,
    endpoint: Endpoint,
}

impl Next {
    pub(crate) fn new(chain: Vec<Arc<dyn PageMiddleware>>, endpoint: Endpoint) -> Self {
        Self {
            rest: chain,
            endpoint,
        }
    }

    /// Runs the rest of the chain.
    pub async fn run(mut self, req: Request) -> Response {
        if self.rest.is_empty() {
            (self.endpoint)(req).await
        } else {
            let mw = self.rest.remove(0);
            mw.handle(req, self).await
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::response::IntoResponse;
    use http::HeaderValue;

    use super::*;

    /// Appends its tag to a response header, so tests can observe both
    /// the wrapping order and that every middleware ran.
    struct Tag(&'static str);

    #[async_trait]
    impl PageMiddleware for Tag {
        async fn handle(&self, req: Request, next: Next) -> Response {
            let mut resp = next.run(req).await;
            let tagged = match resp.headers().get("x-order") {
                Some(prev) => format!("{},{}", prev.to_str().unwrap_or(""), self.0),
                None => self.0.to_string(),
            };
            resp.headers_mut()
                .insert("x-order", HeaderValue::from_str(&tagged).unwrap());
            resp
        }
    }

    fn endpoint() -> Endpoint {
        Arc::new(|_req| Box::pin(async { "ok".into_response() }))
    }

    #[tokio::test]
    async fn empty_chain_hits_endpoint() {
        let next = Next::new(Vec::new(), endpoint());
        let resp = next
            .run(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await;
        assert_eq!(resp.status(), 200);
    }

    #[tokio::test]
    async fn first_declared_is_outermost() {
        let chain: Vec<Arc<dyn PageMiddleware>> =
            vec![Arc::new(Tag("outer")), Arc::new(Tag("inner"))];
        let next = Next::new(chain, endpoint());
        let resp = next
            .run(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await;
        // Response path runs inner first, so the outermost tag lands last.
        assert_eq!(resp.headers()["x-order"], "inner,outer");
    }
}
