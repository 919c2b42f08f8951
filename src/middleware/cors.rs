//! CORS headers and preflight answers, enabled with `ServerOptions::cors`.

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    HeaderValue,
};
use http::{Method, StatusCode};

use super::{Flow, Middleware};
use crate::config::CorsOptions;
use crate::container::{Dependency, Injectable, ResolveError, Resolver};
use crate::error::Error;
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;

/// Adds `Access-Control-Allow-*` headers to every response and answers
/// `OPTIONS` preflight requests with `204 No Content` without routing them.
pub struct CorsMiddleware {
    options: CorsOptions,
}

impl Injectable for CorsMiddleware {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::provided::<CorsOptions>()]
    }

    fn construct(deps: &Resolver<'_>) -> Result<Self, ResolveError> {
        Ok(CorsMiddleware { options: deps.resolve()? })
    }
}

impl CorsMiddleware {
    fn header(&self, value: &str) -> Result<HeaderValue, Error> {
        HeaderValue::from_str(value)
            .map_err(|_| Error::Config(format!("invalid CORS header value `{value}`")))
    }
}

impl Middleware for CorsMiddleware {
    fn execute<'a>(&'a mut self, request: &'a Request, response: &'a mut Response) -> BoxFuture<'a, Result<Flow, Error>> {
        Box::pin(async move {
            response.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, self.header(&self.options.allow_origin)?);
            response.set_header(ACCESS_CONTROL_ALLOW_METHODS, self.header(&self.options.allow_methods)?);
            response.set_header(ACCESS_CONTROL_ALLOW_HEADERS, self.header(&self.options.allow_headers)?);

            if *request.method() == Method::OPTIONS {
                response.set_status(StatusCode::NO_CONTENT);
                return Ok(Flow::Halt);
            }
            Ok(Flow::Continue)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::Container;
    use crate::middleware::{MiddlewareEntry, run_chain};

    fn container() -> Container {
        let mut container = Container::new();
        container.provide(CorsOptions { enabled: true, ..CorsOptions::default() });
        container.register::<CorsMiddleware>().unwrap();
        container
    }

    fn request(method: Method) -> Request {
        let (parts, ()) = http::Request::builder().method(method).uri("/items").body(()).unwrap().into_parts();
        Request::new(parts, None)
    }

    #[tokio::test]
    async fn decorates_and_continues() {
        let container = container();
        let mut res = Response::new();
        let flow = run_chain(&[MiddlewareEntry::of::<CorsMiddleware>()], &container, &request(Method::GET), &mut res, None)
            .await
            .unwrap();

        assert_eq!(flow, Flow::Continue);
        assert_eq!(res.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(res.headers().contains_key(ACCESS_CONTROL_ALLOW_METHODS));
    }

    #[tokio::test]
    async fn answers_preflight() {
        let container = container();
        let mut res = Response::new();
        let flow = run_chain(&[MiddlewareEntry::of::<CorsMiddleware>()], &container, &request(Method::OPTIONS), &mut res, None)
            .await
            .unwrap();

        assert_eq!(flow, Flow::Halt);
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
    }
}
