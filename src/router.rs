//! Radix-tree route matcher.
//!
//! One tree per HTTP method, O(path-length) lookup. The trees store indices
//! into the dispatcher's route table; the routes themselves stay in
//! registration order.

use std::collections::HashMap;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::error::RegistrationError;
use crate::route::Route;

/// Matches a method + path to a registered route.
///
/// Patterns support static segments, `{name}` placeholders and a trailing
/// `{*rest}` catch-all. A static segment beats a placeholder at the same
/// position. Registering the same method + pattern twice, or two patterns
/// the tree cannot tell apart, fails at startup.
#[derive(Default)]
pub(crate) struct Router {
    trees: HashMap<Method, MatchitRouter<usize>>,
}

impl Router {
    /// Builds the trees, joining `prefix` in front of every pattern.
    pub(crate) fn build(routes: &[Route], prefix: &str) -> Result<Self, RegistrationError> {
        let mut router = Self::default();
        for (index, route) in routes.iter().enumerate() {
            let full = join_prefix(prefix, &route.path);
            router
                .trees
                .entry(route.method.clone())
                .or_default()
                .insert(full.clone(), index)
                .map_err(|source| RegistrationError::Route {
                    method: route.method.clone(),
                    path: full,
                    source,
                })?;
        }
        Ok(router)
    }

    /// Returns the route index and the raw placeholder values.
    pub(crate) fn lookup(&self, method: &Method, path: &str) -> Option<(usize, Vec<(String, String)>)> {
        let tree = self.trees.get(method)?;
        let matched = tree.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((*matched.value, params))
    }
}

/// `"/api"` + `"/items"` → `"/api/items"`. An empty prefix leaves the path
/// alone; a missing leading slash on either side is added.
pub(crate) fn join_prefix(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if prefix.is_empty() {
        format!("/{path}")
    } else if prefix.starts_with('/') {
        format!("{prefix}/{path}")
    } else {
        format!("/{prefix}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Injectable, ResolveError, Resolver};
    use crate::error::Error;
    use crate::handler::BoxFuture;
    use crate::route::Call;

    struct Noop;

    impl Injectable for Noop {
        fn construct(_: &Resolver<'_>) -> Result<Self, ResolveError> {
            Ok(Noop)
        }
    }

    impl Noop {
        fn run<'a>(self, _call: Call<'a>) -> BoxFuture<'a, Result<(), Error>> {
            Box::pin(async { Ok(()) })
        }
    }

    fn routes() -> Vec<Route> {
        vec![
            Route::get("/items", Noop::run),
            Route::post("/items", Noop::run),
            Route::get("/items/{id}", Noop::run),
            Route::get("/items/new", Noop::run),
            Route::get("/files/{*rest}", Noop::run),
        ]
    }

    #[test]
    fn static_path_matches_by_method() {
        let router = Router::build(&routes(), "").unwrap();
        assert_eq!(router.lookup(&Method::GET, "/items").map(|m| m.0), Some(0));
        assert_eq!(router.lookup(&Method::POST, "/items").map(|m| m.0), Some(1));
        assert!(router.lookup(&Method::DELETE, "/items").is_none());
        assert!(router.lookup(&Method::GET, "/nope").is_none());
    }

    #[test]
    fn placeholders_are_extracted() {
        let router = Router::build(&routes(), "").unwrap();
        let (index, params) = router.lookup(&Method::GET, "/items/42").unwrap();
        assert_eq!(index, 2);
        assert_eq!(params, vec![("id".to_owned(), "42".to_owned())]);

        let (index, params) = router.lookup(&Method::GET, "/files/a/b.txt").unwrap();
        assert_eq!(index, 4);
        assert_eq!(params, vec![("rest".to_owned(), "a/b.txt".to_owned())]);
    }

    #[test]
    fn static_segment_beats_placeholder() {
        let router = Router::build(&routes(), "").unwrap();
        assert_eq!(router.lookup(&Method::GET, "/items/new").map(|m| m.0), Some(3));
    }

    #[test]
    fn prefix_is_joined() {
        let router = Router::build(&routes(), "/api/").unwrap();
        assert_eq!(router.lookup(&Method::GET, "/api/items").map(|m| m.0), Some(0));
        assert!(router.lookup(&Method::GET, "/items").is_none());
    }

    #[test]
    fn duplicate_route_is_rejected() {
        let routes = vec![Route::get("/items", Noop::run), Route::get("/items", Noop::run)];
        assert!(matches!(
            Router::build(&routes, ""),
            Err(RegistrationError::Route { .. })
        ));
    }

    #[test]
    fn join_prefix_normalises_slashes() {
        assert_eq!(join_prefix("", "/items"), "/items");
        assert_eq!(join_prefix("api", "items"), "/api/items");
        assert_eq!(join_prefix("/api/", "/"), "/api/");
    }
}
