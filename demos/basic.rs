//! Minimal kiwi example: a small in-memory user service.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/api/users/42
//!   curl 'http://localhost:3000/api/users?role=admin&active'
//!   curl -X POST http://localhost:3000/api/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X DELETE http://localhost:3000/api/users/42 -H 'x-role: admin'
//!   curl http://localhost:3000/api/docs

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use http::StatusCode;
use http::header::{HeaderValue, LOCATION};
use kiwi::{
    AuthDecision, BoxFuture, Call, CorsOptions, Dependency, Error, Injectable, MetadataStore, Param,
    Request, ResolveError, Resolver, Route, Server, ServerOptions,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Shared id sequence. Provided once, cloned into every handler instance.
#[derive(Clone, Default)]
struct Ids(Arc<AtomicU64>);

#[derive(Deserialize)]
struct NewUser {
    name: String,
}

#[derive(Serialize)]
struct User {
    id: String,
    name: String,
}

struct Users {
    ids: Ids,
}

impl Injectable for Users {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::provided::<Ids>()]
    }

    fn construct(deps: &Resolver<'_>) -> Result<Self, ResolveError> {
        Ok(Users { ids: deps.resolve()? })
    }
}

impl Users {
    // GET /users/{id}
    fn find<'a>(self, call: Call<'a>) -> BoxFuture<'a, Result<User, Error>> {
        Box::pin(async move {
            let id = call.args.str(0).unwrap_or("unknown").to_owned();
            Ok(User { id, name: "alice".into() })
        })
    }

    // GET /users?role=...  (the whole query string arrives as one object)
    fn search<'a>(self, call: Call<'a>) -> BoxFuture<'a, Result<Value, Error>> {
        Box::pin(async move {
            let filters = call.args.get(0).cloned().unwrap_or(Value::Null);
            Ok(json!({ "filters": filters, "users": [] }))
        })
    }

    // POST /users → 201 with a Location header
    fn create<'a>(self, mut call: Call<'a>) -> BoxFuture<'a, Result<User, Error>> {
        Box::pin(async move {
            let input: NewUser = call.args.take(0)?;
            let id = self.ids.0.fetch_add(1, Ordering::Relaxed).to_string();

            call.response.set_status(StatusCode::CREATED);
            if let Ok(location) = HeaderValue::from_str(&format!("/api/users/{id}")) {
                call.response.set_header(LOCATION, location);
            }
            Ok(User { id, name: input.name })
        })
    }

    // DELETE /users/{id}, admins only
    fn remove<'a>(self, call: Call<'a>) -> BoxFuture<'a, Result<Value, Error>> {
        Box::pin(async move {
            call.response.set_status(StatusCode::ACCEPTED);
            Ok(json!({ "deleted": call.args.str(0) }))
        })
    }
}

fn by_role(req: &Request, roles: &[String]) -> AuthDecision {
    match req.header("x-role") {
        Some(role) if roles.iter().any(|r| r == role) => AuthDecision::Allow,
        Some(_) => AuthDecision::reject(403, "Forbidden"),
        None => AuthDecision::Deny,
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let store = MetadataStore::new()
        .provide(Ids(Arc::new(AtomicU64::new(100))))
        .route(Route::get("/users/{id}", Users::find).named("find").param(Param::path("id")))?
        .route(Route::get("/users", Users::search).named("search").param(Param::query_bundle()))?
        .route(Route::post("/users", Users::create).named("create").param(Param::body("user")))?
        .route(
            Route::delete("/users/{id}", Users::remove)
                .named("remove")
                .param(Param::path("id"))
                .authorize(["admin"]),
        )?;

    let options = ServerOptions::from_env()?
        .port(3000)
        .prefix("/api")
        .log(true)
        .documentation(true)
        .cors(CorsOptions { enabled: true, ..CorsOptions::default() })
        .authorization(by_role);

    Server::new(options)
        .on_listening(|addr| tracing::info!(%addr, "ready"))
        .serve(store)
        .await
}
