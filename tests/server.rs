use std::net::SocketAddr;

use kiwi::{
    BoxFuture, Call, Dependency, Error, EventChannel, Injectable, MetadataStore, Param, ResolveError,
    Resolver, Route, Server, ServerOptions,
};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

struct Greeter {
    events: EventChannel,
}

impl Injectable for Greeter {
    fn dependencies() -> Vec<Dependency> {
        vec![Dependency::provided::<EventChannel>()]
    }

    fn construct(deps: &Resolver<'_>) -> Result<Self, ResolveError> {
        Ok(Greeter { events: deps.resolve()? })
    }
}

impl Greeter {
    fn hello<'a>(self, call: Call<'a>) -> BoxFuture<'a, Result<Value, Error>> {
        Box::pin(async move {
            let name = call.args.str(0).unwrap_or("world").to_owned();
            self.events.publish("greeted", json!(name));
            Ok(json!({ "hello": name }))
        })
    }
}

async fn roundtrip(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut out = Vec::new();
    stream.read_to_end(&mut out).await.unwrap();
    String::from_utf8(out).unwrap()
}

#[tokio::test]
async fn serves_over_tcp_and_shuts_down() {
    let store = MetadataStore::new()
        .route(Route::get("/hello/{name}", Greeter::hello).named("hello").param(Param::path("name")))
        .unwrap();

    let server = Server::new(ServerOptions::default().host("127.0.0.1").port(0).socket(true));
    let mut events = server.socket().unwrap().subscribe();

    let (addr_tx, addr_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(
        server
            .on_listening(move |addr| {
                let _ = addr_tx.send(addr);
            })
            .serve_until(store, async {
                let _ = stop_rx.await;
            }),
    );
    let addr = addr_rx.await.unwrap();

    let response = roundtrip(
        addr,
        "GET /hello/kiwi HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
    assert!(response.contains("content-type: application/json"), "{response}");
    assert!(response.ends_with(r#"{"hello":"kiwi"}"#), "{response}");

    let event = events.recv().await.unwrap();
    assert_eq!(event.topic, "greeted");
    assert_eq!(event.payload, json!("kiwi"));

    let response = roundtrip(addr, "GET /missing HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found"), "{response}");
    assert!(response.ends_with("Method doesnt match"), "{response}");

    stop_tx.send(()).unwrap();
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn invalid_registration_fails_before_listening() {
    // Greeter needs the event channel, which only exists with `socket` on.
    let store = MetadataStore::new().route(Route::get("/hello", Greeter::hello)).unwrap();
    let result = Server::new(ServerOptions::default().host("127.0.0.1").port(0))
        .serve_until(store, std::future::pending())
        .await;
    assert!(matches!(result, Err(Error::Registration(_))));
}
