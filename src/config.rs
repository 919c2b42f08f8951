//! Server options.
//!
//! [`ServerOptions`] is built once at startup and never changes afterwards:
//! the dispatcher holds it behind an `Arc` and every component reads it from
//! there. There is no process-global copy.
//!
//! Options can be assembled in code, deserialized from any serde format
//! (every field has a default), or read from the environment:
//!
//! | Variable                     | Field                   |
//! |------------------------------|-------------------------|
//! | `KIWI_HOST`                  | `host`                  |
//! | `KIWI_PORT`                  | `port`                  |
//! | `KIWI_PREFIX`                | `prefix`                |
//! | `KIWI_LOG`                   | `log`                   |
//! | `KIWI_DOCS`                  | `documentation.enabled` |
//! | `KIWI_CORS`                  | `cors.enabled`          |
//! | `KIWI_SOCKET`                | `socket`                |
//! | `KIWI_MIDDLEWARE_TIMEOUT_MS` | `middleware_timeout_ms` |
//!
//! ```rust
//! use kiwi::ServerOptions;
//!
//! let options = ServerOptions::default()
//!     .port(3000)
//!     .prefix("/api")
//!     .log(true);
//! assert_eq!(options.port, 3000);
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::auth::Authorize;
use crate::error::Error;

/// Root configuration of a kiwi server.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ServerOptions {
    /// Interface to bind. Defaults to `0.0.0.0`.
    pub host: String,

    /// Port to bind. `0` picks a free port; the startup callback receives
    /// the address actually bound.
    pub port: u16,

    /// Path prefix joined in front of every route pattern.
    pub prefix: String,

    /// Prepend the access-log middleware.
    pub log: bool,

    pub documentation: DocumentationOptions,

    pub cors: CorsOptions,

    /// Create a process-level event channel, see [`crate::EventChannel`].
    pub socket: bool,

    /// Upper bound for a single middleware step. `None` waits forever.
    pub middleware_timeout_ms: Option<u64>,

    /// Consulted for routes that require authorization. Set in code only.
    #[serde(skip)]
    pub authorization: Option<Arc<dyn Authorize>>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            prefix: String::new(),
            log: false,
            documentation: DocumentationOptions::default(),
            cors: CorsOptions::default(),
            socket: false,
            middleware_timeout_ms: None,
            authorization: None,
        }
    }
}

impl fmt::Debug for ServerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("prefix", &self.prefix)
            .field("log", &self.log)
            .field("documentation", &self.documentation)
            .field("cors", &self.cors)
            .field("socket", &self.socket)
            .field("middleware_timeout_ms", &self.middleware_timeout_ms)
            .field("authorization", &self.authorization.is_some())
            .finish()
    }
}

/// Route catalog endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DocumentationOptions {
    pub enabled: bool,
    /// Served under the route prefix.
    pub path: String,
}

impl Default for DocumentationOptions {
    fn default() -> Self {
        Self { enabled: false, path: "/docs".to_string() }
    }
}

/// Cross-origin resource sharing headers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorsOptions {
    pub enabled: bool,
    pub allow_origin: String,
    pub allow_methods: String,
    pub allow_headers: String,
}

impl Default for CorsOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            allow_origin: "*".to_string(),
            allow_methods: "GET, POST, PUT, PATCH, DELETE, OPTIONS".to_string(),
            allow_headers: "Content-Type, Authorization".to_string(),
        }
    }
}

impl ServerOptions {
    /// Loads options from `KIWI_*` environment variables on top of the
    /// defaults.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut options = Self::default();
        if let Some(host) = lookup("KIWI_HOST") {
            options.host = host;
        }
        if let Some(prefix) = lookup("KIWI_PREFIX") {
            options.prefix = prefix;
        }
        if let Some(port) = parsed(&lookup, "KIWI_PORT")? {
            options.port = port;
        }
        if let Some(log) = flag(&lookup, "KIWI_LOG")? {
            options.log = log;
        }
        if let Some(docs) = flag(&lookup, "KIWI_DOCS")? {
            options.documentation.enabled = docs;
        }
        if let Some(cors) = flag(&lookup, "KIWI_CORS")? {
            options.cors.enabled = cors;
        }
        if let Some(socket) = flag(&lookup, "KIWI_SOCKET")? {
            options.socket = socket;
        }
        if let Some(ms) = parsed(&lookup, "KIWI_MIDDLEWARE_TIMEOUT_MS")? {
            options.middleware_timeout_ms = Some(ms);
        }
        Ok(options)
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn log(mut self, enabled: bool) -> Self {
        self.log = enabled;
        self
    }

    pub fn documentation(mut self, enabled: bool) -> Self {
        self.documentation.enabled = enabled;
        self
    }

    pub fn cors(mut self, cors: CorsOptions) -> Self {
        self.cors = cors;
        self
    }

    pub fn socket(mut self, enabled: bool) -> Self {
        self.socket = enabled;
        self
    }

    pub fn middleware_timeout(mut self, limit: Duration) -> Self {
        self.middleware_timeout_ms = Some(limit.as_millis().try_into().unwrap_or(u64::MAX));
        self
    }

    pub fn authorization(mut self, authorize: impl Authorize) -> Self {
        self.authorization = Some(Arc::new(authorize));
        self
    }

    /// `middleware_timeout_ms` as a [`Duration`].
    pub fn step_timeout(&self) -> Option<Duration> {
        self.middleware_timeout_ms.map(Duration::from_millis)
    }

    /// `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, Error> {
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| Error::Config(format!("{key}: cannot parse `{raw}`")))
        })
        .transpose()
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<bool>, Error> {
    lookup(key)
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(Error::Config(format!("{key}: expected a boolean, got `{raw}`"))),
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let options = ServerOptions::default();
        assert_eq!(options.address(), "0.0.0.0:8080");
        assert!(!options.log);
        assert!(!options.documentation.enabled);
        assert!(!options.cors.enabled);
        assert!(options.authorization.is_none());
        assert_eq!(options.step_timeout(), None);
    }

    #[test]
    fn env_overrides_defaults() {
        let options = ServerOptions::from_lookup(lookup(&[
            ("KIWI_PORT", "3000"),
            ("KIWI_PREFIX", "/api"),
            ("KIWI_LOG", "true"),
            ("KIWI_CORS", "1"),
            ("KIWI_MIDDLEWARE_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(options.port, 3000);
        assert_eq!(options.prefix, "/api");
        assert!(options.log);
        assert!(options.cors.enabled);
        assert!(!options.documentation.enabled);
        assert_eq!(options.step_timeout(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn bad_values_are_config_errors() {
        let err = ServerOptions::from_lookup(lookup(&[("KIWI_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("KIWI_PORT")));

        let err = ServerOptions::from_lookup(lookup(&[("KIWI_LOG", "maybe")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn deserializes_partial_documents() {
        let options: ServerOptions = serde_json::from_str(
            r#"{ "port": 9000, "documentation": { "enabled": true }, "cors": { "enabled": true } }"#,
        )
        .unwrap();

        assert_eq!(options.port, 9000);
        assert_eq!(options.host, "0.0.0.0");
        assert!(options.documentation.enabled);
        assert_eq!(options.documentation.path, "/docs");
        assert_eq!(options.cors.allow_origin, "*");
    }
}
