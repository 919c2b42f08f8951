//! Parameter binding: raw request data → ordered handler argument slots.
//!
//! Every function here writes into the slot the route's [`BindingPlan`]
//! assigned at registration. Binding never scans for "the next free slot",
//! so the order in which query, body and headers are bound does not matter.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::request::Request;
use crate::route::BindingPlan;

/// Every `key=value` pair of a query string. A pair written without `=`
/// maps to `None`.
pub type QueryBundle = BTreeMap<String, Option<String>>;

/// Request data that could not be turned into an argument.
#[derive(Debug, Error)]
pub enum BindError {
    #[error("`{0}` is not valid percent-encoded UTF-8")]
    Decode(String),

    #[error("argument slot {0} does not exist")]
    MissingSlot(usize),

    #[error("argument slot {slot} has an unexpected shape: {source}")]
    Deserialize {
        slot: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Parses a `&`-separated query string.
///
/// Returns `None` for an absent or empty query string. Values are
/// percent-decoded (`+` stays a literal plus). A pair without `=` binds the
/// key to `None`; in `a=1=2` the value is `1`. When a key repeats, the last
/// pair wins.
///
/// ```rust
/// use kiwi::binder::bind_query;
///
/// assert_eq!(bind_query(None).unwrap(), None);
///
/// let bundle = bind_query(Some("a=1&b=2%20x")).unwrap().unwrap();
/// assert_eq!(bundle["a"].as_deref(), Some("1"));
/// assert_eq!(bundle["b"].as_deref(), Some("2 x"));
/// ```
pub fn bind_query(query: Option<&str>) -> Result<Option<QueryBundle>, BindError> {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return Ok(None);
    };

    let mut bundle = QueryBundle::new();
    for pair in query.split('&') {
        let mut parts = pair.split('=');
        let key = parts.next().unwrap_or_default();
        let value = parts.next().map(decode).transpose()?;
        bundle.insert(key.to_owned(), value);
    }
    Ok(Some(bundle))
}

/// The bundle as it is handed to a handler: an object of strings and nulls,
/// or `Null` when there was no query string.
pub fn bundle_to_value(bundle: Option<&QueryBundle>) -> Value {
    match bundle {
        None => Value::Null,
        Some(bundle) => {
            let object: Map<String, Value> = bundle
                .iter()
                .map(|(k, v)| (k.clone(), v.clone().map_or(Value::Null, Value::String)))
                .collect();
            Value::Object(object)
        }
    }
}

/// Writes the query bundle and single-key query parameters.
pub fn bind_query_params(bundle: Option<&QueryBundle>, plan: &BindingPlan, slots: &mut [Value]) {
    if let Some(slot) = plan.query_bundle {
        slots[slot] = bundle_to_value(bundle);
    }
    for (slot, name) in &plan.query {
        slots[*slot] = bundle
            .and_then(|b| b.get(name))
            .and_then(Clone::clone)
            .map_or(Value::Null, Value::String);
    }
}

/// Writes the decoded body into the route's body slot. Routes that declare
/// no body parameter drop it.
pub fn bind_body(body: Value, plan: &BindingPlan, slots: &mut [Value]) {
    if let Some(slot) = plan.body {
        slots[slot] = body;
    }
}

/// Copies every declared header into its slot. Lookup is case-insensitive;
/// repeated headers are joined with `", "`; missing ones bind `Null`.
pub fn bind_headers(request: &Request, plan: &BindingPlan, slots: &mut [Value]) {
    for (slot, name) in &plan.headers {
        let values: Vec<String> = request
            .headers()
            .get_all(name.as_str())
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect();
        slots[*slot] = if values.is_empty() {
            Value::Null
        } else {
            Value::String(values.join(", "))
        };
    }
}

/// Writes path placeholder values, percent-decoded.
pub fn bind_path(request: &Request, plan: &BindingPlan, slots: &mut [Value]) -> Result<(), BindError> {
    for (slot, name) in &plan.path {
        slots[*slot] = match request.param(name) {
            Some(raw) => Value::String(decode(raw)?),
            None => Value::Null,
        };
    }
    Ok(())
}

/// Percent-decodes `raw`. A `%` not followed by two hex digits, or escapes
/// that do not form UTF-8, fail the same way.
fn decode(raw: &str) -> Result<String, BindError> {
    let bytes = raw.as_bytes();
    let well_formed = bytes.iter().enumerate().filter(|(_, b)| **b == b'%').all(|(i, _)| {
        bytes.get(i + 1..i + 3).is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit))
    });
    if !well_formed {
        return Err(BindError::Decode(raw.to_owned()));
    }
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| BindError::Decode(raw.to_owned()))
}
