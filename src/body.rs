//! Request body decoding.
//!
//! The body stream is drained completely before anything is decoded;
//! backpressure while reading is whatever the underlying connection provides.
//! JSON bodies become a [`serde_json::Value`]; every other content type is
//! passed through as text.

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Body;
use serde_json::Value;
use thiserror::Error;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A body that could not be read or decoded.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read request body: {0}")]
    Read(#[source] BoxError),

    #[error("malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Drains `body` and decodes it according to `content_type`.
pub async fn parse_body<B>(content_type: Option<&str>, body: B) -> Result<Value, ParseError>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    let bytes = body
        .collect()
        .await
        .map_err(|e| ParseError::Read(e.into()))?
        .to_bytes();
    decode(content_type, &bytes)
}

/// Decodes an already collected body.
///
/// An empty body decodes to `Null` whatever its declared type.
pub fn decode(content_type: Option<&str>, bytes: &[u8]) -> Result<Value, ParseError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    if content_type.is_some_and(is_json) {
        return Ok(serde_json::from_slice(bytes)?);
    }
    Ok(Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// `application/json`, or any structured `+json` suffix type, ignoring
/// parameters such as `charset`.
fn is_json(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("application/json")
        || essence.to_ascii_lowercase().ends_with("+json")
}

#[cfg(test)]
mod tests {
    use http_body_util::Full;
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn json_body_is_structured() {
        let body = Full::new(Bytes::from_static(br#"{"name":"x","tags":[1,2]}"#));
        let value = parse_body(Some("application/json; charset=utf-8"), body).await.unwrap();
        assert_eq!(value, json!({ "name": "x", "tags": [1, 2] }));
    }

    #[tokio::test]
    async fn malformed_json_is_a_parse_error() {
        let body = Full::new(Bytes::from_static(b"{\"name\":"));
        let err = parse_body(Some("application/json"), body).await.unwrap_err();
        assert!(matches!(err, ParseError::Json(_)));
    }

    #[test]
    fn other_types_pass_through_as_text() {
        let value = decode(Some("text/plain"), b"{not json}").unwrap();
        assert_eq!(value, Value::String("{not json}".into()));

        let value = decode(None, b"a=1&b=2").unwrap();
        assert_eq!(value, Value::String("a=1&b=2".into()));
    }

    #[test]
    fn vendor_json_suffix_is_json() {
        let value = decode(Some("application/problem+json"), br#"{"status":400}"#).unwrap();
        assert_eq!(value, json!({ "status": 400 }));
    }

    #[test]
    fn empty_body_is_null() {
        assert_eq!(decode(Some("application/json"), b"").unwrap(), Value::Null);
    }
}
