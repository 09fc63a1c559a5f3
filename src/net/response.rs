//! Buffered HTTP response.
//!
//! The whole body is read before the response is handed back, which is fine
//! for the small JSON documents this crate exchanges. `headers` is an
//! `http::HeaderMap`, so lookups are case-insensitive.

use http::header::CONTENT_TYPE;
use http::HeaderMap;
use serde::de::DeserializeOwned;

#[derive(Debug)]
pub struct Response {
    /// Numeric HTTP status code (e.g., `200`, `404`).
    pub status: u16,

    /// Reason phrase, `"Unknown"` for non-standard codes.
    pub status_text: String,

    pub headers: HeaderMap,

    /// Raw response body bytes.
    pub body: Vec<u8>,
}

impl Response {
    /// Parses the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The `Content-Type` header, or `""` when absent or not ASCII.
    pub fn content_type(&self) -> &str {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    fn response(status: u16, body: &str) -> Response {
        Response {
            status,
            status_text: "OK".into(),
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn json_body() {
        let r = response(200, r#"{"a": 1}"#);
        let v: serde_json::Value = r.json().unwrap();
        assert_eq!(v["a"], 1);
        assert!(response(200, "not json").json::<serde_json::Value>().is_err());
        assert_eq!(response(200, "hi").text(), "hi");
    }

    #[test]
    fn content_type_lookup() {
        let mut r = response(503, "overloaded");
        assert_eq!(r.content_type(), "");
        r.headers.insert("content-type", HeaderValue::from_static("text/plain"));
        assert_eq!(r.content_type(), "text/plain");
    }
}
