//! HTTP fetch primitive.
//!
//! The protocol client and the cover validator only need two verbs: a JSON
//! POST to the vendor endpoint and a HEAD probe against image CDNs. They are
//! expressed through [`Transport`] so the hosting layer (and tests) can swap
//! the network stack. [`ReqwestTransport`] is the production implementation.

use crate::error::Result;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_LENGTH;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// HTTP verbs used against the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Post,
    Head,
}

/// A fully-built outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn post(url: String, headers: Vec<(&'static str, String)>, body: Vec<u8>) -> Self {
        Self {
            method: Method::Post,
            url,
            headers,
            body: Some(body),
        }
    }

    pub fn head(url: String) -> Self {
        Self {
            method: Method::Head,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    /// Value of the first header named `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// What callers need from a response: status, declared length, body.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed `Content-Length` header, if present and numeric.
    pub content_length: Option<u64>,
    /// Empty for HEAD requests.
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Blocking HTTP transport.
///
/// Implementations return `Err` only for transport failures; any HTTP
/// status is a successful exchange.
#[cfg_attr(test, mockall::automock)]
pub trait Transport: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`Transport`] backed by a blocking [`reqwest`] client.
pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self { http })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut req = match request.method {
            Method::Post => self.http.post(&request.url),
            Method::Head => self.http.head(&request.url),
        };
        for (name, value) in request.headers {
            req = req.header(name, value);
        }
        if let Some(body) = request.body {
            req = req.body(body);
        }

        let resp = req.send()?;
        let status = resp.status().as_u16();
        let content_length = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse().ok());
        let body = match request.method {
            Method::Head => Vec::new(),
            Method::Post => resp.bytes()?.to_vec(),
        };

        Ok(HttpResponse {
            status,
            content_length,
            body,
        })
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::{HttpRequest, HttpResponse};
    use serde_json::{Value, json};

    pub fn json_response(body: &Value) -> HttpResponse {
        HttpResponse {
            status: 200,
            content_length: None,
            body: serde_json::to_vec(body).unwrap(),
        }
    }

    /// Vendor reply for a single `module.method` call.
    pub fn vendor_reply(key: &str, code: i64, data: Value) -> HttpResponse {
        json_response(&json!({ "code": 0, key: { "code": code, "data": data } }))
    }

    /// Parsed JSON body of a POST request; `Null` for bodiless requests.
    pub fn body_json(req: &HttpRequest) -> Value {
        req.body
            .as_deref()
            .map_or(Value::Null, |body| serde_json::from_slice(body).unwrap())
    }

    /// The `module.method` key of an outgoing envelope (`""` without one).
    pub fn call_key(req: &HttpRequest) -> String {
        body_json(req)
            .as_object()
            .and_then(|o| o.keys().find(|k| *k != "comm").cloned())
            .unwrap_or_default()
    }

    /// `param` object of an outgoing envelope.
    pub fn call_param(req: &HttpRequest) -> Value {
        let key = call_key(req);
        body_json(req)[key.as_str()]["param"].clone()
    }

    pub fn head_response(status: u16, content_length: Option<u64>) -> HttpResponse {
        HttpResponse {
            status,
            content_length,
            body: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::{body_json, call_key, call_param};
    use super::*;
    use serde_json::Value;

    #[test]
    fn helpers_tolerate_head_requests() {
        let head = HttpRequest::head("https://y.gtimg.cn/x.jpg".into());
        assert_eq!(head.method, Method::Head);
        assert_eq!(body_json(&head), Value::Null);
        assert_eq!(call_key(&head), "");
        assert_eq!(call_param(&head), Value::Null);
    }
}
