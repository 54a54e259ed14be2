//! Signed RPC client for the QQ Music `musics.fcg` endpoint.
//!
//! Every call is a single envelope:
//!
//! 1. Build `{"comm": {...}, "<module>.<method>": {module, method, param}}`
//! 2. Serialize once (compact JSON, fixed field order)
//! 3. Sign the serialized bytes (see [`sign`](crate::sign))
//! 4. POST the same bytes to `<endpoint>?sign=<signature>`
//!
//! # Response format
//!
//! ```json
//! {
//!   "code": 0,
//!   "<module>.<method>": { "code": 0, "data": { ...call-specific... } }
//! }
//! ```
//!
//! A missing entry or a non-zero inner `code` is mapped to
//! [`QqMusicError::Vendor`](crate::QqMusicError::Vendor).

use crate::config::{Config, DEFAULT_ENDPOINT, DEFAULT_STREAM_DOMAIN};
use crate::credential::Credential;
use crate::error::{QqMusicError, Result};
use crate::sign::sign;
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const CLIENT_TYPE: &str = "19";
const CLIENT_VERSION: u32 = 13_020_508;
const REFERER: &str = "https://y.qq.com/";
const ORIGIN: &str = "https://y.qq.com";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// `comm` block. Field order is part of the signed bytes.
#[derive(serde::Serialize)]
struct Comm<'a> {
    ct: &'static str,
    cv: u32,
    v: u32,
    format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    qq: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    authst: Option<&'a str>,
    #[serde(rename = "tmeLoginType", skip_serializing_if = "Option::is_none")]
    tme_login_type: Option<String>,
}

impl<'a> Comm<'a> {
    fn new(credential: Option<&'a Credential>) -> Self {
        Self {
            ct: CLIENT_TYPE,
            cv: CLIENT_VERSION,
            v: CLIENT_VERSION,
            format: "json",
            qq: credential.map(|c| c.musicid.to_string()),
            authst: credential.map(|c| c.musickey.as_str()),
            tme_login_type: credential.map(|c| c.effective_login_type().to_string()),
        }
    }
}

#[derive(serde::Serialize)]
struct Call<'a> {
    module: &'a str,
    method: &'a str,
    param: &'a Value,
}

/// One request envelope: `comm` first, then the single call entry.
struct Envelope<'a> {
    comm: Comm<'a>,
    key: String,
    call: Call<'a>,
}

impl<'a> Envelope<'a> {
    fn new(
        module: &'a str,
        method: &'a str,
        param: &'a Value,
        credential: Option<&'a Credential>,
    ) -> Self {
        Self {
            comm: Comm::new(credential),
            key: format!("{module}.{method}"),
            call: Call {
                module,
                method,
                param,
            },
        }
    }
}

impl Serialize for Envelope<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("comm", &self.comm)?;
        map.serialize_entry(&self.key, &self.call)?;
        map.end()
    }
}

/// Blocking client for the QQ Music RPC endpoint.
///
/// Holds a [`Transport`] plus the endpoint and streaming domain. The
/// resolvers (`song_url`, `cover`, `lyric`) and the refresh engine are
/// implemented on top of [`call`](Self::call) in their own modules.
pub struct QqMusicClient {
    transport: Box<dyn Transport>,
    endpoint: String,
    stream_domain: String,
}

impl QqMusicClient {
    /// Create a client with the default endpoint and a 30 s timeout.
    pub fn new() -> Result<Self> {
        let transport = ReqwestTransport::new(Duration::from_secs(30))?;
        Ok(Self::with_transport(transport))
    }

    /// Create a client from a loaded [`Config`].
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::new(config.timeout())?;
        Ok(Self::with_transport(transport)
            .with_endpoint(&config.endpoint)
            .with_stream_domain(&config.stream_domain))
    }

    /// Create a client over an explicit [`Transport`] (tests, custom stacks).
    pub fn with_transport(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            stream_domain: DEFAULT_STREAM_DOMAIN.to_owned(),
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        endpoint.clone_into(&mut self.endpoint);
        self
    }

    #[must_use]
    pub fn with_stream_domain(mut self, domain: &str) -> Self {
        domain.clone_into(&mut self.stream_domain);
        self
    }

    /// CDN prefix for playback paths.
    pub fn stream_domain(&self) -> &str {
        &self.stream_domain
    }

    /// Issue one signed RPC call and return its `data` payload.
    ///
    /// When `credential` is given, its id / key / login type go into `comm`
    /// and the cookie header.
    ///
    /// # Errors
    ///
    /// - [`QqMusicError::Network`] — transport failure
    /// - [`QqMusicError::Json`] — body is not JSON
    /// - [`QqMusicError::Vendor`] — missing entry or non-zero `code`
    pub fn call(
        &self,
        module: &str,
        method: &str,
        param: &Value,
        credential: Option<&Credential>,
    ) -> Result<Value> {
        let envelope = Envelope::new(module, method, param, credential);
        let body = serde_json::to_vec(&envelope)?;
        let url = format!("{}?sign={}", self.endpoint, sign(&body));

        let mut headers = vec![
            ("Content-Type", "application/json".to_owned()),
            ("Referer", REFERER.to_owned()),
            ("Origin", ORIGIN.to_owned()),
            ("User-Agent", USER_AGENT.to_owned()),
        ];
        if let Some(c) = credential {
            headers.push(("Cookie", c.cookie_header()));
        }

        debug!(call = %envelope.key, authenticated = credential.is_some(), "vendor call");
        let resp = self
            .transport
            .execute(HttpRequest::post(url, headers, body))?;
        let mut json: Value = serde_json::from_slice(&resp.body)?;

        let vendor_error = |code| QqMusicError::Vendor {
            code,
            module: module.to_owned(),
            method: method.to_owned(),
        };

        let Some(entry) = json.get_mut(&envelope.key).filter(|e| e.is_object()) else {
            return Err(vendor_error(None));
        };
        match entry.get("code").and_then(Value::as_i64) {
            Some(0) => Ok(entry.get_mut("data").map(Value::take).unwrap_or_default()),
            code => {
                debug!(call = %envelope.key, ?code, "vendor rejected call");
                Err(vendor_error(code))
            }
        }
    }

    /// Probe `url` with a HEAD request.
    pub(crate) fn head(&self, url: &str) -> Result<HttpResponse> {
        self.transport.execute(HttpRequest::head(url.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_util::{body_json, json_response, vendor_reply};
    use crate::transport::{Method, MockTransport};
    use serde_json::json;

    fn credential() -> Credential {
        Credential {
            musicid: 123,
            musickey: "Q_H_L_key".into(),
            login_type: 0,
            ..Credential::default()
        }
    }

    #[test]
    fn envelope_bytes_have_fixed_order() {
        let param = json!({ "song_mid": "0039MnYb0qxYhV" });
        let env = Envelope::new("music.pf_song_detail_svr", "get_song_detail_yqq", &param, None);
        let body = serde_json::to_string(&env).unwrap();
        assert_eq!(
            body,
            r#"{"comm":{"ct":"19","cv":13020508,"v":13020508,"format":"json"},"music.pf_song_detail_svr.get_song_detail_yqq":{"module":"music.pf_song_detail_svr","method":"get_song_detail_yqq","param":{"song_mid":"0039MnYb0qxYhV"}}}"#
        );
        assert_eq!(
            sign(body.as_bytes()),
            "zzc8cbc256219a68f3ydfwiyrznzeyelzdnsjterzjs7q"
        );
    }

    #[test]
    fn envelope_carries_credential_in_comm() {
        let c = credential();
        let param = json!({ "z": 1, "a": "歌" });
        let env = Envelope::new("m", "f", &param, Some(&c));
        let body = serde_json::to_string(&env).unwrap();
        assert_eq!(
            body,
            r#"{"comm":{"ct":"19","cv":13020508,"v":13020508,"format":"json","qq":"123","authst":"Q_H_L_key","tmeLoginType":"2"},"m.f":{"module":"m","method":"f","param":{"z":1,"a":"歌"}}}"#
        );
    }

    #[test]
    fn call_signs_posts_and_unwraps_data() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req| {
                let body = req.body.as_deref().unwrap();
                req.method == Method::Post
                    && req.url == format!("https://example.test/fcg?sign={}", sign(body))
                    && req.header("referer") == Some(REFERER)
                    && req.header("origin") == Some(ORIGIN)
                    && req.header("cookie").is_some_and(|c| c.contains("uin=123"))
                    && body_json(req)["comm"]["authst"] == "Q_H_L_key"
            })
            .times(1)
            .returning(|_| Ok(vendor_reply("mod.meth", 0, json!({ "ok": true }))));

        let client = QqMusicClient::with_transport(transport).with_endpoint("https://example.test/fcg");
        let data = client
            .call("mod", "meth", &json!({}), Some(&credential()))
            .unwrap();
        assert_eq!(data, json!({ "ok": true }));
    }

    #[test]
    fn anonymous_call_has_no_cookie() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req| req.header("cookie").is_none() && body_json(req)["comm"].get("qq").is_none())
            .times(1)
            .returning(|_| Ok(vendor_reply("mod.meth", 0, json!(null))));
        let client = QqMusicClient::with_transport(transport);
        assert_eq!(client.call("mod", "meth", &json!({}), None).unwrap(), Value::Null);
    }

    #[test]
    fn nonzero_code_is_vendor_error() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .returning(|_| Ok(vendor_reply("mod.meth", 2000, json!({}))));
        let client = QqMusicClient::with_transport(transport);
        let err = client.call("mod", "meth", &json!({}), None).unwrap_err();
        assert_eq!(err.vendor_code(), Some(2000));
        assert!(err.to_string().contains("invalid signature"));
    }

    #[test]
    fn missing_entry_is_vendor_error() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .returning(|_| Ok(json_response(&json!({ "code": 0, "other.call": {} }))));
        let client = QqMusicClient::with_transport(transport);
        let err = client.call("mod", "meth", &json!({}), None).unwrap_err();
        assert!(matches!(
            err,
            QqMusicError::Vendor { code: None, ref module, ref method }
                if module == "mod" && method == "meth"
        ));
    }

    #[test]
    fn malformed_body_and_transport_failure_are_distinct() {
        let mut transport = MockTransport::new();
        transport.expect_execute().times(1).returning(|_| {
            Ok(HttpResponse {
                status: 502,
                content_length: None,
                body: b"<html>bad gateway</html>".to_vec(),
            })
        });
        transport
            .expect_execute()
            .times(1)
            .returning(|_| Err(QqMusicError::Network("timed out".into())));
        let client = QqMusicClient::with_transport(transport);

        let err = client.call("mod", "meth", &json!({}), None).unwrap_err();
        assert!(matches!(err, QqMusicError::Json(_)));
        let err = client.call("mod", "meth", &json!({}), None).unwrap_err();
        assert!(matches!(err, QqMusicError::Network(_)));
    }
}
