//! Cover-art URL resolution.
//!
//! Candidates, in order:
//!
//! | Source      | URL                                                          |
//! |-------------|--------------------------------------------------------------|
//! | `album_mid` | `https://y.gtimg.cn/music/photo_new/T002R{s}x{s}M000{mid}.jpg` |
//! | `vs`        | `https://y.qq.com/music/photo_new/T062R{s}x{s}M000{vs}.jpg`   |
//! | `default`   | fixed placeholder at the same size                           |
//!
//! The CDN answers unknown covers with a tiny placeholder image, so a HEAD
//! probe only accepts a 2xx response declaring more than 1024 bytes.

use crate::client::QqMusicClient;
use crate::credential::Credential;
use crate::error::{QqMusicError, Result};
use crate::types::{Cover, CoverRequest, CoverSource, coerce_cover_size};
use serde_json::{Value, json};
use tracing::{debug, info};

const DETAIL_MODULE: &str = "music.pf_song_detail_svr";
const DETAIL_METHOD: &str = "get_song_detail_yqq";

const DEFAULT_COVER_MID: &str = "003y8dsH2wBHlo_1";

/// Smallest body a real cover can have.
const MIN_COVER_BYTES: u64 = 1024;

const MIN_VS_LEN: usize = 3;

pub fn album_cover_url(album_mid: &str, size: u32) -> String {
    format!("https://y.gtimg.cn/music/photo_new/T002R{size}x{size}M000{album_mid}.jpg")
}

pub fn vs_cover_url(vs: &str, size: u32) -> String {
    format!("https://y.qq.com/music/photo_new/T062R{size}x{size}M000{vs}.jpg")
}

pub fn default_cover_url(size: u32) -> String {
    album_cover_url(DEFAULT_COVER_MID, size)
}

/// Expand raw vs values into ordered candidate tokens.
///
/// Entries shorter than 3 chars are dropped; comma-joined entries are split
/// and each trimmed sub-token of at least 3 chars is kept.
pub fn normalize_vs<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut tokens = Vec::new();
    for entry in raw.iter().map(AsRef::as_ref) {
        if entry.chars().count() < MIN_VS_LEN {
            continue;
        }
        if entry.contains(',') {
            tokens.extend(
                entry
                    .split(',')
                    .map(str::trim)
                    .filter(|t| t.chars().count() >= MIN_VS_LEN)
                    .map(str::to_owned),
            );
        } else {
            tokens.push(entry.to_owned());
        }
    }
    tokens
}

/// Parse a `vs` query value: a JSON array, or a comma-separated list.
///
/// Non-string array elements are dropped.
pub fn parse_vs_param(param: &str) -> Vec<String> {
    let param = param.trim();
    if param.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(param) {
        Ok(Value::Array(items)) => strings(&items),
        _ => param
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .collect(),
    }
}

fn strings(items: &[Value]) -> Vec<String> {
    items
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_owned)
        .collect()
}

impl QqMusicClient {
    /// Resolve a cover URL for a track or album.
    ///
    /// When only `request.mid` is set, one song-detail lookup supplies the
    /// album mid and vs tokens. Validated mode probes candidates in order
    /// and falls back to the placeholder; unvalidated mode makes no probe.
    ///
    /// # Errors
    ///
    /// - [`QqMusicError::Validation`] — no album mid and no vs value at all
    /// - errors of the detail lookup propagate unchanged
    pub fn resolve_cover(
        &self,
        request: &CoverRequest,
        credential: Option<&Credential>,
    ) -> Result<Cover> {
        let size = coerce_cover_size(request.size);
        let mut album_mid = request
            .album_mid
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_owned);
        let mut raw_vs = request.vs.clone();

        if album_mid.is_none() && raw_vs.is_empty() {
            if let Some(mid) = request.mid.as_deref().filter(|m| !m.trim().is_empty()) {
                let (found_album, found_vs) = self.song_cover_hints(mid.trim(), credential)?;
                album_mid = found_album;
                raw_vs = found_vs;
            }
        }

        if album_mid.is_none() && raw_vs.is_empty() {
            return Err(QqMusicError::Validation(
                "one of mid, album_mid or vs is required".into(),
            ));
        }
        // all-short vs lists still fall through to the placeholder
        let tokens = normalize_vs(&raw_vs);

        let cover = if request.validate {
            self.first_valid_cover(album_mid.as_deref(), &tokens, size)
        } else {
            first_candidate(album_mid.as_deref(), &tokens, size)
        };
        info!(source = ?cover.source, size, validated = request.validate, "cover resolved");
        Ok(cover)
    }

    /// Album mid and raw vs array from the song detail.
    fn song_cover_hints(
        &self,
        mid: &str,
        credential: Option<&Credential>,
    ) -> Result<(Option<String>, Vec<String>)> {
        let data = self.call(
            DETAIL_MODULE,
            DETAIL_METHOD,
            &json!({ "song_mid": mid }),
            credential,
        )?;
        let track = &data["track_info"];
        let album = track["album"]["mid"]
            .as_str()
            .filter(|m| !m.is_empty())
            .map(str::to_owned);
        let vs = track["vs"].as_array().map(|v| strings(v)).unwrap_or_default();
        debug!(mid, has_album = album.is_some(), vs = vs.len(), "song detail fetched");
        Ok((album, vs))
    }

    fn first_valid_cover(&self, album_mid: Option<&str>, tokens: &[String], size: u32) -> Cover {
        if let Some(album) = album_mid {
            let url = album_cover_url(album, size);
            if self.cover_exists(&url) {
                return Cover {
                    url,
                    source: CoverSource::AlbumMid,
                    size,
                    vs: None,
                };
            }
        }

        for token in tokens {
            let url = vs_cover_url(token, size);
            if self.cover_exists(&url) {
                return Cover {
                    url,
                    source: CoverSource::Vs,
                    size,
                    vs: Some(token.clone()),
                };
            }
        }

        Cover {
            url: default_cover_url(size),
            source: CoverSource::Default,
            size,
            vs: None,
        }
    }

    /// HEAD-probe `url`. Transport failures count as absent.
    fn cover_exists(&self, url: &str) -> bool {
        match self.head(url) {
            Ok(resp) => {
                let ok = resp.is_success()
                    && resp.content_length.is_some_and(|len| len > MIN_COVER_BYTES);
                debug!(url, status = resp.status, length = ?resp.content_length, ok, "cover probe");
                ok
            }
            Err(e) => {
                debug!(url, error = %e, "cover probe failed");
                false
            }
        }
    }
}

fn first_candidate(album_mid: Option<&str>, tokens: &[String], size: u32) -> Cover {
    if let Some(album) = album_mid {
        return Cover {
            url: album_cover_url(album, size),
            source: CoverSource::AlbumMid,
            size,
            vs: None,
        };
    }
    match tokens.first() {
        Some(token) => Cover {
            url: vs_cover_url(token, size),
            source: CoverSource::Vs,
            size,
            vs: Some(token.clone()),
        },
        None => Cover {
            url: default_cover_url(size),
            source: CoverSource::Default,
            size,
            vs: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::test_util::{call_key, call_param, head_response, vendor_reply};
    use crate::transport::{Method, MockTransport};
    use mockall::Sequence;

    fn request(album: Option<&str>, vs: &[&str]) -> CoverRequest {
        CoverRequest {
            album_mid: album.map(str::to_owned),
            vs: vs.iter().map(|s| (*s).to_owned()).collect(),
            ..CoverRequest::default()
        }
    }

    fn expect_head(
        transport: &mut MockTransport,
        seq: &mut Sequence,
        url: String,
        status: u16,
        length: Option<u64>,
    ) {
        transport
            .expect_execute()
            .withf(move |req| req.method == Method::Head && req.url == url)
            .times(1)
            .in_sequence(seq)
            .returning(move |_| Ok(head_response(status, length)));
    }

    #[test]
    fn normalizes_comma_joined_tokens_in_order() {
        assert_eq!(
            normalize_vs(&["123456,abcxyz", "de", "ghijk", " a ,lmnop"]),
            ["123456", "abcxyz", "ghijk", "lmnop"]
        );
        assert!(normalize_vs::<&str>(&[]).is_empty());
    }

    #[test]
    fn vs_param_accepts_json_array_or_list() {
        assert_eq!(parse_vs_param(r#"["abc,defg", 7, "hij"]"#), ["abc,defg", "hij"]);
        assert_eq!(parse_vs_param(" abc , def ,"), ["abc", "def"]);
        assert_eq!(parse_vs_param("123456"), ["123456"]);
        assert!(parse_vs_param("").is_empty());
    }

    #[test]
    fn album_is_tried_before_vs() {
        let mut transport = MockTransport::new();
        let mut seq = Sequence::new();
        expect_head(&mut transport, &mut seq, album_cover_url("ALB", 300), 404, None);
        expect_head(&mut transport, &mut seq, vs_cover_url("123456", 300), 200, Some(2048));

        let client = QqMusicClient::with_transport(transport);
        let cover = client
            .resolve_cover(&request(Some("ALB"), &["123456,abcxyz"]), None)
            .unwrap();
        assert_eq!(cover.source, CoverSource::Vs);
        assert_eq!(cover.vs.as_deref(), Some("123456"));
        assert_eq!(cover.url, vs_cover_url("123456", 300));
    }

    #[test]
    fn tiny_or_unsized_responses_are_rejected() {
        let mut transport = MockTransport::new();
        let mut seq = Sequence::new();
        expect_head(&mut transport, &mut seq, album_cover_url("ALB", 500), 200, Some(1024));
        expect_head(&mut transport, &mut seq, vs_cover_url("123456", 500), 200, None);
        transport
            .expect_execute()
            .withf(|req| req.url == vs_cover_url("abcxyz", 500))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(QqMusicError::Network("refused".into())));

        let client = QqMusicClient::with_transport(transport);
        let req = CoverRequest {
            size: 500,
            ..request(Some("ALB"), &["123456,abcxyz", "de"])
        };
        let cover = client.resolve_cover(&req, None).unwrap();
        assert_eq!(cover.source, CoverSource::Default);
        assert_eq!(cover.url, default_cover_url(500));
        assert_eq!(cover.vs, None);
    }

    #[test]
    fn unsupported_size_becomes_300() {
        let mut transport = MockTransport::new();
        transport.expect_execute().never();
        let client = QqMusicClient::with_transport(transport);
        let req = CoverRequest {
            size: 999,
            validate: false,
            ..request(Some("ALB"), &[])
        };
        let cover = client.resolve_cover(&req, None).unwrap();
        assert_eq!(cover.size, 300);
        assert_eq!(
            cover.url,
            "https://y.gtimg.cn/music/photo_new/T002R300x300M000ALB.jpg"
        );
    }

    #[test]
    fn unvalidated_uses_first_normalized_token() {
        let mut transport = MockTransport::new();
        transport.expect_execute().never();
        let client = QqMusicClient::with_transport(transport);
        let req = CoverRequest {
            size: 150,
            validate: false,
            ..request(None, &["xy", "123456,abcxyz"])
        };
        let cover = client.resolve_cover(&req, None).unwrap();
        assert_eq!(cover.source, CoverSource::Vs);
        assert_eq!(
            cover.url,
            "https://y.qq.com/music/photo_new/T062R150x150M000123456.jpg"
        );
    }

    #[test]
    fn track_mid_triggers_one_detail_lookup() {
        let mut transport = MockTransport::new();
        let mut seq = Sequence::new();
        transport
            .expect_execute()
            .withf(|req| {
                req.method == Method::Post
                    && call_key(req) == "music.pf_song_detail_svr.get_song_detail_yqq"
                    && call_param(req) == json!({ "song_mid": "SONG" })
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(vendor_reply(
                    "music.pf_song_detail_svr.get_song_detail_yqq",
                    0,
                    json!({ "track_info": { "album": { "mid": "ALB" }, "vs": ["v1", "vsvalue"] } }),
                ))
            });
        expect_head(&mut transport, &mut seq, album_cover_url("ALB", 300), 200, Some(40_000));

        let client = QqMusicClient::with_transport(transport);
        let req = CoverRequest {
            mid: Some("SONG".into()),
            ..CoverRequest::default()
        };
        let cover = client.resolve_cover(&req, None).unwrap();
        assert_eq!(cover.source, CoverSource::AlbumMid);
        assert_eq!(cover.url, album_cover_url("ALB", 300));
    }

    #[test]
    fn nothing_to_try_is_a_validation_error() {
        let mut transport = MockTransport::new();
        transport.expect_execute().times(1).returning(|_| {
            Ok(vendor_reply(
                "music.pf_song_detail_svr.get_song_detail_yqq",
                0,
                json!({ "track_info": { "album": { "mid": "" }, "vs": [] } }),
            ))
        });
        let client = QqMusicClient::with_transport(transport);
        let req = CoverRequest {
            mid: Some("SONG".into()),
            ..CoverRequest::default()
        };
        assert!(matches!(
            client.resolve_cover(&req, None),
            Err(QqMusicError::Validation(_))
        ));

        let idle = QqMusicClient::with_transport(MockTransport::new());
        assert!(matches!(
            idle.resolve_cover(&CoverRequest::default(), None),
            Err(QqMusicError::Validation(_))
        ));
    }

    #[test]
    fn short_vs_values_fall_back_to_default() {
        let mut transport = MockTransport::new();
        transport.expect_execute().never();
        let client = QqMusicClient::with_transport(transport);

        for validate in [true, false] {
            let req = CoverRequest {
                validate,
                ..request(None, &["de"])
            };
            let cover = client.resolve_cover(&req, None).unwrap();
            assert_eq!(cover.source, CoverSource::Default);
            assert_eq!(cover.url, default_cover_url(300));
            assert_eq!(cover.vs, None);
        }
    }

    #[test]
    fn serializes_without_absent_vs() {
        let cover = first_candidate(Some("ALB"), &[], 300);
        assert_eq!(
            serde_json::to_value(&cover).unwrap(),
            json!({ "url": album_cover_url("ALB", 300), "source": "album_mid", "size": 300 })
        );
    }
}
