//! Lyric retrieval and per-field decryption.
//!
//! # Endpoint
//!
//! `music.musichallSong.PlayLyricInfo.GetPlayLyricInfo`
//!
//! Request: `{ "songmid": "...", "songid": 0, "format": "json", "qrc": 1, "trans": 1, "roma": 1 }`
//!
//! Response `data` carries up to four fields, each either base64 plain text
//! or (base64-wrapped) hex ciphertext; see [`qrc::decode_field`].

use crate::client::QqMusicClient;
use crate::credential::Credential;
use crate::error::{QqMusicError, Result};
use crate::types::{LyricFlags, Lyrics, RawLyrics};
use serde_json::{Value, json};
use tracing::{debug, warn};

const MODULE: &str = "music.musichallSong.PlayLyricInfo";
const METHOD: &str = "GetPlayLyricInfo";

/// Decode every present, requested field of `raw`.
///
/// A field that fails to decode is logged and left out; the others are
/// unaffected. `lyric` is always attempted.
pub fn decrypt_lyrics(raw: &RawLyrics, flags: &LyricFlags) -> Lyrics {
    Lyrics {
        lyric: decode("lyric", raw.lyric.as_deref(), true),
        trans: decode("trans", raw.trans.as_deref(), flags.trans),
        qrc: decode("qrc", raw.qrc.as_deref(), flags.qrc),
        roma: decode("roma", raw.roma.as_deref(), flags.roma),
    }
}

fn decode(field: &'static str, payload: Option<&str>, wanted: bool) -> Option<String> {
    let payload = payload.filter(|p| wanted && !p.trim().is_empty())?;
    match qrc::decode_field(payload) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(field, error = %e, "dropping undecodable lyric field");
            None
        }
    }
}

fn raw_from_data(data: &Value) -> RawLyrics {
    let field = |name: &str| data[name].as_str().map(str::to_owned);
    RawLyrics {
        lyric: field("lyric"),
        trans: field("trans"),
        qrc: field("qrc"),
        roma: field("roma"),
    }
}

impl QqMusicClient {
    /// Fetch the lyrics of a song by mid and/or numeric id and decode them.
    ///
    /// # Errors
    ///
    /// - [`QqMusicError::Validation`] — neither `mid` nor `id` given
    /// - errors of the vendor call propagate; decoding failures never do
    pub fn fetch_lyrics(
        &self,
        mid: Option<&str>,
        id: Option<u64>,
        flags: &LyricFlags,
        credential: Option<&Credential>,
    ) -> Result<Lyrics> {
        let mid = mid.map(str::trim).filter(|m| !m.is_empty());
        let id = id.filter(|&id| id > 0);
        if mid.is_none() && id.is_none() {
            return Err(QqMusicError::Validation("missing song mid or id".into()));
        }

        let param = json!({
            "songmid": mid.unwrap_or_default(),
            "songid": id.unwrap_or_default(),
            "format": "json",
            "qrc": u8::from(flags.qrc),
            "trans": u8::from(flags.trans),
            "roma": u8::from(flags.roma),
        });
        let data = self.call(MODULE, METHOD, &param, credential)?;
        let raw = raw_from_data(&data);
        debug!(
            lyric = raw.lyric.is_some(),
            trans = raw.trans.is_some(),
            qrc = raw.qrc.is_some(),
            roma = raw.roma.is_some(),
            "lyric payload received"
        );
        Ok(decrypt_lyrics(&raw, flags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use crate::transport::test_util::{call_key, call_param, vendor_reply};

    /// `[ti:晴天]\n[00:01.00]故事的小黄花`, base64.
    const PLAIN_B64: &str = "W3RpOuaZtOWkqV0KWzAwOjAxLjAwXeaVheS6i+eahOWwj+m7hOiKsQ==";
    const PLAIN: &str = "[ti:晴天]\n[00:01.00]故事的小黄花";

    /// `[0,1000]晴(0,500)天(500,500)`, zlib + 3DES, hex.
    const QRC_HEX: &str =
        "28308A27A460E589E6E326C690CFC85623D9B963CF96F56A588E768FE462614605E8B6337E558C3D";
    const QRC_PLAIN: &str = "[0,1000]晴(0,500)天(500,500)";

    /// [`QRC_HEX`] wrapped in base64.
    const QRC_B64: &str = "MjgzMDhBMjdBNDYwRTU4OUU2RTMyNkM2OTBDRkM4NTYyM0Q5Qjk2M0NGOTZGNTZBNTg4RTc2OEZFNDYyNjE0NjA1RThCNjMzN0U1NThDM0Q=";

    fn raw(lyric: &str, trans: &str, qrc: &str, roma: &str) -> RawLyrics {
        let some = |s: &str| Some(s.to_owned());
        RawLyrics {
            lyric: some(lyric),
            trans: some(trans),
            qrc: some(qrc),
            roma: some(roma),
        }
    }

    #[test]
    fn plaintext_is_kept_and_ciphertext_decrypted() {
        let out = decrypt_lyrics(
            &raw(PLAIN_B64, QRC_B64, QRC_HEX, ""),
            &LyricFlags::default(),
        );
        assert_eq!(out.lyric.as_deref(), Some(PLAIN));
        assert_eq!(out.trans.as_deref(), Some(QRC_PLAIN));
        assert_eq!(out.qrc.as_deref(), Some(QRC_PLAIN));
        assert_eq!(out.roma, None);
    }

    #[test]
    fn failing_field_is_omitted_others_survive() {
        let out = decrypt_lyrics(
            &raw(PLAIN_B64, "%%% not a payload %%%", "ABCDEF", PLAIN_B64),
            &LyricFlags::default(),
        );
        assert_eq!(out.lyric.as_deref(), Some(PLAIN));
        assert_eq!(out.trans, None);
        assert_eq!(out.qrc, None);
        assert_eq!(out.roma.as_deref(), Some(PLAIN));
    }

    #[test]
    fn disabled_fields_are_skipped() {
        let flags = LyricFlags {
            trans: false,
            qrc: false,
            roma: true,
        };
        let out = decrypt_lyrics(&raw(PLAIN_B64, PLAIN_B64, QRC_HEX, PLAIN_B64), &flags);
        assert_eq!(out.lyric.as_deref(), Some(PLAIN));
        assert_eq!(out.trans, None);
        assert_eq!(out.qrc, None);
        assert!(out.roma.is_some());
        assert_eq!(
            serde_json::to_value(&out).unwrap(),
            json!({ "lyric": PLAIN, "roma": PLAIN })
        );
    }

    #[test]
    fn fetch_sends_flags_and_decodes() {
        let mut transport = MockTransport::new();
        transport
            .expect_execute()
            .withf(|req| {
                call_key(req) == "music.musichallSong.PlayLyricInfo.GetPlayLyricInfo"
                    && call_param(req)
                        == json!({
                            "songmid": "0039MnYb0qxYhV", "songid": 0, "format": "json",
                            "qrc": 1, "trans": 0, "roma": 1
                        })
            })
            .times(1)
            .returning(|_| {
                Ok(vendor_reply(
                    "music.musichallSong.PlayLyricInfo.GetPlayLyricInfo",
                    0,
                    json!({ "lyric": PLAIN_B64, "trans": "", "qrc": QRC_HEX, "roma": "" }),
                ))
            });

        let client = QqMusicClient::with_transport(transport);
        let flags = LyricFlags {
            trans: false,
            ..LyricFlags::default()
        };
        let out = client
            .fetch_lyrics(Some("0039MnYb0qxYhV"), None, &flags, None)
            .unwrap();
        assert_eq!(
            out,
            Lyrics {
                lyric: Some(PLAIN.into()),
                qrc: Some(QRC_PLAIN.into()),
                ..Lyrics::default()
            }
        );
    }

    #[test]
    fn fetch_requires_mid_or_id() {
        let mut transport = MockTransport::new();
        transport.expect_execute().never();
        let client = QqMusicClient::with_transport(transport);
        let err = client
            .fetch_lyrics(Some("  "), None, &LyricFlags::default(), None)
            .unwrap_err();
        assert!(matches!(err, QqMusicError::Validation(_)));
    }
}
