//! Playback URL resolution with quality fallback.
//!
//! # Endpoint
//!
//! `music.vkey.GetVkey.UrlGetVkey`
//!
//! Request:
//! ```json
//! { "filename": ["M5000039MnYb0qxYhV0039MnYb0qxYhV.mp3"], "guid": "...",
//!   "songmid": ["0039MnYb0qxYhV"], "songtype": [0] }
//! ```
//!
//! Response `data`:
//! ```json
//! { "midurlinfo": [
//!     { "songmid": "0039MnYb0qxYhV", "purl": "M500....mp3?guid=...&vkey=...", "wifiurl": "" }
//! ] }
//! ```
//!
//! `purl` is empty when the account may not stream that tier.

use crate::client::QqMusicClient;
use crate::credential::Credential;
use crate::error::{QqMusicError, Result};
use crate::sign::guid;
use crate::types::{PlaybackUrls, Quality};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::{debug, info};

const MODULE: &str = "music.vkey.GetVkey";
const METHOD: &str = "UrlGetVkey";

/// Tiers tried from `requested` downwards. Unrecognized → start at the top.
pub fn fallback_queue(requested: &str) -> &'static [Quality] {
    match Quality::parse(requested) {
        Some(q) => &Quality::FALLBACK_ORDER[q.rank()..],
        None => &Quality::FALLBACK_ORDER,
    }
}

/// Vendor filename for `mid` at `quality`: `<prefix><mid><mid><ext>`.
pub fn file_name(quality: Quality, mid: &str) -> String {
    let (prefix, ext) = quality.file_type();
    format!("{prefix}{mid}{mid}{ext}")
}

impl QqMusicClient {
    /// Resolve playable URLs for `mids`, degrading quality until any of
    /// them resolves.
    ///
    /// Tiers are tried strictly in [`Quality::FALLBACK_ORDER`] starting at
    /// `quality` (or `flac` when unrecognized). The first tier in which at
    /// least one id yields a URL wins; ids without a URL at that tier map
    /// to `""`. If no tier yields anything the map is empty and `quality`
    /// names the last tier tried.
    ///
    /// # Errors
    ///
    /// - [`QqMusicError::Validation`] — `mids` is empty
    /// - [`QqMusicError::Network`] / [`QqMusicError::Json`] — abort the loop;
    ///   vendor rejections only move on to the next tier
    pub fn resolve_playback_urls(
        &self,
        mids: &[String],
        quality: &str,
        credential: Option<&Credential>,
    ) -> Result<PlaybackUrls> {
        let mids: Vec<&str> = mids
            .iter()
            .map(|m| m.trim())
            .filter(|m| !m.is_empty())
            .collect();
        if mids.is_empty() {
            return Err(QqMusicError::Validation("missing song mid".into()));
        }

        let queue = fallback_queue(quality);
        for &tier in queue {
            let param = json!({
                "filename": mids.iter().map(|m| file_name(tier, m)).collect::<Vec<_>>(),
                "guid": guid(),
                "songmid": mids,
                "songtype": vec![0; mids.len()],
            });

            let data = match self.call(MODULE, METHOD, &param, credential) {
                Ok(data) => data,
                Err(e) if e.is_vendor() => {
                    debug!(quality = tier.as_str(), error = %e, "tier rejected, degrading");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(urls) = self.collect_urls(&mids, &data) {
                info!(quality = tier.as_str(), count = mids.len(), "playback urls resolved");
                return Ok(PlaybackUrls {
                    urls,
                    quality: tier.as_str().to_owned(),
                });
            }
            debug!(quality = tier.as_str(), "no playable url at tier, degrading");
        }

        let last = queue.last().copied().unwrap_or(Quality::Flac);
        Ok(PlaybackUrls {
            urls: BTreeMap::new(),
            quality: last.as_str().to_owned(),
        })
    }

    /// Map every requested mid to its URL (or `""`); `None` if nothing resolved.
    fn collect_urls(&self, mids: &[&str], data: &Value) -> Option<BTreeMap<String, String>> {
        let mut urls: BTreeMap<String, String> =
            mids.iter().map(|m| ((*m).to_owned(), String::new())).collect();
        let mut resolved = false;

        for info in data["midurlinfo"].as_array().into_iter().flatten() {
            let Some(mid) = info["songmid"].as_str() else {
                continue;
            };
            let path = [&info["purl"], &info["wifiurl"]]
                .into_iter()
                .filter_map(Value::as_str)
                .find(|p| !p.is_empty());
            if let (Some(path), Some(slot)) = (path, urls.get_mut(mid)) {
                *slot = format!("{}{path}", self.stream_domain());
                resolved = true;
            }
        }

        resolved.then_some(urls)
    }
}
