//! Data types shared by the resolvers and exposed to the routing layer.
//!
//! Output types serialize to the JSON shapes the HTTP routes return
//! (`snake_case` keys, absent optionals omitted).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Audio quality tier used by the playback fallback.
///
/// The vendor also knows higher tiers (master, atmos) and lossy OGG/AAC
/// variants, but they are not part of the fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Quality {
    /// Lossless, `F000…flac`.
    Flac,
    /// MP3 320 kbps, `M800…mp3`.
    Kbps320,
    /// MP3 128 kbps, `M500…mp3`.
    Kbps128,
}

impl Quality {
    /// Fixed descending fallback order.
    pub const FALLBACK_ORDER: [Self; 3] = [Self::Flac, Self::Kbps320, Self::Kbps128];

    /// Parse a requested quality (`flac`, `320`, `128`, case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flac" => Some(Self::Flac),
            "320" | "320kbps" => Some(Self::Kbps320),
            "128" | "128kbps" => Some(Self::Kbps128),
            _ => None,
        }
    }

    /// Position in [`Self::FALLBACK_ORDER`].
    pub fn rank(self) -> usize {
        match self {
            Self::Flac => 0,
            Self::Kbps320 => 1,
            Self::Kbps128 => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Kbps320 => "320",
            Self::Kbps128 => "128",
        }
    }

    /// Vendor filename descriptor `(prefix, extension)`.
    pub fn file_type(self) -> (&'static str, &'static str) {
        match self {
            Self::Flac => ("F000", ".flac"),
            Self::Kbps320 => ("M800", ".mp3"),
            Self::Kbps128 => ("M500", ".mp3"),
        }
    }
}

/// Result of [`resolve_playback_urls`](crate::QqMusicClient::resolve_playback_urls).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlaybackUrls {
    /// Song mid → full URL (`""` when that song has no URL at `quality`).
    pub urls: BTreeMap<String, String>,
    /// Tier the URLs belong to, or the last tier tried when `urls` is empty.
    pub quality: String,
}

/// Cover edge lengths the CDN serves.
pub const COVER_SIZES: [u32; 4] = [150, 300, 500, 800];

/// Size used when the requested one is not in [`COVER_SIZES`].
pub const DEFAULT_COVER_SIZE: u32 = 300;

/// Coerce `size` to a served cover size.
pub fn coerce_cover_size(size: u32) -> u32 {
    if COVER_SIZES.contains(&size) {
        size
    } else {
        DEFAULT_COVER_SIZE
    }
}

/// Input of [`resolve_cover`](crate::QqMusicClient::resolve_cover).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverRequest {
    /// Song mid; used for a detail lookup only when neither `album_mid`
    /// nor `vs` is given.
    pub mid: Option<String>,
    pub album_mid: Option<String>,
    /// Raw vs values, possibly comma-joined.
    pub vs: Vec<String>,
    pub size: u32,
    /// HEAD-check candidates before accepting them.
    pub validate: bool,
}

impl Default for CoverRequest {
    fn default() -> Self {
        Self {
            mid: None,
            album_mid: None,
            vs: Vec::new(),
            size: DEFAULT_COVER_SIZE,
            validate: true,
        }
    }
}

/// Where a cover URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverSource {
    AlbumMid,
    Vs,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cover {
    pub url: String,
    pub source: CoverSource,
    pub size: u32,
    /// The vs token used, when `source` is [`CoverSource::Vs`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vs: Option<String>,
}

/// Which optional lyric fields to request and decode. `lyric` is always
/// included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LyricFlags {
    pub trans: bool,
    pub qrc: bool,
    pub roma: bool,
}

impl Default for LyricFlags {
    fn default() -> Self {
        Self {
            trans: true,
            qrc: true,
            roma: true,
        }
    }
}

/// Lyric fields exactly as the vendor returns them (base64 / hex).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawLyrics {
    #[serde(default)]
    pub lyric: Option<String>,
    #[serde(default)]
    pub trans: Option<String>,
    #[serde(default)]
    pub qrc: Option<String>,
    #[serde(default)]
    pub roma: Option<String>,
}

/// Decoded lyric fields. A field is absent when it was not present, not
/// requested, or failed to decode.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Lyrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lyric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trans: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qrc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roma: Option<String>,
}

/// Answer of [`refresh_credential`](crate::refresh::refresh_credential).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshReport {
    pub success: bool,
    pub message: String,
}
