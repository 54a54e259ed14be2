//! QQ Music protocol client library.
//!
//! Proxies the vendor's signed `musics.fcg` RPC on behalf of a single shared
//! backend account: request signing, credential persistence and refresh,
//! and the fallback resolvers built on top (playback URLs, cover art,
//! lyrics).
//!
//! # Credential
//!
//! The session credential lives in a single-row SQLite store. It is seeded
//! from an admin submission or a bootstrap value and refreshed in place
//! before it expires.
//!
//! ```no_run
//! use qqmusic_api::{Config, QqMusicClient, SqliteStore, load_or_bootstrap};
//!
//! let config = Config::load().unwrap();
//! let store = SqliteStore::open(&config.database_path().unwrap()).unwrap();
//! let credential = load_or_bootstrap(&store, config.initial_credential.as_deref()).unwrap();
//!
//! let client = QqMusicClient::from_config(&config).unwrap();
//! let urls = client
//!     .resolve_playback_urls(&["0039MnYb0qxYhV".into()], "flac", credential.as_ref())
//!     .unwrap();
//! ```
//!
//! # API endpoint mapping
//!
//! | Method                                   | Vendor call                                        | Description            |
//! |------------------------------------------|----------------------------------------------------|------------------------|
//! | [`QqMusicClient::resolve_playback_urls`] | `music.vkey.GetVkey.UrlGetVkey`                    | Playback URLs          |
//! | [`QqMusicClient::resolve_cover`]         | `music.pf_song_detail_svr.get_song_detail_yqq`     | Cover art (+ HEAD probes) |
//! | [`QqMusicClient::fetch_lyrics`]          | `music.musichallSong.PlayLyricInfo.GetPlayLyricInfo` | Decoded lyrics       |
//! | [`Refresher::check_and_refresh`]         | `music.login.LoginServer.Login`                    | Credential refresh     |
//!
//! # Signing
//!
//! Every request body is signed with the web client's `zzc` scheme, see
//! [`sign`](crate::sign::sign).

pub mod client;
pub mod config;
mod cover;
pub mod credential;
pub mod error;
mod lyric;
pub mod refresh;
pub mod sign;
mod song_url;
pub mod store;
pub mod transport;
pub mod types;

pub use client::QqMusicClient;
pub use config::Config;
pub use cover::{normalize_vs, parse_vs_param};
pub use credential::Credential;
pub use error::{QqMusicError, Result};
pub use lyric::decrypt_lyrics;
pub use refresh::{RefreshOutcome, Refresher, refresh_credential};
pub use song_url::fallback_queue;
pub use store::{CredentialStore, SqliteStore, load_or_bootstrap, submit_credential};
